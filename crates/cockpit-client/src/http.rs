use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::backend::{Backend, Scope};
use crate::config::ClientConfig;
use crate::sse::SseDecoder;
use crate::stream::{EventSink, EventStream};
use crate::types::{Command, Entity, LogLine};
use crate::{CockpitError, Result};

// ─── HttpBackend ──────────────────────────────────────────────────────────

/// Read and push collaborators over HTTP: JSON endpoints for history and
/// command management, `text/event-stream` endpoints for live events.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    /// Same pool settings minus the whole-request timeout, which would cut
    /// long-lived event streams.
    stream_client: Client,
    origin: String,
}

#[derive(serde::Serialize)]
struct NewCommand<'a> {
    command: &'a str,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| fetch_error(config.origin(), e))?;
        let stream_client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| fetch_error(config.origin(), e))?;
        Ok(Self {
            client,
            stream_client,
            origin: config.origin().to_string(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    /// `GET /api/v1/command/list`
    pub async fn list_commands(&self, before: Option<&str>, limit: usize) -> Result<Vec<Command>> {
        self.fetch_page(&Scope::Commands, before, limit).await
    }

    /// `GET /api/v1/command/{id}/log`
    pub async fn list_logs(
        &self,
        command_id: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<LogLine>> {
        self.fetch_page(&Scope::logs(command_id), before, limit).await
    }

    /// `GET /api/v1/command/{id}`
    pub async fn get_command(&self, id: &str) -> Result<Command> {
        let url = self.url(&format!("/api/v1/command/{id}"));
        let res = check(&url, self.client.get(&url).send().await).await?;
        decode_json(&url, res).await
    }

    /// `POST /api/v1/command/new`
    pub async fn create_command(&self, command: &str) -> Result<Command> {
        let url = self.url("/api/v1/command/new");
        let res = self
            .client
            .post(&url)
            .json(&NewCommand { command })
            .send()
            .await;
        let res = check(&url, res).await?;
        let created: Command = decode_json(&url, res).await?;
        tracing::debug!(id = %created.id, "command created");
        Ok(created)
    }

    /// `DELETE /api/v1/command/{id}`
    pub async fn delete_command(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("/api/v1/command/{id}"));
        check(&url, self.client.delete(&url).send().await).await?;
        tracing::debug!(id, "command deleted");
        Ok(())
    }
}

impl Backend for HttpBackend {
    async fn fetch_page<E: Entity>(
        &self,
        scope: &Scope,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<E>> {
        let url = self.url(&scope.page_path());
        let limit = limit.to_string();
        let res = self
            .client
            .get(&url)
            .query(&[("before", before.unwrap_or("")), ("limit", limit.as_str())])
            .send()
            .await;
        let res = check(&url, res).await?;
        decode_json(&url, res).await
    }

    fn open_stream<E: Entity>(&self, scope: &Scope) -> EventStream<E> {
        let url = self.url(&scope.stream_path());
        let client = self.stream_client.clone();
        tracing::debug!(%scope, %url, "opening event stream");
        EventStream::spawn(scope.to_string(), move |sink| read_events(client, url, sink))
    }
}

// ─── Event stream reader ──────────────────────────────────────────────────

/// Pump one SSE response into `sink` until the server closes, the transport
/// fails, or the consumer goes away. Never retries.
async fn read_events<E: Entity>(client: Client, url: String, sink: EventSink<E>) {
    let res = client
        .get(&url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await;
    let res = match check(&url, res).await {
        Ok(res) => res,
        Err(e) => {
            tracing::warn!(%url, error = %e, "event stream failed to connect");
            return;
        }
    };
    tracing::info!(%url, "event stream connected");

    let mut decoder = SseDecoder::new();
    let mut body = std::pin::pin!(res.bytes_stream());
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(%url, error = %e, "event stream transport error");
                return;
            }
        };
        for msg in decoder.feed(&chunk) {
            if !msg.is_message() {
                continue;
            }
            if !sink.push(&msg.data) {
                return;
            }
        }
    }
    tracing::info!(%url, "event stream closed by server");
}

// ─── Helpers ──────────────────────────────────────────────────────────────

fn fetch_error(url: &str, e: reqwest::Error) -> CockpitError {
    CockpitError::Fetch {
        url: url.to_string(),
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

/// Collapse transport errors and non-2xx statuses into `Fetch`.
async fn check(url: &str, res: reqwest::Result<Response>) -> Result<Response> {
    let res = res.map_err(|e| fetch_error(url, e))?;
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.trim())
    };
    Err(CockpitError::Fetch {
        url: url.to_string(),
        status: Some(status.as_u16()),
        message,
    })
}

async fn decode_json<T: DeserializeOwned>(url: &str, res: Response) -> Result<T> {
    res.json::<T>().await.map_err(|e| fetch_error(url, e))
}
