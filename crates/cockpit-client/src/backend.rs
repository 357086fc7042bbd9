use std::fmt;
use std::future::Future;

use crate::stream::EventStream;
use crate::types::Entity;
use crate::Result;

/// The resource a reconciler or event stream is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every command, newest first.
    Commands,
    /// Output lines of one command.
    Logs { command_id: String },
}

impl Scope {
    pub fn logs(command_id: impl Into<String>) -> Self {
        Scope::Logs {
            command_id: command_id.into(),
        }
    }

    /// Path of the paginated history endpoint.
    pub fn page_path(&self) -> String {
        match self {
            Scope::Commands => "/api/v1/command/list".to_string(),
            Scope::Logs { command_id } => format!("/api/v1/command/{command_id}/log"),
        }
    }

    /// Path of the server-sent event endpoint.
    pub fn stream_path(&self) -> String {
        match self {
            Scope::Commands => "/api/v1/command/stream".to_string(),
            Scope::Logs { command_id } => format!("/api/v1/command/{command_id}/log/stream"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Commands => f.write_str("commands"),
            Scope::Logs { command_id } => write!(f, "logs:{command_id}"),
        }
    }
}

/// The two collaborators a [`Reconciler`](crate::reconciler::Reconciler)
/// talks to: a paginated read endpoint and a push stream, both per scope.
pub trait Backend: Send + Sync + 'static {
    /// Fetch up to `limit` entities older than `before`, newest first.
    /// `before = None` starts from the newest entity.
    fn fetch_page<E: Entity>(
        &self,
        scope: &Scope,
        before: Option<&str>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<E>>> + Send;

    /// Open the live event stream for `scope`. Must not block; connection
    /// failures end the returned stream instead of surfacing here.
    fn open_stream<E: Entity>(&self, scope: &Scope) -> EventStream<E>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_scope_paths() {
        let scope = Scope::Commands;
        assert_eq!(scope.page_path(), "/api/v1/command/list");
        assert_eq!(scope.stream_path(), "/api/v1/command/stream");
        assert_eq!(scope.to_string(), "commands");
    }

    #[test]
    fn log_scope_paths() {
        let scope = Scope::logs("01HX");
        assert_eq!(scope.page_path(), "/api/v1/command/01HX/log");
        assert_eq!(scope.stream_path(), "/api/v1/command/01HX/log/stream");
        assert_eq!(scope.to_string(), "logs:01HX");
    }
}
