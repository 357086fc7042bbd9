use thiserror::Error;

#[derive(Debug, Error)]
pub enum CockpitError {
    /// Any failed call against the read collaborator: transport error or a
    /// non-2xx status. Callers are not expected to tell these apart.
    #[error("fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("failed to decode event payload: {source}\n  payload: {payload}")]
    Decode {
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("activation is no longer active")]
    Inactive,

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl CockpitError {
    /// HTTP status of a failed fetch, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            CockpitError::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}
