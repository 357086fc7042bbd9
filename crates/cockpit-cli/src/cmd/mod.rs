pub mod list;
pub mod logs;
pub mod rm;
pub mod run;
pub mod show;

use std::sync::Arc;

use anyhow::Context;
use cockpit_client::{Activation, Backend, ClientConfig, Entity, HttpBackend, Reconciler};

/// Everything a subcommand needs to talk to the server.
pub struct Ctx {
    pub http: Arc<HttpBackend>,
    pub reconciler: Reconciler<HttpBackend>,
    pub json: bool,
}

impl Ctx {
    pub fn new(config: &ClientConfig, json: bool) -> anyhow::Result<Self> {
        let http = Arc::new(
            HttpBackend::new(config)
                .with_context(|| format!("failed to build client for {}", config.origin()))?,
        );
        let reconciler = Reconciler::from_config(http.clone(), config);
        Ok(Self {
            http,
            reconciler,
            json,
        })
    }
}

/// Page backwards until the server reports no older entries.
pub async fn load_all<E: Entity, B: Backend>(activation: &Activation<E, B>) -> anyhow::Result<()> {
    while activation.snapshot().has_more {
        let added = activation
            .load_more()
            .await
            .with_context(|| format!("failed to load older {}", activation.scope()))?;
        if added == 0 {
            break;
        }
    }
    Ok(())
}
