use anyhow::Context;
use cockpit_client::ClientConfig;
use std::path::Path;

/// Resolve the client configuration.
///
/// Later sources override earlier ones:
/// 1. Built-in defaults
/// 2. `--config` file / `COCKPIT_CONFIG`
/// 3. `--url` flag / `COCKPIT_URL`
/// 4. `--page-size` flag
pub fn resolve(
    file: Option<&Path>,
    url: Option<&str>,
    page_size: Option<usize>,
) -> anyhow::Result<ClientConfig> {
    let mut config = match file {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if let Some(url) = url {
        config.base_url = url.to_string();
    }
    if let Some(page_size) = page_size {
        config.page_size = page_size;
    }

    config.validate().context("invalid client configuration")?;
    Ok(config)
}
