use std::sync::Arc;

use anyhow::{Context, Result};

use crate::actions::ActionSettings;
use crate::config::ConsoleConfig;
use crate::http::ServerState;
use crate::render::HandlebarsRenderer;
use crate::router::{Dispatcher, console_routes};
use crate::security::SecurityContext;
use crate::store::seed::SeedFile;
use crate::store::{EntityStore, InMemoryEntityStore, registry};

/// Builds the shared server state from configuration, backed by a fresh
/// in-memory store.
pub fn init(config: &ConsoleConfig) -> Result<ServerState> {
    init_with_store(config, Arc::new(InMemoryEntityStore::new()))
}

pub fn init_with_store(config: &ConsoleConfig, store: Arc<dyn EntityStore>) -> Result<ServerState> {
    registry::ensure_registered();
    if let Some(path) = &config.seed {
        let written = SeedFile::load_from_path(path)?
            .apply(store.as_ref())
            .with_context(|| format!("failed to seed store from {:?}", path))?;
        tracing::debug!(path = %path.display(), records = written, "applied seed file");
    }

    let renderer = HandlebarsRenderer::with_overrides(config.templates_dir.as_deref())
        .context("failed to build template registry")?;
    let security =
        SecurityContext::from_config(&config.identity).context("invalid identity configuration")?;
    let routes = console_routes().context("failed to compile route table")?;
    tracing::info!(
        routes = routes.len(),
        identity = ?config.identity.source,
        admins = config.identity.admins.len(),
        "console initialised"
    );

    let settings = ActionSettings {
        listing_path: config.listing_path.clone(),
    };
    let dispatcher = Dispatcher::new(Arc::new(routes), security, store, settings);
    Ok(ServerState::new(dispatcher, Arc::new(renderer)))
}
