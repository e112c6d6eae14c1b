//! Sweet Claw Orchestrator
//!
//! Holds the authoritative claw position, layout and sugar level, serves the
//! HTTP command surface and hosts the websocket event bus.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod state;
pub mod store;
pub mod websocket;

use std::sync::Arc;

use sweet_indicator::IndicatorDriver;
use tracing::info;

pub use api::{
    create_router, AlertResponse, AppState, ErrorResponse, GrabResponse, LayoutResponse,
    MoveResponse, OkResponse,
};
pub use catalog::{Catalog, CatalogItem};
pub use config::{Config, CoreConfig, CONFIG_FILE_NAME};
pub use error::{CoreError, Result};
pub use orchestrator::{GrabOutcome, LayoutAck, MoveOutcome, Orchestrator};
pub use state::ClawState;
pub use store::{LayoutRecord, LayoutStore, LAYOUT_VERSION};
pub use websocket::{BusError, EventBroadcaster};

/// Builds the application state described by `config`.
///
/// Selects the indicator backend, recovers the persisted layout and loads
/// the catalog.
///
/// # Errors
///
/// Returns an error if the configured catalog file is unusable.
pub async fn bootstrap(config: &Config) -> Result<AppState> {
    let catalog = Catalog::load(config.core.catalog_file.as_deref())?;
    let indicator = IndicatorDriver::from_config(&config.indicator);
    indicator.flush().await;
    info!(backend = indicator.backend_name(), "Indicator ready");

    let orchestrator = Orchestrator::recover(
        EventBroadcaster::new(config.core.bus_capacity),
        indicator,
        LayoutStore::new(&config.core.layout_file),
    )
    .await;

    Ok(AppState::with_catalog(Arc::new(orchestrator), catalog))
}
