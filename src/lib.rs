//! Stockflow: inventory transfers across warehouses with weighted-average
//! cost revaluation.
//!
//! The crate tracks per-warehouse stock quantities and a single global
//! weighted-average cost per product. Transfers are the only mutation
//! source: creating, editing, or deleting one adjusts stock and cost inside
//! a single database transaction, and every effect is reversible by
//! construction (deleting a transfer restores the state its creation
//! changed, up to per-write rounding of the stored cost).
//!
//! Entry point for most callers is [`services::transfers::TransferService`];
//! [`AppState::initialize`] wires it together from configuration.

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::costing::CostingSettings;
use crate::services::transfers::TransferService;

pub use crate::errors::ServiceError as Error;

/// Shared application state: the connection pool, configuration, and the
/// wired transfer service.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub transfers: TransferService,
}

impl AppState {
    /// Connects to the database, optionally runs migrations, and builds the
    /// service graph. Returns the state together with the event receiver;
    /// the caller decides how to consume events.
    pub async fn initialize(
        config: AppConfig,
    ) -> Result<(Self, mpsc::Receiver<Event>), ServiceError> {
        let db = Arc::new(db::establish_connection_from_app_config(&config).await?);

        if config.auto_migrate {
            db::run_migrations(&db).await?;
        }

        let (event_sender, event_receiver) = events::channel(config.event_channel_capacity);
        let event_sender = Arc::new(event_sender);

        let settings = CostingSettings {
            line_revalue_enabled: config.transfer_line_revalue_cost,
        };
        let transfers = TransferService::new(db.clone(), Some(event_sender.clone()), settings);

        info!(environment = %config.environment, "Application state initialized");

        Ok((
            Self {
                db,
                config: Arc::new(config),
                event_sender,
                transfers,
            },
            event_receiver,
        ))
    }
}
