use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use shared_config::{AppConfig, StoreBackend};
use shared_models::clock::{Clock, SystemClock};

use crate::memory::{MemoryAppointmentStore, MemoryUserDirectory};
use crate::store::{AppointmentStore, UserDirectory};
use crate::supabase::{SupabaseAppointmentStore, SupabaseUserDirectory};

/// Shared handles every router and service is built from.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        appointments: Arc<dyn AppointmentStore>,
        directory: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            appointments,
            directory,
            clock,
        }
    }

    /// Wire the store and directory selected by `config.store_backend`.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let (appointments, directory): (Arc<dyn AppointmentStore>, Arc<dyn UserDirectory>) =
            match config.store_backend {
                StoreBackend::Memory => {
                    let directory = match &config.directory_seed_path {
                        Some(path) => MemoryUserDirectory::from_seed_file(path)?,
                        None => MemoryUserDirectory::new(),
                    };
                    (Arc::new(MemoryAppointmentStore::new()), Arc::new(directory))
                }
                StoreBackend::Supabase => (
                    Arc::new(SupabaseAppointmentStore::new(&config)),
                    Arc::new(SupabaseUserDirectory::new(&config)),
                ),
            };

        info!("Using {} store backend", config.store_backend);
        Ok(Self::new(config, appointments, directory, Arc::new(SystemClock)))
    }
}
