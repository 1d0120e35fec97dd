//! One instance of every store, wired to a shared API client and session.

use std::sync::Arc;

use crate::api::{ApiClient, HttpTransport, Transport, TransportError};
use crate::config::AppConfig;
use crate::storage::{Storage, StorageError};
use crate::store::{NotificationStore, PreferenceStore, SessionCell, SessionStore, TaskStore};
use crate::ui::{Notifier, Presentation};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),
    #[error("transport unavailable: {0}")]
    Transport(#[from] TransportError),
}

pub struct App {
    pub config: AppConfig,
    pub api: Arc<ApiClient>,
    pub session: SessionStore,
    pub tasks: TaskStore,
    pub notifications: NotificationStore,
    pub preferences: PreferenceStore,
}

impl App {
    pub fn new(
        config: AppConfig,
        transport: Arc<dyn Transport>,
        storage: Storage,
        notifier: Arc<dyn Notifier>,
        presentation: Arc<dyn Presentation>,
    ) -> Self {
        let cell = Arc::new(SessionCell::new(storage.clone()));

        let tokens = cell.clone();
        let expired = cell.clone();
        let api = Arc::new(
            ApiClient::new(transport, notifier.clone())
                .with_token_source(move || tokens.token())
                .on_unauthorized(move || {
                    log::info!("Session rejected by server, signing out");
                    expired.clear();
                }),
        );

        Self {
            session: SessionStore::new(cell, api.clone(), notifier.clone(), presentation.clone()),
            tasks: TaskStore::new(api.clone(), notifier.clone(), config.page_size),
            notifications: NotificationStore::new(api.clone(), notifier.clone(), config.page_size),
            preferences: PreferenceStore::with_defaults(
                storage,
                presentation,
                notifier,
                config.theme,
                config.language,
            ),
            api,
            config,
        }
    }

    /// Production wiring: HTTP transport and file-backed storage under the configured
    /// data directory.
    pub fn connect(
        config: AppConfig,
        notifier: Arc<dyn Notifier>,
        presentation: Arc<dyn Presentation>,
    ) -> Result<Self, AppError> {
        let transport = HttpTransport::new(&config.api_base_url, config.request_timeout())?;
        let storage = Storage::open(&config.data_dir)?;
        log::info!("Using API at {} with data in {}", config.api_base_url, config.data_dir.display());
        Ok(Self::new(config, Arc::new(transport), storage, notifier, presentation))
    }

    /// Restore persisted preferences and session.
    pub fn start(&self, viewport_width: u32) {
        self.preferences.init(viewport_width);
        if self.session.init() {
            log::info!("Resumed session for {}", self.session.user_name());
        }
    }
}
