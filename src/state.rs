use std::sync::Arc;

use anyhow::Result;
use caldir_schedule_core::{
    Collaborators, Dispatcher, FsBackend, PolicyAuthorizer, ScheduleConfig,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Wire the engine to the filesystem backend under `config.data_dir`.
    pub fn new(config: &ScheduleConfig) -> Result<Self> {
        let data_path = config.data_path();
        if !data_path.is_dir() {
            tracing::warn!(path = %data_path.display(), "Data directory does not exist yet");
        }

        let backend = Arc::new(FsBackend::new(data_path));
        let authorizer = Arc::new(PolicyAuthorizer::new(
            config.admin_principals.iter().cloned(),
            config.default_access,
        ));

        let dispatcher = Dispatcher::new(
            Collaborators::from_backend(backend, authorizer),
            config.dispatch_limits()?,
        );

        Ok(AppState {
            dispatcher: Arc::new(dispatcher),
        })
    }
}
