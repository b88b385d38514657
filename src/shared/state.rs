use std::collections::HashSet;

use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::notify::Notifier;
use crate::shared::utils::DbPool;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub notifier: Notifier,
    /// Tokens invalidated by logout. Entries age out with token expiry;
    /// the set is process-local, matching single-instance deployment.
    pub revoked_tokens: RwLock<HashSet<String>>,
}

impl AppState {
    pub fn new(conn: DbPool, config: AppConfig, notifier: Notifier) -> Self {
        Self {
            conn,
            config,
            notifier,
            revoked_tokens: RwLock::new(HashSet::new()),
        }
    }
}
