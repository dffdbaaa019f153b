use std::sync::Arc;

use chrono::Duration;
use tracing::error;

use tidings_crypto::CredentialHasher;
use tidings_db::Database;

use crate::artifacts::ArtifactStore;
use crate::error::ApiError;
use crate::gate::Gate;
use crate::tokens::Tokens;

pub type AppState = Arc<AppStateInner>;

/// Collaborators built once at startup and shared by every request.
pub struct AppStateInner {
    pub db: Database,
    pub hasher: CredentialHasher,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub jwt_secret: String,
    pub settings: Settings,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the web client; magic links point there.
    pub frontend_url: String,
    pub login_token_ttl: Duration,
    pub share_token_ttl: Duration,
    pub session_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frontend_url: String::new(),
            login_token_ttl: Duration::minutes(15),
            share_token_ttl: Duration::hours(24),
            session_ttl: Duration::days(7),
        }
    }
}

impl Settings {
    pub fn link(&self, path: &str) -> String {
        format!("{}{}", self.frontend_url.trim_end_matches('/'), path)
    }
}

impl AppStateInner {
    pub fn tokens(&self) -> Tokens<'_> {
        Tokens::new(&self.db, &self.hasher)
    }

    pub fn gate(&self) -> Gate<'_> {
        Gate::new(&self.db, &self.hasher)
    }
}

/// Run blocking work (SQLite, Argon2) off the async runtime.
pub async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
}
