use crate::config::Config;
use crate::events::DomainEvent;
use axum::extract::FromRef;
use sqlx::PgPool;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Write paths publish here; cache-invalidation / fan-out collaborators
    /// subscribe. Lagging subscribers just miss events.
    pub events: broadcast::Sender<DomainEvent>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let (events, _) = broadcast::channel(crate::events::EVENT_CHANNEL_CAPACITY);
        Self {
            pool,
            config,
            events,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
