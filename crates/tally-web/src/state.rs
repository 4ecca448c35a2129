use std::sync::Arc;

use tally_core::{RateLimiter, VoteStore};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: VoteStore,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: ServerConfig, store: VoteStore) -> Self {
        let limiter = RateLimiter::new(store.clone(), config.voting.daily_limit);
        Self {
            config: Arc::new(config),
            store,
            limiter,
        }
    }
}
