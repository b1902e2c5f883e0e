pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod services;
pub mod store;

use std::sync::Arc;
use tokio::task;

use policy::AccessPolicy;
use services::assignment::AssignmentService;
use store::PgSeatStore;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub cache: cache::CacheService,
    pub config: config::Config,
    pub assignments: AssignmentService,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;

        db.run_migrations().await?;

        let cache = cache::CacheService::connect(&config.redis.url, db.clone()).await?;

        let store = Arc::new(PgSeatStore::new(db.pool.clone()));
        let assignments =
            AssignmentService::new(store, AccessPolicy::new(config.policy.timezone));

        let state = Arc::new(Self {
            db,
            cache,
            config,
            assignments,
        });

        let state_for_bg = state.clone();
        task::spawn(async move {
            // Warmup cache в фоне
            state_for_bg.cache.warmup().await;
        });

        Ok(state)
    }
}
