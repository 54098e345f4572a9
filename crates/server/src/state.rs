use std::sync::Arc;
use std::time::Instant;

use sqlx::SqlitePool;

use abacus_compute::{ExpressionRepository, Scheduler};
use abacus_core::Config;

use crate::auth::TokenIssuer;
use crate::repository::{SqliteExpressionRepository, UserRepository};

pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub expressions: Arc<dyn ExpressionRepository>,
    pub users: UserRepository,
    pub tokens: TokenIssuer,
    pub started_at: Instant,
}

impl AppState {
    /// Wire repositories, scheduler and token issuer around one pool.
    ///
    /// Does not run recovery; call [`Scheduler::recover`] before serving.
    pub fn new(pool: SqlitePool, config: &Config) -> Arc<Self> {
        let expressions: Arc<dyn ExpressionRepository> =
            Arc::new(SqliteExpressionRepository::new(pool.clone()));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&expressions),
            config.operations.clone(),
        ));

        Arc::new(Self {
            scheduler,
            expressions,
            users: UserRepository::new(pool),
            tokens: TokenIssuer::new(&config.auth),
            started_at: Instant::now(),
        })
    }
}
