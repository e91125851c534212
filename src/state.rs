use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::postgres::PgPoolOptions;

use crate::auth::{
    jwt::JwtKeys,
    notify::{LogNotifier, Notifier},
    repo::{AccountStore, InMemoryAccountStore, PgAccountStore},
    reset_code::ResetCodeGenerator,
    services::IdentityService,
};
use crate::clock::SystemClock;
use crate::config::{AppConfig, StoreBackend};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub identity: IdentityService,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.identity.keys().clone()
    }
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn AccountStore> = match config.store_backend {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL missing")?;
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .acquire_timeout(std::time::Duration::from_secs(3))
                    .connect(url)
                    .await
                    .context("connect to database")?;

                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgAccountStore::new(db))
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory account store; accounts are lost on restart");
                Arc::new(InMemoryAccountStore::new())
            }
        };

        Ok(Self::from_parts(config, store, Arc::new(LogNotifier)))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let identity = IdentityService::new(
            store,
            notifier,
            JwtKeys::from(&config.jwt),
            ResetCodeGenerator::from(&config.reset),
            Arc::new(SystemClock),
            config.password_min_length,
        );
        Self { config, identity }
    }

    #[cfg(test)]
    pub fn fake_with(store: Arc<dyn AccountStore>, notifier: Arc<dyn Notifier>) -> Self {
        use crate::config::ResetConfig;

        let config = Arc::new(AppConfig {
            store_backend: StoreBackend::Memory,
            database_url: None,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            reset: ResetConfig::default(),
            password_min_length: 8,
        });
        Self::from_parts(config, store, notifier)
    }
}
