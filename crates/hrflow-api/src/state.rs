//! Application state wiring all services together.
//!
//! The registry and engine are generic over repository, resolver and notifier
//! traits; AppState pins them to the SQLite repositories, the role directory
//! from `config.toml`, and a fan-out notifier over the outbox, the event bus
//! and the log. The event bus feeds the `/notifications/stream` SSE endpoint.

use std::sync::Arc;

use hrflow_core::engine::ApprovalEngine;
use hrflow_core::event::EventBus;
use hrflow_core::notify::FanoutNotifier;
use hrflow_core::registry::TemplateRegistry;
use hrflow_core::resolver::RoleDirectoryResolver;
use hrflow_infra::config::{load_global_config, role_resolver};
use hrflow_infra::data_dir::{database_url, resolve_data_dir};
use hrflow_infra::notifier::TracingNotifier;
use hrflow_infra::sqlite::instance::SqliteInstanceRepository;
use hrflow_infra::sqlite::outbox::SqliteOutboxNotifier;
use hrflow_infra::sqlite::pool::DatabasePool;
use hrflow_infra::sqlite::template::SqliteTemplateRepository;
use hrflow_types::config::GlobalConfig;

/// Engine pinned to the infra implementations.
pub type ConcreteEngine = ApprovalEngine<
    SqliteInstanceRepository,
    SqliteTemplateRepository,
    RoleDirectoryResolver,
    FanoutNotifier,
>;

pub type ConcreteRegistry = TemplateRegistry<SqliteTemplateRepository>;

const EVENT_BUS_CAPACITY: usize = 256;

/// Shared application state, used by both CLI commands and REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConcreteRegistry>,
    pub engine: Arc<ConcreteEngine>,
    pub outbox: SqliteOutboxNotifier,
    /// Live feed consumed by the notification stream handler.
    pub event_bus: EventBus,
    pub config: Arc<GlobalConfig>,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Resolve the data directory, load config, open the database and wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        Ok(Self::from_parts(db_pool, config))
    }

    pub fn from_parts(db_pool: DatabasePool, config: GlobalConfig) -> Self {
        let templates = SqliteTemplateRepository::new(db_pool.clone());
        let instances = SqliteInstanceRepository::new(db_pool.clone());
        let outbox = SqliteOutboxNotifier::new(db_pool.clone());
        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);

        let notifier = FanoutNotifier::new()
            .with(outbox.clone())
            .with(event_bus.clone())
            .with(TracingNotifier::new());

        let engine = ApprovalEngine::new(
            instances,
            templates.clone(),
            role_resolver(&config),
            notifier,
            config.engine.clone(),
        );

        Self {
            registry: Arc::new(TemplateRegistry::new(templates)),
            engine: Arc::new(engine),
            outbox,
            event_bus,
            config: Arc::new(config),
            db_pool,
        }
    }
}
