//! Server runtime
//!
//! [`ServerHandle`] owns the whole lifecycle: storage backend, migrations,
//! the lifecycle engine, the settlement sweeper, the REST API and graceful
//! shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::{
    create_event_bus, start_settlement_sweeper, CheckoutProviders, DemoCheckoutProvider,
    LifecycleEngine, SharedEventBus,
};
use crate::config::AppConfig;
use crate::domain::RepositoryProvider;
use crate::infrastructure::{
    init_database, run_migrations, InMemoryRepositoryProvider, SeaOrmRepositoryProvider,
};
use crate::interfaces::http::{create_api_router, AppState};
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};

pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

/// Handle to a running server
pub struct ServerHandle {
    pub engine: Arc<LifecycleEngine>,
    pub event_bus: SharedEventBus,
    pub config: AppConfig,
    /// Address the API is bound to (useful with port 0)
    pub local_addr: SocketAddr,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownCoordinator,
    api_task: JoinHandle<()>,
    sweeper_task: Option<JoinHandle<()>>,
}

/// The global recorder can only be installed once per process
fn prometheus_handle() -> Option<PrometheusHandle> {
    static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("Prometheus recorder installed");
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Prometheus recorder unavailable, /metrics disabled");
                None
            }
        })
        .clone()
}

impl ServerHandle {
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let config = opts.config;
        info!(version = env!("CARGO_PKG_VERSION"), "Starting Kyradi booking engine");

        let metrics = if config.metrics.enabled {
            prometheus_handle()
        } else {
            None
        };

        // ── Storage ────────────────────────────────────────────
        let (repos, db): (Arc<dyn RepositoryProvider>, Option<DatabaseConnection>) =
            if config.database.is_in_memory() {
                warn!("Using the in-memory backend; data is lost on restart");
                (Arc::new(InMemoryRepositoryProvider::new()), None)
            } else {
                let db = init_database(&config.database).await?;
                if opts.auto_migrate {
                    run_migrations(&db).await?;
                }
                (Arc::new(SeaOrmRepositoryProvider::new(db.clone())), Some(db))
            };

        // ── Engine ─────────────────────────────────────────────
        let event_bus = create_event_bus();
        let providers = CheckoutProviders {
            demo: Some(Arc::new(DemoCheckoutProvider::new(
                config.payments.demo_checkout_url.clone(),
            ))),
            live: None,
        };
        let engine = Arc::new(LifecycleEngine::new(
            repos,
            event_bus.clone(),
            config.payments.gateway_config(),
            providers,
        ));

        // ── Background tasks ───────────────────────────────────
        let shutdown = ShutdownCoordinator::new(config.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        let sweeper_task = match config.settlement.sweep_interval_secs {
            0 => {
                info!("Settlement sweeper disabled");
                None
            }
            interval => Some(start_settlement_sweeper(
                engine.settlement().clone(),
                shutdown_signal.clone(),
                interval,
            )),
        };

        // ── REST API ───────────────────────────────────────────
        let api_keys = config.api_key_registry();
        if api_keys.is_empty() {
            warn!("No API keys configured; every /api/v1 request will be rejected");
        } else {
            info!(keys = api_keys.len(), "API keys loaded");
        }

        let mut state = AppState::new(engine.clone(), api_keys);
        if let Some(db) = &db {
            state = state.with_database(db.clone());
        }
        let router = create_api_router(state, metrics);

        let listener = tokio::net::TcpListener::bind(config.server.address()).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "REST API listening");
        info!("Swagger UI at http://{}/docs/", local_addr);

        let api_shutdown = shutdown_signal.clone();
        let api_task = tokio::spawn(async move {
            let server = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                api_shutdown.notified().wait().await;
                info!("REST API received shutdown signal");
            });
            if let Err(e) = server.await {
                error!(error = %e, "REST API server error");
            }
        });

        Ok(Self {
            engine,
            event_bus,
            config,
            local_addr,
            db,
            shutdown,
            api_task,
            sweeper_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Trigger shutdown on SIGTERM / SIGINT
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }

    /// Wait for the tasks to stop after shutdown was triggered, bounded by
    /// `server.shutdown_timeout`
    pub async fn wait(self) {
        let Self {
            db,
            shutdown,
            api_task,
            sweeper_task,
            ..
        } = self;

        let finished = shutdown
            .run_cleanup(async move {
                if let Err(e) = api_task.await {
                    error!(error = %e, "REST API task panicked");
                }
                if let Some(task) = sweeper_task {
                    if let Err(e) = task.await {
                        error!(error = %e, "Settlement sweeper task panicked");
                    }
                }
            })
            .await;
        if !finished {
            warn!("Some tasks were still running at shutdown");
        }

        if let Some(db) = db {
            match db.close().await {
                Ok(()) => info!("Database connection closed"),
                Err(e) => warn!(error = %e, "Error closing database connection"),
            }
        }
        info!("Kyradi booking engine stopped");
    }

    pub async fn shutdown(self) {
        self.trigger_shutdown();
        self.wait().await;
    }
}

/// Install the global tracing subscriber from `[logging]`
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.logging.format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
