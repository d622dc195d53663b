use std::net::SocketAddr;
use std::sync::Arc;

use auth::Authenticator;
use session_service::config::Config;
use session_service::domain::session::service::SessionService;
use session_service::inbound::http::router::create_router;
use session_service::outbound::notifications::KafkaNotificationProducer;
use session_service::outbound::notifications::NotificationDispatcher;
use session_service::outbound::repositories::PostgresPrincipalRepository;
use session_service::outbound::repositories::PostgresTokenRepository;
use session_service::security::audit::AuditSink;
use session_service::security::audit::TracingAuditSink;
use session_service::security::revocation::RevocationCache;
use session_service::security::sweeper::spawn_sweeper;
use session_service::security::sweeper::ExpiredTokenSweeper;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "session-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        kafka_brokers = %config.kafka.brokers,
        kafka_topic = %config.kafka.notification_topic,
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let shutdown = CancellationToken::new();

    let authenticator = Arc::new(
        Authenticator::new(config.jwt.secret.as_bytes())
            .with_leeway(chrono::Duration::seconds(config.jwt.clock_skew_seconds)),
    );
    let principal_repository = Arc::new(PostgresPrincipalRepository::new(pg_pool.clone()));
    let token_repository = Arc::new(PostgresTokenRepository::new(pg_pool));

    let producer = Arc::new(KafkaNotificationProducer::new(&config.kafka)?);
    let (dispatcher, dispatcher_task) = NotificationDispatcher::spawn(
        producer,
        config.notifications.queue_capacity,
        shutdown.clone(),
    );

    let revocations = Arc::new(RevocationCache::new());
    let rate_limiter = Arc::new(config.rate_limiter());
    let audit = Arc::new(TracingAuditSink);

    let session_service = Arc::new(SessionService::new(
        Arc::clone(&principal_repository),
        Arc::clone(&token_repository),
        Arc::new(dispatcher),
        Arc::clone(&audit),
        Arc::clone(&revocations),
        authenticator,
        config.session_policy(),
    ));

    if let Some(admin) = &config.admin {
        match session_service
            .ensure_admin(&admin.name, &admin.email, &admin.password)
            .await
        {
            Ok(true) => tracing::info!(email = %admin.email, "Admin account bootstrapped"),
            Ok(false) => tracing::debug!("Admin account already present"),
            Err(e) => tracing::error!(error = %e, "Admin bootstrap failed"),
        }
    }

    let sweepers = vec![
        spawn_sweeper(
            Arc::clone(&revocations),
            config.revocation_sweep_interval(),
            shutdown.clone(),
        ),
        spawn_sweeper(
            Arc::clone(&rate_limiter),
            config.rate_limit_sweep_interval(),
            shutdown.clone(),
        ),
        spawn_sweeper(
            Arc::new(ExpiredTokenSweeper::new(token_repository)),
            config.expired_token_sweep_interval(),
            shutdown.clone(),
        ),
    ];

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let audit_sink: Arc<dyn AuditSink> = audit;
    let http_application = create_router(
        session_service,
        rate_limiter,
        audit_sink,
        config.server.secure_cookies,
    );

    let server_shutdown = shutdown.clone();
    let served = axum::serve(
        http_listener,
        http_application.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown signal received"),
            _ = server_shutdown.cancelled() => {}
        }
        server_shutdown.cancel();
    })
    .await;

    shutdown.cancel();
    if let Err(e) = &served {
        tracing::error!(error = %e, "Server error");
    }

    for sweeper in sweepers {
        if let Err(e) = sweeper.await {
            tracing::error!(error = %e, "Sweeper task failed");
        }
    }
    if let Err(e) = dispatcher_task.await {
        tracing::error!(error = %e, "Notification dispatcher task failed");
    }

    tracing::info!("Service stopped");
    served.map_err(anyhow::Error::from)
}
