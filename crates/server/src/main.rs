//! Companion server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use companion_api::{AppState, auth_middleware, router as api_router};
use companion_common::{BlobStore, Config, LocalBlobStore};
use companion_core::{
    AdminService, ArticleService, AuthService, BroadcastEventPublisher, CommentService,
    EventPublisherService, IdentityProviderService, LikeService, LocalIdentityProvider,
    MailService, NotificationService, PostService, SchedulerConfig, SurveyService,
    spawn_scheduler,
};
use companion_db::repositories::{MailRepository, NotificationRepository, UserRepository};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Largest accepted request body (image uploads).
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        return Err(e.into());
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "companion=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting companion server...");

    let config = Config::load()?;

    let db = companion_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    companion_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);
    let max_attempts = config.transactions.max_attempts;

    // Collaborators
    let event_publisher: EventPublisherService = Arc::new(BroadcastEventPublisher::new());
    let identity: IdentityProviderService = Arc::new(LocalIdentityProvider::new(
        Arc::clone(&db),
        config.auth.reset_code_ttl_minutes,
    ));
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        config.storage.base_path.clone(),
        config.storage.base_url.clone(),
    ));
    let mail = MailService::new(
        MailRepository::new(Arc::clone(&db)),
        config.server.url.clone(),
    );

    // Services
    let notification_service = NotificationService::new(
        NotificationRepository::new(Arc::clone(&db)),
        event_publisher.clone(),
    );
    let state = AppState {
        auth_service: AuthService::new(
            Arc::clone(&db),
            identity.clone(),
            mail.clone(),
            blobs.clone(),
            config.auth.default_photo_url.clone(),
        ),
        post_service: PostService::new(
            Arc::clone(&db),
            blobs.clone(),
            event_publisher.clone(),
            max_attempts,
        ),
        comment_service: CommentService::new(Arc::clone(&db), event_publisher.clone(), max_attempts),
        like_service: LikeService::new(Arc::clone(&db), event_publisher.clone(), max_attempts),
        notification_service: notification_service.clone(),
        survey_service: SurveyService::new(
            Arc::clone(&db),
            mail.clone(),
            event_publisher.clone(),
            max_attempts,
        ),
        admin_service: AdminService::new(UserRepository::new(Arc::clone(&db)), identity, mail),
        article_service: ArticleService::new(Arc::clone(&db), blobs, event_publisher.clone()),
        event_publisher,
    };

    let scheduler_config = SchedulerConfig::from(&config.jobs);
    info!(
        interval_secs = scheduler_config.purge_interval.as_secs(),
        batch_size = scheduler_config.purge_batch_size,
        "Starting notification purge scheduler"
    );
    let scheduler = spawn_scheduler(scheduler_config, Arc::new(notification_service));

    let app = Router::new()
        .nest("/api", api_router())
        .nest_service("/files", ServeDir::new(&config.storage.base_path))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.abort();
    info!("Server shutdown complete");
    Ok(())
}
