use std::{net::SocketAddr, process, sync::Arc, time::Duration};

use eventhub::{
    application::{
        certificates::{CertificateRenderer, CertificateService},
        error::AppError,
        events::EventService,
        mailer::MailTransport,
        registration::RegistrationService,
        repos::{EventsRepo, ParticipantsRepo},
        scheduler::{CompletionScanner, PeriodicTask},
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, PublicState, RateLimiter},
        mail::ResendTransport,
        pdf::PdfCertificateRenderer,
        telemetry,
    },
};
use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Scan(_) => run_scan(settings).await,
        config::Command::Preview(args) => run_preview(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;

    let scan_task = if settings.scheduler.enabled {
        let scanner = app.scanner.clone();
        info!(
            target = "eventhub::scheduler",
            cadence_secs = settings.scheduler.cadence.as_secs(),
            "completion scanner enabled"
        );
        Some(PeriodicTask::start(
            "completion-scan",
            settings.scheduler.cadence,
            move || {
                let scanner = scanner.clone();
                async move {
                    scanner.run_tick().await;
                }
            },
        ))
    } else {
        info!(target = "eventhub::scheduler", "completion scanner disabled");
        None
    };

    let result = serve_http(&settings, app.public_state, app.admin_state).await;

    if let Some(task) = scan_task {
        task.shutdown().await;
    }

    result
}

async fn run_scan(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;

    let summary = app.scanner.run_tick().await;
    info!(
        target = "eventhub::scan",
        due = summary.due,
        processed = summary.processed,
        failed = summary.failed,
        certificates_sent = summary.certificates_sent,
        "Scan completed"
    );
    Ok(())
}

async fn run_preview(
    settings: config::Settings,
    args: config::PreviewArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;

    let pdf = app
        .certificates
        .render_preview(args.participant)
        .await?;

    tokio::fs::write(&args.file, &pdf)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "eventhub::preview",
        participant = %args.participant,
        path = %args.file.display(),
        bytes = pdf.len(),
        "Certificate preview written"
    );
    Ok(())
}

struct ApplicationContext {
    public_state: PublicState,
    admin_state: AdminState,
    certificates: Arc<CertificateService>,
    scanner: Arc<CompletionScanner>,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let events_repo: Arc<dyn EventsRepo> = repositories.clone();
    let participants_repo: Arc<dyn ParticipantsRepo> = repositories.clone();

    let transport = ResendTransport::new(&settings.mail).map_err(AppError::from)?;
    if !transport.is_configured() {
        warn!(
            target = "eventhub::mailer",
            "mail api key is not configured; outgoing mail will fail"
        );
    }
    let mailer: Arc<dyn MailTransport> = Arc::new(transport);
    let renderer: Arc<dyn CertificateRenderer> = Arc::new(PdfCertificateRenderer::new());

    let events = Arc::new(EventService::new(
        events_repo.clone(),
        participants_repo.clone(),
        settings.links.frontend_url.clone(),
    ));
    let certificates = Arc::new(CertificateService::new(
        events_repo.clone(),
        participants_repo.clone(),
        renderer,
        mailer.clone(),
    ));
    let registration = Arc::new(RegistrationService::new(
        events_repo.clone(),
        participants_repo,
        mailer,
    ));
    let scanner = Arc::new(CompletionScanner::new(events_repo, certificates.clone()));

    let rate_limiter = Arc::new(RateLimiter::new(
        Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
        settings.rate_limit.max_requests.get(),
    )
    .trust_forwarded_for(settings.rate_limit.trust_forwarded_for));

    Ok(ApplicationContext {
        public_state: PublicState {
            db: repositories.clone(),
            registration,
            rate_limiter,
        },
        admin_state: AdminState {
            db: repositories,
            events,
            certificates: certificates.clone(),
        },
        certificates,
        scanner,
    })
}

async fn serve_http(
    settings: &config::Settings,
    public_state: PublicState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_public_router(public_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "eventhub::http",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listeners bound"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target = "eventhub::http", "shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let public_server = axum::serve(
        public_listener,
        public_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown_rx.clone()));

    let grace = settings.server.graceful_shutdown;
    let drain_deadline = async move {
        shutdown_signal(shutdown_rx).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = async { try_join!(public_server, admin_server) } => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline => {
            warn!(
                target = "eventhub::http",
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            // Sender gone without a signal: keep serving.
            std::future::pending::<()>().await;
        }
    }
}
