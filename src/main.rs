use std::{net::SocketAddr, process, sync::Arc};

use timetable::{
    application::{
        error::AppError,
        honeypot::{HoneypotLimiter, LockoutPolicy},
        otp::OtpAuthenticator,
        purge::PurgeService,
        sources::TimetableSource,
        timetable::TimetableService,
    },
    cache::{CacheAsideFetcher, CacheConfig},
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        store::build_store,
        telemetry,
        upstream::HttpJsonSource,
    },
};
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging).map_err(AppError::from)?;
            run_serve(settings).await
        }
        config::Command::Otp => run_otp(&settings),
    }
}

fn run_otp(settings: &config::Settings) -> Result<(), AppError> {
    let authenticator = OtpAuthenticator::new(&settings.admin.otp_secret)?;
    println!("{}", authenticator.current_code());
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let authenticator = Arc::new(OtpAuthenticator::new(&settings.admin.otp_secret)?);
    let store = build_store(&settings.store)?;

    if !store.is_alive().await {
        warn!(
            target = "timetable::store",
            backend = ?settings.store.backend,
            "store unreachable at startup; serving uncached until it recovers"
        );
    }

    let sources = settings
        .sources
        .iter()
        .map(|source| {
            HttpJsonSource::new(source)
                .map(|source| Arc::new(source) as Arc<dyn TimetableSource>)
        })
        .collect::<Result<Vec<_>, InfraError>>()?;
    if sources.is_empty() {
        warn!(
            target = "timetable::bootstrap",
            "no timetable sources configured"
        );
    }

    let fetcher = CacheAsideFetcher::new(store.clone(), CacheConfig::from(&settings.cache));
    let timetable = Arc::new(TimetableService::new(sources, fetcher));
    let limiter = HoneypotLimiter::new(store.clone(), LockoutPolicy::from(&settings.admin));
    let purge = Arc::new(PurgeService::new(store.clone(), authenticator, limiter));

    let state = HttpState {
        timetable,
        purge,
        store,
        trust_forwarded_for: settings.admin.trust_forwarded_for,
    };

    serve_http(&settings, state).await
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "timetable::bootstrap",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "timetable::bootstrap", "shutting down");
}
