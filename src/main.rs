use log::{debug, error, info, warn};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;

use gatehouse::config::{load_config, Config};
use gatehouse::router::{build_router, Components};
use gatehouse::secrets::SecretGenerator;
use gatehouse::store::{InMemoryUserStore, PgUserStore, UserStore};
use gatehouse::token::TokenService;

#[tokio::main]
async fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!("gatehouse starting up");
    debug!("Config: {:?}", config);

    let components = match build_components(&config).await {
        Ok(components) => components,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let addr: SocketAddr = match config.service_address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid SERVICE_ADDRESS {}: {}", config.service_address, e);
            std::process::exit(1);
        }
    };

    let app = build_router(components, &config);

    info!("Server listening on {}", addr);
    let server = axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr, _>())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        error!("Server error: {}", e);
    }
}

/// Log to syslog, or to stderr through `tracing-subscriber` when syslog is
/// unreachable.
fn init_logging(config: &Config) {
    let level = if config.debug_mode {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let formatter = syslog::Formatter3164 {
        facility: syslog::Facility::LOG_DAEMON,
        hostname: None,
        process: "gatehouse".into(),
        pid: std::process::id(),
    };
    match syslog::unix(formatter) {
        Ok(logger) => {
            match log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger))) {
                Ok(()) => log::set_max_level(level),
                Err(e) => eprintln!("Failed to set syslog logger: {}", e),
            }
        }
        Err(e) => {
            eprintln!("Failed to connect to syslog: {}, falling back to stderr", e);
            let filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_str().to_lowercase()));
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

async fn build_components(config: &Config) -> Result<Components, Box<dyn std::error::Error>> {
    let tokens = Arc::new(TokenService::new(&config.jwt)?);
    let secrets = Arc::new(SecretGenerator::new(config.password.clone(), config.otp.clone())?);

    let users: Arc<dyn UserStore> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(database_url)
                .await?;
            info!("Database connection pool established");
            let store = PgUserStore::new(pool);
            store.ensure_schema().await?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, users are kept in memory and lost on restart");
            Arc::new(InMemoryUserStore::new())
        }
    };

    Ok(Components {
        tokens,
        secrets,
        users,
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => { info!("Received Ctrl+C, shutting down"); }
                    _ = sigterm.recv() => { info!("Received SIGTERM, shutting down"); }
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await;
                info!("Received Ctrl+C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received Ctrl+C, shutting down");
    }
}
