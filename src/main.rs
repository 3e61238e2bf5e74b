use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use graceland::config::AppConfig;
use graceland::db;
use graceland::routes;
use graceland::services::auth::AuthService;
use graceland::services::mail::smtp::SmtpMailer;
use graceland::services::mail::{LogMailer, Mailer};
use graceland::services::payments::flutterwave::FlutterwaveProvider;
use graceland::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let auth = AuthService::new(config.jwt_secret.clone(), config.token_ttl_hours);

    if config.seed_demo_data {
        db::seed::seed_demo_data(&conn, &auth)?;
    }

    if config.payment_secret_key.is_empty() {
        tracing::warn!("FLUTTERWAVE_SECRET_KEY is not set, payment initiation will fail");
    }
    let payments = FlutterwaveProvider::new(
        config.payment_base_url.clone(),
        config.payment_secret_key.clone(),
        Duration::from_secs(config.payment_timeout_secs),
    )?;

    let mailer: Box<dyn Mailer> = if config.mail_server.is_empty() {
        tracing::info!("MAIL_SERVER not set, confirmation emails will only be logged");
        Box::new(LogMailer)
    } else {
        tracing::info!("using SMTP server {}:{}", config.mail_server, config.mail_port);
        Box::new(SmtpMailer::new(
            &config.mail_server,
            config.mail_port,
            config.mail_use_tls,
            config.mail_username.clone(),
            config.mail_password.clone(),
        )?)
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        auth,
        payments: Box::new(payments),
        mailer,
    });

    let app = routes::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
