use std::error::Error;
use std::sync::Arc;

use bookshelf_mail::{RelayConfig, RelayState, SmtpMailer, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RelayConfig::from_env()?;
    let mailer = SmtpMailer::new(&config)?;
    let app = router(RelayState::new(Arc::new(mailer)));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    log::info!("Running server on port {}", config.port);
    axum::serve(listener, app).await?;
    Ok(())
}
