use std::sync::Arc;

use anyhow::Context;
use task_notify::api::{ApiServer, AppState};
use task_notify::config::AppConfig;
use task_notify::logging;
use task_notify::notification::{
    ConnectionRegistry, Dispatcher, MailComposer, RealtimeBroadcaster, SmtpMailTransport,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();
    let _log_guard = logging::init_logging(config.log_dir.as_deref())?;

    let composer = MailComposer::from_config(&config.mail);
    if let Err(e) = composer.sender() {
        warn!(error = %e, "Sender address is invalid; assignment mails will not be sent (set MAIL_FROM or EMAIL_USER)");
    }
    if !config.mail.has_credentials() {
        warn!("EMAIL_USER / EMAIL_PASS not set; the relay will likely reject submissions");
    }

    let transport =
        SmtpMailTransport::new(&config.mail).context("Failed to configure SMTP relay")?;
    let registry = Arc::new(ConnectionRegistry::new());
    let dispatcher = Arc::new(Dispatcher::new(
        RealtimeBroadcaster::new(registry),
        composer,
        Arc::new(transport),
    ));

    let server = ApiServer::with_state(
        config.api.clone(),
        AppState::new(dispatcher, config.realtime.clone()),
    );

    let cancel_token = server.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            cancel_token.cancel();
        }
    });

    info!(
        smtp_host = %config.mail.smtp_host,
        smtp_port = config.mail.smtp_port,
        "task-notify starting"
    );
    server.run().await?;

    Ok(())
}
