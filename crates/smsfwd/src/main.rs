use std::sync::Arc;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use smsfwd_brevo::{BrevoTransport, DEFAULT_API_URL};
use smsfwd_core::{
    config::Config, delivery::DeliveryWorker, domain::InboundMessage, intake::IntakeDispatcher,
    ports::ConfigStore,
};
use smsfwd_spool::SpoolConfig;

mod sink;
mod source;
mod store;

use sink::SocketNotifySink;
use store::FileConfigStore;

#[tokio::main]
async fn main() -> Result<(), smsfwd_core::Error> {
    smsfwd_core::logging::init("smsfwd")?;

    let cfg = Config::load()?;

    let store: Arc<dyn ConfigStore> = Arc::new(FileConfigStore::new(cfg.config_path.clone()));

    let (queue, runner) = smsfwd_spool::open(SpoolConfig {
        dir: cfg.spool_dir.clone(),
        max_attempts: cfg.max_attempts,
        backoff_base: cfg.backoff_base,
        backoff_cap: cfg.backoff_cap,
    })?;

    let api_url = cfg
        .api_url
        .clone()
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let transport = Arc::new(BrevoTransport::new(api_url, cfg.http_timeout));
    let worker = Arc::new(DeliveryWorker::new(
        store.clone(),
        transport,
        Some(cfg.template_path.clone()),
    ));

    let dispatcher = IntakeDispatcher::new(
        store,
        Arc::new(SocketNotifySink::new(cfg.socket_path.clone())),
        Arc::new(queue),
    );

    let cancel = CancellationToken::new();
    let runner_task = tokio::spawn(runner.run(worker, cancel.clone()));

    if std::env::args().any(|a| a == "--test") {
        info!("dispatching synthetic test message");
        dispatcher
            .handle(InboundMessage {
                sender: Some("TEST".to_string()),
                body: "Test message from smsfwd".to_string(),
                received_at: chrono::Utc::now().timestamp_millis(),
            })
            .await;
    }

    info!("listening for message events on stdin");
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        _ = source::pump(stdin, &dispatcher) => {
            info!("event source finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, stopping gracefully");
        }
    }

    cancel.cancel();
    if let Err(e) = runner_task.await {
        warn!("spool runner task failed: {e}");
    }

    Ok(())
}
