use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use approval_gate::config::Config;
use approval_gate::decision::DecisionProcessor;
use approval_gate::scheduler::NomadClient;
use approval_gate::server::{AppState, build_router};
use approval_gate::slack::SlackClient;
use approval_gate::store::ApprovalStore;
use approval_gate::watcher::EventWatcher;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "approval_gate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "invalid configuration");
            std::process::exit(1);
        }
    };
    if config.approver_id.is_empty() {
        tracing::warn!("approver identity is empty; no registration will ever qualify");
    }

    let scheduler = NomadClient::new(&config.nomad_addr);
    let chat = SlackClient::new(&config.slack_token);

    let store = Arc::new(ApprovalStore::new(
        chat.clone(),
        scheduler.clone(),
        config.slack_channel.clone(),
    ));
    let processor = Arc::new(
        DecisionProcessor::new(
            store.clone(),
            scheduler.clone(),
            chat,
            config.approver_secret.clone(),
        )
        .with_job_links(&config.nomad_addr),
    );

    let app = build_router(AppState::new(processor));
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("failed to bind callback listener");
    tracing::info!("listening on {}", config.bind_addr);
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("callback server failed");
    });

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                cancel.cancel();
            }
        });
    }

    let watcher = EventWatcher::new(scheduler, config.approver_id.clone());
    if let Err(error) = watcher.subscribe(cancel, store.as_ref()).await {
        tracing::error!(%error, "event watcher terminated");
        std::process::exit(1);
    }
}
