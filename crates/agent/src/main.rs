// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use std::{
    process::ExitCode,
    sync::{Arc, Mutex, PoisonError},
};

use notification_poller::{
    ConnectionStatus, HttpNotificationClient, NotificationCenter, PollerSettings, PollingArbiter,
    PollingState, VisibilityGate,
};
use tokio::signal::unix::{signal, SignalKind};

mod cli;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = run().await {
        tracing::error!("Notification agent error: {e:#}");
        eprintln!("Notification agent error: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

async fn run() -> anyhow::Result<()> {
    let config = cli::get_config()?;

    let http_client = reqwest::Client::builder()
        .timeout(config.endpoint.request_timeout_secs)
        .build()?;
    let client = HttpNotificationClient::new(
        http_client,
        config.endpoint.base_url.clone(),
        config.endpoint.auth_token.clone(),
    )?;

    let center = NotificationCenter::mount(
        Arc::new(client),
        Arc::new(PollingArbiter::new()),
        VisibilityGate::default(),
        PollerSettings::from(&config),
    );
    tracing::info!(
        instance = %center.instance(),
        endpoint = %config.endpoint.base_url,
        "Notification agent started"
    );

    let last_seen = Mutex::new(None::<(ConnectionStatus, u64)>);
    let subscription = center.on_change(move |state| {
        let mut last_seen = last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        let current = (state.connection_status, state.unread_count);
        if state.is_loading || *last_seen == Some(current) {
            return;
        }
        *last_seen = Some(current);
        log_state(state);
    });

    // Have tokio wait for SIGTERM or SIGINT.
    let mut signal_sigint = signal(SignalKind::interrupt())?;
    let mut signal_sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = signal_sigint.recv() => tracing::debug!("Received SIGINT."),
        _ = signal_sigterm.recv() => tracing::debug!("Received SIGTERM."),
    }
    tracing::info!("Shutting down...");

    subscription.unsubscribe();
    center.unmount().await;

    tracing::debug!("Goodbye!");
    Ok(())
}

fn log_state(state: &PollingState) {
    match state.connection_status {
        ConnectionStatus::Connected => tracing::info!(
            unread = state.unread_count,
            notifications = state.notifications.len(),
            latest = state.notifications.first().map(|n| n.title.as_str()),
            "Notifications up to date"
        ),
        ConnectionStatus::RateLimited => tracing::warn!(
            error = state.error.as_deref(),
            "Portal is rate limiting notification requests"
        ),
        ConnectionStatus::AuthError => tracing::error!(
            "Portal rejected the session, restart the agent with a fresh auth token"
        ),
        ConnectionStatus::Disconnected => tracing::warn!(
            error = state.error.as_deref(),
            "Notification portal unreachable"
        ),
    }
}
