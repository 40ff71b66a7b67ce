// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Composition root. Wires the node client, the PoW provider, and the sweep
//! store into the attachment service and runs it until ctrl-c or a fatal
//! ledger inconsistency.

use std::{env, process, sync::Arc};

use log::{error, info};
use thiserror::Error;

use attachment_service::{spawn, AttachmentService, ServiceError};
use hub_db::MemoryHubDb;
use hub_types::config::{ConfigError, HubConfig};
use tangle_client::{HttpTangleClient, NodePowProvider, TangleClient};

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(err) = run().await {
        error!("hubd failed: {err}");
        process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config_path = env::args().nth(1).unwrap_or_else(|| "hub".to_string());
    let config = HubConfig::load(&config_path)?;

    let client: Arc<dyn TangleClient> = Arc::new(HttpTangleClient::new(&config.node.uri));
    let pow = Arc::new(NodePowProvider::new(
        Arc::clone(&client),
        config.node.depth,
        config.node.mwm,
    ));
    let db = Arc::new(MemoryHubDb::new());

    let service = Arc::new(AttachmentService::new(
        db,
        client,
        pow,
        config.attachment.clone(),
    ));

    info!(
        "hubd starting against {} (tick every {:?})",
        config.node.uri,
        config.attachment.tick_interval()
    );
    let mut handle = spawn(service, config.attachment.tick_interval());

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => None,
        result = handle.wait() => Some(result),
    };
    match finished {
        None => {
            info!("shutting down");
            handle.stop().await?;
        }
        Some(result) => result?,
    }
    Ok(())
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}
