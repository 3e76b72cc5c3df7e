#![deny(unsafe_code)]

use std::time::Duration;

use structopt::StructOpt;
use tokio::sync::oneshot;

use sqs::logger::{config_logger, logger_init};
use sqs::{api, ServerContext, Storage};
use sqs_conf::{Options, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    //init config
    let settings = Settings::new(Options::from_args())?;

    //init log
    let logger = config_logger(&settings.log);
    logger_init(logger, settings.log.level.inner())?;
    settings.logs();

    //storage backends are chosen by env, once
    let storage = Storage::new(&settings).await?;
    let scx = ServerContext::new(settings.clone(), storage).start().await?;

    let listener = tokio::net::TcpListener::bind(settings.node.laddr).await?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let server = tokio::spawn(api::listen_and_serve(scx.clone(), listener, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down, node addr: {}", scx.node_addr);
    scx.stop().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(Duration::from_secs(10), server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => log::error!("http api exited with error, {e:?}"),
        Ok(Err(e)) => log::error!("http api task failed, {e:?}"),
        Err(_) => log::warn!("http api did not stop within 10s"),
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}
