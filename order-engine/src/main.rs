use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use order_engine::events::{spawn_event_logger, EventBus};
use order_engine::io::{
    apply_reference_update, spawn_response_writer, Args, Dispatcher, Gateway, IngressMessage,
    JsonLinesGateway,
};
use order_engine::reference::ReferenceData;
use order_engine::store::MemoryStore;
use order_engine::{Collaborators, EngineConfig, OrderManager};
use std::sync::Arc;
use tokio::sync::mpsc;

const QUEUE_DEPTH: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = EngineConfig::load(Some(&args.config))
        .with_context(|| format!("loading {}", args.config.display()))?;

    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level.as_str())).init();
    info!(
        "Starting order-engine v{} ({} workers)",
        env!("CARGO_PKG_VERSION"),
        args.workers
    );

    // 1. State
    let store = Arc::new(MemoryStore::new());
    let reference = Arc::new(ReferenceData::new());
    let bus = EventBus::new(config.event_buffer);
    let event_logger = spawn_event_logger(bus.subscribe());
    let manager = Arc::new(OrderManager::new(
        config,
        Collaborators::in_memory(store, reference.clone(), Arc::new(bus.clone())),
    ));

    // 2. Output and workers
    let (response_tx, response_rx) = mpsc::channel(QUEUE_DEPTH);
    let writer = spawn_response_writer(response_rx, tokio::io::stdout());
    let dispatcher = Dispatcher::new(manager, args.workers, QUEUE_DEPTH, response_tx);

    // 3. Input, read on the blocking pool
    let (ingress_tx, mut ingress_rx) = mpsc::channel(QUEUE_DEPTH);
    let input = args.input.clone();
    let reader = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut gateway = JsonLinesGateway::open(&input).with_context(|| format!("opening {}", input))?;
        while let Some(message) = gateway.next() {
            if ingress_tx.blocking_send(message).is_err() {
                break;
            }
        }
        Ok(())
    });

    // Reference data changes apply in input order: earlier commands finish first.
    let mut in_flight = false;
    while let Some(message) = ingress_rx.recv().await {
        if let IngressMessage::Command {
            request_id,
            command,
        } = message
        {
            dispatcher.dispatch(request_id, command).await?;
            in_flight = true;
            continue;
        }
        if in_flight {
            dispatcher.barrier().await?;
            in_flight = false;
        }
        if let Err(e) = apply_reference_update(&reference, message) {
            error!("Reference data update failed: {}", e);
        }
    }

    // 4. Drain
    reader.await??;
    dispatcher.shutdown().await?;
    let written = writer.await??;
    drop(bus);
    event_logger.await?;
    info!("order-engine finished, {} responses written", written);

    Ok(())
}
