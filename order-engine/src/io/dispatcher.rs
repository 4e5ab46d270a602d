use super::command::{execute, CommandResponse};
use super::ingress::OrderCommand;
use crate::engine::OrderManager;
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum Work {
    Command {
        request_id: String,
        command: OrderCommand,
    },
    /// Acknowledged once everything queued ahead of it has run.
    Barrier(oneshot::Sender<()>),
}

/// Fans commands out to a fixed set of workers, by order key.
///
/// Every command with the same [`OrderCommand::shard_key`] goes to the same
/// worker and is executed in arrival order; different keys run in parallel.
/// The engine is synchronous, so workers run on the blocking pool.
/// [`Dispatcher::barrier`] waits for every queued command to finish.
pub struct Dispatcher {
    shards: Vec<mpsc::Sender<Work>>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(
        manager: Arc<OrderManager>,
        workers: usize,
        queue_depth: usize,
        responses: mpsc::Sender<CommandResponse>,
    ) -> Self {
        let workers = workers.max(1);
        let mut shards = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let (tx, mut rx) = mpsc::channel::<Work>(queue_depth.max(1));
            let manager = manager.clone();
            let responses = responses.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                debug!("Worker {} started", worker_id);
                while let Some(work) = rx.blocking_recv() {
                    match work {
                        Work::Command {
                            request_id,
                            command,
                        } => {
                            let response = execute(&manager, request_id, command);
                            if responses.blocking_send(response).is_err() {
                                warn!("Worker {}: response sink closed", worker_id);
                                break;
                            }
                        }
                        Work::Barrier(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                debug!("Worker {} stopped", worker_id);
            }));
            shards.push(tx);
        }
        info!("Dispatcher running with {} workers", workers);

        Self {
            shards,
            workers: handles,
        }
    }

    pub async fn dispatch(&self, request_id: String, command: OrderCommand) -> Result<()> {
        let shard = self.shard_for(&command.shard_key());
        self.shards[shard]
            .send(Work::Command {
                request_id,
                command,
            })
            .await
            .map_err(|_| anyhow!("worker {} is gone", shard))
    }

    /// Returns once every command dispatched before the call has executed.
    ///
    /// Reference data changes wait on this so they never overtake commands
    /// that were read before them.
    pub async fn barrier(&self) -> Result<()> {
        let mut pending = Vec::with_capacity(self.shards.len());
        for (shard, tx) in self.shards.iter().enumerate() {
            let (done_tx, done_rx) = oneshot::channel();
            tx.send(Work::Barrier(done_tx))
                .await
                .map_err(|_| anyhow!("worker {} is gone", shard))?;
            pending.push((shard, done_rx));
        }
        for (shard, done_rx) in pending {
            done_rx
                .await
                .map_err(|_| anyhow!("worker {} stopped before the barrier", shard))?;
        }
        Ok(())
    }

    /// Closes the queues and waits for the workers to drain them.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.shards);
        for handle in self.workers {
            handle.await?;
        }
        Ok(())
    }

    fn shard_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Collaborators;
    use crate::events::EventBus;
    use crate::reference::ReferenceData;
    use crate::error::ErrorKind;
    use crate::store::MemoryStore;
    use oms::{
        CreateOrderRequest, InstrumentId, InstrumentSnapshot, OrderId, OrderSide, OrderType,
        PortfolioSnapshot, TenantId,
    };
    use rust_decimal_macros::dec;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn every_command_gets_one_response() {
        let manager = Arc::new(OrderManager::new(
            EngineConfig::default(),
            Collaborators::in_memory(
                Arc::new(MemoryStore::new()),
                Arc::new(ReferenceData::new()),
                Arc::new(EventBus::new(16)),
            ),
        ));
        let (tx, mut rx) = mpsc::channel(64);
        let dispatcher = Dispatcher::new(manager, 3, 8, tx);

        for i in 0..10 {
            dispatcher
                .dispatch(
                    format!("r-{}", i),
                    OrderCommand::Get {
                        order_id: OrderId::new(),
                    },
                )
                .await
                .unwrap();
        }
        dispatcher.shutdown().await.unwrap();

        let mut seen = 0;
        while let Some(response) = rx.recv().await {
            assert!(!response.ok);
            seen += 1;
        }
        assert_eq!(seen, 10);
    }

    fn create(client_order_id: &str) -> OrderCommand {
        OrderCommand::Create(
            CreateOrderRequest::new(
                "T1",
                "PF-1",
                "AAPL",
                OrderType::Market,
                OrderSide::Buy,
                dec!(10),
            )
            .with_client_order_id(client_order_id),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn restriction_after_barrier_does_not_reach_earlier_creates() {
        let reference = Arc::new(ReferenceData::new());
        reference
            .upsert_portfolio(PortfolioSnapshot::new("PF-1", "T1", dec!(1_000_000)))
            .unwrap();
        reference
            .upsert_instrument(InstrumentSnapshot::new("AAPL", dec!(50)))
            .unwrap();
        let manager = Arc::new(OrderManager::new(
            EngineConfig::default(),
            Collaborators::in_memory(
                Arc::new(MemoryStore::new()),
                reference.clone(),
                Arc::new(EventBus::new(64)),
            ),
        ));
        let (tx, mut rx) = mpsc::channel(64);
        let dispatcher = Dispatcher::new(manager, 4, 8, tx);

        for i in 0..5 {
            dispatcher
                .dispatch(format!("before-{}", i), create(&format!("C-B{}", i)))
                .await
                .unwrap();
        }
        dispatcher.barrier().await.unwrap();
        reference
            .restrict(TenantId::new("T1"), InstrumentId::new("AAPL"))
            .unwrap();
        dispatcher
            .dispatch("after".to_string(), create("C-A"))
            .await
            .unwrap();
        dispatcher.shutdown().await.unwrap();

        let mut responses = Vec::new();
        while let Some(response) = rx.recv().await {
            responses.push(response);
        }
        assert_eq!(responses.len(), 6);
        for response in &responses {
            if response.request_id == "after" {
                let error = response.error.as_ref().unwrap();
                assert_eq!(error.kind, ErrorKind::ComplianceBlock);
            } else {
                assert!(response.ok, "{} failed", response.request_id);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn barrier_on_idle_workers_returns() {
        let manager = Arc::new(OrderManager::new(
            EngineConfig::default(),
            Collaborators::in_memory(
                Arc::new(MemoryStore::new()),
                Arc::new(ReferenceData::new()),
                Arc::new(EventBus::new(16)),
            ),
        ));
        let (tx, _rx) = mpsc::channel(4);
        let dispatcher = Dispatcher::new(manager, 3, 2, tx);
        dispatcher.barrier().await.unwrap();
        dispatcher.barrier().await.unwrap();
        dispatcher.shutdown().await.unwrap();
    }
}
