use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use common::actors::{Actor, ActorType, ControlMessage};
use exchange::TradingApi;

use crate::processor::SignalProcessor;

/// Consumes raw signal messages and runs each through the order pipeline.
pub struct ExecutionService<A> {
    processor: Arc<SignalProcessor<A>>,
    signal_rx: broadcast::Receiver<String>,
    report_tx: Option<broadcast::Sender<String>>,
    serialize_orders: bool,
}

#[async_trait]
impl<A: TradingApi + 'static> Actor for ExecutionService<A> {
    fn name(&self) -> ActorType {
        ActorType::Executor
    }

    async fn run(&mut self, _supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        info!(
            "Starting Execution Service ({})",
            if self.serialize_orders {
                "one signal at a time"
            } else {
                "concurrent signals"
            }
        );

        loop {
            match self.signal_rx.recv().await {
                Ok(message) => {
                    let processor = self.processor.clone();
                    let report_tx = self.report_tx.clone();

                    if self.serialize_orders {
                        Self::execute(processor, report_tx, message).await;
                    } else {
                        tokio::spawn(Self::execute(processor, report_tx, message));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Execution service lagged: missed {} signals", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    bail!("Signal channel closed unexpectedly.");
                }
            }
        }
    }
}

impl<A: TradingApi + 'static> ExecutionService<A> {
    pub fn new(
        processor: Arc<SignalProcessor<A>>,
        signal_rx: broadcast::Receiver<String>,
        report_tx: Option<broadcast::Sender<String>>,
        serialize_orders: bool,
    ) -> Self {
        Self {
            processor,
            signal_rx,
            report_tx,
            serialize_orders,
        }
    }

    async fn execute(
        processor: Arc<SignalProcessor<A>>,
        report_tx: Option<broadcast::Sender<String>>,
        message: String,
    ) {
        let report = processor.process(&message).await;

        if let Some(tx) = report_tx {
            if tx.send(report.to_string()).is_err() {
                debug!("No notifier listening, report dropped");
            }
        }
    }
}
