// =============================================================================
// publisher.rs — THE CLERK'S OUTBOX
// =============================================================================
//
// Finished results come off the crossbeam channel and go back to the web app
// two ways at once:
//
// 1. PUBLISH on the result channel, for whoever is listening right now
// 2. SET with an expiry under `{prefix}{job_id}`, for whoever asks later
//
// Pub/sub is fire-and-forget, so the key is the one that matters when the
// web app's listener was busy. On shutdown, whatever is still in the
// channel is written out before the task exits.
// =============================================================================

use anyhow::Result;
use crossbeam_channel::Receiver;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::EngineResult;
use crate::metrics::MetricsCollector;

const BATCH_SIZE: usize = 50;

pub struct RedisPublisher {
    config: Arc<Config>,
    receiver: Receiver<EngineResult>,
    shutdown: watch::Receiver<bool>,
    metrics: Arc<MetricsCollector>,
}

impl RedisPublisher {
    pub fn new(
        config: Arc<Config>,
        receiver: Receiver<EngineResult>,
        shutdown: watch::Receiver<bool>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            config,
            receiver,
            shutdown,
            metrics,
        }
    }

    /// Run until shutdown, or until every sender is gone and the channel is
    /// empty.
    pub async fn run(self) -> Result<()> {
        info!(
            channel = %self.config.result_channel,
            key_prefix = %self.config.result_key_prefix,
            ttl_secs = self.config.result_ttl.as_secs(),
            "Redis Publisher starting"
        );

        let client = redis::Client::open(self.config.redis_url.as_str())?;
        let mut con = loop {
            match client.get_multiplexed_async_connection().await {
                Ok(con) => {
                    info!("Redis connection established for results");
                    break con;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to connect to Redis — retrying in 5 seconds");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    if *self.shutdown.borrow() {
                        info!("Shutdown received during Redis connection retry — exiting");
                        return Ok(());
                    }
                }
            }
        };

        let mut batch: Vec<EngineResult> = Vec::with_capacity(BATCH_SIZE);

        loop {
            if *self.shutdown.borrow() {
                info!("Shutdown signal received — draining pending results");
                batch.clear();
                batch.extend(self.receiver.try_iter());
                if !batch.is_empty() {
                    self.publish_batch(&mut con, &batch).await;
                }
                info!(drained = batch.len(), "Redis Publisher shutting down");
                return Ok(());
            }

            batch.clear();
            let mut disconnected = false;
            while batch.len() < BATCH_SIZE {
                match self.receiver.try_recv() {
                    Ok(result) => batch.push(result),
                    Err(crossbeam_channel::TryRecvError::Empty) => break,
                    Err(crossbeam_channel::TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }

            if !batch.is_empty() {
                self.publish_batch(&mut con, &batch).await;
            }

            if disconnected {
                info!("Result channel disconnected — publisher shutting down");
                return Ok(());
            }

            if batch.is_empty() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }

    async fn publish_batch(&self, con: &mut redis::aio::MultiplexedConnection, batch: &[EngineResult]) {
        for result in batch {
            match self.publish_one(con, result).await {
                Ok(()) => self.metrics.increment_published(),
                Err(e) => {
                    self.metrics.increment_publish_failures();
                    error!(
                        error = %e,
                        job_id = %result.job_id,
                        kind = %result.kind,
                        "Failed to publish result — the web app will time out on this job"
                    );
                }
            }
        }
        debug!(batch_size = batch.len(), "Result batch published");
    }

    async fn publish_one(&self, con: &mut redis::aio::MultiplexedConnection, result: &EngineResult) -> Result<()> {
        let json = serde_json::to_string(result)?;
        let key = self.config.result_key(&result.job_id);

        let _: () = con.set_ex(&key, &json, self.config.result_ttl.as_secs().max(1)).await?;
        let _: () = con.publish(&self.config.result_channel, &json).await?;

        info!(
            job_id = %result.job_id,
            kind = %result.kind,
            ok = result.ok,
            "Result published"
        );
        Ok(())
    }
}
