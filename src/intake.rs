// =============================================================================
// intake.rs — THE FILING COUNTER
// =============================================================================
//
// The web app files job slips by LPUSHing JSON onto a Redis list. We take
// them off the other end with RPOP, oldest first, in small batches, and
// handle each one before taking the next. One slip, one result, in order.
//
// Redis gets its own circuit breaker. If the list can't be reached a few
// times running, we stop knocking for the cooldown instead of filling the
// logs with the same connection error every 250 milliseconds.
// =============================================================================

use std::num::NonZeroUsize;
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::ai::backend::ChatBackend;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::Config;
use crate::engine::{parse_job, Engine, EngineResult};
use crate::metrics::MetricsCollector;

/// Hand a result to the publisher. A full channel blocks this worker until
/// the publisher catches up.
fn forward(result_tx: &Sender<EngineResult>, result: EngineResult) -> bool {
    match result_tx.try_send(result) {
        Ok(()) => true,
        Err(TrySendError::Full(result)) => {
            warn!(job_id = %result.job_id, "Result channel full — waiting for the publisher");
            tokio::task::block_in_place(|| result_tx.send(result)).is_ok()
        }
        Err(TrySendError::Disconnected(result)) => {
            error!(job_id = %result.job_id, "Result channel closed — result dropped");
            false
        }
    }
}

/// Parse and handle one raw slip. `None` when nothing can be sent back.
pub async fn process_raw<B: ChatBackend>(
    engine: &Engine<B>,
    metrics: &MetricsCollector,
    raw: &str,
) -> Option<EngineResult> {
    metrics.increment_received();
    match parse_job(raw) {
        Ok(job) => {
            let result = engine.handle(job).await;
            metrics.record_completed(&result.kind, result.ok);
            if !result.ok {
                warn!(
                    job_id = %result.job_id,
                    kind = %result.kind,
                    error = result.error.as_deref().unwrap_or(""),
                    "Job completed with a degraded result"
                );
            }
            Some(result)
        }
        Err(malformed) => {
            metrics.increment_malformed();
            warn!(
                job_id = malformed.job_id.as_deref().unwrap_or("<none>"),
                error = %malformed.error,
                preview = %raw.chars().take(120).collect::<String>(),
                "Malformed job slip"
            );
            malformed.into_result()
        }
    }
}

/// Handle a batch of slips in order. Once the publisher is gone nothing more
/// can be delivered; the slips not yet handled are counted and returned.
async fn handle_batch<B: ChatBackend>(
    engine: &Engine<B>,
    metrics: &MetricsCollector,
    result_tx: &Sender<EngineResult>,
    slips: &[String],
) -> Result<(), usize> {
    for (i, raw) in slips.iter().enumerate() {
        if let Some(result) = process_raw(engine, metrics, raw).await {
            if !forward(result_tx, result) {
                let lost = slips.len() - i - 1;
                error!(lost = lost, "Publisher gone, abandoning the rest of the batch");
                return Err(lost);
            }
        }
    }
    Ok(())
}

async fn connect(config: &Config) -> redis::RedisResult<ConnectionManager> {
    let client = redis::Client::open(config.redis_url.as_str())?;
    client.get_connection_manager().await
}

/// Poll the job list until shutdown.
pub async fn run<B: ChatBackend>(
    config: Arc<Config>,
    engine: Arc<Engine<B>>,
    result_tx: Sender<EngineResult>,
    metrics: Arc<MetricsCollector>,
    breaker: CircuitBreaker,
    shutdown: &mut watch::Receiver<bool>,
) {
    let batch = NonZeroUsize::new(config.intake_batch_size).unwrap_or(NonZeroUsize::MIN);

    info!(
        queue = %config.job_queue_key,
        poll_ms = config.poll_interval.as_millis() as u64,
        batch = batch.get(),
        "Job intake initializing"
    );

    let mut con: Option<ConnectionManager> = None;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.poll_interval) => {
                if !breaker.allow_request() {
                    continue;
                }

                if con.is_none() {
                    match connect(&config).await {
                        Ok(manager) => {
                            info!("Redis connection established for job intake");
                            con = Some(manager);
                        }
                        Err(e) => {
                            breaker.record_failure();
                            metrics.increment_intake_errors();
                            warn!(error = %e, "Job intake could not reach Redis");
                            continue;
                        }
                    }
                }
                let Some(manager) = con.as_mut() else { continue };

                let popped: redis::RedisResult<Option<Vec<String>>> =
                    manager.rpop(&config.job_queue_key, Some(batch)).await;

                let slips = match popped {
                    Ok(slips) => {
                        breaker.record_success();
                        slips.unwrap_or_default()
                    }
                    Err(e) => {
                        breaker.record_failure();
                        metrics.increment_intake_errors();
                        warn!(error = %e, queue = %config.job_queue_key, "RPOP failed");
                        continue;
                    }
                };

                if slips.is_empty() {
                    continue;
                }
                debug!(count = slips.len(), "Job slips received");

                if handle_batch(&engine, &metrics, &result_tx, &slips).await.is_err() {
                    return;
                }
            }
            _ = shutdown.changed() => {
                info!("Job intake: shutting down");
                break;
            }
        }
    }
}
