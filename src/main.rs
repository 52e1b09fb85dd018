//  ██████╗ ██████╗ ██╗   ██╗██████╗ ████████╗
// ██╔════╝██╔═══██╗██║   ██║██╔══██╗╚══██╔══╝
// ██║     ██║   ██║██║   ██║██████╔╝   ██║
// ██║     ██║   ██║██║   ██║██╔══██╗   ██║
// ╚██████╗╚██████╔╝╚██████╔╝██║  ██║   ██║
//  ╚═════╝ ╚═════╝  ╚═════╝ ╚═╝  ╚═╝   ╚═╝
//
// V I S I O N   E N G I N E
//
// The ranking and AI-bookkeeping engine behind CourtVision Pro.
// Tokio + Redis + Crossbeam + Aho-Corasick + Circuit Breakers
// All so a judge in Delhi sees Delhi judgments first.

mod ai;
mod analytics;
mod circuit_breaker;
mod config;
mod engine;
mod intake;
mod jurisdiction;
mod legal_text;
mod metrics;
mod models;
mod publisher;
mod response_cache;

use std::sync::Arc;
use tokio::sync::watch;
use tokio::signal;
use tracing::{info, warn, error};
use tracing_subscriber::{EnvFilter, fmt};

use crate::ai::backend::HttpChatBackend;
use crate::ai::processor::LegalTextProcessor;
use crate::analytics::trends::TrendAnalyzer;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::Config;
use crate::engine::{Engine, EngineResult};
use crate::jurisdiction::rules::RuleBook;
use crate::metrics::MetricsCollector;
use crate::publisher::RedisPublisher;
use crate::response_cache::ResponseCache;

fn print_banner() {
    let banner = r#"

    ╔══════════════════════════════════════════════════════════════════╗
    ║                                                                  ║
    ║         ⚖  C O U R T V I S I O N   P R O   E N G I N E  ⚖        ║
    ║                                                                  ║
    ║   Ranking:    Jurisdiction filter + local emphasis               ║
    ║   AI:         Chat completions behind a breaker and a cache      ║
    ║   Analytics:  Outcomes, trends, TF-IDF baselines                 ║
    ║   Transport:  Redis list in, Redis pub/sub + keys out            ║
    ║                                                                  ║
    ║   "Local law first. Everything else, weighed."                   ║
    ║                                                                  ║
    ╚══════════════════════════════════════════════════════════════════╝

    "#;
    println!("{}", banner);
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .init();

    print_banner();

    info!("⚖ CourtVision engine initializing...");

    let config = Arc::new(Config::from_env());
    info!("✅ Configuration loaded: redis_url={}", config.redis_url);

    let rules = RuleBook::load(config.court_rules_path.as_deref())?;
    info!("✅ Court rules loaded");

    let metrics_collector = Arc::new(MetricsCollector::new());

    // AI façade: one breaker and one cache for the chat service
    let chat_breaker = CircuitBreaker::new(
        "chat",
        config.circuit_breaker_max_errors,
        config.circuit_breaker_cooldown,
    );
    let ai_cache = ResponseCache::new(config.ai_cache_capacity, config.ai_cache_ttl);
    metrics_collector.watch_breaker(chat_breaker.clone());
    metrics_collector.watch_cache(ai_cache.clone());

    if config.chat_api_key.is_empty() {
        warn!("COURTVISION_CHAT_API_KEY is empty — chat requests go out unauthenticated");
    }
    let backend = HttpChatBackend::new(
        &config.chat_endpoint,
        config.chat_model.clone(),
        config.chat_api_key.clone(),
        config.chat_timeout,
    )?;
    let processor = LegalTextProcessor::new(backend, chat_breaker, ai_cache);

    let engine = Arc::new(Engine::new(
        rules,
        processor,
        TrendAnalyzer::new(config.trend_cache_ttl, config.trend_cache_capacity),
    ));
    info!("✅ Engine online");

    let (result_tx, result_rx) = crossbeam_channel::bounded::<EngineResult>(config.channel_capacity);
    info!("✅ Result channel created (capacity: {})", config.channel_capacity);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ═══════════════════════════════════════════
    // SPAWN JOB INTAKE
    // ═══════════════════════════════════════════
    let intake_breaker = CircuitBreaker::new(
        "redis-intake",
        config.circuit_breaker_max_errors,
        config.circuit_breaker_cooldown,
    );
    metrics_collector.watch_breaker(intake_breaker.clone());

    let intake_config = config.clone();
    let intake_engine = engine.clone();
    let intake_metrics = metrics_collector.clone();
    let mut intake_shutdown = shutdown_rx.clone();
    let intake_handle = tokio::spawn(async move {
        info!("📥 Job intake: ONLINE");
        intake::run(
            intake_config,
            intake_engine,
            result_tx,
            intake_metrics,
            intake_breaker,
            &mut intake_shutdown,
        )
        .await;
        info!("📥 Job intake: OFFLINE");
    });

    // ═══════════════════════════════════════════
    // SPAWN REDIS PUBLISHER
    // ═══════════════════════════════════════════
    let publisher = RedisPublisher::new(
        config.clone(),
        result_rx,
        shutdown_rx.clone(),
        metrics_collector.clone(),
    );
    let publisher_handle = tokio::spawn(async move {
        info!("📤 Redis Publisher: ONLINE");
        if let Err(e) = publisher.run().await {
            error!("📤 Redis Publisher error: {}", e);
        }
        info!("📤 Redis Publisher: OFFLINE");
    });

    // ═══════════════════════════════════════════
    // SPAWN METRICS HTTP SERVER
    // ═══════════════════════════════════════════
    let metrics_for_server = metrics_collector.clone();
    let metrics_port = config.metrics_port;
    let mut metrics_shutdown = shutdown_rx.clone();
    let metrics_handle = tokio::spawn(async move {
        metrics::run_metrics_server(metrics_for_server, metrics_port, &mut metrics_shutdown).await;
        info!("📊 Metrics server: OFFLINE");
    });

    info!("═══════════════════════════════════════════════════════");
    info!("  🟢 ALL SYSTEMS ONLINE - COURTVISION ENGINE ACTIVE");
    info!("  📥 Jobs from {} ({})", config.job_queue_key, config.redis_url);
    info!("  📤 Results on {}", config.result_channel);
    info!("  📊 Metrics at http://0.0.0.0:{}/metrics", config.metrics_port);
    info!("  ⚡ Press Ctrl+C for graceful shutdown");
    info!("═══════════════════════════════════════════════════════");

    match signal::ctrl_c().await {
        Ok(()) => {
            warn!("🛑 Shutdown signal received!");
        }
        Err(err) => {
            error!("❌ Signal listener error: {}", err);
        }
    }
    let _ = shutdown_tx.send(true);

    info!("⏳ Waiting for tasks to complete (timeout: 10s)...");
    let _ = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        async {
            let _ = tokio::join!(intake_handle, publisher_handle, metrics_handle);
        }
    ).await;

    info!("⚖ CourtVision engine: OFFLINE");
    Ok(())
}
