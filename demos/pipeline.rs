//! Replication pipeline example.
//!
//! Feeds a stream of registration messages through a limiter keyed on the
//! sender identity. Repeats inside the window are dropped, a failed publish
//! is retried on the next delivery, and the seen state is written to a
//! temporary directory on shutdown and reloaded by a second limiter.
//!
//! Run with `RUST_LOG=stream_dedup=debug` to see skip decisions.

use std::time::Duration;
use stream_dedup::{Limiter, LimiterConfig, Metrics};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
#[error("publish failed: {0}")]
struct PublishError(&'static str);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let state_dir = tempfile::tempdir()?;
    let config = LimiterConfig::new("sender.identity", Duration::from_secs(60), "registrations")
        .with_state_dir(state_dir.path());

    println!("=== Replication Pipeline Example ===\n");
    println!("Window: 60s, key: sender.identity\n");

    let metrics = Metrics::new();
    let limiter = Limiter::builder(config.clone())
        .with_metrics_sink(std::sync::Arc::new(metrics.clone()))
        .build()?;
    let handle = limiter.start(CancellationToken::new())?;

    let messages = [
        r#"{"sender":{"identity":"node1.example.net"},"seq":1}"#,
        r#"{"sender":{"identity":"node2.example.net"},"seq":2}"#,
        r#"{"sender":{"identity":"node1.example.net"},"seq":3}"#,
        r#"{"sender":{"identity":"node3.example.net"},"seq":4}"#,
        r#"{"sender":{"identity":"node3.example.net"},"seq":5}"#,
        r#"{"seq":6}"#,
    ];

    for msg in messages {
        let result = limiter.process_and_record(msg, |msg, process| {
            if !process {
                println!("  skip     {}", msg);
                return Ok(());
            }
            if msg.contains("node3") && msg.contains("\"seq\":4") {
                println!("  failed   {}", msg);
                return Err(PublishError("broker unavailable"));
            }
            println!("  publish  {}", msg);
            Ok(())
        });

        if let Err(PublishError(reason)) = result {
            println!("           ({}; will be retried)", reason);
        }
    }

    let snapshot = metrics.snapshot();
    println!(
        "\npassed={} skipped={} errors={} tracked={}",
        snapshot.passed,
        snapshot.skipped,
        snapshot.errors,
        limiter.seen_count()
    );
    println!(
        "{} decisions, {:.0}% skipped",
        snapshot.total_decisions(),
        snapshot.skip_rate() * 100.0
    );

    handle.shutdown().await?;
    if let Some(path) = limiter.state_path() {
        println!("\nState written to {}", path.display());
    }

    println!("\nRestarting with the saved state:");
    let restarted = Limiter::builder(config).build()?;
    let handle = restarted.start(CancellationToken::new())?;
    restarted.process_and_record(messages[0], |msg, process| {
        println!("  {}  {}", if process { "publish" } else { "skip   " }, msg);
        Ok::<_, PublishError>(())
    })?;
    handle.shutdown().await?;

    println!("\n=== Example Complete ===");
    Ok(())
}
