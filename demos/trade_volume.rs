//! 统计 pump.fun 每个代币 1 分钟 / 5 分钟的买卖量
//!
//! Run with: cargo run --example trade_volume

use log::info;
use pump_stream::core::LAMPORTS_PER_SOL;
use pump_stream::{ListenerConfig, PumpStream, DEFAULT_RPC_ENDPOINT, DEFAULT_WSS_ENDPOINT};
use std::time::Duration;

const TOP_N: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ListenerConfig::trade_volume(DEFAULT_WSS_ENDPOINT, DEFAULT_RPC_ENDPOINT).with_env();
    info!("📊 Aggregating trade volume from {}", config.endpoint);

    let handle = PumpStream::new(config).subscribe()?;
    let queue = handle.queue.clone();
    let aggregator = handle.aggregator.clone();

    // trades are already recorded by the pipeline; just keep the queue drained
    let drain = tokio::spawn(async move {
        loop {
            while queue.pop().is_some() {}
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    let report = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(10));
        loop {
            ticker.tick().await;
            let snapshots = aggregator.snapshots();

            println!("\n==== top {} by 1m trades ({} tokens tracked) ====", TOP_N, snapshots.len());
            for s in snapshots.iter().take(TOP_N) {
                println!(
                    "{}  1m: {} buys / {} sells  5m: {} buys / {} sells  5m SOL: {:.3}",
                    s.mint,
                    s.short.buys,
                    s.short.sells,
                    s.long.buys,
                    s.long.sells,
                    s.long.sol_volume as f64 / LAMPORTS_PER_SOL as f64,
                );
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("⏹ Stopping...");
    drain.abort();
    report.abort();
    handle.shutdown().await?;
    Ok(())
}
