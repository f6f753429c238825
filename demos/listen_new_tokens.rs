//! 监听 pump.fun 新币并查询 bonding curve 价格
//!
//! WSS_ENDPOINT / RPC_ENDPOINT / PUMP_PROGRAM 可通过环境变量覆盖
//!
//! Run with: cargo run --example listen_new_tokens

use log::info;
use pump_stream::{ListenerConfig, PriceOutcome, PumpEvent, PumpStream};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ListenerConfig::from_env();
    info!("🚀 Listening for new tokens on {}", config.endpoint);

    let handle = PumpStream::new(config).subscribe()?;
    let queue = handle.queue.clone();

    // 消费事件（无锁队列）
    let consumer = tokio::spawn(async move {
        loop {
            let Some(event) = queue.pop() else {
                tokio::time::sleep(Duration::from_millis(5)).await;
                continue;
            };
            match event {
                PumpEvent::TokenCreated(e) => {
                    println!("\n🪙 New token {} ({})", e.name, e.symbol);
                    println!("  mint:          {}", e.mint);
                    println!("  bonding curve: {}", e.bonding_curve);
                    println!("  creator:       {}", e.user);
                    println!("  uri:           {}", e.uri);
                    println!("  signature:     {}", e.metadata.signature);
                }
                PumpEvent::Price(p) => match p.outcome {
                    PriceOutcome::Priced { price_sol, state } => println!(
                        "💰 {} price {} SOL (complete: {})",
                        p.mint, price_sol, state.complete
                    ),
                    other => println!("💰 {} price unavailable: {:?}", p.mint, other),
                },
                PumpEvent::CurveComplete(e) => println!("🎓 {} bonding curve complete", e.mint),
                PumpEvent::Trade(_) => {}
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("⏹ Stopping...");
    consumer.abort();
    handle.shutdown().await?;
    Ok(())
}
