//! Heartbeat demo - a worker that beats a few times, then crashes

use heartbeat_watchdog::{CancellationToken, Loggers, Watchdog};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let shutdown = CancellationToken::new();

    let watchdog = Watchdog::builder(Duration::from_secs(2))
        .name("Example")
        .loggers(Loggers::tracing())
        .build()?;

    let on_stop = shutdown.clone();
    watchdog.subscribe(move |w, event| {
        println!("💀 {} stopped: silent for {}ms", w.name(), event.elapsed_ms);
        on_stop.cancel();
    });

    watchdog.start(Some(shutdown.clone()))?;

    let worker = watchdog.clone();
    let work = tokio::spawn(async move {
        for counter in 0.. {
            if counter > 2 {
                return Err::<(), _>(format!("worker crashed at iteration {}", counter));
            }
            worker.beat();
            println!("{}th iteration...", counter);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Ok(())
    });

    match work.await? {
        Ok(()) => println!("✅ Worker finished"),
        Err(e) => println!("💥 {}", e),
    }

    // Wait for the watchdog to notice
    shutdown.cancelled().await;
    watchdog.stop_and_wait().await;

    println!("The end");
    Ok(())
}
