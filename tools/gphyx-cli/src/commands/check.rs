//! Check the processing service.

use gphyx_backend::{HttpBackend, TrackingBackend};
use gphyx_common::config::AppConfig;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("gPHYX Service Check");
    println!("{}", "=".repeat(50));

    let backend = HttpBackend::new(&config.backend)?;
    println!("     Service: {}", backend.base_url());
    println!("     Timeout: {} ms", config.backend.timeout_ms);

    match backend.status().await {
        Ok(status) => {
            println!("[OK] Service reachable");
            if status.initialized {
                println!("[OK] Tracker initialized");
            } else {
                println!("[WARN] Tracker not initialized (run `gphyx track` first)");
            }
        }
        Err(e) => {
            println!("[WARN] Service unreachable: {e}");
            println!();
            println!("Start the processing service or pass --backend-url.");
            return Ok(());
        }
    }

    println!();
    println!("The processing service is ready.");
    Ok(())
}
