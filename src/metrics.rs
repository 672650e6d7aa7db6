use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{Registry, IntCounter, Encoder, TextEncoder};
use std::thread;

// Prefix metrics with `satdash_` for better namespacing.

pub static SEND_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("satdash_send_submitted", "Transfers accepted by the wallet and broadcast")
        .expect("metric")
});
pub static SEND_CONFIRMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("satdash_send_confirmed", "Transfers confirmed on chain").expect("metric")
});
pub static SEND_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("satdash_send_failed", "Transfers rejected, failed to submit, or reverted")
        .expect("metric")
});
pub static HISTORY_APPENDS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("satdash_history_appends", "Records appended to the history store")
        .expect("metric")
});
pub static HISTORY_UPDATES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("satdash_history_updates", "Status updates applied to history records")
        .expect("metric")
});
pub static HISTORY_EVICTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("satdash_history_evictions", "Records evicted past the partition cap")
        .expect("metric")
});

fn registry() -> Result<Registry> {
    let registry = Registry::new();
    registry.register(Box::new(SEND_SUBMITTED.clone()))?;
    registry.register(Box::new(SEND_CONFIRMED.clone()))?;
    registry.register(Box::new(SEND_FAILED.clone()))?;
    registry.register(Box::new(HISTORY_APPENDS.clone()))?;
    registry.register(Box::new(HISTORY_UPDATES.clone()))?;
    registry.register(Box::new(HISTORY_EVICTIONS.clone()))?;
    Ok(registry)
}

pub fn serve(cfg: crate::config::Metrics) -> Result<()> {
    let registry = registry()?;

    let bind_addr = cfg.bind.clone();
    thread::spawn(move || {
        let server = match tiny_http::Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("🔥 Could not start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        for request in server.incoming_requests() {
            let mut buffer = vec![];
            let encoder = TextEncoder::new();
            let metric_families = registry.gather();
            if encoder.encode(&metric_families, &mut buffer).is_err() {
                eprintln!("🔥 Could not encode metrics");
                continue;
            }

            let response = tiny_http::Response::from_data(buffer)
                .with_header("Content-Type: application/openmetrics-text; version=1.0.0; charset=utf-8".parse::<tiny_http::Header>().unwrap());

            let _ = request.respond(response);
        }
    });

    Ok(())
}
