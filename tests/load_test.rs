//! Load testing for the caching proxy in concurrent mode.

use std::time::{Duration, Instant};

use caching_proxy::cache::MemoryStore;
use caching_proxy::config::{ProxyConfig, Scheduling};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_performance() {
    // 1. Setup a slow origin so that uncached requests are expensive
    let origin = common::start_slow_origin(Duration::from_millis(20), |target| {
        common::json_response(&format!(r#"{{"path":"{}"}}"#, target))
    })
    .await;

    // 2. Start the proxy with bounded concurrency
    let mut config = ProxyConfig::default();
    config.origin.base_url = origin.base_url();
    config.listener.scheduling = Scheduling::Concurrent;
    config.listener.max_connections = 16;
    let proxy = common::start_proxy(config, MemoryStore::new()).await;

    // 3. Run Load Test
    let concurrency = 20;
    let requests_per_task = 25;
    let distinct_paths = 5;
    let total_requests = concurrency * requests_per_task;

    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for task_id in 0..concurrency {
        let client = client.clone();
        let base = proxy.url("");
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            let mut hits = 0;
            for i in 0..requests_per_task {
                let url = format!("{}/items/{}", base, (task_id + i) % distinct_paths);
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() {
                        if res.headers().get("x-cache").is_some_and(|v| v == "HIT") {
                            hits += 1;
                        }
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            (latencies, hits)
        }));
    }

    let mut all_latencies = Vec::new();
    let mut total_hits = 0;
    for task in tasks {
        let (latencies, hits) = task.await.unwrap();
        all_latencies.extend(latencies);
        total_hits += hits;
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests, "every request should succeed");
    // Concurrent misses for the same key may each reach the origin, but once
    // an entry exists everything after it is a hit.
    assert!(origin.calls() >= distinct_paths);
    assert_eq!(total_hits + origin.calls(), total_requests);

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("Cache Hits:     {}/{}", total_hits, total_requests);
    println!("Origin Calls:   {}", origin.calls());
    println!("-------------------------\n");

    proxy.stop().await;
}
