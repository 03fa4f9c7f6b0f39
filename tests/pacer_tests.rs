//! Pacing tests. Most run on tokio's paused clock so latencies are exact.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use companion_pool::config::PacingConfig;
use companion_pool::pacer::dispatch_paced;
use companion_pool::{BotProfile, BotState, Dispatch, Pacer, RequestPayload, ResponsePayload};

/// Echoes the request after a fixed delay.
struct FixedLatency {
    latency: Duration,
    calls: AtomicUsize,
}

impl FixedLatency {
    fn new(latency: Duration) -> Self {
        Self {
            latency,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Dispatch for FixedLatency {
    async fn dispatch(&self, request: RequestPayload) -> ResponsePayload {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        ResponsePayload {
            text: request.text,
            pattern: Some(1),
            mood: request.mood,
            affection: request.affection,
        }
    }
}

fn request(text: &str) -> RequestPayload {
    RequestPayload::new(text, &BotProfile::default(), &BotState::default())
}

const MIN: Duration = Duration::from_secs(2);
const MAX: Duration = Duration::from_secs(5);

#[tokio::test(start_paused = true)]
async fn fast_reply_lands_inside_window() {
    for latency_ms in [0u64, 5, 800, 1999, 2500, 4900] {
        let pacer = Pacer::new(FixedLatency::new(Duration::from_millis(latency_ms)), MIN, MAX);
        let start = Instant::now();
        let response = pacer.dispatch_paced(request("hallo")).await;
        let total = start.elapsed();

        assert_eq!(response.text, "hallo");
        assert!(total >= MIN, "latency {}ms -> total {:?}", latency_ms, total);
        assert!(total <= MAX, "latency {}ms -> total {:?}", latency_ms, total);
    }
}

#[tokio::test(start_paused = true)]
async fn slow_reply_is_not_delayed_further() {
    for latency in [MAX, Duration::from_secs(8)] {
        let pacer = Pacer::new(FixedLatency::new(latency), MIN, MAX);
        let start = Instant::now();
        pacer.dispatch_paced(request("langsam")).await;
        assert_eq!(start.elapsed(), latency);
    }
}

#[tokio::test(start_paused = true)]
async fn pacer_is_itself_a_dispatcher() {
    let inner = Arc::new(FixedLatency::new(Duration::from_millis(10)));
    let pacer: Box<dyn Dispatch> = Box::new(Pacer::from_config(
        inner.clone(),
        &PacingConfig {
            min_ms: 100,
            max_ms: 100,
        },
    ));

    let start = Instant::now();
    let response = pacer.dispatch(request("über trait")).await;
    assert_eq!(start.elapsed(), Duration::from_millis(100));
    assert_eq!(response.text, "über trait");
    assert_eq!(response.pattern, Some(1));
    assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn free_function_matches_pacer() {
    let inner = FixedLatency::new(Duration::from_millis(300));
    let start = Instant::now();
    dispatch_paced(&inner, request("x"), Duration::from_secs(1), Duration::from_secs(1)).await;
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[cfg(unix)]
#[tokio::test]
async fn paced_pool_reply_respects_minimum() {
    let pool = Arc::new(companion_pool::WorkerPool::create(
        companion_pool::config::WorkerCommand::new("cat", Vec::<String>::new()),
        1,
    ));
    let pacer = Pacer::new(
        pool.clone(),
        Duration::from_millis(150),
        Duration::from_millis(250),
    );

    let start = std::time::Instant::now();
    let response = pacer.dispatch_paced(request("tipp tipp")).await;
    let total = start.elapsed();

    assert_eq!(response.text, "tipp tipp");
    assert!(total >= Duration::from_millis(150), "total {:?}", total);
    assert!(total < Duration::from_secs(2), "total {:?}", total);

    pool.close();
    pool.wait().await;
}
