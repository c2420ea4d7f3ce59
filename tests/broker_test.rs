//! End-to-end broker behaviour against a scripted inference client.
//!
//! All tests run on a paused clock so TTLs, rate-limit windows and retry
//! backoff elapse instantly and deterministically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::time::Instant;
use tokio_test::{assert_pending, assert_ready_err, task};

use kibitz::{
    Broker, BrokerBuilder, CacheConfig, ErrorKind, InferenceClient, InferenceRequest, Kibitz,
    KibitzError, RateLimitConfig, ResponseSource, Result, RetryConfig, SubmitOptions,
};

const ADVICE: &str = "Raise to 3x. Reason: AhKd is well ahead of a calling range.";

// ============================================================================
// Mock client
// ============================================================================

/// Replays scripted outcomes in order, then falls back to `ADVICE`.
///
/// Records the user prompt and clock reading of every call.
#[derive(Default)]
struct ScriptedClient {
    script: Mutex<VecDeque<Outcome>>,
    calls: AtomicU32,
    log: Mutex<Vec<(String, Instant)>>,
}

enum Outcome {
    Reply(&'static str),
    Fail(fn() -> KibitzError),
    Stall(Duration),
}

impl ScriptedClient {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_script(script: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        })
    }

    fn always(outcome: fn() -> Outcome, n: usize) -> Arc<Self> {
        Self::with_script((0..n).map(|_| outcome()).collect())
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    fn call_times(&self) -> Vec<Instant> {
        self.log.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.log.lock().unwrap().push((prompt, Instant::now()));

        let next = self.script.lock().unwrap().pop_front();
        match next {
            None => Ok(ADVICE.to_string()),
            Some(Outcome::Reply(text)) => Ok(text.to_string()),
            Some(Outcome::Fail(err)) => Err(err()),
            Some(Outcome::Stall(d)) => {
                tokio::time::sleep(d).await;
                Ok(ADVICE.to_string())
            }
        }
    }
}

fn builder(client: &Arc<ScriptedClient>) -> BrokerBuilder {
    Kibitz::builder().shared_client(client.clone())
}

fn broker(client: &Arc<ScriptedClient>) -> Broker {
    builder(client).build().unwrap()
}

fn spot(street: &str, position: &str, hand: &str) -> String {
    format!("Street: {street}\nPosition: {position}\nHand: {hand}\nBoard: Ks 7c 2d\nWhat should hero do?")
}

// ============================================================================
// Cache tiers
// ============================================================================

#[tokio::test(start_paused = true)]
async fn identical_prompt_is_served_without_a_second_call() {
    let client = ScriptedClient::new();
    let broker = broker(&client);
    let prompt = spot("flop", "BTN", "AhKd");

    let first = broker.ask(&prompt, SubmitOptions::new()).await.unwrap();
    let second = broker.ask(&prompt, SubmitOptions::new()).await.unwrap();

    assert_eq!(first.source, ResponseSource::Network);
    assert!(second.source.is_cached());
    assert_eq!(second.content, first.content);
    assert_eq!(client.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn exact_tier_serves_repeat_when_similarity_is_disabled() {
    let client = ScriptedClient::new();
    // Strictly-greater comparison: a threshold of 1.0 can never be exceeded.
    let broker = builder(&client)
        .cache(CacheConfig::new().similarity_threshold(1.0))
        .build()
        .unwrap();
    let prompt = spot("turn", "CO", "QdQc");

    broker.ask(&prompt, SubmitOptions::new()).await.unwrap();
    let reformatted = format!("  {}  ", prompt.replace('\n', " \n\t"));
    let again = broker.ask(reformatted, SubmitOptions::new()).await.unwrap();

    assert_eq!(again.source, ResponseSource::Exact);
    assert_eq!(client.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_triggers_a_new_call() {
    let client = ScriptedClient::new();
    let broker = builder(&client)
        .cache(CacheConfig::new().ttl(Duration::from_secs(10)))
        .build()
        .unwrap();
    let prompt = spot("flop", "BTN", "AhKd");

    broker.ask(&prompt, SubmitOptions::new()).await.unwrap();
    tokio::time::advance(Duration::from_secs(11)).await;
    let after = broker.ask(&prompt, SubmitOptions::new()).await.unwrap();

    assert_eq!(after.source, ResponseSource::Network);
    assert_eq!(client.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn similar_prompt_in_same_bucket_is_served_from_similarity_tier() {
    let client = ScriptedClient::new();
    let broker = broker(&client);
    let base = "Street: flop Position: BTN Hand: AhKd Board: Ks 7c 2d \
                pot is 120 and villain bets 40 into us with 900 behind";
    let near = "Street: flop Position: BTN Hand: AhKd Board: Ks 7c 2d \
                pot is 120 and villain bets 45 into us with 900 behind";

    let first = broker.ask(base, SubmitOptions::new()).await.unwrap();
    let second = broker.ask(near, SubmitOptions::new()).await.unwrap();

    assert_eq!(second.source, ResponseSource::Similarity);
    assert_eq!(second.content, first.content);
    assert_eq!(client.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn similar_prompt_in_other_bucket_goes_to_network() {
    let client = ScriptedClient::new();
    let broker = broker(&client);

    broker
        .ask(spot("flop", "BTN", "AhKd"), SubmitOptions::new())
        .await
        .unwrap();
    let other = broker
        .ask(spot("flop", "SB", "AhKd"), SubmitOptions::new())
        .await
        .unwrap();

    assert_eq!(other.source, ResponseSource::Network);
    assert_eq!(client.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn prediction_tier_reuses_advice_for_same_street_position_action() {
    let client = ScriptedClient::with_script(vec![Outcome::Reply(
        "Call. Reason: pot odds are good enough.",
    )]);
    let broker = broker(&client);

    let first = "Street: river\nPosition: BB\nHand: 9s8s\nSuggested Action: call";
    let second = "Street: River\nPosition: bb\nHand: JdTd\nBoard: As 4c 4h 2s Kd\n\
                  Villain shoves. Suggested Action: CALL";

    broker.ask(first, SubmitOptions::new()).await.unwrap();
    let predicted = broker.ask(second, SubmitOptions::new()).await.unwrap();

    assert_eq!(predicted.source, ResponseSource::Prediction);
    assert_eq!(predicted.content, "Call. Reason: pot odds are good enough.");
    assert_eq!(client.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn bypass_cache_forces_network_and_refreshes_tiers() {
    let client = ScriptedClient::with_script(vec![
        Outcome::Reply("Fold. Reason: dominated."),
        Outcome::Reply("Check. Reason: pot control with Ah."),
    ]);
    let broker = broker(&client);
    let prompt = spot("turn", "HJ", "AhJc");

    broker.ask(&prompt, SubmitOptions::new()).await.unwrap();
    let fresh = broker
        .ask(&prompt, SubmitOptions::new().bypass_cache(true))
        .await
        .unwrap();
    assert_eq!(fresh.source, ResponseSource::Network);
    assert_eq!(fresh.content, "Check. Reason: pot control with Ah.");

    let cached = broker.ask(&prompt, SubmitOptions::new()).await.unwrap();
    assert!(cached.source.is_cached());
    assert_eq!(cached.content, "Check. Reason: pot control with Ah.");
    assert_eq!(client.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn clear_cache_forces_next_request_to_network() {
    let client = ScriptedClient::new();
    let broker = broker(&client);
    let prompt = "Street: flop\nPosition: BTN\nHand: AhKd\nSuggested Action: raise";

    broker.ask(prompt, SubmitOptions::new()).await.unwrap();
    broker.clear_cache();

    let stats = broker.cache_stats();
    assert_eq!(stats.exact_count, 0);
    assert_eq!(stats.similarity_count, 0);
    assert_eq!(stats.prediction_count, 0);

    let after = broker.ask(prompt, SubmitOptions::new()).await.unwrap();
    assert_eq!(after.source, ResponseSource::Network);
    assert_eq!(client.call_count(), 2);
}

// ============================================================================
// Validation and retry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn invalid_advice_is_retried_then_reported_and_never_cached() {
    let client = ScriptedClient::always(|| Outcome::Reply("I'm not sure, it depends."), 3);
    let broker = broker(&client);
    let prompt = spot("flop", "BTN", "AhKd");

    let err = broker.ask(&prompt, SubmitOptions::new()).await.unwrap_err();

    assert!(matches!(err, KibitzError::ExhaustedRetries { attempts: 3, .. }));
    assert!(err.is_validation());
    assert_eq!(client.call_count(), 3);

    let stats = broker.cache_stats();
    assert_eq!(stats.exact_count, 0);
    assert_eq!(stats.similarity_count, 0);
    assert!(broker.cache().entry(&prompt).is_none());
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_linear_backoff() {
    let client = ScriptedClient::with_script(vec![
        Outcome::Fail(|| KibitzError::Api {
            status: 503,
            message: "overloaded".into(),
        }),
        Outcome::Fail(|| KibitzError::Http("connection reset".into())),
    ]);
    let broker = broker(&client);
    let start = Instant::now();

    let ok = broker
        .ask(spot("flop", "BTN", "AhKd"), SubmitOptions::new())
        .await
        .unwrap();

    assert_eq!(ok.source, ResponseSource::Network);
    let times = client.call_times();
    assert_eq!(times.len(), 3);
    // 1s after the first failure, 2s after the second.
    assert!(times[1] - times[0] >= Duration::from_secs(1));
    assert!(times[2] - times[1] >= Duration::from_secs(2));
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn authentication_failure_is_not_retried() {
    let client = ScriptedClient::always(|| Outcome::Fail(|| KibitzError::AuthenticationFailed), 3);
    let broker = broker(&client);

    let err = broker
        .ask(spot("flop", "BTN", "AhKd"), SubmitOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, KibitzError::AuthenticationFailed));
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(client.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn upstream_bad_request_is_not_retried() {
    let client = ScriptedClient::always(
        || Outcome::Fail(|| KibitzError::InvalidRequest("400: bad model".into())),
        3,
    );
    let broker = broker(&client);

    let err = broker
        .ask(spot("flop", "BTN", "AhKd"), SubmitOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, KibitzError::InvalidRequest(_)));
    assert_eq!(client.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_call_times_out_and_is_retried() {
    let client = ScriptedClient::with_script(vec![Outcome::Stall(Duration::from_secs(120))]);
    let broker = builder(&client)
        .request_timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let ok = broker
        .ask(spot("flop", "BTN", "AhKd"), SubmitOptions::new())
        .await
        .unwrap();

    assert_eq!(ok.content, ADVICE);
    assert_eq!(client.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn persistent_timeouts_exhaust_retries() {
    let client = ScriptedClient::always(|| Outcome::Stall(Duration::from_secs(120)), 3);
    let broker = builder(&client)
        .request_timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let err = broker
        .ask(spot("flop", "BTN", "AhKd"), SubmitOptions::new())
        .await
        .unwrap_err();

    match err {
        KibitzError::ExhaustedRetries { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, KibitzError::Timeout(d) if d == Duration::from_secs(5)));
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test(start_paused = true)]
async fn request_beyond_window_quota_waits_for_reset() {
    let client = ScriptedClient::new();
    let broker = builder(&client)
        .rate_limit(
            RateLimitConfig::new()
                .max_requests(20)
                .window(Duration::from_secs(60)),
        )
        .build()
        .unwrap();
    let start = Instant::now();

    let handles: Vec<_> = (0..21)
        .map(|i| {
            broker.submit(
                format!("Street: flop\nPosition: BTN\nHand: AhKd\nSpot #{i}"),
                SubmitOptions::new().bypass_cache(true),
            )
        })
        .collect();
    let results = join_all(handles).await;

    assert!(results.iter().all(|r| r.is_ok()));
    let times = client.call_times();
    assert_eq!(times.len(), 21);
    assert!(times[..20].iter().all(|t| *t - start < Duration::from_secs(60)));
    assert!(times[20] - start >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn rate_limit_stats_track_the_current_window() {
    let client = ScriptedClient::new();
    let broker = broker(&client);

    let idle = broker.rate_limit_stats();
    assert_eq!(idle.current_count, 0);
    assert_eq!(idle.time_to_reset, Duration::ZERO);

    broker
        .ask(spot("flop", "BTN", "AhKd"), SubmitOptions::new())
        .await
        .unwrap();

    let stats = broker.rate_limit_stats();
    assert_eq!(stats.current_count, 1);
    assert!(stats.time_to_reset > Duration::ZERO);
    assert!(stats.time_to_reset <= Duration::from_secs(60));

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(broker.rate_limit_stats().current_count, 0);
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn higher_priority_dispatched_first_then_fifo() {
    let client = ScriptedClient::new();
    let broker = broker(&client);

    // Nothing runs until this task yields, so all three are queued together.
    let a = broker.submit("spot a: fold or call?", SubmitOptions::new().priority(1));
    let b = broker.submit("spot b: fold or call?", SubmitOptions::new().priority(5));
    let c = broker.submit("spot c: fold or call?", SubmitOptions::new().priority(1));
    assert_eq!(broker.queue_len(), 3);
    assert_eq!(broker.cache_stats().queue_length, 3);

    let _ = join_all([a, b, c]).await;

    assert_eq!(
        client.prompts(),
        [
            "spot b: fold or call?",
            "spot a: fold or call?",
            "spot c: fold or call?"
        ]
    );
    assert_eq!(broker.queue_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn batches_are_bounded_by_batch_size() {
    let client = ScriptedClient::always(|| Outcome::Stall(Duration::from_secs(1)), 4);
    let broker = builder(&client).batch_size(2).build().unwrap();
    let start = Instant::now();

    let handles: Vec<_> = (0..4)
        .map(|i| broker.submit(format!("spot {i}: raise?"), SubmitOptions::new()))
        .collect();
    let results = join_all(handles).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let offsets: Vec<Duration> = client.call_times().iter().map(|t| *t - start).collect();
    assert!(offsets[0] < Duration::from_secs(1));
    assert!(offsets[1] < Duration::from_secs(1));
    assert!(offsets[2] >= Duration::from_secs(1));
    assert!(offsets[3] >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn cancelled_request_is_skipped() {
    let client = ScriptedClient::new();
    let broker = broker(&client);

    let mut cancelled = broker.submit("spot x: raise?", SubmitOptions::new());
    cancelled.cancel();
    drop(broker.submit("spot y: raise?", SubmitOptions::new()));
    let kept = broker.submit("spot z: raise?", SubmitOptions::new());

    kept.await.unwrap();

    assert!(matches!(cancelled.await, Err(KibitzError::Cancelled)));
    assert_eq!(client.prompts(), ["spot z: raise?"]);
}

#[tokio::test(start_paused = true)]
async fn handle_is_pending_until_scheduled_and_ready_once_cancelled() {
    let client = ScriptedClient::new();
    let broker = broker(&client);

    let mut queued = task::spawn(broker.submit("spot q: bet?", SubmitOptions::new()));
    assert_pending!(queued.poll());

    let mut handle = broker.submit("spot r: bet?", SubmitOptions::new());
    handle.cancel();
    let mut cancelled = task::spawn(handle);
    let err = assert_ready_err!(cancelled.poll());
    assert!(matches!(err, KibitzError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_broker_resolves_queued_requests_with_shutdown() {
    let client = ScriptedClient::new();
    let broker = broker(&client);

    let pending = broker.submit("spot: call?", SubmitOptions::new());
    drop(broker);

    assert!(matches!(pending.await, Err(KibitzError::Shutdown)));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn clones_share_queue_and_cache() {
    let client = ScriptedClient::new();
    let broker = broker(&client);
    let other = broker.clone();
    let prompt = spot("flop", "BTN", "AhKd");

    broker.ask(&prompt, SubmitOptions::new()).await.unwrap();
    let hit = other.ask(&prompt, SubmitOptions::new()).await.unwrap();

    assert!(hit.source.is_cached());
    assert_eq!(client.call_count(), 1);
}

// ============================================================================
// Input validation and construction
// ============================================================================

#[tokio::test(start_paused = true)]
async fn invalid_input_resolves_immediately() {
    let client = ScriptedClient::new();
    let broker = broker(&client);

    let empty = broker.ask("   ", SubmitOptions::new()).await.unwrap_err();
    assert!(matches!(empty, KibitzError::InvalidInput(_)));

    let hot = broker
        .ask("spot: raise?", SubmitOptions::new().temperature(2.5))
        .await
        .unwrap_err();
    assert!(matches!(hot, KibitzError::InvalidInput(_)));
    assert!(hot.is_validation());

    assert_eq!(broker.queue_len(), 0);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn request_carries_configured_defaults_and_overrides() {
    #[derive(Default)]
    struct Capture(Mutex<Vec<InferenceRequest>>);

    #[async_trait]
    impl InferenceClient for Capture {
        fn name(&self) -> &str {
            "capture"
        }
        async fn complete(&self, request: &InferenceRequest) -> Result<String> {
            self.0.lock().unwrap().push(request.clone());
            Ok(ADVICE.to_string())
        }
    }

    let capture = Arc::new(Capture::default());
    let broker = Kibitz::builder()
        .shared_client(capture.clone())
        .system_prompt("Be terse.")
        .build()
        .unwrap();

    broker
        .ask("spot 1: raise?", SubmitOptions::new())
        .await
        .unwrap();
    broker
        .ask(
            "spot 2: raise?",
            SubmitOptions::new()
                .model("gpt-4o-mini")
                .temperature(0.2)
                .max_tokens(64)
                .bypass_cache(true),
        )
        .await
        .unwrap();

    let requests = capture.0.lock().unwrap();
    assert_eq!(requests.len(), 2);

    let first = &requests[0];
    assert_eq!(first.model, "gpt-4o");
    assert_eq!(first.temperature, 0.7);
    assert_eq!(first.max_tokens, 150);
    assert_eq!(first.presence_penalty, 0.1);
    assert_eq!(first.frequency_penalty, 0.1);
    assert_eq!(first.messages[0].content, "Be terse.");
    assert_eq!(first.messages[1].content, "spot 1: raise?");

    let second = &requests[1];
    assert_eq!(second.model, "gpt-4o-mini");
    assert_eq!(second.temperature, 0.2);
    assert_eq!(second.max_tokens, 64);
}

#[tokio::test]
async fn build_requires_a_client() {
    let err = Kibitz::builder().build().err().unwrap();
    assert!(matches!(err, KibitzError::Configuration(_)));
}

#[tokio::test]
async fn build_rejects_zero_batch_size() {
    let client = ScriptedClient::new();
    let err = builder(&client).batch_size(0).build().err().unwrap();
    assert!(matches!(err, KibitzError::Configuration(_)));
}

#[tokio::test]
async fn build_rejects_zero_timeouts() {
    let client = ScriptedClient::new();
    let err = builder(&client)
        .request_timeout(Duration::ZERO)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, KibitzError::Configuration(msg) if msg.contains("request_timeout")));

    let err = builder(&client)
        .poll_interval(Duration::ZERO)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, KibitzError::Configuration(msg) if msg.contains("poll_interval")));
}

#[test]
fn build_requires_a_runtime() {
    let client = ScriptedClient::new();
    let err = builder(&client)
        .retry(RetryConfig::disabled())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, KibitzError::Configuration(_)));
}

#[tokio::test(start_paused = true)]
async fn custom_validator_and_extractor_are_used() {
    struct AcceptAnything;
    impl kibitz::ResponseValidator for AcceptAnything {
        fn validate(&self, _content: &str) -> Result<()> {
            Ok(())
        }
    }

    /// Tags every prompt with the same prediction key.
    struct OneSpot;
    impl kibitz::FeatureExtractor for OneSpot {
        fn extract(&self, _prompt: &str) -> kibitz::FeatureSet {
            kibitz::FeatureSet::default()
                .street("flop")
                .position("btn")
                .action("bet")
        }
    }

    let client = ScriptedClient::with_script(vec![Outcome::Reply("whatever you like")]);
    let broker = builder(&client)
        .response_validator(AcceptAnything)
        .feature_extractor(OneSpot)
        .build()
        .unwrap();

    let first = broker.ask("anything", SubmitOptions::new()).await.unwrap();
    assert_eq!(first.content, "whatever you like");

    let second = broker
        .ask("something else entirely", SubmitOptions::new())
        .await
        .unwrap();
    assert_eq!(second.source, ResponseSource::Prediction);
    assert_eq!(client.call_count(), 1);
}
