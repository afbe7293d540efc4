use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use roundtable::clock::{Clock, ManualClock};
use roundtable::config::{ProviderAccount, ProviderEndpoint, RoundtableConfig};
use roundtable::error::ProviderError;
use roundtable::persona::{AffinityTarget, Persona, PersonaId};
use roundtable::provider::{
    whole_text_stream, ChunkStream, GenerationRequest, PromptMessage, ProviderAdapter,
};
use roundtable::quota::{AccountKey, QuotaLedger};
use roundtable::router::{ProviderRouter, SkipReason};
use roundtable::store::MessageOrigin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Adapter whose behaviour per account is fixed up front.
struct ScriptedProvider {
    failing: Vec<&'static str>,
    reply: &'static str,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(reply: &'static str) -> Self {
        Self {
            failing: vec![],
            reply,
            delay: Duration::ZERO,
            calls: Mutex::new(vec![]),
        }
    }

    fn failing_on(mut self, accounts: Vec<&'static str>) -> Self {
        self.failing = accounts;
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        _request: GenerationRequest,
        account: &ProviderAccount,
    ) -> Result<ChunkStream, ProviderError> {
        self.calls.lock().unwrap().push(account.account.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.iter().any(|a| *a == account.account) {
            return Err(ProviderError::RateLimited);
        }
        Ok(whole_text_stream(self.reply, 2))
    }
}

fn config(accounts: &[(&'static str, u32)]) -> RoundtableConfig {
    RoundtableConfig::default()
        .with_endpoints(vec![ProviderEndpoint::new(
            "mock",
            "http://localhost/",
            "mock-model",
        )])
        .with_accounts(
            accounts
                .iter()
                .map(|(account, quota)| ProviderAccount::new("mock", *account, *quota))
                .collect(),
        )
}

fn persona(accounts: &[&str]) -> Persona {
    Persona::new(
        PersonaId::Analyst,
        accounts
            .iter()
            .map(|account| AffinityTarget::new("mock", *account))
            .collect(),
    )
}

fn request() -> GenerationRequest {
    GenerationRequest {
        persona: PersonaId::Analyst,
        model: None,
        messages: vec![
            PromptMessage::system("You are a data-driven analyst."),
            PromptMessage::user("Topic: city parks"),
        ],
        temperature: 0.7,
        max_tokens: 150,
    }
}

fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
    ))
}

fn router_with(
    config: &RoundtableConfig,
    clock: Arc<ManualClock>,
    provider: Arc<ScriptedProvider>,
) -> (ProviderRouter, Arc<QuotaLedger>) {
    let ledger = Arc::new(QuotaLedger::new(
        &config.accounts,
        clock,
        config.router.cooldown(),
    ));
    let router = ProviderRouter::new(config, ledger.clone()).with_adapter(provider);
    (router, ledger)
}

fn key(account: &str) -> AccountKey {
    AccountKey::new("mock", account)
}

#[tokio::test]
async fn test_fallback_skips_failed_account_while_cooling_down() {
    roundtable::init_logger();

    let config = config(&[("a1", 10), ("a2", 10)]).with_cooldown(Duration::from_secs(60));
    let clock = manual_clock();
    let provider = Arc::new(ScriptedProvider::new("Data shows parks help").failing_on(vec!["a1"]));
    let (router, ledger) = router_with(&config, clock.clone(), provider.clone());
    let analyst = persona(&["a1", "a2"]);

    let first = router.generate(&analyst, request(), "city parks", 1).await;
    assert_eq!(
        first.origin(),
        &MessageOrigin::Provider {
            provider: "mock".to_string(),
            account: "a2".to_string()
        }
    );
    assert_eq!(first.text(), "Data shows parks help");
    assert_eq!(provider.calls(), vec!["a1", "a2"]);

    let second = router.generate(&analyst, request(), "city parks", 2).await;
    assert!(!second.is_degraded());
    assert_eq!(provider.calls(), vec!["a1", "a2", "a2"]);

    let a1 = ledger.record(&key("a1")).unwrap();
    assert_eq!((a1.consumed, a1.failed, a1.in_flight), (0, 1, 0));
    let a2 = ledger.record(&key("a2")).unwrap();
    assert_eq!((a2.consumed, a2.failed, a2.in_flight), (2, 0, 0));

    // once the cool-down is over a1 is tried first again
    clock.advance(ChronoDuration::seconds(61));
    router.generate(&analyst, request(), "city parks", 3).await;
    assert_eq!(provider.calls(), vec!["a1", "a2", "a2", "a1", "a2"]);
}

#[tokio::test]
async fn test_exhausted_quota_degrades_until_utc_rollover() {
    roundtable::init_logger();

    let config = config(&[("a1", 1)]);
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 23, 58, 0).unwrap(),
    ));
    let provider = Arc::new(ScriptedProvider::new("Parks raise property values"));
    let (router, ledger) = router_with(&config, clock.clone(), provider.clone());
    let analyst = persona(&["a1"]);

    let first = router.generate(&analyst, request(), "city parks", 1).await;
    assert!(!first.is_degraded());

    let second = router.generate(&analyst, request(), "city parks", 2).await;
    assert!(second.is_degraded());
    assert_eq!(second.failure(), Some(&ProviderError::AllProvidersExhausted));
    assert_eq!(provider.calls().len(), 1);
    assert_eq!(ledger.usage_summary().total_remaining, 0);

    clock.advance(ChronoDuration::minutes(3));
    assert_eq!(clock.today().to_string(), "2025-03-02");

    let third = router.generate(&analyst, request(), "city parks", 3).await;
    assert!(!third.is_degraded());
    let record = ledger.record(&key("a1")).unwrap();
    assert_eq!(record.consumed, 1);
    assert_eq!(record.date.to_string(), "2025-03-02");
}

#[tokio::test]
async fn test_plan_is_deterministic_for_identical_ledger_state() {
    roundtable::init_logger();

    let config = config(&[("a1", 1), ("a2", 5), ("a3", 5)]);
    let provider = Arc::new(ScriptedProvider::new("ok then"));
    let (router, _) = router_with(&config, manual_clock(), provider);
    let chain = persona(&["a1", "a2", "a3"]).affinity;

    assert_eq!(router.plan(&chain), router.plan(&chain));
    assert_eq!(router.select(&chain), Some(AffinityTarget::new("mock", "a1")));

    router.generate(&persona(&["a1"]), request(), "t", 1).await;

    let plan = router.plan(&chain);
    assert_eq!(plan[0].skip, Some(SkipReason::QuotaExhausted));
    assert!(plan[1].is_ready());
    assert!(plan[2].is_ready());
    assert_eq!(plan, router.plan(&chain));
    assert_eq!(router.select(&chain), Some(AffinityTarget::new("mock", "a2")));
}

#[tokio::test]
async fn test_max_attempts_bounds_provider_calls() {
    roundtable::init_logger();

    let config = config(&[("a1", 10), ("a2", 10), ("a3", 10)])
        .with_max_attempts(2)
        .with_retry_delay(Duration::from_millis(1));
    let provider =
        Arc::new(ScriptedProvider::new("never").failing_on(vec!["a1", "a2", "a3"]));
    let (router, ledger) = router_with(&config, manual_clock(), provider.clone());

    let generation = router
        .generate(&persona(&["a1", "a2", "a3"]), request(), "t", 1)
        .await;
    assert!(generation.is_degraded());
    assert_eq!(provider.calls(), vec!["a1", "a2"]);
    assert_eq!(ledger.record(&key("a3")).unwrap().failed, 0);
}

#[tokio::test]
async fn test_slow_provider_times_out_and_counts_as_failure() {
    roundtable::init_logger();

    let config = config(&[("a1", 10)]).with_call_timeout(Duration::from_millis(50));
    let provider = Arc::new(
        ScriptedProvider::new("too late").with_delay(Duration::from_millis(500)),
    );
    let (router, ledger) = router_with(&config, manual_clock(), provider);

    let generation = router.generate(&persona(&["a1"]), request(), "t", 1).await;
    assert!(generation.is_degraded());
    let record = ledger.record(&key("a1")).unwrap();
    assert_eq!((record.consumed, record.failed, record.in_flight), (0, 1, 0));
    assert!(record.last_failure.is_some());
}

#[tokio::test]
async fn test_blank_response_counts_as_failure() {
    roundtable::init_logger();

    let config = config(&[("a1", 10), ("a2", 10)]);
    let blank = Arc::new(ScriptedProvider::new("  \n "));
    let (router, ledger) = router_with(&config, manual_clock(), blank);

    let generation = router.generate(&persona(&["a1", "a2"]), request(), "t", 1).await;
    assert!(generation.is_degraded());
    assert_eq!(ledger.usage_summary().total_failed, 2);
}

#[tokio::test]
async fn test_unregistered_provider_is_skipped_without_counting() {
    roundtable::init_logger();

    let config = config(&[("a1", 10)]);
    let ledger = Arc::new(QuotaLedger::new(
        &config.accounts,
        manual_clock(),
        config.router.cooldown(),
    ));
    let router = ProviderRouter::new(&config, ledger.clone());
    let chain = persona(&["a1"]).affinity;

    assert_eq!(router.plan(&chain)[0].skip, Some(SkipReason::NoAdapter));
    let generation = router.generate(&persona(&["a1"]), request(), "t", 1).await;
    assert!(generation.is_degraded());
    assert_eq!(ledger.usage_summary().total_requests, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_generations_never_exceed_quota() {
    roundtable::init_logger();

    let config = config(&[("a1", 3)]);
    let provider = Arc::new(
        ScriptedProvider::new("Numbers first").with_delay(Duration::from_millis(20)),
    );
    let (router, ledger) = router_with(&config, manual_clock(), provider.clone());
    let router = Arc::new(router);

    let mut tasks = Vec::new();
    for round in 0..10u32 {
        let router = router.clone();
        tasks.push(tokio::spawn(async move {
            router
                .generate(&persona(&["a1"]), request(), "t", round)
                .await
        }));
    }

    let mut answered = 0;
    for task in tasks {
        if !task.await.unwrap().is_degraded() {
            answered += 1;
        }
    }

    assert_eq!(answered, 3);
    assert_eq!(provider.calls().len(), 3);
    let record = ledger.record(&key("a1")).unwrap();
    assert_eq!((record.consumed, record.in_flight), (3, 0));
}

#[tokio::test]
async fn test_usage_summary_marks_disabled_endpoint_unavailable() {
    roundtable::init_logger();

    let config = config(&[("a1", 10)]);
    let provider = Arc::new(ScriptedProvider::new("fine"));
    let (router, _) = router_with(&config, manual_clock(), provider.clone());
    assert_eq!(router.usage_summary().provider_status.get("mock"), Some(&true));

    let disabled = config.clone().with_endpoints(vec![ProviderEndpoint::new(
        "mock",
        "http://localhost/",
        "mock-model",
    )
    .disabled()]);
    let (router, _) = router_with(&disabled, manual_clock(), provider);
    let summary = router.usage_summary();
    assert_eq!(summary.provider_status.get("mock"), Some(&false));
    assert!(summary.accounts[0].available);
}
