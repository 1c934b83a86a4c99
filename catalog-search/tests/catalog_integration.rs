//! Integration tests for the catalog search engine.
//!
//! These tests drive `CatalogSearch` end to end with in-process mock sources
//! (call counters, artificial latency, scripted failures). No network calls.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use catalog_search::circuit_breaker::{CircuitBreakerConfig, CircuitState};
use catalog_search::orchestrator::dedup::jaccard_similarity;
use catalog_search::{
    CatalogConfig, CatalogSearch, FetchError, RawListing, SearchError, SourceAdapter,
    SourceSettings,
};
use serde_json::{json, Value};

struct MockSource {
    name: &'static str,
    delay: Duration,
    fail: bool,
    listings: Vec<Value>,
    calls: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockSource {
    fn new(name: &'static str, listings: Vec<Value>) -> Self {
        Self {
            name,
            delay: Duration::ZERO,
            fail: false,
            listings,
            calls: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, Vec::new())
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn with_log(mut self, log: &Arc<Mutex<Vec<String>>>) -> Self {
        self.log = Arc::clone(log);
        self
    }

    fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, _term: &str, _limit: usize) -> Result<Vec<RawListing>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .expect("log lock")
            .push(format!("start {}", self.name));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log
            .lock()
            .expect("log lock")
            .push(format!("end {}", self.name));
        if self.fail {
            return Err(FetchError::Blocked("captcha".into()));
        }
        Ok(self.listings.clone())
    }
}

fn listing(title: &str, price: Option<&str>, image: bool) -> Value {
    let slug = title.to_lowercase().replace(' ', "-");
    let mut value = json!({
        "title": title,
        "url": format!("https://shop.example.com/{slug}?utm_source=bot"),
    });
    if let Some(price) = price {
        value["price"] = json!(price);
    }
    if image {
        value["image"] = json!(format!("https://cdn.example.com/{slug}.jpg"));
    }
    value
}

fn with_priorities(mut config: CatalogConfig, priorities: &[(&str, i32)]) -> CatalogConfig {
    config.sources = priorities
        .iter()
        .map(|(name, priority)| {
            (
                name.to_string(),
                SourceSettings {
                    priority: *priority,
                    ..Default::default()
                },
            )
        })
        .collect::<BTreeMap<_, _>>();
    config
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn assert_result_invariants(records: &[catalog_search::ProductRecord], limit: usize) {
    assert!(records.len() <= limit, "more than {limit} records");
    for pair in records.windows(2) {
        assert!(pair[0].confidence_score >= pair[1].confidence_score);
    }
    for record in records {
        assert!((0.0..=1.0).contains(&record.confidence_score));
    }
    for (i, a) in records.iter().enumerate() {
        for b in &records[i + 1..] {
            assert!(
                jaccard_similarity(&a.title, &b.title) <= 0.8,
                "near-duplicates survived: {:?} / {:?}",
                a.title,
                b.title
            );
        }
    }
}

#[tokio::test]
async fn phone_case_scenario_dedups_and_ranks() {
    init_tracing();
    let source_a = MockSource::new(
        "source_a",
        vec![
            listing("iPhone 13 Case Clear", Some("$9.99"), true),
            listing("iPhone 13 Case Clear Slim", Some("$11.99"), true),
            listing("iPhone 13 Case Clear MagSafe Compatible", Some("$14.99"), true),
        ],
    );
    let source_b = MockSource::new(
        "source_b",
        vec![
            listing("iPhone 13 Case Clear", Some("$8.99"), true),
            json!({ "title": "Bluetooth Speaker", "price": "$20.00" }),
        ],
    );
    let config = with_priorities(
        CatalogConfig::default(),
        &[("source_a", 1), ("source_b", 2)],
    );
    let catalog = CatalogSearch::builder(config)
        .source(source_a)
        .source(source_b)
        .build()
        .expect("build");

    let records = catalog.search("phone case", 5, None).await.expect("search");

    assert_result_invariants(&records, 5);
    assert_eq!(records.len(), 4);
    let speaker = records.last().expect("non-empty");
    assert_eq!(speaker.title, "Bluetooth Speaker");
    assert!((0.1..=0.3 + 1e-9).contains(&speaker.confidence_score));
    let top = records
        .iter()
        .find(|r| r.title == "iPhone 13 Case Clear")
        .expect("kept");
    assert_eq!(top.source_name, "source_a");
    assert_eq!(top.product_url, "https://shop.example.com/iphone-13-case-clear");
}

#[tokio::test]
async fn empty_term_is_rejected_without_source_calls() {
    let source = MockSource::new("unimart", vec![listing("Lamp", None, false)]);
    let calls = source.calls();
    let catalog = CatalogSearch::builder(CatalogConfig::default())
        .source(source)
        .build()
        .expect("build");

    for term in ["", "   "] {
        let result = catalog.search(term, 5, None).await;
        assert!(matches!(result, Err(SearchError::InvalidArgument(_))));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn zero_limit_is_rejected_without_source_calls() {
    let source = MockSource::new("unimart", vec![listing("Lamp", None, false)]);
    let calls = source.calls();
    let catalog = CatalogSearch::builder(CatalogConfig::default())
        .source(source)
        .build()
        .expect("build");

    let result = catalog.search("lamp", 0, None).await;
    assert!(matches!(result, Err(SearchError::InvalidArgument(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_source_times_out_without_failing_search() {
    init_tracing();
    let slow = MockSource::new("slow", vec![listing("Desk Lamp", Some("$30"), true)])
        .with_delay(Duration::from_millis(200));
    let fast = MockSource::new("fast", vec![listing("Floor Lamp", Some("$45"), true)]);
    let config = CatalogConfig {
        timeout_per_source: 0.1,
        ..Default::default()
    };
    let catalog = CatalogSearch::builder(config)
        .source(slow)
        .source(fast)
        .build()
        .expect("build");

    let started = Instant::now();
    let records = catalog.search("lamp", 5, None).await.expect("search");
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(180), "took {elapsed:?}");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_name, "fast");

    let stats = catalog.get_stats();
    assert!(stats.sources["slow"].success_rate < 1.0);
    assert!(stats.sources["slow"].last_success.is_none());
    assert_eq!(stats.sources["slow"].attempts, 1);
    assert!(stats.sources["fast"].last_success.is_some());
}

#[tokio::test]
async fn cached_results_skip_sources() {
    let source = MockSource::new(
        "audio",
        vec![
            listing("Wireless Headphones", Some("$59"), true),
            listing("Studio Headphones Pro", Some("$129"), true),
        ],
    );
    let calls = source.calls();
    let catalog = CatalogSearch::builder(CatalogConfig::default())
        .source(source)
        .build()
        .expect("build");

    let first = catalog.search("headphones", 10, None).await.expect("first");
    let second = catalog.search("headphones", 10, None).await.expect("second");

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A different limit is a different cache entry.
    catalog.search("headphones", 1, None).await.expect("third");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cache_key_ignores_case_and_surrounding_whitespace() {
    let source = MockSource::new("audio", vec![listing("Headphones", None, false)]);
    let calls = source.calls();
    let catalog = CatalogSearch::builder(CatalogConfig::default())
        .source(source)
        .build()
        .expect("build");

    catalog.search("headphones", 10, None).await.expect("first");
    catalog.search("  HEADPHONES ", 10, None).await.expect("second");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_ttl_disables_caching() {
    let source = MockSource::new("audio", vec![listing("Headphones", None, false)]);
    let calls = source.calls();
    let config = CatalogConfig {
        cache_ttl_seconds: 0,
        ..Default::default()
    };
    let catalog = CatalogSearch::builder(config)
        .source(source)
        .build()
        .expect("build");

    catalog.search("headphones", 10, None).await.expect("first");
    catalog.search("headphones", 10, None).await.expect("second");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(catalog.get_stats().cache_entries, 0);
}

#[tokio::test]
async fn clear_cache_forces_refetch() {
    let source = MockSource::new("audio", vec![listing("Headphones", None, false)]);
    let calls = source.calls();
    let catalog = CatalogSearch::builder(CatalogConfig::default())
        .source(source)
        .build()
        .expect("build");

    catalog.search("headphones", 10, None).await.expect("first");
    catalog.clear_cache();
    catalog.search("headphones", 10, None).await.expect("second");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_searches_share_one_fetch() {
    let source = MockSource::new("audio", vec![listing("Headphones", None, false)])
        .with_delay(Duration::from_millis(50));
    let calls = source.calls();
    let catalog = Arc::new(
        CatalogSearch::builder(CatalogConfig::default())
            .source(source)
            .build()
            .expect("build"),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let catalog = Arc::clone(&catalog);
            tokio::spawn(async move { catalog.search("headphones", 10, None).await })
        })
        .collect();

    let mut lists = Vec::new();
    for handle in handles {
        lists.push(handle.await.expect("join").expect("search"));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(lists.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn all_sources_failing_returns_empty_and_lowers_success_rate() {
    let config = CatalogConfig {
        cache_ttl_seconds: 0,
        ..Default::default()
    };
    let catalog = CatalogSearch::builder(config)
        .source(MockSource::failing("temu"))
        .source(MockSource::failing("unimart"))
        .build()
        .expect("build");

    let mut previous = catalog.get_stats();
    for _ in 0..3 {
        let records = catalog.search("organizador", 5, None).await.expect("search");
        assert!(records.is_empty());

        let current = catalog.get_stats();
        for name in ["temu", "unimart"] {
            assert!(
                current.sources[name].success_rate < previous.sources[name].success_rate,
                "{name} success rate did not drop"
            );
        }
        previous = current;
    }
    assert_eq!(previous.sources["temu"].attempts, 3);
    assert_eq!(previous.sources["temu"].consecutive_failures, 3);
}

#[tokio::test]
async fn one_failing_source_does_not_hide_others() {
    let catalog = CatalogSearch::builder(CatalogConfig::default())
        .source(MockSource::failing("temu"))
        .source(MockSource::new(
            "unimart",
            vec![listing("Organizador de cocina", Some("₡5.500"), true)],
        ))
        .build()
        .expect("build");

    let records = catalog.search("organizador", 5, None).await.expect("search");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_name, "unimart");
}

#[tokio::test]
async fn per_source_cap_truncates_oversized_batches() {
    let listings = (0..10)
        .map(|i| listing(&format!("Lamp model {i}"), Some("$10"), false))
        .collect();
    let mut config = CatalogConfig::default();
    config.sources.insert(
        "lamps".into(),
        SourceSettings {
            max_products: Some(3),
            ..Default::default()
        },
    );
    let catalog = CatalogSearch::builder(config)
        .source(MockSource::new("lamps", listings))
        .build()
        .expect("build");

    let records = catalog.search("lamp", 10, None).await.expect("search");
    assert_eq!(records.len(), 3);
    assert_result_invariants(&records, 10);
}

#[tokio::test]
async fn results_never_exceed_limit() {
    let listings = (0..25)
        .map(|i| listing(&format!("Cable {i} usb"), Some("$3"), i % 2 == 0))
        .collect();
    let catalog = CatalogSearch::builder(CatalogConfig::default())
        .source(MockSource::new("cables", listings))
        .build()
        .expect("build");

    for limit in [1, 4, 7] {
        let records = catalog.search("usb cable", limit, None).await.expect("search");
        assert_eq!(records.len(), limit);
        assert_result_invariants(&records, limit);
    }
}

#[tokio::test]
async fn sequential_mode_queries_in_priority_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = MockSource::new("first", vec![listing("Lamp", None, false)])
        .with_delay(Duration::from_millis(30))
        .with_log(&log);
    let second = MockSource::new("second", vec![listing("Lamp shade", None, false)])
        .with_log(&log);
    let mut config = with_priorities(CatalogConfig::default(), &[("first", 1), ("second", 2)]);
    config.parallel_scraping = false;
    config.request_delay_ms = (1, 5);

    let catalog = CatalogSearch::builder(config)
        .source(second)
        .source(first)
        .build()
        .expect("build");
    catalog.search("lamp", 5, None).await.expect("search");

    let log = log.lock().expect("log lock").clone();
    assert_eq!(log, vec!["start first", "end first", "start second", "end second"]);
}

#[tokio::test]
async fn equal_scores_keep_source_priority_order() {
    let low = MockSource::new("low_priority", vec![listing("Mesa plegable", Some("₡20.000"), true)]);
    let high = MockSource::new("high_priority", vec![listing("Silla plegable", Some("₡12.000"), true)]);
    let config = with_priorities(
        CatalogConfig::default(),
        &[("high_priority", 1), ("low_priority", 50)],
    );
    let catalog = CatalogSearch::builder(config)
        .source(low)
        .source(high)
        .build()
        .expect("build");

    let records = catalog.search("plegable", 5, None).await.expect("search");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].confidence_score, records[1].confidence_score);
    assert_eq!(records[0].source_name, "high_priority");
}

#[tokio::test]
async fn trusted_sources_get_a_bonus() {
    let config = CatalogConfig {
        trusted_sources: vec!["pequeno_mundo".into()],
        ..Default::default()
    };
    let catalog = CatalogSearch::builder(config)
        .source(MockSource::new("aaa", vec![listing("Silla plegable", Some("₡9.000"), true)]))
        .source(MockSource::new(
            "pequeno_mundo",
            vec![listing("Mesa plegable", Some("₡9.000"), true)],
        ))
        .build()
        .expect("build");

    let records = catalog.search("plegable", 5, None).await.expect("search");
    assert_eq!(records[0].source_name, "pequeno_mundo");
    assert!(records[0].confidence_score > records[1].confidence_score);
}

#[tokio::test]
async fn explicit_subset_includes_disabled_sources() {
    let enabled = MockSource::new("enabled", vec![listing("Lamp", None, false)]);
    let disabled = MockSource::new("disabled", vec![listing("Desk lamp", None, false)]);
    let enabled_calls = enabled.calls();
    let disabled_calls = disabled.calls();
    let catalog = CatalogSearch::builder(CatalogConfig::default())
        .source(enabled)
        .source(disabled)
        .build()
        .expect("build");
    catalog.enable_source("disabled", false).expect("known source");

    let records = catalog.search("lamp", 5, None).await.expect("default");
    assert!(records.iter().all(|r| r.source_name == "enabled"));
    assert_eq!(disabled_calls.load(Ordering::SeqCst), 0);

    let subset = vec!["disabled".to_string()];
    let records = catalog.search("lamp", 5, Some(&subset)).await.expect("subset");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_name, "disabled");
    assert_eq!(disabled_calls.load(Ordering::SeqCst), 1);
    assert_eq!(enabled_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_subset_name_is_rejected() {
    let source = MockSource::new("unimart", vec![]);
    let calls = source.calls();
    let catalog = CatalogSearch::builder(CatalogConfig::default())
        .source(source)
        .build()
        .expect("build");

    let subset = vec!["unimart".to_string(), "amazon".to_string()];
    let err = catalog.search("lamp", 5, Some(&subset)).await.unwrap_err();
    assert!(err.to_string().contains("amazon"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn circuit_breaker_skips_tripped_source() {
    let source = MockSource::failing("flaky");
    let calls = source.calls();
    let config = CatalogConfig {
        cache_ttl_seconds: 0,
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 2,
            cooldown_secs: 60,
        },
        ..Default::default()
    };
    let catalog = CatalogSearch::builder(config)
        .source(source)
        .source(MockSource::new("steady", vec![listing("Lamp", None, false)]))
        .build()
        .expect("build");

    for _ in 0..4 {
        let records = catalog.search("lamp", 5, None).await.expect("search");
        assert_eq!(records.len(), 1);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let stats = catalog.get_stats();
    assert_eq!(stats.sources["flaky"].circuit, CircuitState::Open);
    assert_eq!(stats.sources["flaky"].attempts, 2);
    assert_eq!(stats.sources["steady"].circuit, CircuitState::Closed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn half_open_circuit_lets_one_search_through() {
    let source = MockSource::failing("flaky").with_delay(Duration::from_millis(50));
    let calls = source.calls();
    let config = CatalogConfig {
        cache_ttl_seconds: 0,
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown_secs: 1,
        },
        ..Default::default()
    };
    let catalog = Arc::new(
        CatalogSearch::builder(config)
            .source(source)
            .build()
            .expect("build"),
    );

    catalog.search("lamp", 5, None).await.expect("trip");
    assert_eq!(catalog.get_stats().sources["flaky"].circuit, CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let handles: Vec<_> = ["mesa", "silla", "cama", "sofa", "lampara"]
        .into_iter()
        .map(|term| {
            let catalog = Arc::clone(&catalog);
            tokio::spawn(async move { catalog.search(term, 5, None).await })
        })
        .collect();
    for handle in handles {
        let records = handle.await.expect("join").expect("search");
        assert!(records.is_empty());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2, "one trip plus one probe");
    assert_eq!(catalog.get_stats().sources["flaky"].circuit, CircuitState::Open);
}

#[tokio::test]
async fn malformed_listings_are_skipped() {
    let catalog = CatalogSearch::builder(CatalogConfig::default())
        .source(MockSource::new(
            "mixed",
            vec![
                json!("not an object"),
                json!({ "title": ["nested"], "price": "$1" }),
                listing("Lamp", Some("$12"), false),
            ],
        ))
        .build()
        .expect("build");

    let records = catalog.search("lamp", 5, None).await.expect("search");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Lamp");
}

#[tokio::test]
async fn stats_serialize_to_json() {
    let catalog = CatalogSearch::builder(CatalogConfig::default())
        .source(MockSource::new("unimart", vec![listing("Lamp", None, false)]))
        .build()
        .expect("build");
    catalog.search("lamp", 5, None).await.expect("search");

    let stats = serde_json::to_value(catalog.get_stats()).expect("serialize");
    assert_eq!(stats["total_sources"], 1);
    assert_eq!(stats["sources"]["unimart"]["circuit"], "closed");
    assert_eq!(stats["sources"]["unimart"]["attempts"], 1);
}
