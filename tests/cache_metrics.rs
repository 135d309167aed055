use std::collections::HashSet;
use std::sync::Arc;

use metrics_util::debugging::DebuggingRecorder;
use timetable::application::honeypot::{HoneypotLimiter, LockoutPolicy};
use timetable::application::otp::{FixedClock, OtpAuthenticator};
use timetable::application::purge::PurgeService;
use timetable::cache::{CacheAsideFetcher, CacheConfig, Lookup, LookupKind};
use timetable::domain::error::SourceError;
use timetable::domain::query::QueryParams;
use timetable::infra::store::MemoryStore;

async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn cache_and_purge_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let store = Arc::new(MemoryStore::new());
    let fetcher = CacheAsideFetcher::new(store.clone(), CacheConfig::default());
    let params = QueryParams::new();
    let produce = || async { Ok::<_, SourceError>(vec!["a".to_string()]) };

    // miss, then hit
    fetcher
        .fetch(Lookup::new(LookupKind::Courses, "unicam", &params), produce)
        .await
        .expect("miss");
    settle().await;
    fetcher
        .fetch(Lookup::new(LookupKind::Courses, "unicam", &params), produce)
        .await
        .expect("hit");

    // bypass while the store is down
    store.set_alive(false);
    fetcher
        .fetch(Lookup::new(LookupKind::Lessons, "unicam", &params), produce)
        .await
        .expect("bypass");
    store.set_alive(true);

    // lockout crossing and purge outcomes
    let authenticator = Arc::new(
        OtpAuthenticator::with_clock("JBSWY3DPEHPK3PXP", Arc::new(FixedClock(1_700_000_000)))
            .expect("secret"),
    );
    let limiter = HoneypotLimiter::new(store.clone(), LockoutPolicy::default());
    for _ in 0..6 {
        limiter.record_failure("1.2.3.4").await.expect("record");
    }
    let purge = PurgeService::new(store.clone(), authenticator.clone(), limiter);
    purge
        .purge("5.6.7.8", &authenticator.current_code())
        .await
        .expect("purge");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        "timetable_cache_hit_total",
        "timetable_cache_miss_total",
        "timetable_cache_bypass_total",
        "timetable_honeypot_lockout_total",
        "timetable_purge_total",
    ] {
        assert!(names.contains(expected), "missing metric {expected}");
    }
}
