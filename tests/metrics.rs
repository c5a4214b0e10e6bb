// tests/metrics.rs
//
// One recorder per process, so this file holds a single test.

mod common;

use axum::body::{self, Body};
use http::{Request, StatusCode};
use tower::ServiceExt;

use bili_push::config::PushRule;
use bili_push::metrics::Metrics;
use common::*;

#[tokio::test]
async fn metrics_endpoint_contains_push_series() {
    let metrics = Metrics::init().expect("install recorder");

    let feeds = MockFeeds::new();
    let transport = RecordingTransport::new();
    let engine = engine(feeds.clone(), transport);
    let cfg = config_with(vec![(1, vec![PushRule::Group(10)])]);

    feeds.fail_activity(1);
    engine.apply(fast_snapshot(&cfg));
    engine.stop();
    engine.check_with(&fast_snapshot(&cfg)).await;

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    for series in [
        "push_ticks_total",
        "push_fetch_errors_total",
        "push_last_tick_ts",
        "push_interval_secs",
        "push_watched_uids",
    ] {
        assert!(text.contains(series), "missing {series} in:\n{text}");
    }
    assert!(text.contains(r#"kind="dynamic""#));

    assert!(Metrics::init().is_err(), "second recorder must be rejected");
}
