use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};

use courier_api::{RecordEnvelope, now_ms};

use crate::AppState;

fn envelopes(records: &[Arc<RecordEnvelope>]) -> Response {
    let view: Vec<&RecordEnvelope> = records.iter().map(Arc::as_ref).collect();
    Json(view).into_response()
}

// --- GET /dashboard/api/messages ---

pub(crate) async fn list_messages(State(state): State<AppState>) -> Response {
    envelopes(&state.cache.snapshot())
}

// --- GET /dashboard/api/messages/topic/{topic} ---

pub(crate) async fn list_by_topic(State(state): State<AppState>, Path(topic): Path<String>) -> Response {
    envelopes(&state.cache.filter_by_topic(&topic))
}

// --- GET /dashboard/api/stats ---

pub(crate) async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.stats())
}

// --- DELETE /dashboard/api/messages ---

pub(crate) async fn clear_messages(State(state): State<AppState>) -> &'static str {
    state.cache.clear();
    "Messages cleared successfully"
}

// --- GET /dashboard/api/counters ---

pub(crate) async fn counters(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.counters.snapshot())
}

// --- GET /dashboard/api/routes ---

pub(crate) async fn routes(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.routes.as_ref().clone())
}

// --- POST /test/add-sample-messages ---

const MINUTE_MS: i64 = 60_000;

/// Fills the cache with demo envelopes without touching any broker.
pub(crate) async fn add_sample_messages(State(state): State<AppState>) -> &'static str {
    let now = now_ms();

    for i in 1..=5_i64 {
        state.cache.insert(Arc::new(RecordEnvelope::new(
            "json-purchase",
            0,
            100 + i,
            now - i * MINUTE_MS,
            Some(format!("key-{i}")),
            format!("This is sample message number {i} for testing the dashboard functionality."),
            now - i * MINUTE_MS,
        )));
    }

    for i in 1..=3_i64 {
        let user_id = 1000 + i;
        state.cache.insert(Arc::new(RecordEnvelope::new(
            "user-analytics",
            (i % 2) as i32,
            200 + i,
            now - i * MINUTE_MS / 2,
            Some(format!("user-{user_id}")),
            format!(r#"{{"event": "user_click", "user_id": {user_id}, "timestamp": {now}}}"#),
            now - (i / 2) * MINUTE_MS,
        )));
    }

    tracing::info!("added 8 sample messages to the dashboard");
    "Successfully added 8 sample messages to the dashboard"
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use courier_api::Subscription;
    use courier_engine::{ProcessingCounters, RecentRecordCache};
    use tower::ServiceExt;

    use super::*;
    use crate::router;

    fn state() -> AppState {
        AppState {
            cache: Arc::new(RecentRecordCache::new(100)),
            counters: Arc::new(ProcessingCounters::new()),
            routes: Arc::new(vec![Subscription {
                topic: "orders".into(),
                route_id: "kafka-consumer-route-orders".into(),
                group_id: "g".into(),
            }]),
        }
    }

    fn envelope(topic: &str, partition: i32, offset: i64) -> Arc<RecordEnvelope> {
        Arc::new(RecordEnvelope::new(topic, partition, offset, 1, None, "body", 2))
    }

    async fn call(state: &AppState, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router(state.clone())
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn json(state: &AppState, uri: &str) -> serde_json::Value {
        let (status, body) = call(state, Method::GET, uri).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn messages_are_listed_newest_first() {
        let state = state();
        state.cache.insert(envelope("a", 0, 1));
        state.cache.insert(envelope("b", 0, 2));

        let body = json(&state, "/dashboard/api/messages").await;

        let ids: Vec<_> = body.as_array().unwrap().iter().map(|m| m["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b-0-2", "a-0-1"]);
        assert_eq!(body[0]["producedAt"], 1);
        assert_eq!(body[0]["processedAt"], 2);
    }

    #[tokio::test]
    async fn topic_filter_and_stats() {
        let state = state();
        state.cache.insert(envelope("a", 0, 1));
        state.cache.insert(envelope("b", 1, 2));
        state.cache.insert(envelope("a", 1, 3));

        let by_topic = json(&state, "/dashboard/api/messages/topic/a").await;
        assert_eq!(by_topic.as_array().unwrap().len(), 2);

        let unknown = json(&state, "/dashboard/api/messages/topic/zzz").await;
        assert!(unknown.as_array().unwrap().is_empty());

        let stats = json(&state, "/dashboard/api/stats").await;
        assert_eq!(stats["totalMessages"], 3);
        assert_eq!(stats["topicsCount"], 2);
        assert_eq!(stats["partitionsCount"], 3);
    }

    #[tokio::test]
    async fn delete_clears_the_cache() {
        let state = state();
        state.cache.insert(envelope("a", 0, 1));

        let (status, body) = call(&state, Method::DELETE, "/dashboard/api/messages").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Messages cleared successfully");
        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn counters_and_routes_are_exposed() {
        let state = state();
        state.counters.record_processed();
        state.counters.record_error();

        let counters = json(&state, "/dashboard/api/counters").await;
        assert_eq!(counters["processed"], 1);
        assert_eq!(counters["errors"], 1);

        let routes = json(&state, "/dashboard/api/routes").await;
        assert_eq!(routes[0]["routeId"], "kafka-consumer-route-orders");
    }

    #[tokio::test]
    async fn sample_messages_fill_two_topics() {
        let state = state();

        let (status, _) = call(&state, Method::POST, "/test/add-sample-messages").await;
        assert_eq!(status, StatusCode::OK);

        let stats = state.cache.stats();
        assert_eq!(stats.total_messages, 8);
        assert_eq!(stats.topics_count, 2);
        assert_eq!(state.cache.filter_by_topic("json-purchase").len(), 5);
        assert_eq!(state.cache.snapshot()[0].id(), "user-analytics-1-203");
    }
}
