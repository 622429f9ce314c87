//! Integration tests for the geocoding relay

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn reverse_lookup_forwards_coordinates() {
    let relay = start_relay(Some(TEST_API_KEY)).await;

    let res = client()
        .get(relay.url("/api/navigation/reverse?lat=51.5072&lng=-0.1276"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["endpoint"], "/geo/reverse");
    assert_eq!(
        body["params"],
        json!({"lat": "51.5072", "lon": "-0.1276", "format": "json", "key": "geo-key"})
    );
}

#[tokio::test]
async fn forward_lookup_forwards_address() {
    let relay = start_relay(Some(TEST_API_KEY)).await;

    let res = client()
        .get(relay.url("/api/navigation/forward"))
        .query(&[("address", "221B Baker Street, London")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["endpoint"], "/geo/search");
    assert_eq!(body["params"]["q"], "221B Baker Street, London");
    assert_eq!(body["params"]["limit"], "5");
    assert_eq!(body["params"]["format"], "json");
}

#[tokio::test]
async fn geocoding_works_without_internal_api_key() {
    let relay = start_relay(None).await;

    let res = client()
        .get(relay.url("/api/navigation/forward?address=Paris"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn invalid_lookups_are_bad_requests() {
    let relay = start_relay(Some(TEST_API_KEY)).await;

    for path in [
        "/api/navigation/reverse",
        "/api/navigation/reverse?lat=51.5",
        "/api/navigation/reverse?lat=north&lng=0",
        "/api/navigation/reverse?lat=95&lng=0",
        "/api/navigation/forward",
        "/api/navigation/forward?address=%20%20",
    ] {
        let res = client().get(relay.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", path);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn unreachable_geocoder_is_a_generic_500() {
    let relay = start_relay_with_dead_upstream().await;

    let res = client()
        .get(relay.url("/api/navigation/reverse?lat=0&lng=0"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
