//! Lab Routes
//!
//! `POST /lab/register` records a reading; `GET /lab/status` averages them.

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use metrics::counter;
use reading_validator::ZipQuery;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use storage::Reading;
use tracing::info;

use crate::average::{format_two_decimals, mean_air_quality};
use crate::error::ApiError;
use crate::AppState;

/// Response for a recorded reading
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub response: String,
}

/// Record one reading
pub async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let payload = parse_payload(&headers, &body);
    let valid = state.validator.validate_register(&payload)?;

    let id = state
        .repository
        .insert(&Reading {
            zip: valid.zip,
            air_quality: valid.air_quality,
        })
        .await?;

    info!(id, zip = valid.zip, air_quality = valid.air_quality, "Reading recorded");
    counter!("airq_readings_recorded_total").increment(1);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            response: "Data recorded.".to_string(),
        }),
    ))
}

/// Average air quality for the `zip` query parameter, as a bare JSON string
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Json<String>, ApiError> {
    let result = average_for_query(&state, query.as_deref()).await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(ApiError::ZipNotFound) => "unknown_zip",
        Err(ApiError::Validation(_)) => "invalid",
        Err(_) => "error",
    };
    counter!("airq_status_requests_total", "outcome" => outcome).increment(1);

    result.map(Json)
}

async fn average_for_query(state: &AppState, query: Option<&str>) -> Result<String, ApiError> {
    let zips = query_values(query, "zip");
    // A repeated parameter is as unusable as a missing one
    let raw = match zips.as_slice() {
        [single] => Some(single.as_str()),
        _ => None,
    };

    let zip = match state.validator.parse_zip_query(raw)? {
        ZipQuery::Exact(zip) => zip,
        ZipQuery::Unmatchable => return Err(ApiError::ZipNotFound),
    };

    let samples = state.repository.find_by_zip(zip).await?;
    let mean = mean_air_quality(&samples).ok_or(ApiError::ZipNotFound)?;

    Ok(format_two_decimals(mean))
}

fn query_values(query: Option<&str>, key: &str) -> Vec<String> {
    let pairs: Vec<(String, String)> = query
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default();

    pairs
        .into_iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v)
        .collect()
}

/// Read a register body as a JSON object or a urlencoded form.
///
/// JSON is read only when the content type is JSON or absent. Anything
/// unreadable is an empty payload and fails as missing fields.
fn parse_payload(headers: &HeaderMap, body: &[u8]) -> Map<String, Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());

    match content_type.as_deref() {
        Some("application/x-www-form-urlencoded") => parse_form(body),
        None | Some("application/json") => parse_json(body),
        Some(ct) if ct.ends_with("+json") => parse_json(body),
        Some(_) => Map::new(),
    }
}

fn parse_json(body: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// A key given more than once becomes an array, which no field accepts.
fn parse_form(body: &[u8]) -> Map<String, Value> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).unwrap_or_default();

    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(&key) {
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                map.insert(key, Value::String(value));
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::create_router;
    use crate::error::ErrorBody;
    use axum::{
        body::Body,
        http::{Request, Response},
        Router,
    };
    use reading_validator::ReadingValidator;
    use serde_json::json;
    use storage::Repository;
    use tower::ServiceExt;

    async fn test_app() -> (Router, Repository) {
        let repository = Repository::in_memory().await.unwrap();
        let state = Arc::new(AppState::new(repository.clone(), ReadingValidator::default()));
        let app = create_router(state, &Settings::default()).unwrap();
        (app, repository)
    }

    async fn post_json(app: &Router, body: Value) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri("/lab/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn get(app: &Router, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response<Body>) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_register_records_reading() {
        let (app, repository) = test_app().await;

        let response = post_json(&app, json!({"zip": 97201, "airQuality": 42.5})).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: RegisterResponse = json_body(response).await;
        assert_eq!(body.response, "Data recorded.");

        let rows = repository.readings_for_zip(97201).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].air_quality, Some(42.5));
    }

    #[tokio::test]
    async fn test_register_coerces_numeric_strings() {
        let (app, repository) = test_app().await;

        let response = post_json(&app, json!({"zip": "10001", "airQuality": "12"})).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(repository.readings_for_zip(10001).await.unwrap()[0].air_quality, Some(12.0));
    }

    #[tokio::test]
    async fn test_register_missing_fields() {
        let (app, repository) = test_app().await;

        for body in [json!({}), json!({"zip": 1}), json!({"airQuality": 3})] {
            let response = post_json(&app, body).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: ErrorBody = json_body(response).await;
            assert_eq!(body.error, "zip and airQuality are required.");
        }
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_unreadable_body_is_missing_fields() {
        let (app, repository) = test_app().await;

        let request = Request::builder()
            .method("POST")
            .uri("/lab/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.error, "zip and airQuality are required.");
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_rejects_non_numeric() {
        let (app, repository) = test_app().await;

        let response = post_json(&app, json!({"zip": 1, "airQuality": "smoky"})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.error, "zip and airQuality must be numeric.");
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_accepts_form_body() {
        let (app, repository) = test_app().await;

        let request = Request::builder()
            .method("POST")
            .uri("/lab/register")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("zip=60601&airQuality=18.5"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(repository.readings_for_zip(60601).await.unwrap()[0].air_quality, Some(18.5));
    }

    #[tokio::test]
    async fn test_register_repeated_form_key_is_rejected() {
        let (app, repository) = test_app().await;

        let request = Request::builder()
            .method("POST")
            .uri("/lab/register")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("zip=1&zip=2&airQuality=3"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.error, "zip and airQuality must be numeric.");
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_ignores_json_sent_as_text() {
        let (app, repository) = test_app().await;

        let request = Request::builder()
            .method("POST")
            .uri("/lab/register")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(json!({"zip": 1, "airQuality": 2}).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.error, "zip and airQuality are required.");
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_json_content_type_variants() {
        let (app, repository) = test_app().await;

        for content_type in [Some("application/json; charset=utf-8"), Some("application/merge-patch+json"), None] {
            let mut builder = Request::builder().method("POST").uri("/lab/register");
            if let Some(ct) = content_type {
                builder = builder.header(header::CONTENT_TYPE, ct);
            }
            let request = builder
                .body(Body::from(json!({"zip": 7, "airQuality": 1}).to_string()))
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::CREATED, "{content_type:?}");
        }
        assert_eq!(repository.count().await.unwrap(), 3);
    }

    #[test]
    fn test_parse_form_collects_repeated_keys() {
        let map = parse_form(b"zip=1&zip=2&zip=3&airQuality=4");
        assert_eq!(map["zip"], json!(["1", "2", "3"]));
        assert_eq!(map["airQuality"], json!("4"));
    }

    #[tokio::test]
    async fn test_status_average() {
        let (app, repository) = test_app().await;
        repository.insert(&Reading { zip: 97201, air_quality: 10.0 }).await.unwrap();
        repository.insert(&Reading { zip: 97201, air_quality: 20.0 }).await.unwrap();

        let response = get(&app, "/lab/status?zip=97201").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = json_body(response).await;
        assert_eq!(body, json!("15.00"));
    }

    #[tokio::test]
    async fn test_status_single_reading() {
        let (app, repository) = test_app().await;
        repository.insert(&Reading { zip: 5, air_quality: 7.0 }).await.unwrap();

        let response = get(&app, "/lab/status?zip=5").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: String = json_body(response).await;
        assert_eq!(body, "7.00");
    }

    #[tokio::test]
    async fn test_status_requires_numeric_zip() {
        let (app, _) = test_app().await;

        for uri in ["/lab/status", "/lab/status?zip=", "/lab/status?zip=abc", "/lab/status?zip=1&zip=2"] {
            let response = get(&app, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body: ErrorBody = json_body(response).await;
            assert_eq!(body.error, "a zip code is required.");
        }
    }

    #[tokio::test]
    async fn test_status_unknown_zip_is_bad_request() {
        let (app, repository) = test_app().await;
        repository.insert(&Reading { zip: 1, air_quality: 1.0 }).await.unwrap();

        for uri in ["/lab/status?zip=99999", "/lab/status?zip=1.5"] {
            let response = get(&app, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body: ErrorBody = json_body(response).await;
            assert_eq!(body.error, "Zip does not exist in the database.");
        }
    }

    #[tokio::test]
    async fn test_register_then_status_sees_new_reading() {
        let (app, _) = test_app().await;

        post_json(&app, json!({"zip": 30301, "airQuality": 4})).await;
        let body: String = json_body(get(&app, "/lab/status?zip=30301").await).await;
        assert_eq!(body, "4.00");

        post_json(&app, json!({"zip": 30301, "airQuality": 5})).await;
        let body: String = json_body(get(&app, "/lab/status?zip=30301").await).await;
        assert_eq!(body, "4.50");
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal_error() {
        let (app, repository) = test_app().await;
        repository.close().await;

        let response = get(&app, "/lab/status?zip=1").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.error, "Internal server error");

        let response = post_json(&app, json!({"zip": 1, "airQuality": 2})).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.error, "Internal server error");
    }

    #[test]
    fn test_query_values() {
        assert_eq!(query_values(Some("zip=1&x=2"), "zip"), vec!["1".to_string()]);
        assert_eq!(query_values(Some("zip=1&zip=2"), "zip").len(), 2);
        assert!(query_values(None, "zip").is_empty());
    }
}
