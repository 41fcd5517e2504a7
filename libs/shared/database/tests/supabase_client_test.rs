use assert_matches::assert_matches;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::supabase::{eq, in_list};
use shared_database::{DatabaseError, SupabaseClient};

fn config(url: &str) -> AppConfig {
    AppConfig {
        supabase_url: url.to_string(),
        supabase_service_key: "service-key".to_string(),
        supabase_jwt_secret: "secret".to_string(),
        email_api_url: String::new(),
        email_api_key: String::new(),
        email_from: "clinic@example.com".to_string(),
        momo_partner_code: "MOMO".to_string(),
        momo_access_key: String::new(),
        momo_secret_key: String::new(),
        clinic_utc_offset_minutes: 420,
        auto_cancel_interval_minutes: 15,
        schedule_sweep_interval_minutes: 15,
        port: 3000,
    }
}

#[tokio::test]
async fn select_sends_service_credentials_and_filters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.pending"))
        .and(header("apikey", "service-key"))
        .and(header("authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "a1" }])))
        .expect(1)
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config(&server.uri()));
    let rows: Vec<Value> = client
        .select("appointments", &format!("status={}", eq("pending")))
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "a1");
}

#[tokio::test]
async fn insert_asks_for_representation() {
    let server = MockServer::start().await;
    let body = json!({ "doctor_id": "d1" });

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_schedules"))
        .and(header("prefer", "return=representation"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": "s1", "doctor_id": "d1" }])))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config(&server.uri()));
    let rows: Vec<Value> = client.insert("doctor_schedules", body).await.unwrap();

    assert_eq!(rows[0]["id"], "s1");
}

#[tokio::test]
async fn conditional_update_with_no_match_returns_empty() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "in.(pending,confirmed)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config(&server.uri()));
    let filter = format!("id={}&status={}", eq("a1"), in_list(["pending", "confirmed"]));
    let rows: Vec<Value> = client
        .update("appointments", &filter, json!({ "status": "cancelled" }))
        .await
        .unwrap();

    assert!(rows.is_empty());
}

#[tokio::test]
async fn unique_violation_is_classified() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_live_booking_key\""
        })))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config(&server.uri()));
    let result: Result<Vec<Value>, _> = client.insert("appointments", json!({})).await;

    assert_matches!(result, Err(DatabaseError::UniqueViolation(_)));
}

#[tokio::test]
async fn server_errors_surface_as_api_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config(&server.uri()));
    let result: Result<Vec<Value>, _> = client.select("appointments", "").await;

    assert_matches!(result, Err(DatabaseError::Api { status: 500, .. }));
}
