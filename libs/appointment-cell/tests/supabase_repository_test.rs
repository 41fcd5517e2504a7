use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::{
    AppointmentChanges, AppointmentQuery, AppointmentRepository, AppointmentStatus,
    SupabaseAppointmentRepository, TimeSlot,
};
use shared_database::{DatabaseError, SupabaseClient};
use shared_utils::test_utils::{date, TestConfig};

fn appointment_row(id: Uuid, status: &str) -> Value {
    json!({
        "id": id,
        "patient_id": Uuid::new_v4(),
        "patient_name": "Pham Thi D",
        "patient_dob": "1990-04-12",
        "patient_phone": null,
        "patient_email": "d@example.com",
        "patient_gender": null,
        "patient_address": null,
        "doctor_id": Uuid::new_v4(),
        "department_id": null,
        "schedule_id": null,
        "appointment_date": "2024-06-01",
        "time_slot": "13:30-14:30",
        "reason": null,
        "status": status,
        "cancel_reason": null,
        "cancel_requested_at": null,
        "cancel_confirmed_at": null,
        "created_at": "2024-05-28T02:00:00+00:00"
    })
}

fn repository(server: &MockServer) -> SupabaseAppointmentRepository {
    let config = TestConfig::with_supabase_url(server.uri()).to_app_config();
    SupabaseAppointmentRepository::new(Arc::new(SupabaseClient::new(&config)))
}

#[tokio::test]
async fn live_booking_lookup_filters_out_cancelled_rows() {
    let server = MockServer::start().await;
    let (patient, doctor, exclude) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", format!("eq.{}", patient)))
        .and(query_param("doctor_id", format!("eq.{}", doctor)))
        .and(query_param("time_slot", "eq.08:00-09:00"))
        .and(query_param("status", "neq.cancelled"))
        .and(query_param("id", format!("neq.{}", exclude)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let found = repository(&server)
        .find_live_booking(patient, doctor, date(2024, 6, 1), TimeSlot::Slot0800, Some(exclude))
        .await
        .unwrap();

    assert!(found.is_none());
}

#[tokio::test]
async fn list_orders_and_filters_by_status() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor)))
        .and(query_param("status", "in.(pending,confirmed)"))
        .and(query_param("order", "appointment_date.desc,time_slot.asc,created_at.asc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([appointment_row(id, "confirmed")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let rows = repository(&server)
        .list(&AppointmentQuery {
            doctor_id: Some(doctor),
            statuses: AppointmentStatus::EXPIRABLE.to_vec(),
            newest_first: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, id);
    assert_eq!(rows[0].time_slot, TimeSlot::Slot1330);
    assert_eq!(rows[0].status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn conditional_update_sends_only_changed_columns() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(query_param("status", "in.(pending,confirmed)"))
        .and(body_partial_json(json!({
            "status": "cancelled",
            "cancel_reason": "Automatically cancelled: appointment time has passed"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let changes = AppointmentChanges {
        status: Some(AppointmentStatus::Cancelled),
        cancel_reason: Some(appointment_cell::AUTO_CANCEL_REASON.to_string()),
        ..Default::default()
    };
    let updated = repository(&server)
        .update(id, &AppointmentStatus::EXPIRABLE, &changes)
        .await
        .unwrap();

    // No row matched: someone else moved it first.
    assert!(updated.is_none());
}

#[tokio::test]
async fn partial_unique_index_surfaces_as_unique_violation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_live_booking_key\""
        })))
        .mount(&server)
        .await;

    let row = appointment_cell::NewAppointment {
        patient_id: Uuid::new_v4(),
        patient_name: "Pham Thi D".to_string(),
        patient_dob: None,
        patient_phone: None,
        patient_email: None,
        patient_gender: None,
        patient_address: None,
        doctor_id: Uuid::new_v4(),
        department_id: None,
        schedule_id: None,
        appointment_date: date(2024, 6, 1),
        time_slot: TimeSlot::Slot0800,
        reason: None,
        status: AppointmentStatus::Pending,
    };

    let result = repository(&server).insert(&row).await;
    assert_matches!(result, Err(DatabaseError::UniqueViolation(_)));
}

#[tokio::test]
async fn delete_reports_whether_a_row_was_removed() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(id, "pending")])))
        .mount(&server)
        .await;

    assert!(repository(&server).delete(id).await.unwrap());
}
