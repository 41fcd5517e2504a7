mod common;

use assert_matches::assert_matches;
use uuid::Uuid;

use appointment_cell::{
    AppointmentError, AppointmentStatus, TimeSlot, UpdateAppointmentRequest,
};
use notification_cell::NotificationKind;
use shared_utils::test_utils::date;

use common::{admin, booking, patient, Harness};

#[tokio::test]
async fn capacity_two_admits_two_bookings_per_slot() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let doctor = Uuid::new_v4();
    let day = date(2024, 6, 1);
    h.shift(doctor, day, Some(2)).await;

    for _ in 0..2 {
        let id = Uuid::new_v4();
        let booked = service
            .book(booking(doctor, day, TimeSlot::Slot0800), &patient(id))
            .await
            .unwrap();
        assert_eq!(booked.status, AppointmentStatus::Pending);
        assert_eq!(booked.patient_id, id);
    }

    let slots = service.available_slots(doctor, day).await.unwrap();
    assert!(!slots.contains(&TimeSlot::Slot0800));
    assert_eq!(slots.len(), TimeSlot::ALL.len() - 1);

    let third = service
        .book(booking(doctor, day, TimeSlot::Slot0800), &patient(Uuid::new_v4()))
        .await;
    assert_matches!(third, Err(AppointmentError::SlotFull(TimeSlot::Slot0800)));
}

#[tokio::test]
async fn capacity_defaults_to_one_without_max_patients() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let doctor = Uuid::new_v4();
    let day = date(2024, 6, 1);
    h.shift(doctor, day, None).await;

    service
        .book(booking(doctor, day, TimeSlot::Slot1430), &patient(Uuid::new_v4()))
        .await
        .unwrap();

    let slots = service.available_slots(doctor, day).await.unwrap();
    assert_eq!(
        slots,
        vec![
            TimeSlot::Slot0800,
            TimeSlot::Slot0900,
            TimeSlot::Slot1000,
            TimeSlot::Slot1330,
            TimeSlot::Slot1530
        ]
    );
}

#[tokio::test]
async fn no_shift_means_no_slots_and_no_booking() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let doctor = Uuid::new_v4();

    assert!(service.available_slots(doctor, date(2024, 6, 1)).await.unwrap().is_empty());

    let result = service
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot0900), &patient(Uuid::new_v4()))
        .await;
    assert_matches!(result, Err(AppointmentError::DoctorNotWorking(d)) if d == date(2024, 6, 1));
}

#[tokio::test]
async fn booking_resolves_the_shift() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let doctor = Uuid::new_v4();
    let shift = h.shift(doctor, date(2024, 6, 1), Some(3)).await;

    let booked = h
        .service()
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot1000), &patient(Uuid::new_v4()))
        .await
        .unwrap();

    assert_eq!(booked.schedule_id, Some(shift.id));
}

#[tokio::test]
async fn past_dates_are_rejected_before_anything_else() {
    let h = Harness::at(date(2024, 6, 2), 9, 0);
    let result = h
        .service()
        .book(booking(Uuid::new_v4(), date(2024, 6, 1), TimeSlot::Slot0800), &patient(Uuid::new_v4()))
        .await;

    assert_matches!(result, Err(AppointmentError::PastDate));
}

#[tokio::test]
async fn blank_patient_name_is_a_validation_error() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let mut request = booking(Uuid::new_v4(), date(2024, 6, 1), TimeSlot::Slot0800);
    request.patient_name = "   ".to_string();

    let result = h.service().book(request, &patient(Uuid::new_v4())).await;
    assert_matches!(result, Err(AppointmentError::ValidationError(_)));
}

#[tokio::test]
async fn patients_book_only_for_themselves() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let doctor = Uuid::new_v4();
    h.shift(doctor, date(2024, 6, 1), Some(2)).await;

    let mut request = booking(doctor, date(2024, 6, 1), TimeSlot::Slot0800);
    request.patient_id = Some(Uuid::new_v4());
    let result = h.service().book(request.clone(), &patient(Uuid::new_v4())).await;
    assert_matches!(result, Err(AppointmentError::Forbidden(_)));

    let booked = h.service().book(request.clone(), &admin()).await.unwrap();
    assert_eq!(Some(booked.patient_id), request.patient_id);

    request.patient_id = None;
    let result = h.service().book(request, &admin()).await;
    assert_matches!(result, Err(AppointmentError::ValidationError(_)));
}

#[tokio::test]
async fn duplicate_booking_is_rejected_until_cancelled() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let (doctor, patient_id) = (Uuid::new_v4(), Uuid::new_v4());
    let day = date(2024, 6, 1);
    h.shift(doctor, day, Some(5)).await;

    let first = service
        .book(booking(doctor, day, TimeSlot::Slot0800), &patient(patient_id))
        .await
        .unwrap();
    service.confirm(first.id).await.unwrap();

    let again = service
        .book(booking(doctor, day, TimeSlot::Slot0800), &patient(patient_id))
        .await;
    assert_matches!(
        again,
        Err(AppointmentError::DuplicateBooking(msg)) if msg.contains("time slot")
    );

    service.doctor_cancel(first.id, None).await.unwrap();

    let rebooked = service
        .book(booking(doctor, day, TimeSlot::Slot0800), &patient(patient_id))
        .await
        .unwrap();
    assert_ne!(rebooked.id, first.id);
}

#[tokio::test]
async fn pending_appointment_blocks_other_slots_that_day() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let (doctor, patient_id) = (Uuid::new_v4(), Uuid::new_v4());
    let day = date(2024, 6, 1);
    h.shift(doctor, day, Some(5)).await;

    let first = service
        .book(booking(doctor, day, TimeSlot::Slot0800), &patient(patient_id))
        .await
        .unwrap();

    let other_slot = service
        .book(booking(doctor, day, TimeSlot::Slot1330), &patient(patient_id))
        .await;
    assert_matches!(
        other_slot,
        Err(AppointmentError::DuplicateBooking(msg)) if msg.contains("pending")
    );

    // Once confirmed, only the exact slot stays blocked.
    service.confirm(first.id).await.unwrap();
    service
        .book(booking(doctor, day, TimeSlot::Slot1330), &patient(patient_id))
        .await
        .unwrap();
}

#[tokio::test]
async fn check_availability_runs_only_the_duplicate_guard() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let (doctor, patient_id) = (Uuid::new_v4(), Uuid::new_v4());
    let day = date(2024, 6, 1);

    // No shift at all still reads as available.
    let check = service
        .check_availability(patient_id, doctor, day, TimeSlot::Slot0800)
        .await
        .unwrap();
    assert!(check.available);

    h.shift(doctor, day, Some(1)).await;
    service
        .book(booking(doctor, day, TimeSlot::Slot0800), &patient(patient_id))
        .await
        .unwrap();

    let check = service
        .check_availability(patient_id, doctor, day, TimeSlot::Slot0800)
        .await
        .unwrap();
    assert!(!check.available);
    assert!(check.message.contains("time slot"));

    let stranger = service
        .check_availability(Uuid::new_v4(), doctor, day, TimeSlot::Slot0800)
        .await
        .unwrap();
    assert!(stranger.available);
}

// ==============================================================================
// RESCHEDULING
// ==============================================================================

#[tokio::test]
async fn reschedule_emits_exactly_one_notification() {
    let mut h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let doctor = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    h.shift(doctor, date(2024, 6, 1), Some(2)).await;
    let next_day = h.shift(doctor, date(2024, 6, 2), Some(2)).await;

    let booked = service
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot0800), &patient(patient_id))
        .await
        .unwrap();

    let moved = service
        .update(
            booked.id,
            UpdateAppointmentRequest {
                appointment_date: Some(date(2024, 6, 2)),
                time_slot: Some(TimeSlot::Slot0900),
                ..Default::default()
            },
            &patient(patient_id),
        )
        .await
        .unwrap();

    assert_eq!(moved.appointment_date, date(2024, 6, 2));
    assert_eq!(moved.time_slot, TimeSlot::Slot0900);
    assert_eq!(moved.schedule_id, Some(next_day.id));

    let events = h.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].kind,
        NotificationKind::Rescheduled {
            previous_date: date(2024, 6, 1),
            previous_slot: "08:00-09:00".to_string(),
        }
    );
    assert_eq!(events[0].appointment.appointment_date, date(2024, 6, 2));
    assert_eq!(events[0].appointment.time_slot, "09:00-10:00");
}

#[tokio::test]
async fn unrelated_field_updates_emit_nothing() {
    let mut h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let doctor = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    h.shift(doctor, date(2024, 6, 1), Some(2)).await;

    let booked = service
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot0800), &patient(patient_id))
        .await
        .unwrap();

    let updated = service
        .update(
            booked.id,
            UpdateAppointmentRequest {
                reason: Some("Follow-up on test results".to_string()),
                appointment_date: Some(date(2024, 6, 1)),
                time_slot: Some(TimeSlot::Slot0800),
                ..Default::default()
            },
            &patient(patient_id),
        )
        .await
        .unwrap();

    assert_eq!(updated.reason.as_deref(), Some("Follow-up on test results"));
    assert!(h.drain_events().is_empty());
}

#[tokio::test]
async fn patient_may_echo_the_current_status() {
    let mut h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let doctor = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    h.shift(doctor, date(2024, 6, 1), Some(2)).await;

    let booked = service
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot0900), &patient(patient_id))
        .await
        .unwrap();

    let updated = service
        .update(
            booked.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Pending),
                patient_phone: Some("0911111111".to_string()),
                ..Default::default()
            },
            &patient(patient_id),
        )
        .await
        .unwrap();

    assert_eq!(updated.status, AppointmentStatus::Pending);
    assert_eq!(updated.patient_phone.as_deref(), Some("0911111111"));
    assert!(h.drain_events().is_empty());
}

#[tokio::test]
async fn cancel_reason_without_a_cancellation() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let doctor = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    h.shift(doctor, date(2024, 6, 1), Some(2)).await;

    let booked = service
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot1000), &patient(patient_id))
        .await
        .unwrap();

    let on_pending = service
        .update(
            booked.id,
            UpdateAppointmentRequest {
                cancel_reason: Some("Travelling".to_string()),
                ..Default::default()
            },
            &patient(patient_id),
        )
        .await;
    assert_matches!(on_pending, Err(AppointmentError::ValidationError(_)));
    assert_eq!(service.get(booked.id).await.unwrap().cancel_reason, None);

    service.request_cancel(booked.id, None).await.unwrap();
    let amended = service
        .update(
            booked.id,
            UpdateAppointmentRequest {
                cancel_reason: Some("Travelling".to_string()),
                ..Default::default()
            },
            &patient(patient_id),
        )
        .await
        .unwrap();

    assert_eq!(amended.status, AppointmentStatus::CancelRequested);
    assert_eq!(amended.cancel_reason.as_deref(), Some("Travelling"));
}

#[tokio::test]
async fn reschedule_requires_a_shift_and_room_in_the_slot() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let doctor = Uuid::new_v4();
    h.shift(doctor, date(2024, 6, 1), Some(1)).await;

    let mine = service
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot0800), &patient(Uuid::new_v4()))
        .await
        .unwrap();
    service
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot0900), &patient(Uuid::new_v4()))
        .await
        .unwrap();

    let no_shift = service
        .update(
            mine.id,
            UpdateAppointmentRequest {
                appointment_date: Some(date(2024, 6, 3)),
                ..Default::default()
            },
            &admin(),
        )
        .await;
    assert_matches!(no_shift, Err(AppointmentError::DoctorNotWorking(_)));

    let full = service
        .update(
            mine.id,
            UpdateAppointmentRequest {
                time_slot: Some(TimeSlot::Slot0900),
                ..Default::default()
            },
            &admin(),
        )
        .await;
    assert_matches!(full, Err(AppointmentError::SlotFull(TimeSlot::Slot0900)));

    let same = service
        .update(
            mine.id,
            UpdateAppointmentRequest {
                time_slot: Some(TimeSlot::Slot1000),
                ..Default::default()
            },
            &admin(),
        )
        .await
        .unwrap();
    assert_eq!(same.time_slot, TimeSlot::Slot1000);
}

#[tokio::test]
async fn status_changes_go_through_the_state_machine() {
    let mut h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let doctor = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    h.shift(doctor, date(2024, 6, 1), Some(2)).await;

    let booked = service
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot0800), &patient(patient_id))
        .await
        .unwrap();

    let by_patient = service
        .update(
            booked.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Confirmed),
                ..Default::default()
            },
            &patient(patient_id),
        )
        .await;
    assert_matches!(by_patient, Err(AppointmentError::Forbidden(_)));

    let confirmed = service
        .update(
            booked.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Confirmed),
                ..Default::default()
            },
            &admin(),
        )
        .await
        .unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
    assert_eq!(h.drain_events()[0].kind, NotificationKind::Confirmed);

    let back_to_pending = service
        .update(
            booked.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Pending),
                ..Default::default()
            },
            &admin(),
        )
        .await;
    assert_matches!(back_to_pending, Err(AppointmentError::GuardViolation(_)));

    let completed = service
        .update(
            booked.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Completed),
                ..Default::default()
            },
            &admin(),
        )
        .await;
    assert_matches!(
        completed,
        Err(AppointmentError::InvalidTransition {
            from: AppointmentStatus::Confirmed,
            ..
        })
    );
}

#[tokio::test]
async fn cancelling_while_rescheduling_sends_only_the_cancellation() {
    let mut h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let doctor = Uuid::new_v4();
    h.shift(doctor, date(2024, 6, 1), Some(2)).await;

    let booked = service
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot0800), &patient(Uuid::new_v4()))
        .await
        .unwrap();

    let cancelled = service
        .update(
            booked.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Cancelled),
                time_slot: Some(TimeSlot::Slot1530),
                cancel_reason: Some("Doctor unavailable".to_string()),
                ..Default::default()
            },
            &admin(),
        )
        .await
        .unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.time_slot, TimeSlot::Slot0800);

    let events = h.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].kind,
        NotificationKind::Cancelled {
            reason: "Doctor unavailable".to_string()
        }
    );
}

// ==============================================================================
// READS
// ==============================================================================

#[tokio::test]
async fn listings_are_ordered() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let doctor = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    h.shift(doctor, date(2024, 6, 1), Some(3)).await;
    h.shift(doctor, date(2024, 6, 2), Some(3)).await;

    let late = service
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot1530), &patient(Uuid::new_v4()))
        .await
        .unwrap();
    let early = service
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot0800), &patient(patient_id))
        .await
        .unwrap();
    service.confirm(early.id).await.unwrap();
    let next_day = service
        .book(booking(doctor, date(2024, 6, 2), TimeSlot::Slot0900), &patient(patient_id))
        .await
        .unwrap();

    let day: Vec<_> = service
        .by_doctor_on(doctor, date(2024, 6, 1))
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(day, vec![early.id, late.id]);

    let mine: Vec<_> = service
        .by_patient(patient_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(mine, vec![next_day.id, early.id]);

    let confirmed = service.by_doctor(doctor, Some(AppointmentStatus::Confirmed)).await.unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(service.by_status(AppointmentStatus::Pending).await.unwrap().len(), 2);
    assert_eq!(service.list_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn delete_reports_missing_rows() {
    let h = Harness::at(date(2024, 5, 30), 9, 0);
    let service = h.service();
    let doctor = Uuid::new_v4();
    h.shift(doctor, date(2024, 6, 1), Some(1)).await;

    let booked = service
        .book(booking(doctor, date(2024, 6, 1), TimeSlot::Slot0800), &patient(Uuid::new_v4()))
        .await
        .unwrap();

    service.delete(booked.id).await.unwrap();
    assert_matches!(service.get(booked.id).await, Err(AppointmentError::NotFound));
    assert_matches!(service.delete(booked.id).await, Err(AppointmentError::NotFound));
}
