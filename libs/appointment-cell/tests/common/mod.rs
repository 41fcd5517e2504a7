#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use appointment_cell::{
    AppointmentService, AppointmentState, BookAppointmentRequest, InMemoryAppointmentRepository,
    TimeSlot,
};
use notification_cell::{NotificationEvent, NotificationPublisher};
use schedule_cell::{
    default_shift_end, default_shift_start, InMemoryScheduleRepository, Schedule,
    ScheduleFields, ScheduleRepository,
};
use shared_models::auth::{Role, User};
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{clinic_clock, TestConfig, TestUser};

/// In-memory wiring around a clock pinned to clinic wall time.
pub struct Harness {
    pub appointments: Arc<InMemoryAppointmentRepository>,
    pub schedules: Arc<InMemoryScheduleRepository>,
    pub notifier: NotificationPublisher,
    pub events: UnboundedReceiver<NotificationEvent>,
    pub clock: FixedClock,
    pub config: TestConfig,
}

impl Harness {
    pub fn at(date: NaiveDate, hour: u32, minute: u32) -> Self {
        let (notifier, events) = NotificationPublisher::channel();
        Self {
            appointments: Arc::new(InMemoryAppointmentRepository::new()),
            schedules: Arc::new(InMemoryScheduleRepository::new()),
            notifier,
            events,
            clock: clinic_clock(date, hour, minute),
            config: TestConfig::default(),
        }
    }

    pub fn service(&self) -> AppointmentService {
        AppointmentService::new(
            self.appointments.clone(),
            self.schedules.clone(),
            self.notifier.clone(),
            Arc::new(self.clock.clone()),
        )
    }

    pub fn state(&self) -> Arc<AppointmentState> {
        Arc::new(AppointmentState {
            config: self.config.to_arc(),
            appointments: self.appointments.clone(),
            schedules: self.schedules.clone(),
            notifier: self.notifier.clone(),
            clock: Arc::new(self.clock.clone()),
        })
    }

    /// Default-hours shift for the doctor on `date`.
    pub async fn shift(&self, doctor_id: Uuid, date: NaiveDate, max_patients: Option<i32>) -> Schedule {
        self.schedules
            .insert(&ScheduleFields {
                doctor_id,
                room_id: Uuid::new_v4(),
                date,
                start_time: default_shift_start(),
                end_time: default_shift_end(),
                max_patients,
                notes: None,
            })
            .await
            .unwrap()
    }

    /// Everything published so far.
    pub fn drain_events(&mut self) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn patient(id: Uuid) -> User {
    TestUser::with_id(id, Role::Patient).to_user()
}

pub fn admin() -> User {
    TestUser::admin("admin@example.com").to_user()
}

pub fn booking(doctor_id: Uuid, date: NaiveDate, slot: TimeSlot) -> BookAppointmentRequest {
    BookAppointmentRequest {
        patient_id: None,
        patient_name: "Nguyen Van A".to_string(),
        patient_dob: None,
        patient_phone: Some("0900000000".to_string()),
        patient_email: Some("patient@example.com".to_string()),
        patient_gender: None,
        patient_address: None,
        doctor_id,
        department_id: None,
        appointment_date: date,
        time_slot: slot,
        reason: Some("Checkup".to_string()),
    }
}
