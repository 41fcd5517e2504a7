use chrono::NaiveDate;

use crate::models::{NotificationEvent, NotificationKind};

const CLINIC_SIGNATURE: &str = "<p>Best regards,<br><strong>E-Care Clinic</strong></p>";

pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub fn render(event: &NotificationEvent) -> RenderedEmail {
    let notice = &event.appointment;
    let greeting = format!("<h3>Hello {},</h3>", escape(&notice.patient_name));
    let date = display_date(notice.appointment_date);
    let slot = escape(&notice.time_slot);

    let (subject, body) = match &event.kind {
        NotificationKind::Confirmed => (
            "Your appointment is confirmed".to_string(),
            format!(
                "<p>Your appointment has been confirmed.</p>\
                 <ul><li>Date: <b>{}</b></li><li>Time slot: <b>{}</b></li></ul>\
                 <p>Please arrive on time. Thank you for choosing us.</p>",
                date, slot
            ),
        ),
        NotificationKind::CancellationApproved => (
            "Your cancellation request was approved".to_string(),
            format!(
                "<p>Your request to cancel the appointment on <b>{}</b> ({}) has been approved.</p>\
                 <p>You are welcome to book a new appointment at any time.</p>",
                date, slot
            ),
        ),
        NotificationKind::CancellationRejected => (
            "Your cancellation request was declined".to_string(),
            format!(
                "<p>Your request to cancel the appointment on <b>{}</b> ({}) was declined.</p>\
                 <p>The appointment remains confirmed. Please contact the clinic if you have questions.</p>",
                date, slot
            ),
        ),
        NotificationKind::Cancelled { reason } => (
            "Your appointment has been cancelled".to_string(),
            format!(
                "<p>We are sorry to inform you that your appointment has been cancelled.</p>\
                 <div style=\"background-color: #f8f9fa; padding: 15px; border-radius: 5px;\">\
                 <p><strong>Date:</strong> {}</p><p><strong>Time slot:</strong> {}</p>\
                 <p><strong>Reason:</strong> {}</p></div>\
                 <p>Please book a new appointment if you still wish to see a doctor.</p>",
                date,
                slot,
                escape(reason)
            ),
        ),
        NotificationKind::Rescheduled {
            previous_date,
            previous_slot,
        } => (
            "Your appointment has been updated".to_string(),
            format!(
                "<p>Your appointment has been rescheduled.</p>\
                 <ul><li>Previous date: <b>{}</b></li><li>Previous time slot: <b>{}</b></li>\
                 <li>New date: <b>{}</b></li><li>New time slot: <b>{}</b></li></ul>\
                 <p>If you have any questions, please contact us.</p>",
                display_date(*previous_date),
                escape(previous_slot),
                date,
                slot
            ),
        ),
    };

    RenderedEmail {
        subject,
        html: format!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">{}{}{}</div>",
            greeting, body, CLINIC_SIGNATURE
        ),
    }
}

fn display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentNotice;
    use uuid::Uuid;

    fn notice() -> AppointmentNotice {
        AppointmentNotice {
            appointment_id: Uuid::new_v4(),
            patient_name: "Lan <Nguyen>".to_string(),
            patient_email: Some("lan@example.com".to_string()),
            doctor_id: Uuid::new_v4(),
            appointment_date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            time_slot: "09:00-10:00".to_string(),
        }
    }

    #[test]
    fn reschedule_mentions_both_dates() {
        let event = NotificationEvent::new(
            NotificationKind::Rescheduled {
                previous_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                previous_slot: "08:00-09:00".to_string(),
            },
            notice(),
        );

        let email = render(&event);
        assert_eq!(email.subject, "Your appointment has been updated");
        assert!(email.html.contains("01/06/2024"));
        assert!(email.html.contains("08:00-09:00"));
        assert!(email.html.contains("02/06/2024"));
        assert!(email.html.contains("09:00-10:00"));
    }

    #[test]
    fn patient_supplied_text_is_escaped() {
        let event = NotificationEvent::new(
            NotificationKind::Cancelled {
                reason: "<script>".to_string(),
            },
            notice(),
        );

        let email = render(&event);
        assert!(email.html.contains("Lan &lt;Nguyen&gt;"));
        assert!(email.html.contains("&lt;script&gt;"));
        assert!(!email.html.contains("<script>"));
    }
}
