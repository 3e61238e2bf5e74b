use crate::models::{Appointment, Doctor, User};
use crate::services::mail::{Email, Mailer};

const SUBJECT: &str = "Graceland Hospital - Appointment Confirmation";

pub fn confirmation_email(
    user: &User,
    appointment: &Appointment,
    doctor: &Doctor,
    sender: &str,
) -> Email {
    let mut to = vec![user.email.clone()];
    if !sender.is_empty() {
        to.push(sender.to_string());
    }

    let reason = appointment.reason.as_deref().unwrap_or("Not specified");
    let text = format!(
        "Dear {name},\n\n\
         Your appointment has been confirmed with the following details:\n\n\
         Doctor: {doctor} ({specialty})\n\
         Date: {date}\n\
         Time: {time}\n\
         Reason: {reason}\n\n\
         Thank you for choosing Graceland Hospital. If you need to reschedule or cancel, \
         please contact us at least 24 hours before your appointment.\n\n\
         Best regards,\n\
         Graceland Hospital Team\n",
        name = user.name,
        doctor = doctor.name,
        specialty = doctor.specialty,
        date = appointment.date.format("%A, %B %d, %Y"),
        time = appointment.time,
    );

    Email {
        from: sender.to_string(),
        to,
        subject: SUBJECT.to_string(),
        text,
    }
}

/// Best effort: a delivery failure is logged and reported as `false`, never
/// propagated.
pub async fn send_appointment_email(
    mailer: &dyn Mailer,
    sender: &str,
    user: &User,
    appointment: &Appointment,
    doctor: &Doctor,
) -> bool {
    let email = confirmation_email(user, appointment, doctor, sender);
    match mailer.send(&email).await {
        Ok(()) => {
            tracing::info!(to = %user.email, appointment_id = appointment.id, "confirmation email sent");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, to = %user.email, "failed to send confirmation email");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: &Email) -> anyhow::Result<()> {
            anyhow::bail!("relay unreachable")
        }
    }

    fn fixtures(reason: Option<&str>) -> (User, Appointment, Doctor) {
        let created = NaiveDateTime::parse_from_str("2098-12-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let user = User {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: String::new(),
            phone: None,
            address: None,
            profile_picture: None,
            created_at: created,
        };
        let appointment = Appointment {
            id: 9,
            user_id: 1,
            doctor_id: 2,
            date: NaiveDate::from_ymd_opt(2099, 1, 1).unwrap(),
            time: "10:00".to_string(),
            reason: reason.map(str::to_string),
            payment_status: AppointmentStatus::Completed,
            tx_ref: None,
            created_at: created,
        };
        let doctor = Doctor {
            id: 2,
            name: "Dr. Jane Doe".to_string(),
            specialty: "Antenatal Care".to_string(),
            email: None,
            bio: None,
        };
        (user, appointment, doctor)
    }

    #[test]
    fn test_confirmation_email_body() {
        let (user, appointment, doctor) = fixtures(Some("Routine scan"));
        let email = confirmation_email(&user, &appointment, &doctor, "desk@graceland.com");

        assert_eq!(email.subject, SUBJECT);
        assert_eq!(email.to, vec!["ada@example.com", "desk@graceland.com"]);
        assert!(email.text.starts_with("Dear Ada,"));
        assert!(email.text.contains("Doctor: Dr. Jane Doe (Antenatal Care)"));
        assert!(email.text.contains("Date: Thursday, January 01, 2099"));
        assert!(email.text.contains("Time: 10:00"));
        assert!(email.text.contains("Reason: Routine scan"));
    }

    #[test]
    fn test_confirmation_email_without_reason_or_sender() {
        let (user, appointment, doctor) = fixtures(None);
        let email = confirmation_email(&user, &appointment, &doctor, "");

        assert_eq!(email.to, vec!["ada@example.com"]);
        assert!(email.text.contains("Reason: Not specified"));
    }

    #[tokio::test]
    async fn test_send_failure_reported_not_raised() {
        let (user, appointment, doctor) = fixtures(None);
        let sent = send_appointment_email(&FailingMailer, "", &user, &appointment, &doctor).await;
        assert!(!sent);
    }
}
