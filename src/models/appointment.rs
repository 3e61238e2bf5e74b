use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::comment::serialize_timestamp;

#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: i64,
    pub user_id: i64,
    pub doctor_id: i64,
    pub date: NaiveDate,
    pub time: String,
    pub reason: Option<String>,
    pub payment_status: AppointmentStatus,
    pub tx_ref: Option<String>,
    pub created_at: NaiveDateTime,
}

/// `Requested` only exists while the payment provider is being called.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Requested,
    Pending,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Requested => "requested",
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(AppointmentStatus::Requested),
            "pending" => Some(AppointmentStatus::Pending),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

/// Appointment as shown to its owner, with the doctor's name resolved.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    pub id: i64,
    pub doctor: String,
    pub date: String,
    pub time: String,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: NaiveDateTime,
}

impl AppointmentView {
    pub fn new(appointment: &Appointment, doctor_name: &str) -> Self {
        Self {
            id: appointment.id,
            doctor: doctor_name.to_string(),
            date: appointment.date.format("%Y-%m-%d").to_string(),
            time: appointment.time.clone(),
            reason: appointment.reason.clone(),
            status: appointment.payment_status,
            created_at: appointment.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            AppointmentStatus::Requested,
            AppointmentStatus::Pending,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
        ] {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_unknown_status_not_parsed() {
        assert_eq!(AppointmentStatus::parse(""), None);
        assert_eq!(AppointmentStatus::parse("Pending"), None);
        assert_eq!(AppointmentStatus::parse("paid"), None);
    }

    #[test]
    fn test_view_formats_date_and_status() {
        let appointment = Appointment {
            id: 7,
            user_id: 1,
            doctor_id: 2,
            date: NaiveDate::from_ymd_opt(2099, 1, 1).unwrap(),
            time: "10:00".to_string(),
            reason: None,
            payment_status: AppointmentStatus::Completed,
            tx_ref: Some("GRACE_7_abcd1234".to_string()),
            created_at: NaiveDateTime::parse_from_str("2098-12-01 08:30:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
        };

        let json = serde_json::to_value(AppointmentView::new(&appointment, "Dr. Jane Doe")).unwrap();
        assert_eq!(json["doctor"], "Dr. Jane Doe");
        assert_eq!(json["date"], "2099-01-01");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["created_at"], "2098-12-01 08:30:00");
    }
}
