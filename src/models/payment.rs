use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: i64,
    pub appointment_id: i64,
    pub transaction_id: String,
    pub amount: f64,
    pub status: String,
    pub payment_date: NaiveDateTime,
}
