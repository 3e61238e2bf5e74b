use chrono::{Duration, Local, NaiveDate, NaiveTime, Utc};

use crate::db::queries::{self, NewAppointment};
use crate::errors::AppError;
use crate::models::{AppointmentStatus, AppointmentView};
use crate::services::notification;
use crate::services::payments::{
    is_valid_transaction_id, Customer, Customizations, PaymentRequest,
};
use crate::state::AppState;

const TX_REF_PREFIX: &str = "GRACE_";

/// A `requested` row older than this belongs to a booking request that never
/// finished and no longer holds its slot. Must exceed the provider timeout.
pub const RESERVATION_TTL_MINUTES: i64 = 15;

#[derive(Debug, PartialEq)]
pub enum BookingError {
    MissingFields,
    InvalidDoctor,
    InvalidDate(String),
    InvalidTime(String),
    DateInPast,
    SlotTaken,
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::MissingFields => write!(f, "Doctor, date and time are required"),
            BookingError::InvalidDoctor => write!(f, "Invalid doctor selection"),
            BookingError::InvalidDate(input) => {
                write!(f, "Invalid date format: {input} (expected YYYY-MM-DD)")
            }
            BookingError::InvalidTime(input) => {
                write!(f, "Invalid time format: {input} (expected HH:MM)")
            }
            BookingError::DateInPast => write!(f, "Appointment date must be in the future"),
            BookingError::SlotTaken => write!(f, "This time slot is already booked"),
        }
    }
}

/// A validated (doctor, date, time) triple.
#[derive(Debug, PartialEq)]
pub struct Slot {
    pub doctor_id: i64,
    pub date: NaiveDate,
    pub time: String,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

pub fn validate_slot(
    doctor_id: Option<&str>,
    date: Option<&str>,
    time: Option<&str>,
    today: NaiveDate,
) -> Result<Slot, BookingError> {
    let (Some(doctor_id), Some(date), Some(time)) = (present(doctor_id), present(date), present(time))
    else {
        return Err(BookingError::MissingFields);
    };

    let doctor_id: i64 = doctor_id.parse().map_err(|_| BookingError::InvalidDoctor)?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| BookingError::InvalidDate(date.to_string()))?;
    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| BookingError::InvalidTime(time.to_string()))?;

    if date < today {
        return Err(BookingError::DateInPast);
    }

    Ok(Slot {
        doctor_id,
        date,
        time: time.format("%H:%M").to_string(),
    })
}

/// `GRACE_{appointment_id}_{nonce}`: the appointment id travels with the
/// payment so the callback can find it directly.
pub fn new_tx_ref(appointment_id: i64) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("{TX_REF_PREFIX}{appointment_id}_{}", &nonce[..8])
}

pub fn appointment_id_from_tx_ref(tx_ref: &str) -> Option<i64> {
    let rest = tx_ref.strip_prefix(TX_REF_PREFIX)?;
    let (id, nonce) = rest.split_once('_')?;
    if nonce.is_empty() {
        return None;
    }
    id.parse().ok()
}

/// Releases a `requested` reservation unless the booking reaches `pending`.
/// Runs on every early return and when the request future is dropped.
struct ReservationGuard<'a> {
    state: &'a AppState,
    appointment_id: i64,
    armed: bool,
}

impl<'a> ReservationGuard<'a> {
    fn new(state: &'a AppState, appointment_id: i64) -> Self {
        Self {
            state,
            appointment_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ReservationGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let released = self
            .state
            .conn()
            .map_err(anyhow::Error::from)
            .and_then(|conn| queries::discard_reservation(&conn, self.appointment_id));
        match released {
            Ok(true) => {
                tracing::info!(appointment_id = self.appointment_id, "reservation released")
            }
            Ok(false) => {}
            Err(e) => tracing::error!(
                error = %e,
                appointment_id = self.appointment_id,
                "failed to release reservation, it expires on its own"
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct BookingInput {
    pub doctor_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug)]
pub struct BookingConfirmation {
    pub appointment_id: i64,
    pub payment_url: String,
}

/// Reserves the slot, asks the provider for a checkout link and only then
/// exposes the appointment as `pending`. A failed or abandoned provider call
/// releases the slot again.
pub async fn book_appointment(
    state: &AppState,
    user_id: i64,
    input: BookingInput,
) -> Result<BookingConfirmation, AppError> {
    let today = Local::now().date_naive();
    let slot = validate_slot(
        input.doctor_id.as_deref(),
        input.date.as_deref(),
        input.time.as_deref(),
        today,
    )
    .map_err(|e| AppError::Validation(e.to_string()))?;
    let reason = input
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    let (user, doctor, appointment) = {
        let conn = state.conn()?;
        let user = queries::get_user(&conn, user_id)?
            .ok_or_else(|| AppError::NotFound("user".to_string()))?;
        let doctor = queries::get_doctor(&conn, slot.doctor_id)?
            .ok_or_else(|| AppError::NotFound("doctor".to_string()))?;

        let cutoff = Utc::now().naive_utc() - Duration::minutes(RESERVATION_TTL_MINUTES);
        let expired = queries::release_stale_reservations(&conn, cutoff)?;
        if expired > 0 {
            tracing::warn!(expired, "released stale reservations");
        }

        let appointment = queries::reserve_appointment(
            &conn,
            &NewAppointment {
                user_id,
                doctor_id: doctor.id,
                date: slot.date,
                time: &slot.time,
                reason,
            },
            new_tx_ref,
        )?
        .ok_or_else(|| AppError::Conflict(BookingError::SlotTaken.to_string()))?;
        (user, doctor, appointment)
    };
    let guard = ReservationGuard::new(state, appointment.id);

    let tx_ref = appointment
        .tx_ref
        .clone()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("reservation without tx_ref")))?;
    let date_str = slot.date.format("%Y-%m-%d").to_string();

    let request = PaymentRequest {
        tx_ref: tx_ref.clone(),
        amount: state.config.appointment_fee,
        currency: state.config.payment_currency.clone(),
        redirect_url: state.config.payment_callback_url(),
        customer: Customer {
            email: user.email.clone(),
            name: user.name.clone(),
            phone_number: user.phone.clone().unwrap_or_else(|| "N/A".to_string()),
        },
        customizations: Customizations {
            title: "Graceland Hospital Appointment".to_string(),
            description: format!(
                "Appointment with {} on {} at {}",
                doctor.name, date_str, slot.time
            ),
        },
    };

    let payment_url = match state.payments.create_payment(&request).await {
        Ok(link) => link,
        Err(e) => {
            tracing::warn!(error = %e, appointment_id = appointment.id, "payment initiation failed, releasing slot");
            drop(guard);
            return Err(AppError::Payment(
                "Payment initiation failed. Please try again.".to_string(),
            ));
        }
    };

    {
        let conn = state.conn()?;
        if !queries::confirm_reservation(&conn, appointment.id)? {
            return Err(AppError::Internal(anyhow::anyhow!(
                "reservation {} left requested state during payment initiation",
                appointment.id
            )));
        }
    }
    guard.disarm();

    tracing::info!(
        appointment_id = appointment.id,
        doctor_id = doctor.id,
        date = %date_str,
        time = %slot.time,
        tx_ref = %tx_ref,
        "appointment pending payment"
    );

    Ok(BookingConfirmation {
        appointment_id: appointment.id,
        payment_url,
    })
}

/// Finalizes the appointment named by `tx_ref` after the provider confirms
/// the transaction. The callback's own status flag is not trusted.
pub async fn confirm_payment(
    state: &AppState,
    tx_ref: &str,
    transaction_id: &str,
) -> Result<AppointmentView, AppError> {
    let appointment_id = appointment_id_from_tx_ref(tx_ref)
        .ok_or_else(|| AppError::Validation("Invalid transaction reference".to_string()))?;
    if !is_valid_transaction_id(transaction_id) {
        tracing::warn!(tx_ref, transaction_id, "rejected malformed transaction id");
        return Err(AppError::Validation("Invalid transaction id".to_string()));
    }

    let verification = state
        .payments
        .verify_transaction(transaction_id)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, tx_ref, transaction_id, "payment verification call failed");
            AppError::Payment("Payment verification failed".to_string())
        })?;

    if !verification.confirms(tx_ref, state.config.appointment_fee) {
        tracing::warn!(tx_ref, transaction_id, ?verification, "payment not confirmed by provider");
        return Err(AppError::Payment("Payment verification failed".to_string()));
    }

    let no_pending = || AppError::Payment("No pending appointment found".to_string());

    let (mut appointment, user, doctor) = {
        let conn = state.conn()?;
        let appointment = queries::get_appointment(&conn, appointment_id)?
            .filter(|a| {
                a.tx_ref.as_deref() == Some(tx_ref)
                    && a.payment_status == AppointmentStatus::Pending
            })
            .ok_or_else(no_pending)?;

        queries::complete_appointment_payment(
            &conn,
            appointment.id,
            transaction_id,
            state.config.appointment_fee,
        )?
        .ok_or_else(no_pending)?;

        let user = queries::get_user(&conn, appointment.user_id)?
            .ok_or_else(|| AppError::NotFound("user".to_string()))?;
        let doctor = queries::get_doctor(&conn, appointment.doctor_id)?
            .ok_or_else(|| AppError::NotFound("doctor".to_string()))?;
        (appointment, user, doctor)
    };
    appointment.payment_status = AppointmentStatus::Completed;

    tracing::info!(appointment_id = appointment.id, transaction_id, "appointment confirmed");

    notification::send_appointment_email(
        state.mailer.as_ref(),
        &state.config.mail_default_sender,
        &user,
        &appointment,
        &doctor,
    )
    .await;

    Ok(AppointmentView::new(&appointment, &doctor.name))
}

pub fn cancel_appointment(
    state: &AppState,
    user_id: i64,
    appointment_id: i64,
) -> Result<(), AppError> {
    let conn = state.conn()?;
    let appointment = queries::get_appointment(&conn, appointment_id)?
        .filter(|a| a.user_id == user_id)
        .ok_or_else(|| AppError::NotFound("appointment".to_string()))?;

    if appointment.payment_status != AppointmentStatus::Pending
        || !queries::cancel_appointment(&conn, appointment.id, user_id)?
    {
        return Err(AppError::Validation(
            "Only appointments awaiting payment can be cancelled".to_string(),
        ));
    }

    tracing::info!(appointment_id, user_id, "appointment cancelled");
    Ok(())
}
