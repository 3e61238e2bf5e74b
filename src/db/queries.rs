use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Appointment, AppointmentStatus, AppointmentView, Comment, Doctor, NewUser, Payment, User,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn now_timestamp() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
}

/// Reads a stored timestamp column, failing the row on malformed text.
fn timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// ── Users ──

const USER_COLUMNS: &str =
    "id, name, email, password_hash, phone, address, profile_picture, created_at";

fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        profile_picture: row.get(6)?,
        created_at: timestamp_column(row, 7)?,
    })
}

/// Returns `None` when the email is already registered.
pub fn insert_user(conn: &Connection, user: &NewUser) -> anyhow::Result<Option<i64>> {
    let result = conn.execute(
        "INSERT INTO users (name, email, password_hash, phone, address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.name,
            user.email,
            user.password_hash,
            user.phone,
            user.address,
            now_timestamp(),
        ],
    );

    match result {
        Ok(_) => Ok(Some(conn.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e).context("failed to insert user"),
    }
}

pub fn get_user(conn: &Connection, id: i64) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

/// Writes the mutable profile fields. Returns `false` when the new email
/// belongs to another account.
pub fn update_user(conn: &Connection, user: &User) -> anyhow::Result<bool> {
    let result = conn.execute(
        "UPDATE users SET name = ?1, email = ?2, password_hash = ?3, phone = ?4, address = ?5,
                profile_picture = ?6
         WHERE id = ?7",
        params![
            user.name,
            user.email,
            user.password_hash,
            user.phone,
            user.address,
            user.profile_picture,
            user.id,
        ],
    );

    match result {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e).context("failed to update user"),
    }
}

// ── Doctors ──

fn parse_doctor_row(row: &rusqlite::Row) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        id: row.get(0)?,
        name: row.get(1)?,
        specialty: row.get(2)?,
        email: row.get(3)?,
        bio: row.get(4)?,
    })
}

pub fn list_doctors(conn: &Connection) -> anyhow::Result<Vec<Doctor>> {
    let mut stmt =
        conn.prepare("SELECT id, name, specialty, email, bio FROM doctors ORDER BY id ASC")?;
    let rows = stmt.query_map([], parse_doctor_row)?;

    let mut doctors = vec![];
    for row in rows {
        doctors.push(row?);
    }
    Ok(doctors)
}

pub fn get_doctor(conn: &Connection, id: i64) -> anyhow::Result<Option<Doctor>> {
    let doctor = conn
        .query_row(
            "SELECT id, name, specialty, email, bio FROM doctors WHERE id = ?1",
            params![id],
            parse_doctor_row,
        )
        .optional()?;
    Ok(doctor)
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str =
    "id, user_id, doctor_id, date, time, reason, payment_status, tx_ref, created_at";

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let date_str: String = row.get(3)?;
    let status_str: String = row.get(6)?;

    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .with_context(|| format!("invalid appointment date in store: {date_str}"))?;
    let payment_status = AppointmentStatus::parse(&status_str)
        .with_context(|| format!("invalid appointment status in store: {status_str}"))?;

    Ok(Appointment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        doctor_id: row.get(2)?,
        date,
        time: row.get(4)?,
        reason: row.get(5)?,
        payment_status,
        tx_ref: row.get(7)?,
        created_at: timestamp_column(row, 8)?,
    })
}

pub struct NewAppointment<'a> {
    pub user_id: i64,
    pub doctor_id: i64,
    pub date: NaiveDate,
    pub time: &'a str,
    pub reason: Option<&'a str>,
}

/// Claims the slot with a single insert in `requested` state and stamps the
/// transaction reference built from the new row id. Returns `None` when the
/// slot is already held by a live appointment.
pub fn reserve_appointment(
    conn: &Connection,
    new: &NewAppointment<'_>,
    make_tx_ref: impl FnOnce(i64) -> String,
) -> anyhow::Result<Option<Appointment>> {
    let tx = conn.unchecked_transaction()?;

    let inserted = tx.execute(
        "INSERT INTO appointments (user_id, doctor_id, date, time, reason, payment_status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.user_id,
            new.doctor_id,
            new.date.format(DATE_FORMAT).to_string(),
            new.time,
            new.reason,
            AppointmentStatus::Requested.as_str(),
            now_timestamp(),
        ],
    );

    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => return Ok(None),
        Err(e) => return Err(e).context("failed to reserve appointment"),
    }

    let id = tx.last_insert_rowid();
    let tx_ref = make_tx_ref(id);
    tx.execute(
        "UPDATE appointments SET tx_ref = ?1 WHERE id = ?2",
        params![tx_ref, id],
    )?;
    tx.commit()?;

    get_appointment(conn, id)?
        .map(Some)
        .ok_or_else(|| anyhow::anyhow!("reserved appointment {id} vanished"))
}

/// `requested → pending` once the provider has accepted the payment.
pub fn confirm_reservation(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET payment_status = ?1 WHERE id = ?2 AND payment_status = ?3",
        params![
            AppointmentStatus::Pending.as_str(),
            id,
            AppointmentStatus::Requested.as_str(),
        ],
    )?;
    Ok(count > 0)
}

/// Drops a reservation whose payment could not be initiated.
pub fn discard_reservation(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM appointments WHERE id = ?1 AND payment_status = ?2",
        params![id, AppointmentStatus::Requested.as_str()],
    )?;
    Ok(count > 0)
}

/// Deletes `requested` reservations created before `cutoff`. These belong to
/// booking requests that never reached the provider's answer.
pub fn release_stale_reservations(
    conn: &Connection,
    cutoff: NaiveDateTime,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM appointments WHERE payment_status = ?1 AND created_at < ?2",
        params![
            AppointmentStatus::Requested.as_str(),
            cutoff.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(count)
}

pub fn get_appointment(conn: &Connection, id: i64) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
        params![id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appointment) => Ok(Some(appointment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The user's appointments, newest date first. Transient reservations are
/// left out.
pub fn get_appointments_for_user(
    conn: &Connection,
    user_id: i64,
) -> anyhow::Result<Vec<AppointmentView>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.user_id, a.doctor_id, a.date, a.time, a.reason, a.payment_status, a.tx_ref,
                a.created_at, d.name
         FROM appointments a
         JOIN doctors d ON d.id = a.doctor_id
         WHERE a.user_id = ?1 AND a.payment_status != ?2
         ORDER BY a.date DESC, a.time DESC, a.id DESC",
    )?;

    let rows = stmt.query_map(
        params![user_id, AppointmentStatus::Requested.as_str()],
        |row| {
            let doctor_name: String = row.get(9)?;
            Ok(parse_appointment_row(row).map(|a| AppointmentView::new(&a, &doctor_name)))
        },
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Marks a pending appointment completed and records its payment in one
/// transaction. Returns `None` without writing when the appointment is not
/// pending.
pub fn complete_appointment_payment(
    conn: &Connection,
    appointment_id: i64,
    transaction_id: &str,
    amount: f64,
) -> anyhow::Result<Option<Payment>> {
    let tx = conn.unchecked_transaction()?;

    let updated = tx.execute(
        "UPDATE appointments SET payment_status = ?1 WHERE id = ?2 AND payment_status = ?3",
        params![
            AppointmentStatus::Completed.as_str(),
            appointment_id,
            AppointmentStatus::Pending.as_str(),
        ],
    )?;
    if updated == 0 {
        return Ok(None);
    }

    let payment_date = now_timestamp();
    tx.execute(
        "INSERT INTO payments (appointment_id, transaction_id, amount, status, payment_date)
         VALUES (?1, ?2, ?3, 'success', ?4)",
        params![appointment_id, transaction_id, amount, payment_date],
    )
    .context("failed to record payment")?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    Ok(Some(Payment {
        id,
        appointment_id,
        transaction_id: transaction_id.to_string(),
        amount,
        status: "success".to_string(),
        payment_date: parse_timestamp(&payment_date)?,
    }))
}

/// Cancels one of the user's pending appointments, freeing its slot.
pub fn cancel_appointment(conn: &Connection, id: i64, user_id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET payment_status = ?1
         WHERE id = ?2 AND user_id = ?3 AND payment_status = ?4",
        params![
            AppointmentStatus::Cancelled.as_str(),
            id,
            user_id,
            AppointmentStatus::Pending.as_str(),
        ],
    )?;
    Ok(count > 0)
}

pub fn get_payments_for_appointment(
    conn: &Connection,
    appointment_id: i64,
) -> anyhow::Result<Vec<Payment>> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, transaction_id, amount, status, payment_date
         FROM payments WHERE appointment_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![appointment_id], |row| {
        Ok(Payment {
            id: row.get(0)?,
            appointment_id: row.get(1)?,
            transaction_id: row.get(2)?,
            amount: row.get(3)?,
            status: row.get(4)?,
            payment_date: timestamp_column(row, 5)?,
        })
    })?;

    let mut payments = vec![];
    for row in rows {
        payments.push(row?);
    }
    Ok(payments)
}

// ── Comments ──

pub fn insert_comment(
    conn: &Connection,
    name: &str,
    email: &str,
    content: &str,
) -> anyhow::Result<Comment> {
    let created_at = now_timestamp();
    conn.execute(
        "INSERT INTO comments (name, email, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![name, email, content, created_at],
    )?;

    Ok(Comment {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        email: email.to_string(),
        content: content.to_string(),
        created_at: parse_timestamp(&created_at)?,
    })
}

pub fn list_recent_comments(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Comment>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, content, created_at FROM comments
         ORDER BY created_at DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(Comment {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            content: row.get(3)?,
            created_at: timestamp_column(row, 4)?,
        })
    })?;

    let mut comments = vec![];
    for row in rows {
        comments.push(row?);
    }
    Ok(comments)
}

pub fn count_comments(conn: &Connection) -> anyhow::Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;
    Ok(count)
}

// ── Revoked Tokens ──

pub fn revoke_token(conn: &Connection, jti: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO revoked_tokens (jti, revoked_at) VALUES (?1, ?2)
         ON CONFLICT(jti) DO NOTHING",
        params![jti, now_timestamp()],
    )?;
    Ok(())
}

pub fn is_token_revoked(conn: &Connection, jti: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM revoked_tokens WHERE jti = ?1",
        params![jti],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn make_user(conn: &Connection, email: &str) -> i64 {
        insert_user(
            conn,
            &NewUser {
                name: "Ada".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                phone: None,
                address: None,
            },
        )
        .unwrap()
        .unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn reserve(conn: &Connection, user_id: i64, doctor_id: i64, time: &str) -> Option<Appointment> {
        reserve_appointment(
            conn,
            &NewAppointment {
                user_id,
                doctor_id,
                date: date("2099-01-01"),
                time,
                reason: Some("checkup"),
            },
            |id| format!("GRACE_{id}_test"),
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_email_is_rejected() {
        let conn = setup_db();
        let first = make_user(&conn, "ada@example.com");

        let dup = insert_user(
            &conn,
            &NewUser {
                name: "Impostor".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "other".to_string(),
                phone: None,
                address: None,
            },
        )
        .unwrap();
        assert!(dup.is_none());

        let original = get_user(&conn, first).unwrap().unwrap();
        assert_eq!(original.name, "Ada");
        assert_eq!(original.password_hash, "hash");
    }

    #[test]
    fn test_update_user_email_conflict() {
        let conn = setup_db();
        make_user(&conn, "ada@example.com");
        let bob = make_user(&conn, "bob@example.com");

        let mut user = get_user(&conn, bob).unwrap().unwrap();
        user.email = "ada@example.com".to_string();
        assert!(!update_user(&conn, &user).unwrap());

        user.email = "robert@example.com".to_string();
        assert!(update_user(&conn, &user).unwrap());
        assert!(get_user_by_email(&conn, "robert@example.com").unwrap().is_some());
    }

    #[test]
    fn test_seeded_doctors() {
        let conn = setup_db();
        let doctors = list_doctors(&conn).unwrap();
        assert_eq!(doctors.len(), 4);
        assert_eq!(doctors[1].id, 2);
        assert_eq!(doctors[1].specialty, "Antenatal Care");
        assert!(get_doctor(&conn, 99).unwrap().is_none());
    }

    #[test]
    fn test_slot_reserved_once() {
        let conn = setup_db();
        let user = make_user(&conn, "ada@example.com");

        let first = reserve(&conn, user, 2, "10:00").unwrap();
        assert_eq!(first.payment_status, AppointmentStatus::Requested);
        assert_eq!(first.tx_ref.as_deref(), Some(format!("GRACE_{}_test", first.id).as_str()));

        assert!(reserve(&conn, user, 2, "10:00").is_none());
        // Different doctor or time is a different slot.
        assert!(reserve(&conn, user, 3, "10:00").is_some());
        assert!(reserve(&conn, user, 2, "11:00").is_some());
    }

    #[test]
    fn test_discarded_reservation_frees_slot() {
        let conn = setup_db();
        let user = make_user(&conn, "ada@example.com");

        let appt = reserve(&conn, user, 2, "10:00").unwrap();
        assert!(discard_reservation(&conn, appt.id).unwrap());
        assert!(get_appointment(&conn, appt.id).unwrap().is_none());
        assert!(reserve(&conn, user, 2, "10:00").is_some());
    }

    #[test]
    fn test_cancelled_appointment_frees_slot() {
        let conn = setup_db();
        let user = make_user(&conn, "ada@example.com");

        let appt = reserve(&conn, user, 2, "10:00").unwrap();
        assert!(confirm_reservation(&conn, appt.id).unwrap());
        assert!(cancel_appointment(&conn, appt.id, user).unwrap());
        assert!(reserve(&conn, user, 2, "10:00").is_some());
    }

    #[test]
    fn test_cancel_requires_owner() {
        let conn = setup_db();
        let owner = make_user(&conn, "ada@example.com");
        let other = make_user(&conn, "bob@example.com");

        let appt = reserve(&conn, owner, 2, "10:00").unwrap();
        confirm_reservation(&conn, appt.id).unwrap();
        assert!(!cancel_appointment(&conn, appt.id, other).unwrap());
    }

    #[test]
    fn test_complete_payment_writes_exactly_one_payment() {
        let conn = setup_db();
        let user = make_user(&conn, "ada@example.com");
        let appt = reserve(&conn, user, 2, "10:00").unwrap();

        // Still `requested`: cannot complete.
        assert!(complete_appointment_payment(&conn, appt.id, "tx-1", 5000.0)
            .unwrap()
            .is_none());

        confirm_reservation(&conn, appt.id).unwrap();
        let payment = complete_appointment_payment(&conn, appt.id, "tx-1", 5000.0)
            .unwrap()
            .unwrap();
        assert_eq!(payment.transaction_id, "tx-1");

        // A second completion attempt is a no-op.
        assert!(complete_appointment_payment(&conn, appt.id, "tx-2", 5000.0)
            .unwrap()
            .is_none());

        let stored = get_appointment(&conn, appt.id).unwrap().unwrap();
        assert_eq!(stored.payment_status, AppointmentStatus::Completed);
        assert_eq!(get_payments_for_appointment(&conn, appt.id).unwrap().len(), 1);
    }

    #[test]
    fn test_user_appointments_hide_reservations() {
        let conn = setup_db();
        let user = make_user(&conn, "ada@example.com");

        let held = reserve(&conn, user, 2, "09:00").unwrap();
        let pending = reserve(&conn, user, 1, "10:00").unwrap();
        confirm_reservation(&conn, pending.id).unwrap();

        let views = get_appointments_for_user(&conn, user).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].id, pending.id);
        assert_eq!(views[0].doctor, "Dr. John Smith");
        assert!(views.iter().all(|v| v.id != held.id));
    }

    #[test]
    fn test_comments_newest_first_and_capped() {
        let conn = setup_db();
        for i in 0..55 {
            insert_comment(&conn, "Ada", "ada@example.com", &format!("comment {i}")).unwrap();
        }

        let comments = list_recent_comments(&conn, 50).unwrap();
        assert_eq!(comments.len(), 50);
        assert_eq!(comments[0].content, "comment 54");
        assert_eq!(count_comments(&conn).unwrap(), 55);
    }

    #[test]
    fn test_stale_reservations_released() {
        let conn = setup_db();
        let user = make_user(&conn, "ada@example.com");

        let stale = reserve(&conn, user, 2, "10:00").unwrap();
        let fresh = reserve(&conn, user, 2, "11:00").unwrap();
        let pending = reserve(&conn, user, 2, "12:00").unwrap();
        confirm_reservation(&conn, pending.id).unwrap();
        conn.execute(
            "UPDATE appointments SET created_at = '2000-01-01 00:00:00' WHERE id IN (?1, ?2)",
            params![stale.id, pending.id],
        )
        .unwrap();

        let cutoff = parse_timestamp("2020-01-01 00:00:00").unwrap();
        assert_eq!(release_stale_reservations(&conn, cutoff).unwrap(), 1);

        assert!(get_appointment(&conn, stale.id).unwrap().is_none());
        assert!(get_appointment(&conn, fresh.id).unwrap().is_some());
        assert!(get_appointment(&conn, pending.id).unwrap().is_some());
        assert!(reserve(&conn, user, 2, "10:00").is_some());
    }

    #[test]
    fn test_unknown_status_is_an_error() {
        let conn = setup_db();
        let user = make_user(&conn, "ada@example.com");
        let appt = reserve(&conn, user, 2, "10:00").unwrap();

        conn.execute(
            "UPDATE appointments SET payment_status = 'pendnig' WHERE id = ?1",
            params![appt.id],
        )
        .unwrap();

        assert!(get_appointment(&conn, appt.id).is_err());
        assert!(get_appointments_for_user(&conn, user).is_err());
        // Nothing the callback could complete.
        assert!(complete_appointment_payment(&conn, appt.id, "1001", 5000.0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_malformed_timestamp_is_an_error() {
        let conn = setup_db();
        insert_comment(&conn, "Ada", "ada@example.com", "fine").unwrap();
        conn.execute(
            "INSERT INTO comments (name, email, content, created_at) VALUES ('Bob', 'b@example.com', 'bad', 'yesterday')",
            [],
        )
        .unwrap();

        assert!(list_recent_comments(&conn, 50).is_err());
    }

    #[test]
    fn test_revoke_token() {
        let conn = setup_db();
        assert!(!is_token_revoked(&conn, "jti-1").unwrap());
        revoke_token(&conn, "jti-1").unwrap();
        revoke_token(&conn, "jti-1").unwrap();
        assert!(is_token_revoked(&conn, "jti-1").unwrap());
    }
}
