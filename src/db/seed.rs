use rusqlite::Connection;

use crate::db::queries;
use crate::models::NewUser;
use crate::services::auth::AuthService;

pub const DEMO_EMAIL: &str = "test@example.com";
const DEMO_PASSWORD: &str = "testpass123";

/// Demo account and a welcome comment for local runs. Existing rows are left
/// untouched.
pub fn seed_demo_data(conn: &Connection, auth: &AuthService) -> anyhow::Result<()> {
    if queries::get_user_by_email(conn, DEMO_EMAIL)?.is_none() {
        let user = NewUser {
            name: "Test User".to_string(),
            email: DEMO_EMAIL.to_string(),
            password_hash: auth.hash_password(DEMO_PASSWORD)?,
            phone: Some("1234567890".to_string()),
            address: Some("123 Test Street, Test City".to_string()),
        };
        if queries::insert_user(conn, &user)?.is_some() {
            tracing::info!(email = DEMO_EMAIL, "seeded demo user");
        }
    }

    if queries::count_comments(conn)? == 0 {
        queries::insert_comment(
            conn,
            "Test User",
            DEMO_EMAIL,
            "This is a test comment. The comment section is working great!",
        )?;
        tracing::info!("seeded demo comment");
    }

    Ok(())
}
