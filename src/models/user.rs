use chrono::NaiveDateTime;
use serde::Serialize;

pub const DEFAULT_PROFILE_PICTURE: &str = "/static/images/default-profile.jpg";

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn profile_picture_or_default(&self) -> &str {
        self.profile_picture
            .as_deref()
            .unwrap_or(DEFAULT_PROFILE_PICTURE)
    }
}

/// Fields for a new account; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}
