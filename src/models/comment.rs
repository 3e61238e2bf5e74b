use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// Public comment board entry. The email is kept but never listed.
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub email: String,
    pub content: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: NaiveDateTime,
}

pub(crate) fn serialize_timestamp<S: Serializer>(
    dt: &NaiveDateTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&dt.format("%Y-%m-%d %H:%M:%S").to_string())
}
