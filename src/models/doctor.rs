use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub specialty: String,
    pub email: Option<String>,
    pub bio: Option<String>,
}
