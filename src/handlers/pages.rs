use std::collections::HashMap;

use axum::{Form, Json};
use serde_json::{json, Value};

// POST /contact
pub async fn contact(Form(form): Form<HashMap<String, String>>) -> Json<Value> {
    let subscribed = form
        .get("newsletter-email")
        .is_some_and(|email| !email.trim().is_empty());

    if subscribed {
        Json(json!({ "message": "Subscribed to newsletter successfully!" }))
    } else {
        Json(json!({ "message": "Feedback sent successfully!" }))
    }
}
