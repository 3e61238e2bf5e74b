use std::path::Path;
use std::sync::Arc;

use axum::routing::{get, get_service, post, MethodRouter};
use axum::Router;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

fn page<S>(static_dir: &Path, file: &str) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    get_service(ServeFile::new(static_dir.join("html").join(file)))
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = Path::new(&state.config.static_dir).to_path_buf();

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/", page(&static_dir, "index.html"))
        .route("/services", page(&static_dir, "services.html"))
        .route("/about", page(&static_dir, "about.html"))
        .route("/blog", page(&static_dir, "blog.html"))
        .route("/locations", page(&static_dir, "locations.html"))
        .route(
            "/contact",
            page(&static_dir, "contact.html").post(handlers::pages::contact),
        )
        .route(
            "/register",
            page(&static_dir, "register.html").post(handlers::auth::register),
        )
        .route(
            "/login",
            page(&static_dir, "login.html").post(handlers::auth::login),
        )
        .route("/logout", get(handlers::auth::logout))
        .route(
            "/profile",
            page(&static_dir, "profile.html").post(handlers::profile::update_profile),
        )
        .route(
            "/book",
            page(&static_dir, "book.html").post(handlers::booking::book),
        )
        .route(
            "/payment_callback",
            get(handlers::booking::payment_callback),
        )
        .route(
            "/api/appointments/:id/cancel",
            post(handlers::booking::cancel_appointment),
        )
        .route("/api/doctors", get(handlers::doctors::list_doctors))
        .route("/api/doctors/:id", get(handlers::doctors::get_doctor))
        .route("/api/profile", get(handlers::profile::get_profile))
        .route(
            "/api/comments",
            get(handlers::comments::list_comments).post(handlers::comments::create_comment),
        )
        .route("/get-comments", get(handlers::comments::list_comments))
        .route("/submit-comment", post(handlers::comments::submit_comment))
        .nest_service("/static", ServeDir::new(&static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
