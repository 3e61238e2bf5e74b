use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub payment_secret_key: String,
    pub payment_base_url: String,
    pub payment_timeout_secs: u64,
    pub appointment_fee: f64,
    pub payment_currency: String,
    pub public_base_url: String,
    pub mail_server: String,
    pub mail_port: u16,
    pub mail_use_tls: bool,
    pub mail_username: String,
    pub mail_password: String,
    pub mail_default_sender: String,
    pub static_dir: String,
    pub seed_demo_data: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            database_url: normalize_database_url(
                &env::var("DATABASE_URL").unwrap_or_else(|_| "graceland.db".to_string()),
            ),
            jwt_secret: env::var("JWT_SECRET_KEY").unwrap_or_else(|_| "change-me".to_string()),
            token_ttl_hours: env::var("TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            payment_secret_key: env::var("FLUTTERWAVE_SECRET_KEY").unwrap_or_default(),
            payment_base_url: env::var("FLUTTERWAVE_BASE_URL")
                .unwrap_or_else(|_| "https://api.flutterwave.com".to_string()),
            payment_timeout_secs: env::var("PAYMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            appointment_fee: env::var("APPOINTMENT_FEE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000.0),
            payment_currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "NGN".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            mail_server: env::var("MAIL_SERVER").unwrap_or_default(),
            mail_port: env::var("MAIL_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(587),
            mail_use_tls: env_flag("MAIL_USE_TLS", true),
            mail_username: env::var("MAIL_USERNAME").unwrap_or_default(),
            mail_password: env::var("MAIL_PASSWORD").unwrap_or_default(),
            mail_default_sender: env::var("MAIL_DEFAULT_SENDER").unwrap_or_default(),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            seed_demo_data: env_flag("SEED_DEMO_DATA", false),
        }
    }

    pub fn payment_callback_url(&self) -> String {
        format!(
            "{}/payment_callback",
            self.public_base_url.trim_end_matches('/')
        )
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "yes" | "1"))
        .unwrap_or(default)
}

/// Accepts both a bare path and the `sqlite:///path` URL form.
fn normalize_database_url(url: &str) -> String {
    url.strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_database_url() {
        assert_eq!(normalize_database_url("sqlite:///graceland.db"), "graceland.db");
        assert_eq!(normalize_database_url("graceland.db"), "graceland.db");
        assert_eq!(normalize_database_url(":memory:"), ":memory:");
    }
}
