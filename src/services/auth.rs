//! Password hashing and bearer token handling.
use anyhow::Context;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct AuthService {
    secret: String,
    token_ttl: Duration,
    hash_cost: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: i64,
    pub iat: i64,
    pub jti: String, // revocation key
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

impl AuthService {
    pub fn new(secret: String, token_ttl_hours: i64) -> Self {
        Self::with_cost(secret, token_ttl_hours, bcrypt::DEFAULT_COST)
    }

    /// Lower costs are only meant for tests.
    pub fn with_cost(secret: String, token_ttl_hours: i64, hash_cost: u32) -> Self {
        Self {
            secret,
            token_ttl: Duration::hours(token_ttl_hours),
            hash_cost,
        }
    }

    pub fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        bcrypt::hash(password, self.hash_cost).context("failed to hash password")
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> anyhow::Result<bool> {
        bcrypt::verify(password, hash).context("failed to verify password")
    }

    pub fn issue_token(&self, user_id: i64) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + self.token_ttl).timestamp(),
            iat: now.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let key = EncodingKey::from_secret(self.secret.as_bytes());
        encode(&Header::default(), &claims, &key).context("failed to sign token")
    }

    /// Checks signature and expiry. Revocation is checked against the store by
    /// the caller.
    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let data = decode::<Claims>(token, &key, &Validation::default())?;
        Ok(data.claims)
    }
}
