// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Default passing score (percent) applied when an author does not set one.
pub const DEFAULT_PASSING_SCORE: f64 = 70.0;

/// Default attempt budget per user per quiz.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Extra time granted past a quiz's time limit before the expiry sweep
/// marks an in-progress attempt as abandoned.
pub const ATTEMPT_GRACE_SECONDS: i64 = 300;

/// Attempts against quizzes without a time limit are abandoned after this
/// much inactivity.
pub const STALE_ATTEMPT_TTL_SECONDS: i64 = 24 * 60 * 60;

/// How often the expiry sweep wakes up.
pub const SWEEP_INTERVAL_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            jwt_secret,
            rust_log,
        }
    }
}
