use std::env;
use std::thread;
use std::time::Duration;

use chrono::Utc;

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASS_ENV: &str = "SIGIL_ADMIN_PASS";
pub const SESSION_TOKEN_PREFIX: &str = "session-";

const DEFAULT_ADMIN_PASS: &str = "sigil-owner";
const SIMULATED_LATENCY: Duration = Duration::from_millis(600);

/// Outcome of a login attempt. Wrong credentials are a normal outcome with
/// a message, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub success: bool,
    pub token: Option<String>,
    pub message: String,
}

/// Fixed-credential gate for the admin-only corners of the site. There is
/// exactly one account; the password can be rotated via the environment.
pub struct AuthGateway {
    password: String,
    latency: Duration,
}

impl AuthGateway {
    pub fn new() -> Self {
        Self {
            password: env::var(ADMIN_PASS_ENV).unwrap_or_else(|_| DEFAULT_ADMIN_PASS.to_owned()),
            latency: SIMULATED_LATENCY,
        }
    }

    /// No artificial delay; used by tests and scripted callers.
    pub fn instant() -> Self {
        Self {
            latency: Duration::ZERO,
            ..Self::new()
        }
    }

    pub fn login(&self, username: &str, password: &str) -> LoginOutcome {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        if username == ADMIN_USER && password == self.password {
            let token = format!("{SESSION_TOKEN_PREFIX}{}", Utc::now().timestamp_millis());
            LoginOutcome {
                success: true,
                token: Some(token),
                message: "login succeeded, welcome back".to_owned(),
            }
        } else {
            LoginOutcome {
                success: false,
                token: None,
                message: "unknown account or wrong password".to_owned(),
            }
        }
    }
}

/// The privileged flag: whether the given token looks like one we issued.
pub fn check_session(token: Option<&str>) -> bool {
    token.is_some_and(|token| token.starts_with(SESSION_TOKEN_PREFIX))
}
