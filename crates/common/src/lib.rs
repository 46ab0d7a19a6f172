mod client;
mod env;
mod password;

pub use client::ModuleClient;
pub use env::{required_var, EnvVars};
pub use password::{hash_password, verify_password, PASSWORD_MAX_CHARS};

/// Current unix time in seconds.
pub fn get_current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[doc(hidden)]
pub use tracing as __tracing;
