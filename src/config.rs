//! Configuration for Bailiff
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::auth::jwt::MAX_TTL_SECONDS;

/// Bailiff - authorization gateway for the law-firm practice API
#[derive(Parser, Debug, Clone)]
#[command(name = "bailiff")]
#[command(about = "Authorization gateway for the law-firm practice API")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (fixed signing secret, in-memory store fallback)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "bailiff")]
    pub mongodb_db: String,

    /// Secret for token signing (required outside dev mode, at least 32 characters)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "86400")]
    pub jwt_expiry_seconds: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_EXPIRY_SECONDS", default_value = "604800")]
    pub refresh_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Append audit events to this JSONL file
    #[arg(long, env = "AUDIT_LOG_PATH")]
    pub audit_log_path: Option<PathBuf>,

    /// JSON quota table replacing the built-in plan limits
    #[arg(long, env = "QUOTA_TABLE_PATH")]
    pub quota_table_path: Option<PathBuf>,

    /// Seed an admin account with this email at startup (dev mode only)
    #[arg(long, env = "DEV_ADMIN_EMAIL")]
    pub dev_admin_email: Option<String>,

    /// Password for the seeded dev admin
    #[arg(long, env = "DEV_ADMIN_PASSWORD")]
    pub dev_admin_password: Option<String>,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.jwt_expiry_seconds == 0 || self.refresh_expiry_seconds == 0 {
            return Err("Token lifetimes must be greater than zero".to_string());
        }

        if self.jwt_expiry_seconds > MAX_TTL_SECONDS
            || self.refresh_expiry_seconds > MAX_TTL_SECONDS
        {
            return Err(format!("Token lifetimes must not exceed {MAX_TTL_SECONDS} seconds"));
        }

        if self.refresh_expiry_seconds < self.jwt_expiry_seconds {
            return Err(
                "REFRESH_EXPIRY_SECONDS must not be shorter than JWT_EXPIRY_SECONDS".to_string(),
            );
        }

        if self.dev_admin_email.is_some() != self.dev_admin_password.is_some() {
            return Err("DEV_ADMIN_EMAIL and DEV_ADMIN_PASSWORD must be set together".to_string());
        }

        if self.dev_admin_email.is_some() && !self.dev_mode {
            return Err("DEV_ADMIN_EMAIL is only allowed in dev mode".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("bailiff").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--dev-mode"]);
        assert_eq!(args.jwt_expiry_seconds, 86_400);
        assert_eq!(args.refresh_expiry_seconds, 604_800);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_production_needs_secret() {
        let args = parse(&[]);
        assert!(args.validate().is_err());

        let args = parse(&["--jwt-secret", "0123456789abcdef0123456789abcdef"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_dev_admin_requires_dev_mode_and_both_fields() {
        let args = parse(&["--dev-mode", "--dev-admin-email", "admin@example.com"]);
        assert!(args.validate().is_err());

        let args = parse(&[
            "--jwt-secret",
            "0123456789abcdef0123456789abcdef",
            "--dev-admin-email",
            "admin@example.com",
            "--dev-admin-password",
            "pw",
        ]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_token_lifetime_upper_bound() {
        let args = parse(&[
            "--dev-mode",
            "--jwt-expiry-seconds",
            "18446744073709551615",
            "--refresh-expiry-seconds",
            "18446744073709551615",
        ]);
        assert!(args.validate().is_err());

        let args = parse(&[
            "--dev-mode",
            "--jwt-expiry-seconds",
            "3600",
            "--refresh-expiry-seconds",
            &MAX_TTL_SECONDS.to_string(),
        ]);
        assert!(args.validate().is_ok());
    }
}
