//! Configuration for Gatehouse
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

use crate::auth::JwtValidator;
use crate::policy::PolicyConfig;
use crate::types::{GatehouseError, Result};

/// Gatehouse - school portal API with house-scoped access control
#[derive(Parser, Debug, Clone)]
#[command(name = "gatehouse")]
#[command(about = "School portal API: appointments, announcements, house community, campus maps")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Enable development mode (built-in JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Storage backend
    #[arg(long, env = "STORAGE", value_enum, default_value = "memory")]
    pub storage: StorageBackend,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "gatehouse")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "604800")]
    pub jwt_expiry_seconds: u64,

    /// Key that must accompany every account registration
    #[arg(long, env = "ADMIN_REGISTRATION_KEY")]
    pub admin_registration_key: Option<String>,

    /// Username of the admin seeded at startup when none exists
    #[arg(long, env = "BOOTSTRAP_ADMIN_USERNAME", default_value = "admin@kvs")]
    pub bootstrap_admin_username: String,

    /// Password for the seeded admin; no seeding without it
    #[arg(long, env = "BOOTSTRAP_ADMIN_PASSWORD")]
    pub bootstrap_admin_password: Option<String>,

    /// Hide principal and vice-principal appointments from teachers
    #[arg(long, env = "RESTRICT_OFFICE_APPOINTMENTS", default_value = "false")]
    pub restrict_office_appointments: bool,

    /// Only allow pending -> approved|rejected and approved -> completed
    #[arg(long, env = "ENFORCE_STATUS_TRANSITIONS", default_value = "false")]
    pub enforce_status_transitions: bool,

    /// Append authorization decisions to this JSONL file
    #[arg(long, env = "AUDIT_LOG_PATH")]
    pub audit_log_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Where resources are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// Process memory; lost on restart
    Memory,
    /// MongoDB collections
    Mongo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Args {
    /// Build the token validator (built-in secret only in dev mode)
    pub fn jwt_validator(&self) -> Result<JwtValidator> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => JwtValidator::new(secret.clone(), self.jwt_expiry_seconds),
            (None, true) => Ok(JwtValidator::new_dev()),
            (None, false) => Err(GatehouseError::Config(
                "JWT_SECRET is required in production mode".into(),
            )),
        }
    }

    /// Policy switches
    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            restrict_office_appointments: self.restrict_office_appointments,
            enforce_status_transitions: self.enforce_status_transitions,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.storage == StorageBackend::Mongo && self.mongodb_uri.trim().is_empty() {
            return Err("MONGODB_URI is required for mongo storage".to_string());
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be positive".to_string());
        }

        if !self.bootstrap_admin_username.ends_with("@kvs") {
            return Err("BOOTSTRAP_ADMIN_USERNAME must end with @kvs".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["gatehouse"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_production_requires_secret() {
        let args = parse(&["--storage", "memory"]);
        if args.jwt_secret.is_none() && !args.dev_mode {
            assert!(args.validate().is_err());
            assert!(args.jwt_validator().is_err());
        }
    }

    #[test]
    fn test_dev_mode_allows_missing_secret() {
        let args = parse(&["--dev-mode"]);
        assert!(args.dev_mode);
        assert!(args.jwt_validator().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let args = parse(&["--jwt-secret", "short"]);
        assert!(args.jwt_validator().is_err());
    }

    #[test]
    fn test_policy_flags() {
        let args = parse(&[
            "--dev-mode",
            "--restrict-office-appointments",
            "--enforce-status-transitions",
        ]);
        let config = args.policy_config();
        assert!(config.restrict_office_appointments);
        assert!(config.enforce_status_transitions);
    }

    #[test]
    fn test_bootstrap_username_suffix() {
        let args = parse(&["--dev-mode", "--bootstrap-admin-username", "root@example.com"]);
        assert!(args.validate().is_err());
    }
}
