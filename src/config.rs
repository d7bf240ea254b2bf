//! Configuration for Quire
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Insecure secret accepted only in development mode
const DEV_JWT_SECRET: &str = "dev-mode-secret-not-for-production-use-123456";

/// Quire - thesis management service
#[derive(Parser, Debug, Clone)]
#[command(name = "quire")]
#[command(about = "Thesis groups, registrations, stage reports and reviews")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5005")]
    pub listen: SocketAddr,

    /// Enable development mode (dev JWT secret, in-memory store fallback)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "quire")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Session token lifetime in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "28800")]
    pub jwt_expiry_seconds: u64,

    /// Password reset token lifetime in seconds
    #[arg(long, env = "RESET_TOKEN_TTL_SECONDS", default_value = "900")]
    pub reset_token_ttl_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Root directory for uploaded files
    #[arg(long, env = "FILES_DIR", default_value = "files")]
    pub files_dir: PathBuf,

    /// Maximum size of a request carrying a file
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "26214400")]
    pub max_upload_bytes: usize,

    /// Maximum size of a JSON request body
    #[arg(long, env = "MAX_JSON_BYTES", default_value = "65536")]
    pub max_json_bytes: usize,

    /// HTTP mail relay endpoint; mail is only logged when unset
    #[arg(long, env = "MAIL_RELAY_URL")]
    pub mail_relay_url: Option<String>,

    /// Bearer key for the mail relay
    #[arg(long, env = "MAIL_API_KEY")]
    pub mail_api_key: Option<String>,

    /// Sender address for outgoing mail
    #[arg(long, env = "MAIL_FROM", default_value = "thesis-office@localhost")]
    pub mail_from: String,

    /// Mail domain of student accounts; other registrations need approval
    #[arg(long, env = "STUDENT_MAIL_DOMAIN", default_value = "g.bracu.ac.bd")]
    pub student_mail_domain: String,

    /// Frontend base URL used in mailed links
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3000")]
    pub frontend_url: String,

    /// University id of the administrator seeded at startup
    #[arg(long, env = "ADMIN_ID")]
    pub admin_id: Option<String>,

    /// Mail address of the seeded administrator
    #[arg(long, env = "ADMIN_MAIL")]
    pub admin_mail: Option<String>,

    /// Password of the seeded administrator
    #[arg(long, env = "ADMIN_PASSWORD")]
    pub admin_password: Option<String>,

    /// JSONL audit log file
    #[arg(long, env = "AUDIT_LOG_PATH")]
    pub audit_log_path: Option<PathBuf>,
}

/// Credentials for the administrator created at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub user_id: String,
    pub mail: String,
    pub password: String,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> Result<String, String> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => Ok(secret.clone()),
            (None, true) => Ok(DEV_JWT_SECRET.to_string()),
            (None, false) => Err("JWT_SECRET is required in production mode".to_string()),
        }
    }

    /// Admin seed, when all three variables are set
    pub fn admin_seed(&self) -> Option<AdminSeed> {
        match (&self.admin_id, &self.admin_mail, &self.admin_password) {
            (Some(user_id), Some(mail), Some(password)) => Some(AdminSeed {
                user_id: user_id.trim().to_string(),
                mail: mail.trim().to_lowercase(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.max_json_bytes == 0 || self.max_upload_bytes == 0 {
            return Err("MAX_JSON_BYTES and MAX_UPLOAD_BYTES must be positive".to_string());
        }

        if self.max_json_bytes > self.max_upload_bytes {
            return Err("MAX_JSON_BYTES must not exceed MAX_UPLOAD_BYTES".to_string());
        }

        let admin_vars = [&self.admin_id, &self.admin_mail, &self.admin_password];
        let set = admin_vars.iter().filter(|v| v.is_some()).count();
        if set != 0 && set != admin_vars.len() {
            return Err("ADMIN_ID, ADMIN_MAIL and ADMIN_PASSWORD must be set together".to_string());
        }

        if self.student_mail_domain.trim().is_empty() {
            return Err("STUDENT_MAIL_DOMAIN must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["quire"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults_in_dev_mode() {
        let args = args(&["--dev-mode"]);
        assert_eq!(args.listen.port(), 5005);
        assert!(args.validate().is_ok());
        assert!(args.jwt_secret().is_ok());
        assert!(args.admin_seed().is_none());
    }

    #[test]
    fn test_production_requires_secret() {
        let args = args(&[]);
        assert!(args.validate().is_err());
        assert!(args.jwt_secret().is_err());
    }

    #[test]
    fn test_admin_seed_must_be_complete() {
        let partial = args(&["--dev-mode", "--admin-id", "A1"]);
        assert!(partial.validate().is_err());

        let full = args(&[
            "--dev-mode",
            "--admin-id",
            "A1",
            "--admin-mail",
            "Office@Uni.edu",
            "--admin-password",
            "change-me-now",
        ]);
        assert!(full.validate().is_ok());
        assert_eq!(full.admin_seed().unwrap().mail, "office@uni.edu");
    }
}
