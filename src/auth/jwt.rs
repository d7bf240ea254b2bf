//! JWT session and reset tokens
//!
//! Security notes:
//! - Tokens are signed with HS256 (HMAC-SHA256)
//! - Session tokens carry the university id; role and status are re-read from
//!   the user store on every request
//! - Reset tokens are short-lived and only accepted by the password reset route

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::Role;
use crate::types::QuireError;

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    PasswordReset,
}

/// Payload stored in JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// University id
    pub sub: String,
    /// Display name
    pub name: String,
    pub role: Role,
    pub purpose: TokenPurpose,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Input for creating a new token
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub user_id: String,
    pub name: String,
    pub role: Role,
}

/// Result of token validation
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

impl TokenValidationResult {
    pub fn valid(claims: Claims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    expiry_seconds: u64,
}

impl JwtValidator {
    /// Create a new JWT validator
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, QuireError> {
        if secret.is_empty() {
            return Err(QuireError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(QuireError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Create a validator for dev mode
    pub fn new_dev() -> Self {
        Self {
            secret: "dev-mode-secret-not-for-production-use-123456".into(),
            expiry_seconds: 8 * 3600,
        }
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }

    fn now() -> Result<u64, QuireError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .map_err(|e| QuireError::Internal(format!("System time error: {}", e)))
    }

    fn sign(&self, input: TokenInput, purpose: TokenPurpose, ttl: u64) -> Result<String, QuireError> {
        let now = Self::now()?;

        let claims = Claims {
            sub: input.user_id,
            name: input.name,
            role: input.role,
            purpose,
            iat: now,
            exp: now + ttl,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| QuireError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Generate a session token for an authenticated user
    pub fn generate_token(&self, input: TokenInput) -> Result<String, QuireError> {
        self.sign(input, TokenPurpose::Session, self.expiry_seconds)
    }

    /// Generate a password reset token valid for `ttl_seconds`
    pub fn generate_reset_token(&self, input: TokenInput, ttl_seconds: u64) -> Result<String, QuireError> {
        self.sign(input, TokenPurpose::PasswordReset, ttl_seconds)
    }

    /// Verify and decode a JWT token
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let validation = Validation::default();

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => TokenValidationResult::valid(token_data.claims),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let error_msg = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidToken => "Invalid token",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Token validation failed",
                };
                TokenValidationResult::invalid(error_msg)
            }
        }
    }

    /// Verify a token and require a purpose, returning its claims
    pub fn claims_for(&self, token: &str, purpose: TokenPurpose) -> Result<Claims, QuireError> {
        let result = self.verify_token(token);
        let claims = match (result.valid, result.claims) {
            (true, Some(claims)) => claims,
            _ => {
                return Err(QuireError::Unauthorized(
                    result.error.unwrap_or_else(|| "Invalid token".into()),
                ))
            }
        };

        if claims.purpose != purpose {
            return Err(QuireError::Unauthorized("Token not valid for this use".into()));
        }
        Ok(claims)
    }
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    // Also support raw token (for flexibility)
    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_validator() -> JwtValidator {
        JwtValidator::new(
            "test-secret-that-is-at-least-32-characters-long".into(),
            3600,
        )
        .unwrap()
    }

    fn faculty_input() -> TokenInput {
        TokenInput {
            user_id: "F100".into(),
            name: "Dr. Karim".into(),
            role: Role::Faculty,
        }
    }

    #[test]
    fn test_generate_and_verify_token() {
        let validator = test_validator();

        let token = validator.generate_token(faculty_input()).unwrap();
        let result = validator.verify_token(&token);
        assert!(result.valid);

        let claims = result.claims.unwrap();
        assert_eq!(claims.sub, "F100");
        assert_eq!(claims.role, Role::Faculty);
        assert_eq!(claims.purpose, TokenPurpose::Session);
    }

    #[test]
    fn test_invalid_token() {
        let validator = test_validator();

        let result = validator.verify_token("invalid-token");
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_wrong_secret() {
        let validator1 = test_validator();
        let validator2 = JwtValidator::new(
            "different-secret-that-is-at-least-32-characters".into(),
            3600,
        )
        .unwrap();

        let token = validator1.generate_token(faculty_input()).unwrap();
        assert!(!validator2.verify_token(&token).valid);
    }

    #[test]
    fn test_purpose_is_enforced() {
        let validator = test_validator();

        let reset = validator.generate_reset_token(faculty_input(), 600).unwrap();
        assert!(validator.claims_for(&reset, TokenPurpose::PasswordReset).is_ok());
        assert!(matches!(
            validator.claims_for(&reset, TokenPurpose::Session),
            Err(QuireError::Unauthorized(_))
        ));

        let session = validator.generate_token(faculty_input()).unwrap();
        assert!(validator.claims_for(&session, TokenPurpose::PasswordReset).is_err());
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(
            extract_token_from_header(Some("Bearer abc123")),
            Some("abc123")
        );
        assert_eq!(extract_token_from_header(Some("abc123")), Some("abc123"));

        assert_eq!(extract_token_from_header(None), None);
        assert_eq!(extract_token_from_header(Some("")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc123")), None);
    }

    #[test]
    fn test_secret_validation() {
        assert!(JwtValidator::new("short".into(), 3600).is_err());
        assert!(JwtValidator::new("".into(), 3600).is_err());
        assert!(JwtValidator::new("this-secret-is-at-least-32-chars-long".into(), 3600).is_ok());
    }

    #[test]
    fn test_dev_mode_validator() {
        let validator = JwtValidator::new_dev();
        let token = validator.generate_token(faculty_input()).unwrap();
        assert!(validator.verify_token(&token).valid);
    }
}
