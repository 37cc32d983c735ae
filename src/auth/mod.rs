// src/auth/mod.rs
// Session gate: credential verification against the configured reference and
// the per-session authenticated/unauthenticated state it drives.

pub mod password;
pub mod sessions;

use thiserror::Error;

use crate::config::{Config, ConfigError};
use password::{constant_time_eq, verify_digest};

pub use sessions::{Session, SessionRegistry};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
}

/// The expected identity and secret, fixed for the process lifetime.
///
/// When both a plaintext password and a digest are configured, the digest
/// takes precedence.
#[derive(Debug, Clone)]
pub struct CredentialReference {
    username: String,
    secret: Secret,
}

#[derive(Debug, Clone)]
enum Secret {
    Plaintext(String),
    Sha256Hex(String),
}

impl CredentialReference {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let secret = match (&config.app_password_hash, &config.app_password) {
            (Some(hash), _) => {
                if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(ConfigError::MalformedPasswordHash);
                }
                Secret::Sha256Hex(hash.clone())
            }
            (None, Some(plain)) => Secret::Plaintext(plain.clone()),
            (None, None) => return Err(ConfigError::MissingCredentialReference),
        };
        Ok(Self {
            username: config.app_username.clone(),
            secret,
        })
    }

    #[cfg(test)]
    pub fn plaintext(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            secret: Secret::Plaintext(password.to_string()),
        }
    }

    #[cfg(test)]
    pub fn hashed(username: &str, digest_hex: &str) -> Self {
        Self {
            username: username.to_string(),
            secret: Secret::Sha256Hex(digest_hex.to_string()),
        }
    }

    /// Pure credential check: exact username match plus password match against
    /// the configured reference. No side effects.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        if username != self.username {
            return false;
        }
        match &self.secret {
            Secret::Plaintext(expected) => {
                constant_time_eq(password.as_bytes(), expected.as_bytes())
            }
            Secret::Sha256Hex(reference) => verify_digest(password, reference),
        }
    }
}

/// Per-session authentication state, owned by the caller's session context.
///
/// Two states only: unauthenticated and authenticated. `login` transitions
/// forward on success, `logout` transitions back unconditionally.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    authenticated: bool,
    username: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(
        &mut self,
        reference: &CredentialReference,
        username: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        if !reference.verify(username, password) {
            // Failed attempts leave the state untouched; the caller may retry.
            return Err(AuthError::InvalidCredentials);
        }
        self.authenticated = true;
        self.username = Some(username.to_string());
        Ok(())
    }

    pub fn logout(&mut self) {
        self.authenticated = false;
        self.username = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use password::digest_password;

    #[test]
    fn verify_plaintext_reference() {
        let reference = CredentialReference::plaintext("admin", "secret123");
        assert!(reference.verify("admin", "secret123"));
        assert!(!reference.verify("admin", "wrong"));
        assert!(!reference.verify("admin", "secret1234"));
        assert!(!reference.verify("root", "secret123"));
    }

    #[test]
    fn verify_hashed_reference() {
        let reference = CredentialReference::hashed("admin", &digest_password("secret123"));
        assert!(reference.verify("admin", "secret123"));
        assert!(!reference.verify("admin", "secret1234"));
    }

    #[test]
    fn login_logout_scenario() {
        let reference = CredentialReference::plaintext("admin", "secret123");
        let mut session = SessionState::new();
        assert!(!session.is_authenticated());

        session
            .login(&reference, "admin", "secret123")
            .expect("valid credentials");
        assert!(session.is_authenticated());
        assert_eq!(session.username(), Some("admin"));

        session.logout();
        assert!(!session.is_authenticated());
        assert_eq!(session.username(), None);
    }

    #[test]
    fn failed_login_leaves_session_unauthenticated() {
        let reference = CredentialReference::plaintext("admin", "secret123");
        let mut session = SessionState::new();

        let err = session.login(&reference, "admin", "wrong").unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(!session.is_authenticated());
        assert_eq!(session.username(), None);

        // The reference is untouched and a retry with correct credentials works.
        assert!(session.login(&reference, "admin", "secret123").is_ok());
        assert!(session.is_authenticated());
    }

    #[test]
    fn hash_reference_takes_precedence_over_plaintext() {
        let mut config = Config::from_env();
        config.app_username = "admin".to_string();
        config.app_password = Some("ignored".to_string());
        config.app_password_hash = Some(digest_password("secret123"));

        let reference = CredentialReference::from_config(&config).unwrap();
        assert!(reference.verify("admin", "secret123"));
        assert!(!reference.verify("admin", "ignored"));
    }

    #[test]
    fn missing_reference_is_a_configuration_error() {
        let mut config = Config::from_env();
        config.app_password = None;
        config.app_password_hash = None;
        assert!(matches!(
            CredentialReference::from_config(&config),
            Err(ConfigError::MissingCredentialReference)
        ));
    }

    #[test]
    fn malformed_hash_is_rejected_at_startup() {
        let mut config = Config::from_env();
        config.app_password = None;
        config.app_password_hash = Some("not-a-digest".to_string());
        assert!(matches!(
            CredentialReference::from_config(&config),
            Err(ConfigError::MalformedPasswordHash)
        ));
    }
}
