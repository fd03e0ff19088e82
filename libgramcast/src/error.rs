//! Error types for Gramcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GramcastError>;

#[derive(Error, Debug)]
pub enum GramcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("No active accounts")]
    NoActiveAccounts,

    #[error("A broadcast job is already running")]
    JobAlreadyRunning,

    #[error("No login in progress")]
    NoPendingLogin,

    #[error("Account {0} is already logged in")]
    AlreadyLoggedIn(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GramcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            GramcastError::InvalidInput(_) => 3,
            GramcastError::Auth(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Failures of individual protocol operations.
///
/// Inside a running job these are recovered locally: the failing destination
/// or account is logged and skipped, and the job keeps going.
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Could not resolve destination: {0}")]
    Resolution(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Join failed: {0}")]
    Join(String),

    #[error("Operation timed out after {0}s")]
    Timeout(u64),
}

/// Login outcomes a caller must be able to tell apart.
///
/// `SecondFactorRequired` in particular is not terminal: the caller should
/// prompt for the second-factor password and continue the login.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid login code")]
    InvalidCode,

    #[error("Expired login code")]
    ExpiredCode,

    #[error("Second factor required")]
    SecondFactorRequired,

    #[error("Invalid second-factor password")]
    InvalidSecondFactor,

    #[error("Authentication failed: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = GramcastError::InvalidInput("empty identifier".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_auth_errors() {
        for auth in [
            AuthError::InvalidCode,
            AuthError::ExpiredCode,
            AuthError::SecondFactorRequired,
            AuthError::InvalidSecondFactor,
            AuthError::Other("boom".to_string()),
        ] {
            let error = GramcastError::Auth(auth);
            assert_eq!(error.exit_code(), 2);
        }
    }

    #[test]
    fn test_exit_code_protocol_error() {
        let error = GramcastError::Protocol(ProtocolError::Send("relay refused".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_precondition_errors() {
        assert_eq!(GramcastError::NoActiveAccounts.exit_code(), 1);
        assert_eq!(GramcastError::JobAlreadyRunning.exit_code(), 1);
        assert_eq!(GramcastError::NoPendingLogin.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting() {
        let error = GramcastError::Protocol(ProtocolError::Resolution("-100123".to_string()));
        assert_eq!(
            format!("{}", error),
            "Protocol error: Could not resolve destination: -100123"
        );

        let error = GramcastError::Auth(AuthError::SecondFactorRequired);
        assert_eq!(
            format!("{}", error),
            "Authentication error: Second factor required"
        );

        let error = GramcastError::AlreadyLoggedIn("15551234".to_string());
        assert_eq!(format!("{}", error), "Account 15551234 is already logged in");
    }

    #[test]
    fn test_error_conversion_from_protocol_error() {
        let protocol_error = ProtocolError::Connection("refused".to_string());
        let error: GramcastError = protocol_error.into();
        assert!(matches!(error, GramcastError::Protocol(_)));
    }

    #[test]
    fn test_error_conversion_from_auth_error() {
        let auth_error = AuthError::InvalidCode;
        let error: GramcastError = auth_error.into();
        assert!(matches!(
            error,
            GramcastError::Auth(AuthError::InvalidCode)
        ));
    }

    #[test]
    fn test_timeout_formatting() {
        let error = ProtocolError::Timeout(20);
        assert_eq!(format!("{}", error), "Operation timed out after 20s");
    }

    #[test]
    fn test_auth_error_is_distinguishable() {
        // Callers match on the variant to decide whether to prompt for a
        // second factor; the variants must stay distinct.
        let needs_2fa: GramcastError = AuthError::SecondFactorRequired.into();
        match needs_2fa {
            GramcastError::Auth(AuthError::SecondFactorRequired) => {}
            other => panic!("expected SecondFactorRequired, got {:?}", other),
        }
    }
}
