//! Protocol client abstraction
//!
//! The wire protocol itself lives outside this crate. Everything the
//! orchestrator needs from it is captured by the [`ProtocolClient`] trait:
//! one authenticated connection per account, message sends, channel joins
//! and invite imports. A [`ClientFactory`] binds a client to the on-disk
//! session credential for one account; the production embedder supplies a
//! factory backed by a real protocol library, tests and the CLI loopback
//! transport use [`mock`].
//!
//! Every call into a client from the orchestrator goes through
//! [`with_timeout`], so a hung network operation degrades into an ordinary
//! per-operation failure instead of blocking the bridge forever.

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AuthError, GramcastError, ProtocolError, Result};

pub mod mock;

/// Deadline applied to every protocol operation submitted to the bridge.
pub const OP_TIMEOUT: Duration = Duration::from_secs(20);

/// A resolved destination (group, channel or user) on the protocol side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: i64,
    pub title: Option<String>,
}

/// One conversation visible to an account.
#[derive(Debug, Clone, Serialize)]
pub struct Dialog {
    pub id: i64,
    pub title: String,
    pub is_group: bool,
    pub is_channel: bool,
}

/// The signed-in user behind a session.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub first_name: String,
    pub identifier: String,
}

/// Capability interface of one authenticated protocol connection.
///
/// Implementations are driven from exactly one thread at a time: the
/// orchestrator submits every call through the
/// [`AsyncBridge`](crate::bridge::AsyncBridge), so no internal
/// synchronization against concurrent orchestrator calls is required.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    async fn connect(&self) -> std::result::Result<(), ProtocolError>;

    async fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Whether the session credential behind this client is authorized.
    async fn is_authorized(&self) -> bool;

    /// Request a login code for the given account identifier.
    async fn send_code(&self, identifier: &str) -> std::result::Result<(), AuthError>;

    /// Submit the login code.
    ///
    /// `AuthError::SecondFactorRequired` means the login must continue with
    /// [`sign_in_password`](Self::sign_in_password); it is not terminal.
    async fn sign_in_code(&self, code: &str) -> std::result::Result<UserInfo, AuthError>;

    /// Submit the second-factor password.
    async fn sign_in_password(&self, password: &str) -> std::result::Result<UserInfo, AuthError>;

    /// All dialogs visible to this account. Finite, one-shot per call.
    async fn dialogs(&self) -> std::result::Result<Vec<Dialog>, ProtocolError>;

    /// Resolve a username or numeric id to an entity.
    async fn get_entity(&self, identifier: &str) -> std::result::Result<Entity, ProtocolError>;

    async fn send_message(
        &self,
        entity: &Entity,
        text: &str,
    ) -> std::result::Result<(), ProtocolError>;

    async fn join_channel(&self, entity: &Entity) -> std::result::Result<(), ProtocolError>;

    /// Import a private invite by its hash (the `+`/`joinchat/` token).
    async fn import_invite(&self, hash: &str) -> std::result::Result<(), ProtocolError>;
}

/// Constructs a client bound to one session-credential file.
///
/// The file does not have to exist yet; a client created for a fresh login
/// writes the credential on successful authorization.
pub trait ClientFactory: Send + Sync {
    fn create(&self, session_path: &Path) -> Result<Arc<dyn ProtocolClient>>;
}

/// Run a protocol operation under [`OP_TIMEOUT`].
///
/// An elapsed deadline becomes [`ProtocolError::Timeout`], which callers
/// treat like any other per-operation failure.
pub async fn with_timeout<T, E>(
    fut: impl std::future::Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    GramcastError: From<E>,
{
    bounded(OP_TIMEOUT, fut).await
}

async fn bounded<T, E>(
    deadline: Duration,
    fut: impl std::future::Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    GramcastError: From<E>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(ProtocolError::Timeout(deadline.as_secs()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_value_through() {
        let result: Result<u32> =
            with_timeout(async { Ok::<_, ProtocolError>(7u32) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_with_timeout_propagates_failure() {
        let result: Result<()> = with_timeout(async {
            Err::<(), _>(ProtocolError::Send("relay closed".to_string()))
        })
        .await;
        assert!(matches!(
            result,
            Err(GramcastError::Protocol(ProtocolError::Send(_)))
        ));
    }

    #[tokio::test]
    async fn test_elapsed_deadline_becomes_timeout_error() {
        let result: Result<()> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, ProtocolError>(())
        })
        .await;
        assert!(matches!(
            result,
            Err(GramcastError::Protocol(ProtocolError::Timeout(_)))
        ));
    }
}
