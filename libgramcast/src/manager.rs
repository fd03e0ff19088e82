//! Session manager facade
//!
//! The boundary the request layer talks to: login flow, account listing and
//! removal, dialog listing, and the two job starters. Login, list and
//! remove block until complete; broadcast and join starts return as soon as
//! the job is detached on its supervisory thread. All protocol work is
//! routed through the single [`AsyncBridge`] execution context, registry
//! mutations included.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

use crate::bridge::AsyncBridge;
use crate::broadcast::{BroadcastParams, BroadcastScheduler};
use crate::config::Config;
use crate::error::{AuthError, GramcastError, Result};
use crate::join::JoinOrchestrator;
use crate::login::PendingLogin;
use crate::protocol::{with_timeout, ClientFactory, Dialog, UserInfo, OP_TIMEOUT};
use crate::registry::AccountRegistry;
use crate::store::SessionStore;

pub struct SessionManager {
    bridge: Arc<AsyncBridge>,
    registry: AccountRegistry,
    store: SessionStore,
    factory: Arc<dyn ClientFactory>,
    pending: Mutex<PendingLogin>,
    broadcaster: BroadcastScheduler,
    joiner: JoinOrchestrator,
}

impl SessionManager {
    /// Build the manager and reconcile persisted sessions with live
    /// connections (startup scan).
    pub fn new(config: &Config, factory: Arc<dyn ClientFactory>) -> Result<Self> {
        let bridge = Arc::new(AsyncBridge::new()?);
        let registry = AccountRegistry::new();
        let store = SessionStore::new(config.sessions_dir())?;
        let broadcaster = BroadcastScheduler::new(bridge.clone(), registry.clone());
        let joiner = JoinOrchestrator::new(
            bridge.clone(),
            registry.clone(),
            Duration::from_secs(config.join.flood_delay_secs),
        );

        let manager = Self {
            bridge,
            registry,
            store,
            factory,
            pending: Mutex::new(PendingLogin::Empty),
            broadcaster,
            joiner,
        };

        let loaded = {
            let store = manager.store.clone();
            let factory = manager.factory.clone();
            let registry = manager.registry.clone();
            manager
                .bridge
                .run_sync(async move { store.load_all(factory.as_ref(), &registry).await })?
        };
        info!(accounts = loaded, "sessions reconciled");
        Ok(manager)
    }

    /// Start a login: create a client on the account's session path,
    /// connect, request a code. Returns the normalized identifier.
    ///
    /// A login already in flight is replaced; its half-authenticated client
    /// is abandoned.
    pub fn start_login(&self, phone: &str) -> Result<String> {
        let identifier = normalize_identifier(phone)?;
        if self.registry.contains(&identifier) {
            return Err(GramcastError::AlreadyLoggedIn(identifier));
        }

        let path = self.store.session_path(&identifier);
        let client = self.factory.create(&path)?;

        {
            let client = client.clone();
            let identifier = identifier.clone();
            self.bridge.run_sync(async move {
                with_timeout(client.connect()).await?;
                with_timeout(client.send_code(&identifier)).await?;
                Ok(())
            })?;
        }

        *self.pending.lock().unwrap() = PendingLogin::AwaitingCode {
            identifier: identifier.clone(),
            client,
        };
        info!(account = %identifier, "login code sent");
        Ok(identifier)
    }

    /// Submit the login code for the pending login.
    ///
    /// `Err(Auth(SecondFactorRequired))` means the login continues with
    /// [`submit_password`](Self::submit_password); an invalid or expired
    /// code leaves the slot awaiting another code.
    pub fn submit_code(&self, code: &str) -> Result<UserInfo> {
        let mut slot = self.pending.lock().unwrap();
        let (identifier, client) = match slot.take() {
            PendingLogin::AwaitingCode { identifier, client } => (identifier, client),
            other => {
                *slot = other;
                return Err(GramcastError::NoPendingLogin);
            }
        };

        let outcome = {
            let client = client.clone();
            let registry = self.registry.clone();
            let identifier = identifier.clone();
            let code = code.to_string();
            self.bridge.run_sync(async move {
                let result = match timeout(OP_TIMEOUT, client.sign_in_code(&code)).await {
                    Ok(result) => result,
                    Err(_) => Err(AuthError::Other("sign-in timed out".to_string())),
                };
                if result.is_ok() {
                    registry.insert(identifier, client.clone());
                }
                Ok(result)
            })?
        };

        match outcome {
            Ok(user) => {
                *slot = PendingLogin::Empty;
                info!(account = %identifier, user = %user.first_name, "login successful");
                Ok(user)
            }
            Err(AuthError::SecondFactorRequired) => {
                *slot = PendingLogin::AwaitingSecondFactor { identifier, client };
                Err(AuthError::SecondFactorRequired.into())
            }
            Err(e) => {
                // Invalid or expired code: the caller may retry with a new one.
                *slot = PendingLogin::AwaitingCode { identifier, client };
                Err(e.into())
            }
        }
    }

    /// Submit the second-factor password for the pending login.
    ///
    /// A wrong password is non-fatal: the slot keeps awaiting the second
    /// factor and the account stays unauthorized.
    pub fn submit_password(&self, password: &str) -> Result<UserInfo> {
        let mut slot = self.pending.lock().unwrap();
        let (identifier, client) = match slot.take() {
            PendingLogin::AwaitingSecondFactor { identifier, client } => (identifier, client),
            other => {
                *slot = other;
                return Err(GramcastError::NoPendingLogin);
            }
        };

        let outcome = {
            let client = client.clone();
            let registry = self.registry.clone();
            let identifier = identifier.clone();
            let password = password.to_string();
            self.bridge.run_sync(async move {
                let result = match timeout(OP_TIMEOUT, client.sign_in_password(&password)).await {
                    Ok(result) => result,
                    Err(_) => Err(AuthError::Other("sign-in timed out".to_string())),
                };
                if result.is_ok() {
                    registry.insert(identifier, client.clone());
                }
                Ok(result)
            })?
        };

        match outcome {
            Ok(user) => {
                *slot = PendingLogin::Empty;
                info!(account = %identifier, user = %user.first_name, "login successful");
                Ok(user)
            }
            Err(e) => {
                *slot = PendingLogin::AwaitingSecondFactor { identifier, client };
                Err(e.into())
            }
        }
    }

    /// Identifiers of all active accounts
    pub fn list_accounts(&self) -> Vec<String> {
        self.registry.identifiers()
    }

    /// Best-effort removal: disconnect, drop from the registry, delete the
    /// credential file. Always succeeds.
    pub fn remove_account(&self, identifier: &str) -> Result<()> {
        let store = self.store.clone();
        let registry = self.registry.clone();
        let identifier_owned = identifier.to_string();
        self.bridge.run_sync(async move {
            store.remove(&identifier_owned, &registry).await;
            Ok(())
        })?;
        info!(account = %identifier, "account removed");
        Ok(())
    }

    /// Groups and channels visible to one account.
    ///
    /// An identifier with no live client yields an empty list.
    pub fn list_dialogs(&self, identifier: &str) -> Result<Vec<Dialog>> {
        let Some(client) = self.registry.get(identifier) else {
            return Ok(Vec::new());
        };
        self.bridge.run_sync(async move {
            if !client.is_connected() {
                with_timeout(client.connect()).await?;
            }
            let dialogs = with_timeout(client.dialogs()).await?;
            Ok(dialogs
                .into_iter()
                .filter(|d| d.is_group || d.is_channel)
                .collect())
        })
    }

    /// Start a broadcast job, detached. See
    /// [`BroadcastScheduler::start`] for the preconditions.
    pub fn start_broadcast(&self, params: BroadcastParams) -> Result<thread::JoinHandle<()>> {
        self.broadcaster.start(params)
    }

    /// Request the running broadcast to stop (cooperative, bounded by one
    /// delay interval).
    pub fn stop_broadcast(&self) {
        self.broadcaster.stop();
    }

    pub fn broadcast_running(&self) -> bool {
        self.broadcaster.is_running()
    }

    /// Start a mass-join sweep, detached.
    pub fn start_join(&self, links: Vec<String>, join_count: usize) -> Result<thread::JoinHandle<()>> {
        self.joiner.start(links, join_count)
    }

    /// Run a mass-join sweep in the foreground.
    pub fn run_join(&self, links: &[String], join_count: usize) -> Result<()> {
        self.joiner.run(links, join_count)
    }
}

/// Normalize a phone-like identifier: trim whitespace, drop the leading `+`.
fn normalize_identifier(phone: &str) -> Result<String> {
    let identifier = phone.trim().trim_start_matches('+').to_string();
    if identifier.is_empty() {
        return Err(GramcastError::InvalidInput(
            "empty account identifier".to_string(),
        ));
    }
    Ok(identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("+15551234").unwrap(), "15551234");
        assert_eq!(normalize_identifier(" 15551234 ").unwrap(), "15551234");
        assert_eq!(normalize_identifier("15551234").unwrap(), "15551234");
    }

    #[test]
    fn test_normalize_identifier_rejects_empty() {
        assert!(matches!(
            normalize_identifier("  "),
            Err(GramcastError::InvalidInput(_))
        ));
        assert!(matches!(
            normalize_identifier("+"),
            Err(GramcastError::InvalidInput(_))
        ));
    }
}
