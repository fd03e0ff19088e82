//! Mock protocol client for testing
//!
//! A configurable client that can simulate connects, authorization state,
//! the code/second-factor login handshake, sends and joins, including
//! failures and latency. Available for all builds (not just tests) so the
//! integration suites and the CLI loopback transport can use it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use super::{ClientFactory, Dialog, Entity, ProtocolClient, UserInfo};
use crate::error::{AuthError, ProtocolError, Result};

/// Configuration for mock client behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Whether `connect` succeeds
    pub connect_succeeds: bool,

    /// Authorization state of the underlying session credential
    pub authorized: bool,

    /// The login code `sign_in_code` accepts
    pub login_code: String,

    /// If set, a correct code is answered with `SecondFactorRequired` and
    /// this is the password `sign_in_password` accepts
    pub second_factor: Option<String>,

    /// Whether `send_message` succeeds
    pub send_succeeds: bool,

    /// Whether `join_channel` / `import_invite` succeed
    pub join_succeeds: bool,

    /// Identifiers `get_entity` refuses to resolve
    pub fail_entities: Vec<String>,

    /// Dialogs returned by `dialogs`
    pub dialogs: Vec<Dialog>,

    /// The user reported on successful sign-in
    pub user: UserInfo,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            connect_succeeds: true,
            authorized: false,
            login_code: "12345".to_string(),
            second_factor: None,
            send_succeeds: true,
            join_succeeds: true,
            fail_entities: Vec::new(),
            dialogs: Vec::new(),
            user: UserInfo {
                first_name: "Mock".to_string(),
                identifier: "0".to_string(),
            },
            delay: Duration::from_millis(0),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    authorized: bool,
    connect_calls: usize,
    code_requests: Vec<String>,
    sent: Vec<(i64, String)>,
    joined: Vec<i64>,
    imported: Vec<String>,
}

/// Mock client for testing
pub struct MockClient {
    config: MockConfig,
    state: Mutex<MockState>,
}

impl MockClient {
    pub fn new(config: MockConfig) -> Self {
        let state = MockState {
            authorized: config.authorized,
            ..Default::default()
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// A session that connects and reports authorized
    pub fn authorized() -> Self {
        Self::new(MockConfig {
            authorized: true,
            ..Default::default()
        })
    }

    /// A stale session: connects fine but is not authorized
    pub fn unauthorized() -> Self {
        Self::new(MockConfig::default())
    }

    /// A session whose transport is unreachable
    pub fn connect_failure() -> Self {
        Self::new(MockConfig {
            connect_succeeds: false,
            ..Default::default()
        })
    }

    /// An authorized session whose sends all fail
    pub fn send_failure() -> Self {
        Self::new(MockConfig {
            authorized: true,
            send_succeeds: false,
            ..Default::default()
        })
    }

    /// A login protected by a second factor
    pub fn with_second_factor(code: &str, password: &str) -> Self {
        Self::new(MockConfig {
            login_code: code.to_string(),
            second_factor: Some(password.to_string()),
            ..Default::default()
        })
    }

    pub fn connect_calls(&self) -> usize {
        self.state.lock().unwrap().connect_calls
    }

    pub fn code_requests(&self) -> Vec<String> {
        self.state.lock().unwrap().code_requests.clone()
    }

    /// Messages sent through this client, as (entity id, text) pairs
    pub fn sent_messages(&self) -> Vec<(i64, String)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn joined_channels(&self) -> Vec<i64> {
        self.state.lock().unwrap().joined.clone()
    }

    pub fn imported_invites(&self) -> Vec<String> {
        self.state.lock().unwrap().imported.clone()
    }
}

/// Stable fake entity id: numeric identifiers map to themselves
fn entity_id(identifier: &str) -> i64 {
    identifier.parse::<i64>().unwrap_or_else(|_| {
        identifier
            .bytes()
            .fold(0i64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as i64))
    })
}

#[async_trait]
impl ProtocolClient for MockClient {
    async fn connect(&self) -> std::result::Result<(), ProtocolError> {
        sleep(self.config.delay).await;
        let mut state = self.state.lock().unwrap();
        state.connect_calls += 1;
        if !self.config.connect_succeeds {
            return Err(ProtocolError::Connection("mock transport unreachable".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self) {
        self.state.lock().unwrap().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn is_authorized(&self) -> bool {
        self.state.lock().unwrap().authorized
    }

    async fn send_code(&self, identifier: &str) -> std::result::Result<(), AuthError> {
        sleep(self.config.delay).await;
        self.state
            .lock()
            .unwrap()
            .code_requests
            .push(identifier.to_string());
        Ok(())
    }

    async fn sign_in_code(&self, code: &str) -> std::result::Result<UserInfo, AuthError> {
        sleep(self.config.delay).await;
        if code != self.config.login_code {
            return Err(AuthError::InvalidCode);
        }
        if self.config.second_factor.is_some() {
            return Err(AuthError::SecondFactorRequired);
        }
        self.state.lock().unwrap().authorized = true;
        Ok(self.config.user.clone())
    }

    async fn sign_in_password(&self, password: &str) -> std::result::Result<UserInfo, AuthError> {
        sleep(self.config.delay).await;
        match &self.config.second_factor {
            Some(expected) if expected == password => {
                self.state.lock().unwrap().authorized = true;
                Ok(self.config.user.clone())
            }
            _ => Err(AuthError::InvalidSecondFactor),
        }
    }

    async fn dialogs(&self) -> std::result::Result<Vec<Dialog>, ProtocolError> {
        sleep(self.config.delay).await;
        Ok(self.config.dialogs.clone())
    }

    async fn get_entity(&self, identifier: &str) -> std::result::Result<Entity, ProtocolError> {
        sleep(self.config.delay).await;
        if self.config.fail_entities.iter().any(|f| f == identifier) {
            return Err(ProtocolError::Resolution(identifier.to_string()));
        }
        Ok(Entity {
            id: entity_id(identifier),
            title: Some(identifier.to_string()),
        })
    }

    async fn send_message(
        &self,
        entity: &Entity,
        text: &str,
    ) -> std::result::Result<(), ProtocolError> {
        sleep(self.config.delay).await;
        if !self.config.send_succeeds {
            return Err(ProtocolError::Send("mock send failure".to_string()));
        }
        self.state
            .lock()
            .unwrap()
            .sent
            .push((entity.id, text.to_string()));
        Ok(())
    }

    async fn join_channel(&self, entity: &Entity) -> std::result::Result<(), ProtocolError> {
        sleep(self.config.delay).await;
        if !self.config.join_succeeds {
            return Err(ProtocolError::Join("mock join refused".to_string()));
        }
        self.state.lock().unwrap().joined.push(entity.id);
        Ok(())
    }

    async fn import_invite(&self, hash: &str) -> std::result::Result<(), ProtocolError> {
        sleep(self.config.delay).await;
        if !self.config.join_succeeds {
            return Err(ProtocolError::Join("mock invite refused".to_string()));
        }
        self.state.lock().unwrap().imported.push(hash.to_string());
        Ok(())
    }
}

/// Factory producing mock clients, one per session file.
///
/// Per-identifier overrides let a test give each account different behavior;
/// clients it has created stay reachable by identifier so tests can inspect
/// their recorded traffic.
pub struct MockFactory {
    template: MockConfig,
    overrides: Mutex<HashMap<String, MockConfig>>,
    created: Mutex<HashMap<String, Arc<MockClient>>>,
}

impl MockFactory {
    pub fn new(template: MockConfig) -> Self {
        Self {
            template,
            overrides: Mutex::new(HashMap::new()),
            created: Mutex::new(HashMap::new()),
        }
    }

    /// Use a specific configuration for one account identifier
    pub fn set_override(&self, identifier: &str, config: MockConfig) {
        self.overrides
            .lock()
            .unwrap()
            .insert(identifier.to_string(), config);
    }

    /// The most recently created client for an identifier, if any
    pub fn client(&self, identifier: &str) -> Option<Arc<MockClient>> {
        self.created.lock().unwrap().get(identifier).cloned()
    }
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl ClientFactory for MockFactory {
    fn create(&self, session_path: &Path) -> Result<Arc<dyn ProtocolClient>> {
        let identifier = session_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let config = self
            .overrides
            .lock()
            .unwrap()
            .get(&identifier)
            .cloned()
            .unwrap_or_else(|| self.template.clone());
        let client = Arc::new(MockClient::new(config));
        self.created
            .lock()
            .unwrap()
            .insert(identifier, client.clone());
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_sign_in_without_second_factor() {
        let client = MockClient::unauthorized();
        client.connect().await.unwrap();
        assert!(!client.is_authorized().await);

        client.send_code("15551234").await.unwrap();
        let user = client.sign_in_code("12345").await.unwrap();
        assert_eq!(user.first_name, "Mock");
        assert!(client.is_authorized().await);
        assert_eq!(client.code_requests(), vec!["15551234".to_string()]);
    }

    #[tokio::test]
    async fn test_sign_in_with_second_factor() {
        let client = MockClient::with_second_factor("777", "hunter2");
        client.connect().await.unwrap();

        assert_eq!(
            client.sign_in_code("777").await.unwrap_err(),
            AuthError::SecondFactorRequired
        );
        assert!(!client.is_authorized().await);

        assert_eq!(
            client.sign_in_password("wrong").await.unwrap_err(),
            AuthError::InvalidSecondFactor
        );
        assert!(!client.is_authorized().await);

        client.sign_in_password("hunter2").await.unwrap();
        assert!(client.is_authorized().await);
    }

    #[tokio::test]
    async fn test_entity_resolution_and_recorded_sends() {
        let client = MockClient::authorized();
        client.connect().await.unwrap();

        let entity = client.get_entity("-100200300").await.unwrap();
        assert_eq!(entity.id, -100200300);
        client.send_message(&entity, "hello").await.unwrap();
        assert_eq!(client.sent_messages(), vec![(-100200300, "hello".to_string())]);
    }

    #[tokio::test]
    async fn test_failing_entity() {
        let client = MockClient::new(MockConfig {
            fail_entities: vec!["ghost".to_string()],
            ..Default::default()
        });
        client.connect().await.unwrap();
        assert!(client.get_entity("ghost").await.is_err());
        assert!(client.get_entity("real_chat").await.is_ok());
    }

    #[test]
    fn test_factory_override_and_lookup() {
        let factory = MockFactory::default();
        factory.set_override(
            "111",
            MockConfig {
                connect_succeeds: false,
                ..Default::default()
            },
        );

        factory.create(&PathBuf::from("/tmp/111.session")).unwrap();
        factory.create(&PathBuf::from("/tmp/222.session")).unwrap();

        assert!(factory.client("111").is_some());
        assert!(factory.client("222").is_some());
        assert!(factory.client("333").is_none());
    }
}
