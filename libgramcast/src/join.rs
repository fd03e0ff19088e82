//! Mass-join orchestrator
//!
//! Every connected account walks the same truncated destination list, one
//! account at a time, one destination at a time, with a fixed flood-control
//! delay after each attempt. There is no cancellation hook: once started, a
//! sweep runs to completion.

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::bridge::AsyncBridge;
use crate::error::{GramcastError, Result};
use crate::links::JoinTarget;
use crate::protocol::{with_timeout, ProtocolClient};
use crate::registry::AccountRegistry;

pub struct JoinOrchestrator {
    bridge: Arc<AsyncBridge>,
    registry: AccountRegistry,
    flood_delay: Duration,
}

impl JoinOrchestrator {
    pub fn new(bridge: Arc<AsyncBridge>, registry: AccountRegistry, flood_delay: Duration) -> Self {
        Self {
            bridge,
            registry,
            flood_delay,
        }
    }

    /// Run a sweep on the calling thread, blocking until it completes.
    ///
    /// Only the first `join_count` links are attempted; a count larger than
    /// the list clamps to the list length. Fails with
    /// [`GramcastError::NoActiveAccounts`] on an empty registry; every
    /// other failure is per-destination and non-fatal.
    pub fn run(&self, links: &[String], join_count: usize) -> Result<()> {
        if self.registry.is_empty() {
            return Err(GramcastError::NoActiveAccounts);
        }
        run_sweep(
            &self.bridge,
            &self.registry,
            links,
            join_count,
            self.flood_delay,
        );
        Ok(())
    }

    /// Run a sweep detached on a supervisory thread.
    pub fn start(&self, links: Vec<String>, join_count: usize) -> Result<thread::JoinHandle<()>> {
        if self.registry.is_empty() {
            return Err(GramcastError::NoActiveAccounts);
        }
        let bridge = self.bridge.clone();
        let registry = self.registry.clone();
        let flood_delay = self.flood_delay;
        thread::Builder::new()
            .name("gramcast-join".to_string())
            .spawn(move || run_sweep(&bridge, &registry, &links, join_count, flood_delay))
            .map_err(GramcastError::Io)
    }
}

fn run_sweep(
    bridge: &AsyncBridge,
    registry: &AccountRegistry,
    links: &[String],
    join_count: usize,
    flood_delay: Duration,
) {
    let targets: Vec<&String> = links.iter().take(join_count).collect();

    let snapshot = {
        let registry = registry.clone();
        match bridge.run_sync(async move { Ok(registry.snapshot()) }) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("mass join aborted, could not snapshot accounts: {e}");
                return;
            }
        }
    };

    info!(
        accounts = snapshot.len(),
        targets = targets.len(),
        "mass join started"
    );

    for (identifier, client) in snapshot {
        let c = client.clone();
        let connected = bridge.run_sync(async move {
            if c.is_connected() {
                Ok(())
            } else {
                with_timeout(c.connect()).await
            }
        });
        if let Err(e) = connected {
            warn!(account = %identifier, "reconnect failed before join sweep: {e}");
        }

        let mut joined = 0usize;
        for link in &targets {
            let target = JoinTarget::parse(link);
            match join_one(bridge, &client, target.clone()) {
                Ok(()) => {
                    joined += 1;
                    info!(account = %identifier, target = %target, "joined");
                }
                Err(e) => {
                    warn!(account = %identifier, link = %link, "join failed: {e}");
                }
            }
            // Flood control, applied after every attempt.
            thread::sleep(flood_delay);
        }
        info!(account = %identifier, joined, targets = targets.len(), "account sweep done");
    }

    info!("mass join complete");
}

fn join_one(
    bridge: &AsyncBridge,
    client: &Arc<dyn ProtocolClient>,
    target: JoinTarget,
) -> Result<()> {
    let client = client.clone();
    bridge.run_sync(async move {
        match target {
            JoinTarget::Invite(hash) => {
                with_timeout(client.import_invite(&hash)).await?;
            }
            JoinTarget::Public(name) => {
                let entity = with_timeout(client.get_entity(&name)).await?;
                with_timeout(client.join_channel(&entity)).await?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::{MockClient, MockConfig};

    fn setup(accounts: &[(&str, Arc<MockClient>)]) -> JoinOrchestrator {
        let bridge = Arc::new(AsyncBridge::new().unwrap());
        let registry = AccountRegistry::new();
        for (identifier, client) in accounts {
            registry.insert(identifier.to_string(), client.clone());
        }
        JoinOrchestrator::new(bridge, registry, Duration::from_millis(0))
    }

    fn links(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_truncates_to_join_count_in_order() {
        let a = Arc::new(MockClient::authorized());
        let orchestrator = setup(&[("1", a.clone())]);

        orchestrator
            .run(&links(&["alpha", "beta", "gamma", "delta"]), 2)
            .unwrap();

        // Exactly the first two links, in order.
        assert_eq!(
            a.joined_channels(),
            vec![entity_id_of("alpha"), entity_id_of("beta")]
        );
    }

    fn entity_id_of(name: &str) -> i64 {
        name.bytes()
            .fold(0i64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as i64))
    }

    #[test]
    fn test_oversized_join_count_clamps() {
        let a = Arc::new(MockClient::authorized());
        let orchestrator = setup(&[("1", a.clone())]);

        orchestrator.run(&links(&["alpha", "beta"]), 50).unwrap();
        assert_eq!(a.joined_channels().len(), 2);
    }

    #[test]
    fn test_invites_are_imported_not_resolved() {
        let a = Arc::new(MockClient::authorized());
        let orchestrator = setup(&[("1", a.clone())]);

        orchestrator
            .run(
                &links(&["t.me/+AbCdEf12", "t.me/joinchat/XyZ", "t.me/public_one"]),
                3,
            )
            .unwrap();

        assert_eq!(
            a.imported_invites(),
            vec!["AbCdEf12".to_string(), "XyZ".to_string()]
        );
        assert_eq!(a.joined_channels(), vec![entity_id_of("public_one")]);
    }

    #[test]
    fn test_every_account_sweeps_the_full_list() {
        let a = Arc::new(MockClient::authorized());
        let b = Arc::new(MockClient::authorized());
        let orchestrator = setup(&[("1", a.clone()), ("2", b.clone())]);

        orchestrator.run(&links(&["alpha", "beta"]), 2).unwrap();

        // Not interleaved like the broadcaster: both accounts join both.
        assert_eq!(a.joined_channels().len(), 2);
        assert_eq!(b.joined_channels().len(), 2);
    }

    #[test]
    fn test_failure_on_one_destination_does_not_abort_sweep() {
        let a = Arc::new(MockClient::new(MockConfig {
            authorized: true,
            fail_entities: vec!["ghost".to_string()],
            ..Default::default()
        }));
        let orchestrator = setup(&[("1", a.clone())]);

        orchestrator
            .run(&links(&["alpha", "ghost", "beta"]), 3)
            .unwrap();

        // ghost failed to resolve; alpha and beta still went through.
        assert_eq!(
            a.joined_channels(),
            vec![entity_id_of("alpha"), entity_id_of("beta")]
        );
    }

    #[test]
    fn test_empty_registry_rejected() {
        let orchestrator = setup(&[]);
        assert!(matches!(
            orchestrator.run(&links(&["alpha"]), 1),
            Err(GramcastError::NoActiveAccounts)
        ));
        assert!(matches!(
            orchestrator.start(links(&["alpha"]), 1),
            Err(GramcastError::NoActiveAccounts)
        ));
    }

    #[test]
    fn test_detached_start_completes() {
        let a = Arc::new(MockClient::authorized());
        let orchestrator = setup(&[("1", a.clone())]);

        orchestrator
            .start(links(&["alpha"]), 1)
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(a.joined_channels().len(), 1);
    }
}
