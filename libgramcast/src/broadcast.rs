//! Broadcast scheduler
//!
//! Round-robins the connected accounts over an ordered destination list,
//! sending one message per destination with a delay between sends,
//! optionally cycling forever. The job runs on its own supervisory thread
//! and submits every protocol action through the
//! [`AsyncBridge`](crate::bridge::AsyncBridge).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bridge::AsyncBridge;
use crate::cancel::CancelToken;
use crate::error::{GramcastError, Result};
use crate::protocol::{with_timeout, ProtocolClient};
use crate::registry::AccountRegistry;

/// Parameters of one broadcast job
#[derive(Debug, Clone)]
pub struct BroadcastParams {
    /// Destination identifiers (numeric group/channel ids), in send order
    pub destinations: Vec<String>,
    pub message: String,
    /// Wait between two sends
    pub delay: Duration,
    /// Keep cycling over the destination list until stopped
    pub auto_repeat: bool,
    /// Wait between two cycles when auto-repeating
    pub repeat_interval: Duration,
}

struct Worker {
    identifier: String,
    client: Arc<dyn ProtocolClient>,
}

pub struct BroadcastScheduler {
    bridge: Arc<AsyncBridge>,
    registry: AccountRegistry,
    active: Arc<AtomicBool>,
    token: Mutex<CancelToken>,
}

impl BroadcastScheduler {
    pub fn new(bridge: Arc<AsyncBridge>, registry: AccountRegistry) -> Self {
        Self {
            bridge,
            registry,
            active: Arc::new(AtomicBool::new(false)),
            token: Mutex::new(CancelToken::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a broadcast job on a supervisory thread.
    ///
    /// Fails with [`GramcastError::NoActiveAccounts`] on an empty registry
    /// and with [`GramcastError::JobAlreadyRunning`] while a previous job
    /// is still going. An empty destination list completes immediately.
    ///
    /// The returned handle can be joined to wait for the job; dropping it
    /// leaves the job running detached.
    pub fn start(&self, params: BroadcastParams) -> Result<thread::JoinHandle<()>> {
        if self.registry.is_empty() {
            return Err(GramcastError::NoActiveAccounts);
        }
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GramcastError::JobAlreadyRunning);
        }

        let token = CancelToken::new();
        *self.token.lock().unwrap() = token.clone();

        let bridge = self.bridge.clone();
        let registry = self.registry.clone();
        let active = self.active.clone();
        thread::Builder::new()
            .name("gramcast-broadcast".to_string())
            .spawn(move || {
                run_job(&bridge, &registry, &params, &token);
                active.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.active.store(false, Ordering::SeqCst);
                GramcastError::Io(e)
            })
    }

    /// Request the running job to stop.
    ///
    /// Cooperative: takes effect at the next checkpoint (before the next
    /// send or the next inter-cycle sleep), so stop latency is bounded by
    /// one delay interval and an in-flight send completes.
    pub fn stop(&self) {
        self.token.lock().unwrap().cancel();
    }
}

fn run_job(
    bridge: &AsyncBridge,
    registry: &AccountRegistry,
    params: &BroadcastParams,
    token: &CancelToken,
) {
    // Snapshot workers once; the list persists across cycles. The snapshot
    // itself runs on the bridge like every other registry access.
    let snapshot = {
        let registry = registry.clone();
        match bridge.run_sync(async move { Ok(registry.snapshot()) }) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("broadcast aborted, could not snapshot accounts: {e}");
                return;
            }
        }
    };

    let mut workers = Vec::with_capacity(snapshot.len());
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
            // Keep the worker anyway; its sends will fail individually.
            warn!(account = %identifier, "reconnect failed before broadcast: {e}");
        }
        workers.push(Worker { identifier, client });
    }
    if workers.is_empty() {
        warn!("broadcast aborted: no accounts in snapshot");
        return;
    }

    let worker_count = workers.len();
    let mut cycle: u64 = 0;
    'job: loop {
        cycle += 1;
        if params.auto_repeat {
            info!(cycle, "broadcast cycle started");
        }

        for (index, destination) in params.destinations.iter().enumerate() {
            if token.is_cancelled() {
                info!("broadcast stopped");
                break 'job;
            }

            // Destination i always goes to worker i mod N, independent of
            // earlier failures.
            let worker = &workers[index % worker_count];
            match send_one(bridge, worker, destination, &params.message) {
                Ok(()) => {
                    info!(destination = %destination, account = %worker.identifier, "sent")
                }
                Err(e) => {
                    warn!(destination = %destination, account = %worker.identifier, "send failed: {e}")
                }
            }

            if !token.is_cancelled() {
                debug!(secs = params.delay.as_secs(), "waiting before next send");
                thread::sleep(params.delay);
            }
        }

        if !params.auto_repeat {
            break;
        }
        if token.is_cancelled() {
            info!("broadcast stopped");
            break;
        }
        info!(
            cycle,
            next_in_secs = params.repeat_interval.as_secs(),
            "broadcast cycle complete"
        );
        thread::sleep(params.repeat_interval);
    }

    info!("broadcast finished");
}

fn send_one(
    bridge: &AsyncBridge,
    worker: &Worker,
    destination: &str,
    message: &str,
) -> Result<()> {
    let client = worker.client.clone();
    let destination = destination.to_string();
    let message = message.to_string();
    bridge.run_sync(async move {
        let entity = with_timeout(client.get_entity(&destination)).await?;
        with_timeout(client.send_message(&entity, &message)).await?;
        Ok(())
    })
}
