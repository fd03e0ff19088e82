//! Thread/event-loop bridge for protocol operations
//!
//! The protocol client library must never be driven from more than one
//! thread concurrently. [`AsyncBridge`] provides the single serialization
//! point: one long-lived background thread owns a current-thread tokio
//! runtime and drains a task channel, running each submitted operation to
//! completion before picking up the next. Callers on any thread block in
//! [`AsyncBridge::run_sync`] until their operation finishes.
//!
//! The bridge has daemon lifetime: it is created once and runs until
//! process shutdown, there is no teardown API. Operations execute in
//! submission order.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::mpsc;
use std::thread;

use crate::error::{GramcastError, Result};

type Task = BoxFuture<'static, ()>;

pub struct AsyncBridge {
    tx: mpsc::Sender<Task>,
}

impl AsyncBridge {
    /// Start the background execution context.
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Task>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| GramcastError::Bridge(format!("failed to build runtime: {e}")))?;
        thread::Builder::new()
            .name("gramcast-bridge".to_string())
            .spawn(move || {
                while let Ok(task) = rx.recv() {
                    runtime.block_on(task);
                }
            })
            .map_err(|e| GramcastError::Bridge(format!("failed to spawn bridge thread: {e}")))?;
        Ok(Self { tx })
    }

    /// Submit an operation and block until it completes on the bridge thread.
    ///
    /// Concurrent callers queue implicitly behind the single consumer;
    /// ordering between independent calls is their submission order.
    pub fn run_sync<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = mpsc::channel();
        let task: Task = Box::pin(async move {
            let _ = done_tx.send(operation.await);
        });
        self.tx
            .send(task)
            .map_err(|_| GramcastError::Bridge("bridge thread is gone".to_string()))?;
        done_rx
            .recv()
            .map_err(|_| GramcastError::Bridge("operation was dropped by the bridge".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_run_sync_returns_value() {
        let bridge = AsyncBridge::new().unwrap();
        let value = bridge.run_sync(async { Ok(41 + 1) }).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_run_sync_propagates_failure() {
        let bridge = AsyncBridge::new().unwrap();
        let result: Result<()> = bridge.run_sync(async {
            Err(GramcastError::InvalidInput("bad".to_string()))
        });
        assert!(matches!(result, Err(GramcastError::InvalidInput(_))));
    }

    #[test]
    fn test_operations_run_to_completion_in_submission_order() {
        let bridge = AsyncBridge::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        // The first operation sleeps before recording; if operations
        // interleaved, the second would record first.
        let l1 = log.clone();
        let l2 = log.clone();
        bridge
            .run_sync(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                l1.lock().unwrap().push(1);
                Ok(())
            })
            .unwrap();
        bridge
            .run_sync(async move {
                l2.lock().unwrap().push(2);
                Ok(())
            })
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_callers_on_other_threads_are_serialized() {
        let bridge = Arc::new(AsyncBridge::new().unwrap());
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let bridge = bridge.clone();
            let log = log.clone();
            handles.push(std::thread::spawn(move || {
                bridge
                    .run_sync(async move {
                        // Record entry and exit around a suspension point;
                        // serialized execution never interleaves them.
                        log.lock().unwrap().push((i, "in"));
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        log.lock().unwrap().push((i, "out"));
                        Ok(())
                    })
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 8);
        for pair in log.chunks(2) {
            assert_eq!(pair[0].0, pair[1].0, "operations interleaved: {:?}", *log);
            assert_eq!(pair[0].1, "in");
            assert_eq!(pair[1].1, "out");
        }
    }
}
