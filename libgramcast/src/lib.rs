//! Gramcast - session pool orchestration for messaging accounts
//!
//! This library manages a pool of authenticated messaging-protocol sessions
//! and runs two long jobs across them: round-robin broadcast of a message to
//! a destination list, and sequential mass-join of invite/public links per
//! account. All protocol I/O is serialized through a single background
//! execution context (the [`bridge::AsyncBridge`]).

pub mod bridge;
pub mod broadcast;
pub mod cancel;
pub mod config;
pub mod error;
pub mod join;
pub mod links;
pub mod logging;
pub mod login;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod store;

// Re-export commonly used types
pub use bridge::AsyncBridge;
pub use broadcast::{BroadcastParams, BroadcastScheduler};
pub use cancel::CancelToken;
pub use config::Config;
pub use error::{GramcastError, Result};
pub use join::JoinOrchestrator;
pub use manager::SessionManager;
pub use registry::AccountRegistry;
pub use store::SessionStore;
