//! Pending-login state machine
//!
//! At most one login is in flight process-wide. The slot holds the
//! identifier and the not-yet-committed client between "start login" and
//! either successful authorization (promoted into the registry) or
//! abandonment. Starting a new login simply replaces the slot; an
//! abandoned client is garbage and is not cleaned up proactively.

use std::sync::Arc;

use crate::protocol::ProtocolClient;

#[derive(Default)]
pub enum PendingLogin {
    #[default]
    Empty,
    AwaitingCode {
        identifier: String,
        client: Arc<dyn ProtocolClient>,
    },
    AwaitingSecondFactor {
        identifier: String,
        client: Arc<dyn ProtocolClient>,
    },
}

impl PendingLogin {
    /// Take the current state, leaving the slot empty.
    pub fn take(&mut self) -> PendingLogin {
        std::mem::take(self)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PendingLogin::Empty)
    }

    /// Identifier of the login in flight, if any
    pub fn identifier(&self) -> Option<&str> {
        match self {
            PendingLogin::Empty => None,
            PendingLogin::AwaitingCode { identifier, .. }
            | PendingLogin::AwaitingSecondFactor { identifier, .. } => Some(identifier),
        }
    }
}
