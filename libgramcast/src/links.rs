//! Join-link normalization and classification
//!
//! Mass-join input is a mixed bag of full URLs, bare usernames and private
//! invite links, sometimes with trailing sub-paths
//! (`https://t.me/chat_3/20162324`). Normalization strips the known host
//! prefixes, keeps only the first path segment unless the link is
//! invite-marked, and classifies the remainder.

use std::fmt;

const HOST_PREFIXES: &[&str] = &["https://t.me/", "http://t.me/", "t.me/"];
const INVITE_PATH: &str = "joinchat/";

/// A classified join destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinTarget {
    /// Public group or channel, joined by resolving the identifier
    Public(String),
    /// Private invite, imported by its hash
    Invite(String),
}

impl JoinTarget {
    pub fn parse(link: &str) -> JoinTarget {
        let mut rest = link.trim();
        for prefix in HOST_PREFIXES {
            if let Some(stripped) = rest.strip_prefix(prefix) {
                rest = stripped;
                break;
            }
        }

        // A trailing sub-path (message id etc.) is noise unless this is an
        // invite path; keep only the first segment.
        if rest.contains('/') && !rest.starts_with(INVITE_PATH) {
            rest = rest.split('/').next().unwrap_or(rest);
        }

        if let Some(hash) = rest.strip_prefix('+') {
            JoinTarget::Invite(hash.to_string())
        } else if let Some(hash) = rest.strip_prefix(INVITE_PATH) {
            JoinTarget::Invite(hash.to_string())
        } else {
            JoinTarget::Public(rest.to_string())
        }
    }
}

impl fmt::Display for JoinTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinTarget::Public(name) => write!(f, "{name}"),
            JoinTarget::Invite(hash) => write!(f, "+{hash}"),
        }
    }
}
