//! Canonical cluster state
//!
//! Each operator reports its own status vocabulary. Both are mapped onto
//! [`ClusterState`] through static tables; values missing from a table are
//! treated as a transition in progress.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::controller::engine::EngineKind;

/// Canonical state of a database cluster.
///
/// The ordering is the discriminant order and is only meaningful for
/// reducing PSMDB replica set members to one worst state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ClusterState {
    Invalid = 0,
    Changing = 1,
    Failed = 2,
    Ready = 3,
    Deleting = 4,
    Paused = 5,
}

impl ClusterState {
    pub const ALL: [ClusterState; 6] = [
        ClusterState::Invalid,
        ClusterState::Changing,
        ClusterState::Failed,
        ClusterState::Ready,
        ClusterState::Deleting,
        ClusterState::Paused,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ClusterState::Invalid => "invalid",
            ClusterState::Changing => "changing",
            ClusterState::Failed => "failed",
            ClusterState::Ready => "ready",
            ClusterState::Deleting => "deleting",
            ClusterState::Paused => "paused",
        }
    }

    /// Connection credentials are only handed out in these states
    pub fn exposes_credentials(self) -> bool {
        matches!(self, ClusterState::Ready | ClusterState::Changing)
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const XTRADB_STATES: &[(&str, ClusterState)] = &[
    ("unknown", ClusterState::Invalid),
    ("initializing", ClusterState::Changing),
    ("ready", ClusterState::Ready),
    ("error", ClusterState::Failed),
    ("paused", ClusterState::Paused),
    ("stopping", ClusterState::Changing),
];

const PSMDB_STATES: &[(&str, ClusterState)] = &[
    ("unknown", ClusterState::Invalid),
    ("pending", ClusterState::Changing),
    ("initializing", ClusterState::Changing),
    ("ready", ClusterState::Ready),
    ("error", ClusterState::Failed),
    ("paused", ClusterState::Paused),
    ("stopping", ClusterState::Changing),
];

fn lookup(table: &[(&str, ClusterState)], engine: EngineKind, raw: &str) -> ClusterState {
    table
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, state)| *state)
        .unwrap_or_else(|| {
            warn!(
                engine = %engine,
                state = raw,
                "unrecognized cluster state, treating as changing"
            );
            ClusterState::Changing
        })
}

/// Map an XtraDB operator status to the canonical state
pub fn xtradb_state(raw: &str) -> ClusterState {
    lookup(XTRADB_STATES, EngineKind::Xtradb, raw)
}

/// Map a PSMDB operator status to the canonical state.
///
/// A top-level `error` is not trusted on its own: the operator reports it
/// while individual members recover, so the worst member state is used
/// instead. No members at all yields [`ClusterState::Invalid`].
pub fn psmdb_state<'a, I>(raw: &str, members: I) -> ClusterState
where
    I: IntoIterator<Item = &'a str>,
{
    if !raw.eq_ignore_ascii_case("error") {
        return lookup(PSMDB_STATES, EngineKind::Psmdb, raw);
    }

    let mut members = members.into_iter().peekable();
    if members.peek().is_none() {
        return ClusterState::Invalid;
    }
    members
        .map(|member| lookup(PSMDB_STATES, EngineKind::Psmdb, member))
        .fold(ClusterState::Failed, std::cmp::min)
}
