//! Identifiers for characters in a replicated text document.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one replica (one copy of a document).
///
/// Chosen at random when a document is created; collisions are treated as
/// impossible in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaId(pub u64);

impl ReplicaId {
    /// Generates a random replica id.
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Globally unique identifier of a single character entry.
///
/// `counter` is a Lamport clock: a replica always stamps a new character with
/// a counter greater than every counter it has seen. Ids are totally ordered
/// by `counter`, then by `replica`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id {
    pub counter: u64,
    pub replica: ReplicaId,
}

impl Id {
    pub fn new(replica: ReplicaId, counter: u64) -> Self {
        Self { counter, replica }
    }

    /// Returns the id `offset` positions further along the same replica's run.
    pub fn offset(self, offset: u64) -> Self {
        Self {
            counter: self.counter + offset,
            replica: self.replica,
        }
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.replica.cmp(&other.replica))
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, self.replica)
    }
}
