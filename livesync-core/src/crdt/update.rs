//! Incremental deltas exchanged between replicas.
//!
//! An [`Update`] is self-contained: every inserted character carries its own
//! id and the id of its left neighbour at creation time, and every deletion
//! names the ids it tombstones. Applying the same update twice, or a set of
//! updates in any order, yields the same document.

use serde::{Deserialize, Serialize};

use super::id::{Id, ReplicaId};
use super::CrdtError;

/// Exclusive upper bound on counters. The space above it is left so that
/// local clocks can never wrap.
pub const MAX_COUNTER: u64 = u64::MAX / 2;

/// Longest delete run a decoded update may carry.
pub const MAX_DELETE_RUN: u64 = 1 << 20;

/// A run of consecutive characters inserted by one replica.
///
/// Character `i` of `content` has id `id.offset(i)`. The first character is
/// anchored on `origin`; each following character is anchored on the one
/// before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertRun {
    pub id: Id,
    pub origin: Option<Id>,
    pub content: String,
}

impl InsertRun {
    /// Iterates the run as `(id, origin, char)` triples.
    pub fn chars(&self) -> impl Iterator<Item = (Id, Option<Id>, char)> + '_ {
        self.content.chars().enumerate().map(move |(i, ch)| {
            let i = i as u64;
            let origin = if i == 0 {
                self.origin
            } else {
                Some(self.id.offset(i - 1))
            };
            (self.id.offset(i), origin, ch)
        })
    }

    /// Number of characters in the run.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// A contiguous range of counters from one replica to tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRun {
    pub replica: ReplicaId,
    pub start: u64,
    pub len: u64,
}

impl DeleteRun {
    pub fn single(id: Id) -> Self {
        Self {
            replica: id.replica,
            start: id.counter,
            len: 1,
        }
    }

    /// Extends the run by `id` if it directly follows it.
    pub fn try_extend(&mut self, id: Id) -> bool {
        if id.replica == self.replica && id.counter == self.start + self.len {
            self.len += 1;
            true
        } else {
            false
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        (self.start..self.start + self.len).map(move |counter| Id::new(self.replica, counter))
    }
}

/// Serializable delta of insertions and deletions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub inserts: Vec<InsertRun>,
    #[serde(default)]
    pub deletes: Vec<DeleteRun>,
}

impl Update {
    /// Returns true if the update carries no operations.
    pub fn is_empty(&self) -> bool {
        self.inserts.iter().all(InsertRun::is_empty) && self.deletes.iter().all(|d| d.len == 0)
    }

    /// Appends the operations of `other` to this update.
    pub fn merge(&mut self, other: Update) {
        self.inserts.extend(other.inserts);
        for run in other.deletes {
            match self.deletes.last_mut() {
                Some(last) if last.replica == run.replica && last.start + last.len == run.start => {
                    last.len += run.len;
                }
                _ => self.deletes.push(run),
            }
        }
    }

    /// Encodes the update as CBOR bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CrdtError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CrdtError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes an update from CBOR bytes.
    ///
    /// Rejects counters from [`MAX_COUNTER`] up and delete runs longer than
    /// [`MAX_DELETE_RUN`].
    pub fn decode(data: &[u8]) -> Result<Self, CrdtError> {
        let update: Update =
            ciborium::from_reader(data).map_err(|e| CrdtError::Decode(e.to_string()))?;

        for run in &update.inserts {
            let end = run.id.counter.checked_add(run.len() as u64);
            if !end.is_some_and(|end| end <= MAX_COUNTER) {
                return Err(CrdtError::Decode(format!(
                    "insert run at {} exceeds the counter range",
                    run.id
                )));
            }
            if run.origin.is_some_and(|origin| origin.counter >= MAX_COUNTER) {
                return Err(CrdtError::Decode(format!(
                    "insert run at {} has an origin outside the counter range",
                    run.id
                )));
            }
        }
        for run in &update.deletes {
            if run.len > MAX_DELETE_RUN {
                return Err(CrdtError::Decode(format!(
                    "delete run at {}@{} is {} long",
                    run.start, run.replica, run.len
                )));
            }
            if run.start.saturating_add(run.len) > MAX_COUNTER {
                return Err(CrdtError::Decode(format!(
                    "delete run at {}@{} exceeds the counter range",
                    run.start, run.replica
                )));
            }
        }

        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(replica: u64, counter: u64) -> Id {
        Id::new(ReplicaId(replica), counter)
    }

    #[test]
    fn test_insert_run_chars_chain_origins() {
        let run = InsertRun {
            id: id(1, 10),
            origin: Some(id(2, 4)),
            content: "héy".to_string(),
        };

        let chars: Vec<_> = run.chars().collect();
        assert_eq!(
            chars,
            vec![
                (id(1, 10), Some(id(2, 4)), 'h'),
                (id(1, 11), Some(id(1, 10)), 'é'),
                (id(1, 12), Some(id(1, 11)), 'y'),
            ]
        );
        assert_eq!(run.len(), 3);
    }

    #[test]
    fn test_delete_run_extends_only_when_contiguous() {
        let mut run = DeleteRun::single(id(1, 5));
        assert!(run.try_extend(id(1, 6)));
        assert!(!run.try_extend(id(1, 8)));
        assert!(!run.try_extend(id(2, 7)));
        assert_eq!(run.ids().collect::<Vec<_>>(), vec![id(1, 5), id(1, 6)]);
    }

    #[test]
    fn test_merge_coalesces_adjacent_deletes() {
        let mut a = Update {
            inserts: vec![],
            deletes: vec![DeleteRun::single(id(1, 1))],
        };
        let b = Update {
            inserts: vec![],
            deletes: vec![DeleteRun::single(id(1, 2)), DeleteRun::single(id(3, 1))],
        };
        a.merge(b);
        assert_eq!(a.deletes.len(), 2);
        assert_eq!(a.deletes[0].len, 2);
    }

    #[test]
    fn test_empty_update() {
        assert!(Update::default().is_empty());
        let update = Update {
            inserts: vec![InsertRun {
                id: id(1, 1),
                origin: None,
                content: String::new(),
            }],
            deletes: vec![],
        };
        assert!(update.is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Update::decode(&[0xff, 0x00, 0x13]),
            Err(CrdtError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_overflowing_run() {
        let update = Update {
            inserts: vec![InsertRun {
                id: id(1, u64::MAX),
                origin: None,
                content: "ab".to_string(),
            }],
            deletes: vec![],
        };
        let bytes = update.encode().unwrap();
        assert!(Update::decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_counters_in_reserved_range() {
        let update = Update {
            inserts: vec![InsertRun {
                id: id(1, u64::MAX - 1),
                origin: None,
                content: "a".to_string(),
            }],
            deletes: vec![],
        };
        assert!(Update::decode(&update.encode().unwrap()).is_err());

        let at_limit = Update {
            inserts: vec![InsertRun {
                id: id(1, MAX_COUNTER - 1),
                origin: None,
                content: "a".to_string(),
            }],
            deletes: vec![],
        };
        assert!(Update::decode(&at_limit.encode().unwrap()).is_ok());
    }

    #[test]
    fn test_decode_rejects_oversized_delete_run() {
        let update = Update {
            inserts: vec![],
            deletes: vec![DeleteRun {
                replica: ReplicaId(1),
                start: 1,
                len: 3_000_000,
            }],
        };
        let bytes = update.encode().unwrap();
        assert!(bytes.len() < 64);
        assert!(matches!(Update::decode(&bytes), Err(CrdtError::Decode(_))));

        let capped = Update {
            inserts: vec![],
            deletes: vec![DeleteRun {
                replica: ReplicaId(1),
                start: 1,
                len: MAX_DELETE_RUN,
            }],
        };
        assert!(Update::decode(&capped.encode().unwrap()).is_ok());
    }

    #[test]
    fn test_encode_decode_preserves_runs() {
        let update = Update {
            inserts: vec![InsertRun {
                id: id(7, 3),
                origin: None,
                content: "日本".to_string(),
            }],
            deletes: vec![DeleteRun {
                replica: ReplicaId(2),
                start: 9,
                len: 4,
            }],
        };
        let decoded = Update::decode(&update.encode().unwrap()).unwrap();
        assert_eq!(decoded, update);
    }
}
