//! The replicated text sequence.
//!
//! Characters live in a single vector in document order. Deleted characters
//! stay in place as tombstones so that ids referenced by concurrent updates
//! always resolve.
//!
//! Remote insertions are integrated with the RGA rule: starting right after
//! the character's origin, skip every entry whose id is greater than the new
//! id. Because counters are Lamport clocks, the skipped entries are exactly
//! the concurrent insertions at the same anchor that sort before the new one,
//! together with everything anchored on them.

use std::collections::HashSet;

use super::id::{Id, ReplicaId};
use super::update::{DeleteRun, InsertRun, Update, MAX_COUNTER};
use super::CrdtError;

/// Cap on deletions parked for characters that have not arrived yet.
pub const MAX_PENDING_DELETES: usize = 1 << 20;

#[derive(Debug, Clone)]
struct Entry {
    id: Id,
    origin: Option<Id>,
    ch: char,
    deleted: bool,
}

#[derive(Debug, Clone)]
struct PendingChar {
    id: Id,
    origin: Option<Id>,
    ch: char,
}

/// A replicated plain-text document.
#[derive(Debug, Clone)]
pub struct Document {
    replica: ReplicaId,
    /// Highest counter seen from any replica.
    clock: u64,
    entries: Vec<Entry>,
    known: HashSet<Id>,
    visible_len: usize,
    /// Characters whose origin has not arrived yet.
    pending_inserts: Vec<PendingChar>,
    /// Deletions whose target has not arrived yet.
    pending_deletes: HashSet<Id>,
    /// Position of the most recently integrated entry, used to resolve runs.
    last: Option<(Id, usize)>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document owned by a fresh random replica.
    pub fn new() -> Self {
        Self::with_replica(ReplicaId::random())
    }

    /// Creates an empty document owned by `replica`.
    pub fn with_replica(replica: ReplicaId) -> Self {
        Self {
            replica,
            clock: 0,
            entries: Vec::new(),
            known: HashSet::new(),
            visible_len: 0,
            pending_inserts: Vec::new(),
            pending_deletes: HashSet::new(),
            last: None,
        }
    }

    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    /// Number of visible characters.
    pub fn len(&self) -> usize {
        self.visible_len
    }

    pub fn is_empty(&self) -> bool {
        self.visible_len == 0
    }

    /// Returns the visible text: all non-tombstoned characters in order.
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .filter(|e| !e.deleted)
            .map(|e| e.ch)
            .collect()
    }

    /// Number of operations parked until their dependencies arrive.
    pub fn pending_len(&self) -> usize {
        self.pending_inserts.len() + self.pending_deletes.len()
    }

    /// Inserts `text` so that it starts at visible character `position`.
    ///
    /// Returns the update describing the new characters.
    pub fn local_insert(&mut self, position: usize, text: &str) -> Result<Update, CrdtError> {
        if position > self.visible_len {
            return Err(CrdtError::OutOfBounds {
                position,
                len: self.visible_len,
            });
        }
        if text.is_empty() {
            return Ok(Update::default());
        }

        let (index, origin) = if position == 0 {
            (0, None)
        } else {
            let at = self.visible_index(position - 1);
            (at + 1, Some(self.entries[at].id))
        };

        let count = text.chars().count() as u64;
        let clock = self
            .clock
            .checked_add(count)
            .filter(|&end| end < MAX_COUNTER)
            .ok_or(CrdtError::ClockExhausted)?;

        let first = Id::new(self.replica, self.clock + 1);
        let mut prev = origin;
        let mut new_entries = Vec::new();
        for (i, ch) in text.chars().enumerate() {
            let id = first.offset(i as u64);
            new_entries.push(Entry {
                id,
                origin: prev,
                ch,
                deleted: false,
            });
            self.known.insert(id);
            prev = Some(id);
        }

        let count = new_entries.len();
        self.clock = clock;
        self.visible_len += count;
        self.entries.splice(index..index, new_entries);
        if let Some(last) = prev {
            self.last = Some((last, index + count - 1));
        }

        Ok(Update {
            inserts: vec![InsertRun {
                id: first,
                origin,
                content: text.to_string(),
            }],
            deletes: Vec::new(),
        })
    }

    /// Tombstones `length` visible characters starting at `position`.
    ///
    /// Returns the update naming the deleted ids.
    pub fn local_delete(&mut self, position: usize, length: usize) -> Result<Update, CrdtError> {
        let end = position.saturating_add(length);
        if end > self.visible_len {
            return Err(CrdtError::OutOfBounds {
                position: end,
                len: self.visible_len,
            });
        }
        if length == 0 {
            return Ok(Update::default());
        }

        let mut deletes: Vec<DeleteRun> = Vec::new();
        let mut visible = 0;
        let mut removed = 0;
        for entry in self.entries.iter_mut() {
            if entry.deleted {
                continue;
            }
            if visible >= position {
                entry.deleted = true;
                removed += 1;
                if !deletes.last_mut().is_some_and(|run| run.try_extend(entry.id)) {
                    deletes.push(DeleteRun::single(entry.id));
                }
                if removed == length {
                    break;
                }
            }
            visible += 1;
        }
        self.visible_len -= removed;

        Ok(Update {
            inserts: Vec::new(),
            deletes,
        })
    }

    /// Merges a remote (or replayed) update into the document.
    ///
    /// Already-known insertions and already-tombstoned deletions are ignored.
    /// Returns true if the visible text changed.
    pub fn apply_update(&mut self, update: &Update) -> bool {
        let mut changed = false;

        for run in &update.inserts {
            for (id, origin, ch) in run.chars() {
                changed |= self.integrate(PendingChar { id, origin, ch });
            }
        }

        for run in &update.deletes {
            for id in run.ids() {
                changed |= self.remote_delete(id);
            }
        }
        if self.pending_deletes.len() >= MAX_PENDING_DELETES {
            tracing::warn!(
                "{} deletions wait for unknown characters; further ones are dropped",
                self.pending_deletes.len()
            );
        }

        changed | self.drain_pending()
    }

    /// Decodes and applies an encoded update.
    pub fn apply_encoded(&mut self, data: &[u8]) -> Result<bool, CrdtError> {
        let update = Update::decode(data)?;
        Ok(self.apply_update(&update))
    }

    /// Builds an update that recreates this document, tombstones included.
    pub fn full_state(&self) -> Update {
        let mut inserts: Vec<InsertRun> = Vec::new();
        let mut deletes: Vec<DeleteRun> = Vec::new();
        let mut prev: Option<Id> = None;

        for entry in &self.entries {
            let extends = prev.is_some_and(|p| entry.origin == Some(p) && entry.id == p.offset(1));
            match inserts.last_mut() {
                Some(run) if extends => run.content.push(entry.ch),
                _ => inserts.push(InsertRun {
                    id: entry.id,
                    origin: entry.origin,
                    content: entry.ch.to_string(),
                }),
            }
            prev = Some(entry.id);

            if entry.deleted {
                if !deletes.last_mut().is_some_and(|run| run.try_extend(entry.id)) {
                    deletes.push(DeleteRun::single(entry.id));
                }
            }
        }

        for pending in &self.pending_inserts {
            inserts.push(InsertRun {
                id: pending.id,
                origin: pending.origin,
                content: pending.ch.to_string(),
            });
        }
        deletes.extend(self.pending_deletes.iter().copied().map(DeleteRun::single));

        Update { inserts, deletes }
    }

    /// Encodes the full state of the document.
    pub fn encode_full_state(&self) -> Result<Vec<u8>, CrdtError> {
        self.full_state().encode()
    }

    /// Index into `entries` of the `n`th visible character.
    fn visible_index(&self, n: usize) -> usize {
        let mut visible = 0;
        for (index, entry) in self.entries.iter().enumerate() {
            if !entry.deleted {
                if visible == n {
                    return index;
                }
                visible += 1;
            }
        }
        self.entries.len()
    }

    fn index_of(&self, id: Id) -> Option<usize> {
        if let Some((last_id, index)) = self.last {
            if last_id == id && self.entries.get(index).map(|e| e.id) == Some(id) {
                return Some(index);
            }
        }
        self.entries.iter().position(|e| e.id == id)
    }

    /// Places one character, or parks it if its origin is unknown.
    fn integrate(&mut self, pending: PendingChar) -> bool {
        if self.known.contains(&pending.id) {
            return false;
        }

        let mut index = match pending.origin {
            None => 0,
            Some(origin) => match self.index_of(origin) {
                Some(at) => at + 1,
                None => {
                    if !self.pending_inserts.iter().any(|p| p.id == pending.id) {
                        self.pending_inserts.push(pending);
                    }
                    return false;
                }
            },
        };

        while index < self.entries.len() && self.entries[index].id > pending.id {
            index += 1;
        }

        let deleted = self.pending_deletes.remove(&pending.id);
        self.entries.insert(
            index,
            Entry {
                id: pending.id,
                origin: pending.origin,
                ch: pending.ch,
                deleted,
            },
        );
        self.known.insert(pending.id);
        self.clock = self.clock.max(pending.id.counter);
        self.last = Some((pending.id, index));

        if deleted {
            false
        } else {
            self.visible_len += 1;
            true
        }
    }

    fn remote_delete(&mut self, id: Id) -> bool {
        if !self.known.contains(&id) {
            if self.pending_deletes.len() < MAX_PENDING_DELETES {
                self.pending_deletes.insert(id);
            }
            return false;
        }

        match self.index_of(id) {
            Some(index) if !self.entries[index].deleted => {
                self.entries[index].deleted = true;
                self.visible_len -= 1;
                true
            }
            _ => false,
        }
    }

    /// Retries parked insertions until no more can be placed.
    fn drain_pending(&mut self) -> bool {
        let mut changed = false;
        loop {
            let parked = std::mem::take(&mut self.pending_inserts);
            let before = parked.len();
            for pending in parked {
                changed |= self.integrate(pending);
            }
            if self.pending_inserts.is_empty() || self.pending_inserts.len() == before {
                return changed;
            }
        }
    }
}
