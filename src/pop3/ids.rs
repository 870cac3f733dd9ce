/*
 * ids.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Index/sequence-id conversion and the UID map.
//!
//! Callers address messages by a zero-based index; the wire always carries
//! a one-based sequence id. `seqid = index + 1` everywhere, with no
//! exceptions — a previous revision of this conversion had an off-by-one on
//! the pipelined-delete path that this type exists to make impossible.

use std::collections::HashMap;

/// Caller-facing message index, `0..total`.
pub type MessageIndex = u32;

/// Wire sequence id, `1..=total`.
pub type SequenceId = u32;

/// Convert a caller-supplied index to its wire sequence id.
pub fn seqid_of(index: MessageIndex) -> SequenceId {
    index + 1
}

/// Convert a wire sequence id back to a caller-facing index.
pub fn index_of(seqid: SequenceId) -> MessageIndex {
    seqid.saturating_sub(1)
}

/// Bidirectional uid <-> sequence-id map, populated on demand by `UIDL` and
/// invalidated on disconnect (a new session may assign different sequence
/// ids to the same uids).
#[derive(Debug, Clone, Default)]
pub struct UidMap {
    seqid_to_uid: HashMap<SequenceId, String>,
    uid_to_seqid: HashMap<String, SequenceId>,
}

impl UidMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, seqid: SequenceId, uid: impl Into<String>) {
        let uid = uid.into();
        self.uid_to_seqid.insert(uid.clone(), seqid);
        self.seqid_to_uid.insert(seqid, uid);
    }

    pub fn uid_for(&self, seqid: SequenceId) -> Option<&str> {
        self.seqid_to_uid.get(&seqid).map(|s| s.as_str())
    }

    pub fn seqid_for(&self, uid: &str) -> Option<SequenceId> {
        self.uid_to_seqid.get(uid).copied()
    }

    pub fn clear(&mut self) {
        self.seqid_to_uid.clear();
        self.uid_to_seqid.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seqid_is_index_plus_one() {
        assert_eq!(seqid_of(0), 1);
        assert_eq!(seqid_of(1), 2);
        assert_eq!(seqid_of(2), 3);
    }

    #[test]
    fn index_is_seqid_minus_one() {
        assert_eq!(index_of(1), 0);
        assert_eq!(index_of(3), 2);
    }

    #[test]
    fn uid_map_round_trips() {
        let mut map = UidMap::new();
        map.insert(1, "uid-a");
        map.insert(2, "uid-b");
        assert_eq!(map.uid_for(1), Some("uid-a"));
        assert_eq!(map.seqid_for("uid-b"), Some(2));
        map.clear();
        assert_eq!(map.uid_for(1), None);
    }
}
