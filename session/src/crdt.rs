// session/src/crdt.rs
// The CRDT exchange from spec §4.3 treats document state as an opaque byte
// string with one algebraic law (§3): `merge(a, b) = merge(b, a)`,
// idempotent, associative. This crate never inspects that structure — it
// only calls `snapshot`/`merge` and tags every inbound merge with its
// origin peer, which is the replication layer's single most important
// invariant (the echo-avoidance note in spec §9).
//
// Per Design Notes §9's recommended strengthening, origin filtering is an
// explicit check in the fan-out path (`session::session`'s per-transport
// send loop compares a change's origin against the transport's remote peer
// id) rather than an implicit convention threaded through observer
// callback arguments.

use room_protocol::ids::PeerId;

/// A local or remote mutation to the document. `origin` is `None` for a
/// change the embedding application made directly (`RoomSession::
/// apply_local_change`) and `Some(peer)` for one merged in from a
/// transport — never echoed back to that same peer.
#[derive(Debug, Clone)]
pub struct CrdtChange {
    pub bytes: Vec<u8>,
    pub origin: Option<PeerId>,
}

/// The opaque document the session manager merges updates into. A real
/// embedding application backs this with its actual CRDT library (e.g. a
/// Yjs/Automerge binding); `InMemorySetDocument` below is the fully-worked
/// fake this repository's tests and `demo-peer` binary use instead.
pub trait CrdtDocument: Send {
    /// Full current state, as sent in `sync-response` and used to seed a
    /// freshly joined peer.
    fn snapshot(&self) -> Vec<u8>;

    /// Merge `bytes` — either a full snapshot or an incremental update —
    /// into local state. Must satisfy the commutative/idempotent/
    /// associative law in spec §3 regardless of call order.
    fn merge(&mut self, bytes: &[u8], origin: Option<PeerId>);
}

/// A toy CRDT: a grow-only set of newline-separated string items,
/// serialized sorted so two documents holding the same set always produce
/// byte-identical snapshots. Union is commutative, idempotent, and
/// associative by construction, which is all spec §3 requires of the
/// opaque state this crate carries — it is not a production CRDT and isn't
/// meant to be one.
#[derive(Debug, Default, Clone)]
pub struct InMemorySetDocument {
    items: std::collections::BTreeSet<String>,
}

impl InMemorySetDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one item locally. Returns the encoded update to hand to
    /// `RoomSession::apply_local_change`.
    pub fn insert(&mut self, item: impl Into<String>) -> Vec<u8> {
        let item = item.into();
        self.items.insert(item.clone());
        item.into_bytes()
    }

    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CrdtDocument for InMemorySetDocument {
    fn snapshot(&self) -> Vec<u8> {
        self.items.iter().cloned().collect::<Vec<_>>().join("\n").into_bytes()
    }

    fn merge(&mut self, bytes: &[u8], _origin: Option<PeerId>) {
        if bytes.is_empty() {
            return;
        }
        if let Ok(text) = std::str::from_utf8(bytes) {
            // A snapshot: newline-separated. An incremental update is a
            // single item and parses identically either way, since the set
            // union is idempotent over both representations.
            for item in text.split('\n').filter(|s| !s.is_empty()) {
                self.items.insert(item.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_commutative() {
        let mut a = InMemorySetDocument::new();
        a.insert("alpha");
        a.insert("beta");

        let mut left = InMemorySetDocument::new();
        left.merge(&a.snapshot(), None);

        let mut right = InMemorySetDocument::new();
        right.insert("gamma");
        let b_snapshot = right.snapshot();
        right.merge(&a.snapshot(), None);

        let mut other_order = InMemorySetDocument::new();
        other_order.merge(&a.snapshot(), None);
        other_order.merge(&b_snapshot, None);

        assert_eq!(right.snapshot(), other_order.snapshot());
    }

    #[test]
    fn merge_is_idempotent() {
        let mut doc = InMemorySetDocument::new();
        doc.insert("alpha");
        let snapshot = doc.snapshot();

        let mut other = InMemorySetDocument::new();
        other.merge(&snapshot, None);
        other.merge(&snapshot, None);
        other.merge(&snapshot, None);

        assert_eq!(other.snapshot(), snapshot);
    }

    #[test]
    fn two_hundred_distinct_items_converge() {
        let mut a = InMemorySetDocument::new();
        let mut b = InMemorySetDocument::new();
        for i in 0..100 {
            a.insert(format!("a-{i}"));
        }
        for i in 0..100 {
            b.insert(format!("b-{i}"));
        }

        let a_snapshot = a.snapshot();
        let b_snapshot = b.snapshot();
        a.merge(&b_snapshot, None);
        b.merge(&a_snapshot, None);

        assert_eq!(a.len(), 200);
        assert_eq!(a.snapshot(), b.snapshot());
    }
}
