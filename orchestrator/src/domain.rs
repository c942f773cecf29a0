//! Core escrow data model.
//!
//! `EscrowKind`'s ordinal ordering and `EscrowRef`'s sort key are pinned by
//! the priority-ordering contract: lower kind wins, then fewer prior
//! attempts, then oldest first-seen.

use serde::{Deserialize, Serialize};

/// Lifecycle kind of an escrow, ordered so lower ordinal means higher
/// priority for AI attention. `CREATED` is persisted only; `REFUNDED` and
/// `RELEASED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EscrowKind {
    Expired = 0,
    Cancelled = 1,
    Linked = 2,
    Extended = 3,
    Created = 4,
    Refunded = 5,
    Released = 6,
}

impl EscrowKind {
    /// Whether this kind flows through the priority cache.
    pub fn is_cache_eligible(self) -> bool {
        matches!(
            self,
            EscrowKind::Linked | EscrowKind::Extended | EscrowKind::Cancelled | EscrowKind::Expired
        )
    }

    /// Whether this kind is a terminal state (no further action required).
    pub fn is_terminal(self) -> bool {
        matches!(self, EscrowKind::Refunded | EscrowKind::Released)
    }

    /// Two-letter key prefix used for persistence, e.g. `ec` for `Created`.
    pub fn prefix(self) -> &'static str {
        match self {
            EscrowKind::Created => "ec",
            EscrowKind::Linked => "lk",
            EscrowKind::Extended => "ex",
            EscrowKind::Cancelled => "cn",
            EscrowKind::Expired => "xp",
            EscrowKind::Refunded => "rf",
            EscrowKind::Released => "rl",
        }
    }

    /// Resolves a kind from its persistence prefix.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Some(match prefix {
            "ec" => EscrowKind::Created,
            "lk" => EscrowKind::Linked,
            "ex" => EscrowKind::Extended,
            "cn" => EscrowKind::Cancelled,
            "xp" => EscrowKind::Expired,
            "rf" => EscrowKind::Refunded,
            "rl" => EscrowKind::Released,
            _ => return None,
        })
    }
}

/// Prefixes probed in order when resolving the latest known state for an id.
pub const LATEST_PROBE_ORDER: [&str; 7] = ["rf", "rl", "xp", "ex", "lk", "cn", "ec"];

/// Unix timestamp in seconds.
pub type Timestamp = u64;

pub fn now() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// A cached escrow awaiting AI attention.
///
/// Sort key is `(kind ordinal, seen_count, first_seen_at)` ascending: lower
/// kind wins, ties broken by fewer prior attempts, then by oldest first-seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRef {
    pub escrow_id: u64,
    pub kind: EscrowKind,
    pub first_seen_at: Timestamp,
    pub last_seen_at: Timestamp,
    pub seen_count: u32,
    pub locked: bool,
}

impl EscrowRef {
    pub fn new(escrow_id: u64, kind: EscrowKind, now: Timestamp) -> Self {
        Self {
            escrow_id,
            kind,
            first_seen_at: now,
            last_seen_at: now,
            seen_count: 0,
            locked: false,
        }
    }

    fn sort_key(&self) -> (u8, u32, Timestamp) {
        (self.kind as u8, self.seen_count, self.first_seen_at)
    }
}

impl PartialOrd for EscrowRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EscrowRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// A deferred callback entry, heap-ordered by `due_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEntry {
    pub due_at: Timestamp,
    pub escrow_id: u64,
    pub reason: String,
    pub attempt: u32,
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.due_at.cmp(&other.due_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_ordinal_matches_spec() {
        assert_eq!(EscrowKind::Expired as u8, 0);
        assert_eq!(EscrowKind::Cancelled as u8, 1);
        assert_eq!(EscrowKind::Linked as u8, 2);
        assert_eq!(EscrowKind::Extended as u8, 3);
        assert_eq!(EscrowKind::Created as u8, 4);
        assert_eq!(EscrowKind::Refunded as u8, 5);
        assert_eq!(EscrowKind::Released as u8, 6);
    }

    #[test]
    fn sort_key_orders_by_kind_then_seen_count_then_age() {
        let a = EscrowRef::new(1, EscrowKind::Linked, 100);
        let mut b = EscrowRef::new(2, EscrowKind::Expired, 200);
        b.seen_count = 5;
        assert!(b < a, "lower kind ordinal always wins regardless of seen_count");

        let mut c = EscrowRef::new(3, EscrowKind::Linked, 50);
        let mut d = EscrowRef::new(4, EscrowKind::Linked, 300);
        c.seen_count = 2;
        d.seen_count = 1;
        assert!(d < c, "fewer prior attempts wins when kind ties");
    }

    #[test]
    fn prefix_roundtrips() {
        for kind in [
            EscrowKind::Expired,
            EscrowKind::Cancelled,
            EscrowKind::Linked,
            EscrowKind::Extended,
            EscrowKind::Created,
            EscrowKind::Refunded,
            EscrowKind::Released,
        ] {
            assert_eq!(EscrowKind::from_prefix(kind.prefix()), Some(kind));
        }
    }
}
