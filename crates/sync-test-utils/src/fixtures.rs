//! Revision triples for the common three-way outcomes

use sync_core::Revisions;
use sync_model::{ResourcePath, RevisionId};

pub fn path(p: &str) -> ResourcePath {
    ResourcePath::new(p)
}

fn triple(local: &str, base: &str, remote: &str) -> Revisions {
    Revisions {
        local: Some(RevisionId::new(local)),
        base: Some(RevisionId::new(base)),
        remote: Some(RevisionId::new(remote)),
    }
}

/// Changed remotely only
pub fn incoming() -> Revisions {
    triple("1.1", "1.1", "1.2")
}

/// Changed locally only
pub fn outgoing() -> Revisions {
    triple("1.1*", "1.1", "1.1")
}

/// Changed on both sides
pub fn conflicting() -> Revisions {
    triple("1.1*", "1.1", "1.2")
}

pub fn in_sync() -> Revisions {
    triple("1.1", "1.1", "1.1")
}
