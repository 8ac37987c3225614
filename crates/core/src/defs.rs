//! Requests and identities exchanged between sessions, paths and the path
//! manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::media::SessionDescription;

/// Opaque identity of a publisher.
///
/// A path accepts StartPublisher only from the author currently bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Author(u64);

impl Author {
    /// Allocate a process-wide unique author.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Intent to access a path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathAccessRequest {
    /// Path name, without the leading `/`.
    pub name: String,
    /// Raw query string of the request URL, without `?`.
    pub query: String,
    pub publish: bool,
}

#[derive(Debug, Clone)]
pub struct AddPublisherReq {
    pub author: Author,
    pub access_request: PathAccessRequest,
}

#[derive(Debug, Clone)]
pub struct StartPublisherReq {
    pub author: Author,
    pub desc: SessionDescription,
    /// Set when the publisher hands over access units instead of RTP packets.
    pub generate_rtp_packets: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RemovePublisherReq {
    pub author: Author,
}

/// Snapshot of a path's publisher binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathState {
    pub publisher: Option<Author>,
    pub query: String,
    pub ready: bool,
    pub ready_time: Option<SystemTime>,
}

/// Registry entry as listed by [`PathManager::list_paths`](crate::PathManager::list_paths).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    pub name: String,
    pub ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authors_are_unique() {
        let a = Author::next();
        let b = Author::next();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }
}
