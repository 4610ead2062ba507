//! Helper-call result cache.
//!
//! One cache per server instance, keyed by `(request path, request body)`.
//! Entries are never evicted; the cache dies with the server at the end of
//! a render.

use std::collections::HashMap;
use std::sync::Mutex;

/// Cache key: request path plus raw body bytes.
pub(crate) type CallKey = (String, Vec<u8>);

/// State of one helper call.
#[derive(Clone, Debug)]
enum CallState {
    /// A request for this key is currently executing its helper.
    Pending,
    /// The helper finished; replay this response.
    Ready { status: u16, body: Vec<u8> },
}

/// Outcome of claiming a key before running a helper.
#[derive(Clone, Debug)]
pub(crate) enum Claim {
    /// The caller owns this key and must run the helper, then call
    /// [`CallCache::complete`].
    Started,
    /// Another request for this key is still in flight.
    InFlight,
    /// A previous request already produced this response.
    Ready { status: u16, body: Vec<u8> },
}

/// Per-server single-flight cache for helper calls.
#[derive(Debug, Default)]
pub(crate) struct CallCache {
    entries: Mutex<HashMap<CallKey, CallState>>,
}

impl CallCache {
    /// Atomically claim a key: the first caller gets [`Claim::Started`] and
    /// the key is marked pending until [`CallCache::complete`].
    pub(crate) fn claim(&self, key: &CallKey) -> Claim {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match entries.get(key) {
            Some(CallState::Pending) => Claim::InFlight,
            Some(CallState::Ready { status, body }) => Claim::Ready {
                status: *status,
                body: body.clone(),
            },
            None => {
                entries.insert(key.clone(), CallState::Pending);
                Claim::Started
            }
        }
    }

    /// Record the response for a claimed key. Both success and failure
    /// responses are cached; replays skip the helper entirely.
    pub(crate) fn complete(&self, key: &CallKey, status: u16, body: Vec<u8>) {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.clone(), CallState::Ready { status, body });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str, body: &str) -> CallKey {
        (path.to_owned(), body.as_bytes().to_vec())
    }

    #[test]
    fn test_first_claim_starts() {
        let cache = CallCache::default();

        assert!(matches!(cache.claim(&key("pixlib/_rpc.py", "{}")), Claim::Started));
    }

    #[test]
    fn test_duplicate_claim_while_pending_is_in_flight() {
        let cache = CallCache::default();
        let k = key("pixlib/_rpc.py", "{}");

        assert!(matches!(cache.claim(&k), Claim::Started));
        assert!(matches!(cache.claim(&k), Claim::InFlight));
    }

    #[test]
    fn test_completed_claim_replays_response() {
        let cache = CallCache::default();
        let k = key("pixlib/_rpc.py", "{}");

        assert!(matches!(cache.claim(&k), Claim::Started));
        cache.complete(&k, 200, b"ok".to_vec());

        match cache.claim(&k) {
            Claim::Ready { status, body } => {
                assert_eq!(status, 200);
                assert_eq!(body, b"ok");
            }
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_responses_are_cached_too() {
        let cache = CallCache::default();
        let k = key("helper.py", "payload");

        assert!(matches!(cache.claim(&k), Claim::Started));
        cache.complete(&k, 500, br#"{"error": "boom"}"#.to_vec());

        assert!(matches!(cache.claim(&k), Claim::Ready { status: 500, .. }));
    }

    #[test]
    fn test_distinct_bodies_are_distinct_keys() {
        let cache = CallCache::default();

        assert!(matches!(cache.claim(&key("helper.py", "a")), Claim::Started));
        assert!(matches!(cache.claim(&key("helper.py", "b")), Claim::Started));
    }
}
