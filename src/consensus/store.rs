use std::collections::HashMap;

use crate::common::crypto::Digest;
use super::message::RequestMessage;

/// Client requests by digest. Entries are immutable once admitted.
#[derive(Debug, Default)]
pub struct RequestPool {
    requests: HashMap<Digest, RequestMessage>,
}

impl RequestPool {
    pub fn new() -> Self {
        RequestPool {
            requests: HashMap::new(),
        }
    }

    /// Returns `false` and keeps the existing entry if the digest is known.
    pub fn admit(&mut self, request: RequestMessage) -> bool {
        let digest = request.digest();
        if self.requests.contains_key(&digest) {
            return false;
        }
        self.requests.insert(digest, request);
        true
    }

    pub fn get(&self, digest: &Digest) -> Option<&RequestMessage> {
        self.requests.get(digest)
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.requests.contains_key(digest)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
