use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use log::debug;

use crate::domain::Lap;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum CachedValue {
    Count(u64),
    Lap(Option<Lap>),
    Speed(Option<f64>),
}

/// Results of queries already issued while serving one logical request.
///
/// Create one per request and drop it with the request; it is never shared across
/// requests. Safe to share between the threads of a single request's fan-out.
#[derive(Debug, Default)]
pub struct RequestCache {
    entries: Mutex<HashMap<String, CachedValue>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get(&self, key: &str) -> Option<CachedValue> {
        let hit = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        if hit.is_some() {
            debug!("Request cache hit for {}", key);
        }
        hit
    }

    pub(crate) fn insert(&self, key: String, value: CachedValue) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }
}
