use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::{Client, CustomRedisError};

/// In-memory stand-in for `RedisClient`.
///
/// Writes land in a map shared across clones, so miss-then-hit flows work
/// without a live server. Per-key return overrides force specific outcomes,
/// and every keyed command is recorded for assertions.
#[derive(Clone)]
pub struct MockRedisClient {
    entries: Arc<Mutex<HashMap<String, String>>>,
    connection_open: Arc<AtomicBool>,
    exists_ret: HashMap<String, Result<bool, CustomRedisError>>,
    get_ret: HashMap<String, Result<String, CustomRedisError>>,
    set_ret: HashMap<String, Result<bool, CustomRedisError>>,
    del_ret: HashMap<String, Result<bool, CustomRedisError>>,
    calls: Arc<Mutex<Vec<MockRedisCall>>>,
}

impl Default for MockRedisClient {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            connection_open: Arc::new(AtomicBool::new(true)),
            exists_ret: HashMap::new(),
            get_ret: HashMap::new(),
            set_ret: HashMap::new(),
            del_ret: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockRedisClient {
    pub fn new() -> Self {
        Self::default()
    }

    // Helper method to safely lock the calls mutex
    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<MockRedisCall>> {
        match self.calls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn connection_open_ret(&mut self, open: bool) -> Self {
        self.connection_open.store(open, Ordering::SeqCst);
        self.clone()
    }

    /// Preloads an entry, as if a previous call had stored it.
    pub fn with_entry(&mut self, key: &str, value: &str) -> Self {
        self.lock_entries().insert(key.to_owned(), value.to_owned());
        self.clone()
    }

    pub fn exists_ret(&mut self, key: &str, ret: Result<bool, CustomRedisError>) -> Self {
        self.exists_ret.insert(key.to_owned(), ret);
        self.clone()
    }

    pub fn get_ret(&mut self, key: &str, ret: Result<String, CustomRedisError>) -> Self {
        self.get_ret.insert(key.to_owned(), ret);
        self.clone()
    }

    pub fn set_ret(&mut self, key: &str, ret: Result<bool, CustomRedisError>) -> Self {
        self.set_ret.insert(key.to_owned(), ret);
        self.clone()
    }

    pub fn del_ret(&mut self, key: &str, ret: Result<bool, CustomRedisError>) -> Self {
        self.del_ret.insert(key.to_owned(), ret);
        self.clone()
    }

    pub fn get_calls(&self) -> Vec<MockRedisCall> {
        self.lock_calls().clone()
    }

    /// The raw value currently stored under a key, if any.
    pub fn stored_value(&self, key: &str) -> Option<String> {
        self.lock_entries().get(key).cloned()
    }
}

#[derive(Debug, Clone)]
pub enum MockRedisValue {
    None,
    String(String),
}

#[derive(Debug, Clone)]
pub struct MockRedisCall {
    pub op: String,
    pub key: String,
    pub value: MockRedisValue,
}

#[async_trait]
impl Client for MockRedisClient {
    async fn is_connection_open(&self) -> bool {
        // Probes stay out of the call log; it tracks keyed commands only.
        self.connection_open.load(Ordering::SeqCst)
    }

    async fn exists(&self, key: String) -> Result<bool, CustomRedisError> {
        self.lock_calls().push(MockRedisCall {
            op: "exists".to_string(),
            key: key.clone(),
            value: MockRedisValue::None,
        });

        match self.exists_ret.get(&key) {
            Some(result) => result.clone(),
            None => Ok(self.lock_entries().contains_key(&key)),
        }
    }

    async fn get(&self, key: String) -> Result<String, CustomRedisError> {
        self.lock_calls().push(MockRedisCall {
            op: "get".to_string(),
            key: key.clone(),
            value: MockRedisValue::None,
        });

        match self.get_ret.get(&key) {
            Some(result) => result.clone(),
            None => match self.lock_entries().get(&key) {
                Some(value) => Ok(value.clone()),
                None => Err(CustomRedisError::NotFound),
            },
        }
    }

    async fn set(&self, key: String, value: String) -> Result<bool, CustomRedisError> {
        self.lock_calls().push(MockRedisCall {
            op: "set".to_string(),
            key: key.clone(),
            value: MockRedisValue::String(value.clone()),
        });

        match self.set_ret.get(&key) {
            // Overrides never touch the map
            Some(result) => result.clone(),
            None => {
                self.lock_entries().insert(key, value);
                Ok(true)
            }
        }
    }

    async fn del(&self, key: String) -> Result<bool, CustomRedisError> {
        self.lock_calls().push(MockRedisCall {
            op: "del".to_string(),
            key: key.clone(),
            value: MockRedisValue::None,
        });

        match self.del_ret.get(&key) {
            Some(result) => result.clone(),
            None => Ok(self.lock_entries().remove(&key).is_some()),
        }
    }
}
