//! Isolated storage for secret values.
//!
//! Secrets never enter the general value map. Each one lives in a
//! [`SecureString`] whose buffer is zeroed on [`destroy`](SecureString::destroy)
//! and again on drop.

use std::collections::HashMap;
use std::fmt;

use zeroize::Zeroize;

/// A secret value with explicit, idempotent wiping.
///
/// A destroyed (or never set) handle reports `is_set() == false`, `size() == 0`
/// and empty contents.
#[derive(Default)]
pub struct SecureString {
    buf: Option<Vec<u8>>,
}

static EMPTY: SecureString = SecureString { buf: None };

impl SecureString {
    /// An empty input produces an unset handle.
    pub fn from_string(value: String) -> Self {
        if value.is_empty() {
            return Self::default();
        }
        Self {
            buf: Some(value.into_bytes()),
        }
    }

    /// The handle used for keys that hold no secret.
    pub fn empty() -> &'static SecureString {
        &EMPTY
    }

    pub fn bytes(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.bytes()).unwrap_or_default()
    }

    pub fn is_set(&self) -> bool {
        self.buf.as_ref().is_some_and(|b| !b.is_empty())
    }

    pub fn size(&self) -> usize {
        self.buf.as_ref().map_or(0, Vec::len)
    }

    /// Zero the buffer and release it. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if let Some(mut buf) = self.buf.take() {
            buf.zeroize();
        }
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString([{} bytes])", self.size())
    }
}

/// Key → secret handle map owned by a config.
#[derive(Debug, Default)]
pub struct SecretStore {
    secrets: HashMap<String, SecureString>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, wiping any handle it replaces.
    pub fn store(&mut self, key: &str, value: String) {
        if let Some(mut previous) = self
            .secrets
            .insert(key.to_string(), SecureString::from_string(value))
        {
            previous.destroy();
        }
    }

    /// The handle for `key`, or an unset handle when the key holds no secret.
    pub fn get(&self, key: &str) -> &SecureString {
        self.secrets.get(key).unwrap_or(SecureString::empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.secrets.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Wipe every handle and start over with an empty map.
    pub fn destroy_all(&mut self) {
        for secret in self.secrets.values_mut() {
            secret.destroy();
        }
        self.secrets = HashMap::new();
    }
}
