use serde_json::Value;
use siphasher::sip::SipHasher13;
use std::fmt;
use std::hash::Hasher;

// Fingerprint contribution of a null argument. Applied before hashing so the
// derivation never fails on absent values.
const NULL_ARG_HASH: u64 = 0;

/// A derived store key: `{namespace}:{operation}:{argument fingerprint}`.
///
/// Derivation is a pure function of its inputs: the same namespace, operation
/// name and argument list always produce the same key, across processes and
/// restarts. Operations that share a name within a namespace share keys;
/// that collision is deliberate and up to the caller to avoid or exploit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(namespace: &str, operation: &str, args: &[Value]) -> CacheKey {
        CacheKey(format!("{namespace}:{operation}:{}", fingerprint(args)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order-sensitive combined hash over the argument list.
///
/// Each argument is hashed over its canonical JSON encoding with a zero-keyed
/// SipHash-1-3, then folded in polynomially, so `[a, b]` and `[b, a]` land on
/// different fingerprints.
fn fingerprint(args: &[Value]) -> u64 {
    let mut combined: u64 = 1;
    for arg in args {
        let hash = match arg {
            Value::Null => NULL_ARG_HASH,
            value => {
                let mut hasher = SipHasher13::new();
                hasher.write(serde_json::to_string(value).unwrap_or_default().as_bytes());
                hasher.finish()
            }
        };
        combined = combined.wrapping_mul(31).wrapping_add(hash);
    }
    combined
}
