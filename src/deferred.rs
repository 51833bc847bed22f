//! Deferred values embedded in response graphs
//!
//! A [`Deferred`] is handed out by a [`Resolver`](crate::Resolver) before its
//! value exists. It is filled in exactly once, when the resolver's next batch
//! completes, and can be read (or serialized) from then on.

use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::{ResolveError, Result};

/// Placeholder for a value of type `T` looked up by key `K`
pub struct Deferred<T, K> {
    key: Option<K>,
    resolver: Option<Arc<str>>,
    slot: Arc<OnceLock<T>>,
}

impl<T, K> Deferred<T, K> {
    /// Create an already-resolved value
    ///
    /// Useful for fields whose value is known up front but whose type is
    /// shared with lazily loaded ones.
    pub fn ready(value: T) -> Self {
        Self {
            key: None,
            resolver: None,
            slot: Arc::new(OnceLock::from(value)),
        }
    }

    /// Resolved value served from a resolver's cache
    pub(crate) fn cached(resolver: Arc<str>, key: K, value: T) -> Self {
        Self {
            key: Some(key),
            resolver: Some(resolver),
            slot: Arc::new(OnceLock::from(value)),
        }
    }

    /// Pending value; `slot` is filled by the owning resolver
    pub(crate) fn pending(resolver: Arc<str>, key: K, slot: Arc<OnceLock<T>>) -> Self {
        Self {
            key: Some(key),
            resolver: Some(resolver),
            slot,
        }
    }

    /// Whether the value is available
    pub fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Key this value was requested with (`None` for [`Deferred::ready`])
    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    /// Name of the resolver that produced this value
    pub fn resolver_name(&self) -> Option<&str> {
        self.resolver.as_deref()
    }
}

impl<T, K: fmt::Debug> Deferred<T, K> {
    /// Read the value
    ///
    /// Fails with [`ResolveError::NotResolved`] if the owning resolver has not
    /// run its batch yet.
    pub fn get(&self) -> Result<&T> {
        self.slot.get().ok_or_else(|| ResolveError::NotResolved {
            resolver: self.resolver.as_deref().unwrap_or_default().to_string(),
            key: match &self.key {
                Some(key) => format!("{:?}", key),
                None => String::new(),
            },
        })
    }
}

impl<T, K: Clone> Clone for Deferred<T, K> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            resolver: self.resolver.clone(),
            slot: self.slot.clone(),
        }
    }
}

impl<T: fmt::Debug, K: fmt::Debug> fmt::Debug for Deferred<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("resolver", &self.resolver)
            .field("key", &self.key)
            .field("value", &self.slot.get())
            .finish()
    }
}

impl<T: Serialize, K: fmt::Debug> Serialize for Deferred<T, K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.get().map_err(S::Error::custom)?.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Post {
        title: String,
        author: Deferred<String, u64>,
    }

    #[test]
    fn test_ready_value_reads_immediately() {
        let value: Deferred<&str, u64> = Deferred::ready("alice");
        assert!(value.is_resolved());
        assert_eq!(*value.get().unwrap(), "alice");
        assert!(value.key().is_none());
    }

    #[test]
    fn test_premature_read_names_resolver_and_key() {
        let value: Deferred<String, u64> =
            Deferred::pending(Arc::from("users"), 42, Arc::new(OnceLock::new()));

        match value.get() {
            Err(ResolveError::NotResolved { resolver, key }) => {
                assert_eq!(resolver, "users");
                assert_eq!(key, "42");
            }
            other => panic!("expected NotResolved, got {:?}", other),
        }
    }

    #[test]
    fn test_clones_share_the_slot() {
        let slot = Arc::new(OnceLock::new());
        let value: Deferred<String, u64> = Deferred::pending(Arc::from("users"), 1, slot.clone());
        let copy = value.clone();

        slot.set("alice".to_string()).unwrap();

        assert_eq!(value.get().unwrap(), "alice");
        assert_eq!(copy.get().unwrap(), "alice");
    }

    #[test]
    fn test_serialize_resolved_value_inline() {
        let post = Post {
            title: "hello".to_string(),
            author: Deferred::cached(Arc::from("users"), 1, "alice".to_string()),
        };
        let json = serde_json::to_string(&post).unwrap();
        assert_eq!(json, r#"{"title":"hello","author":"alice"}"#);
    }

    #[test]
    fn test_serialize_unresolved_value_fails() {
        let post = Post {
            title: "hello".to_string(),
            author: Deferred::pending(Arc::from("users"), 7, Arc::new(OnceLock::new())),
        };
        let err = serde_json::to_string(&post).unwrap_err();
        assert!(err.to_string().contains("future not resolved: resolver=users, key=7"));
    }
}
