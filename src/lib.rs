//! # lazy-resolve
//!
//! Deferred batch resolution for response graphs.
//!
//! ## Features
//!
//! - **Resolvers** - Turn many keyed lookups into one batched fetch call
//! - **Deferred values** - Placeholders embedded in a response, filled in later
//! - **Round-based resolution** - Drive several resolvers to a fixed point with a bounded round budget
//! - **Request scopes** - Typed, request-scoped storage for the active resolver set
//! - **Serialization hook** - Resolve everything before a response is encoded
//! - **Axum integration** - Middleware, extractors and a lazily-encoded JSON response (feature `http`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lazy_resolve::{resolve_all, BoxError, Deferred, ResolveAll, Resolver, Scope};
//!
//! async fn fetch_names(_scope: Scope, ids: Vec<u64>) -> Result<Vec<String>, BoxError> {
//!     Ok(ids.iter().map(|id| format!("user-{id}")).collect())
//! }
//!
//! struct Loaders {
//!     users: Resolver<String, u64>,
//! }
//!
//! #[async_trait::async_trait]
//! impl ResolveAll for Loaders {
//!     async fn resolve_all(&self, scope: &Scope) -> lazy_resolve::Result<()> {
//!         resolve_all(scope, &[&self.users]).await
//!     }
//! }
//!
//! # async fn example() -> lazy_resolve::Result<()> {
//! let scope = Scope::new().with_resolvers(Loaders {
//!     users: Resolver::from_fn("users", fetch_names),
//! });
//! let loaders = scope.resolvers::<Loaders>()?;
//! let author: Deferred<String, u64> = loaders.users.future(7);
//!
//! let body = lazy_resolve::encode_json(&scope, &author).await?;
//! assert_eq!(body, br#""user-7""#);
//! # Ok(())
//! # }
//! ```

pub mod align;
pub mod batch;
pub mod config;
pub mod deferred;
pub mod resolver;
pub mod scope;
pub mod serialize;

#[cfg(feature = "http")]
pub mod http;

pub use align::{align_by_key, align_by_key_or};
pub use batch::{resolve_all, ResolveAll};
pub use config::{ResolveConfig, DEFAULT_MAX_ROUNDS};
pub use deferred::Deferred;
pub use resolver::{BatchFetch, FnFetch, Resolve, Resolver};
pub use scope::Scope;
pub use serialize::{decode_json, encode_json, DecodeError};

#[cfg(feature = "http")]
pub use http::{resolvers_middleware, ApiError, JsonBody, LazyJson, ResolverFactory};

use std::fmt;

use thiserror::Error;

/// Error type returned by batch-fetch functions
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("resolver scope not found: {type_name}")]
    ScopeNotFound { type_name: &'static str },

    #[error("future not resolved: resolver={resolver}, key={key}")]
    NotResolved { resolver: String, key: String },

    #[error(transparent)]
    Fetch(BoxError),

    #[error("fetch returned {actual} values for {expected} keys: resolver={resolver}")]
    LengthMismatch {
        resolver: String,
        expected: usize,
        actual: usize,
    },

    #[error("has unresolved resolvers: {}", join_pending(.pending))]
    Unresolved { pending: Vec<PendingResolver> },

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ResolveError {
    /// Wrap an arbitrary error as a fetch failure
    pub fn fetch(err: impl Into<BoxError>) -> Self {
        ResolveError::Fetch(err.into())
    }
}

/// A resolver that still had pending work when the round budget ran out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResolver {
    pub name: String,
    pub count: usize,
}

impl fmt::Display for PendingResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resolver={}, count={}", self.name, self.count)
    }
}

fn join_pending(pending: &[PendingResolver]) -> String {
    pending
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for resolution operations
pub type Result<T> = std::result::Result<T, ResolveError>;
