//! Round-based resolution across resolvers
//!
//! Resolving one batch can queue more work: a fetch (or the code consuming its
//! values) may request keys from another resolver, or from the same one.
//! [`resolve_all`] keeps running rounds until nothing is pending, and gives up
//! with [`ResolveError::Unresolved`] once the round budget is spent.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{PendingResolver, Resolve, ResolveError, Result, Scope};

/// A set of resolvers that can resolve everything it owns
///
/// This is what a [`Scope`] carries and what the serialization hook drives.
///
/// # Example
///
/// ```rust,no_run
/// use lazy_resolve::{resolve_all, ResolveAll, Resolver, Scope};
///
/// struct Loaders {
///     users: Resolver<String, u64>,
///     teams: Resolver<String, u64>,
/// }
///
/// #[async_trait::async_trait]
/// impl ResolveAll for Loaders {
///     async fn resolve_all(&self, scope: &Scope) -> lazy_resolve::Result<()> {
///         resolve_all(scope, &[&self.users, &self.teams]).await
///     }
/// }
/// ```
#[async_trait]
pub trait ResolveAll: Send + Sync {
    async fn resolve_all(&self, scope: &Scope) -> Result<()>;
}

/// Resolve every pending value of `resolvers`
///
/// Each round calls [`Resolve::resolve`] on every resolver, in order. A fetch
/// error aborts immediately and is returned unchanged. The call succeeds as
/// soon as a round leaves no pending values; after
/// [`ResolveConfig::max_rounds`](crate::ResolveConfig::max_rounds) rounds the
/// resolvers still holding work are reported.
pub async fn resolve_all(scope: &Scope, resolvers: &[&dyn Resolve]) -> Result<()> {
    let max_rounds = scope.config().max_rounds;

    for round in 1..=max_rounds {
        for resolver in resolvers {
            resolver.resolve(scope).await?;
        }

        let remaining: usize = resolvers.iter().map(|r| r.count()).sum();
        if remaining == 0 {
            debug!(scope_id = %scope.id(), rounds = round, "resolvers converged");
            return Ok(());
        }
        debug!(scope_id = %scope.id(), round, remaining, "pending values after round");
    }

    let pending: Vec<PendingResolver> = resolvers
        .iter()
        .filter(|r| r.count() > 0)
        .map(|r| PendingResolver {
            name: r.name().to_string(),
            count: r.count(),
        })
        .collect();

    if pending.is_empty() {
        return Ok(());
    }

    warn!(scope_id = %scope.id(), max_rounds, ?pending, "round budget exhausted");
    Err(ResolveError::Unresolved { pending })
}
