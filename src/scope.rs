//! Request scopes
//!
//! A [`Scope`] is created once per unit of work and passed explicitly to every
//! resolve call and batch fetch. It carries the cancellation signal, the
//! resolution settings and the resolver sets attached for the request.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{ResolveAll, ResolveConfig, ResolveError, Result};

type Slots = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Request-scoped carrier for resolver sets
///
/// Scopes are immutable. [`Scope::with_resolvers`] returns a derived scope and
/// leaves the original untouched.
#[derive(Clone)]
pub struct Scope {
    id: Uuid,
    cancellation: CancellationToken,
    config: ResolveConfig,
    slots: Arc<Slots>,
    active: Option<Arc<dyn ResolveAll>>,
}

impl Scope {
    /// Create an empty scope with a fresh id and cancellation token
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancellation: CancellationToken::new(),
            config: ResolveConfig::default(),
            slots: Arc::new(HashMap::new()),
            active: None,
        }
    }

    /// Use an existing cancellation token (e.g. a child of the server's shutdown token)
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Use the given resolution settings
    pub fn with_config(mut self, config: ResolveConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a resolver set
    ///
    /// The set is retrievable with [`Scope::resolvers::<R>`](Scope::resolvers)
    /// and becomes the set [`Scope::resolve_all`] drives. Attaching a second
    /// value of the same type replaces it in the derived scope only.
    pub fn with_resolvers<R: ResolveAll + 'static>(&self, resolvers: R) -> Scope {
        let resolvers = Arc::new(resolvers);

        let mut slots = (*self.slots).clone();
        slots.insert(
            TypeId::of::<R>(),
            resolvers.clone() as Arc<dyn Any + Send + Sync>,
        );

        Scope {
            id: self.id,
            cancellation: self.cancellation.clone(),
            config: self.config.clone(),
            slots: Arc::new(slots),
            active: Some(resolvers),
        }
    }

    /// Look up an attached resolver set by type
    pub fn resolvers<R: Any + Send + Sync>(&self) -> Result<Arc<R>> {
        self.slots
            .get(&TypeId::of::<R>())
            .cloned()
            .and_then(|slot| slot.downcast::<R>().ok())
            .ok_or(ResolveError::ScopeNotFound {
                type_name: type_name::<R>(),
            })
    }

    /// The most recently attached resolver set
    pub fn active_resolvers(&self) -> Result<Arc<dyn ResolveAll>> {
        self.active.clone().ok_or(ResolveError::ScopeNotFound {
            type_name: type_name::<dyn ResolveAll>(),
        })
    }

    /// Resolve everything the active resolver set owns
    pub async fn resolve_all(&self) -> Result<()> {
        self.active_resolvers()?.resolve_all(self).await
    }

    /// Request id, for log correlation
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cancellation signal for batch fetches to honor
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .field("config", &self.config)
            .field("resolver_sets", &self.slots.len())
            .finish()
    }
}
