//! Service scopes.
//!
//! A [`ServiceScope`] resolves through its provider but keeps its own cache
//! for [`Lifetime::Scoped`](crate::lifetime::Lifetime::Scoped) services.
//! Singletons still come from the provider.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, instrument, warn};

use crate::cache::InstanceCache;
use crate::descriptor::ServiceInstance;
use crate::error::{DisposalError, RabtError, Result};
use crate::key::ContractKey;
use crate::provider::ServiceProvider;
use crate::resolver::{Resolver, ServiceQuery};

/// A child resolution context, typically one per unit of work.
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use rabt_container::prelude::*;
///
/// struct RequestId(u64);
///
/// let mut services = ServiceCollection::new();
/// services.add(ServiceDescriptor::scoped_factory(|_| Ok(RequestId(42))));
/// let provider = services.build();
///
/// let scope = provider.create_scope();
/// let a: Arc<RequestId> = scope.get_required_service().unwrap();
/// let b: Arc<RequestId> = scope.get_required_service().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// scope.dispose().unwrap();
/// ```
pub struct ServiceScope {
    provider: ServiceProvider,
    cache: InstanceCache,
    disposed: AtomicBool,
}

impl ServiceScope {
    pub(crate) fn new(provider: ServiceProvider) -> Self {
        Self {
            cache: provider.scope_cache(),
            provider,
            disposed: AtomicBool::new(false),
        }
    }

    /// The provider this scope resolves through.
    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// Creates another scope of the same provider.
    ///
    /// The new scope does not share this scope's cache.
    pub fn create_scope(&self) -> ServiceScope {
        self.provider.create_scope()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Disposes the disposable instances this scope cached, newest first.
    ///
    /// Singletons are left alone. Calling it again is a no-op.
    ///
    /// # Errors
    /// [`RabtError::DisposalFailed`] listing every instance that failed.
    #[instrument(skip(self), name = "scope_dispose")]
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut failures = Vec::new();
        self.cache.dispose_into(&mut failures);
        debug!(failed = failures.len(), "Scope disposed");
        DisposalError::check(failures)
    }
}

impl Resolver for ServiceScope {
    fn resolve_key(&self, key: &ContractKey, query: ServiceQuery) -> Result<Vec<ServiceInstance>> {
        if self.is_disposed() {
            return Err(RabtError::ScopeDisposed {
                key: *key,
                owner: "scope",
            });
        }
        self.provider.resolve_in(key, query, &self.cache)
    }

    fn not_registered(&self, key: &ContractKey) -> RabtError {
        self.provider.not_registered_error(key)
    }
}

impl Drop for ServiceScope {
    fn drop(&mut self) {
        if !self.provider.options().dispose_on_drop || self.is_disposed() {
            return;
        }
        if let Err(err) = self.dispose() {
            warn!(error = %err, "Scope dropped with disposal failures");
        }
    }
}

impl fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceScope")
            .field("cache", &self.cache)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
