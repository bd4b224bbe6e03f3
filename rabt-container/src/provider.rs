//! # The Provider: resolution engine of Rabt
//!
//! A [`ServiceProvider`] is the frozen, compiled form of a
//! [`ServiceCollection`](crate::collection::ServiceCollection). Building it
//! turns every descriptor into a call site; resolving walks call sites,
//! consulting and filling the lifetime caches.
//!
//! # Architecture
//! ```text
//! ServiceCollection  ──build()──>  ServiceProvider ──┐
//!                                    │               │ singleton cache
//!                              create_scope()        │ root scoped cache
//!                                    │               │
//!                                    ▼               │
//!                              ServiceScope ─────────┘ (own scoped cache)
//! ```
//!
//! # Examples
//! ```rust
//! use rabt_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! struct FixedClock;
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 { 1_700_000_000 }
//! }
//!
//! struct AuditLog {
//!     clock: Arc<dyn Clock>,
//! }
//!
//! let mut services = ServiceCollection::new();
//! services
//!     .add(ServiceDescriptor::singleton_factory::<Arc<dyn Clock>, _>(|_| {
//!         Ok(Arc::new(FixedClock) as Arc<dyn Clock>)
//!     }))
//!     .add(ServiceDescriptor::scoped_factory(|resolver| {
//!         let clock: Arc<Arc<dyn Clock>> = resolver.get_required_service()?;
//!         Ok(AuditLog { clock: Arc::clone(&*clock) })
//!     }));
//!
//! let provider = services.build();
//! let scope = provider.create_scope();
//! let log: Arc<AuditLog> = scope.get_required_service().unwrap();
//! assert_eq!(log.clock.now(), 1_700_000_000);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rabt_support::rendering::suggest_similar;
use tracing::{debug, info, instrument, trace, warn};

use crate::activator::{DefaultTypeActivator, ImplementationType, TypeActivator};
use crate::cache::{CacheSlot, ConstructionTracker, InstanceCache};
use crate::descriptor::{FactoryFn, ServiceDescriptor, ServiceInstance, ServiceStrategy};
use crate::dispose::DisposeHook;
use crate::error::{DisposalError, NotRegisteredError, RabtError, Result};
use crate::key::ContractKey;
use crate::lifetime::Lifetime;
use crate::options::ProviderOptions;
use crate::resolver::{ResolutionChain, Resolver, ResolverApi, ServiceQuery};
use crate::scope::ServiceScope;

const MAX_SUGGESTIONS: usize = 3;

// ═══════════════════════════════════════════
// Call sites
// ═══════════════════════════════════════════

/// What running a call site does.
enum Plan {
    Activate(ImplementationType),
    Invoke(FactoryFn),
    Constant(ServiceInstance),
}

/// A compiled descriptor.
struct CallSite {
    /// Position of the descriptor in the snapshot; doubles as cache slot.
    slot: usize,
    contract: ContractKey,
    lifetime: Lifetime,
    plan: Plan,
    disposer: Option<DisposeHook>,
}

impl CallSite {
    fn compile(slot: usize, descriptor: &ServiceDescriptor) -> Self {
        let plan = match descriptor.strategy() {
            ServiceStrategy::Implementation(implementation) => Plan::Activate(implementation.clone()),
            ServiceStrategy::Factory(factory) => Plan::Invoke(factory.clone()),
            ServiceStrategy::Instance(instance) => Plan::Constant(instance.clone()),
        };

        Self {
            slot,
            contract: descriptor.contract(),
            lifetime: descriptor.effective_lifetime(),
            plan,
            disposer: descriptor.disposer().cloned(),
        }
    }

    fn cache_slot(&self) -> CacheSlot<'_> {
        CacheSlot {
            index: self.slot,
            contract: self.contract,
            disposer: self.disposer.as_ref(),
        }
    }
}

// ═══════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════

struct Engine {
    descriptors: Vec<ServiceDescriptor>,
    call_sites: HashMap<ContractKey, Vec<CallSite>>,
    singletons: InstanceCache,
    /// Scoped instances resolved directly from the provider.
    root_scoped: InstanceCache,
    /// Shared with every scope so claims are seen across all caches.
    tracker: Arc<ConstructionTracker>,
    options: ProviderOptions,
    disposed: AtomicBool,
}

impl Engine {
    fn resolve(
        &self,
        key: &ContractKey,
        query: ServiceQuery,
        scoped: &InstanceCache,
        chain: Option<&ResolutionChain<'_>>,
    ) -> Result<Vec<ServiceInstance>> {
        let Some(sites) = self.call_sites.get(key) else {
            trace!(contract = %key, "No registration");
            return Ok(Vec::new());
        };

        match query {
            ServiceQuery::Single => match sites.last() {
                Some(site) => Ok(vec![self.resolve_site(site, scoped, chain)?]),
                None => Ok(Vec::new()),
            },
            ServiceQuery::All => sites
                .iter()
                .map(|site| self.resolve_site(site, scoped, chain))
                .collect(),
        }
    }

    fn resolve_site(
        &self,
        site: &CallSite,
        scoped: &InstanceCache,
        chain: Option<&ResolutionChain<'_>>,
    ) -> Result<ServiceInstance> {
        if let Plan::Constant(instance) = &site.plan {
            return Ok(instance.clone());
        }

        // Checked before the cache so the error names the whole loop; waits
        // across threads are caught by the cache's claim tracking.
        if let Some(cycle) = chain.and_then(|chain| chain.cycle_with(&site.contract)) {
            warn!(cycle = %cycle, "Circular dependency");
            return Err(RabtError::CircularDependency(cycle));
        }

        let frame = ResolutionChain::push(chain, site.contract);
        if frame.depth() > self.options.max_resolution_depth {
            warn!(contract = %site.contract, limit = self.options.max_resolution_depth, "Resolution too deep");
            return Err(RabtError::DepthExceeded {
                key: site.contract,
                limit: self.options.max_resolution_depth,
            });
        }

        trace!(contract = %site.contract, lifetime = %site.lifetime, depth = frame.depth(), "Resolving");

        match site.lifetime {
            Lifetime::Transient => self.execute(site, scoped, &frame),
            Lifetime::Scoped => scoped.get_or_create(&site.cache_slot(), || self.execute(site, scoped, &frame)),
            // Singletons never see the requesting scope's cache.
            Lifetime::Singleton => self.singletons.get_or_create(&site.cache_slot(), || {
                self.execute(site, &self.root_scoped, &frame)
            }),
        }
    }

    fn execute(
        &self,
        site: &CallSite,
        scoped: &InstanceCache,
        frame: &ResolutionChain<'_>,
    ) -> Result<ServiceInstance> {
        let context = CallContext {
            engine: self,
            scoped,
            chain: frame,
        };

        let instance = match &site.plan {
            Plan::Invoke(factory) => factory(&context),
            Plan::Activate(implementation) => context.activate(implementation),
            Plan::Constant(instance) => Ok(instance.clone()),
        }
        .map_err(|err| err.required_by(site.contract))?;

        if (*instance).type_id() != site.contract.type_id() {
            return Err(RabtError::construction(
                site.contract,
                format!("Type mismatch: expected {}", site.contract.type_name()),
            ));
        }

        Ok(instance)
    }

    fn not_registered(&self, key: &ContractKey) -> RabtError {
        // Registration order, so equally close candidates keep a stable order.
        let mut registered: Vec<ContractKey> = Vec::with_capacity(self.call_sites.len());
        for descriptor in &self.descriptors {
            if !registered.contains(&descriptor.contract()) {
                registered.push(descriptor.contract());
            }
        }

        let names: Vec<&str> = registered.iter().map(ContractKey::type_name).collect();
        let suggestions = suggest_similar(key.type_name(), &names, MAX_SUGGESTIONS)
            .into_iter()
            .filter_map(|name| registered.iter().find(|candidate| candidate.type_name() == name).copied())
            .collect();

        RabtError::NotRegistered(NotRegisteredError {
            requested: *key,
            required_by: None,
            suggestions,
        })
    }

    /// Root scoped instances first, then singletons.
    fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut failures = Vec::new();
        self.root_scoped.dispose_into(&mut failures);
        self.singletons.dispose_into(&mut failures);
        info!(failed = failures.len(), "Provider disposed");
        DisposalError::check(failures)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.options.dispose_on_drop || self.disposed.load(Ordering::Acquire) {
            return;
        }
        if let Err(err) = self.dispose() {
            warn!(error = %err, "Provider dropped with disposal failures");
        }
    }
}

// ═══════════════════════════════════════════
// CallContext (resolver handed to factories)
// ═══════════════════════════════════════════

/// Resolver for dependencies of one call site.
///
/// Carries the requesting scope's cache and the chain of contracts under
/// construction, so nested requests share both.
struct CallContext<'a> {
    engine: &'a Engine,
    scoped: &'a InstanceCache,
    chain: &'a ResolutionChain<'a>,
}

impl CallContext<'_> {
    fn activate(&self, implementation: &ImplementationType) -> Result<ServiceInstance> {
        match self.get_service::<Arc<dyn TypeActivator>>()? {
            Some(activator) => activator.create_instance(self, implementation),
            None => DefaultTypeActivator.create_instance(self, implementation),
        }
    }
}

impl Resolver for CallContext<'_> {
    fn resolve_key(&self, key: &ContractKey, query: ServiceQuery) -> Result<Vec<ServiceInstance>> {
        self.engine.resolve(key, query, self.scoped, Some(self.chain))
    }

    fn not_registered(&self, key: &ContractKey) -> RabtError {
        self.engine.not_registered(key)
    }
}

// ═══════════════════════════════════════════
// ServiceProvider
// ═══════════════════════════════════════════

/// Immutable, thread-safe resolution engine.
///
/// Cheap to clone: clones share the same caches. Created by
/// [`ServiceCollection::build`](crate::collection::ServiceCollection::build).
#[derive(Clone)]
pub struct ServiceProvider {
    engine: Arc<Engine>,
}

impl ServiceProvider {
    /// Compiles `descriptors` into a provider.
    #[instrument(skip_all, name = "provider_build", fields(descriptors = descriptors.len()))]
    pub(crate) fn build(descriptors: Vec<ServiceDescriptor>, options: ProviderOptions) -> Self {
        let mut call_sites: HashMap<ContractKey, Vec<CallSite>> = HashMap::new();
        for (slot, descriptor) in descriptors.iter().enumerate() {
            call_sites
                .entry(descriptor.contract())
                .or_default()
                .push(CallSite::compile(slot, descriptor));
        }

        info!(contracts = call_sites.len(), "Provider built");
        let tracker = Arc::new(ConstructionTracker::default());
        Self {
            engine: Arc::new(Engine {
                descriptors,
                call_sites,
                singletons: InstanceCache::new("provider", tracker.clone()),
                root_scoped: InstanceCache::new("provider", tracker.clone()),
                tracker,
                options,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a scope with its own, empty scoped cache.
    pub fn create_scope(&self) -> ServiceScope {
        debug!("Creating scope");
        ServiceScope::new(self.clone())
    }

    /// The descriptors the provider was built from, in registration order.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.engine.descriptors
    }

    /// Whether at least one descriptor is registered for `T`.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.contains_key(&ContractKey::of::<T>())
    }

    pub fn contains_key(&self, key: &ContractKey) -> bool {
        self.engine.call_sites.contains_key(key)
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.engine.options
    }

    pub fn is_disposed(&self) -> bool {
        self.engine.disposed.load(Ordering::Acquire)
    }

    /// Disposes every disposable instance the provider cached.
    ///
    /// Scoped instances resolved from the provider go first, singletons
    /// after; each cache releases newest first. Affects every clone and
    /// every scope of this provider. Calling it again is a no-op.
    ///
    /// # Errors
    /// [`RabtError::DisposalFailed`] listing every instance that failed.
    pub fn dispose(&self) -> Result<()> {
        self.engine.dispose()
    }

    /// Number of registrations for `key`.
    pub(crate) fn variant_count(&self, key: &ContractKey) -> usize {
        self.engine.call_sites.get(key).map_or(0, Vec::len)
    }

    /// Resolves the `index`-th registration of `key` as the provider would.
    pub(crate) fn resolve_variant(&self, key: &ContractKey, index: usize) -> Result<ServiceInstance> {
        self.ensure_live(key)?;
        let site = self
            .engine
            .call_sites
            .get(key)
            .and_then(|sites| sites.get(index))
            .ok_or_else(|| self.engine.not_registered(key))?;
        self.engine.resolve_site(site, &self.engine.root_scoped, None)
    }

    /// Resolves `key` with `scoped` as the cache for scoped lifetimes.
    pub(crate) fn resolve_in(
        &self,
        key: &ContractKey,
        query: ServiceQuery,
        scoped: &InstanceCache,
    ) -> Result<Vec<ServiceInstance>> {
        self.ensure_live(key)?;
        self.engine.resolve(key, query, scoped, None)
    }

    /// A fresh scoped cache tied to this provider's construction tracking.
    pub(crate) fn scope_cache(&self) -> InstanceCache {
        InstanceCache::new("scope", self.engine.tracker.clone())
    }

    pub(crate) fn not_registered_error(&self, key: &ContractKey) -> RabtError {
        self.engine.not_registered(key)
    }

    fn ensure_live(&self, key: &ContractKey) -> Result<()> {
        if self.is_disposed() {
            return Err(RabtError::ScopeDisposed {
                key: *key,
                owner: "provider",
            });
        }
        Ok(())
    }
}

impl Resolver for ServiceProvider {
    fn resolve_key(&self, key: &ContractKey, query: ServiceQuery) -> Result<Vec<ServiceInstance>> {
        self.resolve_in(key, query, &self.engine.root_scoped)
    }

    fn not_registered(&self, key: &ContractKey) -> RabtError {
        self.not_registered_error(key)
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("descriptors", &self.engine.descriptors.len())
            .field("contracts", &self.engine.call_sites.len())
            .field("singletons", &self.engine.singletons)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::ServiceProvider;
    pub use crate::activator::{DefaultTypeActivator, ImplementationType, Injectable, TypeActivator};
    pub use crate::collection::ServiceCollection;
    pub use crate::descriptor::{ServiceDescriptor, ServiceInstance};
    pub use crate::dispose::{Dispose, DisposeResult};
    pub use crate::error::{RabtError, Result};
    pub use crate::key::ContractKey;
    pub use crate::lifetime::Lifetime;
    pub use crate::manifest::ServiceManifest;
    pub use crate::options::ProviderOptions;
    pub use crate::resolver::{Resolver, ResolverApi, ServiceQuery};
    pub use crate::scope::ServiceScope;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
