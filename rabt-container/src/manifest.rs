//! Exporting services from one provider to another.
//!
//! A provider exports services by registering a [`ServiceManifest`] that
//! lists their contracts. [`import`] reads that manifest and adds a proxy
//! per exported registration to another collection. Without a manifest
//! nothing is exported.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::collection::ServiceCollection;
use crate::descriptor::ServiceDescriptor;
use crate::error::Result;
use crate::key::ContractKey;
use crate::lifetime::Lifetime;
use crate::provider::ServiceProvider;
use crate::resolver::{Resolver, ResolverApi};

/// The contracts a provider exports to importers.
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use rabt_container::prelude::*;
///
/// struct Clock;
/// struct Mailer;
///
/// let mut shared = ServiceCollection::new();
/// shared
///     .add(ServiceDescriptor::singleton_factory(|_| Ok(Clock)))
///     .add(ServiceDescriptor::singleton_factory(|_| Ok(Mailer)))
///     .add(ServiceDescriptor::instance(ServiceManifest::of::<Clock>()));
/// let shared = shared.build();
///
/// let mut services = ServiceCollection::new();
/// assert_eq!(services.import(&shared).unwrap(), 1);
///
/// let provider = services.build();
/// assert!(provider.get_service::<Clock>().unwrap().is_some());
/// assert!(provider.get_service::<Mailer>().unwrap().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceManifest {
    contracts: Vec<ContractKey>,
}

impl ServiceManifest {
    /// A manifest exporting `contracts`. Duplicates are dropped.
    pub fn new(contracts: impl IntoIterator<Item = ContractKey>) -> Self {
        let mut manifest = Self::default();
        for contract in contracts {
            manifest.push(contract);
        }
        manifest
    }

    /// A manifest exporting `T` only.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::default().with::<T>()
    }

    /// Also exports `T`.
    pub fn with<T: ?Sized + 'static>(mut self) -> Self {
        self.push(ContractKey::of::<T>());
        self
    }

    /// Exported contracts, in the order they were listed.
    pub fn contracts(&self) -> &[ContractKey] {
        &self.contracts
    }

    pub fn exports(&self, contract: &ContractKey) -> bool {
        self.contracts.contains(contract)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    fn push(&mut self, contract: ContractKey) {
        if !self.exports(&contract) {
            self.contracts.push(contract);
        }
    }
}

/// Adds to `collection` one transient proxy per registration `fallback`
/// exports.
///
/// Each proxy resolves its registration from `fallback` on every request,
/// so caching follows the fallback's lifetimes. Proxies for a contract the
/// collection already registers are inserted ahead of those registrations,
/// which keeps the collection's own registration the one single
/// resolution sees. Returns the number of proxies added.
///
/// # Errors
/// Resolving the fallback's manifest can fail like any resolution, for
/// example with [`RabtError::ScopeDisposed`](crate::error::RabtError::ScopeDisposed).
#[instrument(skip_all, name = "import")]
pub fn import(collection: &mut ServiceCollection, fallback: &ServiceProvider) -> Result<usize> {
    let Some(manifest) = fallback.get_service::<ServiceManifest>()? else {
        debug!("Fallback exports no manifest, nothing imported");
        return Ok(0);
    };

    let mut imported = 0;
    for contract in manifest.contracts() {
        let variants = fallback.variant_count(contract);
        if variants == 0 {
            debug!(contract = %contract, "Exported contract has no registration, skipped");
            continue;
        }

        let mut at = collection.position(contract);
        for index in 0..variants {
            let descriptor = proxy(fallback, *contract, index);
            match at.as_mut() {
                Some(position) => {
                    collection.insert(*position, descriptor);
                    *position += 1;
                }
                None => {
                    collection.add(descriptor);
                }
            }
        }
        imported += variants;
    }

    info!(imported, exported = manifest.len(), "Imported services");
    Ok(imported)
}

fn proxy(fallback: &ServiceProvider, contract: ContractKey, index: usize) -> ServiceDescriptor {
    let fallback = fallback.clone();
    ServiceDescriptor::factory_raw(
        contract,
        Lifetime::Transient,
        Arc::new(move |_: &dyn Resolver| fallback.resolve_variant(&contract, index)),
    )
}
