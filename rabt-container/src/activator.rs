//! Type activation.
//!
//! An implementation-type registration names a type that knows how to build
//! the contract from its own dependencies ([`Injectable`]). The provider does
//! not call it directly: it hands the [`ImplementationType`] to a
//! [`TypeActivator`], so activation can be swapped out by registering
//! another activator under the `Arc<dyn TypeActivator>` contract.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::descriptor::{FactoryFn, ServiceInstance};
use crate::error::Result;
use crate::key::ContractKey;
use crate::resolver::Resolver;

/// A type that can construct contract `C` by resolving its dependencies.
///
/// Implement it once per contract the type is registered under.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use rabt_container::activator::Injectable;
/// use rabt_container::error::Result;
/// use rabt_container::resolver::{Resolver, ResolverApi};
///
/// struct Config { retries: u32 }
/// struct HttpClient { retries: u32 }
///
/// impl Injectable<HttpClient> for HttpClient {
///     fn inject(resolver: &dyn Resolver) -> Result<HttpClient> {
///         let config: Arc<Config> = resolver.get_required_service()?;
///         Ok(HttpClient { retries: config.retries })
///     }
/// }
/// ```
pub trait Injectable<C> {
    fn inject(resolver: &dyn Resolver) -> Result<C>;
}

/// Handle to an implementation type, as stored in a descriptor.
#[derive(Clone)]
pub struct ImplementationType {
    key: ContractKey,
    construct: FactoryFn,
}

impl ImplementationType {
    /// Describes implementation `I` of contract `C`.
    pub fn of<C, I>() -> Self
    where
        C: Send + Sync + 'static,
        I: Injectable<C> + 'static,
    {
        Self {
            key: ContractKey::of::<I>(),
            construct: Arc::new(|resolver: &dyn Resolver| {
                Ok(Arc::new(I::inject(resolver)?) as ServiceInstance)
            }),
        }
    }

    /// The implementation type itself (not the contract).
    pub fn key(&self) -> ContractKey {
        self.key
    }

    /// Runs the implementation's constructor against `resolver`.
    pub fn activate(&self, resolver: &dyn Resolver) -> Result<ServiceInstance> {
        (self.construct)(resolver)
    }
}

impl fmt::Debug for ImplementationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ImplementationType").field(&self.key).finish()
    }
}

/// Builds instances of implementation types.
pub trait TypeActivator: Send + Sync {
    fn create_instance(
        &self,
        resolver: &dyn Resolver,
        implementation: &ImplementationType,
    ) -> Result<ServiceInstance>;
}

/// Activator used when none is registered: calls [`Injectable::inject`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTypeActivator;

impl TypeActivator for DefaultTypeActivator {
    fn create_instance(
        &self,
        resolver: &dyn Resolver,
        implementation: &ImplementationType,
    ) -> Result<ServiceInstance> {
        trace!(implementation = %implementation.key(), "Activating");
        implementation.activate(resolver)
    }
}
