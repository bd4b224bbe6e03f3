//! Service descriptors.
//!
//! A [`ServiceDescriptor`] is one registration: a contract, a [`Lifetime`]
//! and exactly one way of producing the instance ([`ServiceStrategy`]).
//! Descriptors are immutable; changing a registration means putting a new
//! descriptor in the collection.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use rabt_container::descriptor::ServiceDescriptor;
//! use rabt_container::lifetime::Lifetime;
//!
//! struct Clock;
//!
//! let by_factory = ServiceDescriptor::singleton_factory(|_| Ok(Clock));
//! let by_value = ServiceDescriptor::instance(Clock);
//! let checked = ServiceDescriptor::describe::<Clock>(Lifetime::Scoped)
//!     .factory(|_| Ok(Clock))
//!     .build()
//!     .expect("one strategy");
//!
//! assert_eq!(by_factory.lifetime(), Lifetime::Singleton);
//! assert!(by_value.is_instance());
//! assert_eq!(checked.lifetime(), Lifetime::Scoped);
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::activator::{ImplementationType, Injectable};
use crate::dispose::{Dispose, DisposeHook, DisposeResult};
use crate::error::{InvalidDescriptorError, InvalidDescriptorReason, RabtError, Result};
use crate::key::ContractKey;
use crate::lifetime::Lifetime;
use crate::resolver::Resolver;

/// A live, type-erased service instance.
///
/// Its concrete type is always the contract type of the descriptor that
/// produced it.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Type-erased factory.
///
/// Receives the [`Resolver`] of the resolution in progress so it can
/// resolve its own dependencies.
pub type FactoryFn = Arc<dyn Fn(&dyn Resolver) -> Result<ServiceInstance> + Send + Sync>;

/// How a descriptor produces its instance.
#[derive(Clone)]
pub enum ServiceStrategy {
    /// Activate an implementation type on each construction.
    Implementation(ImplementationType),
    /// Hand out a pre-built instance.
    Instance(ServiceInstance),
    /// Call a factory on each construction.
    Factory(FactoryFn),
}

impl ServiceStrategy {
    fn kind(&self) -> &'static str {
        match self {
            ServiceStrategy::Implementation(_) => "implementation",
            ServiceStrategy::Instance(_) => "instance",
            ServiceStrategy::Factory(_) => "factory",
        }
    }
}

impl fmt::Debug for ServiceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStrategy::Implementation(implementation) => {
                f.debug_tuple("Implementation").field(implementation).finish()
            }
            ServiceStrategy::Instance(_) => f.write_str("Instance(..)"),
            ServiceStrategy::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// One registration.
#[derive(Clone)]
pub struct ServiceDescriptor {
    contract: ContractKey,
    lifetime: Lifetime,
    strategy: ServiceStrategy,
    disposer: Option<DisposeHook>,
}

impl ServiceDescriptor {
    // ── Implementation types ──

    /// Singleton activated from implementation `I`.
    pub fn singleton<C, I>() -> Self
    where
        C: Send + Sync + 'static,
        I: Injectable<C> + 'static,
    {
        Self::implementation::<C, I>(Lifetime::Singleton)
    }

    /// Scoped service activated from implementation `I`.
    pub fn scoped<C, I>() -> Self
    where
        C: Send + Sync + 'static,
        I: Injectable<C> + 'static,
    {
        Self::implementation::<C, I>(Lifetime::Scoped)
    }

    /// Transient service activated from implementation `I`.
    pub fn transient<C, I>() -> Self
    where
        C: Send + Sync + 'static,
        I: Injectable<C> + 'static,
    {
        Self::implementation::<C, I>(Lifetime::Transient)
    }

    fn implementation<C, I>(lifetime: Lifetime) -> Self
    where
        C: Send + Sync + 'static,
        I: Injectable<C> + 'static,
    {
        Self::from_parts(
            ContractKey::of::<C>(),
            lifetime,
            ServiceStrategy::Implementation(ImplementationType::of::<C, I>()),
        )
    }

    // ── Factories ──

    pub fn singleton_factory<C, F>(factory: F) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> Result<C> + Send + Sync + 'static,
    {
        Self::typed_factory(Lifetime::Singleton, factory)
    }

    pub fn scoped_factory<C, F>(factory: F) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> Result<C> + Send + Sync + 'static,
    {
        Self::typed_factory(Lifetime::Scoped, factory)
    }

    pub fn transient_factory<C, F>(factory: F) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> Result<C> + Send + Sync + 'static,
    {
        Self::typed_factory(Lifetime::Transient, factory)
    }

    fn typed_factory<C, F>(lifetime: Lifetime, factory: F) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> Result<C> + Send + Sync + 'static,
    {
        Self::from_parts(
            ContractKey::of::<C>(),
            lifetime,
            ServiceStrategy::Factory(erase_factory(factory)),
        )
    }

    /// Factory over a raw [`ContractKey`].
    ///
    /// The factory must return an instance of the contract type; the
    /// provider rejects anything else with
    /// [`RabtError::ConstructionFailed`].
    pub fn factory_raw(contract: ContractKey, lifetime: Lifetime, factory: FactoryFn) -> Self {
        Self::from_parts(contract, lifetime, ServiceStrategy::Factory(factory))
    }

    // ── Instances ──

    /// Pre-built instance. Always a singleton.
    pub fn instance<C: Send + Sync + 'static>(value: C) -> Self {
        Self::instance_arc(Arc::new(value))
    }

    /// Pre-built instance the caller keeps a handle to.
    pub fn instance_arc<C: Send + Sync + 'static>(value: Arc<C>) -> Self {
        Self::from_parts(
            ContractKey::of::<C>(),
            Lifetime::Singleton,
            ServiceStrategy::Instance(value),
        )
    }

    /// Pre-built instance over a raw [`ContractKey`].
    ///
    /// # Errors
    /// [`RabtError::InvalidDescriptor`] if `instance` is not of the contract type.
    pub fn instance_any(contract: ContractKey, instance: ServiceInstance) -> Result<Self> {
        if (*instance).type_id() != contract.type_id() {
            return Err(invalid(contract, InvalidDescriptorReason::InstanceTypeMismatch));
        }
        Ok(Self::from_parts(
            contract,
            Lifetime::Singleton,
            ServiceStrategy::Instance(instance),
        ))
    }

    // ── Checked construction ──

    /// Starts a descriptor whose strategy is validated on [`build`](DescriptorBuilder::build).
    pub fn describe<C: Send + Sync + 'static>(lifetime: Lifetime) -> DescriptorBuilder<C> {
        DescriptorBuilder {
            lifetime,
            strategies: Vec::new(),
            disposer: None,
            _contract: PhantomData,
        }
    }

    fn from_parts(contract: ContractKey, lifetime: Lifetime, strategy: ServiceStrategy) -> Self {
        Self {
            contract,
            lifetime,
            strategy,
            disposer: None,
        }
    }

    // ── Accessors ──

    pub fn contract(&self) -> ContractKey {
        self.contract
    }

    /// The lifetime as declared.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// The lifetime the provider applies: instances are always singletons.
    pub fn effective_lifetime(&self) -> Lifetime {
        match self.strategy {
            ServiceStrategy::Instance(_) => Lifetime::Singleton,
            _ => self.lifetime,
        }
    }

    pub fn strategy(&self) -> &ServiceStrategy {
        &self.strategy
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.strategy, ServiceStrategy::Instance(_))
    }

    /// The implementation type, for implementation-type registrations.
    pub fn implementation_type(&self) -> Option<&ImplementationType> {
        match &self.strategy {
            ServiceStrategy::Implementation(implementation) => Some(implementation),
            _ => None,
        }
    }

    /// Whether cached instances are disposed with their owner.
    pub fn is_disposable(&self) -> bool {
        self.disposer.is_some()
    }

    pub(crate) fn disposer(&self) -> Option<&DisposeHook> {
        self.disposer.as_ref()
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("contract", &self.contract)
            .field("lifetime", &self.lifetime)
            .field("strategy", &self.strategy)
            .field("disposable", &self.is_disposable())
            .finish()
    }
}

/// Builder enforcing exactly one strategy per descriptor.
///
/// ```rust
/// use rabt_container::descriptor::ServiceDescriptor;
/// use rabt_container::error::RabtError;
/// use rabt_container::lifetime::Lifetime;
///
/// let err = ServiceDescriptor::describe::<u32>(Lifetime::Transient)
///     .instance(1)
///     .factory(|_| Ok(2))
///     .build()
///     .unwrap_err();
/// assert!(matches!(err, RabtError::InvalidDescriptor(_)));
/// ```
pub struct DescriptorBuilder<C> {
    lifetime: Lifetime,
    strategies: Vec<ServiceStrategy>,
    disposer: Option<DisposeHook>,
    _contract: PhantomData<fn() -> C>,
}

impl<C: Send + Sync + 'static> DescriptorBuilder<C> {
    pub fn implementation<I: Injectable<C> + 'static>(mut self) -> Self {
        self.strategies
            .push(ServiceStrategy::Implementation(ImplementationType::of::<C, I>()));
        self
    }

    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&dyn Resolver) -> Result<C> + Send + Sync + 'static,
    {
        self.strategies.push(ServiceStrategy::Factory(erase_factory(factory)));
        self
    }

    pub fn instance(mut self, value: C) -> Self {
        self.strategies
            .push(ServiceStrategy::Instance(Arc::new(value) as ServiceInstance));
        self
    }

    /// Validates and produces the descriptor.
    ///
    /// # Errors
    /// [`RabtError::InvalidDescriptor`] unless exactly one strategy was given.
    pub fn build(mut self) -> Result<ServiceDescriptor> {
        let contract = ContractKey::of::<C>();
        match self.strategies.len() {
            0 => Err(invalid(contract, InvalidDescriptorReason::MissingStrategy)),
            1 => {
                let strategy = self.strategies.remove(0);
                let mut descriptor = ServiceDescriptor::from_parts(contract, self.lifetime, strategy);
                descriptor.disposer = self.disposer;
                Ok(descriptor)
            }
            _ => Err(invalid(
                contract,
                InvalidDescriptorReason::ConflictingStrategies(
                    self.strategies.iter().map(ServiceStrategy::kind).collect(),
                ),
            )),
        }
    }
}

impl<C: Dispose> DescriptorBuilder<C> {
    /// Disposes cached instances when their scope or provider is disposed.
    pub fn disposable(mut self) -> Self {
        self.disposer = Some(Arc::new(|instance: &ServiceInstance| -> DisposeResult {
            match instance.downcast_ref::<C>() {
                Some(service) => service.dispose(),
                None => Ok(()),
            }
        }));
        self
    }
}

fn erase_factory<C, F>(factory: F) -> FactoryFn
where
    C: Send + Sync + 'static,
    F: Fn(&dyn Resolver) -> Result<C> + Send + Sync + 'static,
{
    Arc::new(move |resolver: &dyn Resolver| Ok(Arc::new(factory(resolver)?) as ServiceInstance))
}

fn invalid(contract: ContractKey, reason: InvalidDescriptorReason) -> RabtError {
    RabtError::InvalidDescriptor(InvalidDescriptorError { contract, reason })
}
