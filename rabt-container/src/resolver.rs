//! The resolution seam.
//!
//! [`Resolver`] is the object-safe interface factories and activators
//! receive. [`ResolverApi`] layers typed helpers on top of it and is
//! implemented for every resolver, including
//! [`ServiceProvider`](crate::provider::ServiceProvider) and
//! [`ServiceScope`](crate::scope::ServiceScope).

use std::any::type_name;
use std::sync::Arc;

use crate::descriptor::ServiceInstance;
use crate::error::{CircularDependencyError, NotRegisteredError, RabtError, Result};
use crate::key::ContractKey;

/// Which registrations of a contract a request wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceQuery {
    /// The last registration only. Yields zero or one instance.
    Single,
    /// Every registration, in registration order.
    All,
}

/// Resolves type-erased instances by contract.
pub trait Resolver: Send + Sync {
    /// Resolves `key`. Unregistered contracts yield an empty vector.
    fn resolve_key(&self, key: &ContractKey, query: ServiceQuery) -> Result<Vec<ServiceInstance>>;

    /// The error reported when a required `key` is missing.
    fn not_registered(&self, key: &ContractKey) -> RabtError {
        RabtError::NotRegistered(NotRegisteredError {
            requested: *key,
            required_by: None,
            suggestions: Vec::new(),
        })
    }
}

/// Typed resolution helpers.
///
/// ```rust
/// use std::sync::Arc;
/// use rabt_container::prelude::*;
///
/// let mut services = ServiceCollection::new();
/// services.add(ServiceDescriptor::instance(String::from("eu-west-1")));
/// let provider = services.build();
///
/// let region: Arc<String> = provider.get_required_service().unwrap();
/// assert_eq!(region.as_str(), "eu-west-1");
/// assert!(provider.get_service::<u16>().unwrap().is_none());
/// ```
pub trait ResolverApi {
    /// Resolves the last registration of `T`, or `None` if there is none.
    fn get_service<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>>;

    /// Like [`get_service`](ResolverApi::get_service), but a missing
    /// registration is a [`RabtError::NotRegistered`] error.
    fn get_required_service<T: Send + Sync + 'static>(&self) -> Result<Arc<T>>;

    /// Resolves every registration of `T` in registration order.
    fn get_services<T: Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>>;
}

impl<R: Resolver + ?Sized> ResolverApi for R {
    fn get_service<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        let key = ContractKey::of::<T>();
        self.resolve_key(&key, ServiceQuery::Single)?
            .pop()
            .map(|instance| downcast::<T>(key, instance))
            .transpose()
    }

    fn get_required_service<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = ContractKey::of::<T>();
        self.get_service::<T>()?.ok_or_else(|| self.not_registered(&key))
    }

    fn get_services<T: Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        let key = ContractKey::of::<T>();
        self.resolve_key(&key, ServiceQuery::All)?
            .into_iter()
            .map(|instance| downcast::<T>(key, instance))
            .collect()
    }
}

fn downcast<T: Send + Sync + 'static>(key: ContractKey, instance: ServiceInstance) -> Result<Arc<T>> {
    instance.downcast::<T>().map_err(|_| {
        RabtError::construction(key, format!("Type mismatch: expected {}", type_name::<T>()))
    })
}

/// Contracts currently under construction for one request, innermost last.
///
/// Each frame lives on the stack of the resolution that pushed it, so the
/// chain needs no allocation and unwinds with the call stack.
pub(crate) struct ResolutionChain<'a> {
    key: ContractKey,
    parent: Option<&'a ResolutionChain<'a>>,
    depth: usize,
}

impl<'a> ResolutionChain<'a> {
    pub(crate) fn push(parent: Option<&'a ResolutionChain<'a>>, key: ContractKey) -> Self {
        Self {
            key,
            parent,
            depth: parent.map_or(1, |p| p.depth + 1),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    fn frames(&self) -> impl Iterator<Item = &ResolutionChain<'a>> {
        std::iter::successors(Some(self), |frame| frame.parent)
    }

    /// If `key` is already being resolved, the cycle it closes.
    pub(crate) fn cycle_with(&self, key: &ContractKey) -> Option<CircularDependencyError> {
        if !self.frames().any(|frame| frame.key == *key) {
            return None;
        }

        let mut chain: Vec<ContractKey> = self
            .frames()
            .map(|frame| frame.key)
            .take_while(|frame_key| frame_key != key)
            .collect();
        chain.push(*key);
        chain.reverse();
        chain.push(*key);
        Some(CircularDependencyError { chain })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inbox;
    struct Outbox;
    struct Relay;

    struct Fixed(Vec<ServiceInstance>);

    fn instances<T: Send + Sync + 'static>(values: Vec<T>) -> Vec<ServiceInstance> {
        values
            .into_iter()
            .map(|value| Arc::new(value) as ServiceInstance)
            .collect()
    }

    impl Resolver for Fixed {
        fn resolve_key(&self, _: &ContractKey, query: ServiceQuery) -> Result<Vec<ServiceInstance>> {
            Ok(match query {
                ServiceQuery::Single => self.0.last().cloned().into_iter().collect(),
                ServiceQuery::All => self.0.clone(),
            })
        }
    }

    #[test]
    fn single_takes_what_the_resolver_picked() {
        let resolver = Fixed(instances(vec![1u32, 2u32]));
        let value: Arc<u32> = resolver.get_required_service().unwrap();
        assert_eq!(*value, 2);

        let all: Vec<Arc<u32>> = resolver.get_services().unwrap();
        assert_eq!(all.iter().map(|v| **v).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn missing_required_service_errors() {
        let resolver = Fixed(Vec::new());
        assert!(resolver.get_service::<u32>().unwrap().is_none());
        let err = resolver.get_required_service::<u32>().unwrap_err();
        assert!(matches!(err, RabtError::NotRegistered(e) if e.requested.is::<u32>()));
    }

    #[test]
    fn wrong_type_is_a_construction_failure() {
        let resolver = Fixed(instances(vec!["not a number"]));
        let err = resolver.get_service::<u32>().unwrap_err();
        assert!(err.to_string().contains("Type mismatch"));
    }

    #[test]
    fn works_through_dyn_resolver() {
        let resolver = Fixed(instances(vec![9i64]));
        let dynamic: &dyn Resolver = &resolver;
        assert_eq!(*dynamic.get_required_service::<i64>().unwrap(), 9);
    }

    #[test]
    fn chain_depth_counts_frames() {
        let root = ResolutionChain::push(None, ContractKey::of::<Inbox>());
        let child = ResolutionChain::push(Some(&root), ContractKey::of::<Outbox>());
        assert_eq!(root.depth(), 1);
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn cycle_reports_only_the_loop() {
        // Relay → Inbox → Outbox, then Outbox asks for Inbox again
        let relay = ResolutionChain::push(None, ContractKey::of::<Relay>());
        let inbox = ResolutionChain::push(Some(&relay), ContractKey::of::<Inbox>());
        let outbox = ResolutionChain::push(Some(&inbox), ContractKey::of::<Outbox>());

        assert!(outbox.cycle_with(&ContractKey::of::<String>()).is_none());

        let cycle = outbox.cycle_with(&ContractKey::of::<Inbox>()).unwrap();
        assert_eq!(
            cycle.chain,
            vec![
                ContractKey::of::<Inbox>(),
                ContractKey::of::<Outbox>(),
                ContractKey::of::<Inbox>(),
            ]
        );
    }

    #[test]
    fn self_cycle() {
        let relay = ResolutionChain::push(None, ContractKey::of::<Relay>());
        let cycle = relay.cycle_with(&ContractKey::of::<Relay>()).unwrap();
        assert_eq!(cycle.chain.len(), 2);
    }
}
