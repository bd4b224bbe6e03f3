//! The registration collection.
//!
//! A [`ServiceCollection`] is an ordered list of
//! [`ServiceDescriptor`]s. Duplicates are allowed: single resolution picks
//! the last one, `get_services` returns all of them in order. Building a
//! provider takes a snapshot, so later changes to the collection do not
//! reach providers already built.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::activator::{DefaultTypeActivator, TypeActivator};
use crate::descriptor::ServiceDescriptor;
use crate::error::Result;
use crate::key::ContractKey;
use crate::manifest;
use crate::options::ProviderOptions;
use crate::provider::ServiceProvider;

/// Ordered, mutable list of registrations.
///
/// # Examples
/// ```rust
/// use rabt_container::prelude::*;
///
/// let mut services = ServiceCollection::new();
/// services.add(ServiceDescriptor::instance(8080u16));
///
/// assert!(!services.try_add(ServiceDescriptor::instance(9090u16)));
/// services.replace(ServiceDescriptor::instance(9090u16));
///
/// let provider = services.build();
/// assert_eq!(*provider.get_required_service::<u16>().unwrap(), 9090);
/// ```
#[derive(Clone, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `descriptor`.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        debug!(contract = %descriptor.contract(), lifetime = %descriptor.lifetime(), "Registered");
        self.descriptors.push(descriptor);
        self
    }

    /// Appends `descriptor` unless its contract is already registered.
    ///
    /// Returns whether it was added.
    pub fn try_add(&mut self, descriptor: ServiceDescriptor) -> bool {
        if self.contains(&descriptor.contract()) {
            debug!(contract = %descriptor.contract(), "Already registered, skipped");
            return false;
        }
        self.add(descriptor);
        true
    }

    /// Inserts `descriptor` at `index`, shifting later registrations.
    ///
    /// # Panics
    /// If `index > len()`.
    pub fn insert(&mut self, index: usize, descriptor: ServiceDescriptor) -> &mut Self {
        debug!(contract = %descriptor.contract(), index, "Registered");
        self.descriptors.insert(index, descriptor);
        self
    }

    pub fn add_range(&mut self, descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> &mut Self {
        for descriptor in descriptors {
            self.add(descriptor);
        }
        self
    }

    /// [`try_add`](Self::try_add) for each descriptor, in order.
    ///
    /// Returns whether any was added.
    pub fn try_add_range(&mut self, descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> bool {
        descriptors
            .into_iter()
            .fold(false, |added, descriptor| self.try_add(descriptor) | added)
    }

    /// Removes the first registration of the same contract, then appends
    /// `descriptor`.
    pub fn replace(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        let contract = descriptor.contract();
        if let Some(index) = self.position(&contract) {
            self.descriptors.remove(index);
            debug!(contract = %contract, "Replaced registration");
        }
        self.add(descriptor)
    }

    /// Removes the first registration of `contract`.
    pub fn remove(&mut self, contract: &ContractKey) -> Option<ServiceDescriptor> {
        let index = self.position(contract)?;
        Some(self.descriptors.remove(index))
    }

    /// Removes every registration of `contract`. Returns how many there were.
    pub fn remove_all(&mut self, contract: &ContractKey) -> usize {
        let before = self.descriptors.len();
        self.descriptors.retain(|descriptor| descriptor.contract() != *contract);
        before - self.descriptors.len()
    }

    pub fn remove_at(&mut self, index: usize) -> Option<ServiceDescriptor> {
        (index < self.descriptors.len()).then(|| self.descriptors.remove(index))
    }

    pub fn contains(&self, contract: &ContractKey) -> bool {
        self.position(contract).is_some()
    }

    pub fn contains_type<T: ?Sized + 'static>(&self) -> bool {
        self.contains(&ContractKey::of::<T>())
    }

    pub fn get(&self, index: usize) -> Option<&ServiceDescriptor> {
        self.descriptors.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Try-adds [`DefaultTypeActivator`] under the `Arc<dyn TypeActivator>`
    /// contract.
    pub fn add_type_activator(&mut self) -> &mut Self {
        self.try_add(ServiceDescriptor::instance::<Arc<dyn TypeActivator>>(Arc::new(
            DefaultTypeActivator,
        )));
        self
    }

    /// Adds proxies for the services `fallback` exports through its
    /// [`ServiceManifest`](crate::manifest::ServiceManifest).
    ///
    /// See [`manifest::import`].
    pub fn import(&mut self, fallback: &ServiceProvider) -> Result<usize> {
        manifest::import(self, fallback)
    }

    /// Builds a provider with default [`ProviderOptions`].
    pub fn build(&self) -> ServiceProvider {
        self.build_with(ProviderOptions::default())
    }

    /// Builds a provider from a snapshot of the current registrations.
    pub fn build_with(&self, options: ProviderOptions) -> ServiceProvider {
        ServiceProvider::build(self.descriptors.clone(), options)
    }

    pub(crate) fn position(&self, contract: &ContractKey) -> Option<usize> {
        self.descriptors
            .iter()
            .position(|descriptor| descriptor.contract() == *contract)
    }
}

impl Extend<ServiceDescriptor> for ServiceCollection {
    fn extend<I: IntoIterator<Item = ServiceDescriptor>>(&mut self, iter: I) {
        self.add_range(iter);
    }
}

impl FromIterator<ServiceDescriptor> for ServiceCollection {
    fn from_iter<I: IntoIterator<Item = ServiceDescriptor>>(iter: I) -> Self {
        let mut services = Self::new();
        services.add_range(iter);
        services
    }
}

impl IntoIterator for ServiceCollection {
    type Item = ServiceDescriptor;
    type IntoIter = std::vec::IntoIter<ServiceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ServiceCollection {
    type Item = &'a ServiceDescriptor;
    type IntoIter = std::slice::Iter<'a, ServiceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.descriptors).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activator::{ImplementationType, Injectable};
    use crate::descriptor::ServiceInstance;
    use crate::lifetime::Lifetime;
    use crate::resolver::{Resolver, ResolverApi};

    #[derive(Debug)]
    struct Port(u16);
    #[derive(Debug)]
    struct Host(&'static str);

    #[derive(Debug)]
    struct Greeting(String);

    impl Injectable<Greeting> for Greeting {
        fn inject(resolver: &dyn Resolver) -> Result<Greeting> {
            let host: Arc<Host> = resolver.get_required_service()?;
            Ok(Greeting(format!("hello from {}", host.0)))
        }
    }

    fn ports(values: &[u16]) -> Vec<ServiceDescriptor> {
        values.iter().map(|&p| ServiceDescriptor::instance(Port(p))).collect()
    }

    #[test]
    fn add_keeps_duplicates_in_order() {
        let mut services = ServiceCollection::new();
        services.add_range(ports(&[1, 2]));
        services.add(ServiceDescriptor::instance(Host("a")));

        assert_eq!(services.len(), 3);
        assert!(services.get(0).unwrap().contract().is::<Port>());
        assert!(services.get(2).unwrap().contract().is::<Host>());
    }

    #[test]
    fn try_add_refuses_duplicates() {
        let mut services = ServiceCollection::new();
        assert!(services.try_add(ServiceDescriptor::instance(Port(1))));
        assert!(!services.try_add(ServiceDescriptor::instance(Port(2))));
        assert_eq!(services.len(), 1);

        let provider = services.build();
        assert_eq!(provider.get_required_service::<Port>().unwrap().0, 1);
    }

    #[test]
    fn try_add_range_reports_any_added() {
        let mut services = ServiceCollection::new();
        services.add(ServiceDescriptor::instance(Port(1)));

        assert!(!services.try_add_range(ports(&[2, 3])));
        assert!(services.try_add_range(vec![
            ServiceDescriptor::instance(Port(4)),
            ServiceDescriptor::instance(Host("b")),
        ]));
        assert_eq!(services.len(), 2);
    }

    #[test]
    fn replace_leaves_one_registration() {
        let mut services = ServiceCollection::new();
        services.add(ServiceDescriptor::instance(Port(1)));
        services.add(ServiceDescriptor::instance(Host("a")));
        services.replace(ServiceDescriptor::instance(Port(2)));

        let ports: Vec<_> = services.iter().filter(|d| d.contract().is::<Port>()).collect();
        assert_eq!(ports.len(), 1);
        assert_eq!(services.build().get_required_service::<Port>().unwrap().0, 2);
    }

    #[test]
    fn insert_shifts_later_registrations() {
        let mut services: ServiceCollection = ports(&[1, 2]).into_iter().collect();
        services.insert(0, ServiceDescriptor::instance(Host("first")));

        assert!(services.get(0).unwrap().contract().is::<Host>());
        assert_eq!(services.build().get_required_service::<Port>().unwrap().0, 2);
    }

    #[test]
    fn replace_without_existing_just_adds() {
        let mut services = ServiceCollection::new();
        services.replace(ServiceDescriptor::instance(Port(3)));
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn remove_variants() {
        let mut services: ServiceCollection = ports(&[1, 2, 3]).into_iter().collect();
        services.add(ServiceDescriptor::instance(Host("a")));

        let removed = services.remove(&ContractKey::of::<Port>()).unwrap();
        assert!(removed.contract().is::<Port>());
        assert_eq!(services.len(), 3);

        assert!(services.remove_at(10).is_none());
        assert!(services.remove_at(2).unwrap().contract().is::<Host>());

        assert_eq!(services.remove_all(&ContractKey::of::<Port>()), 2);
        assert!(services.is_empty());
        assert!(services.remove(&ContractKey::of::<Port>()).is_none());
    }

    #[test]
    fn provider_is_a_snapshot() {
        let mut services = ServiceCollection::new();
        services.add(ServiceDescriptor::instance(Port(1)));
        let provider = services.build();

        services.add(ServiceDescriptor::instance(Port(2)));
        services.add(ServiceDescriptor::instance(Host("late")));

        assert_eq!(provider.get_required_service::<Port>().unwrap().0, 1);
        assert!(provider.get_service::<Host>().unwrap().is_none());
    }

    #[test]
    fn add_type_activator_is_idempotent_and_used() {
        let mut services = ServiceCollection::new();
        services.add_type_activator().add_type_activator();
        services
            .add(ServiceDescriptor::instance(Host("rabt")))
            .add(ServiceDescriptor::transient::<Greeting, Greeting>());

        assert_eq!(services.len(), 3);
        assert!(services.contains_type::<Arc<dyn TypeActivator>>());

        let provider = services.build();
        assert_eq!(provider.get_required_service::<Greeting>().unwrap().0, "hello from rabt");
    }

    #[test]
    fn registered_activator_replaces_default() {
        struct Refusing;

        impl TypeActivator for Refusing {
            fn create_instance(&self, _: &dyn Resolver, implementation: &ImplementationType) -> Result<ServiceInstance> {
                Err(crate::error::RabtError::construction(implementation.key(), "activation disabled"))
            }
        }

        let mut services = ServiceCollection::new();
        services
            .add(ServiceDescriptor::instance::<Arc<dyn TypeActivator>>(Arc::new(Refusing)))
            .add_type_activator()
            .add(ServiceDescriptor::instance(Host("rabt")))
            .add(ServiceDescriptor::scoped::<Greeting, Greeting>());

        let err = services.build().get_service::<Greeting>().unwrap_err();
        assert!(err.to_string().contains("activation disabled"));
    }

    #[test]
    fn extend_and_iterate() {
        let mut services = ServiceCollection::new();
        services.extend(ports(&[5, 6]));

        let lifetimes: Vec<Lifetime> = (&services).into_iter().map(ServiceDescriptor::lifetime).collect();
        assert_eq!(lifetimes, vec![Lifetime::Singleton, Lifetime::Singleton]);
        assert_eq!(services.into_iter().count(), 2);
    }

    #[test]
    fn debug_lists_descriptors() {
        let mut services = ServiceCollection::new();
        services.add(ServiceDescriptor::instance(Port(1)));
        let debug = format!("{services:?}");
        assert!(debug.contains("ServiceDescriptor"));
        assert!(debug.contains("Port"));
    }
}
