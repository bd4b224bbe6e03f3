//! Core container implementation for Rabt DI.

pub mod activator;
pub(crate) mod cache;
pub mod collection;
pub mod descriptor;
pub mod dispose;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod manifest;
pub mod options;
pub mod provider;
pub mod resolver;
pub mod scope;

pub use collection::ServiceCollection;
pub use descriptor::ServiceDescriptor;
pub use error::{RabtError, Result};
pub use key::ContractKey;
pub use lifetime::Lifetime;
pub use provider::{ServiceProvider, prelude};
pub use scope::ServiceScope;
