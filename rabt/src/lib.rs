//! # Rabt: Dependency Injection Container for Rust
//!
//! Register services in a [`ServiceCollection`], build a
//! [`ServiceProvider`], resolve through it or through its scopes.
//!
//! ```rust
//! use std::sync::Arc;
//! use rabt::prelude::*;
//!
//! struct Greeter(&'static str);
//!
//! let mut services = ServiceCollection::new();
//! services.add(ServiceDescriptor::singleton_factory(|_| Ok(Greeter("hello"))));
//!
//! let provider = services.build();
//! let greeter: Arc<Greeter> = provider.get_required_service().unwrap();
//! assert_eq!(greeter.0, "hello");
//! ```

pub use rabt_container::*;
pub use rabt_support::rendering;
