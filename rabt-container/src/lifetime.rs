//! Service lifetimes.
//!
//! A lifetime decides which cache, if any, holds a resolved instance:
//! - [`Lifetime::Singleton`]: the provider-wide cache
//! - [`Lifetime::Scoped`]: the cache of the scope doing the resolving
//! - [`Lifetime::Transient`]: none, every resolution constructs
//!
//! # Ordering
//! Lifetimes are ordered by how long an instance lives:
//! `Singleton > Scoped > Transient`.
use std::fmt;

/// Caching policy of a registration.
///
/// # Examples
/// ```
/// use rabt_container::lifetime::Lifetime;
///
/// assert!(Lifetime::Singleton > Lifetime::Scoped);
/// assert!(Lifetime::Scoped > Lifetime::Transient);
/// assert!(!Lifetime::Transient.is_cached());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance for the lifetime of the root provider.
    ///
    /// Shared by every scope created from it and disposed with the provider.
    Singleton,

    /// One instance per scope.
    ///
    /// Resolved from the root provider, the root acts as its own scope, so
    /// the instance is effectively a singleton there.
    Scoped,

    /// A fresh instance on every resolution. Never cached, never disposed
    /// by the container.
    Transient,
}

impl Lifetime {
    /// Returns `true` if instances are kept in a cache.
    #[inline]
    pub fn is_cached(&self) -> bool {
        !matches!(self, Lifetime::Transient)
    }

    #[inline]
    fn rank(&self) -> u8 {
        match self {
            Lifetime::Singleton => 2,
            Lifetime::Scoped => 1,
            Lifetime::Transient => 0,
        }
    }
}

impl PartialOrd for Lifetime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lifetime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifetime::Singleton => "Singleton",
            Lifetime::Scoped => "Scoped",
            Lifetime::Transient => "Transient",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_by_longevity() {
        let mut all = vec![Lifetime::Scoped, Lifetime::Singleton, Lifetime::Transient];
        all.sort();
        assert_eq!(all, vec![Lifetime::Transient, Lifetime::Scoped, Lifetime::Singleton]);
    }

    #[test]
    fn only_transient_skips_cache() {
        assert!(Lifetime::Singleton.is_cached());
        assert!(Lifetime::Scoped.is_cached());
        assert!(!Lifetime::Transient.is_cached());
    }

    #[test]
    fn display_names() {
        assert_eq!(Lifetime::Singleton.to_string(), "Singleton");
        assert_eq!(Lifetime::Scoped.to_string(), "Scoped");
        assert_eq!(Lifetime::Transient.to_string(), "Transient");
    }
}
