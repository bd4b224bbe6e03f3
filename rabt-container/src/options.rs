//! Provider options.

use serde::{Deserialize, Serialize};

/// Default limit on nested resolutions in one request.
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 256;

/// Settings applied when a provider is built.
///
/// Deserializable so hosts can keep them next to their own configuration;
/// missing fields take their defaults.
///
/// ```rust
/// use rabt_container::options::ProviderOptions;
///
/// let options = ProviderOptions::default()
///     .max_resolution_depth(64)
///     .dispose_on_drop(false);
/// assert_eq!(options.max_resolution_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    /// Requests nesting deeper than this fail with
    /// [`RabtError::DepthExceeded`](crate::error::RabtError::DepthExceeded).
    pub max_resolution_depth: usize,

    /// Dispose cached instances when the last provider handle, or a scope,
    /// is dropped without an explicit `dispose()`.
    pub dispose_on_drop: bool,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            dispose_on_drop: true,
        }
    }
}

impl ProviderOptions {
    pub fn max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    pub fn dispose_on_drop(mut self, enabled: bool) -> Self {
        self.dispose_on_drop = enabled;
        self
    }
}
