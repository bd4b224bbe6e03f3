//! Resource release for cached instances.
//!
//! Services that hold resources implement [`Dispose`] and opt in when they
//! are described (see [`DescriptorBuilder::disposable`](crate::descriptor::DescriptorBuilder::disposable)).
//! Every cache keeps a [`DisposalLedger`] of the disposable instances it
//! constructed and releases them LIFO when its owner is disposed.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::descriptor::ServiceInstance;
use crate::error::{BoxError, DisposalFailure};
use crate::key::ContractKey;

/// Outcome of a single [`Dispose::dispose`] call.
pub type DisposeResult = std::result::Result<(), BoxError>;

/// Explicit teardown for services holding resources.
///
/// # Examples
/// ```
/// use rabt_container::dispose::{Dispose, DisposeResult};
///
/// struct Pool { open: std::sync::atomic::AtomicBool }
///
/// impl Dispose for Pool {
///     fn dispose(&self) -> DisposeResult {
///         self.open.store(false, std::sync::atomic::Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
pub trait Dispose: Send + Sync + 'static {
    fn dispose(&self) -> DisposeResult;
}

impl<T: Dispose + ?Sized> Dispose for Arc<T> {
    fn dispose(&self) -> DisposeResult {
        (**self).dispose()
    }
}

impl<T: Dispose + ?Sized> Dispose for Box<T> {
    fn dispose(&self) -> DisposeResult {
        (**self).dispose()
    }
}

/// Type-erased disposal hook stored on a descriptor.
pub type DisposeHook = Arc<dyn Fn(&ServiceInstance) -> DisposeResult + Send + Sync>;

struct LedgerEntry {
    contract: ContractKey,
    instance: ServiceInstance,
    hook: DisposeHook,
}

/// Disposable instances owned by one cache, in construction order.
///
/// Once drained the ledger is closed: later admissions are refused.
#[derive(Default)]
pub(crate) struct DisposalLedger {
    state: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    entries: Vec<LedgerEntry>,
    closed: bool,
}

impl DisposalLedger {
    /// Takes ownership of a freshly constructed instance.
    ///
    /// Returns `false` when the ledger was already drained. A disposable
    /// instance refused that way is released on the spot so it cannot leak.
    pub(crate) fn admit(
        &self,
        contract: ContractKey,
        instance: &ServiceInstance,
        hook: Option<&DisposeHook>,
    ) -> bool {
        let mut state = self.state.lock();
        if !state.closed {
            if let Some(hook) = hook {
                state.entries.push(LedgerEntry {
                    contract,
                    instance: instance.clone(),
                    hook: hook.clone(),
                });
            }
            return true;
        }
        drop(state);

        if let Some(hook) = hook {
            match hook(instance) {
                Ok(()) => debug!(contract = %contract, "Disposed late instance"),
                Err(source) => warn!(contract = %contract, error = %source, "Late instance failed to dispose"),
            }
        }
        false
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Closes the ledger and disposes everything admitted so far, newest first.
    ///
    /// A failing instance does not stop the others; its error is appended
    /// to `failures`.
    pub(crate) fn dispose_into(&self, failures: &mut Vec<DisposalFailure>) {
        let entries = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.entries)
        };
        for entry in entries.into_iter().rev() {
            match (entry.hook)(&entry.instance) {
                Ok(()) => debug!(contract = %entry.contract, "Disposed instance"),
                Err(source) => {
                    warn!(contract = %entry.contract, error = %source, "Instance failed to dispose");
                    failures.push(DisposalFailure {
                        contract: entry.contract,
                        source,
                    });
                }
            }
        }
    }
}
