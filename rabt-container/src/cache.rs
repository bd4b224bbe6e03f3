//! Lifetime caches.
//!
//! Each cache maps a call-site slot to a [`OnceCell`]. The first request for
//! an empty slot claims it and constructs; concurrent requests wait for the
//! claimant, so at most one instance is ever constructed per slot and cache.
//! A failed construction leaves the cell empty.
//!
//! Claims are tracked per provider by a [`ConstructionTracker`] shared by
//! the provider's caches and all of its scopes. A wait that would close a
//! loop of threads waiting on each other fails with
//! [`RabtError::CircularDependency`] instead of blocking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::descriptor::ServiceInstance;
use crate::dispose::{DisposalLedger, DisposeHook};
use crate::error::{CircularDependencyError, DisposalFailure, RabtError, Result};
use crate::key::ContractKey;

static NEXT_CACHE_ID: AtomicUsize = AtomicUsize::new(0);

/// A slot across every cache of one provider: `(cache id, slot index)`.
type SlotId = (usize, usize);

/// What the cache needs to know about the registration it stores.
pub(crate) struct CacheSlot<'a> {
    pub index: usize,
    pub contract: ContractKey,
    pub disposer: Option<&'a DisposeHook>,
}

struct Claim {
    owner: ThreadId,
    contract: ContractKey,
}

#[derive(Default)]
struct TrackerState {
    claims: HashMap<SlotId, Claim>,
    waiting: HashMap<ThreadId, SlotId>,
    /// Waiting threads whose wait was found to be part of a cycle.
    broken: HashMap<ThreadId, Vec<ContractKey>>,
}

impl TrackerState {
    /// Follows claimant to awaited slot to claimant, starting at `target`.
    /// Returns the cycle and the other threads on it if the walk comes back
    /// to `me`.
    fn wait_cycle(&self, me: ThreadId, target: SlotId) -> Option<(Vec<ContractKey>, Vec<ThreadId>)> {
        let mut contracts = Vec::new();
        let mut threads = Vec::new();
        let mut slot = target;

        for _ in 0..=self.claims.len() {
            let claim = self.claims.get(&slot)?;
            contracts.push(claim.contract);
            if claim.owner == me {
                let mut chain = Vec::with_capacity(contracts.len() + 1);
                chain.push(claim.contract);
                chain.extend(contracts);
                return Some((chain, threads));
            }
            threads.push(claim.owner);
            slot = *self.waiting.get(&claim.owner)?;
        }
        None
    }
}

/// Who is constructing which slot, and who waits on whom.
#[derive(Default)]
pub(crate) struct ConstructionTracker {
    state: Mutex<TrackerState>,
    released: Condvar,
}

impl ConstructionTracker {
    /// Waits until `cell` is filled or claims it for the calling thread.
    ///
    /// `Ok(Some(_))` is an instance built by another thread, `Ok(None)` means
    /// the caller now owns the slot and must construct it.
    fn claim(
        &self,
        id: SlotId,
        contract: ContractKey,
        cell: &OnceCell<ServiceInstance>,
    ) -> Result<Option<ServiceInstance>> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        loop {
            if let Some(instance) = cell.get() {
                return Ok(Some(instance.clone()));
            }

            let Some(owner) = state.claims.get(&id).map(|claim| claim.owner) else {
                state.claims.insert(id, Claim { owner: me, contract });
                return Ok(None);
            };

            // Same thread, new resolution chain: a factory resolving through a
            // captured provider instead of the resolver it was handed.
            if owner == me {
                return Err(cycle(vec![contract, contract]));
            }

            if let Some((chain, others)) = state.wait_cycle(me, id) {
                warn!(contract = %contract, threads = others.len() + 1, "Constructions wait on each other");
                for waiter in others {
                    state.broken.insert(waiter, chain.clone());
                }
                self.released.notify_all();
                return Err(cycle(chain));
            }

            state.waiting.insert(me, id);
            self.released.wait(&mut state);
            state.waiting.remove(&me);

            if let Some(chain) = state.broken.remove(&me) {
                return Err(cycle(chain));
            }
        }
    }

    fn release(&self, id: SlotId) {
        self.state.lock().claims.remove(&id);
        self.released.notify_all();
    }
}

fn cycle(chain: Vec<ContractKey>) -> RabtError {
    RabtError::CircularDependency(CircularDependencyError { chain })
}

/// Releases a claim however construction ends, panics included.
struct ClaimGuard<'a> {
    tracker: &'a ConstructionTracker,
    id: SlotId,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.tracker.release(self.id);
    }
}

pub(crate) struct InstanceCache {
    id: usize,
    /// Named in `ScopeDisposed` errors: `"provider"` or `"scope"`.
    owner: &'static str,
    cells: DashMap<usize, Arc<OnceCell<ServiceInstance>>>,
    ledger: DisposalLedger,
    tracker: Arc<ConstructionTracker>,
}

impl InstanceCache {
    pub(crate) fn new(owner: &'static str, tracker: Arc<ConstructionTracker>) -> Self {
        Self {
            id: NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed),
            owner,
            cells: DashMap::new(),
            ledger: DisposalLedger::default(),
            tracker,
        }
    }

    /// Returns the cached instance for `slot`, constructing it with `create`
    /// on first use.
    ///
    /// Fails with `ScopeDisposed` when the cache was disposed while `create`
    /// ran; a disposable instance built that late is released immediately.
    pub(crate) fn get_or_create(
        &self,
        slot: &CacheSlot<'_>,
        create: impl FnOnce() -> Result<ServiceInstance>,
    ) -> Result<ServiceInstance> {
        // Clone the cell out so no map guard is held while `create` resolves
        // further dependencies through this same cache.
        let cell = self.cells.entry(slot.index).or_default().clone();
        if let Some(instance) = cell.get() {
            return Ok(instance.clone());
        }

        let id = (self.id, slot.index);
        if let Some(instance) = self.tracker.claim(id, slot.contract, &cell)? {
            return Ok(instance);
        }
        let _claim = ClaimGuard {
            tracker: &self.tracker,
            id,
        };

        let instance = create()?;
        if !self.ledger.admit(slot.contract, &instance, slot.disposer) {
            return Err(RabtError::ScopeDisposed {
                key: slot.contract,
                owner: self.owner,
            });
        }
        debug!(contract = %slot.contract, slot = slot.index, "Cached new instance");

        // The claim is still held, so nobody else can have filled the cell.
        let _ = cell.set(instance.clone());
        Ok(instance)
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.iter().filter(|cell| cell.value().get().is_some()).count()
    }

    /// Disposes every disposable instance and forgets all cached ones.
    ///
    /// Constructions still running when this is called are released as soon
    /// as they finish.
    pub(crate) fn dispose_into(&self, failures: &mut Vec<DisposalFailure>) {
        self.ledger.dispose_into(failures);
        self.cells.clear();
    }
}

impl Default for InstanceCache {
    fn default() -> Self {
        Self::new("provider", Arc::default())
    }
}

impl fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceCache")
            .field("instances", &self.len())
            .field("disposable", &self.ledger.len())
            .finish()
    }
}
