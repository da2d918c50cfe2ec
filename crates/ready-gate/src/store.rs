// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identity-keyed readiness state for tracked instances.

use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::pending::PendingCall;

/// Identity of an instance: the address of its `Rc` allocation.
///
/// Each entry holds a `Weak` to the same allocation, which keeps the
/// address reserved for as long as the entry exists, so a key is never
/// reused by a different instance while it is still in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct InstanceKey(usize);

impl InstanceKey {
    pub(crate) fn of<I>(instance: &Rc<I>) -> Self {
        Self(Rc::as_ptr(instance) as usize)
    }
}

/// Readiness of one tracked instance.
#[derive(Debug)]
pub(crate) enum State<I> {
    /// Calls run immediately.
    Ready,
    /// Calls are buffered in issue order.
    Queuing(VecDeque<PendingCall<I>>),
}

#[derive(Debug)]
struct Entry<I> {
    instance: Weak<I>,
    state: State<I>,
}

impl<I> Entry<I> {
    fn is_live(&self) -> bool {
        self.instance.strong_count() > 0
    }
}

/// Entry count below which dead entries are left until the next sweep.
const MIN_SWEEP_AT: usize = 64;

/// All entries of one gate. Never owns an instance.
///
/// Entries of released instances are swept when the map reaches
/// `sweep_at`, which is reset to twice the surviving count after each
/// sweep, so registration stays amortised O(1). Swept state lands in
/// `released` rather than being dropped in place: dropping pending calls
/// runs user `Drop` code, which must not happen while the store is borrowed.
#[derive(Debug)]
pub(crate) struct Store<I> {
    entries: HashMap<InstanceKey, Entry<I>>,
    sweep_at: usize,
    sweeps: u64,
    released: Vec<State<I>>,
}

impl<I> Default for Store<I> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            sweep_at: MIN_SWEEP_AT,
            sweeps: 0,
            released: Vec::new(),
        }
    }
}

impl<I> Store<I> {
    pub(crate) fn state(&self, instance: &Rc<I>) -> Option<&State<I>> {
        self.entries
            .get(&InstanceKey::of(instance))
            .map(|entry| &entry.state)
    }

    pub(crate) fn state_mut(&mut self, instance: &Rc<I>) -> Option<&mut State<I>> {
        self.entries
            .get_mut(&InstanceKey::of(instance))
            .map(|entry| &mut entry.state)
    }

    /// Create an entry for `instance` in `state`, replacing any previous one.
    pub(crate) fn insert(&mut self, instance: &Rc<I>, state: State<I>) {
        if self.entries.len() >= self.sweep_at {
            self.sweep();
        }
        let previous = self.entries.insert(
            InstanceKey::of(instance),
            Entry {
                instance: Rc::downgrade(instance),
                state,
            },
        );
        if let Some(previous) = previous {
            self.released.push(previous.state);
        }
    }

    /// Append `call` to the queue of `instance`, creating the queue if the
    /// instance has never been seen.
    ///
    /// Returns the queue length after the push. Callers only enqueue when the
    /// instance is not ready; a ready entry refuses the call and hands it back.
    pub(crate) fn enqueue(
        &mut self,
        instance: &Rc<I>,
        call: PendingCall<I>,
    ) -> Result<usize, PendingCall<I>> {
        match self.state_mut(instance) {
            Some(State::Queuing(queue)) => {
                queue.push_back(call);
                Ok(queue.len())
            }
            Some(State::Ready) => Err(call),
            None => {
                self.insert(instance, State::Queuing(VecDeque::from([call])));
                Ok(1)
            }
        }
    }

    /// Number of entries whose instance is still alive. Sweeps the rest.
    pub(crate) fn live_len(&mut self) -> usize {
        self.sweep();
        self.entries.len()
    }

    /// State removed from the store since the last call. The caller drops
    /// it once the store borrow has ended.
    pub(crate) fn take_released(&mut self) -> Vec<State<I>> {
        std::mem::take(&mut self.released)
    }

    fn sweep(&mut self) {
        let dead: Vec<InstanceKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live())
            .map(|(key, _)| *key)
            .collect();
        for key in &dead {
            if let Some(entry) = self.entries.remove(key) {
                self.released.push(entry.state);
            }
        }
        self.sweeps += 1;
        self.sweep_at = (self.entries.len() * 2).max(MIN_SWEEP_AT);
        if !dead.is_empty() {
            trace!(
                pruned = dead.len(),
                live = self.entries.len(),
                sweeps = self.sweeps,
                "dropped entries for released instances"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::error::GateError;
    use crate::invocation::Invocation;
    use tokio::sync::oneshot;

    fn noop_call() -> PendingCall<String> {
        let method = Rc::new(|_: &Rc<String>, (): ()| -> Invocation<(), GateError> {
            async { Ok(()) }.into()
        });
        let (tx, _rx) = oneshot::channel();
        PendingCall::new(method, (), tx)
    }

    #[test]
    fn keys_compare_by_identity_not_value() {
        let a = Rc::new(String::from("same"));
        let b = Rc::new(String::from("same"));
        assert_eq!(a, b);
        assert_ne!(InstanceKey::of(&a), InstanceKey::of(&b));
        assert_eq!(InstanceKey::of(&a), InstanceKey::of(&Rc::clone(&a)));
    }

    #[test]
    fn enqueue_creates_then_extends_queue() {
        let mut store = Store::default();
        let inst = Rc::new(String::from("db"));
        assert!(store.state(&inst).is_none());

        assert_eq!(store.enqueue(&inst, noop_call()).ok(), Some(1));
        assert_eq!(store.enqueue(&inst, noop_call()).ok(), Some(2));
        assert!(matches!(store.state(&inst), Some(State::Queuing(q)) if q.len() == 2));
    }

    #[test]
    fn enqueue_leaves_ready_entries_alone() {
        let mut store = Store::default();
        let inst = Rc::new(String::from("db"));
        store.insert(&inst, State::Ready);
        assert!(store.enqueue(&inst, noop_call()).is_err());
        assert!(matches!(store.state(&inst), Some(State::Ready)));
    }

    #[test]
    fn store_does_not_keep_instances_alive() {
        let mut store = Store::default();
        let inst = Rc::new(String::from("db"));
        store.insert(&inst, State::Ready);
        assert_eq!(Rc::strong_count(&inst), 1);
        assert_eq!(store.live_len(), 1);

        drop(inst);
        assert_eq!(store.live_len(), 0);
    }

    #[test]
    fn registering_many_live_instances_sweeps_logarithmically() {
        let mut store = Store::default();
        let live: Vec<Rc<String>> = (0..10_000).map(|i| Rc::new(i.to_string())).collect();
        for inst in &live {
            store.insert(inst, State::Ready);
        }
        assert_eq!(store.entries.len(), live.len());
        // The threshold doubles with the live count, so 10k registrations
        // trigger a handful of sweeps rather than one per insert.
        assert!(store.sweeps <= 10, "sweeps = {}", store.sweeps);
        assert!(store.sweep_at >= store.entries.len());
        assert_eq!(store.live_len(), live.len());
    }

    #[test]
    fn released_instances_are_swept_as_the_store_grows() {
        let mut store = Store::default();
        let kept: Vec<Rc<String>> = (0..10).map(|i| Rc::new(i.to_string())).collect();
        for inst in &kept {
            store.insert(inst, State::Ready);
        }
        for i in 0..10_000 {
            let transient = Rc::new(format!("transient-{i}"));
            assert!(store.enqueue(&transient, noop_call()).is_ok());
            assert!(store.entries.len() <= MIN_SWEEP_AT);
        }
        assert_eq!(store.live_len(), kept.len());
    }

    #[test]
    fn swept_state_is_handed_back_not_dropped_in_place() {
        let mut store = Store::default();
        let inst = Rc::new(String::from("gone"));
        assert!(store.enqueue(&inst, noop_call()).is_ok());
        drop(inst);
        assert!(store.take_released().is_empty());

        assert_eq!(store.live_len(), 0);
        let released = store.take_released();
        assert!(matches!(released.as_slice(), [State::Queuing(q)] if q.len() == 1));
        assert!(store.take_released().is_empty());
    }
}
