// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The readiness state machine and its drain protocol.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::error::GateError;
use crate::gated::Gated;
use crate::invocation::Invocation;
use crate::pending::PendingCall;
use crate::store::{State, Store};

/// Observable readiness of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    /// The gate has never seen this instance. Calls on it are queued.
    Unregistered,
    /// Calls run immediately.
    Ready,
    /// Calls are buffered until the next [`Gate::ready`].
    Queuing {
        /// Number of buffered calls.
        pending: usize,
    },
}

/// Tracks readiness for instances of `I` and buffers calls made on them
/// while they are not ready.
///
/// Cloning a `Gate` yields another handle to the same store. The store holds
/// only weak references, so tracking an instance never keeps it alive.
///
/// Queued calls live in the store, so a wrapped method that needs the gate
/// (to call [`Gate::wait`] from inside a replay, say) should capture a
/// [`WeakGate`] from [`Gate::downgrade`]. A captured `Gate` keeps the store
/// alive from inside its own queue.
pub struct Gate<I> {
    store: Rc<RefCell<Store<I>>>,
    label: &'static str,
}

/// Non-owning handle to a [`Gate`]'s store.
pub struct WeakGate<I> {
    store: Weak<RefCell<Store<I>>>,
    label: &'static str,
}

impl<I> Clone for Gate<I> {
    fn clone(&self) -> Self {
        Self {
            store: Rc::clone(&self.store),
            label: self.label,
        }
    }
}

impl<I> Clone for WeakGate<I> {
    fn clone(&self) -> Self {
        Self {
            store: Weak::clone(&self.store),
            label: self.label,
        }
    }
}

impl<I> Default for Gate<I> {
    fn default() -> Self {
        Self::named("gate")
    }
}

impl<I> fmt::Debug for Gate<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl<I> fmt::Debug for WeakGate<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakGate")
            .field("label", &self.label)
            .field("alive", &(self.store.strong_count() > 0))
            .finish()
    }
}

impl<I> WeakGate<I> {
    /// The gate, if any strong handle to it is still alive.
    pub fn upgrade(&self) -> Option<Gate<I>> {
        self.store.upgrade().map(|store| Gate {
            store,
            label: self.label,
        })
    }

    /// Label attached to the gate's log events.
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl<I> Gate<I> {
    /// Create a gate with an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gate whose log events carry `gate = label`.
    pub fn named(label: &'static str) -> Self {
        Self {
            store: Rc::new(RefCell::new(Store::default())),
            label,
        }
    }

    /// Non-owning handle for capturing inside wrapped methods.
    pub fn downgrade(&self) -> WeakGate<I> {
        WeakGate {
            store: Rc::downgrade(&self.store),
            label: self.label,
        }
    }

    /// Label attached to this gate's log events.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Whether `instance` is ready. Unseen and queuing instances are not.
    pub fn is_ready(&self, instance: &Rc<I>) -> bool {
        let store = self.store.borrow();
        matches!(store.state(instance), Some(State::Ready))
    }

    /// Current readiness of `instance`.
    pub fn status(&self, instance: &Rc<I>) -> GateStatus {
        let store = self.store.borrow();
        match store.state(instance) {
            None => GateStatus::Unregistered,
            Some(State::Ready) => GateStatus::Ready,
            Some(State::Queuing(queue)) => GateStatus::Queuing {
                pending: queue.len(),
            },
        }
    }

    /// Number of calls buffered for `instance`.
    pub fn pending_len(&self, instance: &Rc<I>) -> usize {
        match self.status(instance) {
            GateStatus::Queuing { pending } => pending,
            GateStatus::Unregistered | GateStatus::Ready => 0,
        }
    }

    /// Number of instances currently tracked whose `Rc` is still alive.
    pub fn tracked(&self) -> usize {
        self.with_store(Store::live_len)
    }

    /// Put `instance` back into queuing mode.
    ///
    /// Only a ready instance changes state. Queuing and unseen instances are
    /// left as they are, so calls already buffered are never discarded.
    pub fn wait(&self, instance: &Rc<I>) {
        let mut store = self.store.borrow_mut();
        if let Some(state) = store.state_mut(instance) {
            if matches!(state, State::Ready) {
                *state = State::Queuing(VecDeque::new());
                debug!(gate = self.label, "instance waiting; calls will queue");
            }
        }
    }

    /// Run `f` on the store, then drop whatever it released after the
    /// borrow has ended. Released calls own user values whose `Drop` may
    /// call back into the gate.
    fn with_store<R>(&self, f: impl FnOnce(&mut Store<I>) -> R) -> R {
        let (out, released) = {
            let mut store = self.store.borrow_mut();
            let out = f(&mut store);
            (out, store.take_released())
        };
        drop(released);
        out
    }
}

impl<I: 'static> Gate<I> {
    /// Mark `instance` ready and replay its buffered calls in issue order.
    ///
    /// The instance becomes ready before the first call is replayed. Before
    /// each replay the state is read again: if a replayed call (or anything
    /// it triggered synchronously) put the instance back into waiting, the
    /// drain stops and the calls not yet replayed are queued again ahead of
    /// anything queued since. A later `ready` resumes from there.
    ///
    /// Replay does not wait for a call's future to settle before moving to
    /// the next call.
    pub fn ready(&self, instance: &Rc<I>) {
        let queue = self.with_store(|store| match store.state_mut(instance) {
            None => {
                store.insert(instance, State::Ready);
                debug!(gate = self.label, "instance ready");
                None
            }
            Some(State::Ready) => None,
            Some(state) => match std::mem::replace(state, State::Ready) {
                State::Queuing(queue) => Some(queue),
                State::Ready => None,
            },
        });
        let Some(mut queue) = queue else {
            return;
        };
        debug!(gate = self.label, pending = queue.len(), "instance ready; draining");

        while let Some(call) = queue.pop_front() {
            if !self.is_ready(instance) {
                queue.push_front(call);
                debug!(
                    gate = self.label,
                    remaining = queue.len(),
                    "drain interrupted by wait; re-queuing"
                );
                self.requeue_front(instance, queue);
                return;
            }
            trace!(gate = self.label, remaining = queue.len(), "dispatching queued call");
            call.dispatch(instance);
        }
    }

    /// Wrap `method` so calls to it are gated on the receiver's readiness.
    ///
    /// `A` is the argument tuple, forwarded to `method` untouched. The
    /// application error type `E` absorbs [`GateError`] so both reach the
    /// caller through the same `Result`.
    ///
    /// The returned [`Gated`] holds the gate weakly: once every `Gate`
    /// handle is gone, its calls settle with [`GateError::Abandoned`].
    pub fn wrap<A, T, E, F>(&self, method: F) -> Gated<I, A, T, E>
    where
        A: 'static,
        T: 'static,
        E: From<GateError> + 'static,
        F: Fn(&Rc<I>, A) -> Invocation<T, E> + 'static,
    {
        Gated::new(self.downgrade(), Rc::new(method))
    }

    pub(crate) fn enqueue(&self, instance: &Rc<I>, call: PendingCall<I>) {
        match self.with_store(|store| store.enqueue(instance, call)) {
            Ok(pending) => trace!(gate = self.label, pending, "call queued"),
            // Only reachable if readiness changed between the caller's check
            // and here; the refused call is dropped outside the borrow.
            Err(refused) => drop(refused),
        }
    }

    fn requeue_front(&self, instance: &Rc<I>, mut undispatched: VecDeque<PendingCall<I>>) {
        self.with_store(|store| match store.state_mut(instance) {
            Some(State::Queuing(queued_since)) => {
                undispatched.append(queued_since);
                *queued_since = undispatched;
            }
            Some(State::Ready) | None => {
                store.insert(instance, State::Queuing(undispatched));
            }
        });
    }
}
