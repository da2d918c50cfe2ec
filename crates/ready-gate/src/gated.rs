// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Gated methods and the futures their calls return.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::trace;

use crate::error::GateError;
use crate::gate::{Gate, WeakGate};
use crate::invocation::{CallFuture, Invocation};
use crate::pending::{settle_with, PendingCall};

type Method<I, A, T, E> = Rc<dyn Fn(&Rc<I>, A) -> Invocation<T, E>>;

/// A method wrapped by [`Gate::wrap`].
///
/// Calling it on a ready instance runs the method right away; otherwise the
/// call is buffered until [`Gate::ready`]. Either way the caller gets a
/// [`GatedCall`] and nothing is raised synchronously.
///
/// A `Gated` does not keep its gate alive, so it can be captured inside
/// other wrapped methods. Calls made after the gate is dropped settle with
/// [`GateError::Abandoned`].
pub struct Gated<I, A, T, E> {
    gate: WeakGate<I>,
    method: Method<I, A, T, E>,
}

impl<I, A, T, E> Clone for Gated<I, A, T, E> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            method: Rc::clone(&self.method),
        }
    }
}

impl<I, A, T, E> fmt::Debug for Gated<I, A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gated").field("gate", &self.gate).finish_non_exhaustive()
    }
}

impl<I, A, T, E> Gated<I, A, T, E>
where
    I: 'static,
    A: 'static,
    T: 'static,
    E: From<GateError> + 'static,
{
    pub(crate) fn new(gate: WeakGate<I>, method: Method<I, A, T, E>) -> Self {
        Self { gate, method }
    }

    /// The gate this method was wrapped by, if it is still alive.
    pub fn gate(&self) -> Option<Gate<I>> {
        self.gate.upgrade()
    }

    /// Call the method on `instance` with `args`.
    pub fn call(&self, instance: &Rc<I>, args: A) -> GatedCall<T, E> {
        let Some(gate) = self.gate.upgrade() else {
            trace!(gate = self.gate.label(), "gate dropped; abandoning call");
            return GatedCall::dispatched(Box::pin(std::future::ready(Err(E::from(
                GateError::Abandoned,
            )))));
        };
        if gate.is_ready(instance) {
            trace!(gate = gate.label(), "instance ready; dispatching immediately");
            return GatedCall::dispatched(settle_with((self.method)(instance, args)));
        }
        let (settle, outcome) = oneshot::channel();
        gate.enqueue(instance, PendingCall::new(Rc::clone(&self.method), args, settle));
        GatedCall::queued(outcome)
    }
}

/// Future for one gated call. Resolves to whatever the wrapped method's
/// future resolves to, or to a [`GateError`] converted into `E`.
#[must_use = "the outcome of a gated call is only observable by awaiting it"]
pub struct GatedCall<T, E> {
    inner: Inner<T, E>,
}

enum Inner<T, E> {
    /// Waiting for a drain to run the method.
    Queued(oneshot::Receiver<CallFuture<T, E>>),
    /// The method ran; waiting on its future.
    Dispatched(CallFuture<T, E>),
}

impl<T, E> GatedCall<T, E> {
    fn dispatched(fut: CallFuture<T, E>) -> Self {
        Self {
            inner: Inner::Dispatched(fut),
        }
    }

    fn queued(outcome: oneshot::Receiver<CallFuture<T, E>>) -> Self {
        Self {
            inner: Inner::Queued(outcome),
        }
    }
}

impl<T, E> fmt::Debug for GatedCall<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner {
            Inner::Queued(_) => "queued",
            Inner::Dispatched(_) => "dispatched",
        };
        f.debug_struct("GatedCall").field("state", &state).finish()
    }
}

impl<T, E> Future for GatedCall<T, E>
where
    T: 'static,
    E: From<GateError> + 'static,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            match &mut this.inner {
                Inner::Queued(rx) => {
                    let fut: CallFuture<T, E> = match Pin::new(rx).poll(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(Ok(fut)) => fut,
                        Poll::Ready(Err(_closed)) => {
                            Box::pin(std::future::ready(Err(E::from(GateError::Abandoned))))
                        }
                    };
                    this.inner = Inner::Dispatched(fut);
                }
                Inner::Dispatched(fut) => return fut.as_mut().poll(cx),
            }
        }
    }
}
