// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Calls captured while an instance is queuing.

use std::fmt;
use std::rc::Rc;

use tokio::sync::oneshot;
use tracing::{trace, warn};

use crate::error::GateError;
use crate::invocation::{CallFuture, Invocation};

/// Sending half of a queued call: receives the future that will settle it.
pub(crate) type Settle<T, E> = oneshot::Sender<CallFuture<T, E>>;

type Dispatch<I> = Box<dyn FnOnce(&Rc<I>)>;

/// One buffered call: the method, its captured arguments, and the channel
/// that settles the caller's future.
///
/// A pending call is consumed exactly once, by [`PendingCall::dispatch`].
/// Dropping it undispatched closes the channel, which the caller observes as
/// [`GateError::Abandoned`].
pub(crate) struct PendingCall<I> {
    dispatch: Dispatch<I>,
}

impl<I: 'static> PendingCall<I> {
    pub(crate) fn new<A, T, E, M>(method: Rc<M>, args: A, settle: Settle<T, E>) -> Self
    where
        A: 'static,
        T: 'static,
        E: From<GateError> + 'static,
        M: Fn(&Rc<I>, A) -> Invocation<T, E> + ?Sized + 'static,
    {
        let dispatch = Box::new(move |instance: &Rc<I>| {
            let outcome = settle_with(method(instance, args));
            if settle.send(outcome).is_err() {
                trace!("caller dropped its handle before dispatch; discarding result");
            }
        });
        Self { dispatch }
    }

    /// Run the captured method on `instance` and hand its outcome to the caller.
    pub(crate) fn dispatch(self, instance: &Rc<I>) {
        (self.dispatch)(instance);
    }
}

impl<I> fmt::Debug for PendingCall<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PendingCall(..)")
    }
}

/// Turn an invocation into the future the caller awaits, rejecting plain
/// values with [`GateError::NotAFuture`].
pub(crate) fn settle_with<T, E>(invocation: Invocation<T, E>) -> CallFuture<T, E>
where
    T: 'static,
    E: From<GateError> + 'static,
{
    match invocation.into_future() {
        Ok(fut) => fut,
        Err(err) => {
            warn!(%err, "gated method broke the future contract");
            Box::pin(std::future::ready(Err(E::from(err))))
        }
    }
}
