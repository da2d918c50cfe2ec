// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! What a wrapped method hands back when it runs.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::GateError;

/// Boxed, single-threaded future produced by a wrapped method.
pub type CallFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>>>>;

/// Result of invoking a wrapped method.
///
/// The gate inspects this value each time the method runs, not the method's
/// signature: the same method may return a future on one call and a plain
/// value on another, and only the latter is rejected.
pub enum Invocation<T, E> {
    /// An asynchronous result the gate forwards to the caller.
    Future(CallFuture<T, E>),
    /// A plain value with no asynchronous continuation.
    Value {
        /// Type name of the value, reported in [`GateError::NotAFuture`].
        type_name: &'static str,
    },
}

impl<T, E> Invocation<T, E> {
    /// Wrap a future.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + 'static,
    {
        Self::Future(Box::pin(future))
    }

    /// Record that the method produced `value` rather than a future.
    ///
    /// The value is dropped; only its type name is kept for the error.
    pub fn value<V>(value: V) -> Self {
        drop(value);
        Self::Value {
            type_name: std::any::type_name::<V>(),
        }
    }

    pub(crate) fn into_future(self) -> Result<CallFuture<T, E>, GateError> {
        match self {
            Self::Future(fut) => Ok(fut),
            Self::Value { type_name } => Err(GateError::NotAFuture { type_name }),
        }
    }
}

impl<T, E, F> From<F> for Invocation<T, E>
where
    F: Future<Output = Result<T, E>> + 'static,
{
    fn from(future: F) -> Self {
        Self::future(future)
    }
}

impl<T, E> fmt::Debug for Invocation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Future(_) => f.write_str("Invocation::Future(..)"),
            Self::Value { type_name } => f
                .debug_struct("Invocation::Value")
                .field("type_name", type_name)
                .finish(),
        }
    }
}
