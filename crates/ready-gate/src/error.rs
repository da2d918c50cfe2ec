// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Errors raised by the gate itself.
//!
//! Application errors produced by wrapped methods are never wrapped in this
//! type; they reach the caller unchanged. Callers' error types implement
//! `From<GateError>` so both kinds share one channel.

use thiserror::Error;

/// Failures owned by the gate rather than by the wrapped method.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateError {
    /// The wrapped method returned a plain value instead of a future.
    #[error("gated method must return a future, but returned a value of type `{type_name}`")]
    NotAFuture {
        /// Type name of the value the method produced.
        type_name: &'static str,
    },

    /// The queued call was dropped before it could be dispatched, either
    /// because the gate was dropped or because the instance was released.
    #[error("queued call was dropped before its instance became ready")]
    Abandoned,
}
