// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Readiness gate for objects that finish initialising asynchronously.
//!
//! Methods wrapped by a [`Gate`] can be called on an instance before it is
//! ready. While the instance is not ready the calls are buffered; once
//! [`Gate::ready`] is called they are replayed on the instance in the order
//! they were issued. [`Gate::wait`] puts a ready instance back into queuing
//! mode, including from inside a call that is being replayed.
//!
//! ```
//! use std::rc::Rc;
//! use ready_gate::{Gate, GateError, Invocation};
//!
//! struct Db;
//!
//! let gate: Gate<Db> = Gate::new();
//! let get = gate.wrap(|_db: &Rc<Db>, key: &'static str| -> Invocation<String, GateError> {
//!     async move { Ok(key.to_owned()) }.into()
//! });
//!
//! let db = Rc::new(Db);
//! let pending = get.call(&db, "foo");
//! assert_eq!(gate.pending_len(&db), 1);
//!
//! gate.ready(&db);
//! assert!(gate.is_ready(&db));
//! # drop(pending);
//! ```
//!
//! The gate is single-threaded: instances are shared as `Rc<I>` and every
//! state transition runs synchronously on the calling task.

#![forbid(unsafe_code)]

mod error;
mod gate;
mod gated;
mod invocation;
mod pending;
mod store;

pub use error::GateError;
pub use gate::{Gate, GateStatus, WeakGate};
pub use gated::{Gated, GatedCall};
pub use invocation::{CallFuture, Invocation};
