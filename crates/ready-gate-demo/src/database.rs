// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory database whose lookups are gated on asynchronous start-up.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ready_gate::{Gate, GateError, Gated, GatedCall, Invocation};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::DemoConfig;

/// Why a lookup failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    /// The gate rejected or dropped the call.
    #[error(transparent)]
    Gate(#[from] GateError),
    /// The record exists but its lookup fails.
    #[error("lookup of `{key}` failed: {message}")]
    Failed {
        /// Key that was looked up.
        key: String,
        /// Configured failure message.
        message: String,
    },
    /// No record under this key.
    #[error("no record for `{0}`")]
    Missing(String),
}

/// Records served by the database: a value or a failure message.
type Records = HashMap<String, Result<String, String>>;

/// The database. Empty until [`Client::open`] finishes loading it.
#[derive(Debug, Default)]
pub struct Database {
    records: RefCell<Records>,
}

impl Database {
    fn load(&self, config: &DemoConfig) {
        let mut records = self.records.borrow_mut();
        records.extend(
            config
                .records
                .iter()
                .map(|(k, v)| (k.clone(), Ok(v.clone()))),
        );
        records.extend(
            config
                .failing
                .iter()
                .map(|(k, msg)| (k.clone(), Err(msg.clone()))),
        );
    }

    fn lookup(&self, key: String) -> Invocation<String, LookupError> {
        let records = self.records.borrow();
        let outcome = match records.get(&key) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(LookupError::Failed {
                key: key.clone(),
                message: message.clone(),
            }),
            None => Err(LookupError::Missing(key.clone())),
        };
        drop(records);
        debug!(%key, found = outcome.is_ok(), "lookup");
        async move { outcome }.into()
    }
}

/// Opens databases and looks records up in them, whether or not they have
/// finished starting.
#[derive(Debug, Clone)]
pub struct Client {
    gate: Gate<Database>,
    get: Gated<Database, String, String, LookupError>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Create a client with its own gate.
    pub fn new() -> Self {
        let gate = Gate::named("database");
        let get = gate.wrap(|db: &Rc<Database>, key: String| db.lookup(key));
        Self { gate, get }
    }

    /// The gate tracking this client's databases.
    pub fn gate(&self) -> &Gate<Database> {
        &self.gate
    }

    /// Open a database that loads `config` after `config.init_delay()` and
    /// then becomes ready.
    ///
    /// Must be called inside a [`tokio::task::LocalSet`].
    pub fn open(&self, config: &DemoConfig) -> Rc<Database> {
        let db = Rc::new(Database::default());
        let gate = self.gate.clone();
        let init = Rc::clone(&db);
        let config = config.clone();
        tokio::task::spawn_local(async move {
            sleep(config.init_delay()).await;
            init.load(&config);
            info!(
                records = config.records.len() + config.failing.len(),
                "database initialised"
            );
            gate.ready(&init);
        });
        db
    }

    /// Look `key` up in `db`, queuing the lookup until `db` is ready.
    pub fn get(&self, db: &Rc<Database>, key: impl Into<String>) -> GatedCall<String, LookupError> {
        self.get.call(db, key.into())
    }
}
