// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Demo harness for `ready-gate`.
//!
//! Opens an in-memory database that only becomes usable after a delay,
//! issues lookups against it straight away, and reports what each lookup
//! resolved to once the gate replays them.

pub mod config;
pub mod database;

use tracing::info;

use crate::config::DemoConfig;
use crate::database::{Client, LookupError};

/// Result of one lookup issued by [`run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Key that was looked up.
    pub key: String,
    /// What the lookup resolved to.
    pub result: Result<String, LookupError>,
}

/// Open a database from `config`, look up every key before it is ready, and
/// collect the outcomes in issue order.
///
/// Must run inside a [`tokio::task::LocalSet`].
pub async fn run(config: &DemoConfig, keys: &[String]) -> Vec<Outcome> {
    let client = Client::new();
    let db = client.open(config);

    let calls: Vec<_> = keys
        .iter()
        .map(|key| (key.clone(), client.get(&db, key.clone())))
        .collect();
    info!(
        queued = client.gate().pending_len(&db),
        ready = client.gate().is_ready(&db),
        "issued lookups"
    );

    let mut outcomes = Vec::with_capacity(calls.len());
    for (key, call) in calls {
        outcomes.push(Outcome {
            key,
            result: call.await,
        });
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::LocalSet;

    #[tokio::test(start_paused = true)]
    async fn run_reports_every_key_in_order() {
        let config = DemoConfig::default();
        let keys: Vec<String> = ["bar", "exploder", "foo", "nope"]
            .iter()
            .map(ToString::to_string)
            .collect();

        let outcomes = LocalSet::new().run_until(run(&config, &keys)).await;

        let got: Vec<_> = outcomes.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(got, ["bar", "exploder", "foo", "nope"]);
        assert_eq!(outcomes[0].result, Ok("bar".to_owned()));
        assert!(matches!(outcomes[1].result, Err(LookupError::Failed { .. })));
        assert_eq!(outcomes[2].result, Ok("foo".to_owned()));
        assert_eq!(
            outcomes[3].result,
            Err(LookupError::Missing("nope".to_owned()))
        );
    }
}
