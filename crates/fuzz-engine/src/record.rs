//! Per-trial failure records and run statistics.

use std::collections::BTreeSet;

use core_session::State;
use serde::{Deserialize, Serialize};

/// Which taxonomy a failure belongs to. The two never mix: codec errors come
/// from `core-framing`, protocol violations from `core-session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    Codec,
    Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub reason: String,
    pub class: FailureClass,
    pub state_at_input: State,
    #[serde(rename = "original_payload_hex", with = "hex_bytes")]
    pub original_payload: Vec<u8>,
    #[serde(rename = "minimized_payload_hex", with = "hex_bytes")]
    pub minimized_payload: Vec<u8>,
    #[serde(rename = "channel_id")]
    pub cid: u16,
    /// Declared length of the original frame, which may disagree with the payload.
    #[serde(rename = "length")]
    pub declared_length: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialStats {
    pub trials: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub anomalies: u64,
    pub visited_states: BTreeSet<State>,
    pub visited_transitions: BTreeSet<(State, State)>,
}

impl TrialStats {
    pub fn transition_labels(&self) -> Vec<String> {
        self.visited_transitions
            .iter()
            .map(|(a, b)| format!("{a}->{b}"))
            .collect()
    }
}

/// Aggregate record of one run, as handed to persistence and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub trials: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub anomalies: u64,
    pub visited_states: Vec<State>,
    pub visited_transitions: Vec<String>,
    pub seconds: f64,
}

impl Summary {
    pub fn from_stats(stats: &TrialStats, seconds: f64) -> Self {
        Self {
            trials: stats.trials,
            accepted: stats.accepted,
            rejected: stats.rejected,
            anomalies: stats.anomalies,
            visited_states: stats.visited_states.iter().copied().collect(),
            visited_transitions: stats.transition_labels(),
            seconds,
        }
    }
}

mod hex_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(D::Error::custom)
    }
}
