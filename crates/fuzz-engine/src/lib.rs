//! Stateful fuzzing engine for the L2CAP-style signaling session.
//!
//! A [`Fuzzer`] repeatedly asks the session for its state, builds a template
//! for it, mutates it, pushes it through the wire codec and into the session,
//! and classifies what happened. Failing payloads are shrunk with
//! [`minimize`] against fresh sessions and kept as [`AnomalyRecord`]s.

mod config;
mod driver;
mod minimize;
mod record;
#[cfg(feature = "vulnerable")]
pub mod replay;

pub use config::{parse_cid, ConfigError, FuzzConfig, ENV_CID, ENV_HARDENED, ENV_SEED, ENV_TRIALS};
pub use driver::{submit, Fuzzer, Outcome, TrialError};
pub use minimize::{minimize, MinimizeConfig, Reproducer};
pub use record::{AnomalyRecord, FailureClass, Summary, TrialStats};
