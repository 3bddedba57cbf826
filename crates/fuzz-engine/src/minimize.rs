//! Greedy single-byte delta debugging.

use core_framing::Frame;
use core_mutate::staging_prelude;
use core_session::{Session, SessionConfig, State};
use serde::{Deserialize, Serialize};

use crate::{submit, FailureClass, TrialError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimizeConfig {
    /// A candidate only counts when it fails in the same class as the original.
    pub preserve_class: bool,
    /// Drive each fresh session to the trial's input state before injecting.
    pub stage_to_input_state: bool,
}

impl Default for MinimizeConfig {
    fn default() -> Self {
        Self { preserve_class: true, stage_to_input_state: true }
    }
}

/// Shrink `input` by removing one byte at a time (never index 0) while
/// `still_fails` holds, restarting the scan after every successful removal.
///
/// The result is 1-minimal: removing any further byte past the opcode makes
/// `still_fails` false. When nothing can be removed the input comes back as is.
pub fn minimize<F>(input: &[u8], mut still_fails: F) -> Vec<u8>
where
    F: FnMut(&[u8]) -> bool,
{
    let mut data = input.to_vec();
    let mut changed = true;
    while changed && data.len() > 1 {
        changed = false;
        for i in 1..data.len() {
            let mut candidate = data.clone();
            candidate.remove(i);
            if still_fails(&candidate) {
                data = candidate;
                changed = true;
                break;
            }
        }
    }
    data
}

/// Replays a candidate payload against a fresh session built from the run's
/// session config. The outer trial's session is never touched.
#[derive(Debug, Clone)]
pub struct Reproducer {
    session: SessionConfig,
    state: State,
    cid: u16,
    class: FailureClass,
    cfg: MinimizeConfig,
}

impl Reproducer {
    pub fn new(session: SessionConfig, state: State, cid: u16, class: FailureClass, cfg: MinimizeConfig) -> Self {
        Self { session, state, cid, class, cfg }
    }

    /// Run `candidate` with its declared length re-derived from its size.
    pub fn run(&self, candidate: &[u8]) -> Result<Frame, TrialError> {
        let mut s = Session::new(self.session);
        if self.cfg.stage_to_input_state {
            for p in staging_prelude(self.state) {
                submit(&mut s, &Frame::new(self.session.cid, p)?)?;
            }
        }
        let frame = Frame::new(self.cid, candidate.to_vec())?;
        submit(&mut s, &frame)
    }

    pub fn reproduces(&self, candidate: &[u8]) -> bool {
        match self.run(candidate) {
            Ok(_) => false,
            Err(e) => !self.cfg.preserve_class || e.class() == self.class,
        }
    }
}
