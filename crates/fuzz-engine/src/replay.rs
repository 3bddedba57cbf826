//! Replay recorded reproducers against the deliberately flawed session and
//! tally what they would have done to it.

use core_framing::Frame;
use core_mutate::staging_prelude;
use core_session::vulnerable::{Fault, VulnerableSession};
use core_session::{Opcode, SessionConfig, State};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::AnomalyRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayCase {
    pub reason: String,
    pub payload: Vec<u8>,
}

impl ReplayCase {
    /// Prefer the minimized payload; `None` when both payloads are empty.
    pub fn from_record(rec: &AnomalyRecord) -> Option<Self> {
        let payload = if !rec.minimized_payload.is_empty() {
            &rec.minimized_payload
        } else if !rec.original_payload.is_empty() {
            &rec.original_payload
        } else {
            return None;
        };
        Some(Self { reason: rec.reason.clone(), payload: payload.clone() })
    }
}

/// One reproducer per injected flaw.
pub fn demo_cases() -> Vec<ReplayCase> {
    let mut oversize = vec![Opcode::ConfigRequest as u8, 0x01, 70];
    oversize.extend(std::iter::repeat(0xAA).take(70));
    vec![
        ReplayCase { reason: "demo: oversize ConfigReq causes DoS".into(), payload: oversize },
        ReplayCase { reason: "demo: bare Data leaks bytes".into(), payload: vec![Opcode::Data as u8] },
        ReplayCase {
            reason: "demo: ConnectRsp 0x1337 triggers bypass".into(),
            payload: vec![Opcode::ConnectResponse as u8, 0x13, 0x37],
        },
    ]
}

/// State a fresh session is staged to before injecting a payload with this
/// opcode.
pub fn staging_state(opcode: Option<u8>) -> State {
    match opcode.and_then(Opcode::from_u8) {
        Some(Opcode::ConnectResponse) => State::Connecting,
        Some(Opcode::ConfigRequest | Opcode::ConfigResponse) => State::Configuring,
        Some(Opcode::Data | Opcode::Disconnect) => State::Open,
        _ => State::Disconnected,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayOutcome {
    Crash,
    Leak,
    Bypass,
    Accepted,
    Anomaly,
    Rejected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub cases: u64,
    pub dos: u64,
    pub leaks: u64,
    pub bypass: u64,
    pub accepted: u64,
    pub anomalies: u64,
    pub rejections: u64,
}

impl ImpactReport {
    pub fn add(&mut self, outcome: ReplayOutcome) {
        self.cases += 1;
        match outcome {
            ReplayOutcome::Crash => self.dos += 1,
            ReplayOutcome::Leak => self.leaks += 1,
            ReplayOutcome::Bypass => self.bypass += 1,
            ReplayOutcome::Accepted => self.accepted += 1,
            ReplayOutcome::Anomaly => self.anomalies += 1,
            ReplayOutcome::Rejected => self.rejections += 1,
        }
    }
}

/// Stage a fresh vulnerable session for the payload's opcode, inject it and
/// classify the result.
pub fn replay_case(case: &ReplayCase, cfg: SessionConfig) -> ReplayOutcome {
    let mut sim = VulnerableSession::new(cfg);
    let opcode = case.payload.first().copied();
    for p in staging_prelude(staging_state(opcode)) {
        let staged = match Frame::new(sim.cid(), p) {
            Ok(f) => sim.handle(&f).is_ok(),
            Err(_) => false,
        };
        if !staged {
            return ReplayOutcome::Rejected;
        }
    }

    let parsed = match Frame::new(sim.cid(), case.payload.clone())
        .and_then(|f| f.encode())
        .and_then(|w| Frame::decode(&w))
    {
        Ok(f) => f,
        Err(_) => return ReplayOutcome::Rejected,
    };
    let before = sim.state();
    match sim.handle(&parsed) {
        Err(Fault::Crash(_)) => ReplayOutcome::Crash,
        Err(Fault::Violation(_)) => ReplayOutcome::Anomaly,
        // a clean Data ack is exactly [DT, 0x00]
        Ok(resp) if resp.opcode() == Some(Opcode::Data as u8) && resp.payload.len() > 2 => {
            ReplayOutcome::Leak
        }
        Ok(_) if before == State::Connecting
            && sim.state() == State::Open
            && opcode == Some(Opcode::ConnectResponse as u8) =>
        {
            ReplayOutcome::Bypass
        }
        Ok(_) => ReplayOutcome::Accepted,
    }
}

pub fn replay(cases: &[ReplayCase], cfg: SessionConfig) -> ImpactReport {
    let mut report = ImpactReport::default();
    for (i, case) in cases.iter().enumerate() {
        let outcome = replay_case(case, cfg);
        debug!(case = i + 1, reason = %case.reason, len = case.payload.len(), ?outcome, "replayed");
        report.add(outcome);
    }
    info!(
        cases = report.cases,
        dos = report.dos,
        leaks = report.leaks,
        bypass = report.bypass,
        "replay finished"
    );
    report
}
