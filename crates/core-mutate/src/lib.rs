//! Opcode-aware mutation of known-good frames.
//!
//! A template from [`template`] is perturbed in two independent steps: the
//! payload (by opcode, often left alone so the session keeps making progress)
//! and the declared length (rarely off by one). All randomness comes from the
//! caller's RNG so a run is reproducible from its seed.

use core_framing::{Frame, MAX_PAYLOAD};
use core_session::{Opcode, State};
use rand::Rng;
use serde::{Deserialize, Serialize};

mod template;

pub use template::{advancing_payload, staging_prelude, template};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationPolicy {
    /// Core step returns the payload untouched.
    pub passthrough: f64,
    /// Extra untouched chance in Disconnected, Connecting and Configuring.
    pub early_passthrough: f64,
    /// ConnectRsp keeps its status bytes.
    pub keep_status: f64,
    /// ConfigReq gets an option length that disagrees with its value.
    pub desync_option_len: f64,
    /// Data is cut down to its opcode.
    pub truncate_data: f64,
    /// Declared length equals the payload length.
    pub keep_length: f64,
}

impl Default for MutationPolicy {
    fn default() -> Self {
        Self {
            passthrough: 0.15,
            early_passthrough: 0.25,
            keep_status: 0.70,
            desync_option_len: 0.30,
            truncate_data: 0.20,
            keep_length: 0.98,
        }
    }
}

impl MutationPolicy {
    pub fn probabilities(&self) -> [(&'static str, f64); 6] {
        [
            ("passthrough", self.passthrough),
            ("early_passthrough", self.early_passthrough),
            ("keep_status", self.keep_status),
            ("desync_option_len", self.desync_option_len),
            ("truncate_data", self.truncate_data),
            ("keep_length", self.keep_length),
        ]
    }
}

/// States where an extra pass-through keeps the session moving forward.
pub fn is_early(state: State) -> bool {
    matches!(state, State::Disconnected | State::Connecting | State::Configuring)
}

#[derive(Debug, Clone, Default)]
pub struct Mutator {
    policy: MutationPolicy,
}

impl Mutator {
    /// `policy` probabilities must lie in `[0, 1]`.
    pub fn new(policy: MutationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MutationPolicy {
        &self.policy
    }

    /// Mutate `tmpl` for a session in `state`: early-state pass-through, then
    /// the core payload step, then the length step.
    pub fn mutate_frame<R: Rng + ?Sized>(&self, state: State, tmpl: &Frame, rng: &mut R) -> Frame {
        let payload = if is_early(state) && rng.gen_bool(self.policy.early_passthrough) {
            tmpl.payload.clone()
        } else {
            self.mutate_payload(&tmpl.payload, rng)
        };
        let length = self.mutate_length(payload.len(), rng);
        Frame::with_declared_length(length, tmpl.cid, payload)
    }

    pub fn mutate_payload<R: Rng + ?Sized>(&self, payload: &[u8], rng: &mut R) -> Vec<u8> {
        if payload.len() <= 1 || rng.gen_bool(self.policy.passthrough) {
            return payload.to_vec();
        }
        let opcode = payload[0];
        let mut core = payload[1..].to_vec();

        match Opcode::from_u8(opcode) {
            // [CP | status(2)]
            Some(Opcode::ConnectResponse) => {
                if !rng.gen_bool(self.policy.keep_status) {
                    let i = rng.gen_range(0..core.len().min(2));
                    flip_bit(&mut core[i], rng);
                }
                return join(opcode, &core);
            }
            // [FR | opt_type | opt_len | opt_value..]
            Some(Opcode::ConfigRequest) if core.len() >= 2 => {
                let opt_type = core[0];
                let end = (2 + core[1] as usize).min(core.len());
                let mut value = core[2..end].to_vec();
                if !value.is_empty() {
                    let j = rng.gen_range(0..value.len());
                    flip_bit(&mut value[j], rng);
                }
                let true_len = value.len() as u8;
                let opt_len = if rng.gen_bool(self.policy.desync_option_len) {
                    true_len ^ 1
                } else {
                    true_len
                };
                let mut out = vec![opcode, opt_type, opt_len];
                out.extend_from_slice(&value);
                return out;
            }
            Some(Opcode::Data) if rng.gen_bool(self.policy.truncate_data) => {
                return vec![opcode];
            }
            _ => {}
        }

        let k = rng.gen_range(0..core.len());
        flip_bit(&mut core[k], rng);
        join(opcode, &core)
    }

    /// Declared length for a payload of `payload_len` bytes.
    pub fn mutate_length<R: Rng + ?Sized>(&self, payload_len: usize, rng: &mut R) -> u16 {
        let len = payload_len.min(MAX_PAYLOAD) as i64;
        if rng.gen_bool(self.policy.keep_length) {
            return len as u16;
        }
        let delta = if rng.gen_bool(0.5) { -1 } else { 1 };
        (len + delta).clamp(0, MAX_PAYLOAD as i64) as u16
    }
}

fn flip_bit<R: Rng + ?Sized>(b: &mut u8, rng: &mut R) {
    *b ^= 1 << rng.gen_range(0..8u32);
}

fn join(opcode: u8, core: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + core.len());
    out.push(opcode);
    out.extend_from_slice(core);
    out
}
