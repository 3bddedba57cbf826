//! Known-good frames per session state.

use core_framing::Frame;
use core_session::{Opcode, State};
use rand::Rng;

const CR: u8 = Opcode::ConnectRequest as u8;
const CP: u8 = Opcode::ConnectResponse as u8;
const FR: u8 = Opcode::ConfigRequest as u8;
const FP: u8 = Opcode::ConfigResponse as u8;
const DT: u8 = Opcode::Data as u8;
const DC: u8 = Opcode::Disconnect as u8;

const OPT_VALUE: [u8; 2] = [0xAA, 0xBB];

/// A frame the clean session accepts in `state`. Configuring picks
/// ConfigReq or ConfigRsp evenly; Open picks Disconnect a quarter of the time.
pub fn template<R: Rng + ?Sized>(state: State, cid: u16, rng: &mut R) -> Frame {
    let payload = match state {
        State::Configuring if rng.gen_bool(0.5) => vec![FP, 0x00],
        State::Open if rng.gen_bool(0.25) => vec![DC, 0x00],
        State::Open => vec![DT, 0x42, 0x42],
        _ => advancing_payload(state),
    };
    Frame::with_declared_length(payload.len() as u16, cid, payload)
}

/// The deterministic payload that moves a clean session from `state` to
/// `state.advance()`.
pub fn advancing_payload(state: State) -> Vec<u8> {
    match state {
        State::Disconnected => vec![CR, 0x01, 0x00],
        State::Connecting => vec![CP, 0x00, 0x00],
        State::Configuring => {
            let mut p = vec![FR, 0x01, OPT_VALUE.len() as u8];
            p.extend_from_slice(&OPT_VALUE);
            p
        }
        State::Open | State::Closing => vec![DC, 0x00],
    }
}

/// Payloads that drive a fresh session from Disconnected to `target`.
pub fn staging_prelude(target: State) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut s = State::Disconnected;
    while s != target {
        out.push(advancing_payload(s));
        s = s.advance();
    }
    out
}
