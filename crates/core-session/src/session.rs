use std::collections::BTreeSet;

use core_framing::Frame;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{Opcode, State, Violation};

pub const DEFAULT_CID: u16 = 0x0040;
/// Largest Configuring-state frame a hardened session accepts.
pub const HARDENED_CONFIG_CAP: usize = 64;

const STATUS_OK: [u8; 2] = [0x00, 0x00];

// Canned responses.
const CONNECT_RSP_OK: [u8; 3] = [Opcode::ConnectResponse as u8, 0x00, 0x00];
const CONFIG_REQ_DEFAULT: [u8; 3] = [Opcode::ConfigRequest as u8, 0x01, 0x00];
const CONFIG_RSP_OK: [u8; 2] = [Opcode::ConfigResponse as u8, 0x00];
const DATA_ACK: [u8; 2] = [Opcode::Data as u8, 0x00];
const DISCONNECT_ACK: [u8; 2] = [Opcode::Disconnect as u8, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Channel id assigned to the session for its whole lifetime.
    pub cid: u16,
    /// Reject Configuring-state frames longer than this.
    pub max_config_frame: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { cid: DEFAULT_CID, max_config_frame: None }
    }
}

impl SessionConfig {
    pub fn hardened() -> Self {
        Self { max_config_frame: Some(HARDENED_CONFIG_CAP), ..Self::default() }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    cfg: SessionConfig,
    state: State,
    config_negotiated: bool,
    bytes_transferred: u64,
    // (from, to) for every accepted frame; append-only
    transitions: BTreeSet<(State, State)>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    pub fn new(cfg: SessionConfig) -> Self {
        Self {
            cfg,
            state: State::Disconnected,
            config_negotiated: false,
            bytes_transferred: 0,
            transitions: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn cid(&self) -> u16 {
        self.cfg.cid
    }

    pub fn config(&self) -> &SessionConfig {
        &self.cfg
    }

    pub fn config_negotiated(&self) -> bool {
        self.config_negotiated
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn transitions(&self) -> &BTreeSet<(State, State)> {
        &self.transitions
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.cfg);
    }

    /// Consume one frame. On success the session has moved to its next state
    /// and the returned frame is the reply on the session's channel.
    pub fn handle(&mut self, frame: &Frame) -> Result<Frame, Violation> {
        let before = self.state;
        if before != State::Disconnected && frame.cid != self.cfg.cid {
            return Err(Violation::ChannelMismatch {
                state: before,
                got: frame.cid,
                expected: self.cfg.cid,
            });
        }
        let p = frame.payload.as_slice();
        let first = *p.first().ok_or(Violation::EmptyPayload)?;
        let len = p.len();
        let op = Opcode::from_u8(first)
            .ok_or(Violation::UnknownOpcode { state: before, opcode: first })?;

        if before == State::Configuring {
            if let Some(max) = self.cfg.max_config_frame {
                if len > max {
                    return Err(Violation::ConfigOversized { len, max });
                }
            }
        }

        let unexpected = Violation::UnexpectedOpcode { state: before, opcode: op };
        let (after, reply): (State, &[u8]) = match (before, op) {
            (State::Disconnected, Opcode::ConnectRequest) => {
                if len < 2 {
                    return Err(Violation::ConnectRequestTooShort { len });
                }
                (State::Connecting, &CONNECT_RSP_OK[..])
            }
            (State::Disconnected, _) => return Err(unexpected),

            (State::Connecting, Opcode::ConnectResponse) => {
                if len != 3 {
                    return Err(Violation::ConnectResponseLength { len });
                }
                let status = [p[1], p[2]];
                if status != STATUS_OK {
                    return Err(Violation::ConnectResponseStatus {
                        status: u16::from_be_bytes(status),
                    });
                }
                (State::Configuring, &CONFIG_REQ_DEFAULT[..])
            }
            (State::Connecting, _) => return Err(unexpected),

            // [opcode | opt_type | opt_len | opt_value..]
            (State::Configuring, Opcode::ConfigRequest) => {
                if len < 3 {
                    return Err(Violation::ConfigRequestTooShort { len });
                }
                let opt_len = p[2];
                if 3 + opt_len as usize != len {
                    return Err(Violation::ConfigOptionLengthMismatch { opt_len, len });
                }
                self.config_negotiated = true;
                (State::Open, &CONFIG_RSP_OK[..])
            }
            (State::Configuring, Opcode::ConfigResponse) => {
                if len != 2 {
                    return Err(Violation::ConfigResponseLength { len });
                }
                self.config_negotiated = true;
                (State::Open, &CONFIG_RSP_OK[..])
            }
            (State::Configuring, _) => return Err(unexpected),

            (State::Open, Opcode::Data) => {
                if len < 2 {
                    return Err(Violation::DataTooShort { len });
                }
                self.bytes_transferred += (len - 1) as u64;
                (State::Open, &DATA_ACK[..])
            }
            (State::Open, Opcode::Disconnect) => (State::Closing, &DISCONNECT_ACK[..]),
            (State::Open, _) => return Err(unexpected),

            (State::Closing, Opcode::Disconnect) => (State::Disconnected, &DISCONNECT_ACK[..]),
            (State::Closing, _) => return Err(unexpected),
        };

        self.state = after;
        self.transitions.insert((before, after));
        trace!(from = %before, to = %after, opcode = %op, "transition");
        Ok(self.respond(reply))
    }

    fn respond(&self, payload: &[u8]) -> Frame {
        Frame::with_declared_length(payload.len() as u16, self.cfg.cid, payload.to_vec())
    }

    #[cfg(feature = "vulnerable")]
    pub(crate) fn jump_to(&mut self, state: State) {
        self.state = state;
    }
}
