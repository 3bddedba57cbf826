//! Connection-lifecycle state machine for the L2CAP-style signaling channel.
//!
//! [`Session::handle`] is the only way in: one frame in, one response frame
//! out, or a [`Violation`] describing which protocol invariant the frame broke.

use std::fmt;

use serde::{Deserialize, Serialize};

mod session;
#[cfg(feature = "vulnerable")]
pub mod vulnerable;

pub use session::{Session, SessionConfig, DEFAULT_CID, HARDENED_CONFIG_CAP};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Disconnected,
    Connecting,
    Configuring,
    Open,
    Closing,
}

impl State {
    pub const ALL: [State; 5] = [
        State::Disconnected,
        State::Connecting,
        State::Configuring,
        State::Open,
        State::Closing,
    ];

    pub fn name(self) -> &'static str {
        match self {
            State::Disconnected => "DISCONNECTED",
            State::Connecting => "CONNECTING",
            State::Configuring => "CONFIGURING",
            State::Open => "OPEN",
            State::Closing => "CLOSING",
        }
    }

    /// Next state along the canonical lifecycle. Closing wraps to Disconnected.
    pub fn advance(self) -> State {
        match self {
            State::Disconnected => State::Connecting,
            State::Connecting => State::Configuring,
            State::Configuring => State::Open,
            State::Open => State::Closing,
            State::Closing => State::Disconnected,
        }
    }

    /// Opcodes this state accepts, for error messages.
    pub fn expects(&self) -> &'static str {
        match self {
            State::Disconnected => "ConnectReq",
            State::Connecting => "ConnectRsp",
            State::Configuring => "ConfigReq/ConfigRsp",
            State::Open => "Data/Disconnect",
            State::Closing => "Disconnect",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// First payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    ConnectRequest = 0x01,
    ConnectResponse = 0x02,
    ConfigRequest = 0x03,
    ConfigResponse = 0x04,
    Data = 0x05,
    Disconnect = 0x06,
}

impl Opcode {
    pub const ALL: [Opcode; 6] = [
        Opcode::ConnectRequest,
        Opcode::ConnectResponse,
        Opcode::ConfigRequest,
        Opcode::ConfigResponse,
        Opcode::Data,
        Opcode::Disconnect,
    ];

    pub fn from_u8(b: u8) -> Option<Opcode> {
        match b {
            0x01 => Some(Opcode::ConnectRequest),
            0x02 => Some(Opcode::ConnectResponse),
            0x03 => Some(Opcode::ConfigRequest),
            0x04 => Some(Opcode::ConfigResponse),
            0x05 => Some(Opcode::Data),
            0x06 => Some(Opcode::Disconnect),
            _ => None,
        }
    }

    /// Two-letter tag used in reports.
    pub fn short_name(self) -> &'static str {
        match self {
            Opcode::ConnectRequest => "CR",
            Opcode::ConnectResponse => "CP",
            Opcode::ConfigRequest => "FR",
            Opcode::ConfigResponse => "FP",
            Opcode::Data => "DT",
            Opcode::Disconnect => "DC",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Opcode::ConnectRequest => "ConnectReq",
            Opcode::ConnectResponse => "ConnectRsp",
            Opcode::ConfigRequest => "ConfigReq",
            Opcode::ConfigResponse => "ConfigRsp",
            Opcode::Data => "Data",
            Opcode::Disconnect => "Disconnect",
        })
    }
}

/// A syntactically valid frame that breaks the session's contract for its
/// current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("unexpected CID {got:04x} in {state}, expected {expected:04x}")]
    ChannelMismatch { state: State, got: u16, expected: u16 },
    #[error("empty payload not allowed")]
    EmptyPayload,
    #[error("unknown opcode {opcode:#04x} in {state}")]
    UnknownOpcode { state: State, opcode: u8 },
    #[error("{opcode} not allowed in {state}, expected {}", .state.expects())]
    UnexpectedOpcode { state: State, opcode: Opcode },
    #[error("ConnectReq too short ({len} bytes)")]
    ConnectRequestTooShort { len: usize },
    #[error("ConnectRsp wrong length ({len} bytes, expected 3)")]
    ConnectResponseLength { len: usize },
    /// `status` holds the two status bytes, first byte high.
    #[error("ConnectRsp not OK (status {status:04x})")]
    ConnectResponseStatus { status: u16 },
    #[error("ConfigReq too short ({len} bytes)")]
    ConfigRequestTooShort { len: usize },
    #[error("ConfigReq option length mismatch (opt_len {opt_len}, frame {len} bytes)")]
    ConfigOptionLengthMismatch { opt_len: u8, len: usize },
    #[error("ConfigRsp wrong length ({len} bytes, expected 2)")]
    ConfigResponseLength { len: usize },
    #[error("config frame oversized ({len} bytes, max {max})")]
    ConfigOversized { len: usize, max: usize },
    #[error("Data too short ({len} bytes)")]
    DataTooShort { len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_byte_mapping() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_u8(op as u8), Some(op));
        }
        assert_eq!(Opcode::from_u8(0x00), None);
        assert_eq!(Opcode::from_u8(0x07), None);
    }

    #[test]
    fn advance_cycles_through_every_state() {
        let mut s = State::Disconnected;
        let mut seen = Vec::new();
        for _ in 0..State::ALL.len() {
            seen.push(s);
            s = s.advance();
        }
        assert_eq!(s, State::Disconnected);
        assert_eq!(seen, State::ALL.to_vec());
    }

    #[test]
    fn states_are_ordered_by_lifecycle() {
        let mut sorted = State::ALL;
        sorted.sort();
        assert_eq!(sorted, State::ALL);
    }

    #[test]
    fn violation_messages_are_readable() {
        let v = Violation::UnexpectedOpcode { state: State::Closing, opcode: Opcode::Data };
        assert_eq!(v.to_string(), "Data not allowed in CLOSING, expected Disconnect");
        let v = Violation::ConnectResponseStatus { status: 0x1337 };
        assert_eq!(v.to_string(), "ConnectRsp not OK (status 1337)");
        let v = Violation::ChannelMismatch { state: State::Open, got: 0x41, expected: 0x40 };
        assert_eq!(v.to_string(), "unexpected CID 0041 in OPEN, expected 0040");
    }
}
