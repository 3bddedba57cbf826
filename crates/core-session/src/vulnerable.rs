//! A session with three deliberately injected flaws, used only to show what
//! replayed reproducers would do to a careless implementation:
//!
//! - DoS: a Configuring-state frame longer than 64 bytes "crashes" the device.
//! - Info leak: a bare Data opcode in Open answers with bytes of an internal secret.
//! - Auth bypass: a ConnectRsp with status `13 37` jumps straight to Open.
//!
//! Everything else falls through to the clean [`Session::handle`].

use core_framing::Frame;
use tracing::warn;

use crate::{Opcode, Session, SessionConfig, State, Violation};

const SECRET: &[u8] = b"SIMULATED_DEVICE_KEY\x00\xA5\x5A";
const LEAK_LEN: usize = 4;
const CRASH_CONFIG_LEN: usize = 64;
const BYPASS_STATUS: [u8; 2] = [0x13, 0x37];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    /// Simulated crash; the device would restart.
    #[error("simulated crash: {0}")]
    Crash(String),
    #[error(transparent)]
    Violation(#[from] Violation),
}

#[derive(Debug, Clone, Default)]
pub struct VulnerableSession {
    inner: Session,
}

impl VulnerableSession {
    pub fn new(cfg: SessionConfig) -> Self {
        Self { inner: Session::new(cfg) }
    }

    pub fn state(&self) -> State {
        self.inner.state()
    }

    pub fn cid(&self) -> u16 {
        self.inner.cid()
    }

    pub fn session(&self) -> &Session {
        &self.inner
    }

    pub fn handle(&mut self, frame: &Frame) -> Result<Frame, Fault> {
        let state = self.inner.state();
        let opcode = frame.opcode().and_then(Opcode::from_u8);

        if state == State::Configuring && frame.length as usize > CRASH_CONFIG_LEN {
            warn!(len = frame.length, "oversized config frame crashed device");
            return Err(Fault::Crash(format!("oversized config frame ({} bytes)", frame.length)));
        }

        if state == State::Open && opcode == Some(Opcode::Data) && frame.length == 1 {
            let mut payload = vec![Opcode::Data as u8];
            payload.extend_from_slice(&SECRET[..LEAK_LEN]);
            warn!(leaked = LEAK_LEN, "bare Data answered with internal buffer");
            return Ok(Frame::with_declared_length(payload.len() as u16, self.cid(), payload));
        }

        if state == State::Connecting
            && opcode == Some(Opcode::ConnectResponse)
            && frame.payload.len() == 3
            && frame.payload[1..3] == BYPASS_STATUS
        {
            warn!("magic ConnectRsp status skipped configuration");
            self.inner.jump_to(State::Open);
            return Ok(Frame::with_declared_length(1, self.cid(), vec![Opcode::Data as u8]));
        }

        Ok(self.inner.handle(frame)?)
    }
}
