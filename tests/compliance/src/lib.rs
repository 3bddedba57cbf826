//! Shared fixtures for the compliance profiles.

use bytes::Bytes;
use core_framing::Frame;
use core_mutate::staging_prelude;
use core_session::{Session, SessionConfig, State};

/// The legal exchange from Disconnected through Closing back to Disconnected.
pub fn legal_path() -> Vec<(Vec<u8>, State)> {
    vec![
        (vec![0x01, 0x01, 0x00], State::Connecting),
        (vec![0x02, 0x00, 0x00], State::Configuring),
        (vec![0x03, 0x01, 0x02, 0x00, 0xA0], State::Open),
        (vec![0x05, 0x48, 0x69], State::Open),
        (vec![0x06], State::Closing),
        (vec![0x06], State::Disconnected),
    ]
}

/// A fresh session driven to `target` with the staging prelude.
pub fn staged(cfg: SessionConfig, target: State) -> Session {
    let mut s = Session::new(cfg);
    for p in staging_prelude(target) {
        let frame = Frame::new(cfg.cid, p).expect("prelude frame");
        s.handle(&frame).expect("prelude accepted");
    }
    assert_eq!(s.state(), target);
    s
}

/// Consistent on-wire bytes for `payload` on `cid`.
pub fn wire(cid: u16, payload: &[u8]) -> Bytes {
    Frame::new(cid, payload.to_vec())
        .and_then(|f| f.encode())
        .expect("encodable payload")
}

/// The oversized 73-byte ConfigRequest used by the hardened scenario.
pub fn oversized_config_request() -> Vec<u8> {
    let mut p = vec![0x03, 0x01, 70];
    p.extend(std::iter::repeat(0xAA).take(70));
    p
}
