#![no_main]
use libfuzzer_sys::fuzz_target;
use arbitrary::Arbitrary;
use core_framing::Frame;
use core_session::vulnerable::VulnerableSession;
use core_session::{Session, SessionConfig, State};

#[derive(Debug, Arbitrary)]
struct Input {
    hardened: bool,
    frames: Vec<(u16, u16, Vec<u8>)>,
}

fuzz_target!(|inp: Input| {
    let cfg = if inp.hardened { SessionConfig::hardened() } else { SessionConfig::default() };
    let mut clean = Session::new(cfg);
    let mut flawed = VulnerableSession::new(cfg);
    for (length, cid, payload) in inp.frames {
        let frame = Frame::with_declared_length(length, cid, payload);
        let before = clean.state();
        match clean.handle(&frame) {
            Ok(resp) => assert_eq!(resp.length as usize, resp.payload.len()),
            // failures never move the session
            Err(_) => assert_eq!(clean.state(), before),
        }
        assert!(State::ALL.contains(&clean.state()));
        let _ = flawed.handle(&frame);
    }
});
