use compliance::{legal_path, oversized_config_request, staged, wire};
use core_framing::{self as framing, Frame};
use core_session::{Session, SessionConfig, State, Violation, DEFAULT_CID};
use fuzz_engine::{minimize, submit, FailureClass, MinimizeConfig, Reproducer, TrialError};

// MINIMAL profile:
// - wire codec consistency and truncation
// - legal session path end to end through the codec
// - hardened Configuring scenario: classify, minimize, reproduce
// - seeded runs are reproducible

#[test]
fn codec_round_trip_and_truncation() {
    use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
    let mut rng = StdRng::seed_from_u64(321);
    for _ in 0..50 {
        let len = rng.gen_range(0..512);
        let mut payload = vec![0u8; len];
        rng.fill_bytes(&mut payload);
        let cid: u16 = rng.gen();
        let w = wire(cid, &payload);
        assert_eq!(w.len(), framing::HEADER_LEN + len);
        let f = Frame::decode(&w).expect("decode ok");
        assert_eq!((f.length as usize, f.cid, f.payload.as_slice()), (len, cid, payload.as_slice()));

        if len > 0 {
            let cut = &w[..w.len() - 1];
            assert!(matches!(
                Frame::decode(cut),
                Err(framing::Error::TruncatedPayload { .. })
            ));
        }
    }
    assert_eq!(Frame::decode(&[0x00, 0x00, 0x40]), Err(framing::Error::TooShort(3)));
    let lying = Frame::with_declared_length(9, DEFAULT_CID, vec![0x05, 0x00]);
    assert!(matches!(lying.encode(), Err(framing::Error::InvalidLength { declared: 9, actual: 2 })));
}

#[test]
fn legal_path_through_codec() {
    let mut s = Session::default();
    for (payload, next) in legal_path() {
        let frame = Frame::new(DEFAULT_CID, payload).unwrap();
        let resp = submit(&mut s, &frame).expect("legal step");
        assert_eq!(resp.cid, DEFAULT_CID);
        assert_eq!(resp.length as usize, resp.payload.len());
        assert_eq!(s.state(), next);
    }
    assert!(s.config_negotiated());
    assert_eq!(s.bytes_transferred(), 2);
    assert!(s.transitions().contains(&(State::Closing, State::Disconnected)));
}

#[test]
fn hardened_oversized_config_request() {
    let cfg = SessionConfig::hardened();
    let payload = oversized_config_request();
    assert_eq!(payload.len(), 73);

    let mut s = staged(cfg, State::Configuring);
    let err = submit(&mut s, &Frame::new(cfg.cid, payload.clone()).unwrap()).unwrap_err();
    assert_eq!(err.class(), FailureClass::Protocol);
    assert_eq!(err, TrialError::Protocol(Violation::ConfigOversized { len: 73, max: 64 }));
    assert_eq!(s.state(), State::Configuring);

    let repro = Reproducer::new(cfg, State::Configuring, cfg.cid, FailureClass::Protocol, MinimizeConfig::default());
    // the predicate keeps the failure class, not the specific violation:
    // [0x03] fails as ConfigRequestTooShort
    let min = minimize(&payload, |c| repro.reproduces(c));
    assert!(min.len() <= 3, "{min:02x?}");
    assert_eq!(min[0], 0x03);
    assert!(repro.reproduces(&min));
    assert_eq!(minimize(&min, |c| repro.reproduces(c)), min);
    assert!(matches!(repro.run(&min), Err(TrialError::Protocol(Violation::ConfigRequestTooShort { .. }))));
}

#[test]
fn clean_session_rejects_same_payload_on_option_length() {
    let mut s = staged(SessionConfig::default(), State::Configuring);
    let mut payload = oversized_config_request();
    payload.pop();
    let err = s.handle(&Frame::new(DEFAULT_CID, payload).unwrap()).unwrap_err();
    assert_eq!(err, Violation::ConfigOptionLengthMismatch { opt_len: 70, len: 72 });
}

#[test]
fn seeded_runs_are_reproducible() {
    let mut a = fuzz_engine::Fuzzer::with_seed(2024);
    let mut b = fuzz_engine::Fuzzer::with_seed(2024);
    let (mut sa, mut sb) = (a.run(500), b.run(500));
    sa.seconds = 0.0;
    sb.seconds = 0.0;
    assert_eq!(sa, sb);
    assert_eq!(a.anomalies(), b.anomalies());
    assert_eq!(sa.trials, 500);
    assert_eq!(sa.accepted + sa.rejected + sa.anomalies, 500);
}
