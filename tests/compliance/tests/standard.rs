use core_framing::Frame;
use core_session::vulnerable::{Fault, VulnerableSession};
use core_session::{SessionConfig, State, DEFAULT_CID};
use fuzz_engine::replay::{demo_cases, replay, ReplayCase};
use fuzz_engine::{AnomalyRecord, FailureClass, FuzzConfig, Fuzzer, MinimizeConfig, Reproducer};

// STANDARD profile extensions beyond MINIMAL
// - every recorded reproducer still fails in its recorded class
// - full default campaign coverage
// - replay of recorded and demo reproducers against the flawed session
// - anomaly records survive the JSONL line format

#[test]
fn recorded_reproducers_still_fail() {
    let mut fz = Fuzzer::with_seed(77);
    fz.run(1500);
    assert!(!fz.anomalies().is_empty());
    for rec in fz.anomalies() {
        assert_eq!(rec.minimized_payload.first(), rec.original_payload.first());
        assert!(rec.minimized_payload.len() <= rec.original_payload.len());
        let repro = Reproducer::new(
            SessionConfig::default(),
            rec.state_at_input,
            rec.cid,
            rec.class,
            MinimizeConfig::default(),
        );
        if rec.class == FailureClass::Protocol {
            assert!(repro.reproduces(&rec.minimized_payload), "{rec:?}");
        }
    }
}

#[test]
fn default_campaign_covers_every_state() {
    let mut fz = Fuzzer::new(FuzzConfig::default());
    let s = fz.run(2000);
    assert_eq!(s.visited_states, State::ALL.to_vec());
    assert!(s.anomalies > 0 && s.accepted > 0);
}

#[test]
fn flawed_session_faults_only_where_injected() {
    let mut v = VulnerableSession::new(SessionConfig::default());
    let cr = Frame::new(DEFAULT_CID, vec![0x01, 0x01, 0x00]).unwrap();
    assert!(v.handle(&cr).is_ok());
    let bypass = Frame::new(DEFAULT_CID, vec![0x02, 0x13, 0x37]).unwrap();
    assert_eq!(v.handle(&bypass).unwrap().payload, vec![0x05]);
    assert_eq!(v.state(), State::Open);

    let mut v = VulnerableSession::new(SessionConfig::default());
    let hello = Frame::new(DEFAULT_CID, vec![0x03]).unwrap();
    assert!(matches!(v.handle(&hello), Err(Fault::Violation(_))));
}

#[test]
fn replay_demo_and_recorded_cases() {
    let report = replay(&demo_cases(), SessionConfig::default());
    assert_eq!((report.dos, report.leaks, report.bypass), (1, 1, 1));

    let mut fz = Fuzzer::with_seed(3);
    fz.run(400);
    let cases: Vec<ReplayCase> = fz.anomalies().iter().filter_map(ReplayCase::from_record).collect();
    let report = replay(&cases, SessionConfig::default());
    assert_eq!(report.cases as usize, cases.len());
    assert_eq!(
        report.cases,
        report.dos + report.leaks + report.bypass + report.accepted + report.anomalies + report.rejections
    );
}

#[test]
fn anomaly_records_as_jsonl_lines() {
    let mut fz = Fuzzer::with_seed(12);
    fz.run(300);
    let lines: Vec<String> = fz
        .anomalies()
        .iter()
        .map(|r| serde_json::to_string(r).unwrap())
        .collect();
    assert!(!lines.is_empty());
    for (line, rec) in lines.iter().zip(fz.anomalies()) {
        assert!(!line.contains('\n'));
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(v["original_payload_hex"], serde_json::json!(hex::encode(&rec.original_payload)));
        assert_eq!(v["channel_id"], serde_json::json!(rec.cid));
        assert_eq!(v["length"], serde_json::json!(rec.declared_length));
        let back: AnomalyRecord = serde_json::from_str(line).unwrap();
        assert_eq!(&back, rec);
    }
}
