//! Rates and breakdowns derived from a finished run.

use std::collections::{BTreeMap, BTreeSet};

use core_session::Opcode;
use fuzz_engine::{AnomalyRecord, FailureClass, Summary};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpcodeCount {
    pub opcode: u8,
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub trials: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub anomalies: u64,
    pub accept_rate: f64,
    pub reject_rate: f64,
    pub anomaly_rate: f64,
    pub seconds: f64,
    pub throughput_trials_per_sec: Option<f64>,
    pub states_visited: Vec<String>,
    pub transitions_visited: Vec<String>,
    pub parser_errors: u64,
    pub protocol_anomalies: u64,
    pub unique_minimized_payloads: usize,
    pub mean_original_payload_len: f64,
    pub mean_minimized_payload_len: f64,
    pub avg_length_reduction_fraction: f64,
    pub top_reasons: Vec<(String, u64)>,
    pub opcodes_in_anomalies: Vec<OpcodeCount>,
}

pub fn opcode_name(op: u8) -> String {
    match Opcode::from_u8(op) {
        Some(o) => o.short_name().to_string(),
        None => format!("0x{op:02x}"),
    }
}

/// "Anomaly: Data too short (1 bytes)" -> "Data too short".
pub fn reason_key(reason: &str) -> &str {
    let body = reason.split_once(": ").map_or(reason, |(_, rest)| rest);
    body.split_once(" (").map_or(body, |(head, _)| head).trim()
}

fn ratio(n: u64, d: u64) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

fn mean(xs: &[usize]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<usize>() as f64 / xs.len() as f64
    }
}

pub fn compute(summary: &Summary, records: &[AnomalyRecord]) -> Metrics {
    let mut reasons: BTreeMap<String, u64> = BTreeMap::new();
    let mut opcodes: BTreeMap<u8, u64> = BTreeMap::new();
    let mut parser_errors = 0;
    let mut protocol_anomalies = 0;
    let mut orig_lens = Vec::new();
    let mut min_lens = Vec::new();

    for rec in records {
        match rec.class {
            FailureClass::Codec => parser_errors += 1,
            FailureClass::Protocol => protocol_anomalies += 1,
        }
        *reasons.entry(reason_key(&rec.reason).to_string()).or_default() += 1;
        let payload = if rec.minimized_payload.is_empty() {
            &rec.original_payload
        } else {
            &rec.minimized_payload
        };
        if let Some(&op) = payload.first() {
            *opcodes.entry(op).or_default() += 1;
        }
        if !rec.original_payload.is_empty() {
            orig_lens.push(rec.original_payload.len());
        }
        if !rec.minimized_payload.is_empty() {
            min_lens.push(rec.minimized_payload.len());
        }
    }

    let unique: BTreeSet<&[u8]> = records
        .iter()
        .filter(|r| !r.minimized_payload.is_empty())
        .map(|r| r.minimized_payload.as_slice())
        .collect();

    let mut top_reasons: Vec<(String, u64)> = reasons.into_iter().collect();
    top_reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_reasons.truncate(10);

    let mut opcodes_in_anomalies: Vec<OpcodeCount> = opcodes
        .into_iter()
        .map(|(opcode, count)| OpcodeCount { opcode, name: opcode_name(opcode), count })
        .collect();
    opcodes_in_anomalies.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.opcode.cmp(&b.opcode)));

    let mean_orig = mean(&orig_lens);
    let mean_min = mean(&min_lens);

    Metrics {
        trials: summary.trials,
        accepted: summary.accepted,
        rejected: summary.rejected,
        anomalies: summary.anomalies,
        accept_rate: ratio(summary.accepted, summary.trials),
        reject_rate: ratio(summary.rejected, summary.trials),
        anomaly_rate: ratio(summary.anomalies, summary.trials),
        seconds: summary.seconds,
        throughput_trials_per_sec: (summary.seconds > 0.0).then(|| summary.trials as f64 / summary.seconds),
        states_visited: summary.visited_states.iter().map(|s| s.to_string()).collect(),
        transitions_visited: summary.visited_transitions.clone(),
        parser_errors,
        protocol_anomalies,
        unique_minimized_payloads: unique.len(),
        mean_original_payload_len: mean_orig,
        mean_minimized_payload_len: mean_min,
        avg_length_reduction_fraction: if mean_orig > 0.0 { 1.0 - mean_min / mean_orig } else { 0.0 },
        top_reasons,
        opcodes_in_anomalies,
    }
}

pub fn to_markdown(m: &Metrics) -> String {
    let mut md = vec![
        "# Fuzzing Metrics\n".to_string(),
        format!("- Trials: **{}**", m.trials),
        format!("- Accepted: **{}** ({:.2}%)", m.accepted, m.accept_rate * 100.0),
        format!("- Rejected: **{}** ({:.2}%)", m.rejected, m.reject_rate * 100.0),
        format!("- Anomalies: **{}** ({:.2}%)", m.anomalies, m.anomaly_rate * 100.0),
    ];
    if let Some(t) = m.throughput_trials_per_sec {
        md.push(format!("- Throughput: **{t:.1} trials/sec**"));
    }
    md.push(String::new());
    md.push(format!("- Parser errors: **{}**", m.parser_errors));
    md.push(format!("- Protocol anomalies: **{}**", m.protocol_anomalies));
    md.push(format!("- Unique minimized payloads: **{}**", m.unique_minimized_payloads));
    md.push(format!("- Avg original payload length: **{:.2}**", m.mean_original_payload_len));
    md.push(format!(
        "- Avg minimized payload length: **{:.2}** (reduction {:.1}%)",
        m.mean_minimized_payload_len,
        m.avg_length_reduction_fraction * 100.0
    ));
    md.push(String::new());
    md.push("## States & Transitions".to_string());
    md.push(format!("- States visited: `{}`", m.states_visited.join(", ")));
    md.push(format!("- Transitions visited: `{}`", m.transitions_visited.join(", ")));
    md.push(String::new());
    md.push("## Top anomaly reasons".to_string());
    for (reason, n) in &m.top_reasons {
        md.push(format!("- {reason}: {n}"));
    }
    md.push(String::new());
    md.push("## Opcodes in anomalies (by count)".to_string());
    for o in &m.opcodes_in_anomalies {
        md.push(format!("- {} (0x{:02x}): {}", o.name, o.opcode, o.count));
    }
    md.join("\n")
}
