use std::sync::{Arc, Mutex};

use analysis::estimate_strength;
use model::{ImuAxes, RepRecord, SetSummary, SummarySource};
use session::{LifecycleState, Pending, Session, SessionConfig, SessionError};
use vbt_ingest_binary::{encode_data_frame, encode_rep_event, encode_set_event};
use vbt_ingest_core::{Command, ControlOpcode, ControlTransport, Inbound, IngestError, Payload};

#[derive(Clone, Default)]
struct Link {
    sent: Arc<Mutex<Vec<ControlOpcode>>>,
}

impl ControlTransport for Link {
    fn send_control(&mut self, opcode: ControlOpcode) -> Result<(), IngestError> {
        self.sent.lock().unwrap().push(opcode);
        Ok(())
    }
}

fn text(line: &str) -> Inbound {
    Inbound::Payload(Payload::data(line.as_bytes().to_vec()))
}

fn cmd(c: Command) -> Inbound {
    Inbound::Command(c)
}

fn run(session: &mut Session<Link>, items: Vec<Inbound>) -> usize {
    items
        .into_iter()
        .map(|i| session.on_inbound(i))
        .filter(|r| matches!(r, Err(SessionError::Decode(_))))
        .count()
}

#[test]
fn streaming_set_from_csv_bytes() {
    let link = Link::default();
    let sent = link.sent.clone();
    let mut s = Session::new(SessionConfig::streaming());
    s.connect(link);

    let dropped = run(
        &mut s,
        vec![
            cmd(Command::Calibrate),
            text("0,0.0,0.0,3,1"),
            text("50,0.0,0.0,3,0"),
            cmd(Command::StartSet),
            text("100,0.1,-0.05,3"),
            text("200,0.9,0.52,4"),
            text("300,0.2,0.61,4"),
            text("garbage"),
            text("400,-0.5,-0.30,4"),
            text("500,0.8,0.50,5"),
            text("600,0.1,0.45,5\r\n"),
            text("700,-0.4,-0.20,5"),
            text("800,0.6,0.40,6"),
            text("900,0.0,-0.10,6"),
            cmd(Command::StopSet),
        ],
    );
    assert_eq!(dropped, 1);
    assert_eq!(
        *sent.lock().unwrap(),
        vec![ControlOpcode::Calibrate, ControlOpcode::StartCapture, ControlOpcode::StopCapture]
    );

    assert_eq!(s.state(), LifecycleState::Idle);
    let sum = s.current_summary().expect("summary");
    assert_eq!(sum.total_reps, 3);
    assert_eq!(sum.set_duration_ms, 800);
    let means: Vec<f64> = sum.reps.iter().map(|r| r.mean_velocity_mps).collect();
    assert!((means[0] - 0.565).abs() < 1e-9);
    assert!((means[1] - 0.475).abs() < 1e-9);
    assert!((means[2] - 0.40).abs() < 1e-9);
    assert!((sum.peak_velocity_mps - 0.61).abs() < 1e-9);
    assert_eq!(sum.reps[0].duration_ms, 100);

    // 0.565 -> 0.40 is a 29.2% loss, one rep in reserve
    let est = estimate_strength(sum, 100.0);
    assert_eq!(est.rir_estimate, Some(1));
    assert_eq!(est.reps_for_estimate, 4);
    assert!(est.conservative_1rm.unwrap() > 100.0);
}

#[test]
fn relay_set_from_binary_frames() {
    let mut s = Session::new(SessionConfig::relay());
    s.connect(Link::default());

    let rep = |n: u32, v: f64| RepRecord {
        rep_number: n,
        duration_ms: 650,
        mean_velocity_mps: v,
        peak_velocity_mps: v + 0.25,
        mean_abs_accel_mps2: Some(2.0),
    };
    let device_summary = SetSummary {
        id: uuid::Uuid::new_v4(),
        source: SummarySource::Device,
        total_reps: 2,
        set_duration_ms: 3_000,
        mean_velocity_mps: 0.45,
        peak_velocity_mps: 0.75,
        avg_rep_duration_ms: Some(650.0),
        reps: Vec::new(),
    };

    let dropped = run(
        &mut s,
        vec![
            cmd(Command::StartSet),
            Inbound::Payload(Payload::data(encode_data_frame(10, &ImuAxes { az: 980, ..ImuAxes::default() }))),
            Inbound::Payload(Payload::data(vec![0u8; 8])),
            Inbound::Payload(Payload::metric(encode_rep_event(&rep(1, 0.50), 1))),
            Inbound::Payload(Payload::metric(vec![0xA7u8; 16])),
            Inbound::Payload(Payload::metric(encode_rep_event(&rep(2, 0.38), 2))),
            cmd(Command::StopSet),
        ],
    );
    assert_eq!(dropped, 2);
    assert_eq!(s.state(), LifecycleState::Idle);
    assert_eq!(s.pending(), Pending::Summary);
    assert_eq!(s.current_rep(), 2);
    assert_eq!(s.latest_reading().and_then(|r| r.axes).map(|a| a.az), Some(980));

    s.on_inbound(Inbound::Payload(Payload::metric(encode_set_event(&device_summary))))
        .unwrap();
    let sum = s.current_summary().expect("summary");
    assert_eq!(sum.source, SummarySource::Device);
    assert_eq!(sum.total_reps, 2);
    assert_eq!(sum.reps.len(), 2);

    // 0.50 -> 0.38 is a 24% loss
    let est = estimate_strength(sum, 80.0);
    assert_eq!(est.rir_estimate, Some(1));
    assert_eq!(est.reps_for_estimate, 3);
}

#[test]
fn reconnect_discards_active_set() {
    let mut s = Session::new(SessionConfig::streaming());
    s.connect(Link::default());
    run(&mut s, vec![cmd(Command::StartSet), text("0,0,0.4,1"), text("100,0,0.5,1")]);
    assert_eq!(s.buffered().len(), 2);

    let old = s.connect(Link::default());
    assert!(old.is_some());
    assert_eq!(s.state(), LifecycleState::Idle);
    assert!(s.buffered().is_empty());
    assert!(s.current_summary().is_none());
    assert!(s.latest_reading().is_none());
}
