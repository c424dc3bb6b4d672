use faceroll::cli::replay::parse_frames;
use faceroll::cli::ReplayAnalyzer;
use faceroll::common::{AttendanceConfig, StoreConfig, TrackerConfig};
use faceroll::{
    AttendanceLedger, AttendanceSession, Database, FaceRollError, Identity, IdentityResolver,
    IdentityStore, TrackState, Tracker, EMBEDDING_DIM,
};
use serde_json::json;

fn axis(i: usize) -> Vec<f32> {
    let mut v = vec![0.0; EMBEDDING_DIM];
    v[i] = 1.0;
    v
}

fn frame_line(name: &str, faces: &[([f32; 4], Vec<f32>)]) -> String {
    let detections: Vec<_> = faces
        .iter()
        .map(|(bbox, embedding)| json!({"bbox": bbox, "detection_score": 0.9, "embedding": embedding}))
        .collect();
    json!({"frame": name, "detections": detections}).to_string()
}

#[test]
fn replayed_session_logs_each_student_once() {
    let db = Database::open_in_memory().unwrap();
    let store = IdentityStore::new(db.clone(), &StoreConfig::default());
    store
        .enroll(&Identity {
            identity_id: "S001".into(),
            display_name: "Ada".into(),
            reference_image_path: "/faces/ada.jpg".into(),
            embedding: axis(0),
        })
        .unwrap();
    let ledger = AttendanceLedger::new(db);

    let ada = [100.0, 100.0, 200.0, 200.0];
    let stranger = [400.0, 100.0, 500.0, 200.0];
    let mut lines = Vec::new();
    for n in 1..=4 {
        lines.push(frame_line(&format!("f{}.jpg", n), &[(ada, axis(0)), (stranger, axis(9))]));
    }
    lines.push(json!({"frame": "f5.jpg", "error": "camera timeout"}).to_string());
    lines.push(frame_line("f6.jpg", &[(ada, axis(0))]));
    let frames = parse_frames(&lines.join("\n")).unwrap();

    let mut resolver = IdentityResolver::new(Tracker::new(TrackerConfig::default()), store);
    let mut session = AttendanceSession::new(AttendanceConfig::default());
    let mut analyzer = ReplayAnalyzer;

    let mut arrivals = Vec::new();
    let mut history = Vec::new();
    for frame in &frames {
        match resolver.process_frame(&mut analyzer, frame) {
            Ok(results) => {
                history.push(results.clone());
                for event in session.arrivals(&results, &frame.frame) {
                    ledger.record(&event).unwrap();
                    arrivals.push(event);
                }
            }
            Err(FaceRollError::DetectionUnavailable(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(history.len(), 5);
    // Ada keeps track 1 across all frames, including after the failed one.
    assert!(history.iter().all(|frame| frame[0].track_id == Some(1)));
    assert_eq!(history[1][0].track_state, TrackState::Tentative);
    assert_eq!(history[2][0].track_state, TrackState::Confirmed);
    assert_eq!(history[0][1].track_id, Some(2));

    let best = history[0][0].best_identity.as_ref().unwrap();
    assert_eq!(best.identity_id, "S001");
    assert!((history[0][0].similarity.unwrap() - 1.0).abs() < 1e-5);
    // The stranger is orthogonal to every enrolled face.
    assert!(history[0][1].similarity.unwrap().abs() < 1e-5);

    assert_eq!(arrivals.len(), 1);
    assert_eq!(arrivals[0].identity_id, "S001");
    assert_eq!(arrivals[0].evidence_frame_path, "f3.jpg");
    assert_eq!(ledger.count().unwrap(), 1);
    assert_eq!(resolver.tracker().frame_count(), 6);
}
