mod common;

use common::{config_exporting_to, running_trace, scratch_dir, wait_idle};
use stride_hub::{encode_frame, SessionController, SessionError, SessionEvent, SessionState};

fn state_changes(events: &crossbeam_channel::Receiver<SessionEvent>) -> Vec<SessionState> {
    events
        .try_iter()
        .filter_map(|e| match e {
            SessionEvent::StateChanged(state) => Some(state),
            _ => None,
        })
        .collect()
}

#[test]
fn readings_are_rejected_until_connected() {
    let dir = scratch_dir("controller-disconnected");
    let controller = SessionController::new(config_exporting_to(&dir)).unwrap();

    assert_eq!(controller.state(), SessionState::Disconnected);
    let trace = running_trace(10);
    assert!(!controller.add_reading(trace[0]));
    assert!(matches!(controller.record(), Err(SessionError::NotConnected)));
    assert!(matches!(controller.stop_recording(), Err(SessionError::NotConnected)));
    assert_eq!(controller.pending_reading_count(), 0);
}

#[test]
fn full_recording_lifecycle() {
    let dir = scratch_dir("controller-lifecycle");
    let controller = SessionController::new(config_exporting_to(&dir)).unwrap();
    let events = controller.subscribe();

    controller.connect();
    controller.record().unwrap();
    assert!(controller.start_time().is_some());

    let trace = running_trace(3000);
    for raw in &trace[..2000] {
        assert!(controller.add_frame(&encode_frame(raw)));
    }
    wait_idle(&controller);

    controller.pause_recording().unwrap();
    assert_eq!(controller.state(), SessionState::Connected);
    let (recorded, elements) = controller.with_session(|s| (s.readings().len(), s.elements().len()));
    assert_eq!(recorded, 2000);
    assert!(elements >= 1);

    // 暂停期间窗口继续更新，但不再累积
    for raw in &trace[2000..2500] {
        assert!(controller.add_reading(*raw));
    }
    wait_idle(&controller);
    assert_eq!(controller.with_session(|s| s.readings().len()), 2000);
    assert_eq!(controller.with_session(|s| s.elements().len()), elements);
    assert!(controller.current_cadence() > 0.0);

    controller.record().unwrap();
    for raw in &trace[2500..] {
        controller.add_reading(*raw);
    }
    wait_idle(&controller);

    let saved = controller.stop_recording().unwrap();
    assert_eq!(saved.readings, 2500);
    assert!(saved.elements >= elements);
    assert!(saved.csv_path.exists());
    assert!(saved.gpx_path.exists());

    assert_eq!(controller.state(), SessionState::Connected);
    assert!(controller.start_time().is_none());
    assert_eq!(controller.with_session(|s| s.readings().len()), 0);
    assert_eq!(controller.with_session(|s| s.window_len()), 0);

    assert_eq!(
        state_changes(&events),
        vec![
            SessionState::Connected,
            SessionState::Recording,
            SessionState::Connected,
            SessionState::Recording,
            SessionState::Exporting,
            SessionState::Connected,
        ]
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn malformed_frames_are_ignored() {
    let dir = scratch_dir("controller-frames");
    let controller = SessionController::new(config_exporting_to(&dir)).unwrap();
    controller.connect();

    assert!(!controller.add_frame(&[]));
    assert!(!controller.add_frame(&[0u8; 27]));
    assert_eq!(controller.pending_reading_count(), 0);

    let raw = running_trace(1)[0];
    let mut long_frame = encode_frame(&raw).to_vec();
    long_frame.extend_from_slice(&[0xff; 4]);
    assert!(controller.add_frame(&long_frame));
    assert_eq!(controller.pending_reading_count(), 1);

    let mut nan_reading = running_trace(2)[1];
    nan_reading.acceleration.x = f64::NAN;
    assert!(!controller.add_frame(&encode_frame(&nan_reading)));
    nan_reading.acceleration.x = 0.5;
    nan_reading.angular_velocity.y = f64::INFINITY;
    assert!(!controller.add_frame(&encode_frame(&nan_reading)));
    assert_eq!(controller.pending_reading_count(), 1);
}

#[test]
fn reset_clears_data_but_keeps_state() {
    let dir = scratch_dir("controller-reset");
    let controller = SessionController::new(config_exporting_to(&dir)).unwrap();
    controller.connect();
    controller.record().unwrap();
    for raw in running_trace(1200) {
        controller.add_reading(raw);
    }
    wait_idle(&controller);

    controller.reset();
    assert_eq!(controller.state(), SessionState::Recording);
    assert!(controller.start_time().is_none());
    assert_eq!(controller.current_distance_m(), 0.0);
    assert_eq!(controller.pending_reading_count(), 0);
    controller.with_session(|s| {
        assert!(s.readings().is_empty());
        assert!(s.elements().is_empty());
        assert_eq!(s.window_len(), 0);
        assert!(!s.is_pca_initialized());
    });
    assert!(controller.visualisation_bytes().is_empty());
}

#[test]
fn disconnect_drops_everything() {
    let dir = scratch_dir("controller-disconnect");
    let controller = SessionController::new(config_exporting_to(&dir)).unwrap();
    controller.connect();
    controller.record().unwrap();
    for raw in running_trace(300) {
        controller.add_reading(raw);
    }
    wait_idle(&controller);

    controller.disconnect();
    assert_eq!(controller.state(), SessionState::Disconnected);
    assert_eq!(controller.with_session(|s| s.readings().len()), 0);
    assert!(!controller.add_reading(running_trace(1)[0]));
    assert!(matches!(controller.pause_recording(), Err(SessionError::InvalidState { .. })));
}

#[test]
fn distance_only_grows_while_recording() {
    let dir = scratch_dir("controller-distance");
    let controller = SessionController::new(config_exporting_to(&dir)).unwrap();
    controller.connect();

    let trace = running_trace(4000);
    for raw in &trace[..2000] {
        controller.add_reading(*raw);
        wait_idle(&controller);
    }
    assert!(controller.current_speed_kmh() > 0.0);
    assert_eq!(controller.current_distance_m(), 0.0);

    controller.record().unwrap();
    let mut last = 0.0;
    for raw in &trace[2000..] {
        controller.add_reading(*raw);
        wait_idle(&controller);
        let distance = controller.current_distance_m();
        assert!(distance >= last);
        last = distance;
    }
    // 20 s 的录制
    assert!(last > 60.0 && last < 100.0, "distance {}", last);
}
