//! Audio client lifecycle integration tests
//!
//! Failure rollback, server-initiated shutdown and audio-thread isolation,
//! all against the dummy server.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use dearjack::client::Error as ClientError;
use dearjack::prelude::*;
use dearjack::ClientState;

#[test]
fn test_open_rejected() {
    let (server, engine) = test_engine();
    server.reject_open(true);

    let result = engine.spawn_client(ClientSpec::new("Lead", "SinOsc"));
    assert!(matches!(
        result,
        Err(Error::Client(ClientError::OpenFailed { .. }))
    ));
    assert_eq!(engine.client_count(), 0);
}

#[test]
fn test_activation_failure_rolls_back() {
    let (server, engine) = test_engine();
    server.reject_activate(true);

    let result = engine.spawn_client(ClientSpec::new("Lead", "SinOsc"));
    assert!(matches!(
        result,
        Err(Error::Client(ClientError::ActivateFailed { .. }))
    ));
    assert!(!server.is_open("Lead"));
    assert!(engine.client("Lead").is_none());

    // The name is free again.
    server.reject_activate(false);
    let handle = engine.spawn_client(ClientSpec::new("Lead", "SinOsc")).unwrap();
    assert!(handle.is_active());
}

#[test]
fn test_server_shutdown_marks_clients() {
    let (server, engine) = test_engine();
    let a = engine.spawn_client(ClientSpec::new("A", "SinOsc")).unwrap();
    let b = engine.spawn_client(ClientSpec::new("B", "SawWave")).unwrap();

    server.shutdown_server();
    assert_eq!(a.state(), ClientState::Shutdown);
    assert_eq!(b.state(), ClientState::Shutdown);

    // Removing a shut down client must not call back into the server.
    engine.remove_client("A").unwrap();
    assert_eq!(a.state(), ClientState::Closed);
    assert_eq!(server.run_cycle(64), 0);
}

#[test]
fn test_ports_follow_unit_shape() {
    let (server, engine) = test_engine();
    engine.spawn_client(ClientSpec::new("Lead", "SinOsc")).unwrap();
    assert_eq!(server.port_names("Lead").unwrap(), vec!["output0"]);
}

#[test]
fn test_output_is_continuous_across_cycles() {
    let (server, engine) = test_engine();
    engine
        .spawn_client(ClientSpec::new("Lead", "SinOsc").param("frequency", 440.0))
        .unwrap();

    // Small odd buffer sizes, rendered back to back.
    let mut joined = Vec::new();
    for frames in [7, 64, 1, 128, 33] {
        server.run_cycle(frames);
        joined.extend(server.output("Lead", 0).unwrap());
    }

    let reference: Vec<f32> = generate_sine(440.0, TEST_SAMPLE_RATE, joined.len())
        .into_iter()
        .map(|s| s * 0.5)
        .collect();
    assert!(signals_approx_equal(&joined, &reference, DSP_EPSILON));
}

#[test]
fn test_control_writes_during_processing() {
    let (server, engine) = test_engine();
    let handle = engine.spawn_client(ClientSpec::new("Lead", "SawWave")).unwrap();

    let writer = {
        let handle = handle.clone();
        std::thread::spawn(move || {
            for i in 0..2_000 {
                handle.set_parameter("frequency", 100.0 + i as f64).unwrap();
            }
        })
    };

    for _ in 0..200 {
        server.run_cycle(TEST_BUFFER_SIZE);
        let out = server.output("Lead", 0).unwrap();
        assert!(out.iter().all(|s| s.is_finite() && s.abs() <= 0.5 + FLOAT_EPSILON));
    }

    writer.join().unwrap();
    assert_eq!(
        handle.get_parameter("frequency").unwrap(),
        ParamValue::Float(2_099.0)
    );
}

#[test]
fn test_zero_amplitude_is_silent() {
    let (server, engine) = test_engine();
    engine
        .spawn_client(ClientSpec::new("Mute", "SquareWave").param("amplitude", 0.0))
        .unwrap();

    let out = render(&server, "Mute", 0, 2, TEST_BUFFER_SIZE);
    assert_silence(&out, SILENCE_THRESHOLD);

    engine.client("Mute").unwrap().set_parameter("amplitude", 0.3).unwrap();
    let out = render(&server, "Mute", 0, 1, TEST_BUFFER_SIZE);
    assert_has_audio(&out, 0.29);
}
