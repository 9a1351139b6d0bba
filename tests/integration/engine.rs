//! Engine lifecycle integration tests
//!
//! Spawning and removing clients, background jobs on the worker pool,
//! and teardown.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use dearjack::prelude::*;
use dearjack::ClientState;
use std::time::Duration;

#[test]
fn test_engine_sequential_creation() {
    for _ in 0..3 {
        let (server, engine) = test_engine();
        engine.spawn_client(ClientSpec::new("Lead", "SinOsc")).unwrap();
        assert!(server.is_active("Lead"));
        // Engine is dropped here, closing its clients
        drop(engine);
        assert!(!server.is_open("Lead"));
    }
}

#[test]
fn test_sine_matches_reference() {
    let (server, engine) = test_engine();
    engine
        .spawn_client(
            ClientSpec::new("Ref", "SinOsc")
                .param("frequency", 1000.0)
                .param("amplitude", 1.0),
        )
        .unwrap();

    let output = render(&server, "Ref", 0, 4, TEST_BUFFER_SIZE);
    let reference = generate_sine(1000.0, TEST_SAMPLE_RATE, 4 * TEST_BUFFER_SIZE);
    assert!(signals_approx_equal(&output, &reference, DSP_EPSILON));
}

#[test]
fn test_clients_run_independently() {
    let (server, engine) = test_engine();
    let low = engine.spawn_client(ClientSpec::new("Low", "SquareWave")).unwrap();
    let high = engine.spawn_client(ClientSpec::new("High", "SquareWave")).unwrap();
    low.set_parameter("amplitude", 0.1).unwrap();
    high.set_parameter("amplitude", 0.9).unwrap();

    assert_eq!(server.run_cycle(TEST_BUFFER_SIZE), 2);

    let low_out = server.output("Low", 0).unwrap();
    let high_out = server.output("High", 0).unwrap();
    assert!((peak(&low_out) - 0.1).abs() < FLOAT_EPSILON);
    assert!((peak(&high_out) - 0.9).abs() < FLOAT_EPSILON);
}

#[test]
fn test_async_spawn_many() {
    let (server, engine) = test_engine();

    let pending: Vec<_> = (0..8)
        .map(|i| {
            engine
                .spawn_client_async(ClientSpec::new(format!("Voice{i}"), "SawWave"))
                .unwrap()
        })
        .collect();

    for job in pending {
        let handle = job.wait().unwrap();
        assert_eq!(handle.state(), ClientState::Activated);
    }

    assert_eq!(engine.client_count(), 8);
    assert_eq!(server.client_names().len(), 8);
    assert_eq!(server.run_cycle(64), 8);
}

#[test]
fn test_async_spawn_reports_errors() {
    let (_server, engine) = test_engine();
    let job = engine
        .spawn_client_async(ClientSpec::new("Bad", "NoSuchType"))
        .unwrap();
    assert!(matches!(
        job.wait(),
        Err(Error::Core(dearjack::core::Error::UnknownType(_)))
    ));
}

#[test]
fn test_async_remove() {
    let (server, engine) = test_engine();
    engine.spawn_client(ClientSpec::new("Lead", "SinOsc")).unwrap();

    engine.remove_client_async("Lead").unwrap().wait().unwrap();
    assert!(!server.is_open("Lead"));

    let again = engine.remove_client_async("Lead").unwrap().wait();
    assert!(matches!(again, Err(Error::UnknownClient(_))));
}

#[test]
fn test_try_wait_eventually_completes() {
    let (_server, engine) = test_engine();
    let job = engine
        .spawn_client_async(ClientSpec::new("Lead", "SinOsc"))
        .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    let result = loop {
        if let Some(result) = job.try_wait() {
            break result;
        }
        assert!(std::time::Instant::now() < deadline, "spawn job never finished");
        std::thread::sleep(Duration::from_millis(1));
    };
    assert!(result.is_ok());
}

#[test]
fn test_shutdown_drains_queued_spawns() {
    let (server, engine) = test_engine();
    let pending: Vec<_> = (0..4)
        .map(|i| {
            engine
                .spawn_client_async(ClientSpec::new(format!("C{i}"), "SinOsc"))
                .unwrap()
        })
        .collect();

    engine.shutdown();

    // Every queued job ran before the clients were torn down.
    for job in pending {
        assert!(job.wait().is_ok());
    }
    assert!(server.client_names().is_empty());
}

#[test]
fn test_handle_outlives_removal() {
    let (server, engine) = test_engine();
    let handle = engine.spawn_client(ClientSpec::new("Lead", "SinOsc")).unwrap();

    engine.remove_client("Lead").unwrap();
    assert_eq!(handle.state(), ClientState::Closed);
    assert_eq!(server.run_cycle(32), 0);

    // Parameters stay readable for display after the client is gone.
    assert_eq!(handle.get_parameter("amplitude").unwrap(), ParamValue::Float(0.5));
}
