//! Control-thread parameter surface: initial values, type checks, display snapshots.

use crate::helpers::*;
use dearjack::prelude::*;
use dearjack::{ParamKind, ParameterRange};

#[test]
fn test_params_macro_initial_values() {
    let (_server, engine) = test_engine();
    let handle = engine
        .spawn_client(ClientSpec::new("Lead", "SinOsc").params(params! {
            "frequency" => 220.0,
            "amplitude" => 0.25,
        }))
        .unwrap();

    assert_eq!(handle.get_parameter("frequency").unwrap(), ParamValue::Float(220.0));
    assert_eq!(handle.get_parameter("amplitude").unwrap(), ParamValue::Float(0.25));
}

#[test]
fn test_unknown_parameter_write_is_ignored() {
    let (_server, engine) = test_engine();
    let handle = engine.spawn_client(ClientSpec::new("Lead", "SinOsc")).unwrap();

    handle.set_parameter("cutoff", 1_000.0).unwrap();
    assert!(handle.get_parameter("cutoff").is_err());
    assert_eq!(handle.parameter_names(), vec!["frequency", "amplitude"]);
}

#[test]
fn test_type_mismatch_leaves_value() {
    let (_server, engine) = test_engine();
    let handle = engine.spawn_client(ClientSpec::new("Lead", "SinOsc")).unwrap();

    let result = handle.set_parameter("frequency", 3);
    match result {
        Err(Error::Core(dearjack::core::Error::TypeMismatch {
            expected, found, ..
        })) => {
            assert_eq!(expected, ParamKind::Float);
            assert_eq!(found, ParamKind::Int);
        }
        other => panic!("Expected TypeMismatch, got {other:?}"),
    }
    assert_eq!(handle.get_parameter("frequency").unwrap(), ParamValue::Float(440.0));
}

#[test]
fn test_snapshot_for_display() {
    let (_server, engine) = test_engine();
    engine
        .spawn_client(ClientSpec::new("Pad", "SquareWave").voices(2))
        .unwrap();

    let snapshot = engine.inspect("Pad").unwrap();
    let names: Vec<&str> = snapshot.names().collect();
    assert_eq!(names, vec!["frequency", "amplitude"]);

    let frequency = &snapshot.entries[0];
    assert_eq!(frequency.value, ParamValue::Float(440.0));
    assert_eq!(frequency.range, Some(ParameterRange::logarithmic(20.0, 20_000.0)));
    assert_eq!(snapshot.entries[1].range, Some(ParameterRange::linear(0.0, 1.0)));
}

#[test]
fn test_out_of_range_values_are_not_clamped() {
    let (server, engine) = test_engine();
    let handle = engine
        .spawn_client(ClientSpec::new("Loud", "SquareWave").param("amplitude", 2.0))
        .unwrap();

    assert_eq!(handle.get_parameter("amplitude").unwrap(), ParamValue::Float(2.0));
    let out = render(&server, "Loud", 0, 1, 32);
    assert_eq!(peak(&out), 2.0);
}
