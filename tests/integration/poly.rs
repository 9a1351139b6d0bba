//! Polyphonic voice stacking through the full client path.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use approx::assert_abs_diff_eq;
use dearjack::core::{ParamSet, ParamSpec};
use dearjack::prelude::*;
use dearjack::{ParamHandle, PolyDsp};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

#[test]
fn test_four_voices_are_four_times_louder() {
    let (server, engine) = test_engine();
    engine
        .spawn_client(ClientSpec::new("Solo", "SinOsc").param("frequency", 330.0))
        .unwrap();
    engine
        .spawn_client(
            ClientSpec::new("Quartet", "SinOsc")
                .voices(4)
                .param("frequency", 330.0),
        )
        .unwrap();

    for _ in 0..4 {
        server.run_cycle(TEST_BUFFER_SIZE);
        let solo = server.output("Solo", 0).unwrap();
        let quartet = server.output("Quartet", 0).unwrap();

        let scaled: Vec<f32> = solo.iter().map(|s| s * 4.0).collect();
        assert!(signals_approx_equal(&quartet, &scaled, 4.0 * FLOAT_EPSILON));
    }
}

#[test]
fn test_poly_voices_stay_locked_under_frequency_sweep() {
    let (server, engine) = test_engine();
    let handle = engine
        .spawn_client(
            ClientSpec::new("Quartet", "SinOsc")
                .voices(4)
                .param("amplitude", 1.0),
        )
        .unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let writer = {
        let handle = handle.clone();
        let running = Arc::clone(&running);
        std::thread::spawn(move || {
            let mut step = 0u64;
            while running.load(Ordering::Relaxed) {
                let frequency = 100.0 + (step % 5_000) as f64;
                handle.set_parameter("frequency", frequency).unwrap();
                step += 1;
            }
        })
    };

    for _ in 0..20_000 {
        server.run_cycle(16);
    }
    running.store(false, Ordering::Relaxed);
    writer.join().unwrap();

    // One full second at 100 Hz: four locked voices peak at 4.0.
    handle.set_parameter("frequency", 100.0).unwrap();
    let out = render(&server, "Quartet", 0, 100, 480);
    assert_abs_diff_eq!(peak(&out), 4.0, epsilon = 0.01);
}

#[test]
fn test_poly_exceeds_unit_range() {
    let (server, engine) = test_engine();
    engine
        .spawn_client(
            ClientSpec::new("Wall", "SquareWave")
                .voices(6)
                .param("amplitude", 1.0),
        )
        .unwrap();

    let out = render(&server, "Wall", 0, 1, 64);
    assert_abs_diff_eq!(peak(&out), 6.0, epsilon = FLOAT_EPSILON);
}

#[test]
fn test_poly_broadcasts_parameter_writes() {
    let (_server, engine) = test_engine();
    let handle = engine
        .spawn_client(ClientSpec::new("Pad", "SawWave").voices(3))
        .unwrap();

    handle.set_parameter("frequency", 55.0).unwrap();
    assert_eq!(handle.get_parameter("frequency").unwrap(), ParamValue::Float(55.0));
    assert_eq!(handle.type_name(), "SawWave");
    assert_eq!(handle.parameter_names(), vec!["frequency", "amplitude"]);
}

#[test]
fn test_zero_voices_rejected() {
    let (server, engine) = test_engine();
    let result = engine.spawn_client(ClientSpec::new("Empty", "SinOsc").voices(0));
    assert!(matches!(
        result,
        Err(Error::Core(dearjack::core::Error::InvalidVoiceCount(0)))
    ));
    assert!(!server.is_open("Empty"));
}

/// Stereo gain stage: output = input * gain on both channels.
struct StereoGain {
    params: Arc<ParamSet>,
    handle: ParamHandle,
}

impl StereoGain {
    fn new() -> Self {
        let params = Arc::new(ParamSet::new([ParamSpec::float("gain", 1.0)]));
        let handle: ParamHandle = params.clone();
        Self { params, handle }
    }
}

impl DspUnit for StereoGain {
    fn type_name(&self) -> &str {
        "StereoGain"
    }

    fn num_inputs(&self) -> usize {
        2
    }

    fn num_outputs(&self) -> usize {
        2
    }

    fn process_audio(
        &mut self,
        frames: usize,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        _sample_rate: f64,
    ) {
        let gain = self.params.float_at(0) as f32;
        for (out, input) in outputs.iter_mut().zip(inputs) {
            for (o, i) in out[..frames].iter_mut().zip(&input[..frames]) {
                *o = i * gain;
            }
        }
    }

    fn parameters(&self) -> &ParamHandle {
        &self.handle
    }
}

#[test]
fn test_custom_unit_with_inputs() {
    let (server, engine) = test_engine();
    engine.factory().register("StereoGain", || Box::new(StereoGain::new()));

    let handle = engine
        .spawn_client(ClientSpec::new("Gain", "StereoGain").voices(2).param("gain", 0.5))
        .unwrap();
    assert_eq!(handle.num_inputs(), 2);
    assert_eq!(
        server.port_names("Gain").unwrap(),
        vec!["input0", "input1", "output0", "output1"]
    );

    server.set_input("Gain", 0, &[1.0, 0.5, -1.0, 0.0]);
    server.set_input("Gain", 1, &[0.25, 0.25]);
    server.run_cycle(4);

    // Two voices at gain 0.5 sum back to unity.
    assert_eq!(server.output("Gain", 0).unwrap(), vec![1.0, 0.5, -1.0, 0.0]);
    assert_eq!(server.output("Gain", 1).unwrap(), vec![0.25, 0.25, 0.0, 0.0]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn poly_is_sum_of_identical_voices(
        voices in 1usize..8,
        frames in 1usize..5000,
        frequency in 20.0f64..4000.0,
    ) {
        let factory = DspFactory::default();
        let mut single = factory.create("SinOsc").unwrap();
        let mut poly: PolyDsp = factory.create_poly("SinOsc", voices).unwrap();
        single.set_parameter("frequency", ParamValue::Float(frequency)).unwrap();
        poly.set_parameter("frequency", ParamValue::Float(frequency)).unwrap();

        let mut expected = vec![0.0f32; frames];
        let mut actual = vec![0.0f32; frames];
        single.process_audio(frames, &[], &mut [&mut expected[..]], TEST_SAMPLE_RATE);
        poly.process_audio(frames, &[], &mut [&mut actual[..]], TEST_SAMPLE_RATE);

        for (a, e) in actual.iter().zip(&expected) {
            prop_assert!((a - e * voices as f32).abs() <= voices as f32 * FLOAT_EPSILON);
        }
    }
}
