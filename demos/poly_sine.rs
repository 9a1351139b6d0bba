//! # Poly Sine
//!
//! Four stacked sine voices on the default audio device, with the frequency
//! swept from the control thread.
//!
//! **Concepts:** Engine setup, polyphonic clients, lock-free parameter writes
//!
//! ```bash
//! RUST_LOG=dearjack=debug cargo run --example poly_sine
//! ```

use dearjack::prelude::*;
use std::time::Duration;

fn main() -> dearjack::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let engine = DearJackEngine::builder().build()?;

    let pad = engine.spawn_client(
        ClientSpec::new("DearJack", "SinOsc")
            .voices(4)
            .params(params! {
                "frequency" => 220.0,
                "amplitude" => 0.05,
            }),
    )?;

    println!("Playing 4 stacked sine voices...");
    for step in 0..=60 {
        let frequency = 220.0 * 2f64.powf(step as f64 / 60.0);
        pad.set_parameter("frequency", frequency)?;
        std::thread::sleep(Duration::from_millis(50));
    }

    for entry in engine.inspect("DearJack")?.entries {
        println!("{} = {}", entry.name, entry.value);
    }

    engine.shutdown();
    Ok(())
}
