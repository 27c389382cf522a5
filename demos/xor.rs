//! Trains a 2 -> 4 -> 1 sigmoid network on XOR and prints what it learned.
//!
//! Run with `cargo run --example xor`. Set `LPMATH_THREADS` to skip the
//! calibration benchmark on first use.

use lpmath::{Activation, FitConfig, Network, NetworkConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // inputs and the target share a row
    let rows = vec![
        vec![0.0, 0.0, 0.0],
        vec![0.0, 1.0, 1.0],
        vec![1.0, 0.0, 1.0],
        vec![1.0, 1.0, 0.0],
    ];

    let mut net = Network::new(
        NetworkConfig::new([2, 4, 1])
            .with_activations(vec![Activation::Sigmoid; 2])
            .with_learning_rate(0.5)
            .with_seed(2024),
    )?;
    net.log("loss", 1_000)?;

    net.fit(&rows, None, &FitConfig { epochs: 20_000, progress: false })?;

    for (step, loss) in net.metric_data("loss")?.iter().step_by(10) {
        println!("step {step:>6}: loss {loss:.6}");
    }

    for row in &rows {
        let out = net.forward_pass(&row[..2])?;
        println!("{:?} -> {:.4} (want {})", &row[..2], out.get(0, 0)?, row[2]);
    }

    Ok(())
}
