//! Generate a synthetic EELS spectrum image for trying out the browser and
//! the batch utilities.
//!
//! Each pixel holds a power-law background whose exponent ramps across the
//! image, a core-loss edge that is stronger inside a central disc, shot-like
//! noise and a few spikes. With `--zlp` a drifting zero-loss peak is added.
//!
//! Run with: cargo run --bin generate-cube -- out.hspy --rows 32 --cols 32
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use std::path::PathBuf;

use clap::Parser;
use ndarray::Array3;
use specim_core::{EnergyAxis, SpectrumImage};

#[derive(Parser, Debug)]
#[command(name = "generate-cube", about = "Write a synthetic EELS spectrum image")]
struct Cli {
    /// Output file (.hspy/.h5 or raw f32 for any other extension)
    output: PathBuf,

    /// Image rows
    #[arg(long, default_value = "32")]
    rows: usize,

    /// Image columns
    #[arg(long, default_value = "32")]
    cols: usize,

    /// Energy channels
    #[arg(long, default_value = "512")]
    channels: usize,

    /// Energy of the first channel in eV
    #[arg(long, default_value = "300.0")]
    offset: f64,

    /// Energy per channel in eV
    #[arg(long, default_value = "0.5")]
    dispersion: f64,

    /// Edge onset in eV
    #[arg(long, default_value = "456.0")]
    onset: f64,

    /// Edge jump relative to the background at the onset
    #[arg(long, default_value = "0.3")]
    jump: f64,

    /// Relative noise level (0 disables noise)
    #[arg(long, default_value = "0.02")]
    noise: f64,

    /// Number of single-channel spikes
    #[arg(long, default_value = "10")]
    spikes: usize,

    /// Add a zero-loss peak whose centre drifts by this much across the columns
    #[arg(long)]
    zlp: Option<f64>,

    /// PRNG seed
    #[arg(long, default_value = "42")]
    seed: u64,
}

/// Deterministic xoshiro256** generator.
struct Rng {
    state: [u64; 4],
}

impl Rng {
    fn new(seed: u64) -> Self {
        let mut state = [0u64; 4];
        let mut x = seed;
        for slot in &mut state {
            x = x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            *slot = x;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let result = self.state[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        ((self.next_f64() * n as f64) as usize).min(n.saturating_sub(1))
    }

    /// Box-Muller.
    fn gauss(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// Fraction of the way from the first to the last index.
fn ramp(i: usize, n: usize) -> f64 {
    if n > 1 {
        i as f64 / (n - 1) as f64
    } else {
        0.5
    }
}

fn zero_loss(energy: f64, centre: f64) -> f64 {
    const AMPLITUDE: f64 = 1e4;
    const SIGMA: f64 = 0.4;
    let u = (energy - centre) / SIGMA;
    AMPLITUDE * (-0.5 * u * u).exp()
}

fn generate(cli: &Cli) -> Result<SpectrumImage, Box<dyn std::error::Error>> {
    let axis = EnergyAxis::from_calibration(cli.offset, cli.dispersion, cli.channels)?;
    let min_energy = axis.min();
    if cli.zlp.is_none() && min_energy <= 0.0 {
        return Err("power-law backgrounds need positive energies; raise --offset".into());
    }
    let background_start = min_energy.max(1.0);
    let (rows, cols) = (cli.rows, cli.cols);
    let energies = axis.values().to_vec();

    let mut data = Array3::from_shape_fn((rows, cols, cli.channels), |(r, c, e)| {
        let exponent = 2.5 + (ramp(r, rows) + ramp(c, cols)) / 2.0;
        let energy = energies[e];
        let dr = ramp(r, rows) - 0.5;
        let dc = ramp(c, cols) - 0.5;
        let in_disc = dr * dr + dc * dc < 0.09;
        let jump = if in_disc { cli.jump } else { 0.2 * cli.jump };

        let mut value = 0.0;
        if energy > 0.0 {
            let scale = 1000.0 * background_start.powf(exponent);
            value += scale * energy.powf(-exponent);
            if energy >= cli.onset {
                let rise = ((energy - cli.onset) / 5.0).min(1.0);
                value += jump * rise * scale * energy.powf(-exponent) * (energy / cli.onset);
            }
        }
        if let Some(drift) = cli.zlp {
            value += zero_loss(energy, drift * (ramp(c, cols) - 0.5));
        }
        value
    });

    let mut rng = Rng::new(cli.seed);
    if cli.noise > 0.0 {
        for v in &mut data {
            *v += cli.noise * v.abs().sqrt() * rng.gauss() * 10.0;
        }
    }
    if rows * cols * cli.channels > 0 {
        for _ in 0..cli.spikes {
            let (r, c, e) = (rng.below(rows), rng.below(cols), rng.below(cli.channels));
            data[[r, c, e]] *= 50.0;
        }
    }

    Ok(SpectrumImage::new(data, axis)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let image = generate(&cli)?;
    specim_io::save(&cli.output, &image)?;
    println!(
        "Wrote {}x{}x{} cube ({:.1}..{:.1} eV) to {}",
        cli.rows,
        cli.cols,
        cli.channels,
        image.energy().first(),
        image.energy().last(),
        cli.output.display()
    );
    log::info!(
        "raw output needs --shape {}x{}x{} --offset {} --dispersion {} to load",
        cli.rows,
        cli.cols,
        cli.channels,
        cli.offset,
        cli.dispersion
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(extra: &[&str]) -> Cli {
        let mut args = vec!["generate-cube", "out.hspy", "--rows", "4", "--cols", "5"];
        args.extend_from_slice(extra);
        args.extend_from_slice(&["--channels", "64", "--noise", "0", "--spikes", "0"]);
        Cli::parse_from(args)
    }

    #[test]
    fn test_rng_is_deterministic() {
        let mut a = Rng::new(7);
        let mut b = Rng::new(7);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        let x = a.next_f64();
        assert!((0.0..1.0).contains(&x));
        assert!(a.below(3) < 3);
    }

    #[test]
    fn test_background_decays() {
        let image = generate(&cli(&[])).unwrap();
        assert_eq!(image.dim(), (4, 5, 64));
        let spectrum = image.spectrum(0, 0).unwrap();
        assert!((spectrum[0] - 1000.0).abs() < 1e-9);
        assert!(spectrum[63] < spectrum[0]);
    }

    #[test]
    fn test_zero_loss_needs_no_positive_offset() {
        let image = generate(&cli(&["--offset=-5", "--dispersion", "0.25", "--zlp", "0"])).unwrap();
        let spectrum = image.spectrum(2, 2).unwrap();
        let peak = image.energy().nearest_index(0.0);
        assert!(spectrum[peak] > 5000.0);
    }

    #[test]
    fn test_rejects_negative_energies_without_zlp() {
        assert!(generate(&cli(&["--offset=-5"])).is_err());
    }
}
