//! specim: batch utilities for EELS/RIXS spectrum images.
//!
//! Every subcommand reads one cube (HyperSpy HDF5, or raw samples with
//! `--shape`), runs one operation and writes a cube or a JSON report.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Args, Parser, Subcommand, ValueEnum};
use ndarray::Array2;
use serde_json::json;
use specim_algorithms::{
    align_zeroloss, fit_zeroloss, pca_filter, pca_scree, remove_outliers, shear,
    subtract_background, subtract_background_fast, BackgroundModel, FitOptions, OutlierConfig,
    PeakShape, ShearAxis, ZeroLossConfig,
};
use specim_core::{EnergyWindow, SpectrumImage};
use specim_io::{RawDtype, RawOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    SpecimIo(#[from] specim_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] specim_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Sample type of raw input files.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Dtype {
    /// 32-bit little-endian floats
    F32,
    /// 64-bit little-endian floats
    F64,
}

/// Background model selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Model {
    /// A * E^-r
    Pl,
    /// A * exp(-r E)
    Exp,
    /// a + b E
    Lin,
}

/// Zero-loss peak profile.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Peak {
    /// Gaussian profile
    Gaussian,
    /// Lorentzian profile
    Lorentzian,
}

/// Shear direction.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Direction {
    /// Shift rows along x
    X,
    /// Shift columns along y
    Y,
}

/// Batch utilities for EELS/RIXS spectrum images.
#[derive(Parser)]
#[command(name = "specim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

/// Input file and the calibration raw files need.
#[derive(Args, Debug)]
struct InputArgs {
    /// Input cube (.hspy/.h5/.hdf5 or raw little-endian samples)
    input: PathBuf,

    /// Raw cube shape as ROWSxCOLSxCHANNELS
    #[arg(long, value_parser = parse_shape)]
    shape: Option<(usize, usize, usize)>,

    /// Raw sample type
    #[arg(long, value_enum, default_value = "f32")]
    dtype: Dtype,

    /// Energy of the first channel (raw input)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    energy_offset: f64,

    /// Energy per channel (raw input)
    #[arg(long, default_value_t = 1.0)]
    dispersion: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Show shape and calibration of a cube
    Info {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Replace spikes by the spectrum median
    Clean {
        #[command(flatten)]
        input: InputArgs,

        /// Output cube
        #[arg(short, long)]
        output: PathBuf,

        /// Spike threshold in standard deviations above the median
        #[arg(long, default_value = "5.0")]
        threshold: f64,

        /// Keep the channels next to each spike
        #[arg(long)]
        keep_neighbors: bool,
    },

    /// Deskew the cube along x or y
    Shear {
        #[command(flatten)]
        input: InputArgs,

        /// Output cube
        #[arg(short, long)]
        output: PathBuf,

        /// Shear angle in degrees
        #[arg(long, allow_negative_numbers = true)]
        angle: f64,

        /// Shear direction
        #[arg(long, value_enum, default_value = "x")]
        direction: Direction,
    },

    /// Fit the zero-loss peak of every spectrum
    FitZlp {
        #[command(flatten)]
        input: InputArgs,

        /// JSON file for the amplitude, centre and width maps
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Peak profile
        #[arg(long, value_enum, default_value = "gaussian")]
        peak: Peak,

        /// Fit window as LO,HI in energy units
        #[arg(long, value_parser = parse_window, default_value = "-3,3", allow_hyphen_values = true)]
        window: EnergyWindow,
    },

    /// Align every spectrum on its zero-loss peak
    AlignZlp {
        #[command(flatten)]
        input: InputArgs,

        /// Output cube
        #[arg(short, long)]
        output: PathBuf,

        /// Peak profile
        #[arg(long, value_enum, default_value = "gaussian")]
        peak: Peak,

        /// Fit window as LO,HI in energy units
        #[arg(long, value_parser = parse_window, default_value = "-3,3", allow_hyphen_values = true)]
        window: EnergyWindow,
    },

    /// Print PCA explained-variance ratios
    PcaScree {
        #[command(flatten)]
        input: InputArgs,

        /// Number of ratios to report
        #[arg(short = 'n', long, default_value = "50")]
        components: usize,
    },

    /// Denoise by keeping the leading PCA components
    PcaFilter {
        #[command(flatten)]
        input: InputArgs,

        /// Output cube
        #[arg(short, long)]
        output: PathBuf,

        /// Components to keep
        #[arg(short = 'n', long, default_value = "10")]
        components: usize,
    },

    /// Fit and subtract a pre-edge background
    Bsub {
        #[command(flatten)]
        input: InputArgs,

        /// Output cube
        #[arg(short, long)]
        output: PathBuf,

        /// Background window as LO,HI in energy units
        #[arg(long, value_parser = parse_window, allow_hyphen_values = true)]
        window: EnergyWindow,

        /// Background model
        #[arg(long, value_enum, default_value = "pl")]
        model: Model,

        /// Subtract with this fixed exponent instead of fitting every pixel
        #[arg(long)]
        fast_exponent: Option<f64>,

        /// Refit with a linear combination of two power laws
        #[arg(long)]
        lc: bool,

        /// LC percentiles as LO,HI
        #[arg(long, value_parser = parse_window, default_value = "5,95")]
        lc_percentiles: EnergyWindow,

        /// Fit on a spatially smoothed copy with this FWHM in pixels
        #[arg(long)]
        lba: Option<f64>,

        /// Fit in linearised space only
        #[arg(long)]
        log: bool,
    },
}

/// Parse `ROWSxCOLSxCHANNELS`.
fn parse_shape(s: &str) -> std::result::Result<(usize, usize, usize), String> {
    let dims = s
        .split(['x', 'X', ','])
        .map(|d| d.trim().parse::<usize>().map_err(|e| format!("'{d}': {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    match dims.as_slice() {
        [r, c, e] if *r > 0 && *c > 0 && *e > 0 => Ok((*r, *c, *e)),
        _ => Err(format!(
            "expected three non-zero dimensions ROWSxCOLSxCHANNELS, got '{s}'"
        )),
    }
}

/// Parse `LO,HI` into an ordered window.
fn parse_window(s: &str) -> std::result::Result<EnergyWindow, String> {
    let (lo, hi) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LO,HI, got '{s}'"))?;
    let lo: f64 = lo.trim().parse().map_err(|e| format!("'{lo}': {e}"))?;
    let hi: f64 = hi.trim().parse().map_err(|e| format!("'{hi}': {e}"))?;
    if !(lo.is_finite() && hi.is_finite()) {
        return Err(format!("window bounds must be finite, got '{s}'"));
    }
    Ok(EnergyWindow::new(lo, hi))
}

impl InputArgs {
    fn load(&self) -> Result<SpectrumImage> {
        let raw = self.shape.map(|shape| {
            let dtype = match self.dtype {
                Dtype::F32 => RawDtype::F32,
                Dtype::F64 => RawDtype::F64,
            };
            RawOptions::new(shape)
                .with_dtype(dtype)
                .with_calibration(self.energy_offset, self.dispersion)
        });
        Ok(specim_io::load(&self.input, raw.as_ref())?)
    }
}

impl From<Peak> for PeakShape {
    fn from(peak: Peak) -> Self {
        match peak {
            Peak::Gaussian => Self::Gaussian,
            Peak::Lorentzian => Self::Lorentzian,
        }
    }
}

impl From<Model> for BackgroundModel {
    fn from(model: Model) -> Self {
        match model {
            Model::Pl => Self::PowerLaw,
            Model::Exp => Self::Exponential,
            Model::Lin => Self::Linear,
        }
    }
}

fn save(path: &Path, image: &SpectrumImage) -> Result<()> {
    specim_io::save(path, image)?;
    println!("Wrote {} {:?}", path.display(), image.dim());
    Ok(())
}

fn map_to_json(map: &Array2<f64>) -> serde_json::Value {
    json!(map.outer_iter().map(|row| row.to_vec()).collect::<Vec<_>>())
}

fn map_summary(map: &Array2<f64>) -> serde_json::Value {
    let values: Vec<f64> = map.iter().copied().collect();
    let (min, max) = specim_core::stats::min_max(&values);
    json!({
        "mean": specim_core::stats::mean(&values),
        "std": specim_core::stats::std(&values),
        "min": min,
        "max": max,
    })
}

fn zlp_config(peak: Peak, window: EnergyWindow) -> ZeroLossConfig {
    ZeroLossConfig::default()
        .with_shape(peak.into())
        .with_window(window.start, window.end)
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }
    let start = Instant::now();

    match cli.command {
        Commands::Info { input } => {
            let image = input.load()?;
            let energy = image.energy();
            let (rows, cols, channels) = image.dim();
            let total = image.total_spectrum();
            let report = json!({
                "file": input.input.display().to_string(),
                "shape": [rows, cols, channels],
                "energy": {
                    "first": energy.first(),
                    "last": energy.last(),
                    "dispersion": energy.dispersion(),
                },
                "pixel_scale": image.pixel_scale(),
                "has_adf": image.adf().is_some(),
                "total_counts": total.sum(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Clean {
            input,
            output,
            threshold,
            keep_neighbors,
        } => {
            let image = input.load()?;
            let config = OutlierConfig::default()
                .with_threshold(threshold)
                .with_neighbors(!keep_neighbors);
            let (cleaned, report) = remove_outliers(image.data(), &config);
            println!(
                "Cleaned {} spectra ({} channels replaced)",
                report.spectra_cleaned, report.channels_replaced
            );
            let cleaned = image.with_data(cleaned, image.energy().clone())?;
            save(&output, &cleaned)?;
        }

        Commands::Shear {
            input,
            output,
            angle,
            direction,
        } => {
            let image = input.load()?;
            let axis = match direction {
                Direction::X => ShearAxis::X,
                Direction::Y => ShearAxis::Y,
            };
            let (cube, adf) = shear(image.data(), image.adf(), angle, axis);
            let mut sheared = SpectrumImage::new(cube, image.energy().clone())?;
            if let Some(scale) = image.pixel_scale() {
                sheared = sheared.with_pixel_scale(scale);
            }
            if let Some(adf) = adf {
                sheared = sheared.with_adf(adf)?;
            }
            save(&output, &sheared)?;
        }

        Commands::FitZlp {
            input,
            output,
            peak,
            window,
        } => {
            let image = input.load()?;
            let fit = fit_zeroloss(image.data(), image.energy(), &zlp_config(peak, window))?;
            let summary = json!({
                "centre": map_summary(&fit.centre),
                "width": map_summary(&fit.width),
                "amplitude": map_summary(&fit.amplitude),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if let Some(path) = output {
                let maps = json!({
                    "peak": format!("{peak:?}").to_lowercase(),
                    "window": [window.start, window.end],
                    "amplitude": map_to_json(&fit.amplitude),
                    "centre": map_to_json(&fit.centre),
                    "width": map_to_json(&fit.width),
                });
                std::fs::write(&path, serde_json::to_string(&maps)?)?;
                println!("Wrote {}", path.display());
            }
        }

        Commands::AlignZlp {
            input,
            output,
            peak,
            window,
        } => {
            let image = input.load()?;
            let (cube, energy, fit) =
                align_zeroloss(image.data(), image.energy(), &zlp_config(peak, window))?;
            log::info!(
                "zero-loss centres: {}",
                serde_json::to_string(&map_summary(&fit.centre))?
            );
            println!(
                "Aligned {} spectra, energy range {:.4} - {:.4}",
                image.rows() * image.cols(),
                energy.first(),
                energy.last()
            );
            save(&output, &image.with_data(cube, energy)?)?;
        }

        Commands::PcaScree { input, components } => {
            let image = input.load()?;
            let ratios = pca_scree(image.data(), components)?;
            println!("{}", serde_json::to_string_pretty(&json!({ "ratios": ratios }))?);
        }

        Commands::PcaFilter {
            input,
            output,
            components,
        } => {
            let image = input.load()?;
            let result = pca_filter(image.data(), components)?;
            save(
                &output,
                &image.with_data(result.filtered, image.energy().clone())?,
            )?;
        }

        Commands::Bsub {
            input,
            output,
            window,
            model,
            fast_exponent,
            lc,
            lc_percentiles,
            lba,
            log,
        } => {
            let image = input.load()?;
            let mut options = FitOptions::default()
                .with_model(model.into())
                .with_lc(lc)
                .with_lc_percentiles(lc_percentiles.start, lc_percentiles.end)
                .with_log(log);
            if let Some(fwhm) = lba {
                options = options.with_lba(true, fwhm);
            }
            let subtracted = if let Some(exponent) = fast_exponent {
                subtract_background_fast(image.data(), image.energy(), window, exponent, &options)?
            } else {
                let result = subtract_background(image.data(), image.energy(), window, &options)?;
                let mut report = json!({ "exponent": map_summary(&result.exponents) });
                if let Some((r1, r2)) = result.lc_exponents {
                    report["lc_exponents"] = json!([r1, r2]);
                }
                println!("{}", serde_json::to_string_pretty(&report)?);
                result.subtracted
            };
            save(
                &output,
                &image.with_data(subtracted, image.energy().clone())?,
            )?;
        }
    }

    log::debug!("finished in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_shape() {
        assert_eq!(parse_shape("4x5x100").unwrap(), (4, 5, 100));
        assert_eq!(parse_shape("4,5,100").unwrap(), (4, 5, 100));
        assert!(parse_shape("4x5").is_err());
        assert!(parse_shape("0x5x10").is_err());
    }

    #[test]
    fn test_parse_window_orders_bounds() {
        let w = parse_window("3,-3").unwrap();
        assert!((w.start + 3.0).abs() < 1e-12);
        assert!((w.end - 3.0).abs() < 1e-12);
        assert!(parse_window("1").is_err());
        assert!(parse_window("a,2").is_err());
    }

    #[test]
    fn test_bsub_arguments() {
        let cli = Cli::try_parse_from([
            "specim",
            "bsub",
            "cube.raw",
            "--shape",
            "2x2x50",
            "--energy-offset",
            "-10",
            "-o",
            "out.raw",
            "--window",
            "-5,0",
            "--model",
            "exp",
            "--lc",
        ])
        .unwrap();
        match cli.command {
            Commands::Bsub {
                input, window, lc, ..
            } => {
                assert_eq!(input.shape, Some((2, 2, 50)));
                assert!((input.energy_offset + 10.0).abs() < 1e-12);
                assert!((window.start + 5.0).abs() < 1e-12);
                assert!(lc);
            }
            _ => panic!("expected bsub"),
        }
    }
}
