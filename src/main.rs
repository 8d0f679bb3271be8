use holorecon::{
    ArctanMode, Hologram, HologramParams, ReconstructionEngine,
    ReconstructionParams, RoughnessMetric, UnwrapMethod
};
use ndarray_npy::WriteNpyExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;
use anyhow::Context;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;



#[derive(Clone, Copy, ValueEnum)]
enum Unwrapper {
    Quality, Dct
}

#[derive(Parser)]
struct Args {
    /// Hologram to reconstruct (.npy array or grayscale image)
    hologram: PathBuf,

    #[arg(short = 'z', long = "distance", required = true, num_args = 1.., allow_negative_numbers = true)]
    /// Propagation distance(s) in metres
    distances: Vec<f64>,

    #[arg(short, long, default_value_t = 405e-9)]
    /// Laser wavelength in metres
    wavelength: f64,

    #[arg(long, default_value_t = 3.45e-6)]
    /// Unbinned pixel width in x, metres
    dx: f64,

    #[arg(long, default_value_t = 3.45e-6)]
    /// Unbinned pixel width in y, metres
    dy: f64,

    #[arg(short, long, default_value_t = 1)]
    /// Average blocks of this many pixels before reconstructing
    rebin: usize,

    #[arg(long, default_value_t = 0.1)]
    /// Fraction of the spectrum ignored at each edge when finding the sideband
    edge_margin: f64,

    #[arg(long, default_value_t = 3)]
    /// Spacing of rows/columns considered for the background fit
    background_interval: usize,

    #[arg(long, default_value_t = 100)]
    /// Number of background rows and columns used for the fit
    background_count: usize,

    #[arg(long, default_value_t = 150.)]
    /// Sideband mask radius in unbinned spectrum pixels
    mask_radius: f64,

    #[arg(long, default_value_t = 3)]
    /// Order of the aberration polynomials
    order: usize,

    #[arg(long, default_value_t = 0)]
    /// Extra residual fits of the aberration polynomials
    refine: usize,

    #[arg(long, default_value_t = 42)]
    /// Seed for phase unwrapping
    seed: u64,

    #[arg(long, value_enum, value_name = "METHOD", default_value_t = Unwrapper::Quality)]
    /// Method to use for unwrapping phases
    unwrap_method: Unwrapper,

    #[arg(long, default_value_t = 10)]
    /// Picard iterations of the weighted DCT unwrapper
    picard_iterations: usize,

    #[arg(long)]
    /// Use atan2 rather than atan(im/re) for the wrapped phase
    four_quadrant: bool,

    #[arg(long)]
    /// Score background rows by absolute rather than signed differences
    absolute_roughness: bool,

    #[arg(short, long, value_name = "DIR", default_value = ".")]
    /// Directory for the output arrays
    output: PathBuf,

    #[arg(long)]
    /// Skip writing intensity arrays
    no_intensity: bool,

    #[arg(long)]
    /// Skip writing phase arrays
    no_phase: bool,

    #[arg(long)]
    /// Also write the real and imaginary parts of the reference wave
    save_reference: bool
}

impl Args {
    fn hologram_params(&self) -> HologramParams {
        HologramParams {
            wavelength: self.wavelength,
            dx: self.dx,
            dy: self.dy,
            detector_edge_margin: self.edge_margin,
            background_interval: self.background_interval,
            rebin_factor: self.rebin
        }
    }

    fn reconstruction_params(&self) -> ReconstructionParams {
        ReconstructionParams {
            mask_radius: self.mask_radius,
            polynomial_order: self.order,
            background_count: self.background_count,
            refinement_iterations: self.refine,
            seed: self.seed,
            arctan: if self.four_quadrant { ArctanMode::FourQuadrant } else { ArctanMode::HalfPeriod },
            roughness: if self.absolute_roughness { RoughnessMetric::Absolute } else { RoughnessMetric::Signed },
            unwrap_method: match self.unwrap_method {
                Unwrapper::Quality => UnwrapMethod::QualityGuided,
                Unwrapper::Dct => UnwrapMethod::Dct { iterations: self.picard_iterations }
            },
            ..Default::default()
        }
    }
}



fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.no_intensity && args.no_phase && !args.save_reference {
        eprintln!("No outputs requested. Exiting.");
        return Ok(());
    }

    let hologram = Hologram::open(&args.hologram, args.hologram_params())
        .with_context(|| format!("loading {}", args.hologram.display()))?;

    info!(n = hologram.n(), "loaded hologram");

    let engine = ReconstructionEngine::new(hologram, args.reconstruction_params())?;
    let stem = args.hologram.file_stem().map_or("hologram".into(), |s| s.to_string_lossy().into_owned());

    std::fs::create_dir_all(&args.output)?;

    let (tx, rx) = flume::unbounded::<usize>();
    let template = "{msg} ({elapsed}) [{wide_bar:.cyan/blue}] {pos}/{len} distances ({eta})";
    let bar = ProgressBar::new(args.distances.len() as u64);
    let bar_clone = bar.clone();

    bar.set_style(ProgressStyle::with_template(template)?.progress_chars("#>-"));
    bar.set_message("Reconstructing");

    let handle = thread::spawn(move || {
        for _ in rx.iter() {
            bar_clone.inc(1);
        }
    });

    let write_outputs = |i: usize, z: f64| {
        let wavefield = engine.reconstruct(z, None)
            .with_context(|| format!("reconstructing at {z} m"))?;
        let prefix = args.output.join(format!("{stem}_z{i}"));

        if !args.no_intensity {
            write_npy(&with_suffix(&prefix, "intensity"), wavefield.intensity())?;
        }

        if !args.no_phase {
            write_npy(&with_suffix(&prefix, "phase"), wavefield.phase()?)?;
        }

        anyhow::Ok(())
    };

    // The first distance fixes the reference wave the others reuse, so it
    // runs alone to keep outputs independent of scheduling
    let result = write_outputs(0, args.distances[0]).and_then(|_| {
        tx.send(0).ok();

        args.distances[1..].par_iter().enumerate().try_for_each_with(tx, |tx, (i, &z)| {
            write_outputs(i+1, z)?;
            tx.send(i+1).ok();
            anyhow::Ok(())
        })
    });

    handle.join().map_err(|_| anyhow::anyhow!("progress thread panicked"))?;
    bar.finish();
    result?;

    if args.save_reference {
        if let Some(reference) = engine.reference_wave() {
            let prefix = args.output.join(format!("{stem}_reference"));

            write_npy(&with_suffix(&prefix, "re"), reference.mapv(|v| v.re).view())?;
            write_npy(&with_suffix(&prefix, "im"), reference.mapv(|v| v.im).view())?;
        }
    }

    Ok(())
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!("_{suffix}.npy"));
    PathBuf::from(name)
}

fn write_npy(path: &Path, arr: ndarray::ArrayView2<f64>) -> anyhow::Result<()> {
    arr.write_npy(File::create(path)?)
        .with_context(|| format!("writing {}", path.display()))
}
