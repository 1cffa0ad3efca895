use argh::FromArgs;
use std::{
    io::Write,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use histeq::compute::{
    list_platforms_devices, ComputeBackend, ComputeError, CpuBackend, ProfilingResolution,
};
use histeq::image::Image;
use histeq::imgproc::{EqualizeConfig, Equalized, Equalizer, PipelineError};
use histeq::io::functional as F;

#[derive(FromArgs, Debug)]
#[argh(help_triggers("-h", "--help", "help"))]
/// Equalize the histogram of a grayscale image
struct Args {
    /// path to the input image
    #[argh(option, short = 'f', default = "PathBuf::from(\"test.pgm\")")]
    input: PathBuf,
    /// the platform to use
    #[argh(option, short = 'p', default = "0")]
    platform: usize,
    /// the device to use
    #[argh(option, short = 'd', default = "0")]
    device: usize,
    /// list all platforms and devices
    #[argh(switch, short = 'l')]
    list: bool,
    /// number of histogram bins, asked on stdin when missing
    #[argh(option, short = 'b')]
    bins: Option<usize>,
    /// path to a json pipeline configuration
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
    /// path to the output image
    #[argh(option, short = 'o', default = "PathBuf::from(\"equalized.png\")")]
    output: PathBuf,
    /// log the images and histograms to a rerun viewer
    #[argh(switch)]
    viz: bool,
}

fn prompt_bins() -> Result<usize, Box<dyn std::error::Error>> {
    print!("Enter a bin number: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    line.trim()
        .parse()
        .map_err(|e| format!("invalid bin number '{}': {e}", line.trim()).into())
}

fn log_to_rerun(input: &Image<u8, 1>, out: &Equalized) -> Result<(), Box<dyn std::error::Error>> {
    let rec = rerun::RecordingStreamBuilder::new("histeq equalize").spawn()?;

    rec.log(
        "input",
        &rerun::Image::from_elements(input.as_slice(), input.size().into(), rerun::ColorModel::L),
    )?;
    rec.log(
        "output",
        &rerun::Image::from_elements(
            out.image.as_slice(),
            out.image.size().into(),
            rerun::ColorModel::L,
        ),
    )?;

    rec.log("histogram", &rerun::BarChart::new(out.histogram.as_slice()))?;
    rec.log("cumulative", &rerun::BarChart::new(out.cumulative.as_slice()))?;
    rec.log("lut", &rerun::BarChart::new(out.lut.as_slice()))?;

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Args = argh::from_env();

    if args.list {
        print!("{}", list_platforms_devices());
    }

    let backend = CpuBackend::new(args.platform, args.device)?;
    println!("Running on {}", backend.device().name);

    let mut config = match &args.config {
        Some(path) => EqualizeConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => EqualizeConfig::default(),
    };
    config.bins = match (args.bins, &args.config) {
        (Some(bins), _) => bins,
        (None, Some(_)) => config.bins,
        (None, None) => prompt_bins()?,
    };

    // read the image
    let image = F::read_image_any_mono8(&args.input)?;
    log::info!("read {} image from {}", image.size(), args.input.display());

    // stop the pipeline at the next stage barrier on Ctrl-C
    let cancel_token = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let cancel_token = cancel_token.clone();
        move || {
            println!("Received Ctrl-C signal. Sending cancel signal !!");
            cancel_token.store(true, Ordering::SeqCst);
        }
    })?;

    let equalizer = Equalizer::new(&backend, config)
        .inspect_err(|e| {
            if let PipelineError::Build(ComputeError::BuildFailed(log)) = e {
                eprintln!("{log}");
            }
        })?
        .with_cancel_flag(cancel_token);

    let out = equalizer.equalize(&image)?;

    println!("Histogram = {:?}", out.histogram);
    println!("Cumulative histogram = {:?}", out.cumulative);
    println!("LUT = {:?}", out.lut);

    for timing in &out.timings {
        println!(
            "{} stage execution time [ns]: {}",
            timing.stage,
            timing.elapsed_ns()
        );
        println!("{}", timing.report(ProfilingResolution::Us));
    }

    F::write_image_mono8(&args.output, &out.image)?;
    println!("Wrote {}", args.output.display());

    if args.viz {
        log_to_rerun(&image, &out)?;
    }

    Ok(())
}
