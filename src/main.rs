use clap::{Parser, Subcommand};
use exact_image::config::{self, Config, DEFAULT_CONFIG_FILE};
use exact_image::convert::{self, ConvertPlan, CropArea};
use exact_image::imaging::{Color, Optimize2Bw, Quality, ScaleFilter};
use exact_image::output::{self, EmptyPageResult, ImageInfo};
use exact_image::logging;
use rayon::prelude::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "exact-image")]
#[command(about = "Decode, inspect, edit and encode raster images")]
#[command(long_about = "\
Decode, inspect, edit and encode raster images

Formats: jpeg, png, tiff, webp, bmp, gif, pnm. Resolution (DPI) is read
from and written to JPEG, PNG and TIFF files.

Run 'exact-image gen-config' to generate a documented exact-image.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./exact-image.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print size, resolution and layout of image files
    Identify {
        /// Format string with %w %h %x %y %z %q %i %d %f %e %t %P %% and \n \t
        #[arg(short, long)]
        format: Option<String>,
        /// Print a JSON array instead of text
        #[arg(long, conflicts_with = "format")]
        json: bool,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Apply edits to an image and write it in another format
    Convert(ConvertArgs),
    /// Report whether scanned pages are blank
    EmptyPage {
        /// Dark pixel share (percent of the page) below which a page is empty
        #[arg(short, long, default_value_t = 0.05)]
        percent: f64,
        /// Border to ignore, rounded down to a multiple of 8
        #[arg(short, long, default_value_t = 16)]
        margin: u32,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print a stock exact-image.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct ConvertArgs {
    #[arg(short, long)]
    input: PathBuf,
    /// Output file; the extension picks the codec
    #[arg(short, long)]
    output: PathBuf,
    /// Target colour space (gray1, gray8, rgb8, rgba16, bilevel, ...)
    #[arg(long)]
    colorspace: Option<String>,
    /// Luma threshold used when converting to gray1
    #[arg(long, default_value_t = exact_image::imaging::DEFAULT_THRESHOLD)]
    threshold: u8,
    /// x,y,width,height
    #[arg(long, value_parser = convert::parse_crop)]
    crop: Option<CropArea>,
    /// Trim uniform rows off the bottom
    #[arg(long)]
    fast_auto_crop: bool,
    /// Resample to WIDTHxHEIGHT
    #[arg(long, value_parser = convert::parse_size)]
    size: Option<(u32, u32)>,
    #[arg(long, group = "scaling")]
    scale: Option<f64>,
    #[arg(long, group = "scaling")]
    nearest_scale: Option<f64>,
    #[arg(long, group = "scaling")]
    box_scale: Option<f64>,
    #[arg(long, group = "scaling")]
    bilinear_scale: Option<f64>,
    #[arg(long, group = "scaling")]
    thumbnail: Option<f64>,
    /// Degrees clockwise
    #[arg(long, allow_negative_numbers = true)]
    rotate: Option<f64>,
    /// Mirror top to bottom
    #[arg(long)]
    flip: bool,
    /// Mirror left to right
    #[arg(long)]
    flop: bool,
    #[arg(long)]
    invert: bool,
    #[arg(long)]
    normalize: bool,
    /// -1..1
    #[arg(long, allow_negative_numbers = true)]
    brightness: Option<f64>,
    /// -1..1
    #[arg(long, allow_negative_numbers = true)]
    contrast: Option<f64>,
    #[arg(long)]
    gamma: Option<f64>,
    /// Degrees
    #[arg(long, allow_negative_numbers = true)]
    hue: Option<f64>,
    /// -1..1
    #[arg(long, allow_negative_numbers = true)]
    saturation: Option<f64>,
    /// -1..1
    #[arg(long, allow_negative_numbers = true)]
    lightness: Option<f64>,
    /// Stretch, sharpen and threshold a scan to bi-level
    #[arg(long)]
    optimize2bw: bool,
    /// optimize2bw: level mapped to black (0 = detect)
    #[arg(long, requires = "optimize2bw", default_value_t = Optimize2Bw::default().low)]
    bw_low: u8,
    /// optimize2bw: level mapped to white (0 = detect)
    #[arg(long, requires = "optimize2bw", default_value_t = Optimize2Bw::default().high)]
    bw_high: u8,
    /// optimize2bw: threshold for the final bi-level step
    #[arg(long, requires = "optimize2bw", default_value_t = Optimize2Bw::default().threshold)]
    bw_threshold: u8,
    /// optimize2bw: unsharp mask radius (0 = no sharpening)
    #[arg(long, requires = "optimize2bw", default_value_t = Optimize2Bw::default().radius)]
    bw_radius: u32,
    /// optimize2bw: unsharp mask standard deviation
    #[arg(long, requires = "optimize2bw", default_value_t = Optimize2Bw::default().sd)]
    bw_sd: f64,
    /// optimize2bw: rescale to this DPI before thresholding (0 = keep)
    #[arg(long, requires = "optimize2bw", default_value_t = Optimize2Bw::default().target_dpi)]
    bw_dpi: u32,
    /// XRESxYRES or a single value for both
    #[arg(long, value_parser = convert::parse_resolution)]
    resolution: Option<(u32, u32)>,
    /// Fill colour (#rgb, #rrggbb, #rrggbbaa); default from config
    #[arg(long)]
    background: Option<Color>,
    /// 0-100; default from config
    #[arg(long)]
    quality: Option<u32>,
    /// Codec compression option; default from config
    #[arg(long)]
    compress: Option<String>,
}

impl ConvertArgs {
    fn plan(&self, config: &Config) -> Result<ConvertPlan, config::ConfigError> {
        let scale = [
            (ScaleFilter::Best, self.scale),
            (ScaleFilter::Nearest, self.nearest_scale),
            (ScaleFilter::Box, self.box_scale),
            (ScaleFilter::Bilinear, self.bilinear_scale),
            (ScaleFilter::Thumbnail, self.thumbnail),
        ]
        .into_iter()
        .find_map(|(filter, factor)| factor.map(|f| (filter, f)));

        let background = match self.background {
            Some(color) => color,
            None => config.background()?,
        };

        Ok(ConvertPlan {
            colorspace: self.colorspace.clone(),
            threshold: self.threshold,
            crop: self.crop,
            fast_auto_crop: self.fast_auto_crop,
            size: self.size,
            scale,
            rotate: self.rotate,
            flip: self.flip,
            flop: self.flop,
            invert: self.invert,
            normalize: self.normalize,
            brightness: self.brightness,
            contrast: self.contrast,
            gamma: self.gamma,
            hue: self.hue,
            saturation: self.saturation,
            lightness: self.lightness,
            optimize_2bw: self.optimize2bw.then_some(Optimize2Bw {
                low: self.bw_low,
                high: self.bw_high,
                threshold: self.bw_threshold,
                radius: self.bw_radius,
                sd: self.bw_sd,
                target_dpi: self.bw_dpi,
            }),
            resolution: self.resolution,
            background: Some(background),
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) if !path.exists() => {
            return Err(format!("config file {} not found", path.display()).into());
        }
        Some(path) => path.clone(),
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    };
    let config = config::load_config(&config_path)?;
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    match cli.command {
        Command::Identify {
            format,
            json,
            files,
        } => {
            init_thread_pool(&config.processing);
            let results: Vec<(String, exact_image::Result<ImageInfo>)> = files
                .par_iter()
                .map(|path| (path.display().to_string(), ImageInfo::load(path)))
                .collect();
            for (path, result) in &results {
                if let Err(e) = result {
                    tracing::warn!(path = %path, error = %e, "identify failed");
                }
            }
            output::print_identify(&results, format.as_deref(), json);
            let failures = results.iter().filter(|(_, r)| r.is_err()).count();
            if failures > 0 {
                return Err(format!("{failures} file(s) could not be identified").into());
            }
        }
        Command::Convert(args) => {
            let plan = args.plan(&config)?;
            let quality = args
                .quality
                .map(Quality::new)
                .unwrap_or_else(|| config.quality());
            let compression = args
                .compress
                .clone()
                .unwrap_or_else(|| config.encode.compression.clone());
            convert::run(&args.input, &args.output, &plan, quality, &compression)?;
        }
        Command::EmptyPage {
            percent,
            margin,
            files,
        } => {
            init_thread_pool(&config.processing);
            let results: Vec<(String, exact_image::Result<EmptyPageResult>)> = files
                .par_iter()
                .map(|path| {
                    (
                        path.display().to_string(),
                        EmptyPageResult::check(path, percent, margin),
                    )
                })
                .collect();
            for (path, result) in &results {
                if let Err(e) = result {
                    tracing::warn!(path = %path, error = %e, "empty-page check failed");
                }
            }
            output::print_empty_pages(&results);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
