use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_STYLE: &str = "abstract photos";
pub const DEFAULT_OUTPUT: &str = "lucid-sonic-dreams.mp4";

/// Create a Lucid Sonic Dreams video from an audio file
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Path to the input audio file (e.g., mp3, wav)
    #[arg(long, required_unless_present_any = ["check_python", "list_styles"])]
    pub song: Option<PathBuf>,

    /// Name of a bundled style (see --list-styles) or a local .pkl weight file
    #[arg(long, default_value = DEFAULT_STYLE)]
    pub style: String,

    /// Output video filename (mp4)
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: String,

    /// Start time within the song, in seconds
    #[arg(long, value_parser = finite_float, default_value = "0.0", allow_negative_numbers = true)]
    pub start: f64,

    /// How many seconds of audio to render. Defaults to the full track.
    #[arg(long, value_parser = positive_float, allow_negative_numbers = true)]
    pub duration: Option<f64>,

    /// Frames per second for the video (fractional values are truncated)
    #[arg(long, value_parser = positive_float, default_value = "43", allow_negative_numbers = true)]
    pub fps: f64,

    /// Square output resolution (e.g., 512 for 512x512)
    #[arg(long, allow_negative_numbers = true)]
    pub resolution: Option<i64>,

    /// Speed factor in frames per minute (fractional values are truncated)
    #[arg(long = "speed-fpm", value_parser = positive_float, default_value = "12", allow_negative_numbers = true)]
    pub speed_fpm: f64,

    /// Number of frames to generate in parallel
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub batch_size: i64,

    /// Truncation psi value for StyleGAN2 sampling (0-1)
    #[arg(long, value_parser = finite_float, default_value = "1.0", allow_negative_numbers = true)]
    pub truncation: f64,

    /// Randomness applied to camera motion (0-1)
    #[arg(long, value_parser = finite_float, default_value = "0.5", allow_negative_numbers = true)]
    pub motion_randomness: f64,

    /// Python interpreter that has the lucidsonicdreams package installed
    #[arg(long, default_value = "python3", value_name = "INTERPRETER")]
    pub python: String,

    /// Show renderer output and debug logs.
    #[arg(short = 'g', long)]
    pub debug: bool,

    /// Check the Python interpreter and the lucidsonicdreams package.
    #[arg(short = 'c', long)]
    pub check_python: bool,

    /// List the bundled styles and exit
    #[arg(long)]
    pub list_styles: bool,

    /// Validate the arguments and print the render plan without rendering
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Write the resolved render request to this file as JSON. If no file is provided, the output file name with a .json extension is used.
    #[arg(short = 'w', long = "write-request", num_args = 0..=1, value_name = "FILE")]
    pub write_request: Option<Option<String>>,
}

/// Rejects `inf` and `nan`, which `f64::from_str` would otherwise accept.
fn finite_float(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|e| format!("invalid number '{}': {}", s, e))?;
    if !value.is_finite() {
        return Err(format!("value must be a finite number, got {}", s));
    }
    Ok(value)
}

fn positive_float(s: &str) -> Result<f64, String> {
    let value = finite_float(s)?;
    if value <= 0.0 {
        return Err(format!("value must be positive, got {}", s));
    }
    Ok(value)
}
