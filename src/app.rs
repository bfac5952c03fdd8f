use crate::{
    cli::Args,
    dreamer::{Collaborator, Dreamer, PythonBridge},
    request::RenderRequest,
};
use anyhow::{Result, bail};
use comfy_table::{Table, presets::UTF8_FULL};
use std::path::PathBuf;
use tracing::debug;

pub fn run(args: Args) -> Result<()> {
    let bridge = PythonBridge::new(args.python.clone(), args.debug);

    // Handle --check-python command
    if args.check_python {
        return handle_python_check(&bridge);
    }

    // Handle --list-styles command
    if args.list_styles {
        return handle_list_styles(&bridge);
    }

    build_and_run(&args, &bridge)
}

/// Validates the request, then constructs the dreamer and renders exactly once.
pub fn build_and_run<C: Collaborator>(args: &Args, collaborator: &C) -> Result<()> {
    let request = RenderRequest::from_args(args)?;
    debug!("render request: {:?}", request);

    println!("\n▶️ Render Plan:");
    println!("{}", plan_table(&request));

    if let Some(write_request) = &args.write_request {
        let out_path = match write_request {
            Some(path) => PathBuf::from(path),
            None => request.default_request_path(),
        };
        request.save(&out_path)?;
        println!("✅ Wrote render request to {}", out_path.display());
    }

    if args.dry_run {
        println!("\n--dry-run flag provided, nothing was rendered.");
        return Ok(());
    }

    println!("\nℹ️ Loading style '{}'...", request.style());
    let mut dreamer = collaborator.construct(request.song_path(), request.style())?;

    println!("ℹ️ Rendering video, this can take a while...");
    dreamer.hallucinate(&request.params())?;

    println!("✅ Rendering complete! Output: {}", request.output_path());
    Ok(())
}

fn plan_table(request: &RenderRequest) -> Table {
    let or_default = |value: Option<String>, fallback: &str| {
        value.unwrap_or_else(|| fallback.to_string())
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Parameter", "Value"]);
    table
        .add_row(vec!["Song", &request.song_path().display().to_string()])
        .add_row(vec!["Style", request.style()])
        .add_row(vec!["Output File", request.output_path()])
        .add_row(vec!["Start", &format!("{:.3} s", request.start_seconds())])
        .add_row(vec![
            "Duration",
            &or_default(
                request.duration_seconds().map(|d| format!("{:.3} s", d)),
                "full track",
            ),
        ])
        .add_row(vec!["FPS", &request.frame_rate().to_string()])
        .add_row(vec![
            "Resolution",
            &or_default(
                request.resolution().map(|r| format!("{0}x{0}", r)),
                "style default",
            ),
        ])
        .add_row(vec!["Speed", &format!("{} fpm", request.speed())])
        .add_row(vec!["Batch Size", &request.batch_size().to_string()])
        .add_row(vec!["Truncation", &request.truncation().to_string()])
        .add_row(vec![
            "Motion Randomness",
            &request.motion_randomness().to_string(),
        ]);
    table
}

fn handle_python_check(bridge: &PythonBridge) -> Result<()> {
    println!("🔍 Checking Python installation ({})...\n", bridge.interpreter);

    let check_result = bridge.check_installation();

    if check_result.python_available {
        if let Some(version_info) = &check_result.python_version {
            println!("✅ Python found:");
            println!(
                "   Version: {}.{}.{}",
                version_info.major, version_info.minor, version_info.patch
            );

            if version_info.is_compatible {
                println!("   Status: ✅ Compatible (minimum required: 3.7)");
            } else {
                println!("   Status: ❌ Too old (minimum required: 3.7)");
            }
        } else {
            println!("⚠️  Could not parse Python version from output");
        }
    } else {
        println!("❌ Python not found");
        println!("   Install Python 3 or point --python at an interpreter");
        bail!(
            "Python is required but not available: {}",
            check_result.error.unwrap_or_default()
        );
    }

    println!();

    if check_result.lucidsonicdreams_available {
        println!("✅ Package 'lucidsonicdreams' is importable");
    } else {
        println!("❌ Package 'lucidsonicdreams' not found");
        println!("   Install it with: {} -m pip install lucidsonicdreams", bridge.interpreter);
        bail!("lucidsonicdreams is required but not installed");
    }

    println!("\n🎉 Python check complete!");
    Ok(())
}

fn handle_list_styles(bridge: &PythonBridge) -> Result<()> {
    println!("🔍 Fetching bundled styles...\n");
    let styles = bridge.list_styles()?;
    println!("{}", styles.trim_end());
    println!("\n💡 Pass a style name (or a local .pkl file) with --style.");
    Ok(())
}
