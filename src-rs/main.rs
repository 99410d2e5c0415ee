use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use image::RgbaImage;
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use design_audit::config::out_root;
use design_audit::overlay::{render_defect_overlay, render_region_overlay};
use design_audit::raster::{load_raster, save_png};
use design_audit::report::write_json_pretty;
use design_audit::{
    compare_images, locate, locate_all, run_validation, validate_css, AuditConfig, DesignData,
    SnapshotPage, ValidationInputs, ValidationReport,
};

#[derive(Parser, Debug)]
#[command(
    name = "design-audit",
    version,
    about = "Compare a design reference against a rendered page and report located defects"
)]
struct Cli {
    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print supported commands in JSON
    Commands,
    /// Pixel-diff a design image against a live screenshot and cluster the changes
    Diff(DiffArgs),
    /// Audit computed styles from a page snapshot, optionally against design layers
    Audit(AuditArgs),
    /// Resolve defect locations in a saved report into overlay rectangles
    Locate(LocateArgs),
    /// Full run: diff, audit and report
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Default)]
struct TuningArgs {
    /// Pixel comparison threshold in [0, 1]
    #[arg(long)]
    threshold: Option<f64>,
    /// Grid cell size for clustering mismatches
    #[arg(long)]
    region_size: Option<u32>,
    /// Wait budget for each design element lookup, in milliseconds
    #[arg(long)]
    lookup_timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Design reference image
    design: PathBuf,
    /// Live page screenshot
    live: PathBuf,
    #[command(flatten)]
    tuning: TuningArgs,
    /// Path to write the diff raster (PNG)
    #[arg(long)]
    diff_out: Option<PathBuf>,
    /// Path to write the live screenshot with region outlines
    #[arg(long)]
    annotated_out: Option<PathBuf>,
    /// Path to write the JSON result
    #[arg(long)]
    json_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AuditArgs {
    /// Page snapshot JSON captured from the live page
    #[arg(long)]
    page: PathBuf,
    /// Design screen JSON ({screen, layers})
    #[arg(long)]
    design: Option<PathBuf>,
    #[command(flatten)]
    tuning: TuningArgs,
    /// Path to write the JSON result
    #[arg(long)]
    json_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct LocateArgs {
    /// Saved validation report JSON
    report: PathBuf,
    /// Locate one defect by index; omit to locate every defect with geometry
    #[arg(long)]
    index: Option<usize>,
    /// Screenshot to draw the overlay on
    #[arg(long, requires = "overlay_out")]
    image: Option<PathBuf>,
    /// Path to write the overlay PNG
    #[arg(long, requires = "image")]
    overlay_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[arg(long)]
    design_image: PathBuf,
    #[arg(long)]
    live_image: PathBuf,
    /// Page snapshot JSON captured from the live page
    #[arg(long)]
    page: PathBuf,
    /// Design screen JSON ({screen, layers})
    #[arg(long)]
    design: PathBuf,
    /// Run directory (default: <DESIGN_AUDIT_OUT_DIR>/runs/<timestamp>)
    #[arg(long)]
    out_dir: Option<PathBuf>,
    #[command(flatten)]
    tuning: TuningArgs,
    /// Skip writing the annotated live screenshot
    #[arg(long, action = ArgAction::SetTrue)]
    no_annotated: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Commands => print_commands(),
        Commands::Diff(args) => command_diff(args),
        Commands::Audit(args) => command_audit(args),
        Commands::Locate(args) => command_locate(args),
        Commands::Validate(args) => command_validate(args),
    }
}

fn init_logging(level: &str) -> Result<()> {
    let level: tracing::Level = level.parse().context("invalid log level")?;
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn print_commands() -> Result<()> {
    let rows = vec![
        json!({
            "name": "diff",
            "description": "Pixel-diff design vs live screenshot and cluster mismatched regions."
        }),
        json!({
            "name": "audit",
            "description": "Audit computed styles from a page snapshot against design layers."
        }),
        json!({
            "name": "locate",
            "description": "Resolve report defect locations into padded overlay rectangles."
        }),
        json!({
            "name": "validate",
            "description": "Run diff + audit and write a report with diff and overlay images."
        }),
    ];

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "commands": rows }))?
    );
    Ok(())
}

fn resolve_config(tuning: &TuningArgs) -> AuditConfig {
    let mut config = AuditConfig::from_env();
    if let Some(threshold) = tuning.threshold {
        config.threshold = threshold;
    }
    if let Some(size) = tuning.region_size {
        config.region_size = size;
    }
    if let Some(ms) = tuning.lookup_timeout_ms {
        config.lookup_timeout = Duration::from_millis(ms);
    }
    config.normalized()
}

fn command_diff(args: DiffArgs) -> Result<()> {
    let config = resolve_config(&args.tuning);
    let design = load_raster(&args.design)
        .with_context(|| format!("failed to open design image: {}", args.design.display()))?;
    let live = load_raster(&args.live)
        .with_context(|| format!("failed to open live image: {}", args.live.display()))?;

    let result = compare_images(&design, &live, config.threshold, config.region_size);

    if let Some(path) = &args.diff_out {
        save_png(&result.diff_raster, path)?;
    }
    if let Some(path) = &args.annotated_out {
        save_png(&render_region_overlay(&live, &result.regions), path)?;
    }

    let payload = json!({
        "design": abs_path(&args.design).display().to_string(),
        "live": abs_path(&args.live).display().to_string(),
        "diff_image": args.diff_out.as_deref().map(|p| abs_path(p).display().to_string()),
        "annotated_image": args.annotated_out.as_deref().map(|p| abs_path(p).display().to_string()),
        "threshold": config.threshold,
        "region_size": config.region_size,
        "size": {"width": result.width, "height": result.height},
        "mismatch_count": result.mismatch_count,
        "regions": result.regions,
        "region_count": result.regions.len(),
    });

    emit(&payload, args.json_out.as_deref())
}

fn command_audit(args: AuditArgs) -> Result<()> {
    let config = resolve_config(&args.tuning);
    let page = SnapshotPage::load(&args.page)?;
    let design = match &args.design {
        Some(path) => DesignData::load(path)?,
        None => DesignData::default(),
    };

    let outcome = validate_css(&page, &design, &config);

    let payload = json!({
        "page": abs_path(&args.page).display().to_string(),
        "css_mismatch_count": outcome.defects.len(),
        "css_mismatches": outcome.defects,
        "element_inventory": outcome.inventory,
    });

    emit(&payload, args.json_out.as_deref())
}

fn command_locate(args: LocateArgs) -> Result<()> {
    let report = ValidationReport::load(&args.report)?;
    let defects = &report.css_mismatches;

    let payload = match args.index {
        Some(idx) => {
            let Some(defect) = defects.get(idx) else {
                bail!(
                    "defect index {idx} out of range (report has {} defects)",
                    defects.len()
                );
            };
            let overlay = locate(defect);
            if let (Some(image), Some(out)) = (&args.image, &args.overlay_out) {
                let located = design_audit::LocatedDefect {
                    idx,
                    defect: defect.clone(),
                    overlay: overlay.clone(),
                };
                draw_overlay(image, out, &[located])?;
            }
            json!({
                "idx": idx,
                "defect": defect,
                "overlay": overlay,
            })
        }
        None => {
            let located = locate_all(defects);
            if let (Some(image), Some(out)) = (&args.image, &args.overlay_out) {
                draw_overlay(image, out, &located)?;
            }
            json!({
                "defect_count": defects.len(),
                "located_count": located.len(),
                "defects_with_coords": located,
            })
        }
    };

    emit(&payload, None)
}

fn draw_overlay(image: &Path, out: &Path, located: &[design_audit::LocatedDefect]) -> Result<()> {
    let base = load_raster(image)
        .with_context(|| format!("failed to open screenshot: {}", image.display()))?;
    save_png(&render_defect_overlay(&base, located), out)?;
    Ok(())
}

fn command_validate(args: ValidateArgs) -> Result<()> {
    let live = preflight_inputs(&args)?;

    let config = resolve_config(&args.tuning);
    let page = SnapshotPage::load(&args.page)?;
    let design = DesignData::load(&args.design)?;

    let run_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| out_root().join("runs").join(timestamp_compact()));
    let report_path = run_dir.join("report.json");
    let diff_path = run_dir.join("diff.png");
    let annotated_path = run_dir.join("annotated.png");

    let run = run_validation(
        ValidationInputs {
            design_image: &args.design_image,
            live_image: &args.live_image,
            design: &design,
            page: &page,
            capture: page.capture_stats(),
        },
        &config,
    );

    save_png(&run.diff_raster, &diff_path)?;
    run.report.save(&report_path)?;

    let mut annotated: Value = Value::Null;
    if !args.no_annotated {
        let located = locate_all(&run.report.css_mismatches);
        let with_regions = render_region_overlay(&live, &run.report.mismatch_regions);
        save_png(
            &render_defect_overlay(&with_regions, &located),
            &annotated_path,
        )?;
        annotated = json!(abs_path(&annotated_path).display().to_string());
    }

    let payload = json!({
        "status": run.report.status,
        "report": abs_path(&report_path).display().to_string(),
        "diff_image": abs_path(&diff_path).display().to_string(),
        "annotated_image": annotated,
        "pixel_mismatch_count": run.report.pixel_mismatch_count,
        "css_mismatch_count": run.report.css_mismatch_count,
        "js_error_count": run.report.js_error_count,
        "region_count": run.report.mismatch_regions.len(),
    });

    emit(&payload, None)
}

/// Refuse to start a run on missing or undecodable inputs. Returns the live
/// screenshot for the annotated output.
fn preflight_inputs(args: &ValidateArgs) -> Result<RgbaImage> {
    for (label, path) in [
        ("design image", &args.design_image),
        ("live image", &args.live_image),
        ("page snapshot", &args.page),
        ("design JSON", &args.design),
    ] {
        if !path.exists() {
            bail!("{label} not found: {}", path.display());
        }
    }
    load_raster(&args.design_image).with_context(|| {
        format!(
            "failed to open design image: {}",
            args.design_image.display()
        )
    })?;
    load_raster(&args.live_image)
        .with_context(|| format!("failed to open live image: {}", args.live_image.display()))
}

fn emit(payload: &Value, json_out: Option<&Path>) -> Result<()> {
    if let Some(path) = json_out {
        write_json_pretty(path, payload)?;
    }
    println!("{}", serde_json::to_string(payload)?);
    Ok(())
}

fn abs_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

fn timestamp_compact() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}
