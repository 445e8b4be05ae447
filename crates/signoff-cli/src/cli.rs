use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use signoff_ink::{BackgroundPolicy, PixelBuffer, Rgb};
use signoff_model::{SheetLayout, SignatureDisplay};
use signoff_session::{SessionConfig, SessionContext};
use signoff_xlsx::{load_roster, MergeOptions};

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "signoff",
    about = "Collect hand-drawn signatures for a grade workbook and merge them back in."
)]
struct Cli {
    /// Output format for reports.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the cleaned roster of a grade workbook.
    Inspect(InspectArgs),
    /// Render a signature image and store it for a student.
    Sign(SignArgs),
    /// Merge every stored signature into the workbook.
    Merge(MergeArgs),
}

#[derive(Args)]
struct LayoutArgs {
    /// 1-based sheet row holding the column titles.
    #[arg(long, default_value_t = 12)]
    header_row: u32,

    /// Header title of the column that names each student.
    #[arg(long, default_value = "Name")]
    identity_column: String,
}

impl LayoutArgs {
    fn layout(&self) -> SheetLayout {
        SheetLayout::new(self.header_row, self.identity_column.clone())
    }
}

#[derive(Args)]
struct StoreArgs {
    /// Directory holding one `{identity}_sign.png` per student.
    #[arg(long, default_value = "signatures")]
    signatures_dir: PathBuf,
}

#[derive(Args)]
struct InspectArgs {
    /// Grade workbook (.xlsx).
    workbook: PathBuf,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args)]
struct SignArgs {
    /// Grade workbook (.xlsx).
    workbook: PathBuf,

    /// Student to sign for; must be present in the roster.
    #[arg(long)]
    identity: String,

    /// PNG image of the drawn signature.
    #[arg(long)]
    image: PathBuf,

    /// Background color to key to transparent, as `white` or `R,G,B`.
    /// Without this the image's own alpha is kept.
    #[arg(long, value_name = "COLOR")]
    key_background: Option<String>,

    #[command(flatten)]
    layout: LayoutArgs,

    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args)]
struct MergeArgs {
    /// Grade workbook (.xlsx).
    workbook: PathBuf,

    /// Where to write the merged workbook (default: `signed_grades.xlsx`).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Header title of the column that receives the images.
    #[arg(long, default_value = "Remarks")]
    remarks_label: String,

    /// Displayed image width in pixels.
    #[arg(long, default_value_t = 30)]
    image_width: u32,

    /// Displayed image height in pixels.
    #[arg(long, default_value_t = 17)]
    image_height: u32,

    /// Row height (points) applied to signed rows.
    #[arg(long, default_value_t = 15.0)]
    row_height: f64,

    #[command(flatten)]
    layout: LayoutArgs,

    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Debug, Serialize)]
struct InspectReport<'a> {
    workbook: String,
    header_row: u32,
    identity_column: &'a str,
    rows: usize,
    columns: Vec<&'a str>,
    students: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct SignReport<'a> {
    workbook: String,
    identity: &'a str,
    stored_path: String,
    signed_count: usize,
}

#[derive(Debug, Serialize)]
struct MergeReport<'a> {
    workbook: String,
    output: String,
    signed: Vec<&'a str>,
    skipped: Vec<&'a str>,
    bytes: usize,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Command::Inspect(args) => inspect(args, &cli.format),
        Command::Sign(args) => sign(args, &cli.format),
        Command::Merge(args) => merge(args, &cli.format),
    }
}

fn inspect(args: &InspectArgs, format: &OutputFormat) -> Result<()> {
    let bytes = std::fs::read(&args.workbook)
        .with_context(|| format!("read workbook {}", args.workbook.display()))?;
    let layout = args.layout.layout();
    let roster = load_roster(&bytes, &layout)
        .with_context(|| format!("load roster from {}", args.workbook.display()))?;

    let report = InspectReport {
        workbook: args.workbook.display().to_string(),
        header_row: layout.header_row,
        identity_column: &layout.identity_column,
        rows: roster.rows().len(),
        columns: roster.columns().iter().map(|c| c.title.as_str()).collect(),
        students: roster.identities(),
    };

    match format {
        OutputFormat::Text => {
            println!("Roster of {}", report.workbook);
            println!("  header row: {}", report.header_row);
            println!("  columns: {}", report.columns.join(", "));
            println!("  students ({}):", report.students.len());
            for student in &report.students {
                println!("    {student}");
            }
            Ok(())
        }
        OutputFormat::Json => write_json(&report),
    }
}

fn sign(args: &SignArgs, format: &OutputFormat) -> Result<()> {
    let background = parse_background(args.key_background.as_deref())?;
    let mut session = SessionContext::new(SessionConfig {
        layout: args.layout.layout(),
        background,
        signatures_dir: args.store.signatures_dir.clone(),
        ..SessionConfig::default()
    })?;

    let bytes = std::fs::read(&args.workbook)
        .with_context(|| format!("read workbook {}", args.workbook.display()))?;
    session
        .upload(bytes)
        .with_context(|| format!("load roster from {}", args.workbook.display()))?;

    let roster = session
        .roster()
        .context("workbook has no roster after upload")?;
    if !roster.identities().contains(&args.identity.as_str()) {
        anyhow::bail!(
            "{:?} is not in the roster of {}",
            args.identity,
            args.workbook.display()
        );
    }

    let image = std::fs::read(&args.image)
        .with_context(|| format!("read signature image {}", args.image.display()))?;
    let buffer = PixelBuffer::from_png(&image)
        .with_context(|| format!("decode signature image {}", args.image.display()))?;
    let stored = session
        .capture(&args.identity, &buffer)
        .with_context(|| format!("capture signature for {:?}", args.identity))?;
    session.restore_signatures()?;

    let report = SignReport {
        workbook: args.workbook.display().to_string(),
        identity: &args.identity,
        stored_path: stored.display().to_string(),
        signed_count: session.signed_count(),
    };

    match format {
        OutputFormat::Text => {
            println!("Stored signature for {} at {}", report.identity, report.stored_path);
            println!("Signatures on file: {}", report.signed_count);
            Ok(())
        }
        OutputFormat::Json => write_json(&report),
    }
}

fn merge(args: &MergeArgs, format: &OutputFormat) -> Result<()> {
    let mut session = SessionContext::new(SessionConfig {
        layout: args.layout.layout(),
        merge: MergeOptions {
            remarks_label: args.remarks_label.clone(),
            display: SignatureDisplay {
                width_px: args.image_width,
                height_px: args.image_height,
                row_height: args.row_height,
            },
        },
        signatures_dir: args.store.signatures_dir.clone(),
        ..SessionConfig::default()
    })?;

    let bytes = std::fs::read(&args.workbook)
        .with_context(|| format!("read workbook {}", args.workbook.display()))?;
    session
        .upload(bytes)
        .with_context(|| format!("load roster from {}", args.workbook.display()))?;
    session
        .restore_signatures()
        .with_context(|| format!("scan {}", args.store.signatures_dir.display()))?;

    let artifact = session.merge().context("merge signatures")?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(artifact.file_name()));
    std::fs::write(&output, artifact.bytes())
        .with_context(|| format!("write merged workbook {}", output.display()))?;

    let roster = session
        .roster()
        .context("workbook has no roster after upload")?;
    let known = roster.identities();
    let mut signed = Vec::new();
    let mut skipped = Vec::new();
    for (identity, _) in session.signatures() {
        if known.contains(&identity) {
            signed.push(identity);
        } else {
            skipped.push(identity);
        }
    }

    let report = MergeReport {
        workbook: args.workbook.display().to_string(),
        output: output.display().to_string(),
        signed,
        skipped,
        bytes: session
            .last_merge()
            .map(|artifact| artifact.bytes().len())
            .unwrap_or(0),
    };

    match format {
        OutputFormat::Text => {
            println!("Wrote {} ({} bytes)", report.output, report.bytes);
            println!("  signed: {}", join_or_none(&report.signed));
            if !report.skipped.is_empty() {
                println!("  skipped (not in roster): {}", report.skipped.join(", "));
            }
            Ok(())
        }
        OutputFormat::Json => write_json(&report),
    }
}

fn join_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn parse_background(input: Option<&str>) -> Result<BackgroundPolicy> {
    let Some(input) = input else {
        return Ok(BackgroundPolicy::Keep);
    };
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("white") {
        return Ok(BackgroundPolicy::KeyOut(Rgb::WHITE));
    }
    let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        anyhow::bail!("invalid --key-background '{input}' (expected: white or R,G,B)");
    }
    let channel = |s: &str| -> Result<u8> {
        s.parse::<u8>()
            .with_context(|| format!("invalid color channel '{s}' in --key-background"))
    };
    Ok(BackgroundPolicy::KeyOut(Rgb::new(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
    )))
}

fn write_json<T: Serialize>(report: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer(&mut handle, report)?;
    handle.write_all(b"\n")?;
    Ok(())
}
