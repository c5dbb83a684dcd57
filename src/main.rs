//! # Lamina CLI
//!
//! Usage:
//!   lamina report.json -o report.pdf
//!   echo '{ ... }' | lamina --config lab.json
//!   lamina report.json --layout > pages.json
//!   lamina --example > report.json

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use lamina::flow::PageContainer;
use lamina::{ExportConfig, LaminaError, ReportPreview, SessionContext};

#[derive(Parser)]
#[command(name = "lamina", version, about = "Page a pathology report and export it as PDF")]
struct Cli {
    /// Report JSON. Read from stdin when omitted.
    input: Option<PathBuf>,

    /// Output file. Defaults to the configured filename.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Export configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture scale; overrides the configuration.
    #[arg(long)]
    dpr: Option<f64>,

    /// Print the page partition as JSON instead of exporting.
    #[arg(long)]
    layout: bool,

    /// Print a sample report and exit.
    #[arg(long)]
    example: bool,

    /// Branch name for the letterhead.
    #[arg(long)]
    branch: Option<String>,

    /// Signing user for the letterhead.
    #[arg(long)]
    user: Option<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.example {
        print!("{}", example_report_json());
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {}", e);
            if let Some(hint) = e.hint() {
                eprintln!("  hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), LaminaError> {
    let t0 = Instant::now();

    let input = match &cli.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let mut config = match &cli.config {
        Some(path) => ExportConfig::from_file(path)?,
        None => ExportConfig::default(),
    };
    if let Some(dpr) = cli.dpr {
        config.device_pixel_ratio = dpr;
    }
    let session = SessionContext {
        branch_name: cli.branch,
        user_name: cli.user,
        ..Default::default()
    };
    let report = lamina::parse_report(&input)?;
    let t_parse = t0.elapsed();

    let mut preview = ReportPreview::new(config, session);
    let page_count = preview.refresh(&report).len();
    let t_flow = t0.elapsed();

    if cli.layout {
        write_layout(preview.pages(), io::stdout().lock())?;
        return Ok(());
    }

    let Some(doc) = preview.export()? else {
        log::info!("Nothing to export");
        return Ok(());
    };
    let t_export = t0.elapsed();

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(&preview.config().filename));
    fs::write(&output, &doc.bytes)?;

    log::info!(
        "Timing: parse={:.1}ms, flow={:.1}ms, export={:.1}ms, total={:.1}ms ({} pages, {} bytes)",
        t_parse.as_secs_f64() * 1000.0,
        (t_flow - t_parse).as_secs_f64() * 1000.0,
        (t_export - t_flow).as_secs_f64() * 1000.0,
        t0.elapsed().as_secs_f64() * 1000.0,
        page_count,
        doc.bytes.len(),
    );
    eprintln!("✓ Written {} pages to {}", doc.page_count, output.display());
    Ok(())
}

/// Output failures are I/O errors, never input parse errors.
fn write_layout(pages: &[PageContainer], mut out: impl Write) -> Result<(), LaminaError> {
    serde_json::to_writer_pretty(&mut out, pages).map_err(io::Error::from)?;
    writeln!(out)?;
    Ok(())
}

fn example_report_json() -> &'static str {
    r##"{
  "reportType": "Biopsia",
  "base": {
    "patientName": "María Fernanda López",
    "exam": "Biopsia de piel",
    "folio": "B-2024-0187",
    "receptionDate": "2024-03-12",
    "specimen": "Piel de región dorsal, fragmento elíptico",
    "submissionDiagnosis": "Lesión pigmentada, descartar melanoma"
  },
  "sections": {
    "macroscopic": "<p>Se recibe fragmento elíptico de piel de 1.8 x 0.9 x 0.5 cm, con lesión central pigmentada de 0.6 cm.</p><p>Se incluye en su totalidad en 3 cápsulas.</p>",
    "microscopic": "<p>Los cortes muestran piel con <b>proliferación melanocítica</b> de disposición nevoide en la unión dermoepidérmica.</p><ul><li>Sin atipia citológica significativa</li><li>Maduración adecuada en profundidad</li><li>No se observan mitosis</li></ul>",
    "diagnosis": "<p><b>Nevo melanocítico compuesto.</b> Bordes quirúrgicos libres de lesión.</p>",
    "comment": null
  },
  "images": [
    { "url": "https://example.com/img/b-2024-0187-1.jpg", "caption": "HE 4x" },
    { "url": "https://example.com/img/b-2024-0187-2.jpg", "caption": "HE 20x" }
  ]
}
"##
}
