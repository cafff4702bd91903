//! CLI binary for gonogo-client.
//!
//! A thin shim over the library: maps flags to `ClientConfig`, runs one
//! submission through a `Session` and prints the result.

use anyhow::{bail, Context, Result};
use clap::Parser;
use gonogo_client::error::USER_FACING_ERROR;
use gonogo_client::transport::HOST_ENV_VAR;
use gonogo_client::{
    render_text, ClientConfig, ExportOutcome, HostContext, HostSource, Session, WorkflowObserver,
    WorkflowStatus,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Spinner observer ─────────────────────────────────────────────────────────

/// Drives a spinner from workflow events.
struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Analyse");
        Arc::new(Self { bar })
    }
}

impl WorkflowObserver for SpinnerObserver {
    fn on_transition(&self, _from: WorkflowStatus, to: WorkflowStatus) {
        match to {
            WorkflowStatus::Submitting => {
                self.bar.set_message("Traitement du fichier en cours...");
                self.bar.enable_steady_tick(Duration::from_millis(80));
            }
            WorkflowStatus::Succeeded => {
                self.bar.finish_with_message(green("Fichier traité avec succès!"));
            }
            WorkflowStatus::Failed => self.bar.finish_and_clear(),
            WorkflowStatus::Idle | WorkflowStatus::Selecting => {}
        }
    }

    fn on_export_start(&self) {
        self.bar.reset();
        self.bar.set_prefix("Export");
        self.bar.set_message("Téléchargement en cours...");
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_export_complete(&self, path: &Path) {
        self.bar
            .finish_with_message(format!("{} {}", green("✔"), bold(&path.display().to_string())));
    }

    fn on_export_error(&self, _error: &str) {
        self.bar.finish_and_clear();
    }
}

/// The analysis failed; nothing was printed on stdout.
const EXIT_ANALYSIS_FAILED: i32 = 1;
/// The analysis was printed but `--export` could not save the artifact.
const EXIT_EXPORT_FAILED: i32 = 2;

const EXPORT_FAILED_NOTICE: &str =
    "Le téléchargement a échoué. Le résultat de l'analyse ci-dessus reste valable.";

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a tender bundle and print the result
  gonogo dce.zip

  # Analyse and export (resultfinal.pdf or the server document)
  gonogo dce.zip --export -o exports/

  # Against a local development server
  gonogo --host localhost dce.zip

  # Machine-readable output
  gonogo --json dce.zip > result.json

EXIT CODES:
  0  analysis printed (and exported, with --export)
  1  analysis failed
  2  analysis printed, export failed

ENVIRONMENT VARIABLES:
  GONOGO_BASE_URL        Service root, overrides host-based resolution
  GONOGO_HOST            Execution host; `localhost` selects http://localhost:8000/
  GONOGO_OUTPUT_DIR      Directory exported files are written to
  RUST_LOG               Log filter (e.g. gonogo_client=debug)
"#;

/// Submit a tender bundle to the go/no-go analysis service.
#[derive(Parser, Debug)]
#[command(
    name = "gonogo",
    version,
    about = "Submit a tender bundle (ZIP) for go/no-go analysis and export the result",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// ZIP bundle to analyse.
    bundle: PathBuf,

    /// Export the result after a successful analysis.
    #[arg(long, env = "GONOGO_EXPORT")]
    export: bool,

    /// Print the result as JSON instead of text.
    #[arg(long, env = "GONOGO_JSON")]
    json: bool,

    /// Directory exported files are written to.
    #[arg(short = 'o', long = "output-dir", env = "GONOGO_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Service root URL (overrides --host).
    #[arg(long, env = "GONOGO_BASE_URL")]
    base_url: Option<String>,

    /// Execution host used to pick the service root.
    #[arg(long, env = HOST_ENV_VAR)]
    host: Option<String>,

    /// Request timeout in seconds. Default: none.
    #[arg(long, env = "GONOGO_TIMEOUT")]
    timeout: Option<u64>,

    /// Reject bundles larger than N megabytes.
    #[arg(long, env = "GONOGO_MAX_UPLOAD_MB",
          value_parser = clap::value_parser!(u64).range(1..))]
    max_upload_mb: Option<u64>,

    /// Refuse to send files that do not start with a ZIP signature.
    #[arg(long, env = "GONOGO_REQUIRE_ZIP")]
    require_zip: bool,

    /// File name of the synthesised PDF.
    #[arg(long, env = "GONOGO_PDF_NAME", default_value = "resultfinal.pdf")]
    pdf_name: String,

    /// Disable the spinner.
    #[arg(long, env = "GONOGO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GONOGO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "GONOGO_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Run ──────────────────────────────────────────────────────────────
    let spinner = show_progress.then(SpinnerObserver::new);
    let config = build_config(&cli, spinner)?;
    let mut session = Session::new(config).context("Failed to create session")?;

    let status = session.analyze_file(&cli.bundle).await;
    if status != WorkflowStatus::Succeeded {
        // The detailed cause was already logged by the controller.
        eprintln!("{}", red(USER_FACING_ERROR));
        std::process::exit(EXIT_ANALYSIS_FAILED);
    }

    let Some(result) = session.controller().result() else {
        bail!("No result after a successful analysis");
    };

    if cli.json {
        let json = serde_json::to_string_pretty(result).context("Failed to serialise result")?;
        println!("{json}");
    } else if !cli.quiet {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(render_text(result).as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.export {
        return Ok(());
    }

    if !session.controller().download_available() {
        if !cli.quiet {
            eprintln!("Nothing to export for this result.");
        }
        return Ok(());
    }

    match session.export().await {
        ExportOutcome::Saved(artifact) => {
            if cli.json {
                let json = serde_json::to_string_pretty(&artifact)
                    .context("Failed to serialise export")?;
                eprintln!("{json}");
            } else if !cli.quiet && !show_progress {
                eprintln!("{} {}", green("✔"), bold(&artifact.path().display().to_string()));
            }
            Ok(())
        }
        outcome => {
            // The cause was logged by the controller; the analysis above stands.
            eprintln!("{}", red(EXPORT_FAILED_NOTICE));
            std::process::exit(export_exit_code(&outcome));
        }
    }
}

/// Exit code once the analysis succeeded: 0 when the export (if any) saved
/// its artifact, [`EXIT_EXPORT_FAILED`] otherwise.
fn export_exit_code(outcome: &ExportOutcome) -> i32 {
    match outcome {
        ExportOutcome::Saved(_) => 0,
        ExportOutcome::Failed(_) | ExportOutcome::Abandoned | ExportOutcome::Unavailable => {
            EXIT_EXPORT_FAILED
        }
    }
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, spinner: Option<Arc<SpinnerObserver>>) -> Result<ClientConfig> {
    let host = match cli.host {
        Some(ref name) => HostSource::Fixed(HostContext::Browser {
            hostname: name.clone(),
        }),
        None => HostSource::Environment,
    };

    let mut builder = ClientConfig::builder()
        .host(host)
        .output_dir(cli.output_dir.clone())
        .pdf_filename(cli.pdf_name.clone())
        .require_zip(cli.require_zip);

    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(mb) = cli.max_upload_mb {
        builder = builder.max_upload_bytes(mb.saturating_mul(1024 * 1024));
    }
    if let Some(observer) = spinner {
        builder = builder.observer(observer);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gonogo_client::{ExportArtifact, ExportError, TransportError};

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::parse_from([
            "gonogo",
            "dce.zip",
            "--host",
            "localhost",
            "--max-upload-mb",
            "10",
            "--require-zip",
            "-o",
            "out",
        ]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.max_upload_bytes, Some(10 * 1024 * 1024));
        assert!(config.require_zip);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(
            config.host,
            HostSource::Fixed(HostContext::Browser {
                hostname: "localhost".into()
            })
        );
    }

    #[test]
    fn zip_check_is_off_by_default() {
        let cli = Cli::parse_from(["gonogo", "dce.zip"]);
        assert!(!build_config(&cli, None).unwrap().require_zip);
    }

    #[test]
    fn failed_export_keeps_analysis_exit_code_distinct() {
        let failed = ExportOutcome::Failed(ExportError::Transport(TransportError::Status {
            url: "http://localhost:8000/download-document".into(),
            status: 404,
        }));
        assert_eq!(export_exit_code(&failed), EXIT_EXPORT_FAILED);
        assert_ne!(export_exit_code(&failed), EXIT_ANALYSIS_FAILED);
        assert_eq!(export_exit_code(&ExportOutcome::Abandoned), EXIT_EXPORT_FAILED);

        let saved = ExportOutcome::Saved(ExportArtifact::LocalPdf {
            path: PathBuf::from("resultfinal.pdf"),
            pages: 1,
        });
        assert_eq!(export_exit_code(&saved), 0);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cli = Cli::parse_from(["gonogo", "dce.zip", "--timeout", "0"]);
        assert!(build_config(&cli, None).is_err());
    }
}
