//! CLI binary for resume-parser.
//!
//! A thin shim over the library crate that maps CLI flags to `ParserConfig`
//! and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use resume_parser::pipeline::persist::{load_candidate, PARSED_DIR};
use resume_parser::{
    parse_resume, process_batch, process_directory, split_document, CandidateOutcome,
    ExtraCurricularRecord, ParseProgressCallback, ParserConfig, ProgressCallback, ScoreBreakdown,
    StudentMetadata,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished candidate. Candidates
/// finish out of order, so start times are keyed by id.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Splitting PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} resumes  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Parsing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, id: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(id))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ParseProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Parsing {total} resumes…"))
        ));
    }

    fn on_candidate_start(&self, id: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(id.to_string(), Instant::now());
        }
        self.bar.set_message(id.to_string());
    }

    fn on_candidate_complete(&self, id: &str, total_score: f64) {
        let secs = self.elapsed_secs(id);
        self.bar.println(format!(
            "  {} {:<14} {}  {}",
            green("✓"),
            id,
            bold(&format!("{total_score:>6.2}")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_candidate_error(&self, id: &str, error: &str) {
        let secs = self.elapsed_secs(id);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<14} {}  {}",
            red("✗"),
            id,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success: usize) {
        let failed = total.saturating_sub(success);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} resumes parsed successfully",
                green("✔"),
                bold(&success.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} resumes parsed  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Split a combined PDF only (no API key needed)
  resume-parser split combined.pdf -o out

  # Split, extract, score and save every candidate
  resume-parser batch combined.pdf -o out

  # Re-run extraction on an existing split
  resume-parser dir out/pdfs -o out

  # Parse one resume and print the report
  resume-parser parse jane_doe.pdf

  # Print a saved candidate as JSON
  resume-parser show 221CS101 -o out --json

OUTPUT LAYOUT:
  <out>/pdfs/<id>.pdf                        one PDF per candidate
  <out>/parsed_data/<id>/<id>_metadata.csv   metadata + score columns
  <out>/parsed_data/<id>/<id>_academic.csv   one row per semester
  <out>/parsed_data/<id>/<id>_skills.csv
  <out>/parsed_data/<id>/<id>_projects.csv
  <out>/parsed_data/<id>/<id>_extracurricular.csv
  <out>/parsed_data/<id>/llm_response.json
  <out>/parsed_data/token_usage.csv

ENVIRONMENT VARIABLES:
  DEEPSEEK_API_KEY        API key for the OpenAI-compatible endpoint
  DEEPSEEK_URL            Base URL (default https://api.deepseek.com)
  EDGEQUAKE_LLM_PROVIDER  Use an edgequake-llm provider instead (openai, anthropic, …)
  EDGEQUAKE_MODEL         Model ID for that provider
  PDFIUM_LIB_PATH         Path to an existing libpdfium — skips auto-download
  RUST_LOG                Override log filter

  Variables are also read from a .env file in the working directory.
"#;

/// Split, parse and score campus-placement resumes.
#[derive(Parser, Debug)]
#[command(
    name = "resume-parser",
    version,
    about = "Split combined resume PDFs, extract candidate data with an LLM and score it",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// LLM model ID.
    #[arg(long, global = true, env = "RESUME_PARSER_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider name (openai, anthropic, gemini, ollama, …).
    #[arg(long, global = true, env = "RESUME_PARSER_PROVIDER")]
    provider: Option<String>,

    /// API key for the OpenAI-compatible endpoint.
    #[arg(long, global = true, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, global = true, env = "DEEPSEEK_URL")]
    base_url: Option<String>,

    /// Candidates processed concurrently.
    #[arg(short, long, global = true, env = "RESUME_PARSER_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Retries per candidate on transient LLM failures.
    #[arg(long, global = true, env = "RESUME_PARSER_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "RESUME_PARSER_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, global = true, env = "RESUME_PARSER_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Letterhead text marking the first page of each resume.
    #[arg(long, global = true, env = "RESUME_PARSER_MARKER")]
    marker: Option<String>,

    /// Keep pages before the first letterhead as their own document.
    #[arg(long, global = true)]
    keep_leading_pages: bool,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, global = true, env = "RESUME_PARSER_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Print JSON instead of a human-readable report.
    #[arg(long, global = true)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "RESUME_PARSER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a combined PDF into one PDF per candidate and verify the count.
    Split {
        /// Combined PDF path or HTTP/HTTPS URL.
        input: String,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
    /// Split a combined PDF, then extract, score and save every candidate.
    Batch {
        input: String,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
    /// Extract, score and save every PDF in an already-split directory.
    Dir {
        pdf_dir: PathBuf,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
    /// Parse a single resume and print its report.
    Parse {
        input: String,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
    /// Print a previously saved candidate.
    Show {
        id: String,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
}

impl Command {
    fn uses_progress(&self) -> bool {
        matches!(self, Command::Batch { .. } | Command::Dir { .. })
    }

    fn needs_pdfium(&self) -> bool {
        !matches!(self, Command::Show { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for batch runs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.command.uses_progress();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Ensure PDFium engine is available ────────────────────────────────
    // First run downloads the library into the pdfium-auto cache; later
    // runs only check the path.
    if cli.command.needs_pdfium() && !pdfium_auto::is_pdfium_cached() {
        if !cli.quiet {
            let dl_bar = ProgressBar::new(0);
            dl_bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  \
                     [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(TICKS),
            );
            dl_bar.set_prefix("PDF engine");
            dl_bar.set_message("Connecting…");
            dl_bar.enable_steady_tick(Duration::from_millis(80));

            let bar = dl_bar.clone();
            tokio::task::block_in_place(|| {
                pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
                    if let Some(t) = total {
                        if bar.length().unwrap_or(0) != t {
                            bar.set_length(t);
                        }
                    }
                    bar.set_position(downloaded);
                }))
            })
            .context("Failed to download PDFium engine")?;

            dl_bar.finish_with_message("ready ✓");
        } else {
            tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
                .context("Failed to download PDFium engine")?;
        }
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ParseProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    match &cli.command {
        Command::Split { input, output } => run_split(&cli, &config, input, output).await,
        Command::Batch { input, output } => run_batch(&cli, &config, input, output).await,
        Command::Dir { pdf_dir, output } => run_dir(&cli, &config, pdf_dir, output).await,
        Command::Parse { input, output } => run_parse(&cli, &config, input, output).await,
        Command::Show { id, output } => run_show(&cli, id, output),
    }
}

async fn run_split(cli: &Cli, config: &ParserConfig, input: &str, output: &PathBuf) -> Result<()> {
    let report = split_document(input, output, config)
        .await
        .context("Split failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise split report")?
        );
    } else if !cli.quiet {
        for doc in &report.documents {
            println!("{:<14} {:>3} pages  {}", doc.identifier, doc.pages.len(), dim(&doc.path.display().to_string()));
        }
        eprintln!(
            "{}  {} pages → {} resumes  →  {}",
            green("✔"),
            report.total_pages,
            report.documents.len(),
            bold(&report.output_dir.display().to_string()),
        );
    }
    Ok(())
}

async fn run_batch(cli: &Cli, config: &ParserConfig, input: &str, output: &PathBuf) -> Result<()> {
    let report = process_batch(input, output, config)
        .await
        .context("Batch failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise batch report")?
        );
        return Ok(());
    }
    if !cli.quiet {
        print_outcomes(&report.outcomes);
        eprintln!(
            "{}  {}/{} resumes  {}ms  →  {}",
            if report.failed() == 0 { green("✔") } else { cyan("⚠") },
            report.succeeded(),
            report.outcomes.len(),
            report.duration_ms,
            bold(&report.token_usage_file.display().to_string()),
        );
    }
    Ok(())
}

async fn run_dir(cli: &Cli, config: &ParserConfig, pdf_dir: &PathBuf, output: &PathBuf) -> Result<()> {
    let outcomes = process_directory(pdf_dir, output, config)
        .await
        .context("Processing failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcomes).context("Failed to serialise outcomes")?
        );
    } else if !cli.quiet {
        print_outcomes(&outcomes);
    }
    Ok(())
}

async fn run_parse(cli: &Cli, config: &ParserConfig, input: &str, output: &PathBuf) -> Result<()> {
    let parsed = parse_resume(input, output, config)
        .await
        .context("Parsing failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&parsed).context("Failed to serialise result")?
        );
    } else {
        print_report(&parsed.record.metadata, &parsed.scores, &parsed.extra_curricular);
        if !cli.quiet {
            eprintln!(
                "   {} tokens in  /  {} tokens out  →  {}",
                dim(&parsed.usage.prompt_tokens.to_string()),
                dim(&parsed.usage.completion_tokens.to_string()),
                bold(&parsed.output_dir.display().to_string()),
            );
        }
    }
    Ok(())
}

fn run_show(cli: &Cli, id: &str, output: &PathBuf) -> Result<()> {
    let loaded = load_candidate(&output.join(PARSED_DIR), id)
        .with_context(|| format!("Failed to load candidate {id}"))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&loaded).context("Failed to serialise candidate")?
        );
    } else {
        print_report(&loaded.record.metadata, &loaded.scores, &loaded.extra_curricular);
    }
    Ok(())
}

/// Sorted score table for a batch, highest first.
fn print_outcomes(outcomes: &[CandidateOutcome]) {
    let mut ok: Vec<_> = outcomes.iter().filter_map(|o| o.result.as_ref().ok()).collect();
    ok.sort_by(|a, b| b.scores.total.total_cmp(&a.scores.total));

    println!(
        "{:<14} {:<28} {:>7} {:>7} {:>7} {:>7} {:>7}",
        "ID", "NAME", "ACAD", "TECH", "PROJ", "EXTRA", "TOTAL"
    );
    for p in ok {
        let s = &p.scores;
        println!(
            "{:<14} {:<28} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7}",
            p.id,
            truncate(&p.record.metadata.name, 28),
            s.academic,
            s.technical,
            s.projects,
            s.extracurricular,
            bold(&format!("{:.2}", s.total)),
        );
    }
    for o in outcomes {
        if let Err(e) = &o.result {
            println!("{:<14} {}", o.id, red(&e.to_string()));
        }
    }
}

fn print_report(meta: &StudentMetadata, scores: &ScoreBreakdown, extra: &ExtraCurricularRecord) {
    println!("{}  {}", bold(&meta.name), dim(&meta.reg_no));
    println!("{} · {}  {}", meta.degree, meta.branch, dim(&meta.email));
    println!();
    println!("  Academic          {:>6.2} / 20", scores.academic);
    println!("  Technical skills  {:>6.2} / 35", scores.technical);
    println!("  Projects          {:>6.2} / 30", scores.projects);
    println!("  Extra-curricular  {:>6.2} / 15", scores.extracurricular);
    println!("  {}", bold(&format!("Total             {:>6.2} / 100", scores.total)));

    let sections = [
        ("Leadership", &extra.leadership),
        ("Awards", &extra.awards),
        ("Certifications", &extra.certifications),
        ("Activities", &extra.activities),
        ("Languages", &extra.languages),
    ];
    for (label, items) in sections {
        if items.is_empty() {
            continue;
        }
        println!();
        println!("  {}", cyan(label));
        for item in items {
            println!("    • {item}");
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}\u{2026}", s.chars().take(max - 1).collect::<String>())
    } else {
        s.to_string()
    }
}

/// Map CLI args to `ParserConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ParserConfig> {
    let mut builder = ParserConfig::builder()
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .drop_leading_pages(!cli.keep_leading_pages);

    if let Some(ref marker) = cli.marker {
        builder = builder.boundary_marker(marker.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    } else if let Some(ref key) = cli.api_key {
        let base_url = cli
            .base_url
            .clone()
            .unwrap_or_else(|| resume_parser::config::DEFAULT_BASE_URL.to_string());
        builder = builder.endpoint(key.clone(), base_url);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
