//! CLI binary for docshift.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `EngineConfig`, runs one operation and prints its report.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use docshift::pipeline::pandoc;
use docshift::{
    inspect, CompressionPreset, CompressionProgressCallback, CompressionReport, Compressor,
    Converter, EngineConfig, Format, FormatDirection, ImageAssembler, Merger, ProgressCallback,
    IMAGE_FORMATS, INPUT_FORMATS, OUTPUT_FORMATS,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tool_auto::{Tool, ToolCache};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

/// Live progress bar for compression. Pages are encoded concurrently, so
/// `on_page_encoded` may arrive out of order; the bar only counts.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Spinner until `on_compression_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Inspecting PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Compressing");
        self.bar.reset_eta();
    }
}

impl CompressionProgressCallback for CliProgressCallback {
    fn on_compression_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
    }

    fn on_page_rendered(&self, page_num: usize, _total_pages: usize) {
        self.bar.set_message(format!("page {page_num} rendered"));
    }

    fn on_page_encoded(&self, page_num: usize, total_pages: usize, jpeg_bytes: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{:>8} bytes", jpeg_bytes)),
        ));
        self.bar.inc(1);
    }

    fn on_compression_complete(&self, _report: &CompressionReport) {
        self.bar.finish_and_clear();
    }
}

fn download_bar(prefix: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    bar.set_prefix(prefix);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert, formats taken from the file extensions
  docshift convert report.docx -o report.pdf

  # Explicit formats
  docshift convert notes --from md -o notes.epub --to epub

  # Shrink a scanned PDF
  docshift compress scan.pdf -o scan.small.pdf --preset high

  # Images to PDF, one page per image, in argument order
  docshift images page1.jpg page2.png -o pages.pdf

  # Merge PDFs in argument order
  docshift merge a.pdf b.pdf c.pdf -o all.pdf

  # Inspect a PDF without rendering it
  docshift inspect scan.pdf --json

  # Download pandoc and PDFium ahead of time
  docshift setup

COMPRESSION PRESETS:
  Preset      DPI   JPEG quality  Scale
  ─────────   ───   ────────────  ─────
  low         150   80            1.00
  moderate    120   60            0.85   (default; unknown names fall back here)
  high         90   40            0.70

  PDFs without embedded images are repacked losslessly instead.

ENVIRONMENT VARIABLES:
  DOCSHIFT_PANDOC        Path to a pandoc binary (no automatic download)
  PDFIUM_LIB_PATH        Path to an existing libpdfium (skips auto-download)
  DOCSHIFT_TOOL_CACHE    Override the tool cache directory
  DOCSHIFT_NO_DOWNLOAD   Never download missing tools
  DOCSHIFT_CONCURRENCY   Concurrent JPEG encodes during compression
  RUST_LOG               Standard tracing filter, overrides --verbose/--quiet
"#;

/// Convert documents and shrink PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "docshift",
    version,
    about = "Convert documents between PDF, DOCX, ODT, RTF, Markdown, HTML, EPUB and text",
    long_about = "Convert documents between PDF, DOCX, ODT, RTF, Markdown, HTML, EPUB and plain \
text, shrink PDFs with quality presets, assemble images into PDFs and merge PDFs. pandoc and \
PDFium are downloaded on first use when they are not installed.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    engine: EngineArgs,

    /// Print the operation report as JSON on stdout.
    #[arg(long, global = true, env = "DOCSHIFT_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "DOCSHIFT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCSHIFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCSHIFT_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// pandoc binary to use.
    #[arg(long, global = true, env = "DOCSHIFT_PANDOC")]
    pandoc: Option<PathBuf>,

    /// PDFium shared library to use.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium: Option<PathBuf>,

    /// Directory for downloaded tools.
    #[arg(long, global = true, env = "DOCSHIFT_TOOL_CACHE")]
    tool_cache: Option<PathBuf>,

    /// Never download missing tools.
    #[arg(long, global = true, env = "DOCSHIFT_NO_DOWNLOAD")]
    no_download: bool,

    /// Concurrent JPEG encodes while compressing.
    #[arg(long, global = true, env = "DOCSHIFT_CONCURRENCY")]
    concurrency: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one document into another format.
    Convert {
        input: PathBuf,
        /// Output file.
        #[arg(short, long)]
        output: PathBuf,
        /// Input format; defaults to the input's extension.
        #[arg(long)]
        from: Option<String>,
        /// Output format; defaults to the output's extension.
        #[arg(long)]
        to: Option<String>,
    },
    /// Shrink a PDF.
    Compress {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// low, moderate or high.
        #[arg(short, long, env = "DOCSHIFT_PRESET", default_value = CompressionPreset::MODERATE)]
        preset: String,
    },
    /// Build a PDF with one page per image.
    Images {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Concatenate PDFs.
    Merge {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print page count, version, encryption and image pages of a PDF.
    Inspect { input: PathBuf },
    /// List supported formats.
    Formats,
    /// Download pandoc and PDFium into the tool cache if they are missing.
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while it is on screen.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || (show_progress && matches!(cli.command, Command::Compress { .. })) {
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

    let progress_cb: Option<ProgressCallback> =
        if show_progress && matches!(cli.command, Command::Compress { .. }) {
            let cb = CliProgressCallback::new_dynamic();
            Some(cb as Arc<dyn CompressionProgressCallback>)
        } else {
            None
        };
    let config = build_config(&cli.engine, progress_cb)?;

    match &cli.command {
        Command::Convert {
            input,
            output,
            from,
            to,
        } => {
            let input_format = resolve_format(from.as_deref(), input, FormatDirection::Input)?;
            let output_format = resolve_format(to.as_deref(), output, FormatDirection::Output)?;
            let report = Converter::new(config)
                .convert(input, input_format, output, output_format)
                .await
                .context("Conversion failed")?;
            if !emit_json(&cli, &report)? && !cli.quiet {
                eprintln!(
                    "{}  {} → {}  {} chars  {} bytes  {}ms  →  {}",
                    green("✔"),
                    report.input_format,
                    report.output_format,
                    report.text_chars,
                    report.output_bytes,
                    report.duration_ms,
                    bold(&output.display().to_string()),
                );
            }
        }
        Command::Compress {
            input,
            output,
            preset,
        } => {
            let report = Compressor::new(config)
                .compress(input, output, preset)
                .await
                .context("Compression failed")?;
            if !emit_json(&cli, &report)? && !cli.quiet {
                eprintln!(
                    "{}  {} pages {}  {} → {} bytes ({:.0}%)  {}ms  →  {}",
                    green("✔"),
                    report.page_count,
                    dim(&format!("({}, preset {})", report.strategy, report.preset)),
                    report.input_bytes,
                    report.output_bytes,
                    report.ratio() * 100.0,
                    report.duration_ms,
                    bold(&output.display().to_string()),
                );
            }
        }
        Command::Images { images, output } => {
            let report = ImageAssembler::new(config)
                .images_to_pdf(images, output)
                .await
                .context("Image assembly failed")?;
            if !emit_json(&cli, &report)? && !cli.quiet {
                eprintln!(
                    "{}  {} pages  {} bytes  {}ms  →  {}",
                    green("✔"),
                    report.page_count,
                    report.output_bytes,
                    report.duration_ms,
                    bold(&output.display().to_string()),
                );
            }
        }
        Command::Merge { inputs, output } => {
            let report = Merger::new(config)
                .merge(inputs, output)
                .await
                .context("Merge failed")?;
            if !emit_json(&cli, &report)? && !cli.quiet {
                eprintln!(
                    "{}  {} files  {} pages  {} bytes  {}ms  →  {}",
                    green("✔"),
                    report.inputs,
                    report.page_count,
                    report.output_bytes,
                    report.duration_ms,
                    bold(&output.display().to_string()),
                );
            }
        }
        Command::Inspect { input } => {
            let summary = inspect(input).await.context("Failed to inspect PDF")?;
            if !emit_json(&cli, &summary)? {
                println!("File:         {}", input.display());
                println!("Pages:        {}", summary.page_count);
                println!("PDF Version:  {}", summary.pdf_version);
                println!("Encrypted:    {}", summary.is_encrypted);
                println!("Size:         {} bytes", summary.file_bytes);
                if summary.has_images() {
                    let pages: Vec<String> =
                        summary.image_pages.iter().map(|p| p.to_string()).collect();
                    println!("Image pages:  {}", pages.join(", "));
                } else {
                    println!("Image pages:  none");
                }
            }
        }
        Command::Formats => {
            if cli.json {
                let formats = serde_json::json!({
                    "input": INPUT_FORMATS,
                    "output": OUTPUT_FORMATS,
                    "image": IMAGE_FORMATS,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&formats).context("Failed to serialise formats")?
                );
            } else {
                println!("Input:   {}", docshift::format::list(INPUT_FORMATS));
                println!("Output:  {}", docshift::format::list(OUTPUT_FORMATS));
                println!("Images:  {}", docshift::format::list(IMAGE_FORMATS));
            }
        }
        Command::Setup => setup(&cli, &config).await?,
    }

    Ok(())
}

/// Map CLI args to `EngineConfig`.
fn build_config(args: &EngineArgs, progress: Option<ProgressCallback>) -> Result<EngineConfig> {
    let mut builder = EngineConfig::builder().allow_provisioning(!args.no_download);
    if let Some(p) = &args.pandoc {
        builder = builder.pandoc_path(p);
    }
    if let Some(p) = &args.pdfium {
        builder = builder.pdfium_path(p);
    }
    if let Some(d) = &args.tool_cache {
        builder = builder.tool_cache_dir(d);
    }
    if let Some(n) = args.concurrency {
        builder = builder.raster_concurrency(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// An explicit `--from`/`--to` tag wins; otherwise use the file extension.
fn resolve_format(tag: Option<&str>, path: &Path, direction: FormatDirection) -> Result<Format> {
    let tag = match tag {
        Some(t) => t.to_string(),
        None => match path.extension() {
            Some(ext) => ext.to_string_lossy().into_owned(),
            None => bail!(
                "Cannot tell the {direction} format of '{}': no extension. Pass --{}.",
                path.display(),
                if direction == FormatDirection::Input {
                    "from"
                } else {
                    "to"
                }
            ),
        },
    };
    Ok(Format::parse_for(&tag, direction)?)
}

/// Print `value` as JSON when `--json` is set. Returns whether it did.
fn emit_json<T: Serialize>(cli: &Cli, value: &T) -> Result<bool> {
    if !cli.json {
        return Ok(false);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialise report")?
    );
    Ok(true)
}

async fn setup(cli: &Cli, config: &EngineConfig) -> Result<()> {
    let cache = config.tool_cache();

    // ── PDFium ───────────────────────────────────────────────────────────
    if let Some(path) = &config.pdfium_path {
        println!("PDFium:  {} {}", path.display(), dim("(configured)"));
    } else {
        let path = ensure_tool(cli, config, &cache, Tool::Pdfium)?;
        println!("PDFium:  {}", path.display());
    }

    // ── pandoc ───────────────────────────────────────────────────────────
    match pandoc::installed_version(config).await {
        Some(version) => println!("pandoc:  {version} {}", dim("(already available)")),
        None if config.pandoc_path.is_some() => {
            bail!("The configured pandoc binary cannot be run")
        }
        None => {
            let path = ensure_tool(cli, config, &cache, Tool::Pandoc)?;
            println!("pandoc:  {}", path.display());
        }
    }

    if !cli.quiet {
        eprintln!(
            "{}  tools ready in {}",
            green("✔"),
            cyan(&cache.root().display().to_string())
        );
    }
    Ok(())
}

fn ensure_tool(
    cli: &Cli,
    config: &EngineConfig,
    cache: &ToolCache,
    tool: Tool,
) -> Result<PathBuf> {
    if let Some(path) = cache.cached_path(tool) {
        return Ok(path);
    }
    if !config.allow_provisioning {
        bail!("{} is not installed and downloads are disabled", tool.name());
    }

    let path = if cli.quiet {
        tokio::task::block_in_place(|| cache.ensure(tool, None))
    } else {
        let bar = download_bar(tool.name());
        let progress = bar.clone();
        // block_in_place keeps the borrow valid while the blocking download
        // runs off the executor's hot path.
        let result = tokio::task::block_in_place(|| {
            cache.ensure(
                tool,
                Some(&|downloaded, total| {
                    if let Some(t) = total {
                        if progress.length().unwrap_or(0) != t {
                            progress.set_length(t);
                        }
                    }
                    progress.set_position(downloaded);
                }),
            )
        });
        bar.finish_and_clear();
        result
    };
    path.with_context(|| format!("Failed to download {} {}", tool.name(), tool.version()))
}
