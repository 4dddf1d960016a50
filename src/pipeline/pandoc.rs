//! pandoc subprocess driver.
//!
//! Formats docshift does not parse or write itself are delegated to pandoc:
//!
//! ```text
//! extract:  pandoc <input> --from=<reader> --to=plain --wrap=none        → stdout
//! encode:   pandoc --from=markdown+hard_line_breaks-raw_html-...
//!                  --to=<writer> --standalone -o <staging file>         ← stdin
//! ```
//!
//! The text handed to pandoc for encoding is plain text, not markup. It is
//! escaped by [`markdown_literal`] first so `*word*`, `# title`, `1.` or
//! `<b>` come out as the characters they are.
//!
//! The binary is located as: explicit `pandoc_path`, then the tool cache,
//! then `pandoc` on `PATH`. When spawning fails because the binary does not
//! exist, one provisioning download into the tool cache is attempted and the
//! command is retried once with the installed copy. A second failure is
//! [`DocShiftError::ExternalToolMissing`].

use crate::config::EngineConfig;
use crate::error::{DocShiftError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tool_auto::Tool;
use tracing::{debug, info, warn};

const TOOL: &str = "pandoc";

/// Intermediate markup handed to pandoc writers. Each source line stays a
/// line in the target document; nothing is passed through raw.
const INTERMEDIATE_READER: &str =
    "markdown+hard_line_breaks-raw_html-raw_tex-raw_attribute-native_divs-native_spans";

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"pandoc(?:\.exe)?(?:\s+|\s+v|\s+version\s+)(\d+)\.(\d+)(?:\.(\d+))?").unwrap()
});

/// Convert `input` to plain text using pandoc's `reader`.
pub(crate) async fn to_plain(config: &EngineConfig, input: &Path, reader: &str) -> Result<String> {
    let output = run_with_provisioning(config, |program| {
        extract_once(program, input, reader)
    })
    .await?;

    if !output.status.success() {
        return Err(DocShiftError::corrupt(input, failure_detail(&output)));
    }

    debug!(reader, bytes = output.stdout.len(), "pandoc extraction done");
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Write `text` as `writer` into the file at `dest`.
///
/// `title` fills the metadata some writers require (EPUB, standalone HTML).
pub(crate) async fn from_plain(
    config: &EngineConfig,
    text: &str,
    writer: &str,
    dest: &Path,
    title: &str,
) -> Result<()> {
    let markdown = markdown_literal(text);
    let output = run_with_provisioning(config, |program| {
        encode_once(program, &markdown, writer, dest, title)
    })
    .await?;

    if !output.status.success() {
        return Err(DocShiftError::encoding(writer, failure_detail(&output)));
    }
    debug!(writer, dest = %dest.display(), "pandoc encoding done");
    Ok(())
}

/// Version reported by the pandoc docshift would use, if one can be run.
pub async fn installed_version(config: &EngineConfig) -> Option<String> {
    let program = resolve_program(config);
    let output = Command::new(&program).arg("--version").output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    parse_version(&String::from_utf8_lossy(&output.stdout))
}

/// Make sure pandoc is runnable, downloading it if needed and permitted.
/// Returns the program that will be used.
pub async fn ensure_available(config: &EngineConfig) -> Result<PathBuf> {
    let program = resolve_program(config);
    match Command::new(&program).arg("--version").output().await {
        Ok(_) => Ok(program),
        Err(e) if e.kind() == io::ErrorKind::NotFound => provision(config, &program, e).await,
        Err(e) => Err(missing(format!("cannot run {}: {e}", program.display()))),
    }
}

/// Markdown that pandoc reads back as exactly `text`.
///
/// ASCII punctuation is backslash-escaped and leading indentation becomes
/// escaped (non-breaking) spaces, so no line turns into emphasis, a heading,
/// a list, a code block or raw HTML. Whitespace-only lines stay blank and
/// still separate paragraphs.
pub(crate) fn markdown_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let body = line.trim_start_matches([' ', '\t']);
        if body.trim().is_empty() {
            continue;
        }
        for c in line[..line.len() - body.len()].chars() {
            let width = if c == '\t' { 4 } else { 1 };
            for _ in 0..width {
                out.push_str("\\ ");
            }
        }
        for c in body.chars() {
            if c.is_ascii_punctuation() {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

fn parse_version(stdout: &str) -> Option<String> {
    let caps = VERSION_RE.captures(stdout)?;
    let major = caps.get(1)?.as_str();
    let minor = caps.get(2)?.as_str();
    Some(match caps.get(3) {
        Some(patch) => format!("{major}.{minor}.{}", patch.as_str()),
        None => format!("{major}.{minor}"),
    })
}

// ── Invocation ───────────────────────────────────────────────────────────

fn resolve_program(config: &EngineConfig) -> PathBuf {
    if let Some(p) = &config.pandoc_path {
        return p.clone();
    }
    config
        .tool_cache()
        .cached_path(Tool::Pandoc)
        .unwrap_or_else(|| PathBuf::from(TOOL))
}

/// attempt → on "not found" provision once → attempt again → typed failure.
async fn run_with_provisioning<F, Fut>(config: &EngineConfig, attempt: F) -> Result<Output>
where
    F: Fn(PathBuf) -> Fut,
    Fut: Future<Output = io::Result<Output>>,
{
    let program = resolve_program(config);
    let first = match attempt(program.clone()).await {
        Ok(output) => return Ok(output),
        Err(e) if e.kind() == io::ErrorKind::NotFound => e,
        Err(e) => return Err(missing(format!("cannot run {}: {e}", program.display()))),
    };

    let installed = provision(config, &program, first).await?;
    match attempt(installed.clone()).await {
        Ok(output) => Ok(output),
        Err(e) => Err(missing(format!(
            "still cannot run {} after provisioning: {e}",
            installed.display()
        ))),
    }
}

async fn provision(config: &EngineConfig, program: &Path, cause: io::Error) -> Result<PathBuf> {
    if config.pandoc_path.is_some() {
        return Err(missing(format!(
            "configured binary {} cannot be run: {cause}",
            program.display()
        )));
    }
    if !config.allow_provisioning {
        return Err(missing(format!("not found on PATH ({cause}); downloads are disabled")));
    }

    warn!("pandoc not found, provisioning {}", tool_auto::PANDOC_VERSION);
    let cache = config.tool_cache();
    let path = tokio::task::spawn_blocking(move || cache.ensure(Tool::Pandoc, None))
        .await
        .map_err(|e| DocShiftError::Internal(format!("provisioning task panicked: {e}")))??;
    info!(path = %path.display(), "pandoc provisioned");
    Ok(path)
}

async fn extract_once(program: PathBuf, input: &Path, reader: &str) -> io::Result<Output> {
    Command::new(program)
        .arg(input)
        .arg(format!("--from={reader}"))
        .arg("--to=plain")
        .arg("--wrap=none")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
}

async fn encode_once(
    program: PathBuf,
    text: &str,
    writer: &str,
    dest: &Path,
    title: &str,
) -> io::Result<Output> {
    let mut cmd = Command::new(program);
    cmd.arg(format!("--from={INTERMEDIATE_READER}"))
        .arg(format!("--to={writer}"))
        .arg("--standalone")
        .arg("-o")
        .arg(dest);
    match writer {
        "epub" => {
            cmd.arg(format!("--metadata=title:{title}"));
        }
        "html" => {
            cmd.arg(format!("--metadata=pagetitle:{title}"));
        }
        _ => {}
    }

    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::other("pandoc stdin unavailable"))?;
    let feed = async move {
        let written = stdin.write_all(text.as_bytes()).await;
        drop(stdin);
        written
    };
    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output?;
    // A writer that exits early closes the pipe; its exit status explains why.
    if let Err(e) = fed {
        if output.status.success() {
            return Err(e);
        }
    }
    Ok(output)
}

fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("pandoc exited with {}", output.status)
    } else {
        format!("pandoc exited with {}: {stderr}", output.status)
    }
}

fn missing(detail: String) -> DocShiftError {
    DocShiftError::ExternalToolMissing {
        tool: TOOL.to_string(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn version_parsing() {
        assert_eq!(parse_version("pandoc 3.1.2\nFeatures: +server").as_deref(), Some("3.1.2"));
        assert_eq!(parse_version("pandoc.exe 3.0").as_deref(), Some("3.0"));
        assert_eq!(parse_version("something else"), None);
    }

    #[test]
    fn markdown_literal_escapes_markup() {
        assert_eq!(markdown_literal("*y* and _z_"), r"\*y\* and \_z\_");
        assert_eq!(markdown_literal("<b>x</b>"), r"\<b\>x\</b\>");
        assert_eq!(markdown_literal("# not a heading"), r"\# not a heading");
        assert_eq!(markdown_literal("1. not a list"), r"1\. not a list");
        assert_eq!(markdown_literal("plain words"), "plain words");
    }

    #[test]
    fn markdown_literal_keeps_line_structure() {
        assert_eq!(markdown_literal("a\n\n  \nb"), "a\n\n\nb");
        assert_eq!(markdown_literal("    code?"), r"\ \ \ \ code\?");
        assert_eq!(markdown_literal("\tx"), r"\ \ \ \ x");
    }

    #[test]
    fn explicit_path_wins() {
        let config = EngineConfig::builder()
            .pandoc_path("/opt/pandoc/bin/pandoc")
            .build()
            .unwrap();
        assert_eq!(resolve_program(&config), PathBuf::from("/opt/pandoc/bin/pandoc"));
    }

    #[test]
    fn empty_cache_falls_back_to_path_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::builder()
            .tool_cache_dir(dir.path())
            .build()
            .unwrap();
        assert_eq!(resolve_program(&config), PathBuf::from("pandoc"));
    }

    #[tokio::test]
    async fn missing_configured_binary_is_not_provisioned() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.md");
        std::fs::write(&input, "# hi").unwrap();
        let config = EngineConfig::builder()
            .pandoc_path(dir.path().join("no-such-pandoc"))
            .tool_cache_dir(dir.path().join("cache"))
            .build()
            .unwrap();

        let err = to_plain(&config, &input, "markdown").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalToolMissing);
        assert!(!dir.path().join("cache").exists());
    }

    #[tokio::test]
    async fn provisioning_disabled_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.md");
        std::fs::write(&input, "# hi").unwrap();
        let config = EngineConfig::builder()
            .tool_cache_dir(dir.path().join("cache"))
            .allow_provisioning(false)
            .build()
            .unwrap();

        // Only meaningful on hosts without pandoc on PATH.
        if Command::new("pandoc").arg("--version").output().await.is_ok() {
            return;
        }
        let err = to_plain(&config, &input, "markdown").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalToolMissing);
        assert!(err.to_string().contains("downloads are disabled"));
    }
}
