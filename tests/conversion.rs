//! Integration tests for document conversion.
//!
//! Fixtures are generated inside each test. Tests that need PDFium or
//! pandoc are gated behind `DOCSHIFT_E2E` so they do not run in CI unless
//! explicitly requested:
//!
//!   DOCSHIFT_E2E=1 cargo test --test conversion -- --nocapture

use docshift::pipeline::layout::lines_per_page;
use docshift::{Converter, DocShiftError, EngineConfig, ErrorKind, Format, TextModel};
use lopdf::content::Content;
use lopdf::Document;
use std::io::Write;
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless DOCSHIFT_E2E is set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("DOCSHIFT_E2E").is_err() {
            println!("SKIP: set DOCSHIFT_E2E=1 to run tests that need PDFium or pandoc");
            return;
        }
    }};
}

fn offline() -> Converter {
    Converter::new(
        EngineConfig::builder()
            .allow_provisioning(false)
            .build()
            .unwrap(),
    )
}

fn online() -> Converter {
    Converter::new(EngineConfig::default())
}

fn write(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn docx(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default();
    zip.start_file("[Content_Types].xml", opts).unwrap();
    zip.write_all(br#"<?xml version="1.0"?><Types/>"#).unwrap();
    zip.start_file("word/document.xml", opts).unwrap();
    write!(
        zip,
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    )
    .unwrap();
    zip.finish().unwrap();
    path
}

/// Number of text-showing operations on each page.
fn lines_on_pages(pdf: &Path) -> Vec<usize> {
    let doc = Document::load(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let content = Content::decode(&doc.get_page_content(id).unwrap()).unwrap();
            content
                .operations
                .iter()
                .filter(|op| op.operator == "Tj")
                .count()
        })
        .collect()
}

async fn txt_to_pdf(dir: &Path, text: &str) -> PathBuf {
    let input = write(dir, "in.txt", text.as_bytes());
    let output = dir.join("out.pdf");
    offline()
        .convert(&input, Format::Txt, &output, Format::Pdf)
        .await
        .expect("txt → pdf should succeed");
    output
}

// ── Text layout ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_hundred_chars_is_one_line() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = txt_to_pdf(dir.path(), &"x".repeat(100)).await;
    assert_eq!(lines_on_pages(&pdf), vec![1]);
}

#[tokio::test]
async fn test_hundred_and_one_chars_is_two_lines() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = txt_to_pdf(dir.path(), &"x".repeat(101)).await;
    assert_eq!(lines_on_pages(&pdf), vec![2]);
}

#[tokio::test]
async fn test_overflow_adds_exactly_one_page() {
    assert_eq!(lines_per_page(), 47);
    let dir = tempfile::tempdir().unwrap();

    let full: Vec<String> = (0..47).map(|i| format!("row {i}")).collect();
    let pdf = txt_to_pdf(dir.path(), &full.join("\n")).await;
    assert_eq!(lines_on_pages(&pdf), vec![47]);

    let over: Vec<String> = (0..48).map(|i| format!("row {i}")).collect();
    let pdf = txt_to_pdf(dir.path(), &over.join("\n")).await;
    assert_eq!(lines_on_pages(&pdf), vec![47, 1]);
}

#[tokio::test]
async fn test_blank_lines_render_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = txt_to_pdf(dir.path(), "first\n\n   \n\t\nsecond").await;
    assert_eq!(lines_on_pages(&pdf), vec![2]);
}

#[tokio::test]
async fn test_empty_text_is_one_blank_page() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = txt_to_pdf(dir.path(), "").await;
    assert_eq!(lines_on_pages(&pdf), vec![0]);
}

#[tokio::test]
async fn test_layout_is_deterministic() {
    let text: String = (0..200)
        .map(|i| format!("paragraph {i} {}", "word ".repeat(i % 40)))
        .collect::<Vec<_>>()
        .join("\n");
    let converter = offline();
    let a = converter
        .encode_to_bytes(&TextModel::new(text.clone()), Format::Pdf)
        .await
        .unwrap();
    let b = converter
        .encode_to_bytes(&TextModel::new(text), Format::Pdf)
        .await
        .unwrap();
    assert_eq!(
        Document::load_mem(&a).unwrap().get_pages().len(),
        Document::load_mem(&b).unwrap().get_pages().len()
    );
}

// ── DOCX ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_docx_body_paragraphs_to_txt() {
    let dir = tempfile::tempdir().unwrap();
    let input = docx(
        dir.path(),
        "memo.docx",
        "<w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space=\"preserve\"> world</w:t></w:r></w:p>\
         <w:tbl><w:tr><w:tc><w:p><w:r><w:t>in a table</w:t></w:r></w:p></w:tc></w:tr></w:tbl>\
         <w:p><w:r><w:t>Second</w:t></w:r></w:p>",
    );
    let output = dir.path().join("memo.txt");

    let report = offline()
        .convert(&input, Format::Docx, &output, Format::Txt)
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&output).unwrap(), "Hello world\nSecond");
    assert_eq!(report.text_chars, "Hello world\nSecond".chars().count());
}

#[tokio::test]
async fn test_docx_to_pdf_is_non_empty() {
    let dir = tempfile::tempdir().unwrap();
    let input = docx(
        dir.path(),
        "memo.docx",
        "<w:p><w:r><w:t>Quarterly summary</w:t></w:r></w:p>",
    );
    let output = dir.path().join("memo.pdf");
    let report = offline()
        .convert(&input, Format::Docx, &output, Format::Pdf)
        .await
        .unwrap();
    assert!(report.output_bytes > 0);
    let doc = Document::load(&output).unwrap();
    assert!(doc.extract_text(&[1]).unwrap().contains("Quarterly summary"));
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_image_formats_are_not_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "a.png", b"\x89PNG\r\n");
    for fmt in [Format::Png, Format::Jpeg] {
        let err = offline()
            .convert(&input, fmt, &dir.path().join("o.txt"), Format::Txt)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat, "{fmt}");
    }
}

#[tokio::test]
async fn test_unknown_tag_is_unsupported() {
    let err = Format::parse_for("xlsx", docshift::FormatDirection::Input).unwrap_err();
    assert!(matches!(err, DocShiftError::UnsupportedFormat { .. }));
    assert!(err.to_string().contains("xlsx"));
}

#[tokio::test]
async fn test_missing_pandoc_without_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "page.html", b"<p>hi</p>");
    let converter = Converter::new(
        EngineConfig::builder()
            .pandoc_path(dir.path().join("no-such-pandoc"))
            .allow_provisioning(false)
            .build()
            .unwrap(),
    );
    let err = converter
        .convert(&input, Format::Html, &dir.path().join("o.txt"), Format::Txt)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalToolMissing);
    assert!(!dir.path().join("o.txt").exists());
}

#[tokio::test]
async fn test_source_is_never_touched() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "keep.txt", b"keep me");
    let before = std::fs::metadata(&input).unwrap().modified().unwrap();
    offline()
        .convert(&input, Format::Txt, &dir.path().join("o.pdf"), Format::Pdf)
        .await
        .unwrap();
    assert_eq!(std::fs::read(&input).unwrap(), b"keep me");
    assert_eq!(std::fs::metadata(&input).unwrap().modified().unwrap(), before);
}

// ── PDFium and pandoc (e2e) ──────────────────────────────────────────────────

#[tokio::test]
async fn test_pdf_text_round_trip() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..60).map(|i| format!("Line number {i}")).collect();
    let pdf = txt_to_pdf(dir.path(), &lines.join("\n")).await;

    let text = online()
        .extract(&pdf, Format::Pdf)
        .await
        .expect("pdf extraction should succeed");
    assert!(text.as_str().contains("Line number 0"));
    assert!(text.as_str().contains("Line number 59"));
    let first = text.as_str().find("Line number 0").unwrap();
    let last = text.as_str().find("Line number 59").unwrap();
    assert!(first < last, "pages must stay in order");
}

#[tokio::test]
async fn test_pandoc_output_formats() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.txt", b"Title line\nSecond line");
    let converter = online();

    for fmt in [Format::Docx, Format::Odt, Format::Rtf, Format::Md, Format::Html, Format::Epub] {
        let output = dir.path().join(format!("out.{}", fmt.extension()));
        let report = converter
            .convert(&input, Format::Txt, &output, fmt)
            .await
            .unwrap_or_else(|e| panic!("txt → {fmt} failed: {e}"));
        assert!(report.output_bytes > 0, "{fmt} output is empty");
        println!("[{fmt}] ✓  {} bytes", report.output_bytes);
    }
}

#[tokio::test]
async fn test_markup_characters_survive_pandoc_outputs() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let input = write(
        dir.path(),
        "in.txt",
        b"<b>x</b> and *y*\n# not a heading\n1. not a list",
    );
    let converter = online();

    let html = dir.path().join("out.html");
    converter
        .convert(&input, Format::Txt, &html, Format::Html)
        .await
        .unwrap();
    let html = std::fs::read_to_string(&html).unwrap();
    assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"), "{html}");
    assert!(html.contains("*y*"), "{html}");
    assert!(!html.contains("<b>x</b>"), "{html}");
    assert!(!html.contains("<em>"), "{html}");
    assert!(!html.contains("<h1"), "{html}");
    assert!(!html.contains("<ol"), "{html}");

    let md = dir.path().join("out.md");
    converter
        .convert(&input, Format::Txt, &md, Format::Md)
        .await
        .unwrap();
    let text = converter.extract(&md, Format::Md).await.unwrap();
    assert!(text.as_str().contains("<b>x</b> and *y*"), "{:?}", text.as_str());
    assert!(text.as_str().contains("# not a heading"), "{:?}", text.as_str());
    assert!(text.as_str().contains("1. not a list"), "{:?}", text.as_str());
}

#[tokio::test]
async fn test_pandoc_input_formats() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let converter = online();
    let cases: [(&str, &[u8], Format); 3] = [
        ("in.md", b"# Heading\n\nBody text\n", Format::Md),
        ("in.html", b"<html><body><p>Body text</p></body></html>", Format::Html),
        ("in.rtf", br"{\rtf1\ansi Body text\par}", Format::Rtf),
    ];
    for (name, bytes, fmt) in cases {
        let input = write(dir.path(), name, bytes);
        let text = converter
            .extract(&input, fmt)
            .await
            .unwrap_or_else(|e| panic!("{fmt} extraction failed: {e}"));
        assert!(text.as_str().contains("Body text"), "{fmt}: {:?}", text.as_str());
    }
}
