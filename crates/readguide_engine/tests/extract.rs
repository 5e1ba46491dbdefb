use std::fs;
use std::io::{Cursor, Write};

use pretty_assertions::assert_eq;
use readguide_engine::{
    decode_text, docx_to_text, html_to_text, ExtractSettings, ExtractionError, Extractor,
    FileExtractor, SourceDescriptor,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn source_in(dir: &TempDir, name: &str, content: &[u8]) -> SourceDescriptor {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    SourceDescriptor::new(name, path)
}

#[tokio::test]
async fn reads_plain_text_trimmed() {
    let dir = TempDir::new().unwrap();
    let source = source_in(&dir, "notes.txt", b"\n  Chapter 1\nIntro text.  \n\n");

    let text = FileExtractor::default()
        .extract(&source, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(text, "Chapter 1\nIntro text.");
}

#[tokio::test]
async fn html_is_reduced_to_visible_text() {
    let dir = TempDir::new().unwrap();
    let html = br#"<html><head><title>Paper</title><style>p { color: red }</style></head>
<body><nav>Menu</nav><article><h1>Paper</h1><p>First paragraph.</p>
<script>var x = 1;</script><p>Second paragraph.</p></article></body></html>"#;
    let source = source_in(&dir, "paper.HTML", html);

    let text = FileExtractor::default()
        .extract(&source, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(text, "Paper\nFirst paragraph.\nSecond paragraph.");
}

#[tokio::test]
async fn unsupported_extension_names_supported_types() {
    let dir = TempDir::new().unwrap();
    let source = source_in(&dir, "legacy.doc", b"\xD0\xCF\x11\xE0");

    let err = FileExtractor::default()
        .extract(&source, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::Unsupported { ref extension, .. } if extension == "doc"));
    assert!(err.to_string().contains("pdf, docx, md, markdown, txt, html, htm"));
}

fn stored() -> zip::write::SimpleFileOptions {
    zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored)
}

fn docx(document_xml: &str) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("[Content_Types].xml", stored()).unwrap();
    zip.write_all(b"<?xml version=\"1.0\"?><Types/>").unwrap();
    zip.start_file("word/document.xml", stored()).unwrap();
    zip.write_all(document_xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

#[tokio::test]
async fn docx_paragraphs_are_extracted() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Reading &amp; Writing</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Chapter </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>one</w:t></w:r><w:r><w:tab/><w:t>&lt;intro&gt;</w:t></w:r></w:p>
<w:p></w:p>
<w:p><w:r><w:t>Line</w:t><w:br/><w:t>break &#233;t&#xE9;</w:t></w:r></w:p>
</w:body></w:document>"#;
    let dir = TempDir::new().unwrap();
    let source = source_in(&dir, "paper.docx", &docx(xml));

    let text = FileExtractor::default()
        .extract(&source, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        text,
        "Reading & Writing\n\nChapter one\t<intro>\n\nLine\nbreak été"
    );
}

#[test]
fn docx_without_body_part_is_a_parse_error() {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("readme.txt", stored()).unwrap();
    zip.write_all(b"hello").unwrap();
    let bytes = zip.finish().unwrap().into_inner();

    let err = docx_to_text(&bytes).unwrap_err();
    assert!(matches!(err, ExtractionError::Parse { format: "docx", .. }));
    assert!(err.to_string().contains("word/document.xml"));

    assert!(matches!(
        docx_to_text(b"plain text"),
        Err(ExtractionError::Parse { format: "docx", .. })
    ));
}

#[tokio::test]
async fn unreadable_pdf_fails_with_parse_error() {
    let dir = TempDir::new().unwrap();
    let source = source_in(&dir, "scan.pdf", b"this is not a pdf document");

    let err = FileExtractor::default()
        .extract(&source, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::Parse { format: "pdf", .. }), "{err}");
}

#[tokio::test]
async fn oversized_and_empty_files_are_rejected() {
    let dir = TempDir::new().unwrap();
    let extractor = FileExtractor::new(ExtractSettings {
        max_bytes: 8,
        ..ExtractSettings::default()
    });
    let cancel = CancellationToken::new();

    let big = source_in(&dir, "big.md", b"0123456789");
    assert!(matches!(
        extractor.extract(&big, &cancel).await,
        Err(ExtractionError::TooLarge {
            max_bytes: 8,
            actual: 10
        })
    ));

    let blank = source_in(&dir, "blank.md", b"  \n\t ");
    assert!(matches!(
        extractor.extract(&blank, &cancel).await,
        Err(ExtractionError::Empty)
    ));

    let missing = SourceDescriptor::new("gone.md", dir.path().join("gone.md"));
    assert!(matches!(
        extractor.extract(&missing, &cancel).await,
        Err(ExtractionError::Io(_))
    ));
}

#[tokio::test]
async fn cancelled_token_stops_extraction() {
    let dir = TempDir::new().unwrap();
    let source = source_in(&dir, "notes.txt", b"text");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = FileExtractor::default().extract(&source, &cancel).await;
    assert!(matches!(result, Err(ExtractionError::Cancelled)));
}

#[test]
fn legacy_encodings_are_detected() {
    let (bytes, _, _) = encoding_rs::GBK.encode("文献阅读指南：第一章介绍了研究背景和主要问题。");
    let decoded = decode_text(&bytes).unwrap();
    assert_eq!(decoded.text, "文献阅读指南：第一章介绍了研究背景和主要问题。");

    let bom = b"\xEF\xBB\xBFhello";
    let decoded = decode_text(bom).unwrap();
    assert_eq!(decoded.text, "hello");
    assert_eq!(decoded.encoding_label, "UTF-8");
}

#[test]
fn html_without_article_falls_back_to_body() {
    let text = html_to_text("<html><body><p>One</p><noscript>Enable JS</noscript><p>Two</p></body></html>");
    assert_eq!(text, "One\nTwo");
}
