use std::fs;
use std::io::{self, Cursor, Read};
use std::path::Path;

use async_trait::async_trait;
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;

use crate::decode::{decode_text, DecodeError};
use crate::SourceDescriptor;

#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub max_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            max_bytes: 50 * 1024 * 1024,
            allowed_extensions: ["pdf", "docx", "md", "markdown", "txt", "html", "htm"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("unsupported file type `{extension}`, supported types: {supported}")]
    Unsupported {
        extension: String,
        supported: String,
    },
    #[error("file too large (max {max_bytes} bytes, actual {actual})")]
    TooLarge { max_bytes: u64, actual: u64 },
    #[error("document has no text content")]
    Empty,
    #[error("cannot parse {format} document: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("extraction cancelled")]
    Cancelled,
}

/// Turns a source reference into plain text for the generator.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractionError>;
}

/// Reads local PDF, Word (`.docx`), text, markdown and HTML files.
#[derive(Debug, Clone, Default)]
pub struct FileExtractor {
    settings: ExtractSettings,
}

impl FileExtractor {
    pub fn new(settings: ExtractSettings) -> Self {
        Self { settings }
    }

    fn check_extension(&self, source: &SourceDescriptor) -> Result<String, ExtractionError> {
        let extension = source.extension().unwrap_or_default();
        if self
            .settings
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
        {
            Ok(extension)
        } else {
            Err(ExtractionError::Unsupported {
                extension,
                supported: self.settings.allowed_extensions.join(", "),
            })
        }
    }
}

#[async_trait]
impl Extractor for FileExtractor {
    async fn extract(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractionError> {
        let extension = self.check_extension(source)?;
        let path = source.path.clone();
        let max_bytes = self.settings.max_bytes;
        let task =
            tokio::task::spawn_blocking(move || read_document(&path, &extension, max_bytes));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExtractionError::Cancelled),
            joined = task => joined.map_err(|err| ExtractionError::Io(io::Error::other(err.to_string())))?,
        }
    }
}

fn read_document(path: &Path, extension: &str, max_bytes: u64) -> Result<String, ExtractionError> {
    let len = fs::metadata(path)?.len();
    if len > max_bytes {
        return Err(ExtractionError::TooLarge {
            max_bytes,
            actual: len,
        });
    }
    if len == 0 {
        return Err(ExtractionError::Empty);
    }

    let bytes = fs::read(path)?;
    let text = match extension {
        "pdf" => pdf_to_text(&bytes)?,
        "docx" => docx_to_text(&bytes)?,
        "html" | "htm" => html_to_text(&decode_text(&bytes)?.text),
        _ => decode_text(&bytes)?.text,
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractionError::Empty);
    }
    Ok(text.to_string())
}

/// Reduce an HTML document to readable text:
/// - `<title>` text first, if present
/// - then the text of `<article>`, else `<body>`, else the whole document
/// - script and style contents are dropped, one text run per line.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let title_sel = Selector::parse("title").ok();
    let article_sel = Selector::parse("article").ok();
    let body_sel = Selector::parse("body").ok();

    let title = title_sel
        .as_ref()
        .and_then(|sel| doc.select(sel).next())
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let content_root = [article_sel.as_ref(), body_sel.as_ref()]
        .into_iter()
        .flatten()
        .find_map(|sel| doc.select(sel).next())
        .unwrap_or_else(|| doc.root_element());

    let mut lines: Vec<String> = title.into_iter().collect();
    lines.extend(visible_text(content_root));
    lines.dedup();
    lines.join("\n")
}

fn visible_text(root: ElementRef<'_>) -> Vec<String> {
    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent().and_then(ElementRef::wrap)?;
            if matches!(parent.value().name(), "script" | "style" | "noscript" | "title") {
                return None;
            }
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

fn pdf_to_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|err| ExtractionError::Parse {
        format: "pdf",
        message: err.to_string(),
    })
}

const DOCX_BODY: &str = "word/document.xml";

/// Text of a `.docx` package: non-blank paragraphs separated by a blank line.
pub fn docx_to_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let parse_error = |message: String| ExtractionError::Parse {
        format: "docx",
        message,
    };
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|err| parse_error(err.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|err| parse_error(format!("{DOCX_BODY}: {err}")))?
        .read_to_string(&mut xml)?;

    let token = Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:br\s*/>|</w:p>")
        .map_err(|err| parse_error(err.to_string()))?;
    let entity = Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);")
        .map_err(|err| parse_error(err.to_string()))?;

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    for caps in token.captures_iter(&xml) {
        if let Some(run) = caps.get(1) {
            current.push_str(&entity.replace_all(run.as_str(), unescape_entity));
            continue;
        }
        match &caps[0] {
            tag if tag.starts_with("<w:tab") => current.push('\t'),
            tag if tag.starts_with("<w:br") => current.push('\n'),
            _ => {
                if !current.trim().is_empty() {
                    paragraphs.push(std::mem::take(&mut current));
                }
                current.clear();
            }
        }
    }
    if !current.trim().is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n\n"))
}

fn unescape_entity(caps: &Captures<'_>) -> String {
    let name = &caps[1];
    let decoded = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => name
            .strip_prefix("#x")
            .map(|hex| u32::from_str_radix(hex, 16))
            .or_else(|| name.strip_prefix('#').map(str::parse::<u32>))
            .and_then(Result::ok)
            .and_then(char::from_u32),
    };
    decoded.map_or_else(|| caps[0].to_string(), String::from)
}
