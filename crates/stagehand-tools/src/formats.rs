//! Turning downloaded document bytes into text.

use scraper::{Html, Node};

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Plain text, markdown, JSON, XML and similar.
    Text,
    /// HTML, reduced to its visible text.
    Html,
    /// Comma separated values, rendered as a markdown table.
    Csv,
    /// Tab separated values, rendered as a markdown table.
    Tsv,
    /// PDF, text layer only.
    Pdf,
}

impl DocumentFormat {
    /// Pick a format from the response content type, or from the URL's
    /// extension when the content type says nothing useful.
    ///
    /// Returns `None` for formats with no text (images, archives, ...).
    pub fn detect(content_type: Option<&str>, url: &str) -> Option<Self> {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|m| m.trim().to_ascii_lowercase());

        match mime.as_deref() {
            Some("application/octet-stream") | Some("") | None => Self::from_extension(url),
            Some(m) => Self::from_mime(m),
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/pdf" => Some(Self::Pdf),
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "text/csv" | "application/csv" => Some(Self::Csv),
            "text/tab-separated-values" => Some(Self::Tsv),
            m if m.starts_with("text/") || m.ends_with("json") || m.ends_with("xml") => {
                Some(Self::Text)
            }
            _ => None,
        }
    }

    fn from_extension(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let (_, ext) = path.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "html" | "htm" => Some(Self::Html),
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "txt" | "md" | "json" | "xml" | "log" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Visible text of an HTML document, one text run per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut lines = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

/// Render delimited data as a markdown table, first record as the header.
///
/// Short rows are padded so every row has as many cells as the widest one.
pub fn delimited_to_markdown(bytes: &[u8], delimiter: u8) -> Result<String, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(markdown_cell).collect());
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return Ok(String::new());
    }

    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        out.push_str(&markdown_row(row, width));
        if i == 0 {
            out.push_str(&markdown_row(&vec!["---".to_string(); width], width));
        }
    }
    Ok(out)
}

fn markdown_cell(value: &str) -> String {
    value
        .replace('|', "\\|")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn markdown_row(cells: &[String], width: usize) -> String {
    let mut row = String::from("|");
    for i in 0..width {
        row.push(' ');
        row.push_str(cells.get(i).map(String::as_str).unwrap_or(""));
        row.push_str(" |");
    }
    row.push('\n');
    row
}

/// Text layer of a PDF.
///
/// Returns `None` when the file cannot be parsed. The parser can panic on
/// some embedded fonts, so it runs under `catch_unwind`.
pub fn pdf_to_text(bytes: &[u8]) -> Option<String> {
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));

    match result {
        Ok(Ok(text)) => Some(text),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "failed to extract PDF text");
            None
        }
        Err(_) => {
            tracing::warn!("PDF text extraction panicked");
            None
        }
    }
}
