//! Paginated file content extraction.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::context::ToolContext;
use crate::error::Result;
use crate::extract::{SharedExtractor, non_empty};
use crate::tool::{FileContentParams, Tool, ToolResult};

/// Characters per page.
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

/// Content returned when a document has no text.
pub const FILE_NOT_FOUND: &str = "Error: File content not found.";

/// Cut one page out of `text`.
///
/// Text that fits in a single page is returned whole. Otherwise pages are
/// `page_size` characters long, a page below 1 is treated as page 1, and a
/// page past the end yields an error message naming the page count.
pub fn paginate(text: &str, page: i64, page_size: usize) -> String {
    let page_size = page_size.max(1);
    let len = text.chars().count();
    if len <= page_size {
        return text.to_string();
    }

    let total = len.div_ceil(page_size);
    let page = usize::try_from(page.max(1)).unwrap_or(usize::MAX);
    if page > total {
        return format!("Error: Page {page} does not exist. Total pages: {total}");
    }

    let slice: String = text
        .chars()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();
    format!("{slice}\n\n**Page #{page}. Total pages: {total}**")
}

/// Returns the text of a file, one page at a time for large files.
pub struct FileContentExtractionTool {
    extractor: SharedExtractor,
    page_size: usize,
    description: String,
}

impl FileContentExtractionTool {
    pub fn new(extractor: SharedExtractor) -> Self {
        Self::with_page_size(extractor, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(extractor: SharedExtractor, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let description = format!(
            "Extracts text content from files. Supported: PDF (text only), TXT, CSV (as markdown \
             table), HTML/HTM. PAGINATION: Files over {page_size} characters are paginated. \
             Response format: `**Page #X. Total pages: Y**` appears at the end if paginated. \
             USAGE: Start with page=1 (the default) and request further pages only when needed."
        );
        Self {
            extractor,
            page_size,
            description,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

impl std::fmt::Debug for FileContentExtractionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileContentExtractionTool")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FileContentExtractionTool {
    fn name(&self) -> &str {
        "file_content_extractor"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_url": {
                    "type": "string",
                    "description": "URL of the file to extract content from."
                },
                "page": {
                    "type": "integer",
                    "description": format!(
                        "For large documents pagination is enabled. Each page consists of {} characters.",
                        self.page_size
                    ),
                    "default": 1
                }
            },
            "required": ["file_url"]
        })
    }

    fn show_in_stage(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &ToolContext) -> Result<ToolResult> {
        let params = FileContentParams::try_from(ctx.arguments()?)?;
        let transcript = &ctx.transcript;

        transcript.append_content("## Request arguments: \n");
        transcript.append_content(&format!("**File URL**: {}\n\r", params.file_url));
        if params.page > 1 {
            transcript.append_content(&format!("**Page**: {}\n\r", params.page));
        }
        transcript.append_content("## Response: \n");

        let text = non_empty(
            self.extractor
                .extract_text(&params.file_url, ctx.credential())
                .await?,
        );

        let content = match text {
            Some(text) => paginate(&text, params.page, self.page_size),
            None => {
                tracing::debug!(file_url = %params.file_url, "no text extracted from file");
                FILE_NOT_FOUND.to_string()
            }
        };

        transcript.append_content(&format!("```text\n\r{content}\n\r```\n\r"));
        Ok(ToolResult::text(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RecordingSink;
    use crate::extract::MockExtractor;
    use crate::tool::MAX_DESCRIPTION_CHARS;
    use std::sync::Arc;

    fn numbered(len: usize) -> String {
        (0..len).map(|i| char::from(b'a' + (i % 26) as u8)).collect()
    }

    #[test]
    fn test_short_text_is_whole() {
        assert_eq!(paginate("short", 1, 10), "short");
        // Page is ignored when there is only one page.
        assert_eq!(paginate("short", 7, 10), "short");
        assert_eq!(paginate(&"x".repeat(10), 2, 10), "x".repeat(10));
    }

    #[test]
    fn test_page_count() {
        let text = numbered(25);
        assert!(paginate(&text, 3, 10).ends_with("**Page #3. Total pages: 3**"));
        assert_eq!(
            paginate(&text, 4, 10),
            "Error: Page 4 does not exist. Total pages: 3"
        );

        let exact = numbered(30);
        assert!(paginate(&exact, 3, 10).ends_with("Total pages: 3**"));
        let over = numbered(31);
        assert!(paginate(&over, 4, 10).ends_with("Total pages: 4**"));
    }

    #[test]
    fn test_page_below_one_is_clamped() {
        let text = numbered(25);
        let first = paginate(&text, 1, 10);
        assert_eq!(paginate(&text, 0, 10), first);
        assert_eq!(paginate(&text, -3, 10), first);
        assert!(first.starts_with(&text[..10]));
    }

    #[test]
    fn test_pages_count_characters() {
        // 3-byte characters: byte slicing would split them.
        let text = "€".repeat(15);
        let page = paginate(&text, 2, 10);
        assert_eq!(page, format!("{}\n\n**Page #2. Total pages: 2**", "€".repeat(5)));
    }

    #[test]
    fn test_metadata() {
        let tool = FileContentExtractionTool::new(Arc::new(MockExtractor::new()));
        assert_eq!(tool.name(), "file_content_extractor");
        assert!(!tool.show_in_stage());
        assert!(tool.description().chars().count() <= MAX_DESCRIPTION_CHARS);
        assert_eq!(tool.parameters()["required"][0], "file_url");
        assert_eq!(tool.parameters()["properties"]["page"]["default"], 1);
    }

    #[tokio::test]
    async fn test_transcript_for_second_page() {
        let extractor = MockExtractor::new().with_document("files/big.txt", numbered(25_000));
        let tool = FileContentExtractionTool::new(Arc::new(extractor));
        let sink = Arc::new(RecordingSink::new());
        let ctx = ToolContext::new("conv", r#"{"file_url": "files/big.txt", "page": 2}"#)
            .with_transcript(sink.clone());

        let result = tool.execute(&ctx).await.unwrap();
        assert!(result.content().ends_with("**Page #2. Total pages: 3**"));

        let writes = sink.content_writes();
        assert_eq!(writes[0], "## Request arguments: \n");
        assert_eq!(writes[1], "**File URL**: files/big.txt\n\r");
        assert_eq!(writes[2], "**Page**: 2\n\r");
        assert_eq!(writes[3], "## Response: \n");
        assert_eq!(writes[4], format!("```text\n\r{}\n\r```\n\r", result.content()));
    }

    #[tokio::test]
    async fn test_unparsable_page_reads_first_page() {
        let extractor = MockExtractor::new().with_document("files/big.txt", numbered(25_000));
        let tool = FileContentExtractionTool::new(Arc::new(extractor));

        for page in [json!("two"), json!(1.5), json!(true)] {
            let ctx = ToolContext::new(
                "conv",
                json!({"file_url": "files/big.txt", "page": page}).to_string(),
            );
            let result = tool.execute(&ctx).await.unwrap();
            assert!(result.content().starts_with(&numbered(10)));
            assert!(result.content().ends_with("**Page #1. Total pages: 3**"));
        }
    }

    #[tokio::test]
    async fn test_missing_content() {
        let extractor = MockExtractor::new().with_document("files/blank.txt", "   \n");
        let tool = FileContentExtractionTool::new(Arc::new(extractor));
        let sink = Arc::new(RecordingSink::new());

        for url in ["files/blank.txt", "files/absent.pdf"] {
            let ctx = ToolContext::new("conv", json!({"file_url": url}).to_string())
                .with_transcript(sink.clone());
            let result = tool.execute(&ctx).await.unwrap();
            assert_eq!(result.content(), FILE_NOT_FOUND);
        }
        // Page line only appears for pages past the first.
        assert!(!sink.content().contains("**Page**"));
    }

    #[tokio::test]
    async fn test_missing_file_url_is_fatal() {
        let tool = FileContentExtractionTool::new(Arc::new(MockExtractor::new()));
        let ctx = ToolContext::new("conv", r#"{"page": 2}"#);
        assert!(tool.execute(&ctx).await.is_err());
    }
}
