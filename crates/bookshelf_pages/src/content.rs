use std::path::PathBuf;

use async_trait::async_trait;
use pulldown_cmark::{Event, Options, Parser, Tag, html};

use crate::{Language, PageError};

/// Where page markdown comes from, addressed by language and page path.
#[async_trait]
pub trait MarkdownSource: Send + Sync + 'static {
    async fn fetch(&self, language: Language, path: &str) -> Result<String, PageError>;
}

/// Reads `pages/<language>/<path>` below an asset root.
pub struct FileMarkdownSource {
    root: PathBuf,
}

impl FileMarkdownSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, language: Language, path: &str) -> PathBuf {
        self.root
            .join("pages")
            .join(language.as_str())
            .join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl MarkdownSource for FileMarkdownSource {
    async fn fetch(&self, language: Language, path: &str) -> Result<String, PageError> {
        let file = self.resolve(language, path);
        tokio::fs::read_to_string(&file)
            .await
            .map_err(|e| PageError::Fetch {
                language,
                path: path.to_owned(),
                message: format!("{}: {e}", file.display()),
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    List,
    Code,
    Rule,
    Text,
}

/// One top-level markdown block: sanitized HTML to display, plain text to measure.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub html: String,
    pub kind: BlockKind,
    /// Visible text, one entry per list item. Other blocks have a single entry.
    pub text: Vec<String>,
}

/// Splits markdown into top-level blocks (heading, paragraph, list, table...).
/// Blocks that sanitize to nothing are dropped.
pub fn render_markdown(markdown: &str) -> Vec<Block> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let mut blocks = Vec::new();
    let mut current: Vec<Event<'_>> = Vec::new();
    let mut depth = 0usize;

    for event in Parser::new_ext(markdown, options) {
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
        current.push(event);
        if depth == 0 {
            push_block(&mut blocks, std::mem::take(&mut current));
        }
    }
    push_block(&mut blocks, current);
    blocks
}

fn push_block(blocks: &mut Vec<Block>, events: Vec<Event<'_>>) {
    let kind = match events.first() {
        None => return,
        Some(Event::Start(Tag::Heading { level, .. })) => BlockKind::Heading(*level as u8),
        Some(Event::Start(Tag::List(_))) => BlockKind::List,
        Some(Event::Start(Tag::CodeBlock(_))) => BlockKind::Code,
        Some(Event::Rule) => BlockKind::Rule,
        Some(_) => BlockKind::Text,
    };

    let mut text = vec![String::new()];
    for event in &events {
        match event {
            Event::Start(Tag::Item) if text.last().is_some_and(|item| !item.is_empty()) => {
                text.push(String::new());
            }
            Event::Text(chunk) | Event::Code(chunk) => {
                if let Some(item) = text.last_mut() {
                    item.push_str(chunk);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(item) = text.last_mut() {
                    item.push(' ');
                }
            }
            _ => {}
        }
    }

    let mut raw = String::new();
    html::push_html(&mut raw, events.into_iter());
    let clean = ammonia::clean(&raw);
    let clean = clean.trim();
    if !clean.is_empty() {
        blocks.push(Block {
            html: clean.to_owned(),
            kind,
            text,
        });
    }
}
