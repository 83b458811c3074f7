//! Markdown converter using pulldown-cmark.

use std::collections::HashMap;

use pulldown_cmark::{Alignment, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use thiserror::Error;
use tracing::debug;

use crate::{Converted, Converter};

/// Copy-to-clipboard control injected into every code block.
pub const COPY_BUTTON: &str = concat!(
    r#"<button class="copy-btn" aria-label="Copy">"#,
    r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" fill="none" "#,
    r#"stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round">"#,
    r#"<rect x="9" y="9" width="13" height="13" rx="2"/>"#,
    r#"<path d="M5 15H4a2 2 0 0 1-2-2V4a2 2 0 0 1 2-2h9a2 2 0 0 1 2 2v1"/>"#,
    r#"</svg></button>"#,
);

/// Markdown conversion errors.
#[derive(Debug, Error)]
pub enum MarkdownError {
    /// Input was not valid UTF-8.
    #[error("markdown is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Result type for markdown operations.
pub type Result<T> = std::result::Result<T, MarkdownError>;

/// A heading collected for the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// Heading level (1-6).
    pub level: u8,

    /// Heading text.
    pub text: String,

    /// Anchor ID for linking.
    pub id: String,
}

/// Markdown converter producing body and table-of-contents HTML.
#[derive(Debug, Clone)]
pub struct MarkdownConverter {
    options: Options,
    toc_depth: u8,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for MarkdownConverter {
    fn convert(&self, markdown: &[u8]) -> crate::Result<Converted> {
        let text = std::str::from_utf8(markdown).map_err(MarkdownError::from)?;
        Ok(self.convert_str(text))
    }
}

impl MarkdownConverter {
    /// Create a converter with tables, math, footnotes and task lists enabled.
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        options.insert(Options::ENABLE_MATH);

        Self {
            options,
            toc_depth: 3,
        }
    }

    /// Set the deepest heading level listed in the table of contents.
    #[must_use]
    pub fn with_toc_depth(mut self, depth: u8) -> Self {
        self.toc_depth = depth;
        self
    }

    /// Convert a Markdown body to HTML.
    pub fn convert_str(&self, content: &str) -> Converted {
        let events: Vec<Event<'_>> = Parser::new_ext(content, self.options).collect();
        let headings = collect_headings(&events);
        let body = inject_copy_buttons(&render_events(&events, &headings));
        let toc = toc_html(&headings, self.toc_depth);

        debug!(
            bytes = content.len(),
            headings = headings.len(),
            "converted markdown"
        );

        Converted { body, toc }
    }
}

/// Collect headings with unique anchor ids, in document order.
fn collect_headings(events: &[Event<'_>]) -> Vec<TocEntry> {
    let mut headings = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut current: Option<(u8, Option<String>, String)> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                current = Some((*level as u8, id.as_ref().map(|i| i.to_string()), String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, _, ref mut buf)) = current {
                    buf.push_str(text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, explicit, text)) = current.take() {
                    let base = explicit.unwrap_or_else(|| {
                        let slug = slugify(&text);
                        if slug.is_empty() { "section".to_string() } else { slug }
                    });
                    let count = seen.entry(base.clone()).or_insert(0);
                    let id = if *count == 0 {
                        base
                    } else {
                        format!("{base}-{count}")
                    };
                    *count += 1;
                    headings.push(TocEntry { level, text, id });
                }
            }
            _ => {}
        }
    }

    headings
}

/// Render parsed events to HTML.
fn render_events(events: &[Event<'_>], headings: &[TocEntry]) -> String {
    let mut html = String::new();
    let mut heading_ids = headings.iter().map(|h| h.id.as_str());
    let mut alignments: Vec<Alignment> = Vec::new();
    let mut in_table_head = false;
    let mut cell_index = 0;
    let mut i = 0;

    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::Paragraph) => {
                if let Some((figure, next)) = standalone_figure(events, i) {
                    html.push_str(&figure);
                    i = next;
                    continue;
                }
                html.push_str("<p>");
            }

            Event::Start(Tag::Heading { level, classes, .. }) => {
                let id = heading_ids.next().unwrap_or_default();
                let class_attr = if classes.is_empty() {
                    String::new()
                } else {
                    let joined: Vec<&str> = classes.iter().map(|c| c.as_ref()).collect();
                    format!(" class=\"{}\"", html_escape(&joined.join(" ")))
                };
                html.push_str(&format!("<h{} id=\"{id}\"{class_attr}>", *level as u8));
            }

            Event::Start(Tag::Image {
                dest_url, title, ..
            }) => {
                let (alt, end) = image_alt(events, i);
                html.push_str(&img_tag(dest_url, title, &alt));
                i = end + 1;
                continue;
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string)
                        .filter(|l| !l.is_empty()),
                    CodeBlockKind::Indented => None,
                };
                let mut code = String::new();
                i += 1;
                while i < events.len() {
                    match &events[i] {
                        Event::End(TagEnd::CodeBlock) => break,
                        Event::Text(text) => code.push_str(text),
                        _ => {}
                    }
                    i += 1;
                }
                match lang {
                    Some(lang) => html.push_str(&format!(
                        "<pre><code class=\"language-{}\">{}</code></pre>\n",
                        html_escape(&lang),
                        html_escape(&code)
                    )),
                    None => {
                        html.push_str(&format!("<pre><code>{}</code></pre>\n", html_escape(&code)));
                    }
                }
            }

            Event::Start(Tag::Table(aligns)) => {
                alignments = aligns.clone();
                html.push_str("<table>\n");
            }
            Event::Start(Tag::TableHead) => {
                in_table_head = true;
                cell_index = 0;
                html.push_str("<thead>\n<tr>");
            }
            Event::End(TagEnd::TableHead) => {
                in_table_head = false;
                html.push_str("</tr>\n</thead>\n<tbody>\n");
            }
            Event::Start(Tag::TableRow) => {
                cell_index = 0;
                html.push_str("<tr>");
            }
            Event::Start(Tag::TableCell) => {
                let tag = if in_table_head { "th" } else { "td" };
                let style = match alignments.get(cell_index) {
                    Some(Alignment::Left) => " style=\"text-align: left\"",
                    Some(Alignment::Center) => " style=\"text-align: center\"",
                    Some(Alignment::Right) => " style=\"text-align: right\"",
                    _ => "",
                };
                html.push_str(&format!("<{tag}{style}>"));
            }
            Event::End(TagEnd::TableCell) => {
                html.push_str(if in_table_head { "</th>" } else { "</td>" });
                cell_index += 1;
            }
            Event::End(TagEnd::Table) => {
                html.push_str("</tbody>\n</table>\n");
            }

            Event::Start(tag) => html.push_str(&tag_to_html_start(tag)),
            Event::End(tag) => html.push_str(&tag_to_html_end(tag)),

            Event::Text(text) => html.push_str(&html_escape(text)),
            Event::Code(code) => {
                html.push_str(&format!("<code>{}</code>", html_escape(code)));
            }
            Event::Html(raw) | Event::InlineHtml(raw) => html.push_str(raw),
            Event::SoftBreak => html.push('\n'),
            Event::HardBreak => html.push_str("<br />\n"),
            Event::Rule => html.push_str("<hr />\n"),
            Event::FootnoteReference(name) => {
                let name = html_escape(name);
                html.push_str(&format!(
                    "<sup class=\"footnote-ref\"><a href=\"#fn-{name}\">[{name}]</a></sup>"
                ));
            }
            Event::TaskListMarker(checked) => {
                html.push_str(if *checked {
                    "<input type=\"checkbox\" checked disabled /> "
                } else {
                    "<input type=\"checkbox\" disabled /> "
                });
            }
            Event::InlineMath(math) => {
                html.push_str(&format!(
                    "<span class=\"math inline\">\\({}\\)</span>",
                    html_escape(math)
                ));
            }
            Event::DisplayMath(math) => {
                html.push_str(&format!(
                    "<span class=\"math display\">\\[{}\\]</span>",
                    html_escape(math)
                ));
            }
        }
        i += 1;
    }

    html
}

/// Detect a paragraph holding a single captioned image and render it as a
/// figure. Returns the HTML and the index just past the paragraph.
fn standalone_figure(events: &[Event<'_>], start: usize) -> Option<(String, usize)> {
    let Some(Event::Start(Tag::Image {
        dest_url, title, ..
    })) = events.get(start + 1)
    else {
        return None;
    };
    let (alt, end) = image_alt(events, start + 1);
    if !matches!(events.get(end + 1), Some(Event::End(TagEnd::Paragraph))) || alt.is_empty() {
        return None;
    }

    let figure = format!(
        "<figure>\n{}\n<figcaption aria-hidden=\"true\">{}</figcaption>\n</figure>\n",
        img_tag(dest_url, title, &alt),
        html_escape(&alt)
    );
    Some((figure, end + 2))
}

/// Collect the alt text of the image starting at `start`. Returns the text and
/// the index of the closing image event.
fn image_alt(events: &[Event<'_>], start: usize) -> (String, usize) {
    let mut alt = String::new();
    let mut depth = 0;
    let mut i = start;
    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::Image { .. }) => depth += 1,
            Event::End(TagEnd::Image) => {
                depth -= 1;
                if depth == 0 {
                    return (alt, i);
                }
            }
            Event::Text(text) | Event::Code(text) => alt.push_str(text),
            _ => {}
        }
        i += 1;
    }
    (alt, events.len().saturating_sub(1))
}

fn img_tag(src: &str, title: &str, alt: &str) -> String {
    let title_attr = if title.is_empty() {
        String::new()
    } else {
        format!(" title=\"{}\"", html_escape(title))
    };
    format!(
        "<img src=\"{}\" alt=\"{}\"{title_attr} />",
        html_escape(src),
        html_escape(alt)
    )
}

/// Convert a pulldown-cmark tag to HTML opening tag.
fn tag_to_html_start(tag: &Tag<'_>) -> String {
    match tag {
        Tag::Paragraph => "<p>".to_string(),
        Tag::BlockQuote(_) => "<blockquote>\n".to_string(),
        Tag::List(Some(1)) => "<ol>\n".to_string(),
        Tag::List(Some(start)) => format!("<ol start=\"{start}\">\n"),
        Tag::List(None) => "<ul>\n".to_string(),
        Tag::Item => "<li>".to_string(),
        Tag::FootnoteDefinition(name) => {
            format!("<div class=\"footnote\" id=\"fn-{}\">", html_escape(name))
        }
        Tag::Emphasis => "<em>".to_string(),
        Tag::Strong => "<strong>".to_string(),
        Tag::Strikethrough => "<del>".to_string(),
        Tag::Link {
            dest_url, title, ..
        } => {
            let title_attr = if title.is_empty() {
                String::new()
            } else {
                format!(" title=\"{}\"", html_escape(title))
            };
            format!("<a href=\"{}\"{}>", html_escape(dest_url), title_attr)
        }
        Tag::DefinitionList => "<dl>\n".to_string(),
        Tag::DefinitionListTitle => "<dt>".to_string(),
        Tag::DefinitionListDefinition => "<dd>".to_string(),
        Tag::Superscript => "<sup>".to_string(),
        Tag::Subscript => "<sub>".to_string(),
        // Rendered by the caller.
        Tag::Heading { .. }
        | Tag::CodeBlock(_)
        | Tag::Image { .. }
        | Tag::Table(_)
        | Tag::TableHead
        | Tag::TableRow
        | Tag::TableCell
        | Tag::HtmlBlock
        | Tag::MetadataBlock(_) => String::new(),
    }
}

/// Convert a pulldown-cmark tag end to HTML closing tag.
fn tag_to_html_end(tag: &TagEnd) -> String {
    match tag {
        TagEnd::Paragraph => "</p>\n".to_string(),
        TagEnd::Heading(level) => format!("</h{}>\n", *level as u8),
        TagEnd::BlockQuote(_) => "</blockquote>\n".to_string(),
        TagEnd::List(true) => "</ol>\n".to_string(),
        TagEnd::List(false) => "</ul>\n".to_string(),
        TagEnd::Item => "</li>\n".to_string(),
        TagEnd::FootnoteDefinition => "</div>\n".to_string(),
        TagEnd::TableRow => "</tr>\n".to_string(),
        TagEnd::Emphasis => "</em>".to_string(),
        TagEnd::Strong => "</strong>".to_string(),
        TagEnd::Strikethrough => "</del>".to_string(),
        TagEnd::Link => "</a>".to_string(),
        TagEnd::DefinitionList => "</dl>\n".to_string(),
        TagEnd::DefinitionListTitle => "</dt>\n".to_string(),
        TagEnd::DefinitionListDefinition => "</dd>\n".to_string(),
        TagEnd::Superscript => "</sup>".to_string(),
        TagEnd::Subscript => "</sub>".to_string(),
        TagEnd::CodeBlock
        | TagEnd::Image
        | TagEnd::Table
        | TagEnd::TableHead
        | TagEnd::TableCell
        | TagEnd::HtmlBlock
        | TagEnd::MetadataBlock(_) => String::new(),
    }
}

/// Render the table of contents as nested lists inside `<nav id="TOC">`.
fn toc_html(headings: &[TocEntry], depth: u8) -> String {
    let entries: Vec<&TocEntry> = headings.iter().filter(|h| h.level <= depth).collect();
    if entries.is_empty() {
        return String::new();
    }

    let mut html = String::from("<nav id=\"TOC\" role=\"doc-toc\">\n");
    let mut open: Vec<u8> = Vec::new();

    for entry in entries {
        while open.len() > 1 && open.last().is_some_and(|&top| top > entry.level) {
            html.push_str("</li>\n</ul>\n");
            open.pop();
        }
        match open.last() {
            Some(&top) if entry.level <= top => html.push_str("</li>\n"),
            _ => {
                html.push_str("<ul>\n");
                open.push(entry.level);
            }
        }
        html.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            entry.id,
            html_escape(&entry.text)
        ));
    }
    while open.pop().is_some() {
        html.push_str("</li>\n</ul>\n");
    }

    html.push_str("</nav>");
    html
}

/// Insert the copy button at the end of every `<pre>` block.
fn inject_copy_buttons(html: &str) -> String {
    html.replace("</pre>", &format!("{COPY_BUTTON}</pre>"))
}

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Convert text to a URL-safe slug.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(md: &str) -> Converted {
        MarkdownConverter::new().convert_str(md)
    }

    #[test]
    fn test_simple_markdown() {
        let out = convert("# Hello World\n\nThis is a test.");
        assert!(out.body.contains("<h1 id=\"hello-world\">Hello World</h1>"));
        assert!(out.body.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_code_block_gets_copy_button() {
        let out = convert("```rust\nfn main() {}\n```");
        assert!(out.body.contains("<code class=\"language-rust\">fn main() {}\n</code>"));
        assert!(out.body.contains("class=\"copy-btn\""));
        assert!(out.body.contains("</button></pre>"));
    }

    #[test]
    fn test_toc_nested() {
        let out = convert("# One\n\n## Two\n\n### Three\n\n#### Four\n\n# Five");
        assert!(out.toc.starts_with("<nav id=\"TOC\""));
        assert!(out.toc.contains("<a href=\"#one\">One</a><ul>"));
        assert!(out.toc.contains("#three"));
        assert!(!out.toc.contains("#four"));
        assert!(out.toc.contains("#five"));
        assert_eq!(out.toc.matches("<ul>").count(), out.toc.matches("</ul>").count());
    }

    #[test]
    fn test_toc_empty_without_headings() {
        assert!(convert("just text").toc.is_empty());
    }

    #[test]
    fn test_duplicate_heading_ids() {
        let out = convert("## Notes\n\n## Notes");
        assert!(out.body.contains("id=\"notes\""));
        assert!(out.body.contains("id=\"notes-1\""));
    }

    #[test]
    fn test_table_rendering() {
        let out = convert("| Header 1 | Header 2 |\n|:---|---:|\n| Cell 1 | Cell 2 |");
        assert!(out.body.contains("<table>"));
        assert!(out.body.contains("<th style=\"text-align: left\">Header 1</th>"));
        assert!(out.body.contains("<td style=\"text-align: right\">Cell 2</td>"));
    }

    #[test]
    fn test_math() {
        let out = convert("Inline $E = mc^2$ and\n\n$$\\int x$$");
        assert!(out.body.contains("<span class=\"math inline\">\\(E = mc^2\\)</span>"));
        assert!(out.body.contains("<span class=\"math display\">"));
    }

    #[test]
    fn test_standalone_image_becomes_figure() {
        let out = convert("![A cat](cat.png)");
        assert!(out.body.contains("<figure>"));
        assert!(out.body.contains("<img src=\"cat.png\" alt=\"A cat\" />"));
        assert!(out.body.contains("<figcaption aria-hidden=\"true\">A cat</figcaption>"));
    }

    #[test]
    fn test_inline_image_stays_inline() {
        let out = convert("Look ![icon](i.png) here");
        assert!(!out.body.contains("<figure>"));
        assert!(out.body.contains("<img src=\"i.png\" alt=\"icon\" />"));
    }

    #[test]
    fn test_task_list() {
        let out = convert("- [x] Done\n- [ ] Not done");
        assert!(out.body.contains("checkbox"));
        assert!(out.body.contains("checked"));
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let result = MarkdownConverter::new().convert(&[0xff, 0xfe, 0x00]);
        assert!(result.is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Test 123 Post"), "test-123-post");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
        assert_eq!(slugify("Special!@#Chars"), "specialchars");
    }
}
