//! Restricted markdown rendering for assistant messages.
//!
//! Only bold, italic, inline code, fenced code blocks and line breaks become
//! markup. Everything else is emitted as escaped source text: links and images
//! keep their `[text](url)` form, block quotes keep their `> ` prefix, list
//! items and headings keep their markers. Code spans and fenced blocks are
//! never processed for emphasis.
//!
//! The output is an HTML fragment for hosts that embed the library. The
//! terminal host prints message text as received.

use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{Arena, ComrakOptions, parse_document};
use once_cell::sync::Lazy;

static MARKDOWN_OPTIONS: Lazy<ComrakOptions> = Lazy::new(ComrakOptions::default);

const LINE_BREAK: &str = "<br />";
const QUOTE_MARKER: &str = "&gt; ";

pub fn render_markdown(md: &str) -> String {
    let arena = Arena::new();
    let root = parse_document(&arena, md, &MARKDOWN_OPTIONS);
    let mut out = String::new();
    render_blocks(root, &mut out);
    out
}

/// Escapes text for non-assistant messages, which are never markdown.
pub fn render_plain(text: &str) -> String {
    let mut out = String::new();
    push_text_lines(text, &mut out);
    out
}

// Sibling blocks are separated by one break per source line between them,
// so a blank line between paragraphs renders as two breaks.
fn render_blocks<'a>(parent: &'a AstNode<'a>, out: &mut String) {
    let mut previous_end: Option<usize> = None;
    for child in parent.children() {
        let (start, end) = {
            let ast = child.data.borrow();
            (ast.sourcepos.start.line, ast.sourcepos.end.line)
        };
        if let Some(previous) = previous_end {
            for _ in 0..start.saturating_sub(previous).max(1) {
                out.push_str(LINE_BREAK);
            }
        }
        render_block(child, out);
        previous_end = Some(end);
    }
}

fn render_block<'a>(node: &'a AstNode<'a>, out: &mut String) {
    let ast = node.data.borrow();
    match &ast.value {
        NodeValue::Paragraph => render_inlines(node, out),
        NodeValue::Heading(heading) => {
            if !heading.setext {
                out.push_str(&"#".repeat(heading.level as usize));
                out.push(' ');
            }
            render_inlines(node, out);
        }
        NodeValue::CodeBlock(block) if block.fenced => {
            out.push_str("<pre><code>");
            escape_into(&block.literal, out);
            out.push_str("</code></pre>");
        }
        NodeValue::CodeBlock(block) => push_text_lines(block.literal.trim_end_matches('\n'), out),
        NodeValue::HtmlBlock(html) => push_text_lines(html.literal.trim_end_matches('\n'), out),
        NodeValue::ThematicBreak => out.push_str("---"),
        NodeValue::BlockQuote => {
            let mut inner = String::new();
            render_blocks(node, &mut inner);
            out.push_str(QUOTE_MARKER);
            out.push_str(&inner.replace(LINE_BREAK, &format!("{LINE_BREAK}{QUOTE_MARKER}")));
        }
        NodeValue::Item(item) => {
            match item.list_type {
                ListType::Bullet => {
                    out.push(item.bullet_char as char);
                    out.push(' ');
                }
                ListType::Ordered => out.push_str(&format!("{}. ", item.start)),
            }
            render_blocks(node, out);
        }
        _ => render_blocks(node, out),
    }
}

fn render_inlines<'a>(node: &'a AstNode<'a>, out: &mut String) {
    for child in node.children() {
        render_inline(child, out);
    }
}

fn render_inline<'a>(node: &'a AstNode<'a>, out: &mut String) {
    let ast = node.data.borrow();
    match &ast.value {
        NodeValue::Text(text) => escape_into(text, out),
        NodeValue::Strong => {
            out.push_str("<strong>");
            render_inlines(node, out);
            out.push_str("</strong>");
        }
        NodeValue::Emph => {
            out.push_str("<em>");
            render_inlines(node, out);
            out.push_str("</em>");
        }
        NodeValue::Code(code) => {
            out.push_str("<code>");
            escape_into(&code.literal, out);
            out.push_str("</code>");
        }
        NodeValue::SoftBreak | NodeValue::LineBreak => out.push_str(LINE_BREAK),
        NodeValue::HtmlInline(raw) => escape_into(raw, out),
        NodeValue::Link(link) => {
            let mut label = String::new();
            render_inlines(node, &mut label);
            let mut url = String::new();
            escape_into(&link.url, &mut url);
            // Autolinks show the address itself.
            if label == url {
                out.push_str(&url);
            } else {
                push_link_source("[", &label, &url, &link.title, out);
            }
        }
        NodeValue::Image(link) => {
            let mut alt = String::new();
            render_inlines(node, &mut alt);
            let mut url = String::new();
            escape_into(&link.url, &mut url);
            push_link_source("![", &alt, &url, &link.title, out);
        }
        _ => render_inlines(node, out),
    }
}

fn push_link_source(open: &str, label: &str, url: &str, title: &str, out: &mut String) {
    out.push_str(open);
    out.push_str(label);
    out.push_str("](");
    out.push_str(url);
    if !title.is_empty() {
        out.push_str(" &quot;");
        escape_into(title, out);
        out.push_str("&quot;");
    }
    out.push(')');
}

fn push_text_lines(text: &str, out: &mut String) {
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            out.push_str(LINE_BREAK);
        }
        escape_into(line, out);
    }
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_and_inline_code() {
        let html = render_markdown("**bold** and `code`");
        assert_eq!(html, "<strong>bold</strong> and <code>code</code>");
        assert!(!html.contains('*'));
        assert!(!html.contains('`'));
    }

    #[test]
    fn test_italic() {
        assert_eq!(render_markdown("an *easy* stay"), "an <em>easy</em> stay");
    }

    #[test]
    fn test_code_span_not_emphasized() {
        assert_eq!(
            render_markdown("use `**raw**` here"),
            "use <code>**raw**</code> here"
        );
    }

    #[test]
    fn test_fenced_block_kept_verbatim() {
        let html = render_markdown("Run:\n\n```\nlet *x* = 1;\n```");
        assert_eq!(
            html,
            "Run:<br /><br /><pre><code>let *x* = 1;\n</code></pre>"
        );
    }

    #[test]
    fn test_line_breaks() {
        assert_eq!(
            render_markdown("Check-in: 2pm\nCheck-out: 11am"),
            "Check-in: 2pm<br />Check-out: 11am"
        );
    }

    #[test]
    fn test_html_is_escaped() {
        assert_eq!(
            render_markdown("Hi <b onclick=\"x\">there</b> **ok**"),
            "Hi &lt;b onclick=&quot;x&quot;&gt;there&lt;/b&gt; <strong>ok</strong>"
        );
    }

    #[test]
    fn test_list_keeps_markers() {
        assert_eq!(
            render_markdown("- **Pool**\n- Spa"),
            "- <strong>Pool</strong><br />- Spa"
        );
    }

    #[test]
    fn test_link_keeps_destination() {
        assert_eq!(
            render_markdown("Book at [Gardeo](https://gardeo.example/book) now"),
            "Book at [Gardeo](https://gardeo.example/book) now"
        );
        assert_eq!(
            render_markdown("[**Deluxe**](https://gardeo.example/r?a=1&b=2)"),
            "[<strong>Deluxe</strong>](https://gardeo.example/r?a=1&amp;b=2)"
        );
    }

    #[test]
    fn test_autolink_shows_address() {
        assert_eq!(
            render_markdown("See <https://gardeo.example>"),
            "See https://gardeo.example"
        );
    }

    #[test]
    fn test_image_keeps_source() {
        assert_eq!(
            render_markdown("![map](https://m.example/x.png)"),
            "![map](https://m.example/x.png)"
        );
    }

    #[test]
    fn test_block_quote_keeps_marker() {
        assert_eq!(render_markdown("> Free cancellation"), "&gt; Free cancellation");
        assert_eq!(
            render_markdown("> Free cancellation\n> until **Friday**"),
            "&gt; Free cancellation<br />&gt; until <strong>Friday</strong>"
        );
    }

    #[test]
    fn test_render_plain() {
        assert_eq!(render_plain("a <b>\nc"), "a &lt;b&gt;<br />c");
    }
}
