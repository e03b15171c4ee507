//! Markdown rendering: assistant text → sanitized, styled HTML fragment.
//!
//! Replies from the coach mix plain prose, CommonMark and a few house
//! conventions (`**Answer:**` section labels, `*(source: …, loc: …)*`
//! citations, a trailing signature). Rendering runs in two stages:
//!
//! 1. **Preprocess**: plain-text rewrites that turn the house conventions
//!    into standard Markdown or into a small set of known `<div>` containers.
//! 2. **Convert**: pulldown-cmark parses the result; the event stream is
//!    rewritten so every element carries its `markdown-*` class and links
//!    open in a new tab.
//!
//! Raw HTML written by the agent is never passed through. Stage 1 marks the
//! container tags it emits with a private-use character that is stripped from
//! the input first, so agent text can never forge one. Only marked block tags
//! survive; inline HTML and everything else is emitted as escaped text.
//!
//! Rendering is total. Text without Markdown is returned as an escaped
//! `white-space: pre-wrap` span, and so is the original input if conversion
//! fails.

use crate::config::{AssistantIdentity, RenderOptions};
use crate::pipeline::normalize::strip_wrapping_quotes;
use crate::pipeline::segment::signature_regex;
use once_cell::sync::Lazy;
use pulldown_cmark::{
    html, CodeBlockKind, CowStr, Event, HeadingLevel, LinkType, Options, Parser, Tag, TagEnd,
};
use regex::Regex;
use tracing::{debug, warn};

/// Section labels and the container class each one opens.
const SECTION_LABELS: &[(&str, &str)] = &[
    ("**Answer:**", "markdown-answer"),
    ("**How it applies:**", "markdown-application"),
    ("**Next steps:**", "markdown-next-step"),
    ("**Next step:**", "markdown-next-step"),
];

// ── Detection patterns ───────────────────────────────────────────────────────

static MARKDOWN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\*\*.*?\*\*",           // bold
        r"\*.*?\*",               // italic
        r"(?m)^#{1,6}\s",         // headings
        r"(?m)^[-*+]\s",          // unordered lists
        r"(?m)^\d+\.\s",          // ordered lists
        r"`.*?`",                 // inline code
        r"(?s)```.*?```",         // fenced code
        r"(?m)^>\s",              // blockquotes
        r"\[.*?\]\(.*?\)",        // links
        r"\*\*Answer:\*\*",
        r"\*\*How it applies:\*\*",
        r"\*\*Next steps?:\*\*",
        r"\*\(source:.*?\)\*",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

// ── Preprocessing patterns ───────────────────────────────────────────────────

static RE_EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static RE_ATTRIBUTED_QUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)"\s*\(([^)\n]*?)\)"#).unwrap());

static RE_CODE_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)\n]*?Code Sections[^)\n]*?)\)").unwrap());

static RE_SOURCE_CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\(source: ([^,]+), loc: ([^)]+)\)\*").unwrap());

static RE_SECTION_LABEL: Lazy<Regex> = Lazy::new(|| {
    let alternation = SECTION_LABELS
        .iter()
        .map(|(label, _)| regex::escape(label))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?:{})[ \t]*", alternation)).unwrap()
});

/// Marks container tags emitted by [`MarkdownRenderer::preprocess`].
const TRUSTED_MARK: char = '\u{E000}';

/// Marked tags with escaped text between them; the only raw HTML allowed through.
static RE_TRUSTED_HTML: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:<div class="markdown-[a-z-]+" \x{E000}>|</div \x{E000}>|[^<>])*$"#)
        .unwrap()
});

fn open_div(class: &str) -> String {
    format!("<div class=\"{}\" {}>", class, TRUSTED_MARK)
}

fn close_div() -> String {
    format!("</div {}>", TRUSTED_MARK)
}

/// Renderer bound to one option set and one assistant identity.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: RenderOptions,
    identity: AssistantIdentity,
    signature: Option<Regex>,
}

impl MarkdownRenderer {
    pub fn new(options: RenderOptions, identity: AssistantIdentity) -> Self {
        let signature = signature_regex(&identity);
        Self {
            options,
            identity,
            signature,
        }
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    pub fn identity(&self) -> &AssistantIdentity {
        &self.identity
    }

    /// True if `text` uses any Markdown construct or house convention.
    pub fn contains_markdown(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        MARKDOWN_PATTERNS.iter().any(|re| re.is_match(text))
            || self
                .signature
                .as_ref()
                .is_some_and(|re| re.is_match(text.trim_end()))
    }

    /// Render `text` as an HTML fragment. Never fails.
    pub fn render(&self, text: &str) -> String {
        if !self.contains_markdown(text) {
            return render_plain(text);
        }

        let prepared = self.preprocess(text);
        match self.convert(&prepared) {
            Ok(body) => format!("<div class=\"markdown-content\">{}</div>", body),
            Err(e) => {
                warn!("Markdown conversion failed, showing plain text: {}", e);
                render_plain(text)
            }
        }
    }

    // ── Stage 1 ──────────────────────────────────────────────────────────

    fn preprocess(&self, text: &str) -> String {
        let s = strip_wrapping_quotes(text)
            .replace(TRUSTED_MARK, "")
            .replace("\\n", "\n");
        let s = RE_EXCESS_NEWLINES.replace_all(&s, "\n\n");
        let s = RE_ATTRIBUTED_QUOTE.replace_all(&s, "\n\n> $1\n> \u{2014} $2\n\n");
        let s = RE_CODE_REFERENCE.replace_all(&s, "\n\n*Reference: $1*");
        let s = RE_SOURCE_CITATION.replace_all(&s, |caps: &regex::Captures| {
            format!(
                "\n\n{}Source: {}, Location: {}{}\n\n",
                open_div("markdown-source"),
                escape_html(caps[1].trim()),
                escape_html(caps[2].trim()),
                close_div()
            )
        });
        let s = self.wrap_signature(&s);
        let s = wrap_sections(&s);
        let s = RE_EXCESS_NEWLINES.replace_all(&s, "\n\n");
        debug!("Preprocessed {} chars into {} chars", text.len(), s.len());
        s.into_owned()
    }

    fn wrap_signature(&self, text: &str) -> String {
        let Some(m) = self.signature.as_ref().and_then(|re| re.find(text)) else {
            return text.to_string();
        };
        format!(
            "{}\n\n{}{}{}\n",
            &text[..m.start()],
            open_div("markdown-signature"),
            escape_html(m.as_str().trim()),
            close_div()
        )
    }

    // ── Stage 2 ──────────────────────────────────────────────────────────

    fn convert(&self, text: &str) -> Result<String, std::fmt::Error> {
        let mut opts = Options::empty();
        if self.options.gfm {
            opts.insert(Options::ENABLE_TABLES);
            opts.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.options.smart_punctuation {
            opts.insert(Options::ENABLE_SMART_PUNCTUATION);
        }

        let breaks = self.options.breaks;
        let events = Parser::new_ext(text, opts).map(|event| style_event(event, breaks));

        let mut out = String::with_capacity(text.len() * 2);
        html::write_html_fmt(&mut out, events)?;
        Ok(out)
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(RenderOptions::default(), AssistantIdentity::default())
    }
}

/// Escaped text in a whitespace-preserving span.
pub fn render_plain(text: &str) -> String {
    format!(
        "<span class=\"markdown-plain\" style=\"white-space: pre-wrap\">{}</span>",
        escape_html(text)
    )
}

/// Replace each section label with a container, closing the previous one.
fn wrap_sections(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 128);
    let mut open = false;
    let mut last = 0;

    for m in RE_SECTION_LABEL.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        if open {
            out.push_str("\n\n");
            out.push_str(&close_div());
        }
        out.push_str("\n\n");
        out.push_str(&open_div(section_class(m.as_str())));
        out.push_str("\n\n");
        open = true;
        last = m.end();
    }
    out.push_str(&text[last..]);

    if open {
        out.push_str("\n\n");
        out.push_str(&close_div());
        out.push('\n');
    }
    out
}

fn section_class(label: &str) -> &'static str {
    let label = label.trim_end();
    SECTION_LABELS
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, class)| *class)
        .unwrap_or("markdown-answer")
}

/// Swap default element markup for the classed variant.
fn style_event(event: Event<'_>, breaks: bool) -> Event<'_> {
    match event {
        Event::Start(tag) => match open_tag(&tag) {
            Some(markup) => Event::Html(markup.into()),
            None => Event::Start(tag),
        },
        Event::End(end) => match close_tag(&end) {
            Some(markup) => Event::Html(markup.into()),
            None => Event::End(end),
        },
        Event::Code(code) => Event::Html(
            format!("<code class=\"markdown-code\">{}</code>", escape_html(&code)).into(),
        ),
        Event::SoftBreak if breaks => Event::HardBreak,
        Event::Html(raw) => block_html(raw),
        Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    }
}

fn block_html(raw: CowStr<'_>) -> Event<'_> {
    if RE_TRUSTED_HTML.is_match(raw.trim_end()) {
        let unmarked = raw.replace(&format!(" {}", TRUSTED_MARK), "");
        Event::Html(unmarked.into())
    } else {
        Event::Text(raw)
    }
}

fn open_tag(tag: &Tag<'_>) -> Option<String> {
    let markup = match tag {
        Tag::Heading { level, .. } => {
            let n = heading_number(*level);
            format!("<h{n} class=\"markdown-heading markdown-h{n}\">")
        }
        Tag::Paragraph => "<p class=\"markdown-paragraph\">".to_string(),
        Tag::List(Some(start)) if *start != 1 => {
            format!("<ol class=\"markdown-ordered-list\" start=\"{}\">\n", start)
        }
        Tag::List(Some(_)) => "<ol class=\"markdown-ordered-list\">\n".to_string(),
        Tag::List(None) => "<ul class=\"markdown-unordered-list\">\n".to_string(),
        Tag::Item => "<li class=\"markdown-list-item\">".to_string(),
        Tag::Strong => "<strong class=\"markdown-strong\">".to_string(),
        Tag::Emphasis => "<em class=\"markdown-emphasis\">".to_string(),
        Tag::BlockQuote { .. } => "<blockquote class=\"markdown-blockquote\">\n".to_string(),
        Tag::CodeBlock(kind) => {
            let lang = match kind {
                CodeBlockKind::Fenced(info) => info.split_whitespace().next().unwrap_or(""),
                CodeBlockKind::Indented => "",
            };
            if lang.is_empty() {
                "<pre><code class=\"markdown-code\">".to_string()
            } else {
                format!(
                    "<pre><code class=\"markdown-code language-{}\">",
                    escape_html(lang)
                )
            }
        }
        Tag::Link {
            link_type,
            dest_url,
            title,
            ..
        } => {
            let href = if *link_type == LinkType::Email {
                format!("mailto:{}", dest_url)
            } else {
                dest_url.to_string()
            };
            let title = if title.is_empty() {
                String::new()
            } else {
                format!(" title=\"{}\"", escape_html(title))
            };
            format!(
                "<a href=\"{}\" class=\"markdown-link\" target=\"_blank\" rel=\"noopener noreferrer\"{}>",
                escape_html(&href),
                title
            )
        }
        _ => return None,
    };
    Some(markup)
}

fn close_tag(end: &TagEnd) -> Option<String> {
    let markup = match end {
        TagEnd::Heading(level) => format!("</h{}>\n", heading_number(*level)),
        TagEnd::Paragraph => "</p>\n".to_string(),
        TagEnd::List(true) => "</ol>\n".to_string(),
        TagEnd::List(false) => "</ul>\n".to_string(),
        TagEnd::Item => "</li>\n".to_string(),
        TagEnd::Strong => "</strong>".to_string(),
        TagEnd::Emphasis => "</em>".to_string(),
        TagEnd::BlockQuote { .. } => "</blockquote>\n".to_string(),
        TagEnd::CodeBlock => "</code></pre>\n".to_string(),
        TagEnd::Link => "</a>".to_string(),
        _ => return None,
    };
    Some(markup)
}

fn heading_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Escape for both text content and double-quoted attribute values.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
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
    out
}
