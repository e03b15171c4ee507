//! Message segmentation: one normalised reply → ordered, typed chat bubbles.
//!
//! The agent is prompted to answer in sections (`How it applies:`,
//! `Next step:`) and to sign off with `"<name> – <role>"`. Each section is
//! shown as its own bubble with its own styling, and the signature always
//! comes last, so the text is cut at header boundaries and every piece is
//! classified against a small ordered rule table.
//!
//! ## Steps
//!
//! 1. Cut the trailing signature (dash variants and mojibake tolerated).
//! 2. Drop a dangling bare name left in front of it.
//! 3. Split at header starts; the header stays with its content.
//! 4. Classify by prefix through [`SECTION_HEADERS`].
//! 5. Append the signature.
//! 6. Drop bubbles that consist of nothing but the bare name.

use crate::config::AssistantIdentity;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// What a bubble represents; drives its styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartKind {
    Answer,
    Application,
    NextStep,
    Signature,
}

impl PartKind {
    /// CSS-friendly tag, also used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            PartKind::Answer => "answer",
            PartKind::Application => "application",
            PartKind::NextStep => "next-step",
            PartKind::Signature => "signature",
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed unit of assistant output. `text` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePart {
    pub kind: PartKind,
    pub text: String,
}

impl MessagePart {
    pub fn new(kind: PartKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Section headers and the kind they introduce, in priority order.
///
/// Text that starts with none of them is an [`PartKind::Answer`].
pub const SECTION_HEADERS: &[(&str, PartKind)] = &[
    ("How it applies:", PartKind::Application),
    ("Next steps:", PartKind::NextStep),
    ("Next step:", PartKind::NextStep),
];

/// Dash forms seen between name and role, including UTF-8 read as cp1252.
const SIGNATURE_DASHES: &[&str] = &[
    "\u{2013}",
    "\u{2014}",
    "-",
    "\u{e2}\u{20ac}\u{2013}",
    "\u{e2}\u{20ac}\u{201c}",
    "\u{e2}\u{20ac}\u{201d}",
];

static RE_HEADERS: Lazy<Regex> = Lazy::new(|| {
    let alternation = SECTION_HEADERS
        .iter()
        .map(|(h, _)| regex::escape(h))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation).unwrap()
});

/// Segmenter bound to one assistant identity; regexes compiled once.
#[derive(Debug, Clone)]
pub struct MessageSegmenter {
    bare_name: String,
    /// None only if the identity produced an oversized pattern.
    signature: Option<Regex>,
    trailing_name: Option<Regex>,
}

impl MessageSegmenter {
    pub fn new(identity: &AssistantIdentity) -> Self {
        Self {
            bare_name: identity.name.trim().to_lowercase(),
            signature: signature_regex(identity),
            trailing_name: trailing_name_regex(identity),
        }
    }

    /// Split `text` into typed parts. Empty input yields no parts.
    pub fn segment(&self, text: &str) -> Vec<MessagePart> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // ── Steps 1–2: signature and dangling name ───────────────────────
        let (body, signature) = match self.signature.as_ref().and_then(|re| re.find(text)) {
            Some(m) => (&text[..m.start()], Some(m.as_str().trim().to_string())),
            None => (text, None),
        };
        let body = match &self.trailing_name {
            Some(re) => re.replace(body, ""),
            None => body.into(),
        };
        let body = body.trim();

        // ── Steps 3–4: split and classify ────────────────────────────────
        let mut parts: Vec<MessagePart> = split_sections(body)
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| MessagePart::new(classify(s), s))
            .collect();

        // ── Step 5: signature last ───────────────────────────────────────
        if let Some(sig) = signature {
            parts.push(MessagePart::new(PartKind::Signature, sig));
        }

        // ── Step 6: artifact suppression ─────────────────────────────────
        parts.retain(|p| p.text.trim().to_lowercase() != self.bare_name);

        debug!(
            "Segmented reply into {} parts: {:?}",
            parts.len(),
            parts.iter().map(|p| p.kind).collect::<Vec<_>>()
        );
        parts
    }
}

/// Cut before every header occurrence; the leading slice may be empty.
fn split_sections(body: &str) -> Vec<&str> {
    let mut cuts: Vec<usize> = RE_HEADERS.find_iter(body).map(|m| m.start()).collect();
    cuts.push(body.len());

    let mut sections = Vec::with_capacity(cuts.len());
    let mut start = 0;
    for cut in cuts {
        sections.push(&body[start..cut]);
        start = cut;
    }
    sections
}

/// Segment with a one-off segmenter. Prefer [`MessageSegmenter`] in loops.
pub fn segment(text: &str, identity: &AssistantIdentity) -> Vec<MessagePart> {
    MessageSegmenter::new(identity).segment(text)
}

/// First matching header rule wins; [`PartKind::Answer`] otherwise.
pub fn classify(section: &str) -> PartKind {
    SECTION_HEADERS
        .iter()
        .find(|(header, _)| section.starts_with(header))
        .map(|(_, kind)| *kind)
        .unwrap_or(PartKind::Answer)
}

/// `name <dash> role` at end of text, case-insensitive, loose whitespace.
pub(crate) fn signature_regex(identity: &AssistantIdentity) -> Option<Regex> {
    let dashes = SIGNATURE_DASHES
        .iter()
        .map(|d| regex::escape(d))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r"(?i){}\s*(?:{})\s*{}\s*$",
        loose_words(&identity.name),
        dashes,
        loose_words(&identity.role)
    );
    compile(&pattern)
}

/// Bare name dangling at end of text.
fn trailing_name_regex(identity: &AssistantIdentity) -> Option<Regex> {
    let boundary = if identity.name.starts_with(|c: char| c.is_alphanumeric()) {
        r"\b"
    } else {
        ""
    };
    compile(&format!(r"{}{}\s*$", boundary, loose_words(&identity.name)))
}

/// Escape each word and allow any whitespace run between them.
fn loose_words(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s*")
}

/// Patterns are built from escaped literals; only the size limit can fail.
fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .map_err(|e| warn!("Signature pattern rejected: {}", e))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str) -> Vec<MessagePart> {
        segment(text, &AssistantIdentity::default())
    }

    fn kinds(parts: &[MessagePart]) -> Vec<PartKind> {
        parts.iter().map(|p| p.kind).collect()
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(seg("").is_empty());
        assert!(seg("   \n ").is_empty());
    }

    #[test]
    fn plain_answer_is_single_part() {
        let parts = seg("You get 25 days of leave.");
        assert_eq!(parts, vec![MessagePart::new(PartKind::Answer, "You get 25 days of leave.")]);
    }

    #[test]
    fn sections_keep_their_headers_in_order() {
        let parts = seg("Intro text.\nHow it applies: X applies.\nNext step: Do Y.");
        assert_eq!(
            kinds(&parts),
            vec![PartKind::Answer, PartKind::Application, PartKind::NextStep]
        );
        assert_eq!(parts[1].text, "How it applies: X applies.");
        assert_eq!(parts[2].text, "Next step: Do Y.");
    }

    #[test]
    fn header_at_start_has_no_empty_preamble() {
        let parts = seg("How it applies: X\nNext steps: Y");
        assert_eq!(kinds(&parts), vec![PartKind::Application, PartKind::NextStep]);
        assert!(parts[1].text.starts_with("Next steps:"));
    }

    #[test]
    fn signature_is_isolated_and_last() {
        let parts = seg("Answer here.\nNext step: Call HR.\nAnnie \u{2013} HR Business Coach");
        assert_eq!(parts.last().unwrap().kind, PartKind::Signature);
        assert_eq!(parts.last().unwrap().text, "Annie \u{2013} HR Business Coach");
        let sigs = parts.iter().filter(|p| p.kind == PartKind::Signature).count();
        assert_eq!(sigs, 1);
        for p in &parts[..parts.len() - 1] {
            assert!(!p.text.contains("HR Business Coach"), "leaked into {:?}", p);
        }
    }

    #[test]
    fn signature_tolerates_mojibake_dash_and_case() {
        let parts = seg("Done.\nannie \u{e2}\u{20ac}\u{201c}  hr business   coach  ");
        assert_eq!(kinds(&parts), vec![PartKind::Answer, PartKind::Signature]);

        let parts = seg("Done. Annie - HR Business Coach");
        assert_eq!(kinds(&parts), vec![PartKind::Answer, PartKind::Signature]);
    }

    #[test]
    fn signature_only_when_anchored_at_end() {
        let parts = seg("Annie \u{2013} HR Business Coach says hello");
        assert_eq!(kinds(&parts), vec![PartKind::Answer]);
    }

    #[test]
    fn dangling_name_before_signature_is_removed() {
        let parts = seg("Here you go.\nAnnie\nAnnie \u{2013} HR Business Coach");
        assert_eq!(parts[0].text, "Here you go.");
        assert_eq!(kinds(&parts), vec![PartKind::Answer, PartKind::Signature]);
    }

    #[test]
    fn name_inside_a_word_is_kept() {
        let parts = seg("Talk to Joannie");
        assert_eq!(parts[0].text, "Talk to Joannie");
    }

    #[test]
    fn bare_name_bubble_is_dropped() {
        assert!(seg("Annie").is_empty());
        let parts = seg("How it applies: X\nNext step: Y\n");
        assert!(parts.iter().all(|p| p.text.to_lowercase() != "annie"));
    }

    #[test]
    fn classify_rules() {
        assert_eq!(classify("How it applies: x"), PartKind::Application);
        assert_eq!(classify("Next steps: x"), PartKind::NextStep);
        assert_eq!(classify("Next step: x"), PartKind::NextStep);
        assert_eq!(classify("**Answer:** x"), PartKind::Answer);
        assert_eq!(classify("Why: x"), PartKind::Answer);
    }

    #[test]
    fn custom_identity() {
        let id = AssistantIdentity::new("Max", "Payroll Desk");
        let parts = segment("Paid monthly.\nMax \u{2014} Payroll Desk", &id);
        assert_eq!(kinds(&parts), vec![PartKind::Answer, PartKind::Signature]);
    }

    #[test]
    fn part_kind_serialises_kebab_case() {
        let json = serde_json::to_string(&PartKind::NextStep).unwrap();
        assert_eq!(json, "\"next-step\"");
        assert_eq!(PartKind::NextStep.to_string(), "next-step");
    }
}
