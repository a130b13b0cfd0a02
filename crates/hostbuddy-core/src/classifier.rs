//! Artifact classification as an ordered, pure policy table.
//!
//! Rules are evaluated top to bottom and the first match wins. Document markers
//! take precedence over framework signals, so a full HTML page that happens to
//! mention `React` still previews as markup.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What kind of artifact the source text is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A markup document or fragment, loaded directly.
    Markup,
    /// A component-style script that must be scaffolded and bundled.
    ComponentScript,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Markup => "markup",
            ArtifactKind::ComponentScript => "component_script",
        }
    }
}

/// One row of the classification table.
#[derive(Clone, Copy)]
pub struct ClassificationRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub kind: ArtifactKind,
}

/// The canonical rule order.
pub const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "document_markers",
        matches: has_document_markers,
        kind: ArtifactKind::Markup,
    },
    ClassificationRule {
        name: "framework_signals",
        matches: has_framework_signals,
        kind: ArtifactKind::ComponentScript,
    },
    ClassificationRule {
        name: "leading_tag",
        matches: starts_with_tag,
        kind: ArtifactKind::Markup,
    },
];

/// Kind used when no rule matches.
pub const DEFAULT_KIND: ArtifactKind = ArtifactKind::Markup;

/// Classify `text`. Never fails.
pub fn classify(text: &str) -> ArtifactKind {
    classify_with_rule(text).0
}

/// Classify `text` and report which rule decided (`"default"` if none did).
pub fn classify_with_rule(text: &str) -> (ArtifactKind, &'static str) {
    RULES
        .iter()
        .find(|rule| (rule.matches)(text))
        .map(|rule| (rule.kind, rule.name))
        .unwrap_or((DEFAULT_KIND, "default"))
}

fn has_document_markers(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<!doctype\s+html|<(?:html|head|body)\b").expect("valid regex"))
        .is_match(text)
}

fn has_framework_signals(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"from\s+['"]react['"]|import\s+React\b|export\s+default\s+"#)
            .expect("valid regex")
    })
    .is_match(text)
}

fn starts_with_tag(text: &str) -> bool {
    text.trim_start().starts_with('<')
}
