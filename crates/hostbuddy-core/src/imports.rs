//! Discovery of third-party package references in untrusted source.
//!
//! Comments are removed first so commented-out imports never reach the
//! registry. Every string-literal module reference (static import, re-export,
//! dynamic import, side-effect import, `require`) is then reduced to a package
//! root and checked against a conservative name grammar and a blocklist of
//! host built-ins.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Host and runtime modules that must never be installed or bundled.
pub const BLOCKED_PACKAGES: &[&str] = &[
    "electron",
    "fs",
    "child_process",
    "path",
    "http",
    "https",
    "os",
    "vm",
    "worker_threads",
    "net",
    "dns",
    "tls",
    "dgram",
    "cluster",
    "module",
    "repl",
    "inspector",
    "v8",
];

/// Deep-import specifiers mapped to their package root.
const DEEP_IMPORTS: &[(&str, &str)] = &[
    ("react-dom/client", "react-dom"),
    ("react/jsx-runtime", "react"),
];

/// A normalized external package name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCandidate {
    /// Package root, e.g. `lodash` or `@tanstack/react-query`.
    pub name: String,
    /// Raw specifiers that reduced to this name, in first-seen order.
    pub specifiers: Vec<String>,
}

/// Why a specifier did not become a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    Relative,
    Absolute,
    Protocol,
    LocalAlias,
    InvalidName,
    Blocked,
    ProvidedByBaseline,
    OverCap,
}

/// A specifier that was seen and deliberately excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredSpecifier {
    pub specifier: String,
    pub reason: IgnoreReason,
}

/// Output of one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub candidates: Vec<ImportCandidate>,
    pub ignored: Vec<IgnoredSpecifier>,
}

impl ExtractionReport {
    pub fn names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Extracts, normalizes and bounds package candidates.
#[derive(Debug, Clone)]
pub struct ImportExtractor {
    max_candidates: usize,
    excluded: BTreeSet<String>,
}

impl ImportExtractor {
    pub fn new(max_candidates: usize) -> Self {
        Self {
            max_candidates,
            excluded: BTreeSet::new(),
        }
    }

    /// Names already provided elsewhere (the baseline manifest). They are
    /// dropped before the cap is applied.
    pub fn with_excluded<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn extract(&self, source: &str) -> ExtractionReport {
        let mut report = ExtractionReport::default();

        for specifier in module_specifiers(&strip_comments(source)) {
            let name = match package_root(&specifier) {
                Ok(name) => name,
                Err(reason) => {
                    report.ignored.push(IgnoredSpecifier { specifier, reason });
                    continue;
                }
            };

            if let Some(existing) = report.candidates.iter_mut().find(|c| c.name == name) {
                if !existing.specifiers.contains(&specifier) {
                    existing.specifiers.push(specifier);
                }
                continue;
            }

            let reason = if self.excluded.contains(&name) {
                Some(IgnoreReason::ProvidedByBaseline)
            } else if report.candidates.len() >= self.max_candidates {
                Some(IgnoreReason::OverCap)
            } else {
                None
            };

            match reason {
                Some(reason) => report.ignored.push(IgnoredSpecifier { specifier, reason }),
                None => report.candidates.push(ImportCandidate {
                    name,
                    specifiers: vec![specifier],
                }),
            }
        }

        report
    }
}

/// Keywords after which a quote opens a string literal.
const STRING_KEYWORDS: &[&str] = &[
    "return", "from", "import", "export", "default", "case", "typeof", "in", "of", "yield",
    "await", "throw", "void", "else", "do",
];

/// Remove `//` and `/* */` comments that are not inside string literals.
///
/// Quoted strings end at a newline, template literals do not. A `'` or `"`
/// only opens a string where an expression may start, so apostrophes in JSX
/// text (`<p>Don't</p>`) and quotes inside regex literals stay plain text.
pub fn strip_comments(source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Quoted(char),
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();
    // Last two non-whitespace code characters, and the last identifier-like word.
    let mut last: Option<char> = None;
    let mut before_last: Option<char> = None;
    let mut word = String::new();
    let mut in_word = false;

    while let Some(c) = chars.next() {
        match state {
            State::Code => {
                match c {
                    '/' if chars.peek() == Some(&'/') => {
                        chars.next();
                        state = State::LineComment;
                    }
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        state = State::BlockComment;
                    }
                    '"' | '\'' | '`' if opens_string(c, before_last, last, &word) => {
                        state = State::Quoted(c);
                        out.push(c);
                    }
                    _ => out.push(c),
                }
                if state == State::Code {
                    if is_ident_char(c) {
                        if !in_word {
                            word.clear();
                            in_word = true;
                        }
                        word.push(c);
                    } else {
                        in_word = false;
                    }
                    if !c.is_whitespace() {
                        before_last = last;
                        last = Some(c);
                    }
                } else {
                    in_word = false;
                }
            }
            State::Quoted(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote || (c == '\n' && quote != '`') {
                    state = State::Code;
                    before_last = last;
                    last = Some(quote);
                }
            }
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push(' ');
                    state = State::Code;
                } else if c == '\n' {
                    out.push('\n');
                }
            }
        }
    }

    out
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Whether a quote seen after `last` (and `word`, when `last` ends one) starts
/// a literal. A bare `>` ends a JSX tag; `=>` is an arrow.
fn opens_string(quote: char, before_last: Option<char>, last: Option<char>, word: &str) -> bool {
    match last {
        None => true,
        Some(prev) if is_ident_char(prev) => {
            // Tagged templates follow an identifier: styled.div`...`
            quote == '`' || STRING_KEYWORDS.contains(&word)
        }
        Some('>') => before_last == Some('='),
        Some(prev) => {
            "([{,;=:!&|?+-*%^~".contains(prev) || (quote == '`' && matches!(prev, ')' | ']'))
        }
    }
}

/// Every string-literal module specifier, in source order.
///
/// Static imports and re-exports must start a statement. The clause before
/// `from` stays on one line unless it is a braced list of bindings, so prose
/// like `Data from "api"` is never read as an import.
fn module_specifiers(code: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(concat!(
            // import x from 'm' / import x, {\n a,\n} from 'm' / export * from 'm'
            r#"(?m)(?:^|[;}])[ \t]*(?:import|export)\b(?:[^'"\n;{}()]*?|[\w$\s,*]*\{[^{}'"()]*\}\s*)\bfrom\s*["']([^"'\n]+)["']"#,
            // import('m')
            r#"|\bimport\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
            // import 'm'
            r#"|(?:^|[;}])[ \t]*import\s*["']([^"'\n]+)["']"#,
            // require('m')
            r#"|\brequire\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
        ))
        .expect("valid regex")
    });

    re.captures_iter(code)
        .filter_map(|caps| {
            (1..=4)
                .find_map(|i| caps.get(i))
                .map(|m| m.as_str().trim().to_string())
        })
        .collect()
}

/// Reduce a specifier to its validated package root.
pub fn package_root(specifier: &str) -> Result<String, IgnoreReason> {
    static PROTOCOL: OnceLock<Regex> = OnceLock::new();
    let protocol =
        PROTOCOL.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("valid regex"));

    if specifier.starts_with('.') {
        return Err(IgnoreReason::Relative);
    }
    if specifier.starts_with('/') {
        return Err(IgnoreReason::Absolute);
    }
    if specifier.starts_with("@/") || specifier.starts_with("~/") || specifier.starts_with('#') {
        return Err(IgnoreReason::LocalAlias);
    }
    if protocol.is_match(specifier) {
        return Err(IgnoreReason::Protocol);
    }

    let specifier = DEEP_IMPORTS
        .iter()
        .find(|(deep, _)| *deep == specifier)
        .map(|(_, root)| *root)
        .unwrap_or(specifier);

    let mut segments = specifier.split('/');
    let name = if specifier.starts_with('@') {
        match (segments.next(), segments.next()) {
            (Some(scope), Some(pkg)) if !scope.is_empty() && !pkg.is_empty() => {
                format!("{scope}/{pkg}")
            }
            _ => return Err(IgnoreReason::InvalidName),
        }
    } else {
        segments.next().unwrap_or_default().to_string()
    };

    if !is_safe_package_name(&name) {
        return Err(IgnoreReason::InvalidName);
    }
    if BLOCKED_PACKAGES.contains(&name.as_str()) {
        return Err(IgnoreReason::Blocked);
    }
    Ok(name)
}

/// Conservative package-name grammar: lowercase alphanumerics, `-`, `.`, `_`,
/// `~`, with an optional `@scope/` prefix.
pub fn is_safe_package_name(name: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:@[a-z0-9\-~][a-z0-9\-._~]*/)?[a-z0-9\-~][a-z0-9\-._~]*$")
            .expect("valid regex")
    })
    .is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(source: &str) -> Vec<String> {
        ImportExtractor::new(20)
            .extract(source)
            .candidates
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    #[test]
    fn test_all_syntactic_forms() {
        let src = r#"
import React from "react";
import { motion } from 'framer-motion';
import 'normalize.css';
export { debounce } from "lodash";
const dayjs = require('dayjs');
const lazy = import("chart.js/auto");
"#;
        assert_eq!(
            names(src),
            vec!["react", "framer-motion", "normalize.css", "lodash", "dayjs", "chart.js"]
        );
    }

    #[test]
    fn test_multiline_named_import() {
        let src = "import {\n  useQuery,\n  QueryClient,\n} from '@tanstack/react-query/build';\n";
        assert_eq!(names(src), vec!["@tanstack/react-query"]);
    }

    #[test]
    fn test_commented_imports_are_ignored() {
        let src = r#"
// import axios from 'axios';
/* import { z } from "zod";
   require('left-pad') */
import clsx from 'clsx'; // import moment from 'moment'
"#;
        assert_eq!(names(src), vec!["clsx"]);
    }

    #[test]
    fn test_jsx_text_never_yields_candidates() {
        let cases: &[(&str, &[&str])] = &[
            ("return <p>Don't panic</p>; // import axios from 'axios'", &[]),
            ("return <p>It's fine</p>; /*\n import { z } from 'zod';\n */", &[]),
            (
                "export default function App() {\n  return <p>Data from \"api\"</p>\n}",
                &[],
            ),
            (
                "export default function App() { return <p>Data from \"api\"</p> }",
                &[],
            ),
            ("<p>We import goods from \"overseas\"</p>", &[]),
            (
                "<a href=\"http://x.dev\">Don't</a>;\nimport q from 'q-lib';",
                &["q-lib"],
            ),
        ];
        for (src, expected) in cases {
            assert_eq!(names(src), *expected, "source: {src}");
        }
    }

    #[test]
    fn test_quotes_outside_strings_do_not_hide_comments() {
        let cases: &[(&str, &[&str])] = &[
            ("const re = /'/g; // import axios from 'axios'\nimport clsx from 'clsx';", &["clsx"]),
            ("const re = /\"(\\w+)\"/; // require('left-pad')", &[]),
            ("const f = () => 'https://x.dev'; import ky from 'ky';", &["ky"]),
            (
                "const Title = styled.h1`\n  // import x from 'styled-trap'\n`;\nimport y from 'real';",
                &["real"],
            ),
        ];
        for (src, expected) in cases {
            assert_eq!(names(src), *expected, "source: {src}");
        }
    }

    #[test]
    fn test_braced_and_typed_import_clauses() {
        let src = "import React, {\n useState,\n} from 'react';\nimport type { Foo } from 'foo-types';\nexport * as ns from 'ns-lib';\n'use client';";
        assert_eq!(names(src), vec!["react", "foo-types", "ns-lib"]);
    }

    #[test]
    fn test_comment_markers_inside_strings_are_kept() {
        let src = "const url = 'https://cdn.example/x.js';\nimport ky from 'ky';";
        assert_eq!(names(src), vec!["ky"]);
    }

    #[test]
    fn test_local_and_relative_specifiers_ignored() {
        let report = ImportExtractor::new(20).extract(
            "import A from './a';\nimport B from '../b';\nimport C from '/abs/c';\nimport { Button } from '@/components/ui/button';\nimport D from 'node:fs';\nimport E from 'https://esm.sh/x';",
        );
        assert!(report.candidates.is_empty());
        let reasons: Vec<IgnoreReason> = report.ignored.iter().map(|i| i.reason).collect();
        assert_eq!(
            reasons,
            vec![
                IgnoreReason::Relative,
                IgnoreReason::Relative,
                IgnoreReason::Absolute,
                IgnoreReason::LocalAlias,
                IgnoreReason::Protocol,
                IgnoreReason::Protocol,
            ]
        );
    }

    #[test]
    fn test_blocked_and_malformed_names() {
        assert_eq!(package_root("child_process"), Err(IgnoreReason::Blocked));
        assert_eq!(package_root("electron/main"), Err(IgnoreReason::Blocked));
        assert_eq!(package_root("Lodash"), Err(IgnoreReason::InvalidName));
        assert_eq!(package_root("@scope"), Err(IgnoreReason::InvalidName));
        assert_eq!(package_root("bad name"), Err(IgnoreReason::InvalidName));
        assert_eq!(package_root("$(rm -rf)"), Err(IgnoreReason::InvalidName));
    }

    #[test]
    fn test_deep_import_normalization() {
        assert_eq!(package_root("react-dom/client").unwrap(), "react-dom");
        assert_eq!(package_root("react/jsx-runtime").unwrap(), "react");
        assert_eq!(package_root("@scope/pkg/deep/path").unwrap(), "@scope/pkg");
        assert_eq!(package_root("date-fns/format").unwrap(), "date-fns");
    }

    #[test]
    fn test_dedup_preserves_first_seen_order_and_specifiers() {
        let report = ImportExtractor::new(20)
            .extract("import a from 'b-lib/x';\nimport c from 'a-lib';\nimport d from 'b-lib/y';");
        assert_eq!(report.names(), vec!["b-lib", "a-lib"]);
        assert_eq!(report.candidates[0].specifiers, vec!["b-lib/x", "b-lib/y"]);
    }

    #[test]
    fn test_cap_applies_after_baseline_exclusion() {
        let src = "import React from 'react';\nimport a from 'pkg-a';\nimport b from 'pkg-b';\nimport c from 'pkg-c';";
        let report = ImportExtractor::new(2).with_excluded(["react"]).extract(src);
        assert_eq!(report.names(), vec!["pkg-a", "pkg-b"]);
        let reasons: Vec<IgnoreReason> = report.ignored.iter().map(|i| i.reason).collect();
        assert_eq!(
            reasons,
            vec![IgnoreReason::ProvidedByBaseline, IgnoreReason::OverCap]
        );
    }

    #[test]
    fn test_strip_comments_keeps_line_structure() {
        let stripped = strip_comments("a /* x\ny */ b // z\nc");
        assert_eq!(stripped.lines().count(), 3);
        assert!(stripped.contains('a') && stripped.contains('b') && stripped.contains('c'));
        assert!(!stripped.contains('z'));
    }
}
