//! Fallback document synthesis.

use std::sync::OnceLock;

use regex::Regex;

/// Return `raw` unchanged if it already is a full `<html>…</html>` document,
/// otherwise wrap it in a minimal shell. Always yields a loadable document.
pub fn ensure_document(raw: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let full_document = RE
        .get_or_init(|| Regex::new(r"(?is)<html.*</html>").expect("valid regex"))
        .is_match(raw);

    if full_document {
        return raw.to_string();
    }

    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"/>\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"/>\
<title>Project</title>\
<style>html,body{{height:100%;margin:0}}body{{font-family:system-ui,-apple-system,Segoe UI,Roboto,Ubuntu,Cantarell,Noto Sans,sans-serif}}</style>\
</head><body>{raw}</body></html>"
    )
}
