//! Generated scaffold files: manifest, HTML shell, bootstrap, entry rewrite.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Bundle file referenced by the HTML shell.
pub const BUNDLE_FILE: &str = "bundle.js";
/// HTML shell file name.
pub const SHELL_FILE: &str = "index.html";
/// Rewritten source file name.
pub const ENTRY_FILE: &str = "App.tsx";
/// Generated bootstrap module, the bundler's entry point.
pub const BOOTSTRAP_FILE: &str = "index.tsx";
/// Manifest file name.
pub const MANIFEST_FILE: &str = "package.json";
/// Installed-dependency cache directory.
pub const DEPENDENCY_CACHE_DIR: &str = "node_modules";

/// Runtime dependencies every scaffold carries: UI framework, renderer,
/// icon and chart companions, and the zero-build utility-class runtime.
pub const BASELINE_DEPENDENCIES: &[(&str, &str)] = &[
    ("react", "^18.2.0"),
    ("react-dom", "^18.2.0"),
    ("lucide-react", "^0.474.0"),
    ("recharts", "^2.12.7"),
    ("@twind/core", "^1.1.3"),
    ("@twind/preset-tailwind", "^1.1.4"),
];

/// Names supplied by the baseline manifest.
pub fn baseline_names() -> impl Iterator<Item = &'static str> {
    BASELINE_DEPENDENCIES.iter().map(|(name, _)| *name)
}

/// `package.json` contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub private: bool,
    #[serde(rename = "type")]
    pub module_type: String,
    pub dependencies: BTreeMap<String, String>,
}

impl Manifest {
    /// Baseline dependencies merged with accepted `(name, version)` pairs,
    /// each pinned to a caret range. Baseline entries are never overridden.
    pub fn with_accepted(accepted: &[(String, String)]) -> Self {
        let mut dependencies: BTreeMap<String, String> = BASELINE_DEPENDENCIES
            .iter()
            .map(|(name, range)| (name.to_string(), range.to_string()))
            .collect();
        for (name, version) in accepted {
            dependencies
                .entry(name.clone())
                .or_insert_with(|| format!("^{version}"));
        }

        Self {
            name: "hb-react-run".to_string(),
            private: true,
            module_type: "module".to_string(),
            dependencies,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// The HTML page that hosts the bundle.
pub fn html_shell() -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"/>\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"/>\
<title>React Project</title>\
<style>html,body,#root{{height:100%}}body{{margin:0;font-family:system-ui,-apple-system,Segoe UI,Roboto,Ubuntu,Cantarell,Noto Sans,sans-serif}}</style>\
</head><body><div id=\"root\"></div><script type=\"module\" src=\"./{BUNDLE_FILE}\"></script></body></html>"
    )
}

/// Bootstrap: install the styling runtime, mount the entry's default export.
pub fn bootstrap_module() -> String {
    "import React from 'react';\n\
import { createRoot } from 'react-dom/client';\n\
import App from './App';\n\
import { install } from '@twind/core';\n\
import presetTailwind from '@twind/preset-tailwind';\n\
install({ presets: [presetTailwind()], hash: false });\n\
const root = createRoot(document.getElementById('root')!);\n\
root.render(React.createElement(App));\n"
        .to_string()
}

/// Rewrite `@/…` alias imports to `./…`, keeping the original quote style.
pub fn rewrite_alias_imports(source: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(\bfrom\s*|\bimport\s*\(?\s*)(['"])@/"#).expect("valid regex")
    })
    .replace_all(source, "${1}${2}./")
    .into_owned()
}
