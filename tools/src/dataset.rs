//! Labelled URL dataset loading.
//!
//! Reads the `URL,label` CSV files produced by the data-preparation step. The
//! label is the last field on each line and everything before the last comma
//! is the URL, so URLs may themselves contain commas. Quoted fields follow
//! the usual CSV escaping, where `""` inside quotes stands for one `"`.

use std::borrow::Cow;
use std::path::Path;

use phishguard_core::{PhishGuardError, Result};
use serde::{Deserialize, Serialize};

/// One labelled URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelledUrl {
    pub url: String,
    /// `true` for phishing (label `1`).
    pub phishing: bool,
}

/// Load a labelled CSV from disk.
pub fn load_csv(path: &Path) -> Result<Vec<LabelledUrl>> {
    let contents = std::fs::read_to_string(path)?;
    parse_csv(&contents).map_err(|e| match e {
        PhishGuardError::InvalidInput(msg) => {
            PhishGuardError::InvalidInput(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

/// Parse CSV text with a `URL,label` header (column order may be swapped).
pub fn parse_csv(contents: &str) -> Result<Vec<LabelledUrl>> {
    let mut lines = contents.lines().enumerate();
    let (_, header) = lines.next().ok_or_else(|| invalid("empty file".to_string()))?;
    let (first, second) = split_header(header)?;
    let label_first = match (first.as_ref(), second.as_ref()) {
        ("URL", "label") => false,
        ("label", "URL") => true,
        (a, b) => {
            return Err(invalid(format!(
                "unexpected header '{a},{b}' (want 'URL,label')"
            )))
        }
    };

    let mut rows = Vec::new();
    for (idx, line) in lines {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (url, label) = if label_first {
            let (label, url) = line
                .split_once(',')
                .ok_or_else(|| invalid(format!("line {}: missing comma", idx + 1)))?;
            (url, label)
        } else {
            line.rsplit_once(',')
                .ok_or_else(|| invalid(format!("line {}: missing comma", idx + 1)))?
        };
        let phishing = parse_label(label)
            .ok_or_else(|| invalid(format!("line {}: invalid label '{label}'", idx + 1)))?;
        rows.push(LabelledUrl {
            url: unquote(url).into_owned(),
            phishing,
        });
    }
    Ok(rows)
}

fn invalid(msg: String) -> PhishGuardError {
    PhishGuardError::InvalidInput(msg)
}

fn split_header(header: &str) -> Result<(Cow<'_, str>, Cow<'_, str>)> {
    let header = header.trim_start_matches('\u{feff}').trim_end_matches('\r');
    header
        .split_once(',')
        .map(|(a, b)| (unquote(a.trim()), unquote(b.trim())))
        .ok_or_else(|| invalid(format!("header '{header}' has no comma")))
}

fn parse_label(raw: &str) -> Option<bool> {
    match unquote(raw.trim()).as_ref() {
        "1" | "1.0" => Some(true),
        "0" | "0.0" => Some(false),
        _ => None,
    }
}

/// Strip one pair of surrounding double quotes and collapse `""` inside them.
fn unquote(s: &str) -> Cow<'_, str> {
    match s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) if inner.contains("\"\"") => Cow::Owned(inner.replace("\"\"", "\"")),
        Some(inner) => Cow::Borrowed(inner),
        None => Cow::Borrowed(s),
    }
}
