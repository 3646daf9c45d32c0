//! Visible-text extraction from scraped markup.
//!
//! This is not an HTML parser. It strips what a browser would not show,
//! turns line-breaking elements into newlines, and leaves the rest of the
//! text in document order. Malformed markup only ever yields fewer lines.

use std::sync::OnceLock;

use regex::{Captures, Regex};

static HIDDEN: OnceLock<Option<Regex>> = OnceLock::new();
static LINE_BREAK: OnceLock<Option<Regex>> = OnceLock::new();
static TAG: OnceLock<Option<Regex>> = OnceLock::new();
static ENTITY: OnceLock<Option<Regex>> = OnceLock::new();
static WHITESPACE: OnceLock<Option<Regex>> = OnceLock::new();

const HIDDEN_PATTERN: &str = r"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<head\b.*?</head\s*>";
const LINE_BREAK_PATTERN: &str =
    r"(?i)<br\s*/?>|</(?:p|div|li|tr|h[1-6]|section|article|table)\s*>";
const TAG_PATTERN: &str = r"(?s)<[^>]*>";
const ENTITY_PATTERN: &str = r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});";
const WHITESPACE_PATTERN: &str = r"\s+";

fn pattern(cell: &'static OnceLock<Option<Regex>>, source: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(source).ok()).as_ref()
}

fn replace(cell: &'static OnceLock<Option<Regex>>, source: &str, text: &str, with: &str) -> String {
    match pattern(cell, source) {
        Some(re) => re.replace_all(text, with).into_owned(),
        None => text.to_string(),
    }
}

/// Extract visible text as trimmed, whitespace-collapsed, non-empty lines.
pub fn visible_lines(markup: &str) -> Vec<String> {
    let text = replace(&HIDDEN, HIDDEN_PATTERN, markup, "");
    let text = replace(&LINE_BREAK, LINE_BREAK_PATTERN, &text, "\n");
    let text = replace(&TAG, TAG_PATTERN, &text, "");
    let text = decode_entities(&text);
    split_lines(&text)
}

/// Split plain text on `\r?\n`, collapse whitespace runs, drop empty lines.
pub fn split_lines(text: &str) -> Vec<String> {
    let ws = pattern(&WHITESPACE, WHITESPACE_PATTERN);
    text.lines()
        .map(|line| match ws {
            Some(re) => re.replace_all(line, " ").trim().to_string(),
            None => line.split_whitespace().collect::<Vec<_>>().join(" "),
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Decode named and numeric character references. Unknown names are kept.
pub fn decode_entities(text: &str) -> String {
    let Some(re) = pattern(&ENTITY, ENTITY_PATTERN) else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &Captures<'_>| {
        let body = &caps[1];
        decode_entity(body).unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

fn decode_entity(body: &str) -> Option<String> {
    if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    if let Some(dec) = body.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32).map(String::from);
    }
    let decoded = match body {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        _ => return None,
    };
    Some(decoded.to_string())
}
