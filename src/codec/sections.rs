// src/codec/sections.rs
// Line scanner for delimiter-bounded sections (`+++ name +++`, `~~~ field ~~~`)

use once_cell::sync::Lazy;
use regex::Regex;

/// Top-level reply section header
pub static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\++\s*(\w+)\s*\++").expect("valid regex"));

/// Field header inside `tool_arguments`
pub static FIELD_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"~+\s*(\w+)\s*~+").expect("valid regex"));

/// Header name that stops a top-level scan
pub const END_SECTION: &str = "end";

/// A named block with its trimmed body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSection {
    pub name: String,
    pub body: String,
}

/// Flat, single-pass section scanner.
///
/// Lines before the first header are dropped. A header closes the open
/// section; `terminator`, when set, also stops the scan. A section still
/// open at end of input is kept.
pub struct SectionScanner<'a> {
    header: &'a Regex,
    terminator: Option<&'a str>,
}

impl<'a> SectionScanner<'a> {
    pub fn new(header: &'a Regex, terminator: Option<&'a str>) -> Self {
        Self { header, terminator }
    }

    pub fn scan(&self, text: &str) -> Vec<RawSection> {
        let mut sections = Vec::new();
        let mut current: Option<(String, String)> = None;

        for line in text.split_inclusive('\n') {
            let Some(caps) = self.header.captures(line) else {
                if let Some((_, body)) = current.as_mut() {
                    body.push_str(line);
                }
                continue;
            };

            if let Some((name, body)) = current.take() {
                sections.push(RawSection {
                    name,
                    body: body.trim().to_string(),
                });
            }

            let name = caps[1].to_lowercase();
            if self.terminator.is_some_and(|t| t == name) {
                return sections;
            }
            current = Some((name, String::new()));
        }

        if let Some((name, body)) = current {
            sections.push(RawSection {
                name,
                body: body.trim().to_string(),
            });
        }
        sections
    }
}

/// Scan a full reply with `+` headers, stopping at `end`
pub fn scan_reply(text: &str) -> Vec<RawSection> {
    SectionScanner::new(&SECTION_HEADER, Some(END_SECTION)).scan(text)
}

/// Scan a `tool_arguments` body with `~` headers
pub fn scan_fields(text: &str) -> Vec<RawSection> {
    SectionScanner::new(&FIELD_HEADER, None).scan(text)
}
