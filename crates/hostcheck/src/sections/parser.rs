//! Parser for the line based agent output format.
//!
//! ```text
//! <<<df>>>
//! /dev/sda1 ext4 100 40 60 40% /
//! <<<uptime:cached(1700000000,300)>>>
//! 4711
//! <<<<other-host>>>>
//! <<<mem:sep(58)>>>
//! MemTotal:16384
//! <<<<>>>>
//! ```
//!
//! Sections between `<<<<name>>>>` and `<<<<>>>>` belong to another host
//! (piggyback data).

use std::collections::BTreeMap;

use super::StringTable;

/// Lines of one section plus its cache marker, if any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSection {
    pub table: StringTable,
    /// `(timestamp, interval)` from a `cached(...)` header option
    pub cached: Option<(i64, u64)>,
}

/// Everything extracted from one payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPayload {
    pub sections: BTreeMap<String, ParsedSection>,
    /// Sections per piggybacked host name
    pub piggyback: BTreeMap<String, BTreeMap<String, ParsedSection>>,
    pub errors: Vec<String>,
}

struct Header {
    name: String,
    separator: Option<char>,
    cached: Option<(i64, u64)>,
}

fn parse_option_args(option: &str, prefix: &str) -> Option<Vec<String>> {
    let args = option.strip_prefix(prefix)?.strip_prefix('(')?.strip_suffix(')')?;
    Some(args.split(',').map(|arg| arg.trim().to_string()).collect())
}

fn parse_header(header: &str) -> Result<Header, String> {
    let mut parts = header.split(':');
    let name = parts.next().unwrap_or_default().trim().to_string();
    if name.is_empty()
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(format!("Malformed section header '<<<{header}>>>'"));
    }

    let mut parsed = Header { name, separator: None, cached: None };
    for option in parts {
        if let Some(args) = parse_option_args(option, "sep") {
            let code: u32 = args
                .first()
                .and_then(|arg| arg.parse().ok())
                .ok_or_else(|| format!("Invalid separator in '<<<{header}>>>'"))?;
            let separator = char::from_u32(code)
                .ok_or_else(|| format!("Invalid separator in '<<<{header}>>>'"))?;
            parsed.separator = Some(separator);
        } else if let Some(args) = parse_option_args(option, "cached") {
            let invalid = || format!("Invalid cache info in '<<<{header}>>>'");
            match args.as_slice() {
                [timestamp, interval] => {
                    let timestamp = timestamp.parse().map_err(|_| invalid())?;
                    let interval = interval.parse().map_err(|_| invalid())?;
                    parsed.cached = Some((timestamp, interval));
                }
                _ => return Err(invalid()),
            }
        }
        // other options (persist, encoding, nostrip) do not affect parsing here
    }
    Ok(parsed)
}

/// Split agent output into sections
///
/// Problems are collected in [`ParsedPayload::errors`]; a malformed header
/// skips the lines up to the next header.
pub fn parse_agent_output(raw: &str) -> ParsedPayload {
    let mut payload = ParsedPayload::default();
    let mut piggy_host: Option<String> = None;
    let mut current: Option<(String, Option<char>)> = None;
    let mut orphaned_lines = 0usize;

    for line in raw.lines() {
        let trimmed = line.trim_end();
        if let Some(inner) = trimmed.strip_prefix("<<<<").and_then(|l| l.strip_suffix(">>>>")) {
            let host = inner.trim();
            piggy_host = (!host.is_empty()).then(|| host.to_string());
            current = None;
            continue;
        }
        if let Some(inner) = trimmed.strip_prefix("<<<").and_then(|l| l.strip_suffix(">>>")) {
            match parse_header(inner) {
                Ok(header) => {
                    let target = match &piggy_host {
                        Some(host) => payload.piggyback.entry(host.clone()).or_default(),
                        None => &mut payload.sections,
                    };
                    let section = target.entry(header.name.clone()).or_default();
                    if header.cached.is_some() {
                        section.cached = header.cached;
                    }
                    current = Some((header.name, header.separator));
                }
                Err(err) => {
                    payload.errors.push(err);
                    current = None;
                }
            }
            continue;
        }

        let Some((name, separator)) = &current else {
            if !trimmed.is_empty() {
                orphaned_lines += 1;
            }
            continue;
        };
        let words: Vec<String> = match separator {
            Some(sep) => trimmed.split(*sep).map(str::to_string).collect(),
            None => trimmed.split_whitespace().map(str::to_string).collect(),
        };
        if words.is_empty() {
            continue;
        }
        let target = match &piggy_host {
            Some(host) => payload.piggyback.entry(host.clone()).or_default(),
            None => &mut payload.sections,
        };
        target.entry(name.clone()).or_default().table.push(words);
    }

    if orphaned_lines > 0 {
        payload.errors.push(format!("Ignored {orphaned_lines} line(s) outside of any section"));
    }
    payload
}
