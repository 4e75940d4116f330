use std::collections::HashMap;

use crate::error::ConfigError;

/// A parsed INI-style document: `[Section]` or `[Section "subname"]` headers,
/// each followed by `key = value` lines. Comments start with `#` or `;`.
/// This mirrors the gcfg-flavored format the relay's config file historically
/// used — bare enough that no general-purpose INI crate models the quoted
/// subsection header, so it's parsed by hand here.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IniDocument {
    /// `(section, subsection)` -> ordered key/value pairs.
    pub sections: Vec<IniSection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IniSection {
    pub name: String,
    pub subsection: Option<String>,
    pub entries: HashMap<String, String>,
}

impl IniDocument {
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name.eq_ignore_ascii_case(name) && s.subsection.is_none())
    }

    pub fn subsections(&self, name: &str) -> impl Iterator<Item = &IniSection> {
        self.sections.iter().filter(move |s| s.name.eq_ignore_ascii_case(name) && s.subsection.is_some())
    }
}

pub fn parse(source: &str) -> Result<IniDocument, ConfigError> {
    let mut sections = Vec::new();
    let mut current: Option<IniSection> = None;

    for (lineno, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            let (name, subsection) = parse_header(header).ok_or_else(|| ConfigError::IniSyntax {
                line: lineno + 1,
                message: format!("malformed section header: [{header}]"),
            })?;
            current = Some(IniSection { name, subsection, entries: HashMap::new() });
            continue;
        }

        let Some(section) = current.as_mut() else {
            return Err(ConfigError::IniSyntax {
                line: lineno + 1,
                message: "key/value line outside of any section".to_string(),
            });
        };

        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::IniSyntax {
            line: lineno + 1,
            message: format!("expected `key = value`, found `{line}`"),
        })?;
        section.entries.insert(key.trim().to_string(), unquote(value.trim()));
    }

    if let Some(section) = current.take() {
        sections.push(section);
    }

    Ok(IniDocument { sections })
}

fn parse_header(header: &str) -> Option<(String, Option<String>)> {
    match header.split_once(' ') {
        Some((name, rest)) => {
            let rest = rest.trim();
            let sub = rest.strip_prefix('"')?.strip_suffix('"')?;
            Some((name.trim().to_string(), Some(sub.to_string())))
        }
        None => Some((header.trim().to_string(), None)),
    }
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_quoted_sections() {
        let doc = parse(
            "[Main]\nport = 1234\n\n[Environment \"prod\"]\nsdkKey = sdk-abc\nsecureMode = true\n",
        )
        .unwrap();
        let main = doc.section("Main").unwrap();
        assert_eq!(main.entries.get("port").unwrap(), "1234");

        let envs: Vec<_> = doc.subsections("Environment").collect();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].subsection.as_deref(), Some("prod"));
        assert_eq!(envs[0].entries.get("sdkKey").unwrap(), "sdk-abc");
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let doc = parse("# a comment\n\n; another\n[Main]\nport = 1\n").unwrap();
        assert_eq!(doc.section("Main").unwrap().entries.get("port").unwrap(), "1");
    }

    #[test]
    fn quoted_values_are_unquoted() {
        let doc = parse("[Main]\nlogLevel = \"debug\"\n").unwrap();
        assert_eq!(doc.section("Main").unwrap().entries.get("logLevel").unwrap(), "debug");
    }

    #[test]
    fn key_value_outside_section_is_an_error() {
        assert!(parse("port = 1\n").is_err());
    }

    #[test]
    fn malformed_header_is_an_error() {
        assert!(parse("[Environment unterminated\nfoo = 1\n").is_err());
    }
}
