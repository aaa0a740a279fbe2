//! Flat key/value properties files
//!
//! The file is a list of `key=value` lines.  Related records are stored as
//! "groups": every record of group `servers` lives under
//! `servers.<index>.<field>` and the number of records is kept in
//! `servers.count`.  A missing count means the group is empty.
//!
//! Values that are present but empty are treated like absent values by
//! every getter in this module.

use crate::error::SettingsError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    str::{Chars, FromStr},
};

const HEADER: &str = "# Hudson Tray Tracker configuration";

/// Matches `<group>.<index>.<field>`
static GROUP_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^.]+)\.(\d+)\.(.+)$").expect("group key pattern is valid"));

/// An in-memory copy of a properties file
#[derive(Debug, Clone)]
pub struct PropertiesFile {
    path: PathBuf,
    /// Keys in insertion order
    entries: Vec<(String, String)>,
}

impl PropertiesFile {
    /// Read a properties file, creating an empty one if it does not exist yet
    pub fn read(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .open(&path)
                    .map_err(|e| SettingsError::io(&path, e))?;
                String::new()
            }
            Err(e) => return Err(SettingsError::io(&path, e)),
        };

        Ok(Self {
            entries: parse(&text)?,
            path,
        })
    }

    /// Create an empty properties file bound to `path` without touching disk
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every key
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get the raw value of a key, empty values included
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Set a key, or remove it when `value` is `None`
    pub fn set_opt(&mut self, key: impl Into<String>, value: Option<&str>) {
        let key = key.into();
        match value {
            Some(v) => self.set(key, v),
            None => self.remove(&key),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).map(str::to_owned)
    }

    pub fn required_string(&self, key: &str) -> Result<String, SettingsError> {
        self.string(key)
            .ok_or_else(|| SettingsError::MissingKey(key.to_owned()))
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>, SettingsError> {
        match self.get(key).filter(|v| !v.trim().is_empty()) {
            None => Ok(None),
            Some(raw) => parse_bool(raw).map(Some).ok_or_else(|| SettingsError::InvalidValue {
                key: key.to_owned(),
                value: raw.to_owned(),
                expected: "boolean",
            }),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, SettingsError> {
        self.bool(key).map(|v| v.unwrap_or(default))
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, if value { "true" } else { "false" });
    }

    /// Parse any integer type out of a key
    pub fn int<T: FromStr>(&self, key: &str) -> Result<Option<T>, SettingsError> {
        match self.get(key).filter(|v| !v.trim().is_empty()) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| SettingsError::InvalidValue {
                    key: key.to_owned(),
                    value: raw.to_owned(),
                    expected: "integer",
                }),
        }
    }

    pub fn int_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, SettingsError> {
        self.int(key).map(|v| v.unwrap_or(default))
    }

    pub fn required_int<T: FromStr>(&self, key: &str) -> Result<T, SettingsError> {
        self.int(key)?
            .ok_or_else(|| SettingsError::MissingKey(key.to_owned()))
    }

    pub fn set_int<T: ToString>(&mut self, key: impl Into<String>, value: T) {
        self.set(key, value.to_string());
    }

    /// Number of records stored for `group`, zero when the count key is absent
    pub fn group_count(&self, group: &str) -> Result<usize, SettingsError> {
        self.int_or(&count_key(group), 0)
    }

    pub fn set_group_count(&mut self, group: &str, count: usize) {
        self.set_int(count_key(group), count);
    }

    pub fn group_string(&self, group: &str, index: usize, field: &str) -> Option<String> {
        self.string(&group_key(group, index, field))
    }

    pub fn group_required_string(
        &self,
        group: &str,
        index: usize,
        field: &str,
    ) -> Result<String, SettingsError> {
        self.required_string(&group_key(group, index, field))
    }

    pub fn group_bool_or(
        &self,
        group: &str,
        index: usize,
        field: &str,
        default: bool,
    ) -> Result<bool, SettingsError> {
        self.bool_or(&group_key(group, index, field), default)
    }

    pub fn group_required_int<T: FromStr>(
        &self,
        group: &str,
        index: usize,
        field: &str,
    ) -> Result<T, SettingsError> {
        self.required_int(&group_key(group, index, field))
    }

    pub fn set_group_string(&mut self, group: &str, index: usize, field: &str, value: &str) {
        self.set(group_key(group, index, field), value);
    }

    pub fn set_group_opt(&mut self, group: &str, index: usize, field: &str, value: Option<&str>) {
        self.set_opt(group_key(group, index, field), value);
    }

    pub fn set_group_bool(&mut self, group: &str, index: usize, field: &str, value: bool) {
        self.set_bool(group_key(group, index, field), value);
    }

    pub fn set_group_int<T: ToString>(&mut self, group: &str, index: usize, field: &str, value: T) {
        self.set_int(group_key(group, index, field), value);
    }

    /// Keys of `group` whose index is at or beyond `count` or written
    /// with a leading zero
    ///
    /// These are never read, usually they are leftovers of hand editing.
    pub fn stray_group_keys(&self, group: &str, count: usize) -> Vec<&str> {
        self.entries
            .iter()
            .map(|(k, _)| k.as_str())
            .filter(|k| match GROUP_KEY.captures(k) {
                Some(caps) => {
                    &caps[1] == group
                        && ((caps[2].len() > 1 && caps[2].starts_with('0'))
                            || caps[2].parse::<usize>().map_or(true, |index| index >= count))
                }
                None => false,
            })
            .collect()
    }

    /// Render the file contents
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(HEADER.len() + 1 + self.entries.len() * 32);
        out.push_str(HEADER);
        out.push('\n');
        for (key, value) in &self.entries {
            out.push_str(&escape(key, true));
            out.push('=');
            out.push_str(&escape(value, false));
            out.push('\n');
        }
        out
    }

    /// Replace the file on disk with the in-memory contents
    ///
    /// The contents go to a sibling temporary file first which is then
    /// renamed over the target, so readers never see a half written file.
    pub fn write(&self) -> Result<(), SettingsError> {
        let tmp = self.path.with_extension("properties.tmp");
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)
            .and_then(|mut f| {
                f.write_all(self.render().as_bytes())?;
                f.sync_all()
            })
            .map_err(|e| SettingsError::io(&tmp, e))?;

        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            SettingsError::io(&self.path, e)
        })
    }
}

pub fn group_key(group: &str, index: usize, field: &str) -> String {
    format!("{}.{}.{}", group, index, field)
}

fn count_key(group: &str) -> String {
    format!("{}.count", group)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parse the text of a properties file into its entries
///
/// Later duplicates of a key overwrite earlier ones.
pub fn parse(text: &str) -> Result<Vec<(String, String)>, SettingsError> {
    let text = text.trim_start_matches('\u{feff}');
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut lines = text.lines().enumerate();

    while let Some((n, line)) = lines.next() {
        let line_no = n + 1;
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = trimmed.to_owned();
        while continues(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        let key = unescape(key, line_no)?;
        let value = unescape(value, line_no)?;

        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    Ok(entries)
}

/// A line continues when it ends in an odd number of backslashes
fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Split a logical line into its raw (still escaped) key and value
fn split_entry(line: &str) -> (&str, &str) {
    let mut key_end = line.len();
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if c.is_whitespace() => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let rest = line[key_end..].trim_start();
    let rest = rest.strip_prefix(&['=', ':'][..]).unwrap_or(rest).trim_start();
    (&line[..key_end], rest)
}

fn unescape(raw: &str, line: usize) -> Result<String, SettingsError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{0C}'),
            Some('u') => out.push(unicode_escape(&mut chars, line)?),
            Some(other) => out.push(other),
            // a lone trailing backslash is dropped
            None => {}
        }
    }

    Ok(out)
}

/// Decode the rest of a `\uXXXX` escape, joining UTF-16 surrogate pairs
fn unicode_escape(chars: &mut Chars<'_>, line: usize) -> Result<char, SettingsError> {
    let high = hex4(chars, line)?;
    let code = match high {
        0xD800..=0xDBFF => {
            if chars.next() != Some('\\') || chars.next() != Some('u') {
                return Err(SettingsError::Syntax {
                    line,
                    message: format!("unpaired surrogate `\\u{:04X}`", high),
                });
            }
            let low = hex4(chars, line)?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(SettingsError::Syntax {
                    line,
                    message: format!("unpaired surrogate `\\u{:04X}`", high),
                });
            }
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        }
        code => code,
    };
    char::from_u32(code).ok_or_else(|| SettingsError::Syntax {
        line,
        message: format!("unpaired surrogate `\\u{:04X}`", code),
    })
}

fn hex4(chars: &mut Chars<'_>, line: usize) -> Result<u32, SettingsError> {
    let hex: String = chars.by_ref().take(4).collect();
    match u32::from_str_radix(&hex, 16) {
        Ok(code) if hex.len() == 4 && hex.bytes().all(|b| b.is_ascii_hexdigit()) => Ok(code),
        _ => Err(SettingsError::Syntax {
            line,
            message: format!("invalid unicode escape `\\u{}`", hex),
        }),
    }
}

fn escape(raw: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{0C}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_separators_and_comments() {
        let entries = parse(
            "# comment\n\
             ! also a comment\n\
             \n\
             a=1\n\
             b : 2\n\
             c 3\n\
             \x20  d=  spaced value\n",
        )
        .unwrap();

        assert_eq!(
            entries,
            vec![
                ("a".to_owned(), "1".to_owned()),
                ("b".to_owned(), "2".to_owned()),
                ("c".to_owned(), "3".to_owned()),
                ("d".to_owned(), "spaced value".to_owned()),
            ]
        );
    }

    #[test]
    fn joins_continuation_lines() {
        let entries = parse("path=C:\\\\sounds\\\\\\\n    failed.wav\nnext=x\n").unwrap();
        assert_eq!(entries[0].1, "C:\\sounds\\failed.wav");
        assert_eq!(entries[1], ("next".to_owned(), "x".to_owned()));
    }

    #[test]
    fn even_backslashes_do_not_continue() {
        let entries = parse("a=x\\\\\nb=y\n").unwrap();
        assert_eq!(entries[0].1, "x\\");
        assert_eq!(entries[1].1, "y");
    }

    #[test]
    fn handles_escapes() {
        let entries = parse("my\\ key=tab\\there \\u00e9\\=\\:\n").unwrap();
        assert_eq!(entries[0], ("my key".to_owned(), "tab\there é=:".to_owned()));
    }

    #[test]
    fn crlf_and_bom_are_accepted() {
        let entries = parse("\u{feff}a=1\r\nb=2\r\n").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[1].1, "2");
    }

    #[test]
    fn bad_unicode_escape_names_the_line() {
        match parse("a=1\nb=\\u12G4\n") {
            Err(SettingsError::Syntax { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected syntax error, got {:?}", other),
        }
        assert!(parse("a=\\u12").is_err());
    }

    #[test]
    fn unicode_escapes_are_strict_and_join_surrogates() {
        assert!(parse("a=\\u+041").is_err());
        assert!(parse("a=\\u-041").is_err());
        assert_eq!(parse("a=\\u0041").unwrap()[0].1, "A");
        assert_eq!(parse("a=\\uD83D\\uDE00!").unwrap()[0].1, "\u{1F600}!");

        for lone in &["a=\\uD83D", "a=\\uD83Dx", "a=\\uD83D\\u0041", "a=\\uDE00"] {
            match parse(lone) {
                Err(SettingsError::Syntax { line, .. }) => assert_eq!(line, 1),
                other => panic!("expected syntax error for {}, got {:?}", lone, other),
            }
        }
    }

    #[test]
    fn later_duplicates_win() {
        let entries = parse("a=1\na=2\n").unwrap();
        assert_eq!(entries, vec![("a".to_owned(), "2".to_owned())]);
    }

    #[test]
    fn render_escapes_what_parse_unescapes() {
        let mut file = PropertiesFile::empty("unused");
        file.set("sounds.Failed", "C:\\Media\\fail #1.wav");
        file.set("odd key", " leading=space\nand newline");
        file.set("plain", "ünïcödé");

        let reparsed = parse(&file.render()).unwrap();
        assert_eq!(reparsed, file.entries);
        assert!(file.render().starts_with(HEADER));
    }

    #[test]
    fn typed_getters() {
        let mut file = PropertiesFile::empty("unused");
        file.set("yes", "True");
        file.set("no", "false");
        file.set("bad", "maybe");
        file.set("n", " 42 ");
        file.set("empty", "");

        assert_eq!(file.bool("yes").unwrap(), Some(true));
        assert_eq!(file.bool("no").unwrap(), Some(false));
        assert!(file.bool("missing").unwrap().is_none());
        assert!(file.bool_or("empty", true).unwrap());
        assert!(matches!(
            file.bool("bad"),
            Err(SettingsError::InvalidValue { expected: "boolean", .. })
        ));
        assert_eq!(file.int::<u32>("n").unwrap(), Some(42));
        assert!(file.int::<u32>("bad").is_err());
        assert_eq!(file.string("empty"), None);
        assert!(matches!(
            file.required_string("empty"),
            Err(SettingsError::MissingKey(ref k)) if k == "empty"
        ));
    }

    #[test]
    fn groups() {
        let mut file = PropertiesFile::empty("unused");
        assert_eq!(file.group_count("servers").unwrap(), 0);

        file.set_group_string("servers", 0, "url", "http://ci");
        file.set_group_bool("servers", 0, "ignoreUntrustedCertificate", true);
        file.set_group_int("projects", 0, "server", 0usize);
        file.set_group_count("servers", 1);

        assert_eq!(file.get("servers.0.url"), Some("http://ci"));
        assert_eq!(file.get("servers.count"), Some("1"));
        assert_eq!(file.group_count("servers").unwrap(), 1);
        assert!(file
            .group_bool_or("servers", 0, "ignoreUntrustedCertificate", false)
            .unwrap());
        assert_eq!(
            file.group_required_int::<usize>("projects", 0, "server").unwrap(),
            0
        );
        assert!(file.group_required_string("servers", 1, "url").is_err());
    }

    #[test]
    fn set_opt_none_removes() {
        let mut file = PropertiesFile::empty("unused");
        file.set("sounds.Fixed", "a.wav");
        file.set_opt("sounds.Fixed", None);
        assert!(file.get("sounds.Fixed").is_none());
        assert!(file.is_empty());
    }

    #[test]
    fn finds_stray_group_keys() {
        let mut file = PropertiesFile::empty("unused");
        file.set("servers.0.url", "a");
        file.set("servers.5.url", "b");
        file.set("servers.count", "1");
        file.set("projects.7.name", "p");

        assert_eq!(file.stray_group_keys("servers", 1), vec!["servers.5.url"]);
        assert!(file.stray_group_keys("projects", 8).is_empty());
    }

    #[test]
    fn leading_zero_indexes_are_stray() {
        let mut file = PropertiesFile::empty("unused");
        file.set("servers.0.url", "a");
        file.set("servers.01.url", "b");
        file.set("servers.1.url", "c");

        assert_eq!(file.stray_group_keys("servers", 2), vec!["servers.01.url"]);
    }

    #[test]
    fn read_creates_missing_file_and_write_replaces_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hudson.properties");

        let mut file = PropertiesFile::read(&path).unwrap();
        assert!(path.exists());
        assert!(file.is_empty());

        file.set("general.RefreshTimeInSeconds", "30");
        file.write().unwrap();
        assert!(!path.with_extension("properties.tmp").exists());

        let reread = PropertiesFile::read(&path).unwrap();
        assert_eq!(reread.get("general.RefreshTimeInSeconds"), Some("30"));
        assert_eq!(reread.len(), 1);
    }
}
