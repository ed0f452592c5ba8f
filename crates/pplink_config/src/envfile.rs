//! Line-preserving `KEY=VALUE` configuration file.
//!
//! The file is kept as an ordered list of lines. Entry lines are parsed into
//! key and value; everything else (comments, blank lines, lines without `=`)
//! is carried verbatim. Rewriting a key touches only that key's line, so
//! unrelated lines keep their content and position across rewrites.
//!
//! # Example
//!
//! ```rust
//! use pplink_config::EnvFile;
//!
//! let mut file = EnvFile::parse(".env", "# tenant\nAZURE_TENANT_ID=abc\n");
//! file.set("RESOURCE_GROUP", "rg-network").unwrap();
//! assert_eq!(file.render(), "# tenant\nAZURE_TENANT_ID=abc\nRESOURCE_GROUP=rg-network\n");
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::lock::{write_atomic, EnvFileLock};

/// A single line of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EnvLine {
    /// A `KEY=VALUE` line.
    Entry {
        /// Everything before the key (indentation, `export `).
        prefix: String,
        key: String,
        value: String,
        /// Original text, without the line terminator.
        raw: String,
        /// Whether the line ended with `\r\n`.
        crlf: bool,
    },
    /// Comment, blank or otherwise unparsed line, kept as-is.
    Verbatim(String),
}

impl EnvLine {
    fn parse(line: &str) -> Self {
        let (body, crlf) = match line.strip_suffix('\r') {
            Some(stripped) => (stripped, true),
            None => (line, false),
        };

        let trimmed = body.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return EnvLine::Verbatim(line.to_string());
        }

        let Some(eq) = body.find('=') else {
            return EnvLine::Verbatim(line.to_string());
        };

        let head = &body[..eq];
        let indent_len = head.len() - head.trim_start().len();
        let mut key_part = head.trim_start();
        let mut prefix = head[..indent_len].to_string();
        if let Some(rest) = key_part.strip_prefix("export ") {
            prefix.push_str("export ");
            key_part = rest.trim_start();
        }
        let key = key_part.trim_end();

        if !is_valid_key(key) {
            return EnvLine::Verbatim(line.to_string());
        }

        EnvLine::Entry {
            prefix,
            key: key.to_string(),
            value: unquote(body[eq + 1..].trim()).to_string(),
            raw: line.to_string(),
            crlf,
        }
    }

    fn key(&self) -> Option<&str> {
        match self {
            EnvLine::Entry { key, .. } => Some(key),
            EnvLine::Verbatim(_) => None,
        }
    }

    fn raw(&self) -> &str {
        match self {
            EnvLine::Entry { raw, .. } => raw,
            EnvLine::Verbatim(raw) => raw,
        }
    }
}

/// Check whether `key` is usable as a configuration key.
///
/// Keys start with a letter or underscore and continue with letters, digits,
/// underscores, dots or dashes.
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// An ordered, line-preserving `.env` style configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvFile {
    path: PathBuf,
    lines: Vec<EnvLine>,
    trailing_newline: bool,
}

impl EnvFile {
    /// Create an empty configuration bound to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines: Vec::new(),
            trailing_newline: false,
        }
    }

    /// Parse configuration text. Parsing never fails; lines that are not
    /// valid entries are kept verbatim.
    pub fn parse(path: impl Into<PathBuf>, contents: &str) -> Self {
        let mut file = Self::new(path);
        if contents.is_empty() {
            return file;
        }

        let body = match contents.strip_suffix('\n') {
            Some(stripped) => {
                file.trailing_newline = true;
                stripped
            }
            None => contents,
        };

        file.lines = body.split('\n').map(EnvLine::parse).collect();
        file
    }

    /// Load the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        debug!("Loaded configuration from {:?}", path);
        Ok(Self::parse(path, &contents))
    }

    /// Load the file at `path`, or start empty if it does not exist yet.
    pub fn load_or_empty(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No configuration at {:?}, starting empty", path);
            Ok(Self::new(path))
        }
    }

    /// Path this file is saved to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value of `key`. With duplicate keys the last occurrence wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match line {
            EnvLine::Entry { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Check whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set `key` to `value`.
    ///
    /// An existing key is rewritten in place (its last occurrence); a new key
    /// is appended. Returns `true` when the rendered file changed.
    pub fn set(&mut self, key: &str, value: &str) -> ConfigResult<bool> {
        if !is_valid_key(key) {
            return Err(ConfigError::InvalidKey(key.to_string()));
        }
        if value.contains('\n') || value.contains('\r') {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                reason: "values cannot span multiple lines".to_string(),
            });
        }

        let existing = self
            .lines
            .iter()
            .rposition(|line| line.key() == Some(key));

        match existing {
            Some(index) => {
                let EnvLine::Entry {
                    prefix,
                    value: current,
                    raw,
                    crlf,
                    ..
                } = &mut self.lines[index]
                else {
                    unreachable!("rposition matched an entry line");
                };
                if current == value {
                    return Ok(false);
                }
                *current = value.to_string();
                *raw = format!("{}{}={}{}", prefix, key, value, if *crlf { "\r" } else { "" });
                debug!("Updated configuration key {}", key);
            }
            None => {
                self.lines.push(EnvLine::Entry {
                    prefix: String::new(),
                    key: key.to_string(),
                    value: value.to_string(),
                    raw: format!("{}={}", key, value),
                    crlf: false,
                });
                self.trailing_newline = true;
                debug!("Added configuration key {}", key);
            }
        }

        Ok(true)
    }

    /// Remove every occurrence of `key`. Returns `true` if anything was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.key() != Some(key));
        if self.lines.is_empty() {
            self.trailing_newline = false;
        }
        before != self.lines.len()
    }

    /// Keys in file order, without duplicates.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for key in self.lines.iter().filter_map(EnvLine::key) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// `(key, value)` pairs in file order, resolving duplicates to the last value.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(key).map(|value| (key, value)))
            .collect()
    }

    /// Number of lines in the file.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Render the file back to text.
    pub fn render(&self) -> String {
        let mut out = self
            .lines
            .iter()
            .map(EnvLine::raw)
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    /// Write the file to its path, holding the advisory lock for the
    /// duration of the write.
    pub fn save(&self) -> ConfigResult<()> {
        let _lock = EnvFileLock::acquire(&self.path)?;
        write_atomic(&self.path, self.render().as_bytes())?;
        debug!("Saved configuration to {:?}", self.path);
        Ok(())
    }
}

impl fmt::Display for EnvFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_comments_and_blanks() {
        let text = "# header\n\nA=1\n  # indented\nB=two\n";
        let file = EnvFile::parse(".env", text);

        assert_eq!(file.line_count(), 5);
        assert_eq!(file.get("A"), Some("1"));
        assert_eq!(file.get("B"), Some("two"));
        assert_eq!(file.render(), text);
    }

    #[test]
    fn test_value_split_at_first_equals() {
        let file = EnvFile::parse(".env", "CONN=Server=x;Key=y\n");
        assert_eq!(file.get("CONN"), Some("Server=x;Key=y"));
    }

    #[test]
    fn test_quotes_and_export_prefix() {
        let file = EnvFile::parse(".env", "export NAME=\"Fabrikam Tst\"\nOTHER='x'\n");
        assert_eq!(file.get("NAME"), Some("Fabrikam Tst"));
        assert_eq!(file.get("OTHER"), Some("x"));
    }

    #[test]
    fn test_set_rewrites_in_place_with_prefix() {
        let mut file = EnvFile::parse(".env", "export A=1\nB=2\n");
        assert!(file.set("A", "9").unwrap());
        assert_eq!(file.render(), "export A=9\nB=2\n");
    }

    #[test]
    fn test_set_same_value_is_noop() {
        let mut file = EnvFile::parse(".env", "A=\"1\"\n");
        assert!(!file.set("A", "1").unwrap());
        assert_eq!(file.render(), "A=\"1\"\n");
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let mut file = EnvFile::parse(".env", "A=1\nA=2\n");
        assert_eq!(file.get("A"), Some("2"));

        file.set("A", "3").unwrap();
        assert_eq!(file.render(), "A=1\nA=3\n");
        assert_eq!(file.keys(), vec!["A"]);
    }

    #[test]
    fn test_crlf_preserved() {
        let mut file = EnvFile::parse(".env", "A=1\r\nB=2\r\n");
        assert_eq!(file.get("A"), Some("1"));
        file.set("A", "5").unwrap();
        assert_eq!(file.render(), "A=5\r\nB=2\r\n");
    }

    #[test]
    fn test_append_without_trailing_newline() {
        let mut file = EnvFile::parse(".env", "A=1");
        file.set("B", "2").unwrap();
        assert_eq!(file.render(), "A=1\nB=2\n");
    }

    #[test]
    fn test_rejects_multiline_value_and_bad_key() {
        let mut file = EnvFile::new(".env");
        assert!(matches!(
            file.set("A", "x\ny"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(file.set("1BAD", "x"), Err(ConfigError::InvalidKey(_))));
        assert!(matches!(file.set("", "x"), Err(ConfigError::InvalidKey(_))));
    }

    #[test]
    fn test_invalid_key_line_is_verbatim() {
        let file = EnvFile::parse(".env", "not a key=1\n");
        assert!(file.keys().is_empty());
        assert_eq!(file.render(), "not a key=1\n");
    }

    #[test]
    fn test_remove() {
        let mut file = EnvFile::parse(".env", "# c\nA=1\nB=2\nA=3\n");
        assert!(file.remove("A"));
        assert!(!file.remove("A"));
        assert_eq!(file.render(), "# c\nB=2\n");
    }

    #[test]
    fn test_empty_file() {
        let file = EnvFile::parse(".env", "");
        assert_eq!(file.line_count(), 0);
        assert_eq!(file.render(), "");

        let blank = EnvFile::parse(".env", "\n");
        assert_eq!(blank.line_count(), 1);
        assert_eq!(blank.render(), "\n");
    }
}
