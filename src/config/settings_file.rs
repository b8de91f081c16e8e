//! `[Section] key=value` settings file reader.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::{Error, Result};

/// Parser for settings files.
///
/// Files look like:
/// ```ini
/// # surface in meters
/// [field]
/// length=40
/// width=20
///
/// [tracking]
/// strategy=greedy
/// ```
/// Section and key names are case-insensitive. Lines starting with `#` or
/// `;` are comments. Keys before the first section header belong to the
/// empty section.
#[derive(Debug)]
pub struct SettingsFile {
    entries: Vec<(String, String, String)>,
}

impl SettingsFile {
    /// Create a new SettingsFile by reading the given file path.
    pub fn new<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref().to_string_lossy().to_string();
        let file = File::open(&file_path).map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.kind(),
                format!("failed to open settings file '{}': {}", path, e),
            ))
        })?;

        let reader = BufReader::new(file);
        let lines = reader.lines().collect::<std::io::Result<Vec<String>>>()?;

        Self::parse(path, lines.iter().map(String::as_str))
    }

    /// Parse settings from in-memory text.
    pub fn from_text(text: &str) -> Result<Self> {
        Self::parse("<text>".to_string(), text.lines())
    }

    fn parse<'a>(path: String, lines: impl Iterator<Item = &'a str>) -> Result<Self> {
        let mut section = String::new();
        let mut entries = Vec::new();

        for (line_no, raw) in lines.enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| {
                    Error::InvalidConfig(format!("{}:{}: unterminated section header", path, line_no + 1))
                })?;
                section = name.trim().to_ascii_lowercase();
                continue;
            }

            let equal_idx = line.find('=').ok_or_else(|| {
                Error::InvalidConfig(format!("{}:{}: expected key=value, got '{}'", path, line_no + 1, line))
            })?;
            let key = line[..equal_idx].trim().to_ascii_lowercase();
            let value = line[equal_idx + 1..].trim().to_string();
            entries.push((section.clone(), key, value));
        }

        Ok(Self { entries })
    }

    /// Look up a value. When a key is repeated the last occurrence wins.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(s, k, _)| s.eq_ignore_ascii_case(section) && k.eq_ignore_ascii_case(key))
            .map(|(_, _, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_settings() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# court").unwrap();
        writeln!(file, "[Field]").unwrap();
        writeln!(file, "length=42").unwrap();
        writeln!(file, "width = 21.5").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "[tracking]").unwrap();
        writeln!(file, "strategy=optimal").unwrap();
        writeln!(file, "frame_stride=3").unwrap();
        file
    }

    #[test]
    fn test_read_from_file() {
        let file = create_temp_settings();
        let settings = SettingsFile::new(file.path()).unwrap();

        assert_eq!(settings.get("field", "length"), Some("42"));
        assert_eq!(settings.get("field", "width"), Some("21.5"));
        assert_eq!(settings.get("TRACKING", "strategy"), Some("optimal"));
        assert_eq!(settings.get("tracking", "frame_stride"), Some("3"));
    }

    #[test]
    fn test_get_not_found() {
        let file = create_temp_settings();
        let settings = SettingsFile::new(file.path()).unwrap();

        assert_eq!(settings.get("field", "nonexistent"), None);
        // Keys are scoped by section
        assert_eq!(settings.get("tracking", "length"), None);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let settings = SettingsFile::from_text("[field]\nlength=30\nlength=38\n").unwrap();
        assert_eq!(settings.get("field", "length"), Some("38"));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(SettingsFile::from_text("[field\nlength=30").is_err());
        assert!(SettingsFile::from_text("[field]\nlength 30").is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SettingsFile::new(dir.path().join("missing.ini")).unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
    }
}
