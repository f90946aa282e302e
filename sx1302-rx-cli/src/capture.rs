//! Capture file loading
//!
//! A capture is a text file with one RX FIFO snapshot per line, written as
//! hex bytes. Whitespace between bytes is optional. Everything after a `#`
//! is a comment and blank lines are skipped.

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to read capture {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line}: {source}")]
    Hex {
        line: usize,
        #[source]
        source: hex::FromHexError,
    },
}

/// Parse capture text into snapshots, in file order
pub fn parse_capture(content: &str) -> Result<Vec<Vec<u8>>, CaptureError> {
    let mut snapshots = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = idx + 1;
        let data = raw.split('#').next().unwrap_or("");
        let digits: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.is_empty() {
            continue;
        }
        let snapshot = hex::decode(&digits).map_err(|source| CaptureError::Hex { line, source })?;
        snapshots.push(snapshot);
    }

    Ok(snapshots)
}

/// Read and parse a capture file
pub fn load_capture(path: &Path) -> Result<Vec<Vec<u8>>, CaptureError> {
    let content = fs::read_to_string(path).map_err(|source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_capture(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_snapshots() {
        let content = "\
# gateway capture
A5 C0 00 01

a5c0ff   # trailing comment
";
        let snapshots = parse_capture(content).unwrap();
        assert_eq!(snapshots, vec![vec![0xA5, 0xC0, 0x00, 0x01], vec![0xA5, 0xC0, 0xFF]]);
    }

    #[test]
    fn test_parse_errors_report_line() {
        match parse_capture("A5C0\nA5C") {
            Err(CaptureError::Hex { line, source }) => {
                assert_eq!(line, 2);
                assert_eq!(source, hex::FromHexError::OddLength);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        match parse_capture("# header\nA5 ZZ") {
            Err(CaptureError::Hex { line, source }) => {
                assert_eq!(line, 2);
                assert_eq!(source, hex::FromHexError::InvalidHexCharacter { c: 'Z', index: 2 });
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_message_names_line() {
        let err = parse_capture("\n\nA5 G0").unwrap_err();
        assert!(err.to_string().starts_with("Line 3: Invalid character 'G'"));
    }

    #[test]
    fn test_load_capture_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "A5C0\n# nothing\n0102").unwrap();
        let snapshots = load_capture(file.path()).unwrap();
        assert_eq!(snapshots.len(), 2);

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_capture(&dir.path().join("missing.hex")),
            Err(CaptureError::Io { .. })
        ));
    }
}
