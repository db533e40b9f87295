use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde_json::json;
use thiserror::Error;

/// Upper bound on bytes consumed from one file in one read.
pub const MAX_READ_BYTES: u64 = 512 * 1024;

/// Read position for one tailed file: bytes confirmed consumed, plus the
/// trailing incomplete line carried into the next read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub offset: u64,
    pub partial: String,
}

/// The tailer could not access a file. The cursor is left untouched; the
/// next poll simply retries.
#[derive(Debug, Error)]
#[error("failed to read {path}: {source}")]
pub struct TailError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl TailError {
    pub fn is_not_found(&self) -> bool {
        self.source.kind() == std::io::ErrorKind::NotFound
    }
}

/// Turns growing append-only files into sequences of complete lines.
///
/// One cursor per path, kept across calls; the same path always resolves to
/// the same cursor. Safe to drive many files from one task, but not for
/// concurrent use on the same path.
#[derive(Debug)]
pub struct DeltaTailer {
    cursors: HashMap<PathBuf, Cursor>,
    max_read_bytes: u64,
}

impl Default for DeltaTailer {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaTailer {
    pub fn new() -> Self {
        Self::with_max_read_bytes(MAX_READ_BYTES)
    }

    pub fn with_max_read_bytes(max_read_bytes: u64) -> Self {
        Self {
            cursors: HashMap::new(),
            max_read_bytes,
        }
    }

    /// Complete lines appended since the last read, oldest first, blank
    /// lines filtered out.
    ///
    /// A file that shrank below the cursor offset is treated as rotated: the
    /// cursor resets and the whole file is read again. If the unread span
    /// exceeds the read cap, only the final cap bytes are consumed and a
    /// synthetic marker line is prepended so the skip is never silent.
    pub fn read_delta(&mut self, path: &Path) -> Result<Vec<String>, TailError> {
        let cursor = self.cursors.entry(path.to_path_buf()).or_default();

        let size = stat_len(path)?;

        // Shrunk below our offset: the file was truncated or rotated.
        if size < cursor.offset {
            cursor.offset = 0;
            cursor.partial.clear();
        }

        if size == cursor.offset {
            return Ok(Vec::new());
        }

        let mut start = cursor.offset;
        let mut dropped = false;
        if size - cursor.offset > self.max_read_bytes {
            start = size - self.max_read_bytes;
            dropped = true;
        }

        let chunk = read_range(path, start, size - start)?;

        // Only now that the read succeeded may the cursor move.
        cursor.offset = size;
        let carried = if dropped {
            // The pending fragment belonged to the skipped bytes.
            cursor.partial.clear();
            String::new()
        } else {
            std::mem::take(&mut cursor.partial)
        };

        let text = carried + &String::from_utf8_lossy(&chunk);
        let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        cursor.partial = lines.pop().unwrap_or_default();

        let mut out = Vec::with_capacity(lines.len() + 1);
        if dropped {
            out.push(gap_marker(path));
        }
        out.extend(lines.into_iter().filter(|line| !line.is_empty()));
        Ok(out)
    }

    /// Move the cursor to end-of-file, skipping any existing backlog.
    pub fn seek_to_end(&mut self, path: &Path) -> Result<(), TailError> {
        let size = stat_len(path)?;
        self.cursors.insert(
            path.to_path_buf(),
            Cursor {
                offset: size,
                partial: String::new(),
            },
        );
        Ok(())
    }

    /// Drop cursors for files that are no longer tailed.
    pub fn retain_paths<F: Fn(&Path) -> bool>(&mut self, keep: F) {
        self.cursors.retain(|path, _| keep(path));
    }

    pub fn cursor(&self, path: &Path) -> Option<&Cursor> {
        self.cursors.get(path)
    }
}

/// Last `limit` non-empty lines of a file, reading at most [`MAX_READ_BYTES`]
/// from the tail. Cursors are not involved; used for boot backfill.
pub fn read_tail_lines(path: &Path, limit: usize) -> Result<Vec<String>, TailError> {
    let size = stat_len(path)?;
    let start = size.saturating_sub(MAX_READ_BYTES);
    if size == start {
        return Ok(Vec::new());
    }
    let chunk = read_range(path, start, size - start)?;
    let text = String::from_utf8_lossy(&chunk);
    let lines: Vec<String> = text
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    let skip = lines.len().saturating_sub(limit);
    Ok(lines[skip..].to_vec())
}

/// Synthetic, self-describing line prepended when old bytes were skipped.
/// Transformers turn it into a warning event.
pub fn gap_marker(path: &Path) -> String {
    json!({
        "synthetic": true,
        "kind": "collector_warning",
        "message": format!("collector skipped old bytes for {}", path.display()),
    })
    .to_string()
}

fn stat_len(path: &Path) -> Result<u64, TailError> {
    std::fs::metadata(path)
        .map(|meta| meta.len())
        .map_err(|source| TailError {
            path: path.to_path_buf(),
            source,
        })
}

fn read_range(path: &Path, start: u64, len: u64) -> Result<Vec<u8>, TailError> {
    let read = || -> std::io::Result<Vec<u8>> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::with_capacity(len as usize);
        file.take(len).read_to_end(&mut buf)?;
        Ok(buf)
    };
    read().map_err(|source| TailError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn file_in(dir: &TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    fn append(path: &Path, data: &str) {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(data.as_bytes()).unwrap();
    }

    #[test]
    fn two_reads_never_duplicate_or_drop_lines() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "history.jsonl");
        let mut tailer = DeltaTailer::new();

        append(&path, "{\"a\":1}\n{\"a\":");
        assert_eq!(tailer.read_delta(&path).unwrap(), vec!["{\"a\":1}"]);

        append(&path, "2}\n");
        assert_eq!(tailer.read_delta(&path).unwrap(), vec!["{\"a\":2}"]);
    }

    #[test]
    fn steady_state_returns_empty() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "log");
        let mut tailer = DeltaTailer::new();

        append(&path, "line\n");
        assert_eq!(tailer.read_delta(&path).unwrap().len(), 1);

        let before = tailer.cursor(&path).cloned();
        assert!(tailer.read_delta(&path).unwrap().is_empty());
        assert_eq!(tailer.cursor(&path).cloned(), before);
    }

    #[test]
    fn truncation_resets_and_recovers_current_content() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "log");
        let mut tailer = DeltaTailer::new();

        append(&path, "{\"a\":1}\n{\"a\":2}\n");
        assert_eq!(tailer.read_delta(&path).unwrap().len(), 2);

        // Rotation: the file is replaced by shorter content.
        fs::write(&path, "{\"b\":1}\n").unwrap();
        assert_eq!(tailer.read_delta(&path).unwrap(), vec!["{\"b\":1}"]);
    }

    #[test]
    fn oversized_gap_marks_and_skips_old_bytes() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "log");
        let mut tailer = DeltaTailer::with_max_read_bytes(64);

        // 20 lines of 16 bytes each; only the last 64 bytes (4 lines) fit.
        for i in 0..20 {
            append(&path, &format!("line-{i:02}-padding\n"));
        }

        let lines = tailer.read_delta(&path).unwrap();
        assert!(lines[0].contains("\"synthetic\":true"));
        assert!(lines[0].contains("skipped old bytes"));
        assert_eq!(&lines[1..], &["line-16-padding", "line-17-padding", "line-18-padding", "line-19-padding"]);
        assert!(lines.iter().skip(1).all(|l| !l.contains("line-15")));
    }

    #[test]
    fn oversized_gap_discards_pending_partial() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "log");
        let mut tailer = DeltaTailer::with_max_read_bytes(64);

        append(&path, "orphan-fragment");
        assert!(tailer.read_delta(&path).unwrap().is_empty());
        assert_eq!(tailer.cursor(&path).unwrap().partial, "orphan-fragment");

        for i in 0..20 {
            append(&path, &format!("line-{i:02}-padding\n"));
        }

        let lines = tailer.read_delta(&path).unwrap();
        assert!(lines[0].contains("\"synthetic\":true"));
        assert!(
            lines.iter().all(|l| !l.contains("orphan-fragment")),
            "The stale fragment belongs to skipped bytes and must not leak"
        );
        assert!(tailer.cursor(&path).unwrap().partial.is_empty());
    }

    #[test]
    fn read_failure_leaves_the_cursor_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "log");
        let mut tailer = DeltaTailer::new();

        append(&path, "line\npart");
        assert_eq!(tailer.read_delta(&path).unwrap().len(), 1);
        let before = tailer.cursor(&path).cloned().unwrap();

        fs::remove_file(&path).unwrap();
        let err = tailer.read_delta(&path).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(tailer.cursor(&path).cloned().unwrap(), before);
    }

    #[test]
    fn missing_file_errors_then_recovers_once_created() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "late.jsonl");
        let mut tailer = DeltaTailer::new();

        assert!(tailer.read_delta(&path).is_err());

        append(&path, "{\"ready\":true}\n");
        assert_eq!(tailer.read_delta(&path).unwrap(), vec!["{\"ready\":true}"]);
    }

    #[test]
    fn blank_lines_are_filtered() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "log");
        let mut tailer = DeltaTailer::new();

        append(&path, "a\n\n\nb\n");
        assert_eq!(tailer.read_delta(&path).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn seek_to_end_skips_backlog() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "log");
        let mut tailer = DeltaTailer::new();

        append(&path, "old-1\nold-2\n");
        tailer.seek_to_end(&path).unwrap();
        assert!(tailer.read_delta(&path).unwrap().is_empty());

        append(&path, "new\n");
        assert_eq!(tailer.read_delta(&path).unwrap(), vec!["new"]);
    }

    #[test]
    fn retain_paths_prunes_stale_cursors() {
        let dir = TempDir::new().unwrap();
        let keep = file_in(&dir, "keep");
        let drop = file_in(&dir, "drop");
        let mut tailer = DeltaTailer::new();

        append(&keep, "a\n");
        append(&drop, "b\n");
        tailer.read_delta(&keep).unwrap();
        tailer.read_delta(&drop).unwrap();

        tailer.retain_paths(|path| path == keep.as_path());
        assert!(tailer.cursor(&keep).is_some());
        assert!(tailer.cursor(&drop).is_none());
    }

    #[test]
    fn tail_lines_returns_last_n_without_touching_cursors() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "log");
        let mut tailer = DeltaTailer::new();

        for i in 0..10 {
            append(&path, &format!("line-{i}\n"));
        }
        assert_eq!(read_tail_lines(&path, 3).unwrap(), vec!["line-7", "line-8", "line-9"]);
        assert!(tailer.cursor(&path).is_none());

        // A fresh delta read still sees everything.
        assert_eq!(tailer.read_delta(&path).unwrap().len(), 10);
    }
}
