//! Output sinks for matched raw CDX lines

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Destination for matched lines. Each call to `emit` is one record.
pub trait RecordSink {
    fn emit(&mut self, line: &str) -> io::Result<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        (**self).emit(line)
    }
}

/// In-memory sink, handy for embedding and tests
impl RecordSink for Vec<String> {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}

/// Append-only UTF-8 text file, one record per line.
///
/// Never truncated: the file accumulates across runs. Each record is written
/// straight to the file so nothing is lost when a later shard aborts the run.
pub struct AppendFileSink {
    file: File,
    path: PathBuf,
    appended: u64,
    buf: String,
}

impl std::fmt::Debug for AppendFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendFileSink")
            .field("path", &self.path)
            .field("appended", &self.appended)
            .finish_non_exhaustive()
    }
}

impl AppendFileSink {
    /// Open (creating if needed) `path` for appending
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            appended: 0,
            buf: String::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle
    pub fn appended(&self) -> u64 {
        self.appended
    }
}

impl RecordSink for AppendFileSink {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        // Single write per record so a line and its newline land together
        self.buf.clear();
        self.buf.push_str(line);
        self.buf.push('\n');
        self.file.write_all(self.buf.as_bytes())?;
        self.appended += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appends_with_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");

        let mut sink = AppendFileSink::open(&path).unwrap();
        sink.emit("a b {}").unwrap();
        sink.emit("c d {}").unwrap();

        assert_eq!(sink.appended(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a b {}\nc d {}\n");
    }

    #[test]
    fn reopening_never_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "earlier run\n").unwrap();

        let mut sink = AppendFileSink::open(&path).unwrap();
        sink.emit("this run").unwrap();
        drop(sink);

        let mut sink = AppendFileSink::open(&path).unwrap();
        sink.emit("next run").unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "earlier run\nthis run\nnext run\n"
        );
    }

    #[test]
    fn creates_missing_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/out.txt");
        let mut sink = AppendFileSink::open(&path).unwrap();
        sink.emit("x").unwrap();
        assert!(path.exists());
        assert_eq!(sink.path(), path);
    }

    #[test]
    fn open_fails_on_directory() {
        let dir = TempDir::new().unwrap();
        assert!(AppendFileSink::open(dir.path()).is_err());
    }

    #[test]
    fn vec_sink_collects_lines() {
        fn emit_one(mut sink: impl RecordSink) {
            sink.emit("one").unwrap();
        }

        let mut lines: Vec<String> = Vec::new();
        emit_one(&mut lines);
        lines.emit("two").unwrap();
        assert_eq!(lines, ["one", "two"]);
    }
}
