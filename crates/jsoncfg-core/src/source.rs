//! Document sources
//!
//! The loader never touches the filesystem directly. It asks a
//! [`DocumentSource`] for a readable, seekable stream and drops the stream as
//! soon as the document is decoded. [`FsSource`] is the default;
//! [`MemorySource`] serves documents from memory.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

/// An open document stream
pub trait SourceFile: Read + Seek {
    /// Display name used in error messages
    fn name(&self) -> &str;
}

/// Opens documents by path
pub trait DocumentSource: Send + Sync {
    /// Open the document at `path` (already canonical)
    fn open(&self, path: &Path) -> io::Result<Box<dyn SourceFile>>;
}

/// Local filesystem source
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

struct FsFile {
    file: File,
    name: String,
}

impl Read for FsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for FsFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl SourceFile for FsFile {
    fn name(&self) -> &str {
        &self.name
    }
}

impl DocumentSource for FsSource {
    fn open(&self, path: &Path) -> io::Result<Box<dyn SourceFile>> {
        let file = File::open(path)?;
        Ok(Box::new(FsFile {
            file,
            name: path.display().to_string(),
        }))
    }
}

/// In-memory source keyed by canonical path
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<PathBuf, String>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document; relative paths are taken against the current directory
    pub fn insert(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) {
        if let Ok(path) = canonical_path(path.as_ref()) {
            self.files.insert(path, contents.into());
        }
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }
}

struct MemoryFile {
    cursor: Cursor<Vec<u8>>,
    name: String,
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl SourceFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) fn memory_file(name: &str, contents: &str) -> Box<dyn SourceFile> {
    Box::new(MemoryFile {
        cursor: Cursor::new(contents.as_bytes().to_vec()),
        name: name.to_string(),
    })
}

impl DocumentSource for MemorySource {
    fn open(&self, path: &Path) -> io::Result<Box<dyn SourceFile>> {
        let contents = self.files.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such document: {}", path.display()),
            )
        })?;
        Ok(Box::new(MemoryFile {
            cursor: Cursor::new(contents.clone().into_bytes()),
            name: path.display().to_string(),
        }))
    }
}

/// Absolute, lexically normalized form of `path`
///
/// `.` and `..` components are folded without touching the filesystem, so the
/// result is usable as a cycle-detection key for sources that are not backed by
/// real files.
pub fn canonical_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

/// Byte offset and rendered excerpt for a 1-based line/column position
///
/// The excerpt is the offending line followed by a caret under the column.
pub fn highlight_position(contents: &str, line: usize, column: usize) -> (usize, String) {
    let mut offset = 0;
    let mut text = "";
    for (i, l) in contents.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            text = l.trim_end_matches(['\n', '\r']);
            break;
        }
        offset += l.len();
    }

    let col = column.saturating_sub(1).min(text.len());
    offset += col;

    // Keep tabs so the caret lines up with the source as displayed
    let pad: String = text
        .bytes()
        .take(col)
        .map(|b| if b == b'\t' { '\t' } else { ' ' })
        .collect();
    (offset, format!("{}\n{}^", text, pad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_canonical_path_folds_dots() {
        let path = canonical_path(Path::new("/etc/app/./conf/../main.json")).unwrap();
        assert_eq!(path, PathBuf::from("/etc/app/main.json"));
    }

    #[test]
    fn test_canonical_path_relative_is_absolute() {
        let path = canonical_path(Path::new("conf/main.json")).unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("conf/main.json"));
    }

    #[test]
    fn test_memory_source_open() {
        let source = MemorySource::new().with_file("/cfg/a.json", "{}");

        let mut file = source.open(Path::new("/cfg/a.json")).unwrap();
        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "{}");
        assert_eq!(file.name(), "/cfg/a.json");

        let err = source.open(Path::new("/cfg/b.json")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_fs_source_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(&path, "{\"a\": 1}").unwrap();

        let mut file = FsSource.open(&path).unwrap();
        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "{\"a\": 1}");
        file.rewind().unwrap();
        assert_eq!(file.stream_position().unwrap(), 0);
    }

    #[test]
    fn test_highlight_position() {
        let contents = "{\n  \"a\": 1\n  \"b\": 2\n}\n";
        let (offset, snippet) = highlight_position(contents, 3, 3);

        assert_eq!(offset, 13);
        assert_eq!(&contents[offset..offset + 3], "\"b\"");
        assert_eq!(snippet, "  \"b\": 2\n  ^");
    }

    #[test]
    fn test_highlight_position_past_end() {
        let (offset, snippet) = highlight_position("{\"a\":", 1, 6);
        assert_eq!(offset, 5);
        assert_eq!(snippet, "{\"a\":\n     ^");
    }
}
