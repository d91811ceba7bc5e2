//! Dataset readers.
//!
//! Vector files reach the index through the [`VectorReader`] trait; the
//! concrete TEXMEX readers (fvecs / ivecs / bvecs) live in
//! [`texmex`](self::texmex). A [`ReaderRegistry`] maps a format key
//! (normally the file extension) to a constructor, so callers can register
//! additional formats without touching the core. The registry is a plain
//! owned value; there is no global reader state.

mod texmex;

pub use texmex::{BvecsReader, FvecsReader, IvecsReader};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::matrix::Matrix;

/// Reads one vector dataset file.
pub trait VectorReader {
    /// Probe the file and return (dimension, record count).
    fn open(&mut self) -> Result<(usize, usize)>;

    /// Read every record into a (n x dim) matrix.
    fn read_all(&mut self) -> Result<Matrix>;
}

/// Builds a reader for a given file path.
pub type ReaderConstructor = fn(PathBuf) -> Box<dyn VectorReader>;

/// Maps format keys (file extensions) to reader constructors.
pub struct ReaderRegistry {
    constructors: HashMap<String, ReaderConstructor>,
}

impl ReaderRegistry {
    /// An empty registry with no formats.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A registry with the TEXMEX formats registered: `fvecs`, `ivecs`
    /// and `bvecs`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("fvecs", |path| Box::new(FvecsReader::new(path)));
        registry.register("ivecs", |path| Box::new(IvecsReader::new(path)));
        registry.register("bvecs", |path| Box::new(BvecsReader::new(path)));
        registry
    }

    /// Associate `format` with a constructor, replacing any previous one.
    pub fn register(&mut self, format: &str, constructor: ReaderConstructor) {
        self.constructors.insert(format.to_string(), constructor);
    }

    /// Build a reader for `path`, picking the format from its extension.
    pub fn reader(&self, path: &Path) -> Result<Box<dyn VectorReader>> {
        let format = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.reader_with_format(path, &format)
    }

    /// Build a reader for `path` with an explicit format key.
    pub fn reader_with_format(&self, path: &Path, format: &str) -> Result<Box<dyn VectorReader>> {
        match self.constructors.get(format) {
            Some(constructor) => Ok(constructor(path.to_path_buf())),
            None => Err(IndexError::invalid_argument(format!(
                "no reader registered for format {format:?} ({})",
                path.display()
            ))),
        }
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
