//! Error types for container inspection.
//!
//! Failures that make the rest of a structure meaningless (bad magic, a
//! truncated load-command region, a fat header that overruns the file) abort
//! the current operation. Failures local to one sub-structure surface as the
//! non-fatal variants, see [`Error::is_recoverable`].

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for inspection operations.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to memory map file '{path}': {source}")]
    MemoryMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a regular file")]
    NotRegularFile { path: PathBuf },

    // ==================== Format Errors ====================
    #[error("not a recognized format: expected {expected}, found {found}")]
    NotRecognizedFormat {
        expected: &'static str,
        found: String,
    },

    #[error("unsupported Mach-O file type: {0:#x}")]
    UnsupportedFileType(u32),

    #[error("malformed fat container: {reason}")]
    MalformedContainer { reason: String },

    #[error("malformed load command {index} at offset {offset:#x}: {reason}")]
    MalformedLoadCommands {
        index: u32,
        offset: usize,
        reason: String,
    },

    #[error("range {offset:#x}+{len:#x} is outside a region of {size:#x} bytes")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    // ==================== Non-fatal Errors ====================
    #[error("unknown architecture (cputype {cputype:#x}, cpusubtype {cpusubtype:#x})")]
    UnknownArchitecture { cputype: i32, cpusubtype: i32 },

    #[error("partial {table} extraction: {reason}")]
    PartialSymbolExtraction { table: &'static str, reason: String },

    // ==================== Symbol Encoding Errors ====================
    #[error("invalid export trie at offset {offset:#x}")]
    InvalidExportTrie { offset: usize },

    #[error("invalid ULEB128 at offset {offset:#x}")]
    InvalidUleb128 { offset: usize },

    // ==================== Shared Cache Errors ====================
    #[error("subcache file not found: {path}")]
    SubcacheNotFound { path: PathBuf },

    #[error("subcache UUID mismatch for '{path}': expected {expected}, got {actual}")]
    SubcacheUuidMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("image not found: {name}")]
    ImageNotFound { name: String },

    #[error("address {addr:#x} not found in any cache mapping")]
    AddressNotFound { addr: u64 },
}

/// A specialized Result type for inspection operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true if this error degrades a result instead of aborting it.
    ///
    /// Recoverable errors are logged and returned next to a best-effort value.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnknownArchitecture { .. } | Error::PartialSymbolExtraction { .. }
        )
    }

    /// Returns true if this error came from the filesystem.
    #[inline]
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::FileOpen { .. }
                | Error::MemoryMap { .. }
                | Error::NotRegularFile { .. }
        )
    }

    /// Creates an out-of-bounds error.
    #[inline]
    pub fn out_of_bounds(offset: u64, len: u64, size: u64) -> Self {
        Error::OutOfBounds { offset, len, size }
    }

    /// Creates a malformed fat container error.
    #[inline]
    pub fn malformed_container(reason: impl Into<String>) -> Self {
        Error::MalformedContainer {
            reason: reason.into(),
        }
    }

    /// Creates a malformed load command error.
    #[inline]
    pub fn malformed_commands(index: u32, offset: usize, reason: impl Into<String>) -> Self {
        Error::MalformedLoadCommands {
            index,
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a partial symbol extraction warning.
    #[inline]
    pub fn partial(table: &'static str, reason: impl Into<String>) -> Self {
        Error::PartialSymbolExtraction {
            table,
            reason: reason.into(),
        }
    }

    /// Wraps a decoding failure as a partial extraction of `table`.
    pub fn into_partial(self, table: &'static str) -> Self {
        match self {
            Error::PartialSymbolExtraction { .. } => self,
            other => Error::partial(table, other.to_string()),
        }
    }
}
