//! Dyld shared cache inspection.
//!
//! The cache is used on iOS and macOS to prelink system frameworks into a
//! few large files. [`SharedCache`] maps those files, indexes the images they
//! contain and hands out validated [`MachImage`](crate::macho::MachImage)
//! views of each one.
//!
//! # Cache Structure
//!
//! A dyld shared cache consists of:
//! - A header with metadata about the cache
//! - Mappings that describe how regions of the cache map to virtual memory
//! - Image information for each dylib in the cache
//! - Local symbols (optionally in a separate `.symbols` file)
//!
//! # Sub-caches
//!
//! Starting with iOS 15 / macOS 12, caches can be split into multiple files:
//! - Main cache: `dyld_shared_cache_arm64e`
//! - Sub-caches: `dyld_shared_cache_arm64e.1`, `.2`, or `.01`, `.02`, etc.
//! - Symbols: `dyld_shared_cache_arm64e.symbols`

mod cache;
mod local_symbols;
mod structs;

pub use cache::*;
pub use local_symbols::*;
pub use structs::*;
