//! machscope - static inspection of Mach-O containers.
//!
//! This library reads Mach-O images, fat (universal) binaries and dyld shared
//! caches without executing them. It walks their load commands and reports
//! segment layout, imported and exported symbols, embedded entitlements and
//! string literals.
//!
//! # Features
//!
//! - Fast memory-mapped file I/O
//! - 32-bit and 64-bit images, fat32 and fat64 containers
//! - Symbols from chained fixups, bind opcodes, export tries and nlist tables
//! - Split caches (iOS 15+, macOS 12+) with `.symbols` files
//! - Bounds-checked parsing: corrupt tables degrade to partial results
//!
//! # Example
//!
//! ```no_run
//! use machscope::{Container, FileRegion, MachImage};
//!
//! fn main() -> machscope::Result<()> {
//!     let region = FileRegion::open("/usr/bin/true")?;
//!     match Container::parse(&region)? {
//!         Container::Image(image) => print_image(&image),
//!         Container::Universal(fat) => {
//!             for slice in fat.slices() {
//!                 let slice = slice?;
//!                 print_image(&MachImage::parse(fat.slice_bytes(&slice)?)?);
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//!
//! fn print_image(image: &MachImage<'_>) {
//!     println!("{}: {:?}", image.arch_name(), image.segment_layout());
//!     for symbol in &image.imported_symbols() {
//!         println!("  imports {}", symbol.name);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod container;
pub mod dyld;
pub mod error;
pub mod macho;
pub mod region;
pub mod universal;
pub mod util;

#[cfg(test)]
mod testutil;

// Re-export main types
pub use container::{open, Container, ContainerKind};
pub use dyld::{CacheImage, CacheOptions, LocalSymbol, MappingEntry, SharedCache};
pub use error::{Error, Result};
pub use macho::{
    MachImage, Segment, SegmentLayout, SymbolKind, SymbolList, SymbolRecord, SymbolSource,
    ValidationOptions,
};
pub use region::FileRegion;
pub use universal::{ArchitectureSlice, FatKind, UniversalBinary};
