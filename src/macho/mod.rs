//! Mach-O image inspection.
//!
//! [`MachImage`] validates a header and its load-command region once and
//! then answers queries against the borrowed bytes: segments, layout,
//! symbols, the embedded signature and string literals. Every query reads the
//! commands again; nothing is cached.

mod arch;
mod codesign;
mod commands;
mod constants;
mod header;
mod layout;
mod segment;
mod strings;
mod structs;
mod symbols;
pub mod trie;

pub use arch::*;
pub use codesign::*;
pub use commands::*;
pub use constants::*;
pub use header::*;
pub use layout::*;
pub use segment::*;
pub use structs::*;
pub use symbols::*;
pub use trie::{ExportInfo, ExportTrieParser};
