//! Export trie, bind opcode and chained import decoding.
//!
//! The export trie is a prefix tree whose nodes hold:
//! - terminal information (flags, address, optional re-export or resolver)
//! - child edges (label + ULEB128 offset of the child node)
//!
//! Every decoder here reads untrusted LINKEDIT bytes. Reads are bounds-checked
//! and walks are bounded by the input size, so malformed data produces an
//! error rather than a panic or an endless loop.

use std::borrow::Cow;
use std::collections::HashSet;

use super::constants::*;
use super::structs::DyldChainedFixupsHeader;
use crate::error::{Error, Result};
use crate::util::ByteView;

// =============================================================================
// Export Flags
// =============================================================================

/// Export symbol kind mask.
pub const EXPORT_SYMBOL_FLAGS_KIND_MASK: u64 = 0x03;

/// Regular export.
pub const EXPORT_SYMBOL_FLAGS_KIND_REGULAR: u64 = 0x00;

/// Thread-local variable.
pub const EXPORT_SYMBOL_FLAGS_KIND_THREAD_LOCAL: u64 = 0x01;

/// Absolute symbol (not relative to any section).
pub const EXPORT_SYMBOL_FLAGS_KIND_ABSOLUTE: u64 = 0x02;

/// Weak definition.
pub const EXPORT_SYMBOL_FLAGS_WEAK_DEFINITION: u64 = 0x04;

/// Re-export from another dylib.
pub const EXPORT_SYMBOL_FLAGS_REEXPORT: u64 = 0x08;

/// Stub and resolver.
pub const EXPORT_SYMBOL_FLAGS_STUB_AND_RESOLVER: u64 = 0x10;

// =============================================================================
// Export Info
// =============================================================================

/// Information about an exported symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportInfo {
    /// Symbol name
    pub name: String,
    /// Export flags
    pub flags: u64,
    /// Symbol address (relative to image base)
    pub address: u64,
    /// For re-exports: ordinal of the source dylib
    pub reexport_ordinal: Option<u32>,
    /// For re-exports: imported symbol name (if different)
    pub reexport_name: Option<String>,
    /// For stub+resolver: resolver function address
    pub resolver_address: Option<u64>,
}

impl ExportInfo {
    /// Returns true if this is a re-export.
    #[inline]
    pub fn is_reexport(&self) -> bool {
        (self.flags & EXPORT_SYMBOL_FLAGS_REEXPORT) != 0
    }

    /// Returns true if this is a weak definition.
    #[inline]
    pub fn is_weak(&self) -> bool {
        (self.flags & EXPORT_SYMBOL_FLAGS_WEAK_DEFINITION) != 0
    }

    /// Returns true if this is a stub with resolver.
    #[inline]
    pub fn is_stub_and_resolver(&self) -> bool {
        (self.flags & EXPORT_SYMBOL_FLAGS_STUB_AND_RESOLVER) != 0
    }

    /// Returns the symbol kind.
    #[inline]
    pub fn kind(&self) -> u64 {
        self.flags & EXPORT_SYMBOL_FLAGS_KIND_MASK
    }
}

// =============================================================================
// Export Trie Parser
// =============================================================================

/// One decoded trie node: where its terminal info lives and its edges.
struct TrieNode<'a> {
    terminal: &'a [u8],
    edges: Vec<(&'a [u8], usize)>,
}

/// Parser for export tries.
///
/// The walk keeps an explicit stack and refuses to visit a node twice, so a
/// cyclic or self-referencing trie ends in [`Error::InvalidExportTrie`].
pub struct ExportTrieParser<'a> {
    data: &'a [u8],
}

impl<'a> ExportTrieParser<'a> {
    /// Creates a new parser for the given export trie data.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Parses all exports from the trie.
    pub fn parse_all(&self) -> Result<Vec<ExportInfo>> {
        let mut exports = Vec::new();
        self.for_each_export(|export| exports.push(export))?;
        Ok(exports)
    }

    /// Visits exports in trie order.
    ///
    /// Exports reached before a decoding error have already been delivered
    /// when the error is returned.
    pub fn for_each_export<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(ExportInfo),
    {
        if self.data.is_empty() {
            return Ok(());
        }

        let mut visited = HashSet::new();
        let mut stack: Vec<(usize, Vec<u8>)> = vec![(0, Vec::new())];

        while let Some((offset, prefix)) = stack.pop() {
            if !visited.insert(offset) {
                return Err(Error::InvalidExportTrie { offset });
            }

            let node = self.read_node(offset)?;
            if !node.terminal.is_empty() {
                let name = String::from_utf8_lossy(&prefix).into_owned();
                f(parse_terminal_info(node.terminal, name, offset)?);
            }

            // Reverse so the first edge is popped first.
            for (label, child) in node.edges.into_iter().rev() {
                let mut child_prefix = Vec::with_capacity(prefix.len() + label.len());
                child_prefix.extend_from_slice(&prefix);
                child_prefix.extend_from_slice(label);
                stack.push((child, child_prefix));
            }
        }

        Ok(())
    }

    /// Looks up a single symbol by name.
    pub fn lookup(&self, name: &str) -> Result<Option<ExportInfo>> {
        if self.data.is_empty() {
            return Ok(None);
        }

        let wanted = name.as_bytes();
        let mut visited = HashSet::new();
        let mut offset = 0usize;
        let mut matched = 0usize;

        loop {
            if !visited.insert(offset) {
                return Err(Error::InvalidExportTrie { offset });
            }
            let node = self.read_node(offset)?;

            if matched == wanted.len() {
                if node.terminal.is_empty() {
                    return Ok(None);
                }
                return parse_terminal_info(node.terminal, name.to_string(), offset).map(Some);
            }

            let remaining = &wanted[matched..];
            match node
                .edges
                .iter()
                .find(|(label, _)| !label.is_empty() && remaining.starts_with(label))
            {
                Some((label, child)) => {
                    matched += label.len();
                    offset = *child;
                }
                None => return Ok(None),
            }
        }
    }

    fn read_node(&self, offset: usize) -> Result<TrieNode<'a>> {
        let view = ByteView::new(self.data);
        let invalid = |_| Error::InvalidExportTrie { offset };

        let (terminal_size, n) = view.uleb128_at(offset)?;
        let terminal_start = offset + n;
        let terminal_size = usize::try_from(terminal_size).map_err(|_| Error::InvalidExportTrie { offset })?;
        let terminal = view.bytes_at(terminal_start, terminal_size).map_err(invalid)?;

        let mut cursor = terminal_start + terminal_size;
        let mut edges = Vec::new();
        if cursor >= view.len() {
            return Ok(TrieNode { terminal, edges });
        }

        let child_count = view.u8_at(cursor)?;
        cursor += 1;
        edges.reserve(child_count as usize);

        for _ in 0..child_count {
            let rest = view.tail(cursor).map_err(invalid)?;
            let end = memchr::memchr(0, rest).ok_or(Error::InvalidExportTrie { offset: cursor })?;
            let label = &rest[..end];
            cursor += end + 1;

            let (child, n) = view.uleb128_at(cursor)?;
            cursor += n;
            let child = usize::try_from(child)
                .ok()
                .filter(|&c| c < view.len())
                .ok_or(Error::InvalidExportTrie { offset: cursor })?;
            edges.push((label, child));
        }

        Ok(TrieNode { terminal, edges })
    }
}

/// Parses terminal export info.
fn parse_terminal_info(data: &[u8], name: String, node: usize) -> Result<ExportInfo> {
    let view = ByteView::new(data);
    let bad = |_| Error::InvalidExportTrie { offset: node };
    let (flags, mut cursor) = view.uleb128_at(0).map_err(bad)?;

    let mut export = ExportInfo {
        name,
        flags,
        address: 0,
        reexport_ordinal: None,
        reexport_name: None,
        resolver_address: None,
    };

    if (flags & EXPORT_SYMBOL_FLAGS_REEXPORT) != 0 {
        let (ordinal, n) = view.uleb128_at(cursor).map_err(bad)?;
        cursor += n;
        export.reexport_ordinal = Some(ordinal as u32);

        // Import name, empty when it matches the export name
        if cursor < data.len() {
            let import = view.cstr_at(cursor).map_err(bad)?;
            if !import.is_empty() {
                export.reexport_name = Some(import.into_owned());
            }
        }
    } else {
        let (addr, n) = view.uleb128_at(cursor).map_err(bad)?;
        cursor += n;
        export.address = addr;

        if (flags & EXPORT_SYMBOL_FLAGS_STUB_AND_RESOLVER) != 0 {
            let (resolver, _) = view.uleb128_at(cursor).map_err(bad)?;
            export.resolver_address = Some(resolver);
        }
    }

    Ok(export)
}

// =============================================================================
// Bind Opcodes
// =============================================================================

/// Bind opcodes used in the dyld bind info.
#[allow(missing_docs)] // Constants are self-documenting via names
pub mod bind_opcodes {
    /// Terminates a binding sequence.
    pub const BIND_OPCODE_DONE: u8 = 0x00;
    pub const BIND_OPCODE_SET_DYLIB_ORDINAL_IMM: u8 = 0x10;
    pub const BIND_OPCODE_SET_DYLIB_ORDINAL_ULEB: u8 = 0x20;
    pub const BIND_OPCODE_SET_DYLIB_SPECIAL_IMM: u8 = 0x30;
    pub const BIND_OPCODE_SET_SYMBOL_TRAILING_FLAGS_IMM: u8 = 0x40;
    pub const BIND_OPCODE_SET_TYPE_IMM: u8 = 0x50;
    pub const BIND_OPCODE_SET_ADDEND_SLEB: u8 = 0x60;
    pub const BIND_OPCODE_SET_SEGMENT_AND_OFFSET_ULEB: u8 = 0x70;
    pub const BIND_OPCODE_ADD_ADDR_ULEB: u8 = 0x80;
    pub const BIND_OPCODE_DO_BIND: u8 = 0x90;
    pub const BIND_OPCODE_DO_BIND_ADD_ADDR_ULEB: u8 = 0xA0;
    pub const BIND_OPCODE_DO_BIND_ADD_ADDR_IMM_SCALED: u8 = 0xB0;
    pub const BIND_OPCODE_DO_BIND_ULEB_TIMES_SKIPPING_ULEB: u8 = 0xC0;
    pub const BIND_OPCODE_THREADED: u8 = 0xD0;

    pub const BIND_SUBOPCODE_THREADED_SET_BIND_ORDINAL_TABLE_SIZE_ULEB: u8 = 0x00;
    pub const BIND_SUBOPCODE_THREADED_APPLY: u8 = 0x01;

    pub const BIND_SYMBOL_FLAGS_WEAK_IMPORT: u8 = 0x1;
    pub const BIND_SYMBOL_FLAGS_NON_WEAK_DEFINITION: u8 = 0x8;

    pub const BIND_IMMEDIATE_MASK: u8 = 0x0F;
    pub const BIND_OPCODE_MASK: u8 = 0xF0;
}

/// Which of the three LC_DYLD_INFO bind streams is being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStream {
    /// Non-lazy binds
    Regular,
    /// Weak definition coalescing
    Weak,
    /// Lazy binds; BIND_OPCODE_DONE separates entries instead of ending
    /// the stream
    Lazy,
}

impl BindStream {
    /// Table name used in partial-extraction warnings.
    pub fn table_name(&self) -> &'static str {
        match self {
            BindStream::Regular => "bind opcodes",
            BindStream::Weak => "weak bind opcodes",
            BindStream::Lazy => "lazy bind opcodes",
        }
    }
}

/// A symbol bound by a bind opcode stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSymbol<'a> {
    /// Symbol name
    pub name: Cow<'a, str>,
    /// Library ordinal; special ordinals are negative
    pub ordinal: i64,
    /// BIND_SYMBOL_FLAGS_WEAK_IMPORT was set
    pub weak_import: bool,
}

/// Visits the symbol of each bind in a stream.
///
/// A `DO_BIND_ULEB_TIMES_SKIPPING_ULEB` run is reported once, not once per
/// repetition.
pub fn for_each_bind<'a, F>(data: &'a [u8], stream: BindStream, mut f: F) -> Result<()>
where
    F: FnMut(BoundSymbol<'a>),
{
    use bind_opcodes::*;

    let view = ByteView::new(data);
    let mut cursor = 0usize;
    let mut ordinal: i64 = 0;
    let mut symbol: Option<(Cow<'a, str>, bool)> = None;

    let mut emit = |symbol: &Option<(Cow<'a, str>, bool)>, ordinal: i64, at: usize| -> Result<()> {
        match symbol {
            Some((name, weak)) => {
                f(BoundSymbol {
                    name: name.clone(),
                    ordinal,
                    weak_import: *weak,
                });
                Ok(())
            }
            None => Err(Error::partial(
                stream.table_name(),
                format!("bind at {at:#x} before any symbol was set"),
            )),
        }
    };

    while cursor < data.len() {
        let at = cursor;
        let byte = view.u8_at(cursor)?;
        let opcode = byte & BIND_OPCODE_MASK;
        let immediate = byte & BIND_IMMEDIATE_MASK;
        cursor += 1;

        match opcode {
            BIND_OPCODE_DONE => {
                if stream != BindStream::Lazy {
                    break;
                }
            }

            BIND_OPCODE_SET_DYLIB_ORDINAL_IMM => {
                ordinal = immediate as i64;
            }

            BIND_OPCODE_SET_DYLIB_ORDINAL_ULEB => {
                let (val, n) = view.uleb128_at(cursor)?;
                cursor += n;
                ordinal = val as i64;
            }

            BIND_OPCODE_SET_DYLIB_SPECIAL_IMM => {
                ordinal = if immediate == 0 {
                    0
                } else {
                    (BIND_OPCODE_MASK | immediate) as i8 as i64
                };
            }

            BIND_OPCODE_SET_SYMBOL_TRAILING_FLAGS_IMM => {
                let rest = view.tail(cursor)?;
                let end = memchr::memchr(0, rest).ok_or_else(|| {
                    Error::partial(
                        stream.table_name(),
                        format!("unterminated symbol name at {cursor:#x}"),
                    )
                })?;
                let name = String::from_utf8_lossy(&rest[..end]);
                cursor += end + 1;
                symbol = Some((name, immediate & BIND_SYMBOL_FLAGS_WEAK_IMPORT != 0));
            }

            BIND_OPCODE_SET_TYPE_IMM => {}

            BIND_OPCODE_SET_ADDEND_SLEB => {
                let (_, n) = view.sleb128_at(cursor)?;
                cursor += n;
            }

            BIND_OPCODE_SET_SEGMENT_AND_OFFSET_ULEB | BIND_OPCODE_ADD_ADDR_ULEB => {
                let (_, n) = view.uleb128_at(cursor)?;
                cursor += n;
            }

            BIND_OPCODE_DO_BIND | BIND_OPCODE_DO_BIND_ADD_ADDR_IMM_SCALED => {
                emit(&symbol, ordinal, at)?;
            }

            BIND_OPCODE_DO_BIND_ADD_ADDR_ULEB => {
                emit(&symbol, ordinal, at)?;
                let (_, n) = view.uleb128_at(cursor)?;
                cursor += n;
            }

            BIND_OPCODE_DO_BIND_ULEB_TIMES_SKIPPING_ULEB => {
                let (_, n) = view.uleb128_at(cursor)?;
                cursor += n;
                let (_, n) = view.uleb128_at(cursor)?;
                cursor += n;
                emit(&symbol, ordinal, at)?;
            }

            BIND_OPCODE_THREADED => match immediate {
                BIND_SUBOPCODE_THREADED_SET_BIND_ORDINAL_TABLE_SIZE_ULEB => {
                    let (_, n) = view.uleb128_at(cursor)?;
                    cursor += n;
                }
                BIND_SUBOPCODE_THREADED_APPLY => {}
                other => {
                    return Err(Error::partial(
                        stream.table_name(),
                        format!("unknown threaded sub-opcode {other:#x} at {at:#x}"),
                    ))
                }
            },

            other => {
                return Err(Error::partial(
                    stream.table_name(),
                    format!("unknown opcode {other:#x} at {at:#x}"),
                ))
            }
        }
    }

    Ok(())
}

// =============================================================================
// Chained Imports
// =============================================================================

/// An entry of the LC_DYLD_CHAINED_FIXUPS imports table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainedImport<'a> {
    /// Symbol name
    pub name: Cow<'a, str>,
    /// Library ordinal, sign-extended for special ordinals
    pub library_ordinal: i32,
    /// Weak import
    pub weak: bool,
    /// Addend (zero for DYLD_CHAINED_IMPORT)
    pub addend: i64,
}

const CHAINED_TABLE: &str = "chained fixups imports";

/// Visits the imports of an LC_DYLD_CHAINED_FIXUPS payload in table order.
pub fn for_each_chained_import<'a, F>(data: &'a [u8], mut f: F) -> Result<()>
where
    F: FnMut(ChainedImport<'a>),
{
    let view = ByteView::new(data);
    let header: DyldChainedFixupsHeader = view.read_at(0)?;

    if header.symbols_format != DYLD_CHAINED_SYMBOL_UNCOMPRESSED {
        return Err(Error::partial(
            CHAINED_TABLE,
            format!("unsupported symbols_format {}", header.symbols_format),
        ));
    }

    let entry_size = match header.imports_format {
        DYLD_CHAINED_IMPORT => 4,
        DYLD_CHAINED_IMPORT_ADDEND => 8,
        DYLD_CHAINED_IMPORT_ADDEND64 => 16,
        other => {
            return Err(Error::partial(
                CHAINED_TABLE,
                format!("unsupported imports_format {other}"),
            ))
        }
    };

    let table_len = (header.imports_count as usize)
        .checked_mul(entry_size)
        .ok_or_else(|| Error::partial(CHAINED_TABLE, "imports_count overflows"))?;
    let table = view.subview(header.imports_offset as usize, table_len)?;
    let symbols = view.tail(header.symbols_offset as usize)?;
    let symbols = ByteView::new(symbols);

    for i in 0..header.imports_count as usize {
        let at = i * entry_size;
        let (library_ordinal, weak, name_offset, addend) = match header.imports_format {
            DYLD_CHAINED_IMPORT | DYLD_CHAINED_IMPORT_ADDEND => {
                let raw = table.u32_le_at(at)?;
                let addend = if header.imports_format == DYLD_CHAINED_IMPORT_ADDEND {
                    table.i32_le_at(at + 4)? as i64
                } else {
                    0
                };
                (
                    sign_extend_ordinal8(raw & 0xFF),
                    (raw >> 8) & 1 != 0,
                    (raw >> 9) as usize,
                    addend,
                )
            }
            _ => {
                let raw = table.u64_le_at(at)?;
                let addend = table.u64_le_at(at + 8)? as i64;
                (
                    sign_extend_ordinal16((raw & 0xFFFF) as u32),
                    (raw >> 16) & 1 != 0,
                    (raw >> 32) as usize,
                    addend,
                )
            }
        };

        f(ChainedImport {
            name: symbols.cstr_at(name_offset)?,
            library_ordinal,
            weak,
            addend,
        });
    }

    Ok(())
}

/// 8-bit ordinals above 0xF0 are the negative special ordinals.
fn sign_extend_ordinal8(raw: u32) -> i32 {
    if raw > 0xF0 {
        raw as u8 as i8 as i32
    } else {
        raw as i32
    }
}

fn sign_extend_ordinal16(raw: u32) -> i32 {
    if raw > 0xFFF0 {
        raw as u16 as i16 as i32
    } else {
        raw as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{chained_fixups, write_uleb128, TrieBuilder};

    #[test]
    fn test_parse_all() {
        let trie = TrieBuilder::new()
            .export("_main", 0x1000, 0)
            .export("_malloc_wrapper", 0x2000, EXPORT_SYMBOL_FLAGS_WEAK_DEFINITION)
            .export("_free_wrapper", 0x3000, 0)
            .build();
        let exports = ExportTrieParser::new(&trie).parse_all().unwrap();
        let names: Vec<_> = exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["_main", "_malloc_wrapper", "_free_wrapper"]);
        assert_eq!(exports[0].address, 0x1000);
        assert!(exports[1].is_weak());
        assert_eq!(exports[1].kind(), EXPORT_SYMBOL_FLAGS_KIND_REGULAR);
    }

    #[test]
    fn test_lookup() {
        let trie = TrieBuilder::new()
            .export("_foo", 0x10, 0)
            .export("_bar", 0x20, 0)
            .build();
        let parser = ExportTrieParser::new(&trie);
        assert_eq!(parser.lookup("_bar").unwrap().unwrap().address, 0x20);
        assert!(parser.lookup("_baz").unwrap().is_none());
        assert!(parser.lookup("_").unwrap().is_none());
        assert!(ExportTrieParser::new(&[]).lookup("_foo").unwrap().is_none());
    }

    #[test]
    fn test_reexport_and_resolver() {
        // Root: no terminal, two children
        let mut trie = vec![0x00, 0x02];
        trie.extend_from_slice(b"_a\0");
        let a_child = trie.len();
        trie.push(0); // patched below
        trie.extend_from_slice(b"_b\0");
        let b_child = trie.len();
        trie.push(0);

        // _a: re-export of ordinal 2 as "_orig"
        let a_node = trie.len();
        let mut terminal = Vec::new();
        write_uleb128(EXPORT_SYMBOL_FLAGS_REEXPORT, &mut terminal);
        write_uleb128(2, &mut terminal);
        terminal.extend_from_slice(b"_orig\0");
        trie.push(terminal.len() as u8);
        trie.extend_from_slice(&terminal);
        trie.push(0);

        // _b: stub with resolver
        let b_node = trie.len();
        let mut terminal = Vec::new();
        write_uleb128(EXPORT_SYMBOL_FLAGS_STUB_AND_RESOLVER, &mut terminal);
        write_uleb128(0x40, &mut terminal);
        write_uleb128(0x80, &mut terminal);
        trie.push(terminal.len() as u8);
        trie.extend_from_slice(&terminal);
        trie.push(0);

        trie[a_child] = a_node as u8;
        trie[b_child] = b_node as u8;

        let exports = ExportTrieParser::new(&trie).parse_all().unwrap();
        assert_eq!(exports.len(), 2);
        assert!(exports[0].is_reexport());
        assert_eq!(exports[0].reexport_ordinal, Some(2));
        assert_eq!(exports[0].reexport_name.as_deref(), Some("_orig"));
        assert!(exports[1].is_stub_and_resolver());
        assert_eq!(exports[1].resolver_address, Some(0x80));
    }

    #[test]
    fn test_cyclic_trie_terminates() {
        // Root with one child edge pointing back at the root
        let trie = [0x00, 0x01, b'_', b'a', 0x00, 0x00];
        let mut seen = 0;
        let result = ExportTrieParser::new(&trie).for_each_export(|_| seen += 1);
        assert!(matches!(result, Err(Error::InvalidExportTrie { offset: 0 })));
        assert_eq!(seen, 0);
        assert!(ExportTrieParser::new(&trie).lookup("_a_a_a").is_err());
    }

    #[test]
    fn test_truncated_trie_keeps_earlier_exports() {
        let mut trie = TrieBuilder::new()
            .export("_first", 0x10, 0)
            .export("_second", 0x20, 0)
            .build();
        // Give the second node a terminal that runs past the end of the trie
        let pos = trie
            .windows(8)
            .position(|w| w == b"_second\0")
            .unwrap();
        let child = trie[pos + 8] as usize;
        trie[child] = 0x7F;
        let mut names = Vec::new();
        let result = ExportTrieParser::new(&trie).for_each_export(|e| names.push(e.name));
        assert!(result.is_err());
        assert_eq!(names, ["_first"]);
    }

    #[test]
    fn test_bind_stream() {
        use bind_opcodes::*;
        let mut data = vec![BIND_OPCODE_SET_DYLIB_ORDINAL_IMM | 1];
        data.push(BIND_OPCODE_SET_SYMBOL_TRAILING_FLAGS_IMM);
        data.extend_from_slice(b"_printf\0");
        data.push(BIND_OPCODE_SET_SEGMENT_AND_OFFSET_ULEB | 2);
        data.push(0x10);
        data.push(BIND_OPCODE_DO_BIND_ULEB_TIMES_SKIPPING_ULEB);
        data.extend_from_slice(&[0x05, 0x08]);
        data.push(BIND_OPCODE_SET_DYLIB_SPECIAL_IMM | 0x0E);
        data.push(BIND_OPCODE_SET_SYMBOL_TRAILING_FLAGS_IMM | BIND_SYMBOL_FLAGS_WEAK_IMPORT);
        data.extend_from_slice(b"_optional\0");
        data.push(BIND_OPCODE_DO_BIND);
        data.push(BIND_OPCODE_DONE);
        data.push(BIND_OPCODE_SET_SYMBOL_TRAILING_FLAGS_IMM);
        data.extend_from_slice(b"_after_done\0");
        data.push(BIND_OPCODE_DO_BIND);

        let mut binds = Vec::new();
        for_each_bind(&data, BindStream::Regular, |b| binds.push(b)).unwrap();
        assert_eq!(binds.len(), 2);
        assert_eq!(binds[0].name, "_printf");
        assert_eq!(binds[0].ordinal, 1);
        assert!(!binds[0].weak_import);
        assert_eq!(binds[1].name, "_optional");
        assert_eq!(binds[1].ordinal, -2);
        assert!(binds[1].weak_import);

        // Lazy streams continue past DONE
        let mut lazy = Vec::new();
        for_each_bind(&data, BindStream::Lazy, |b| lazy.push(b.name.into_owned())).unwrap();
        assert_eq!(lazy, ["_printf", "_optional", "_after_done"]);
    }

    #[test]
    fn test_bind_stream_corruption() {
        use bind_opcodes::*;
        let mut data = vec![BIND_OPCODE_SET_SYMBOL_TRAILING_FLAGS_IMM];
        data.extend_from_slice(b"_ok\0");
        data.push(BIND_OPCODE_DO_BIND);
        data.push(0xF0);
        let mut names = Vec::new();
        let err = for_each_bind(&data, BindStream::Regular, |b| names.push(b.name)).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(names, ["_ok"]);

        // Truncated ULEB
        let data = [BIND_OPCODE_SET_DYLIB_ORDINAL_ULEB, 0x80];
        assert!(for_each_bind(&data, BindStream::Regular, |_| {}).is_err());
    }

    #[test]
    fn test_chained_imports_format1() {
        let data = chained_fixups(
            DYLD_CHAINED_IMPORT,
            &[("_objc_msgSend", 1, false), ("_weak_thing", 2, true), ("_flat", 0xFE, false)],
        );
        let mut imports = Vec::new();
        for_each_chained_import(&data, |i| imports.push(i)).unwrap();
        assert_eq!(imports.len(), 3);
        assert_eq!(imports[0].name, "_objc_msgSend");
        assert_eq!(imports[0].library_ordinal, 1);
        assert!(imports[1].weak);
        assert_eq!(imports[2].library_ordinal, -2);
    }

    #[test]
    fn test_chained_imports_addend64() {
        let data = chained_fixups(
            DYLD_CHAINED_IMPORT_ADDEND64,
            &[("_a", 3, false), ("_b", 0xFFFF, true)],
        );
        let mut imports = Vec::new();
        for_each_chained_import(&data, |i| imports.push(i)).unwrap();
        assert_eq!(imports[0].library_ordinal, 3);
        assert_eq!(imports[1].library_ordinal, -1);
        assert!(imports[1].weak);
    }

    #[test]
    fn test_chained_imports_compressed_symbols() {
        let mut data = chained_fixups(DYLD_CHAINED_IMPORT, &[("_a", 1, false)]);
        data[24..28].copy_from_slice(&1u32.to_le_bytes());
        let err = for_each_chained_import(&data, |_| {}).unwrap_err();
        assert!(err.is_recoverable());
    }
}
