//! Imported and exported symbol extraction.
//!
//! Each direction reads exactly one source, picked by priority from the load
//! commands present. A corrupt source stops that table only: what was decoded
//! before the damage is returned together with a non-fatal warning.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, warn};

use super::commands::LoadCommandKind;
use super::constants::*;
use super::header::MachImage;
use super::structs::*;
use super::trie::{for_each_bind, for_each_chained_import, BindStream, ExportTrieParser};
use crate::error::{Error, Result};
use crate::util::ByteView;

/// Mangling prefixes used by the Swift compiler across language versions.
const SWIFT_PREFIXES: &[&str] = &[
    "_T0",
    "$S",
    "_$S",
    "$s",
    "_$s",
    "$e",
    "_$e",
    "@__swiftmacro_",
];

/// Direction of a symbol relative to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Referenced from another image
    Imported,
    /// Provided to other images
    Exported,
}

/// One imported or exported symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    /// Symbol name as stored (still mangled)
    pub name: String,
    /// Imported or exported
    pub kind: SymbolKind,
    /// Library ordinal for imports and re-exports
    pub library_ordinal: Option<i32>,
    /// Weak import or weak definition
    pub weak: bool,
}

impl SymbolRecord {
    /// Returns true if the name carries a Swift mangling prefix.
    pub fn is_swift(&self) -> bool {
        SWIFT_PREFIXES.iter().any(|p| self.name.starts_with(p))
    }
}

impl fmt::Display for SymbolRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.weak {
            f.write_str(" (weak)")?;
        }
        Ok(())
    }
}

/// Where a symbol list was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolSource {
    /// No symbol source is present
    None,
    /// LC_DYLD_EXPORTS_TRIE
    ExportsTrie,
    /// LC_DYLD_INFO export trie or bind opcodes
    DyldInfo,
    /// LC_DYLD_CHAINED_FIXUPS imports table
    ChainedFixups,
    /// LC_SYMTAB nlist records
    SymbolTable,
}

/// The result of one extraction call.
#[derive(Debug)]
pub struct SymbolList {
    /// De-duplicated symbols in first-seen order
    pub symbols: Vec<SymbolRecord>,
    /// The table they came from
    pub source: SymbolSource,
    /// Set when the table was damaged and the list is incomplete
    pub warning: Option<Error>,
}

impl SymbolList {
    fn empty() -> Self {
        Self {
            symbols: Vec::new(),
            source: SymbolSource::None,
            warning: None,
        }
    }

    /// Returns the number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if no symbols were found.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Returns true if the source table was damaged.
    pub fn is_partial(&self) -> bool {
        self.warning.is_some()
    }

    /// Iterates over symbol names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(|s| s.name.as_str())
    }

    /// Iterates over the symbols.
    pub fn iter(&self) -> std::slice::Iter<'_, SymbolRecord> {
        self.symbols.iter()
    }
}

impl<'s> IntoIterator for &'s SymbolList {
    type Item = &'s SymbolRecord;
    type IntoIter = std::slice::Iter<'s, SymbolRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}

/// Accumulates records, dropping names already seen.
struct Collector {
    kind: SymbolKind,
    source: SymbolSource,
    seen: HashSet<String>,
    symbols: Vec<SymbolRecord>,
    warning: Option<Error>,
}

impl Collector {
    fn new(kind: SymbolKind, source: SymbolSource) -> Self {
        debug!("reading {:?} symbols from {:?}", kind, source);
        Self {
            kind,
            source,
            seen: HashSet::new(),
            symbols: Vec::new(),
            warning: None,
        }
    }

    fn push(&mut self, name: &str, library_ordinal: Option<i32>, weak: bool) {
        if self.seen.insert(name.to_string()) {
            self.symbols.push(SymbolRecord {
                name: name.to_string(),
                kind: self.kind,
                library_ordinal,
                weak,
            });
        }
    }

    /// Records a table failure. Only the first one is kept.
    fn fail(&mut self, table: &'static str, err: Error) {
        let err = err.into_partial(table);
        warn!("{} (kept {} symbols)", err, self.symbols.len());
        if self.warning.is_none() {
            self.warning = Some(err);
        }
    }

    fn finish(self) -> SymbolList {
        SymbolList {
            symbols: self.symbols,
            source: self.source,
            warning: self.warning,
        }
    }
}

impl<'a> MachImage<'a> {
    /// Extracts the symbols this image imports.
    ///
    /// Sources, first present wins: chained fixups imports, LC_DYLD_INFO bind
    /// opcodes, undefined external nlist records.
    pub fn imported_symbols(&self) -> SymbolList {
        if let Some(cmd) = self.command(LoadCommandKind::DyldChainedFixups) {
            let mut out = Collector::new(SymbolKind::Imported, SymbolSource::ChainedFixups);
            let result = cmd
                .linkedit_data()
                .and_then(|lc| self.linkedit_bytes(lc.dataoff as u64, lc.datasize as u64))
                .and_then(|data| {
                    for_each_chained_import(data, |import| {
                        out.push(&import.name, Some(import.library_ordinal), import.weak)
                    })
                });
            if let Err(e) = result {
                out.fail("chained fixups imports", e);
            }
            return out.finish();
        }

        if let Some(info) = self.dyld_info() {
            let mut out = Collector::new(SymbolKind::Imported, SymbolSource::DyldInfo);
            let streams = [
                (info.bind_off, info.bind_size, BindStream::Regular),
                (info.weak_bind_off, info.weak_bind_size, BindStream::Weak),
                (info.lazy_bind_off, info.lazy_bind_size, BindStream::Lazy),
            ];
            for (off, size, stream) in streams {
                if size == 0 {
                    continue;
                }
                let result = self
                    .linkedit_bytes(off as u64, size as u64)
                    .and_then(|data| {
                        for_each_bind(data, stream, |bind| {
                            // Weak binds resolve by name across all images
                            let ordinal = match stream {
                                BindStream::Weak => None,
                                _ => Some(bind.ordinal as i32),
                            };
                            out.push(&bind.name, ordinal, bind.weak_import)
                        })
                    });
                if let Err(e) = result {
                    out.fail(stream.table_name(), e);
                }
            }
            return out.finish();
        }

        if self.command(LoadCommandKind::Symtab).is_some() {
            let mut out = Collector::new(SymbolKind::Imported, SymbolSource::SymbolTable);
            let result = self.for_each_nlist(
                |dysymtab| (dysymtab.iundefsym, dysymtab.nundefsym),
                |entry| entry.is_external() && entry.is_undefined() && !entry.is_debug(),
                |name, entry| {
                    out.push(
                        name,
                        Some(get_library_ordinal(entry.n_desc) as i32),
                        entry.is_weak_ref(),
                    )
                },
            );
            if let Err(e) = result {
                out.fail("symtab", e);
            }
            return out.finish();
        }

        SymbolList::empty()
    }

    /// Extracts the symbols this image exports.
    ///
    /// Sources, first present wins: LC_DYLD_EXPORTS_TRIE, the LC_DYLD_INFO
    /// export trie, defined external nlist records.
    pub fn exported_symbols(&self) -> SymbolList {
        if let Some(cmd) = self.command(LoadCommandKind::DyldExportsTrie) {
            let mut out = Collector::new(SymbolKind::Exported, SymbolSource::ExportsTrie);
            let result = cmd
                .linkedit_data()
                .and_then(|lc| self.linkedit_bytes(lc.dataoff as u64, lc.datasize as u64))
                .and_then(|data| Self::collect_trie(data, &mut out));
            if let Err(e) = result {
                out.fail("export trie", e);
            }
            return out.finish();
        }

        if let Some(info) = self.dyld_info().filter(|info| info.export_size > 0) {
            let mut out = Collector::new(SymbolKind::Exported, SymbolSource::DyldInfo);
            let result = self
                .linkedit_bytes(info.export_off as u64, info.export_size as u64)
                .and_then(|data| Self::collect_trie(data, &mut out));
            if let Err(e) = result {
                out.fail("export trie", e);
            }
            return out.finish();
        }

        if self.command(LoadCommandKind::Symtab).is_some() {
            let mut out = Collector::new(SymbolKind::Exported, SymbolSource::SymbolTable);
            let result = self.for_each_nlist(
                |dysymtab| (dysymtab.iextdefsym, dysymtab.nextdefsym),
                |entry| entry.is_external() && entry.is_defined() && !entry.is_debug(),
                |name, entry| out.push(name, None, entry.n_desc & N_WEAK_DEF != 0),
            );
            if let Err(e) = result {
                out.fail("symtab", e);
            }
            return out.finish();
        }

        SymbolList::empty()
    }

    /// Resolves a library ordinal to the path of the dependent dylib.
    ///
    /// Ordinals start at 1. Special ordinals (self, main executable, flat
    /// lookup) have no path.
    pub fn library_for_ordinal(&self, ordinal: i32) -> Option<&'a str> {
        let index = usize::try_from(ordinal).ok()?.checked_sub(1)?;
        self.dylibs().get(index).copied()
    }

    fn collect_trie(data: &[u8], out: &mut Collector) -> Result<()> {
        ExportTrieParser::new(data).for_each_export(|export| {
            out.push(
                &export.name,
                export.reexport_ordinal.map(|o| o as i32),
                export.is_weak(),
            )
        })
    }

    fn dyld_info(&self) -> Option<DyldInfoCommand> {
        self.find_command(|cmd| {
            matches!(
                cmd.kind,
                LoadCommandKind::DyldInfo | LoadCommandKind::DyldInfoOnly
            )
        })
        .and_then(|cmd| cmd.read::<DyldInfoCommand>().ok())
    }

    /// Walks nlist records, using the dysymtab range picked by `range` when
    /// LC_DYSYMTAB is present and `filter` otherwise.
    fn for_each_nlist<R, P, F>(&self, range: R, filter: P, mut f: F) -> Result<()>
    where
        R: Fn(&DysymtabCommand) -> (u32, u32),
        P: Fn(&NlistEntry) -> bool,
        F: FnMut(&str, &NlistEntry),
    {
        let symtab: SymtabCommand = self
            .command(LoadCommandKind::Symtab)
            .ok_or_else(|| Error::partial("symtab", "LC_SYMTAB disappeared"))?
            .read()?;
        let dysymtab = self
            .command(LoadCommandKind::Dysymtab)
            .and_then(|cmd| cmd.read::<DysymtabCommand>().ok());

        let entry_size = if self.is_64_bit() {
            Nlist64::SIZE
        } else {
            Nlist32::SIZE
        };
        let strings = ByteView::new(self.linkedit_bytes(symtab.stroff as u64, symtab.strsize as u64)?);
        let table = ByteView::new(self.linkedit_bytes(
            symtab.symoff as u64,
            symtab.nsyms as u64 * entry_size as u64,
        )?);

        let (start, count, filtered) = match &dysymtab {
            Some(dysymtab) => {
                let (start, count) = range(dysymtab);
                let end = start as u64 + count as u64;
                if end > symtab.nsyms as u64 {
                    return Err(Error::partial(
                        "symtab",
                        format!(
                            "dysymtab range {}..{} exceeds {} symbols",
                            start, end, symtab.nsyms
                        ),
                    ));
                }
                (start as usize, count as usize, false)
            }
            None => (0, symtab.nsyms as usize, true),
        };

        for i in start..start + count {
            let at = i * entry_size;
            let entry: NlistEntry = if self.is_64_bit() {
                table.read_at::<Nlist64>(at)?.into()
            } else {
                table.read_at::<Nlist32>(at)?.into()
            };
            if filtered && !filter(&entry) {
                continue;
            }
            let name = strings.cstr_at(entry.n_strx as usize)?;
            if name.is_empty() {
                continue;
            }
            f(&*name, &entry);
        }

        Ok(())
    }
}
