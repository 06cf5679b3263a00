//! Unexported symbols stripped from cached images.
//!
//! The cache builder moves every image's local nlist records into one shared
//! table, either in the main file or in the `.symbols` file. The table has a
//! per-image entry giving the range of nlist records that belong to it.

use tracing::debug;

use super::cache::SharedCache;
use super::structs::*;
use crate::error::{Error, Result};
use crate::macho::{Architecture, Nlist32, Nlist64, NlistEntry};
use crate::util::ByteView;

const TABLE_NAME: &str = "local symbols";

/// A local symbol recovered from the cache's symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSymbol {
    /// Symbol name
    pub name: String,
    /// Unslid address
    pub address: u64,
    /// nlist type byte
    pub n_type: u8,
    /// Section number
    pub n_sect: u8,
}

/// The located local symbols table.
struct LocalSymbolsTable<'a> {
    data: ByteView<'a>,
    info: DyldCacheLocalSymbolsInfo,
    wide_entries: bool,
    wide_nlist: bool,
}

impl<'a> LocalSymbolsTable<'a> {
    fn symbols_for(&self, index: usize) -> Result<Vec<LocalSymbol>> {
        if index >= self.info.entries_count as usize {
            return Ok(Vec::new());
        }

        let entries = self.info.entries_offset as usize;
        let (start, count) = if self.wide_entries {
            let entry: DyldCacheLocalSymbolsEntry64 = self
                .data
                .read_at(entries + index * std::mem::size_of::<DyldCacheLocalSymbolsEntry64>())?;
            (entry.nlist_start_index, entry.nlist_count)
        } else {
            let entry: DyldCacheLocalSymbolsEntry = self
                .data
                .read_at(entries + index * std::mem::size_of::<DyldCacheLocalSymbolsEntry>())?;
            (entry.nlist_start_index, entry.nlist_count)
        };

        let end = start as u64 + count as u64;
        if end > self.info.nlist_count as u64 {
            return Err(Error::partial(
                TABLE_NAME,
                format!(
                    "entry {} covers nlist {}..{} of {}",
                    index, start, end, self.info.nlist_count
                ),
            ));
        }

        let strings = self
            .data
            .subview(self.info.strings_offset as usize, self.info.strings_size as usize)?;
        let entry_size = if self.wide_nlist {
            Nlist64::SIZE
        } else {
            Nlist32::SIZE
        };

        // The declared counts are untrusted until the records are known to exist
        let first = self.info.nlist_offset as u64 + start as u64 * entry_size as u64;
        let nlists = self
            .data
            .bytes_at_u64(first, count as u64 * entry_size as u64)
            .map(ByteView::new)
            .map_err(|_| {
                Error::partial(
                    TABLE_NAME,
                    format!(
                        "entry {} nlist {}..{} lies outside {} bytes of table data",
                        index,
                        start,
                        end,
                        self.data.len()
                    ),
                )
            })?;

        let mut symbols = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let at = i * entry_size;
            let nlist: NlistEntry = if self.wide_nlist {
                nlists.read_at::<Nlist64>(at)?.into()
            } else {
                nlists.read_at::<Nlist32>(at)?.into()
            };
            symbols.push(LocalSymbol {
                name: strings.cstr_at(nlist.n_strx as usize)?.into_owned(),
                address: nlist.n_value,
                n_type: nlist.n_type,
                n_sect: nlist.n_sect,
            });
        }
        Ok(symbols)
    }
}

impl SharedCache {
    /// Returns the local symbols recorded for an image.
    ///
    /// Caches without a local symbols table yield an empty list. A table that
    /// cannot be decoded is reported as a partial extraction.
    pub fn local_symbols(&self, path: &str) -> Result<Vec<LocalSymbol>> {
        let image = self.image(path).ok_or_else(|| Error::ImageNotFound {
            name: path.to_string(),
        })?;

        let table = match self.local_symbols_table() {
            Ok(Some(table)) => table,
            Ok(None) => {
                debug!("cache has no local symbols table");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into_partial(TABLE_NAME)),
        };

        table
            .symbols_for(image.index)
            .map_err(|e| e.into_partial(TABLE_NAME))
    }

    fn local_symbols_table(&self) -> Result<Option<LocalSymbolsTable<'_>>> {
        let main = &self.parts()[0];
        let part = match self.symbols_part() {
            Some(symbols) if symbols.header().has_local_symbols() => symbols,
            _ if main.header().has_local_symbols() => main,
            _ => return Ok(None),
        };

        let header = part.header();
        let data = ByteView::new(part.bytes())
            .bytes_at_u64(header.local_symbols_offset, header.local_symbols_size)
            .map(ByteView::new)?;
        let info: DyldCacheLocalSymbolsInfo = data.read_at(0)?;

        let wide_nlist = Architecture::by_name(self.architecture())
            .map(Architecture::is_64_bit)
            .unwrap_or(true);

        Ok(Some(LocalSymbolsTable {
            data,
            info,
            wide_entries: main.header().has_symbol_file(),
            wide_nlist,
        }))
    }
}
