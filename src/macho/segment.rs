//! Segments and sections.

use std::fmt;
use std::ops::Range;

use tracing::warn;

use super::commands::{LoadCommand, LoadCommandKind};
use super::constants::*;
use super::header::MachImage;
use super::structs::*;
use crate::error::{Error, Result};
use crate::util::ByteView;

/// A section inside a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a> {
    /// Section name
    pub sectname: &'a str,
    /// Owning segment name
    pub segname: &'a str,
    /// Virtual memory address
    pub addr: u64,
    /// Size in bytes
    pub size: u64,
    /// File offset
    pub offset: u32,
    /// Alignment (power of 2)
    pub align: u32,
    /// Type and attribute flags
    pub flags: u32,
    /// Reserved (for runtime use)
    pub reserved1: u32,
    /// Reserved (for runtime use)
    pub reserved2: u32,
}

impl<'a> Section<'a> {
    /// Returns the section type (low byte of the flags).
    #[inline]
    pub fn section_type(&self) -> u32 {
        self.flags & SECTION_TYPE
    }

    /// Returns true if the section has no file contents.
    pub fn is_zerofill(&self) -> bool {
        matches!(
            self.section_type(),
            S_ZEROFILL | S_GB_ZEROFILL | S_THREAD_LOCAL_ZEROFILL
        )
    }

    /// Returns the full name (segment,section).
    pub fn full_name(&self) -> String {
        format!("{},{}", self.segname, self.sectname)
    }

    /// Returns the section's file contents within `image`.
    ///
    /// Zero-fill sections have none and return an empty slice.
    pub fn data(&self, image: &MachImage<'a>) -> Result<&'a [u8]> {
        if self.is_zerofill() || self.size == 0 {
            return Ok(&[]);
        }
        image.file_bytes(self.offset as u64, self.size)
    }
}

/// A segment and its sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Segment name
    pub name: &'a str,
    /// Virtual memory address
    pub vmaddr: u64,
    /// Virtual memory size
    pub vmsize: u64,
    /// File offset
    pub fileoff: u64,
    /// Amount of file to map
    pub filesize: u64,
    /// Maximum VM protection
    pub maxprot: VmProt,
    /// Initial VM protection
    pub initprot: VmProt,
    /// Segment flags
    pub flags: u32,
    /// Sections in declaration order
    pub sections: Vec<Section<'a>>,
}

/// Reads a 16-byte name field at `offset` of a command.
fn name_at<'a>(bytes: &'a [u8], offset: usize) -> Result<&'a str> {
    let field: &'a [u8; 16] = ByteView::new(bytes)
        .bytes_at(offset, 16)?
        .try_into()
        .map_err(|_| Error::out_of_bounds(offset as u64, 16, bytes.len() as u64))?;
    Ok(fixed_name(field))
}

impl<'a> Segment<'a> {
    /// Decodes an LC_SEGMENT or LC_SEGMENT_64 command.
    pub fn parse(cmd: &LoadCommand<'a>) -> Result<Self> {
        let bytes = cmd.bytes();
        let view = ByteView::new(bytes);

        let (mut segment, nsects, header_size) = match cmd.kind {
            LoadCommandKind::Segment64 => {
                let seg: SegmentCommand64 = cmd.read()?;
                (
                    Self::from_fields(
                        name_at(bytes, 8)?,
                        seg.vmaddr,
                        seg.vmsize,
                        seg.fileoff,
                        seg.filesize,
                        seg.maxprot,
                        seg.initprot,
                        seg.flags,
                    ),
                    seg.nsects,
                    SegmentCommand64::SIZE,
                )
            }
            LoadCommandKind::Segment => {
                let seg: SegmentCommand32 = cmd.read()?;
                (
                    Self::from_fields(
                        name_at(bytes, 8)?,
                        seg.vmaddr as u64,
                        seg.vmsize as u64,
                        seg.fileoff as u64,
                        seg.filesize as u64,
                        seg.maxprot,
                        seg.initprot,
                        seg.flags,
                    ),
                    seg.nsects,
                    SegmentCommand32::SIZE,
                )
            }
            other => {
                return Err(cmd.malformed(format!("{other} is not a segment command")));
            }
        };

        let is_64 = cmd.kind == LoadCommandKind::Segment64;
        let section_size = if is_64 { Section64::SIZE } else { Section32::SIZE };
        let available = (bytes.len() - header_size) / section_size;
        if nsects as usize > available {
            return Err(cmd.malformed(format!(
                "segment {} declares {} sections, room for {}",
                segment.name, nsects, available
            )));
        }

        segment.sections.reserve(nsects as usize);
        for i in 0..nsects as usize {
            let at = header_size + i * section_size;
            let section = if is_64 {
                let s: Section64 = view.read_at(at)?;
                Section {
                    sectname: name_at(bytes, at)?,
                    segname: name_at(bytes, at + 16)?,
                    addr: s.addr,
                    size: s.size,
                    offset: s.offset,
                    align: s.align,
                    flags: s.flags,
                    reserved1: s.reserved1,
                    reserved2: s.reserved2,
                }
            } else {
                let s: Section32 = view.read_at(at)?;
                Section {
                    sectname: name_at(bytes, at)?,
                    segname: name_at(bytes, at + 16)?,
                    addr: s.addr as u64,
                    size: s.size as u64,
                    offset: s.offset,
                    align: s.align,
                    flags: s.flags,
                    reserved1: s.reserved1,
                    reserved2: s.reserved2,
                }
            };
            segment.sections.push(section);
        }

        Ok(segment)
    }

    #[allow(clippy::too_many_arguments)]
    fn from_fields(
        name: &'a str,
        vmaddr: u64,
        vmsize: u64,
        fileoff: u64,
        filesize: u64,
        maxprot: u32,
        initprot: u32,
        flags: u32,
    ) -> Self {
        Self {
            name,
            vmaddr,
            vmsize,
            fileoff,
            filesize,
            maxprot: VmProt::from_bits_retain(maxprot),
            initprot: VmProt::from_bits_retain(initprot),
            flags,
            sections: Vec::new(),
        }
    }

    /// Returns true if the segment is mapped writable.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.initprot.contains(VmProt::WRITE)
    }

    /// Returns true if the segment is mapped executable.
    #[inline]
    pub fn is_executable(&self) -> bool {
        self.initprot.contains(VmProt::EXECUTE)
    }

    /// Returns the virtual address range, saturating on overflow.
    pub fn vm_range(&self) -> Range<u64> {
        self.vmaddr..self.vmaddr.saturating_add(self.vmsize)
    }

    /// Returns true if `addr` falls inside the segment.
    pub fn contains_addr(&self, addr: u64) -> bool {
        self.vm_range().contains(&addr)
    }

    /// Returns a section by name.
    pub fn section(&self, name: &str) -> Option<&Section<'a>> {
        self.sections.iter().find(|s| s.sectname == name)
    }
}

impl fmt::Display for Segment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Segment {{ name: \"{}\", vm: {:#x}+{:#x}, file: {:#x}+{:#x}, sects: {} }}",
            self.name,
            self.vmaddr,
            self.vmsize,
            self.fileoff,
            self.filesize,
            self.sections.len()
        )
    }
}

impl<'a> MachImage<'a> {
    /// Returns every segment in load command order.
    ///
    /// A segment command that cannot be decoded is skipped with a warning.
    pub fn segments(&self) -> Vec<Segment<'a>> {
        let mut segments = Vec::new();
        let _ = self.for_each_load_command(|cmd| {
            if matches!(cmd.kind, LoadCommandKind::Segment | LoadCommandKind::Segment64) {
                match Segment::parse(&cmd) {
                    Ok(segment) => segments.push(segment),
                    Err(e) => warn!("skipping segment command {}: {}", cmd.index, e),
                }
            }
            true
        });
        segments
    }

    /// Returns a segment by name.
    pub fn segment(&self, name: &str) -> Option<Segment<'a>> {
        self.segments().into_iter().find(|s| s.name == name)
    }

    /// Returns a section by segment and section name.
    pub fn section(&self, segname: &str, sectname: &str) -> Option<Section<'a>> {
        self.segment(segname)
            .and_then(|seg| seg.section(sectname).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MachBuilder, SectionSpec, SegmentSpec};

    #[test]
    fn test_segments_and_sections() {
        let data = MachBuilder::new_64(CPU_TYPE_X86_64, 3, MH_EXECUTE)
            .segment(SegmentSpec::new("__PAGEZERO", 0, 0x1_0000_0000, 0, 0, 0))
            .segment(
                SegmentSpec::new("__TEXT", 0x1_0000_0000, 0x1000, 0, 0x1000, 5)
                    .section(SectionSpec::new("__text", 0x1_0000_0400, 0x20, 0x400, 0))
                    .section(SectionSpec::new(
                        "__cstring",
                        0x1_0000_0420,
                        0x10,
                        0x420,
                        S_CSTRING_LITERALS,
                    )),
            )
            .build();
        let image = MachImage::parse(&data).unwrap();
        let segments = image.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].name, "__PAGEZERO");

        let text = image.segment("__TEXT").unwrap();
        assert!(text.is_executable());
        assert!(!text.is_writable());
        assert_eq!(text.sections.len(), 2);
        assert!(text.contains_addr(0x1_0000_0800));
        assert!(!text.contains_addr(0x1_0000_1000));

        let cstring = image.section("__TEXT", "__cstring").unwrap();
        assert_eq!(cstring.segname, "__TEXT");
        assert_eq!(cstring.section_type(), S_CSTRING_LITERALS);
        assert_eq!(cstring.full_name(), "__TEXT,__cstring");
        assert!(image.section("__TEXT", "__const").is_none());
        assert!(image.segment("__DATA").is_none());
    }

    #[test]
    fn test_32_bit_segments() {
        let data = MachBuilder::new_32(CPU_TYPE_X86, 3, MH_EXECUTE)
            .segment(
                SegmentSpec::new("__DATA", 0x2000, 0x1000, 0x1000, 0x100, 3)
                    .section(SectionSpec::new("__bss", 0x2100, 0x200, 0, S_ZEROFILL)),
            )
            .build();
        let image = MachImage::parse(&data).unwrap();
        let data_seg = image.segment("__DATA").unwrap();
        assert!(data_seg.is_writable());
        assert_eq!(data_seg.vm_range(), 0x2000..0x3000);
        let bss = data_seg.section("__bss").unwrap();
        assert!(bss.is_zerofill());
        assert_eq!(bss.data(&image).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_section_data_out_of_range() {
        let data = MachBuilder::new_64(CPU_TYPE_X86_64, 3, MH_EXECUTE)
            .segment(
                SegmentSpec::new("__TEXT", 0, 0x1000, 0, 0x1000, 5).section(SectionSpec::new(
                    "__text",
                    0x100,
                    0x100,
                    0x8000,
                    0,
                )),
            )
            .build();
        let image = MachImage::parse(&data).unwrap();
        let text = image.section("__TEXT", "__text").unwrap();
        assert!(matches!(text.data(&image), Err(Error::OutOfBounds { .. })));
    }
}
