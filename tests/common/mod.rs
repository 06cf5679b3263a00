//! Minimal on-disk fixtures for the integration tests.

#![allow(dead_code)]

use std::mem::offset_of;
use std::path::Path;

use machscope::dyld::DyldCacheHeader;
use machscope::macho::*;
use zerocopy::IntoBytes;

pub const CACHE_BASE: u64 = 0x1_8000_0000;
pub const IMAGE_OFFSET: usize = 0x4000;

/// Installs a test-writer subscriber so `RUST_LOG`-style output shows up
/// under `cargo test -- --nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// An arm64 dylib with `__TEXT`, `__LINKEDIT` and an install name.
pub fn dylib(install_name: &str, text_addr: u64, flags: u32) -> Vec<u8> {
    let mut commands = Vec::new();
    let mut ncmds = 0;

    for (name, vmaddr, prot) in [
        ("__TEXT", text_addr, 5),
        ("__LINKEDIT", text_addr + 0x1000, 1),
    ] {
        let mut seg = SegmentCommand64::default();
        seg.set_name(name);
        seg.vmaddr = vmaddr;
        seg.vmsize = 0x1000;
        seg.filesize = 0x1000;
        seg.maxprot = prot;
        seg.initprot = prot;
        commands.extend_from_slice(seg.as_bytes());
        ncmds += 1;
    }

    let mut path = install_name.as_bytes().to_vec();
    path.push(0);
    path.resize(path.len().div_ceil(8) * 8, 0);
    let cmd = DylibCommand {
        cmd: LC_ID_DYLIB,
        cmdsize: (DylibCommand::SIZE + path.len()) as u32,
        dylib: Dylib {
            name_offset: DylibCommand::SIZE as u32,
            timestamp: 0,
            current_version: 0x10000,
            compatibility_version: 0x10000,
        },
    };
    commands.extend_from_slice(cmd.as_bytes());
    commands.extend_from_slice(&path);
    ncmds += 1;

    let header = MachHeader64 {
        cputype: CPU_TYPE_ARM64,
        cpusubtype: CPU_SUBTYPE_ARM64_ALL,
        filetype: MH_DYLIB,
        ncmds,
        sizeofcmds: commands.len() as u32,
        flags,
        ..Default::default()
    };
    let mut out = header.as_bytes().to_vec();
    out.extend_from_slice(&commands);
    out
}

fn put(buf: &mut [u8], at: usize, bytes: &[u8]) {
    buf[at..at + bytes.len()].copy_from_slice(bytes);
}

/// Writes a single-file arm64 cache holding one image at
/// `CACHE_BASE + IMAGE_OFFSET`.
pub fn write_cache(path: &Path, install_name: &str) {
    let header_size = DyldCacheHeader::SIZE;
    let mut buf = vec![0u8; 0x8000];
    put(&mut buf, 0, b"dyld_v1   arm64\0");
    put(
        &mut buf,
        offset_of!(DyldCacheHeader, mapping_offset),
        &(header_size as u32).to_le_bytes(),
    );
    put(&mut buf, offset_of!(DyldCacheHeader, mapping_count), &1u32.to_le_bytes());
    put(&mut buf, offset_of!(DyldCacheHeader, uuid), &[0x42; 16]);

    // One read-execute mapping over the whole file
    let mapping = header_size;
    put(&mut buf, mapping, &CACHE_BASE.to_le_bytes());
    let buf_len = buf.len() as u64;
    put(&mut buf, mapping + 8, &buf_len.to_le_bytes());
    put(&mut buf, mapping + 16, &0u64.to_le_bytes());
    put(&mut buf, mapping + 24, &5u32.to_le_bytes());
    put(&mut buf, mapping + 28, &5u32.to_le_bytes());

    let table = mapping + 32;
    let path_at = table + 32;
    put(
        &mut buf,
        offset_of!(DyldCacheHeader, images_offset),
        &(table as u32).to_le_bytes(),
    );
    put(&mut buf, offset_of!(DyldCacheHeader, images_count), &1u32.to_le_bytes());
    put(&mut buf, table, &(CACHE_BASE + IMAGE_OFFSET as u64).to_le_bytes());
    put(&mut buf, table + 24, &(path_at as u32).to_le_bytes());
    put(&mut buf, path_at, install_name.as_bytes());

    let image = dylib(
        install_name,
        CACHE_BASE + IMAGE_OFFSET as u64,
        MachOFlags::DYLIB_IN_CACHE.bits(),
    );
    put(&mut buf, IMAGE_OFFSET, &image);

    std::fs::write(path, &buf).unwrap();
}

/// Wraps images in a fat32 container, one page-aligned slice each.
pub fn fat(slices: &[(i32, i32, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&FAT_MAGIC.to_be_bytes());
    out.extend_from_slice(&(slices.len() as u32).to_be_bytes());
    let mut offset = 0x1000usize;
    let mut placed = Vec::new();
    for (cputype, cpusubtype, bytes) in slices {
        out.extend_from_slice(&cputype.to_be_bytes());
        out.extend_from_slice(&cpusubtype.to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&12u32.to_be_bytes());
        placed.push(offset);
        offset = (offset + bytes.len()).div_ceil(0x1000) * 0x1000;
    }
    for ((_, _, bytes), at) in slices.iter().zip(placed) {
        out.resize(at, 0);
        out.extend_from_slice(bytes);
    }
    out
}
