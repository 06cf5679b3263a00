//! Architecture naming and VM page-size policy.
//!
//! Both are fixed tables keyed by `(cputype, cpusubtype)`. They describe
//! platform policy rather than anything stored in the file, so they live in
//! one place and are updated together when a new architecture ships.

use std::fmt;

use tracing::warn;

use super::constants::*;
use crate::error::{Error, Result};

/// 4 KiB VM page.
pub const PAGE_SIZE_4K: u64 = 0x1000;
/// 16 KiB VM page.
pub const PAGE_SIZE_16K: u64 = 0x4000;

/// Name assigned to `(cputype, cpusubtype)` pairs missing from the table.
pub const UNKNOWN_ARCH_NAME: &str = "unknown";

/// A named `(cputype, cpusubtype)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Architecture {
    /// Conventional name, e.g. "arm64e"
    pub name: &'static str,
    /// CPU type
    pub cputype: i32,
    /// CPU subtype, including capability bits
    pub cpusubtype: i32,
}

const fn arch(name: &'static str, cputype: i32, cpusubtype: u32) -> Architecture {
    Architecture {
        name,
        cputype,
        cpusubtype: cpusubtype as i32,
    }
}

const ARM64E: u32 = CPU_SUBTYPE_ARM64E as u32;

/// Every architecture this crate can name.
pub static ARCHITECTURES: &[Architecture] = &[
    arch("i386", CPU_TYPE_X86, CPU_SUBTYPE_I386_ALL as u32),
    arch("x86_64", CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL as u32),
    arch("x86_64h", CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_H as u32),
    arch("armv6", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V6 as u32),
    arch("armv7", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7 as u32),
    arch("armv7s", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7S as u32),
    arch("armv7k", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7K as u32),
    arch("armv6m", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V6M as u32),
    arch("armv7m", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7M as u32),
    arch("armv7em", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7EM as u32),
    arch("arm64", CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL as u32),
    arch("arm64", CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_V8 as u32),
    arch("arm64e", CPU_TYPE_ARM64, ARM64E),
    arch("arm64e", CPU_TYPE_ARM64, ARM64E | CPU_SUBTYPE_PTRAUTH_ABI),
    arch("arm64e.v1", CPU_TYPE_ARM64, ARM64E | 0x8100_0000),
    arch(
        "arm64e.kernel",
        CPU_TYPE_ARM64,
        ARM64E | CPU_SUBTYPE_PTRAUTH_ABI | CPU_SUBTYPE_ARM64_PTR_AUTH_KERNEL,
    ),
    arch("arm64e.kernel.v1", CPU_TYPE_ARM64, ARM64E | 0xC100_0000),
    arch("arm64e.kernel.v2", CPU_TYPE_ARM64, ARM64E | 0xC200_0000),
    arch("arm64_32", CPU_TYPE_ARM64_32, CPU_SUBTYPE_ARM64_32_V8 as u32),
    arch("arm64_32", CPU_TYPE_ARM64_32, CPU_SUBTYPE_ARM64_32_ALL as u32),
    arch("ppc", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_ALL as u32),
];

impl Architecture {
    /// Looks up the exact `(cputype, cpusubtype)` pair.
    pub fn lookup(cputype: i32, cpusubtype: i32) -> Option<&'static Architecture> {
        ARCHITECTURES
            .iter()
            .find(|a| a.cputype == cputype && a.cpusubtype == cpusubtype)
    }

    /// Like [`lookup`](Self::lookup), but reports a miss as
    /// [`Error::UnknownArchitecture`].
    pub fn lookup_checked(cputype: i32, cpusubtype: i32) -> Result<&'static Architecture> {
        Self::lookup(cputype, cpusubtype).ok_or(Error::UnknownArchitecture {
            cputype,
            cpusubtype,
        })
    }

    /// Finds the first table entry with this name.
    pub fn by_name(name: &str) -> Option<&'static Architecture> {
        ARCHITECTURES.iter().find(|a| a.name == name)
    }

    /// Returns true for 64-bit ABIs.
    pub fn is_64_bit(&self) -> bool {
        (self.cputype & CPU_ARCH_ABI64) != 0
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Returns the architecture name, or `"unknown"` for pairs not in the table.
pub fn arch_name(cputype: i32, cpusubtype: i32) -> &'static str {
    match Architecture::lookup(cputype, cpusubtype) {
        Some(arch) => arch.name,
        None => {
            warn!(
                "unknown architecture: cputype {:#x}, cpusubtype {:#x}",
                cputype, cpusubtype
            );
            UNKNOWN_ARCH_NAME
        }
    }
}

// =============================================================================
// Page Size Policy
// =============================================================================

/// One row of the 16 KiB page policy.
struct PagePolicy {
    cputype: i32,
    /// `None` matches every subtype.
    cpusubtype: Option<i32>,
    /// Kernel extensions keep 4 KiB pages on this architecture.
    excludes_kexts: bool,
}

/// Architectures that run with 16 KiB VM pages. Everything else uses 4 KiB.
static SIXTEEN_K_PAGES: &[PagePolicy] = &[
    PagePolicy {
        cputype: CPU_TYPE_ARM64,
        cpusubtype: None,
        excludes_kexts: false,
    },
    PagePolicy {
        cputype: CPU_TYPE_ARM64_32,
        cpusubtype: None,
        excludes_kexts: false,
    },
    PagePolicy {
        cputype: CPU_TYPE_ARM,
        cpusubtype: Some(CPU_SUBTYPE_ARM_V7K),
        excludes_kexts: true,
    },
];

/// Returns the VM page size an image of this kind is laid out for.
pub fn page_size(cputype: i32, cpusubtype: i32, filetype: u32) -> u64 {
    let is_kext = filetype == MH_KEXT_BUNDLE;
    let uses_16k = SIXTEEN_K_PAGES.iter().any(|p| {
        p.cputype == cputype
            && p.cpusubtype.map_or(true, |s| s == cpusubtype)
            && !(p.excludes_kexts && is_kext)
    });
    if uses_16k {
        PAGE_SIZE_16K
    } else {
        PAGE_SIZE_4K
    }
}
