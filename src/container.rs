//! Container format detection.

use std::path::Path;

use tracing::debug;

use crate::dyld::DYLD_CACHE_MAGIC_PREFIXES;
use crate::error::{Error, Result};
use crate::macho::{MachImage, MachKind};
use crate::region::FileRegion;
use crate::universal::{FatKind, UniversalBinary};

/// The outer format of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// A single Mach-O image
    MachO,
    /// A fat (universal) binary
    Universal,
    /// A dyld shared cache
    SharedCache,
    /// None of the above
    Unknown,
}

impl ContainerKind {
    /// Classifies a buffer by its leading magic.
    pub fn detect(bytes: &[u8]) -> Self {
        if FatKind::classify(bytes) != FatKind::NotFat {
            return ContainerKind::Universal;
        }
        if MachKind::classify(bytes) != MachKind::NotMachO {
            return ContainerKind::MachO;
        }
        if DYLD_CACHE_MAGIC_PREFIXES
            .iter()
            .any(|prefix| bytes.starts_with(&prefix[..]))
        {
            return ContainerKind::SharedCache;
        }
        ContainerKind::Unknown
    }
}

/// A parsed single-file container.
#[derive(Debug)]
pub enum Container<'a> {
    /// A single image
    Image(MachImage<'a>),
    /// A fat binary; slices are parsed on demand
    Universal(UniversalBinary<'a>),
}

impl<'a> Container<'a> {
    /// Parses the container held by `region`.
    ///
    /// Shared caches are rejected: they may span several files, so they are
    /// opened by path through [`SharedCache::open`](crate::dyld::SharedCache::open).
    pub fn parse(region: &'a FileRegion) -> Result<Self> {
        let bytes = region.as_bytes();
        match ContainerKind::detect(bytes) {
            ContainerKind::Universal => UniversalBinary::parse(bytes).map(Container::Universal),
            ContainerKind::MachO => MachImage::parse(bytes).map(Container::Image),
            ContainerKind::SharedCache => Err(Error::NotRecognizedFormat {
                expected: "Mach-O image or fat binary",
                found: "dyld shared cache (open it with SharedCache::open)".into(),
            }),
            ContainerKind::Unknown => Err(Error::NotRecognizedFormat {
                expected: "Mach-O image or fat binary",
                found: match bytes.get(..4) {
                    Some(magic) => format!("magic {magic:02x?}"),
                    None => format!("{} bytes", bytes.len()),
                },
            }),
        }
    }
}

/// Maps a file and detects its container format.
pub fn open<P: AsRef<Path>>(path: P) -> Result<(FileRegion, ContainerKind)> {
    let region = FileRegion::open(path)?;
    let kind = ContainerKind::detect(region.as_bytes());
    debug!("detected {:?} in {:?}", kind, region.path());
    Ok((region, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macho::*;
    use crate::testutil::{FatBuilder, MachBuilder};

    #[test]
    fn test_detect() {
        let image = MachBuilder::new_64(CPU_TYPE_ARM64, 0, MH_EXECUTE).build();
        assert_eq!(ContainerKind::detect(&image), ContainerKind::MachO);

        let fat = FatBuilder::new()
            .slice(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL, &image)
            .build();
        assert_eq!(ContainerKind::detect(&fat), ContainerKind::Universal);

        assert_eq!(
            ContainerKind::detect(b"dyld_v1   arm64\0"),
            ContainerKind::SharedCache
        );
        assert_eq!(ContainerKind::detect(b"\x7fELF"), ContainerKind::Unknown);
        assert_eq!(ContainerKind::detect(&[]), ContainerKind::Unknown);
    }

    #[test]
    fn test_parse() {
        let image = MachBuilder::new_64(CPU_TYPE_ARM64, 0, MH_EXECUTE).build();
        let region = FileRegion::from_vec(image.clone());
        assert!(matches!(Container::parse(&region), Ok(Container::Image(_))));

        let fat = FatBuilder::new()
            .slice(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL, &image)
            .build();
        let region = FileRegion::from_vec(fat);
        let Ok(Container::Universal(fat)) = Container::parse(&region) else {
            panic!("expected a fat binary");
        };
        let slice = fat.slice_for("arm64").unwrap().unwrap();
        let inner = MachImage::parse(fat.slice_bytes(&slice).unwrap()).unwrap();
        assert_eq!(inner.arch_name(), "arm64");

        let region = FileRegion::from_vec(b"dyld_v1   arm64\0".to_vec());
        assert!(matches!(
            Container::parse(&region),
            Err(Error::NotRecognizedFormat { .. })
        ));
    }
}
