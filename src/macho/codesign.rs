//! Embedded code signature access.
//!
//! The signature is a big-endian superblob in LINKEDIT: a header followed by
//! an index of `(slot type, offset)` pairs, each pointing at a blob that
//! starts with its own magic and length. Nothing here verifies a signature.

use tracing::warn;

use super::commands::LoadCommandKind;
use super::constants::*;
use super::header::MachImage;
use crate::error::{Error, Result};
use crate::util::ByteView;

/// Superblob header: magic, length, count.
const SUPERBLOB_HEADER_SIZE: usize = 12;
/// One index entry: slot type, offset.
const INDEX_ENTRY_SIZE: usize = 8;
/// Blob header: magic, length.
const BLOB_HEADER_SIZE: usize = 8;

/// One slot of the superblob index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    /// Slot type (CSSLOT_*)
    pub slot: u32,
    /// Offset of the blob from the start of the superblob
    pub offset: u32,
}

/// A blob inside the superblob.
#[derive(Debug, Clone, Copy)]
pub struct Blob<'a> {
    /// Blob magic (CSMAGIC_*)
    pub magic: u32,
    bytes: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Returns the whole blob, header included.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Returns the blob contents after the 8-byte header.
    pub fn payload(&self) -> &'a [u8] {
        self.bytes.get(BLOB_HEADER_SIZE..).unwrap_or(&[])
    }
}

/// A parsed embedded signature superblob.
#[derive(Debug, Clone, Copy)]
pub struct CodeSignature<'a> {
    data: ByteView<'a>,
    count: u32,
}

impl<'a> CodeSignature<'a> {
    /// Parses a superblob, checking its header and index against `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let view = ByteView::new(data);
        let magic = view.u32_be_at(0)?;
        if magic != CSMAGIC_EMBEDDED_SIGNATURE {
            return Err(Error::NotRecognizedFormat {
                expected: "embedded signature superblob",
                found: format!("magic {magic:#010x}"),
            });
        }

        // The declared length may be shorter than the LINKEDIT region
        let length = view.u32_be_at(4)? as usize;
        let data = view.subview(0, length)?;
        let count = data.u32_be_at(8)?;

        let index_len = (count as usize)
            .checked_mul(INDEX_ENTRY_SIZE)
            .and_then(|n| n.checked_add(SUPERBLOB_HEADER_SIZE))
            .ok_or_else(|| Error::out_of_bounds(SUPERBLOB_HEADER_SIZE as u64, u64::MAX, length as u64))?;
        data.bytes_at(0, index_len)?;

        Ok(Self { data, count })
    }

    /// Returns the superblob bytes.
    pub fn bytes(&self) -> &'a [u8] {
        self.data.as_bytes()
    }

    /// Returns the index entries in declaration order.
    pub fn slots(&self) -> Vec<SlotEntry> {
        (0..self.count as usize)
            .filter_map(|i| {
                let at = SUPERBLOB_HEADER_SIZE + i * INDEX_ENTRY_SIZE;
                Some(SlotEntry {
                    slot: self.data.u32_be_at(at).ok()?,
                    offset: self.data.u32_be_at(at + 4).ok()?,
                })
            })
            .collect()
    }

    /// Returns the blob in `slot`, or `None` if the index has no such slot.
    pub fn blob(&self, slot: u32) -> Result<Option<Blob<'a>>> {
        let Some(entry) = self.slots().into_iter().find(|e| e.slot == slot) else {
            return Ok(None);
        };

        let offset = entry.offset as usize;
        let magic = self.data.u32_be_at(offset)?;
        let length = self.data.u32_be_at(offset + 4)? as usize;
        if length < BLOB_HEADER_SIZE {
            return Err(Error::out_of_bounds(
                offset as u64,
                length as u64,
                self.data.len() as u64,
            ));
        }
        let bytes = self.data.bytes_at(offset, length)?;
        Ok(Some(Blob { magic, bytes }))
    }

    /// Returns the payload of `slot` if its blob carries `magic`.
    fn payload(&self, slot: u32, magic: u32) -> Result<Option<&'a [u8]>> {
        match self.blob(slot)? {
            Some(blob) if blob.magic == magic => Ok(Some(blob.payload())),
            Some(blob) => Err(Error::NotRecognizedFormat {
                expected: "entitlements blob",
                found: format!("magic {:#010x} in slot {}", blob.magic, slot),
            }),
            None => Ok(None),
        }
    }
}

impl<'a> MachImage<'a> {
    /// Returns the embedded signature.
    ///
    /// `None` for unsigned images. A signature that cannot be parsed is
    /// logged and also reported as `None`.
    pub fn code_signature(&self) -> Option<CodeSignature<'a>> {
        let cmd = self.command(LoadCommandKind::CodeSignature)?;
        let result = cmd
            .linkedit_data()
            .and_then(|lc| self.linkedit_bytes(lc.dataoff as u64, lc.datasize as u64))
            .and_then(CodeSignature::parse);
        match result {
            Ok(signature) => Some(signature),
            Err(e) => {
                warn!("ignoring malformed code signature: {}", e);
                None
            }
        }
    }

    /// Returns the raw XML entitlements plist, if the image is signed with
    /// one.
    pub fn entitlements(&self) -> Option<&'a [u8]> {
        self.entitlements_blob(CSSLOT_ENTITLEMENTS, CSMAGIC_EMBEDDED_ENTITLEMENTS)
    }

    /// Returns the raw DER-encoded entitlements, if present.
    pub fn der_entitlements(&self) -> Option<&'a [u8]> {
        self.entitlements_blob(CSSLOT_DER_ENTITLEMENTS, CSMAGIC_EMBEDDED_DER_ENTITLEMENTS)
    }

    fn entitlements_blob(&self, slot: u32, magic: u32) -> Option<&'a [u8]> {
        match self.code_signature()?.payload(slot, magic) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("ignoring entitlements slot {}: {}", slot, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{superblob, MachBuilder};

    const PLIST: &[u8] = b"<?xml version=\"1.0\"?><plist><dict><key>com.apple.security.app-sandbox</key><true/></dict></plist>";

    fn signed(blob: &[u8]) -> Vec<u8> {
        MachBuilder::new_64(CPU_TYPE_ARM64, 0, MH_EXECUTE)
            .linkedit_data(LC_CODE_SIGNATURE, blob)
            .build()
    }

    #[test]
    fn test_entitlements() {
        let blob = superblob(&[
            (CSSLOT_CODEDIRECTORY, CSMAGIC_CODEDIRECTORY, &[0u8; 16][..]),
            (CSSLOT_ENTITLEMENTS, CSMAGIC_EMBEDDED_ENTITLEMENTS, PLIST),
            (CSSLOT_DER_ENTITLEMENTS, CSMAGIC_EMBEDDED_DER_ENTITLEMENTS, &[0x70, 0x01, 0x02][..]),
        ]);
        let data = signed(&blob);
        let image = MachImage::parse(&data).unwrap();
        assert!(image.has_code_signature());
        assert_eq!(image.entitlements(), Some(PLIST));
        assert_eq!(image.der_entitlements(), Some(&[0x70, 0x01, 0x02][..]));
        // Repeated calls agree
        assert_eq!(image.entitlements(), image.entitlements());

        let signature = image.code_signature().unwrap();
        let slots: Vec<_> = signature.slots().iter().map(|s| s.slot).collect();
        assert_eq!(
            slots,
            [CSSLOT_CODEDIRECTORY, CSSLOT_ENTITLEMENTS, CSSLOT_DER_ENTITLEMENTS]
        );
        let cd = signature.blob(CSSLOT_CODEDIRECTORY).unwrap().unwrap();
        assert_eq!(cd.magic, CSMAGIC_CODEDIRECTORY);
        assert_eq!(cd.bytes().len(), 24);
    }

    #[test]
    fn test_unsigned_image() {
        let data = MachBuilder::new_64(CPU_TYPE_ARM64, 0, MH_EXECUTE).build();
        let image = MachImage::parse(&data).unwrap();
        assert!(image.code_signature().is_none());
        assert_eq!(image.entitlements(), None);
    }

    #[test]
    fn test_missing_slot() {
        let blob = superblob(&[(CSSLOT_CODEDIRECTORY, CSMAGIC_CODEDIRECTORY, &[0u8; 8][..])]);
        let data = signed(&blob);
        let image = MachImage::parse(&data).unwrap();
        assert!(image.code_signature().is_some());
        assert_eq!(image.entitlements(), None);
    }

    #[test]
    fn test_malformed_signature() {
        // Wrong superblob magic
        let mut blob = superblob(&[(CSSLOT_ENTITLEMENTS, CSMAGIC_EMBEDDED_ENTITLEMENTS, PLIST)]);
        blob[0] = 0;
        let image_data = signed(&blob);
        let image = MachImage::parse(&image_data).unwrap();
        assert!(image.code_signature().is_none());
        assert_eq!(image.entitlements(), None);

        // Slot offset past the end
        let mut blob = superblob(&[(CSSLOT_ENTITLEMENTS, CSMAGIC_EMBEDDED_ENTITLEMENTS, PLIST)]);
        blob[16..20].copy_from_slice(&0x0100_0000u32.to_be_bytes());
        let image_data = signed(&blob);
        let image = MachImage::parse(&image_data).unwrap();
        assert_eq!(image.entitlements(), None);

        // Entitlements slot carrying the wrong magic
        let blob = superblob(&[(CSSLOT_ENTITLEMENTS, CSMAGIC_CODEDIRECTORY, PLIST)]);
        let image_data = signed(&blob);
        let image = MachImage::parse(&image_data).unwrap();
        assert_eq!(image.entitlements(), None);
    }

    #[test]
    fn test_superblob_count_overflow() {
        let mut blob = superblob(&[]);
        blob[8..12].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(CodeSignature::parse(&blob).is_err());
    }
}
