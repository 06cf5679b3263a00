//! Virtual memory layout summary.
//!
//! The summary is advisory: it sizes an address-space reservation and never
//! decides identity or trust.

use bitflags::bitflags;

use super::header::MachImage;
use super::segment::Segment;
use crate::util::align_up;

/// Segment skipped by the analysis.
const PAGEZERO: &str = "__PAGEZERO";

bitflags! {
    /// Layout signals that the image needs zero-fill handling when mapped.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Irregularities: u8 {
        /// A writable segment's file size differs from its VM size
        const WRITABLE_SIZE_MISMATCH = 0x1;
        /// A segment has a VM size of zero
        const ZERO_SIZE_SEGMENT = 0x2;
        /// VM sizes do not tile the page-rounded span, or segments are out of order
        const DISCONTIGUOUS = 0x4;
    }
}

/// Summary of an image's segment layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    /// Page-rounded span from the lowest to the highest segment address
    pub total_virtual_space: u64,
    /// True if any irregularity was found
    pub has_zero_fill: bool,
    /// Which signals fired
    pub irregularities: Irregularities,
}

impl SegmentLayout {
    /// Analyzes the segments of `image`.
    pub fn analyze(image: &MachImage<'_>) -> Self {
        Self::from_segments(&image.segments(), image.page_size())
    }

    /// Analyzes a list of segments laid out with `page_size` pages.
    pub fn from_segments(segments: &[Segment<'_>], page_size: u64) -> Self {
        let mut irregularities = Irregularities::empty();
        let mut low = u64::MAX;
        let mut high = 0u64;
        let mut sum = 0u64;
        let mut previous_end: Option<u64> = None;
        let mut seen = false;

        for segment in segments.iter().filter(|s| s.name != PAGEZERO) {
            seen = true;

            if segment.is_writable() && segment.filesize != segment.vmsize {
                irregularities |= Irregularities::WRITABLE_SIZE_MISMATCH;
            }
            if segment.vmsize == 0 {
                irregularities |= Irregularities::ZERO_SIZE_SEGMENT;
            }

            let end = match segment.vmaddr.checked_add(segment.vmsize) {
                Some(end) => end,
                None => {
                    irregularities |= Irregularities::DISCONTIGUOUS;
                    u64::MAX
                }
            };
            if previous_end.is_some_and(|prev| segment.vmaddr < prev) {
                irregularities |= Irregularities::DISCONTIGUOUS;
            }
            previous_end = Some(end);

            low = low.min(segment.vmaddr);
            high = high.max(end);
            sum = sum.saturating_add(segment.vmsize);
        }

        if !seen {
            return Self {
                total_virtual_space: 0,
                has_zero_fill: false,
                irregularities,
            };
        }

        // A short final page also counts: the loader zero-fills its tail
        let total_virtual_space = align_up(high - low, page_size).unwrap_or(u64::MAX);
        if sum != total_virtual_space {
            irregularities |= Irregularities::DISCONTIGUOUS;
        }

        Self {
            total_virtual_space,
            has_zero_fill: !irregularities.is_empty(),
            irregularities,
        }
    }
}

impl<'a> MachImage<'a> {
    /// Summarizes the segment layout.
    pub fn segment_layout(&self) -> SegmentLayout {
        SegmentLayout::analyze(self)
    }
}
