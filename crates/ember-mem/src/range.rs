//! # Aperture Range Allocator
//!
//! First-fit allocator over aperture offsets with block splitting and
//! neighbour merging.

use alloc::vec::Vec;

use ember_core::{ByteSize, Error, Result, PAGE_SIZE};

// =============================================================================
// RANGE
// =============================================================================

/// Half-open range of aperture offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AperRange {
    /// First offset
    pub start: u64,
    /// One past the last offset
    pub end: u64,
}

impl AperRange {
    /// Create from start and size
    pub const fn new(start: u64, size: u64) -> Self {
        Self {
            start,
            end: start + size,
        }
    }

    /// Size in bytes
    pub const fn size(&self) -> u64 {
        self.end - self.start
    }

    /// Check for overlap
    pub const fn overlaps(&self, other: &AperRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone)]
struct Block {
    range: AperRange,
    free: bool,
}

// =============================================================================
// ALLOCATOR
// =============================================================================

/// Allocator statistics
#[derive(Debug, Clone, Default)]
pub struct RangeStats {
    /// Number of allocations
    pub allocs: u64,
    /// Number of frees
    pub frees: u64,
    /// Current allocated bytes
    pub allocated: u64,
}

/// First-fit range allocator
#[derive(Debug)]
pub struct RangeAllocator {
    range: AperRange,
    blocks: Vec<Block>,
    stats: RangeStats,
}

impl RangeAllocator {
    /// Manage `[0, size)`
    pub fn new(size: u64) -> Self {
        let range = AperRange::new(0, size);
        Self {
            range,
            blocks: alloc::vec![Block { range, free: true }],
            stats: RangeStats::default(),
        }
    }

    /// Managed range
    pub fn range(&self) -> AperRange {
        self.range
    }

    /// Allocate `size` bytes aligned to `alignment` (at least a page)
    pub fn allocate(&mut self, size: ByteSize, alignment: u64) -> Result<AperRange> {
        let size = size.as_bytes();
        if size == 0 {
            return Err(Error::InvalidParameter);
        }
        let alignment = alignment.max(PAGE_SIZE);
        if !alignment.is_power_of_two() {
            return Err(Error::MisalignedAddress);
        }

        for i in 0..self.blocks.len() {
            if !self.blocks[i].free {
                continue;
            }

            let block = self.blocks[i].range;
            let Some(aligned_start) = block
                .start
                .checked_add(alignment - 1)
                .map(|v| v & !(alignment - 1))
            else {
                continue;
            };
            let Some(aligned_end) = aligned_start.checked_add(size) else {
                continue;
            };

            if aligned_end <= block.end {
                let alloc_range = AperRange {
                    start: aligned_start,
                    end: aligned_end,
                };
                self.split_block(i, alloc_range);

                self.stats.allocs += 1;
                self.stats.allocated += size;
                return Ok(alloc_range);
            }
        }

        Err(Error::OutOfMemory)
    }

    fn split_block(&mut self, index: usize, alloc: AperRange) {
        let block = self.blocks.remove(index);
        let mut at = index;

        if alloc.start > block.range.start {
            self.blocks.insert(
                at,
                Block {
                    range: AperRange {
                        start: block.range.start,
                        end: alloc.start,
                    },
                    free: true,
                },
            );
            at += 1;
        }

        self.blocks.insert(
            at,
            Block {
                range: alloc,
                free: false,
            },
        );

        if alloc.end < block.range.end {
            self.blocks.insert(
                at + 1,
                Block {
                    range: AperRange {
                        start: alloc.end,
                        end: block.range.end,
                    },
                    free: true,
                },
            );
        }
    }

    /// Return an allocated range
    pub fn free(&mut self, range: AperRange) -> Result<()> {
        let index = self
            .blocks
            .iter()
            .position(|b| b.range == range && !b.free)
            .ok_or(Error::NotFound)?;

        self.blocks[index].free = true;
        self.stats.frees += 1;
        self.stats.allocated -= range.size();

        self.merge_free_blocks();
        Ok(())
    }

    fn merge_free_blocks(&mut self) {
        let mut i = 0;
        while i + 1 < self.blocks.len() {
            if self.blocks[i].free && self.blocks[i + 1].free {
                self.blocks[i].range.end = self.blocks[i + 1].range.end;
                self.blocks.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }

    /// Get statistics
    pub fn stats(&self) -> &RangeStats {
        &self.stats
    }

    /// Total free bytes
    pub fn free_space(&self) -> ByteSize {
        ByteSize::from_bytes(
            self.blocks
                .iter()
                .filter(|b| b.free)
                .map(|b| b.range.size())
                .sum(),
        )
    }

    /// Largest contiguous free range
    pub fn largest_free(&self) -> ByteSize {
        ByteSize::from_bytes(
            self.blocks
                .iter()
                .filter(|b| b.free)
                .map(|b| b.range.size())
                .max()
                .unwrap_or(0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_do_not_overlap() {
        let mut ranges = RangeAllocator::new(64 * PAGE_SIZE);
        let a = ranges.allocate(ByteSize::from_pages(3), PAGE_SIZE).unwrap();
        let b = ranges.allocate(ByteSize::from_pages(1), 4 * PAGE_SIZE).unwrap();
        let c = ranges.allocate(ByteSize::from_pages(1), PAGE_SIZE).unwrap();

        assert!(!a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!b.overlaps(&c));
        assert_eq!(b.start % (4 * PAGE_SIZE), 0);
        // The alignment gap in front of `b` is reused first-fit
        assert_eq!(c.start, 3 * PAGE_SIZE);
    }

    #[test]
    fn test_free_merges() {
        let mut ranges = RangeAllocator::new(16 * PAGE_SIZE);
        let a = ranges.allocate(ByteSize::from_pages(4), PAGE_SIZE).unwrap();
        let b = ranges.allocate(ByteSize::from_pages(4), PAGE_SIZE).unwrap();
        ranges.free(a).unwrap();
        ranges.free(b).unwrap();
        assert_eq!(ranges.largest_free().as_bytes(), 16 * PAGE_SIZE);
        assert_eq!(ranges.stats().allocated, 0);
    }

    #[test]
    fn test_exhaustion_and_bad_input() {
        let mut ranges = RangeAllocator::new(4 * PAGE_SIZE);
        assert_eq!(
            ranges.allocate(ByteSize::from_pages(5), PAGE_SIZE),
            Err(Error::OutOfMemory)
        );
        assert_eq!(
            ranges.allocate(ByteSize::from_bytes(0), PAGE_SIZE),
            Err(Error::InvalidParameter)
        );
        assert_eq!(
            ranges.allocate(ByteSize::from_pages(1), 3 * PAGE_SIZE),
            Err(Error::MisalignedAddress)
        );
        assert_eq!(
            ranges.free(AperRange::new(0, PAGE_SIZE)),
            Err(Error::NotFound)
        );
    }
}
