use crate::config::Geometry;

/// The three fields of an address, as seen by a particular cache geometry
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub tag: u64,
    pub set_index: usize,
    pub offset: u64,
}

/// Splits addresses into tag, set index and block offset
///
/// The masks are computed once from a validated [`Geometry`], so decoding can't fail and the
/// set index is always in bounds. Bits above the configured address width are not stripped,
/// they end up in the tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AddressDecoder {
    offset_mask: u64,
    set_mask: u64,
    offset_bits: u32,
    tag_shift: u32,
}

impl AddressDecoder {
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            offset_mask: geometry.block_size - 1,
            set_mask: geometry.num_sets - 1,
            offset_bits: geometry.offset_bits,
            tag_shift: geometry.offset_bits + geometry.index_bits,
        }
    }

    #[inline(always)]
    pub fn offset(&self, address: u64) -> u64 {
        address & self.offset_mask
    }

    #[inline(always)]
    pub fn set_index(&self, address: u64) -> usize {
        ((address >> self.offset_bits) & self.set_mask) as usize
    }

    #[inline(always)]
    pub fn tag(&self, address: u64) -> u64 {
        // Offset and index can cover the whole 64-bit address, leaving no tag at all
        address.checked_shr(self.tag_shift).unwrap_or(0)
    }

    #[inline(always)]
    pub fn decode(&self, address: u64) -> DecodedAddress {
        DecodedAddress {
            tag: self.tag(address),
            set_index: self.set_index(address),
            offset: self.offset(address),
        }
    }

    /// Rebuilds the block aligned address of a line from its tag and set, which is where a dirty
    /// line would be written back to
    ///
    /// # Examples
    ///
    /// ```
    /// use cachelib::address::AddressDecoder;
    /// use cachelib::config::Geometry;
    /// let decoder = AddressDecoder::new(&Geometry::new(1024, 64, 4, 32).unwrap());
    /// let decoded = decoder.decode(0x1234);
    /// assert_eq!(decoder.reconstruct(decoded.tag, decoded.set_index), 0x1200);
    /// ```
    pub fn reconstruct(&self, tag: u64, set_index: usize) -> u64 {
        tag.checked_shl(self.tag_shift).unwrap_or(0) | ((set_index as u64) << self.offset_bits)
    }
}
