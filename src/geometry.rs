//! Fixed, immutable device geometry and physical-address decomposition.
//!
//! Physical addresses are laid out, from LSB to MSB after the byte-offset
//! bits are removed, as `page | block | plane | die | package`. All
//! capacity counts must be powers of two because decomposition is pure
//! shift/mask on the bit widths `log2(...)` of each field.

use crate::error::NvSimError;
use crate::packet::{ChannelPacket, PacketKind};

/// A physical location fully decomposed from a `pAddr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalLocation {
    pub package: u32,
    pub die: u32,
    pub plane: u32,
    pub block: u32,
    pub page: u32,
}

/// Immutable geometry and address-translation parameters, fixed at
/// `Device` construction time and shared (by reference) by every
/// component. Kept as an explicit struct rather than process-wide
/// constants so components remain testable in isolation.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub num_packages: u32,
    pub dies_per_package: u32,
    pub planes_per_die: u32,
    pub blocks_per_plane: u32,
    pub pages_per_block: u32,
    pub nv_page_size: u32,

    offset: u32,
    page_bit_width: u32,
    block_bit_width: u32,
    plane_bit_width: u32,
    die_bit_width: u32,
    package_bit_width: u32,

    pub block_size: u64,
    pub total_size: u64,
}

fn log2_exact(name: &'static str, value: u32) -> Result<u32, NvSimError> {
    if value == 0 || !value.is_power_of_two() {
        return Err(NvSimError::NotPowerOfTwo {
            name,
            value: value as u64,
        });
    }
    Ok(value.trailing_zeros())
}

impl Geometry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        num_packages: u32,
        dies_per_package: u32,
        planes_per_die: u32,
        blocks_per_plane: u32,
        pages_per_block: u32,
        nv_page_size: u32,
    ) -> Result<Self, NvSimError> {
        let offset = log2_exact("NV_PAGE_SIZE", nv_page_size)?;
        let page_bit_width = log2_exact("PAGES_PER_BLOCK", pages_per_block)?;
        let block_bit_width = log2_exact("BLOCKS_PER_PLANE", blocks_per_plane)?;
        let plane_bit_width = log2_exact("PLANES_PER_DIE", planes_per_die)?;
        let die_bit_width = log2_exact("DIES_PER_PACKAGE", dies_per_package)?;
        let package_bit_width = log2_exact("NUM_PACKAGES", num_packages)?;

        let block_size = pages_per_block as u64 * nv_page_size as u64;
        let total_size = num_packages as u64
            * dies_per_package as u64
            * planes_per_die as u64
            * blocks_per_plane as u64
            * block_size;

        Ok(Geometry {
            num_packages,
            dies_per_package,
            planes_per_die,
            blocks_per_plane,
            pages_per_block,
            nv_page_size,
            offset,
            page_bit_width,
            block_bit_width,
            plane_bit_width,
            die_bit_width,
            package_bit_width,
            block_size,
            total_size,
        })
    }

    /// Decompose a physical byte address into (package, die, plane, block,
    /// page). Fails fast when `pAddr >= TOTAL_SIZE` -- an out-of-range
    /// address indicates a bug upstream, not user input to validate here.
    pub fn decompose(&self, p_addr: u64) -> Result<PhysicalLocation, NvSimError> {
        if p_addr >= self.total_size {
            return Err(NvSimError::AddressOutOfRange {
                addr: p_addr,
                total: self.total_size,
            });
        }

        let mut remaining = p_addr >> self.offset;

        let page = extract(&mut remaining, self.page_bit_width);
        let block = extract(&mut remaining, self.block_bit_width);
        let plane = extract(&mut remaining, self.plane_bit_width);
        let die = extract(&mut remaining, self.die_bit_width);
        let package = extract(&mut remaining, self.package_bit_width);

        Ok(PhysicalLocation {
            package: package as u32,
            die: die as u32,
            plane: plane as u32,
            block: block as u32,
            page: page as u32,
        })
    }

    /// Build a `ChannelPacket` for `pAddr`, decomposing it in the process.
    pub fn translate(
        &self,
        kind: PacketKind,
        v_addr: u64,
        p_addr: u64,
    ) -> Result<ChannelPacket, NvSimError> {
        let loc = self.decompose(p_addr)?;
        Ok(ChannelPacket::new(kind, v_addr, p_addr, loc))
    }

    /// Total number of pages across the whole device.
    pub fn total_pages(&self) -> u64 {
        self.total_size / self.nv_page_size as u64
    }

    /// Total number of blocks across the whole device.
    pub fn total_blocks(&self) -> u64 {
        self.total_size / self.block_size
    }
}

fn extract(remaining: &mut u64, width: u32) -> u64 {
    if width == 0 {
        return 0;
    }
    let mask = (1u64 << width) - 1;
    let field = *remaining & mask;
    *remaining >>= width;
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo() -> Geometry {
        Geometry::new(2, 2, 1, 2, 4, 4096).unwrap()
    }

    #[test]
    fn total_size_matches_product_of_dimensions() {
        let g = geo();
        assert_eq!(g.block_size, 4 * 4096);
        assert_eq!(g.total_size, 2 * 2 * 1 * 2 * 4 * 4096);
    }

    #[test]
    fn non_power_of_two_geometry_is_rejected() {
        assert!(matches!(
            Geometry::new(3, 2, 1, 2, 4, 4096),
            Err(NvSimError::NotPowerOfTwo { name: "NUM_PACKAGES", .. })
        ));
    }

    #[test]
    fn decompose_round_trips_every_field() {
        let g = geo();
        // Bit widths for this geometry: page=2, block=1, plane=0, die=1, package=1.
        // Target: package=1, die=1, plane=0, block=1, page=2.
        let page = 2u64;
        let block = 1u64 << 2;
        let plane = 0u64 << 3;
        let die = 1u64 << 3;
        let package = 1u64 << 4;
        let p_addr = (page | block | plane | die | package) << 12;

        let loc = g.decompose(p_addr).unwrap();
        assert_eq!(loc.package, 1);
        assert_eq!(loc.die, 1);
        assert_eq!(loc.plane, 0);
        assert_eq!(loc.block, 1);
        assert_eq!(loc.page, 2);
    }

    #[test]
    fn decompose_rejects_out_of_range_address() {
        let g = geo();
        assert!(matches!(
            g.decompose(g.total_size),
            Err(NvSimError::AddressOutOfRange { .. })
        ));
    }
}
