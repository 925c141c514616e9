//! Plane: a sparse map of blocks plus the data register that interlocks
//! `Data` and `Write` packets.

use std::collections::HashMap;

use crate::block::Block;
use crate::packet::{ChannelPacket, PacketKind};

#[derive(Debug, Clone)]
pub struct Plane {
    pages_per_block: u32,
    blocks: HashMap<u32, Block>,
    data_reg: Option<ChannelPacket>,
}

impl Plane {
    pub fn new(pages_per_block: u32) -> Self {
        Plane {
            pages_per_block,
            blocks: HashMap::new(),
            data_reg: None,
        }
    }

    /// Look up the block, read the page, and load the result into the data
    /// register as a `Data` packet, ready to be shipped back to the
    /// Controller by the owning Die.
    pub fn read(&mut self, mut pkt: ChannelPacket) -> ChannelPacket {
        let payload = self
            .blocks
            .get(&pkt.block)
            .map(|b| b.read(pkt.page))
            .unwrap_or_else(|| {
                log::debug!("read of block {} which was never written", pkt.block);
                0
            });
        pkt.kind = PacketKind::Data;
        pkt.payload = payload;
        self.data_reg = Some(pkt);
        pkt
    }

    /// Write the page from the data register (which a preceding `Data`
    /// packet must have populated), creating the block if this is its
    /// first write.
    pub fn write(&mut self, pkt: &ChannelPacket) {
        let payload = self
            .data_reg
            .map(|d| d.payload)
            .unwrap_or_else(|| {
                log::warn!("write with no preceding data-register load");
                0
            });
        let block = self
            .blocks
            .entry(pkt.block)
            .or_insert_with(|| Block::new(pkt.block, self.pages_per_block));
        block.write(pkt.page, payload);
    }

    /// Erase and drop the block entirely.
    pub fn erase(&mut self, pkt: &ChannelPacket) {
        self.blocks.remove(&pkt.block);
    }

    /// Load the data register directly, used when a `Data` packet arrives
    /// ahead of its `Write` command packet.
    pub fn store_in_data(&mut self, pkt: ChannelPacket) {
        self.data_reg = Some(pkt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PhysicalLocation;

    fn loc() -> PhysicalLocation {
        PhysicalLocation {
            package: 0,
            die: 0,
            plane: 0,
            block: 3,
            page: 1,
        }
    }

    #[test]
    fn write_then_read_round_trips_payload() {
        let mut plane = Plane::new(4);
        let data_pkt = ChannelPacket::new(PacketKind::Data, 0x1000, 0, loc()).with_payload(0xAA);
        plane.store_in_data(data_pkt);
        let write_pkt = ChannelPacket::new(PacketKind::Write, 0x1000, 0, loc());
        plane.write(&write_pkt);

        let read_pkt = ChannelPacket::new(PacketKind::Read, 0x1000, 0, loc());
        let result = plane.read(read_pkt);
        assert_eq!(result.payload, 0xAA);
        assert_eq!(result.kind, PacketKind::Data);
    }

    #[test]
    fn erase_drops_the_block() {
        let mut plane = Plane::new(4);
        let data_pkt = ChannelPacket::new(PacketKind::Data, 0x1000, 0, loc()).with_payload(0xAA);
        plane.store_in_data(data_pkt);
        plane.write(&ChannelPacket::new(PacketKind::Write, 0x1000, 0, loc()));
        assert!(plane.blocks.contains_key(&3));

        plane.erase(&ChannelPacket::new(PacketKind::Erase, 0, 0, loc()));
        assert!(!plane.blocks.contains_key(&3));
    }
}
