//! Bus packets: the unit of communication between the FTL, the Controller,
//! the Channel, and the Die/Plane tree.

use crate::geometry::PhysicalLocation;
use crate::transaction::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Read,
    Write,
    Erase,
    /// A data-register load. Must precede a `Write` command packet for the
    /// same address -- the Plane's data register is the interlock that
    /// forces this ordering.
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPacket {
    pub kind: PacketKind,
    pub v_addr: u64,
    pub p_addr: u64,
    pub page: u32,
    pub block: u32,
    pub plane: u32,
    pub die: u32,
    pub package: u32,
    pub payload: Payload,
}

impl ChannelPacket {
    pub fn new(kind: PacketKind, v_addr: u64, p_addr: u64, loc: PhysicalLocation) -> Self {
        ChannelPacket {
            kind,
            v_addr,
            p_addr,
            page: loc.page,
            block: loc.block,
            plane: loc.plane,
            die: loc.die,
            package: loc.package,
            payload: 0,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }
}
