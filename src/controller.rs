//! Controller: packet routing between the FTL and the package/die/plane
//! hierarchy, and read-data return.
//!
//! Holds no owning reference back to the FTL or the harness -- components
//! are wired by the top-level `Device` arena and talk to each other only
//! through parameters and return values.

use crate::channel::Channel;
use crate::die::Die;
use crate::packet::{ChannelPacket, PacketKind};
use crate::timing::Timing;

/// One physical package: its channel plus the dies it owns.
#[derive(Debug, Clone)]
pub struct Package {
    pub channel: Channel,
    pub dies: Vec<Die>,
}

impl Package {
    pub fn new(dies_per_package: u32, planes_per_die: u32, pages_per_block: u32) -> Self {
        Package {
            channel: Channel::new(),
            dies: (0..dies_per_package)
                .map(|_| Die::new(planes_per_die, pages_per_block))
                .collect(),
        }
    }
}

/// An event the Controller hands up to the harness boundary. Replaces the
/// original's `returnReadData`/`write_complete` callback hooks with plain
/// return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEvent {
    ReadComplete { v_addr: u64, payload: u64, package: u32, cycle: u64 },
    WriteComplete { v_addr: u64, package: u32, cycle: u64 },
}

#[derive(Default)]
pub struct Controller;

impl Controller {
    pub fn new() -> Self {
        Controller
    }

    /// Route a packet emitted by the FTL onto the channel of the package it
    /// addresses.
    pub fn add_packet(&self, packages: &mut [Package], pkt: ChannelPacket) {
        if let Some(pkg) = packages.get_mut(pkt.package as usize) {
            pkg.channel.enqueue(pkt);
        }
    }

    /// Tick every channel (which in turn ticks its dies), collecting
    /// completed replies into harness events.
    pub fn update(
        &self,
        packages: &mut [Package],
        timing: &Timing,
        page_size: u32,
        cycle: u64,
    ) -> Vec<HarnessEvent> {
        let mut events = Vec::new();
        for pkg in packages.iter_mut() {
            if let Some(reply) = pkg.channel.update(&mut pkg.dies, timing, page_size) {
                if let Some(event) = Self::receive_from_channel(reply, cycle) {
                    events.push(event);
                }
            }
        }
        events
    }

    /// Convert a reply packet arriving from a channel into a harness event,
    /// mirroring `Controller::receiveFromChannel` in the original: a `Data`
    /// reply to a read becomes a `RETURN_DATA`-equivalent event; a `Write`
    /// ack becomes a write-complete event. `Erase` acks have no harness
    /// counterpart.
    fn receive_from_channel(pkt: ChannelPacket, cycle: u64) -> Option<HarnessEvent> {
        match pkt.kind {
            PacketKind::Data => Some(HarnessEvent::ReadComplete {
                v_addr: pkt.v_addr,
                payload: pkt.payload,
                package: pkt.package,
                cycle,
            }),
            PacketKind::Write => Some(HarnessEvent::WriteComplete {
                v_addr: pkt.v_addr,
                package: pkt.package,
                cycle,
            }),
            PacketKind::Erase | PacketKind::Read => None,
        }
    }

    pub fn queue_lengths(packages: &[Package]) -> Vec<u64> {
        packages.iter().map(|p| p.channel.outgoing_len() as u64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    fn timing() -> Timing {
        Timing {
            read_time: 4,
            write_time: 4,
            erase_time: 4,
            lookup_time: 1,
            cycle_time_ns: 1.0,
            command_xfer_cycles: 1,
            bus_width_bytes: 8,
        }
    }

    #[test]
    fn data_packet_precedes_write_packet_on_the_same_channel() {
        let geo = Geometry::new(2, 2, 1, 2, 4, 4096).unwrap();
        let mut packages: Vec<Package> = (0..geo.num_packages)
            .map(|_| Package::new(geo.dies_per_package, geo.planes_per_die, geo.pages_per_block))
            .collect();
        let controller = Controller::new();

        let data_pkt = geo.translate(PacketKind::Data, 0x1000, 0).unwrap();
        let write_pkt = geo.translate(PacketKind::Write, 0x1000, 0).unwrap();
        controller.add_packet(&mut packages, data_pkt);
        controller.add_packet(&mut packages, write_pkt);

        let channel = &packages[0].channel;
        assert_eq!(
            channel.outgoing_kinds(),
            vec![PacketKind::Data, PacketKind::Write]
        );
        let _ = timing();
    }
}
