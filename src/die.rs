//! Die: a handful of Planes plus a single busy countdown. Command execution
//! within a die is strictly serialized -- the channel that feeds it is
//! responsible for never dispatching a second command while one is still
//! running.

use crate::packet::{ChannelPacket, PacketKind};
use crate::plane::Plane;
use crate::timing::Timing;

#[derive(Debug, Clone)]
pub struct Die {
    planes: Vec<Plane>,
    busy_countdown: u32,
    pending: Option<ChannelPacket>,
}

impl Die {
    pub fn new(planes_per_die: u32, pages_per_block: u32) -> Self {
        Die {
            planes: (0..planes_per_die).map(|_| Plane::new(pages_per_block)).collect(),
            busy_countdown: 0,
            pending: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy_countdown > 0 || self.pending.is_some()
    }

    /// Accept a packet arriving over the channel. `Data` packets load the
    /// target plane's data register immediately, at no cycle cost -- they
    /// are not commands, just the register write that a following `Write`
    /// command consumes. Command packets arm the busy countdown.
    pub fn receive(&mut self, pkt: ChannelPacket, timing: &Timing) {
        if pkt.kind == PacketKind::Data {
            if let Some(plane) = self.planes.get_mut(pkt.plane as usize) {
                plane.store_in_data(pkt);
            }
            return;
        }

        debug_assert!(!self.is_busy(), "die dispatched a second command while busy");
        self.busy_countdown = match pkt.kind {
            PacketKind::Read => timing.read_time,
            PacketKind::Write => timing.write_time,
            PacketKind::Erase => timing.erase_time,
            PacketKind::Data => unreachable!(),
        };
        self.pending = Some(pkt);
    }

    /// Tick the die. Returns the completed reply packet on the cycle the
    /// countdown reaches zero.
    pub fn update(&mut self) -> Option<ChannelPacket> {
        if self.busy_countdown > 0 {
            self.busy_countdown -= 1;
            return None;
        }
        let pkt = self.pending.take()?;
        let plane = self.planes.get_mut(pkt.plane as usize)?;
        let reply = match pkt.kind {
            PacketKind::Read => plane.read(pkt),
            PacketKind::Write => {
                plane.write(&pkt);
                pkt
            }
            PacketKind::Erase => {
                plane.erase(&pkt);
                pkt
            }
            PacketKind::Data => unreachable!(),
        };
        Some(reply)
    }
}
