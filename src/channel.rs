//! Channel: serializes bus packets between the Controller and one package's
//! dies. Holds at most one in-flight packet per direction.

use std::collections::VecDeque;

use crate::die::Die;
use crate::packet::{ChannelPacket, PacketKind};
use crate::timing::Timing;

#[derive(Debug, Clone, Default)]
pub struct Channel {
    /// Packets queued by the Controller, awaiting bus transfer to a die.
    outgoing: VecDeque<ChannelPacket>,
    outgoing_xfer_left: u32,

    /// Completed die replies awaiting bus transfer back to the Controller.
    returning: VecDeque<ChannelPacket>,
    return_xfer_left: u32,
}

impl Channel {
    pub fn new() -> Self {
        Channel::default()
    }

    pub fn enqueue(&mut self, pkt: ChannelPacket) {
        self.outgoing.push_back(pkt);
    }

    pub fn outgoing_len(&self) -> usize {
        self.outgoing.len()
    }

    #[cfg(test)]
    pub(crate) fn outgoing_kinds(&self) -> Vec<PacketKind> {
        self.outgoing.iter().map(|p| p.kind).collect()
    }

    fn xfer_cycles(pkt: &ChannelPacket, timing: &Timing, page_size: u32) -> u32 {
        match pkt.kind {
            PacketKind::Data => timing.data_xfer_cycles(page_size),
            _ => timing.command_xfer_cycles,
        }
    }

    /// Tick the channel: advance both directions' countdowns, deliver a
    /// completed forward packet to its addressed die, and return a
    /// completed reply packet if the return path just finished.
    pub fn update(
        &mut self,
        dies: &mut [Die],
        timing: &Timing,
        page_size: u32,
    ) -> Option<ChannelPacket> {
        // Forward direction: Controller -> Die. A command packet is held at
        // the front of the queue (the bus stalls) until its target die is
        // free -- the FTL schedules its own transactions back-to-back with
        // no regard for how long the physical die is still busy with a
        // previous command, so this is the only place that enforces a die
        // never receives two commands at once. `Data` packets only load a
        // plane's register and never occupy the busy countdown, so they are
        // never blocked by it.
        if self.outgoing_xfer_left > 0 {
            self.outgoing_xfer_left -= 1;
        } else if let Some(pkt) = self.outgoing.front() {
            let die_busy = pkt.kind != PacketKind::Data
                && dies.get(pkt.die as usize).map(|d| d.is_busy()).unwrap_or(false);
            if !die_busy {
                let pkt = self.outgoing.pop_front().unwrap();
                if let Some(die) = dies.get_mut(pkt.die as usize) {
                    die.receive(pkt, timing);
                }
                self.outgoing_xfer_left = self
                    .outgoing
                    .front()
                    .map(|next| Self::xfer_cycles(next, timing, page_size))
                    .unwrap_or(0);
            }
        }

        // Every die on this channel ticks independently of bus transfer --
        // a die can be executing a command while the bus is idle or busy
        // with someone else's packet.
        for die in dies.iter_mut() {
            if let Some(reply) = die.update() {
                self.accept_reply(reply);
            }
        }

        // Return direction: Die -> Controller.
        let mut completed = None;
        if self.return_xfer_left > 0 {
            self.return_xfer_left -= 1;
            if self.return_xfer_left == 0 {
                completed = self.returning.pop_front();
            }
        } else if let Some(pkt) = self.returning.front() {
            self.return_xfer_left = Self::xfer_cycles(pkt, timing, page_size).max(1);
        }
        completed
    }

    /// Accept a reply handed back by a die this cycle, queuing it for the
    /// return-path bus transfer.
    pub fn accept_reply(&mut self, pkt: ChannelPacket) {
        self.returning.push_back(pkt);
    }
}
