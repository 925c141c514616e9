//! Top-level simulator arena: owns every component by field/index, ticks
//! them in leaves-first order, and translates FTL/controller output into
//! `HarnessEvent`s.

use crate::config::Config;
use crate::controller::{Controller, HarnessEvent, Package};
use crate::error::NvSimError;
use crate::ftl::Ftl;
use crate::geometry::Geometry;
use crate::logger::Logger;
use crate::packet::PacketKind;
use crate::timing::{EnergyParams, Timing};
use crate::transaction::Transaction;

/// Per-package idle/access/erase energy, read on demand rather than pushed
/// through a callback -- the Rust substitute for the original's
/// `power_callback` hook.
#[derive(Debug, Clone)]
pub struct PowerSnapshot {
    pub idle_energy: Vec<f64>,
    pub access_energy: Vec<f64>,
    pub erase_energy: Vec<f64>,
}

pub struct Device {
    geometry: Geometry,
    packages: Vec<Package>,
    controller: Controller,
    ftl: Ftl,
    logger: Logger,
    timing: Timing,
    cycle: u64,
}

impl Device {
    pub fn new(config: Config) -> Result<Device, NvSimError> {
        let geometry = Geometry::new(
            config.num_packages,
            config.dies_per_package,
            config.planes_per_die,
            config.blocks_per_plane,
            config.pages_per_block,
            config.nv_page_size,
        )?;

        let timing = Timing {
            read_time: config.read_time,
            write_time: config.write_time,
            erase_time: config.erase_time,
            lookup_time: config.lookup_time,
            cycle_time_ns: config.cycle_time_ns,
            command_xfer_cycles: 1,
            bus_width_bytes: 8,
        };
        let energy = EnergyParams {
            icc1: config.icc1,
            icc2: config.icc2,
            icc3: config.icc3,
            isb2: config.isb2,
            read_i: config.read_i,
            write_i: config.write_i,
            erase_i: config.erase_i,
            standby_i: config.standby_i,
            vcc: config.vcc,
        };

        let packages = (0..geometry.num_packages)
            .map(|_| Package::new(geometry.dies_per_package, geometry.planes_per_die, geometry.pages_per_block))
            .collect();

        let ftl = Ftl::new(geometry.clone(), config.garbage_collect, timing, energy);
        let logger = Logger::new(
            geometry.num_packages,
            config.wear_level_log,
            config.use_epochs,
            config.runtime_write,
            config.log_dir.clone(),
            energy,
            config.cycle_time_ns,
            config.nv_page_size,
        );

        Ok(Device {
            geometry,
            packages,
            controller: Controller::new(),
            ftl,
            logger,
            timing,
            cycle: 0,
        })
    }

    /// Forward a transaction to the FTL's submission queue. Always succeeds
    /// (mirrors `Ftl::addTransaction`).
    pub fn add(&mut self, txn: Transaction) -> bool {
        self.logger.access_start(txn.v_addr, self.cycle);
        self.ftl.add_transaction(txn)
    }

    /// Advance the simulation by one cycle: Dies -> Channels -> Controller
    /// -> FTL -> Logger. Planes have no independent clock; they are driven
    /// synchronously from inside `Die::update`.
    pub fn update(&mut self) -> Result<Vec<HarnessEvent>, NvSimError> {
        self.cycle += 1;

        let events = self.controller.update(&mut self.packages, &self.timing, self.geometry.nv_page_size, self.cycle);

        for event in &events {
            match *event {
                HarnessEvent::ReadComplete { v_addr, package, cycle, .. } => {
                    self.logger.read_mapped();
                    self.logger.access_process(v_addr, package, PacketKind::Read, cycle);
                    self.logger.access_stop(v_addr, v_addr, cycle);
                }
                HarnessEvent::WriteComplete { v_addr, package, cycle } => {
                    self.logger.write_mapped();
                    self.logger.access_process(v_addr, package, PacketKind::Write, cycle);
                    self.logger.access_stop(v_addr, v_addr, cycle);
                }
            }
        }

        let ftl_out = self.ftl.update()?;
        for pkt in ftl_out.packets {
            self.controller.add_packet(&mut self.packages, pkt);
        }

        let mut all_events = events;
        for immediate in ftl_out.immediate_reads {
            self.logger.read_unmapped();
            self.logger.access_process(immediate.v_addr, 0, PacketKind::Read, self.cycle);
            self.logger.access_stop(immediate.v_addr, immediate.v_addr, self.cycle);
            all_events.push(HarnessEvent::ReadComplete {
                v_addr: immediate.v_addr,
                payload: immediate.payload,
                package: 0,
                cycle: self.cycle,
            });
        }

        self.logger.ftl_queue_length(self.ftl.queue_len() as u64);
        self.logger.ctrl_queue_length(Controller::queue_lengths(&self.packages));
        self.logger.update();

        if self.logger_should_snapshot_epoch() {
            let epoch = self.cycle / EPOCH_LENGTH_CYCLES;
            self.logger
                .save_epoch(self.cycle, epoch)
                .unwrap_or_else(|err| log::warn!("failed to record epoch snapshot: {err}"));
        }

        Ok(all_events)
    }

    fn logger_should_snapshot_epoch(&self) -> bool {
        self.use_epochs() && self.cycle % EPOCH_LENGTH_CYCLES == 0
    }

    fn use_epochs(&self) -> bool {
        self.logger.use_epochs_enabled()
    }

    /// Convenience driver: tick `cycles` times, concatenating every
    /// `HarnessEvent` produced.
    pub fn run(&mut self, cycles: u64) -> Result<Vec<HarnessEvent>, NvSimError> {
        let mut events = Vec::new();
        for _ in 0..cycles {
            events.extend(self.update()?);
        }
        Ok(events)
    }

    pub fn power_snapshot(&self) -> PowerSnapshot {
        PowerSnapshot {
            idle_energy: self.ftl.idle_energy.clone(),
            access_energy: self.ftl.access_energy.clone(),
            erase_energy: self.ftl.erase_energy.clone(),
        }
    }

    pub fn stats(&self) -> &Logger {
        &self.logger
    }

    /// Flush the logger's accumulated statistics to `LOG_DIR/NVDIMM.log`
    /// (and `NVDIMM_EPOCH.log` when `USE_EPOCHS` is set and not
    /// `RUNTIME_WRITE`). Catches and warns on `NvSimError::Io` rather than
    /// propagating -- a failure to write the log is not worth aborting the
    /// simulation over.
    pub fn save_log(&self) {
        if let Err(err) = self.logger.save(self.cycle) {
            log::warn!("failed to write simulation log: {err}");
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

/// Epoch length in cycles for the periodic-snapshot feature. Not a config
/// key -- the original leaves epoch boundaries to whatever drives
/// `save_epoch` directly. A fixed cadence lets `Device::update` drive it
/// standalone.
const EPOCH_LENGTH_CYCLES: u64 = 10_000;

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path) -> Config {
        let mut c = Config::default();
        c.log_dir = dir.to_string_lossy().to_string();
        c
    }

    #[test]
    fn single_write_then_read_round_trips_the_payload() {
        let dir = tempfile::tempdir().unwrap();
        let mut device = Device::new(config(dir.path())).unwrap();
        assert!(device.add(Transaction::write(0x1000, 0xAB)));
        let mut events = Vec::new();
        for _ in 0..2000 {
            events.extend(device.update().unwrap());
            if events.iter().any(|e| matches!(e, HarnessEvent::WriteComplete { .. })) {
                break;
            }
        }
        assert!(events.iter().any(|e| matches!(e, HarnessEvent::WriteComplete { v_addr, .. } if *v_addr == 0x1000)));

        assert!(device.add(Transaction::read(0x1000)));
        let mut read_payload = None;
        for _ in 0..2000 {
            for event in device.update().unwrap() {
                if let HarnessEvent::ReadComplete { v_addr, payload, .. } = event {
                    if v_addr == 0x1000 {
                        read_payload = Some(payload);
                    }
                }
            }
            if read_payload.is_some() {
                break;
            }
        }
        assert_eq!(read_payload, Some(0xAB));
    }

    #[test]
    fn unmapped_read_completes_with_the_sentinel_payload() {
        let dir = tempfile::tempdir().unwrap();
        let mut device = Device::new(config(dir.path())).unwrap();
        assert!(device.add(Transaction::read(0x9999)));
        let mut payload = None;
        for _ in 0..100 {
            for event in device.update().unwrap() {
                if let HarnessEvent::ReadComplete { v_addr, payload: p, .. } = event {
                    if v_addr == 0x9999 {
                        payload = Some(p);
                    }
                }
            }
        }
        assert_eq!(payload, Some(crate::constants::UNMAPPED_READ_SENTINEL));
    }

    #[test]
    fn garbage_collection_survives_the_real_channel_and_die_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = config(dir.path());
        c.num_packages = 1;
        c.dies_per_package = 1;
        c.planes_per_die = 1;
        c.blocks_per_plane = 4;
        c.pages_per_block = 4;
        c.nv_page_size = 1;
        let mut device = Device::new(c).unwrap();

        for v in 0..12u64 {
            assert!(device.add(Transaction::write(v, 0xA0 + v)));
        }
        // Long enough for all 12 writes, the GC-triggered migration of
        // block 0's live pages, and the block erase to clear the real
        // channel/die pipeline -- not just the FTL's own queue.
        for _ in 0..20_000 {
            device.update().unwrap();
        }

        assert!(device.add(Transaction::read(8)));
        let mut payload = None;
        for _ in 0..2000 {
            for event in device.update().unwrap() {
                if let HarnessEvent::ReadComplete { v_addr, payload: p, .. } = event {
                    if v_addr == 8 {
                        payload = Some(p);
                    }
                }
            }
            if payload.is_some() {
                break;
            }
        }
        assert_eq!(payload, Some(0xA0 + 8));
    }

    #[test]
    fn power_snapshot_accrues_idle_energy_every_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut device = Device::new(config(dir.path())).unwrap();
        device.update().unwrap();
        device.update().unwrap();
        let snapshot = device.power_snapshot();
        assert!(snapshot.idle_energy.iter().all(|&e| e > 0.0));
    }
}
