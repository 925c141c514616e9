//! Simulation-wide statistics: access counters, latency accumulators, queue
//! depth samples, energy accounting, and the section-based log file format,
//! grounded on `Logger.cpp`/`GCLogger.cpp`.

use std::collections::{HashMap, VecDeque};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::NvSimError;
use crate::packet::PacketKind;
use crate::timing::EnergyParams;

#[derive(Debug, Clone, Copy)]
struct AccessEntry {
    start: u64,
    op: PacketKind,
    process: u64,
    package: u32,
}

/// One completed epoch's counters, already delta'd against the previous
/// epoch the way `Logger::save_epoch` does in the original.
#[derive(Debug, Clone, Default)]
pub struct EpochEntry {
    pub epoch: u64,
    pub cycle: u64,
    pub num_accesses: u64,
    pub num_reads: u64,
    pub num_writes: u64,
    pub num_unmapped: u64,
    pub num_mapped: u64,
    pub num_read_unmapped: u64,
    pub num_read_mapped: u64,
    pub num_write_unmapped: u64,
    pub num_write_mapped: u64,
    pub average_read_latency: u64,
    pub average_write_latency: u64,
    pub average_queue_latency: u64,
    pub ftl_queue_length: u64,
    pub ctrl_queue_length: Vec<u64>,
    pub idle_energy: Vec<f64>,
    pub access_energy: Vec<f64>,
    pub writes_per_address: HashMap<u64, u64>,
}

/// Accumulates the counters and latency sums `Logger::save` reports, plus
/// an independent idle/access energy track driven by `READ_I`/`WRITE_I`/
/// `ERASE_I`/`STANDBY_I` -- distinct from the FTL's own `ICC1`/`ICC2`/
/// `ICC3`/`ISB2` accumulators. The original keeps both; so do we.
pub struct Logger {
    num_accesses: u64,
    num_reads: u64,
    num_writes: u64,
    num_unmapped: u64,
    num_mapped: u64,
    num_read_unmapped: u64,
    num_read_mapped: u64,
    num_write_unmapped: u64,
    num_write_mapped: u64,

    average_read_latency: u64,
    average_write_latency: u64,
    average_queue_latency: u64,

    ftl_queue_length: u64,
    ctrl_queue_length: Vec<u64>,

    idle_energy: Vec<f64>,
    access_energy: Vec<f64>,

    access_queue: VecDeque<(u64, u64)>,
    access_map: HashMap<u64, AccessEntry>,

    wear_level_log: bool,
    writes_per_address: HashMap<u64, u64>,

    use_epochs: bool,
    runtime_write: bool,
    epoch_queue: VecDeque<EpochEntry>,
    last_epoch: EpochEntry,

    log_dir: PathBuf,
    energy: EnergyParams,
    cycle_time_ns: f64,
    nv_page_size: u32,
}

impl Logger {
    pub fn new(
        num_packages: u32,
        wear_level_log: bool,
        use_epochs: bool,
        runtime_write: bool,
        log_dir: impl Into<PathBuf>,
        energy: EnergyParams,
        cycle_time_ns: f64,
        nv_page_size: u32,
    ) -> Self {
        let n = num_packages as usize;
        Logger {
            num_accesses: 0,
            num_reads: 0,
            num_writes: 0,
            num_unmapped: 0,
            num_mapped: 0,
            num_read_unmapped: 0,
            num_read_mapped: 0,
            num_write_unmapped: 0,
            num_write_mapped: 0,
            average_read_latency: 0,
            average_write_latency: 0,
            average_queue_latency: 0,
            ftl_queue_length: 0,
            ctrl_queue_length: vec![0; n],
            idle_energy: vec![0.0; n],
            access_energy: vec![0.0; n],
            access_queue: VecDeque::new(),
            access_map: HashMap::new(),
            wear_level_log,
            writes_per_address: HashMap::new(),
            use_epochs,
            runtime_write,
            epoch_queue: VecDeque::new(),
            last_epoch: EpochEntry::default(),
            log_dir: log_dir.into(),
            energy,
            cycle_time_ns,
            nv_page_size,
        }
    }

    /// Add this cycle's idle-energy contribution. Called once per simulated
    /// cycle regardless of activity.
    pub fn update(&mut self) {
        for e in self.idle_energy.iter_mut() {
            *e += self.energy.standby_i;
        }
    }

    pub fn access_start(&mut self, v_addr: u64, cycle: u64) {
        self.access_queue.push_back((v_addr, cycle));
    }

    /// Move an address from the submission queue into the in-flight map,
    /// recording queue latency. `op` distinguishes `Read`/`Write` for the
    /// eventual `access_stop` energy charge.
    pub fn access_process(&mut self, v_addr: u64, package: u32, op: PacketKind, cycle: u64) {
        let position = self.access_queue.iter().position(|&(addr, _)| addr == v_addr);
        let start = match position {
            Some(pos) => {
                let (_, start) = self.access_queue.remove(pos).unwrap();
                start
            }
            None => {
                log::warn!("access_process for address {v_addr:#x} not found in access_queue");
                cycle
            }
        };
        self.access_map.insert(
            v_addr,
            AccessEntry {
                start,
                op,
                process: cycle,
                package,
            },
        );
        self.average_queue_latency += cycle.saturating_sub(start);
    }

    pub fn access_stop(&mut self, v_addr: u64, p_addr: u64, cycle: u64) {
        let entry = match self.access_map.remove(&v_addr) {
            Some(e) => e,
            None => {
                log::warn!("access_stop for address {v_addr:#x} not found in access_map");
                return;
            }
        };
        let latency = cycle.saturating_sub(entry.start);
        match entry.op {
            PacketKind::Read => {
                self.access_energy[entry.package as usize] +=
                    (self.energy.read_i - self.energy.standby_i) * latency as f64 / 2.0;
                self.num_accesses += 1;
                self.num_reads += 1;
                self.average_read_latency += latency;
            }
            _ => {
                self.access_energy[entry.package as usize] +=
                    (self.energy.write_i - self.energy.standby_i) * latency as f64 / 2.0;
                self.num_accesses += 1;
                self.num_writes += 1;
                self.average_write_latency += latency;
                if self.wear_level_log {
                    *self.writes_per_address.entry(p_addr).or_insert(0) += 1;
                }
            }
        }
    }

    pub fn read_mapped(&mut self) {
        self.num_mapped += 1;
        self.num_read_mapped += 1;
    }

    pub fn read_unmapped(&mut self) {
        self.num_unmapped += 1;
        self.num_read_unmapped += 1;
    }

    pub fn write_mapped(&mut self) {
        self.num_mapped += 1;
        self.num_write_mapped += 1;
    }

    pub fn ftl_queue_length(&mut self, length: u64) {
        self.ftl_queue_length = length;
    }

    pub fn ctrl_queue_length(&mut self, lengths: Vec<u64>) {
        self.ctrl_queue_length = lengths;
    }

    pub fn use_epochs_enabled(&self) -> bool {
        self.use_epochs
    }

    pub fn num_accesses(&self) -> u64 {
        self.num_accesses
    }

    pub fn num_reads(&self) -> u64 {
        self.num_reads
    }

    pub fn num_writes(&self) -> u64 {
        self.num_writes
    }

    fn unmapped_rate(&self) -> f64 {
        divide(self.num_unmapped as f64, self.num_accesses as f64)
    }

    fn read_unmapped_rate(&self) -> f64 {
        divide(self.num_read_unmapped as f64, self.num_reads as f64)
    }

    fn write_unmapped_rate(&self) -> f64 {
        divide(self.num_write_unmapped as f64, self.num_writes as f64)
    }

    fn calc_throughput(&self, cycles: u64, accesses: u64) -> f64 {
        if cycles == 0 {
            return 0.0;
        }
        (accesses as f64 / cycles as f64) * (1.0 / (self.cycle_time_ns * 1e-9)) * self.nv_page_size as f64
    }

    /// Write the full-simulation log to `NVDIMM.log` under `log_dir`,
    /// truncating unless `RUNTIME_WRITE` is set.
    pub fn save(&self, cycle: u64) -> Result<(), NvSimError> {
        let path = self.log_dir.join("NVDIMM.log");
        let mut file = open_log_file(&path, self.runtime_write)?;

        writeln!(file, "NVDIMM Log")?;
        writeln!(file)?;
        writeln!(file, "Data for Full Simulation:")?;
        writeln!(file, "===========================")?;
        self.write_section(&mut file, cycle, &self.snapshot(cycle))?;

        if self.use_epochs && !self.runtime_write {
            self.flush_epochs()?;
        }
        Ok(())
    }

    /// Write every accumulated (non-`RUNTIME_WRITE`) epoch delta to
    /// `LOG_DIR/NVDIMM_EPOCH.log` in one pass, oldest first.
    fn flush_epochs(&self) -> Result<(), NvSimError> {
        let path = self.log_dir.join("NVDIMM_EPOCH.log");
        let mut file = open_log_file(&path, false)?;
        for entry in self.epoch_queue.iter().rev() {
            writeln!(file)?;
            writeln!(file, "Data for Epoch: {}", entry.epoch)?;
            writeln!(file, "===========================")?;
            self.write_section(&mut file, entry.cycle, entry)?;
            writeln!(file, "-------------------------------------------------")?;
        }
        Ok(())
    }

    fn snapshot(&self, cycle: u64) -> EpochEntry {
        EpochEntry {
            epoch: 0,
            cycle,
            num_accesses: self.num_accesses,
            num_reads: self.num_reads,
            num_writes: self.num_writes,
            num_unmapped: self.num_unmapped,
            num_mapped: self.num_mapped,
            num_read_unmapped: self.num_read_unmapped,
            num_read_mapped: self.num_read_mapped,
            num_write_unmapped: self.num_write_unmapped,
            num_write_mapped: self.num_write_mapped,
            average_read_latency: self.average_read_latency,
            average_write_latency: self.average_write_latency,
            average_queue_latency: self.average_queue_latency,
            ftl_queue_length: self.ftl_queue_length,
            ctrl_queue_length: self.ctrl_queue_length.clone(),
            idle_energy: self.idle_energy.clone(),
            access_energy: self.access_energy.clone(),
            writes_per_address: self.writes_per_address.clone(),
        }
    }

    fn write_section(
        &self,
        file: &mut std::fs::File,
        cycle: u64,
        entry: &EpochEntry,
    ) -> Result<(), NvSimError> {
        writeln!(file)?;
        writeln!(file, "Access Data:")?;
        writeln!(file, "========================")?;
        writeln!(file, "Cycles Simulated: {}", cycle)?;
        writeln!(file, "Accesses: {}", entry.num_accesses)?;
        writeln!(file, "Reads completed: {}", entry.num_reads)?;
        writeln!(file, "Writes completed: {}", entry.num_writes)?;
        writeln!(file, "Number of Unmapped Accesses: {}", entry.num_unmapped)?;
        writeln!(file, "Number of Mapped Accesses: {}", entry.num_mapped)?;
        writeln!(file, "Number of Unmapped Reads: {}", entry.num_read_unmapped)?;
        writeln!(file, "Number of Mapped Reads: {}", entry.num_read_mapped)?;
        writeln!(file, "Number of Unmapped Writes: {}", entry.num_write_unmapped)?;
        writeln!(file, "Number of Mapped Writes: {}", entry.num_write_mapped)?;
        writeln!(file, "Unmapped Rate: {}", self.unmapped_rate())?;
        writeln!(file, "Read Unmapped Rate: {}", self.read_unmapped_rate())?;
        writeln!(file, "Write Unmapped Rate: {}", self.write_unmapped_rate())?;

        writeln!(file)?;
        writeln!(file, "Throughput and Latency Data:")?;
        writeln!(file, "========================")?;
        let read_latency = divide(entry.average_read_latency as f64, entry.num_reads as f64);
        let write_latency = divide(entry.average_write_latency as f64, entry.num_writes as f64);
        let queue_latency = divide(entry.average_queue_latency as f64, entry.num_accesses as f64);
        writeln!(
            file,
            "Average Read Latency: {read_latency} cycles ({} ns)",
            read_latency * self.cycle_time_ns
        )?;
        writeln!(
            file,
            "Average Write Latency: {write_latency} cycles ({} ns)",
            write_latency * self.cycle_time_ns
        )?;
        writeln!(
            file,
            "Average Queue Latency: {queue_latency} cycles ({} ns)",
            queue_latency * self.cycle_time_ns
        )?;
        writeln!(
            file,
            "Total Throughput: {} KB/sec",
            self.calc_throughput(entry.cycle, entry.num_accesses)
        )?;
        writeln!(
            file,
            "Read Throughput: {} KB/sec",
            self.calc_throughput(entry.cycle, entry.num_reads)
        )?;
        writeln!(
            file,
            "Write Throughput: {} KB/sec",
            self.calc_throughput(entry.cycle, entry.num_writes)
        )?;

        writeln!(file)?;
        writeln!(file, "Queue Length Data:")?;
        writeln!(file, "========================")?;
        writeln!(file, "Length of Ftl Queue: {}", entry.ftl_queue_length)?;
        for (i, length) in entry.ctrl_queue_length.iter().enumerate() {
            writeln!(file, "Length of Controller Queue for Package {}: {}", i, length)?;
        }

        if self.wear_level_log {
            writeln!(file)?;
            writeln!(file, "Write Frequency Data:")?;
            writeln!(file, "========================")?;
            for (addr, count) in &entry.writes_per_address {
                writeln!(file, "Address {}: {} writes", addr, count)?;
            }
        }

        writeln!(file)?;
        writeln!(file, "Power Data:")?;
        writeln!(file, "========================")?;
        for (i, (idle, access)) in entry.idle_energy.iter().zip(&entry.access_energy).enumerate() {
            let total = (idle + access) * self.energy.vcc;
            writeln!(file, "Package: {}", i)?;
            writeln!(
                file,
                "Accumulated Idle Energy: {} mJ",
                idle * self.energy.vcc * (self.cycle_time_ns * 1e-9)
            )?;
            writeln!(
                file,
                "Accumulated Access Energy: {} mJ",
                access * self.energy.vcc * (self.cycle_time_ns * 1e-9)
            )?;
            writeln!(file, "Total Energy: {} mJ", total * (self.cycle_time_ns * 1e-9))?;
            writeln!(file)?;
            if entry.cycle != 0 {
                writeln!(file, "Average Idle Power: {} mW", idle * self.energy.vcc / entry.cycle as f64)?;
                writeln!(file, "Average Access Power: {} mW", access * self.energy.vcc / entry.cycle as f64)?;
                writeln!(file, "Average Power: {} mW", total / entry.cycle as f64)?;
            } else {
                writeln!(file, "Average Idle Power: 0 mW")?;
                writeln!(file, "Average Access Power: 0 mW")?;
                writeln!(file, "Average Power: 0 mW")?;
            }
            writeln!(file)?;
        }
        Ok(())
    }

    /// Snapshot the current counters as a new epoch, delta'd against the
    /// previous one, mirroring `Logger::save_epoch`.
    pub fn save_epoch(&mut self, cycle: u64, epoch: u64) -> Result<(), NvSimError> {
        let mut this_epoch = self.snapshot(cycle);
        this_epoch.epoch = epoch;
        let full_snapshot = this_epoch.clone();

        if !self.epoch_queue.is_empty() || epoch != 0 {
            this_epoch.cycle = this_epoch.cycle.saturating_sub(self.last_epoch.cycle);
            this_epoch.num_accesses = this_epoch.num_accesses.saturating_sub(self.last_epoch.num_accesses);
            this_epoch.num_reads = this_epoch.num_reads.saturating_sub(self.last_epoch.num_reads);
            this_epoch.num_writes = this_epoch.num_writes.saturating_sub(self.last_epoch.num_writes);
            this_epoch.num_unmapped = this_epoch.num_unmapped.saturating_sub(self.last_epoch.num_unmapped);
            this_epoch.num_mapped = this_epoch.num_mapped.saturating_sub(self.last_epoch.num_mapped);
            this_epoch.num_read_unmapped =
                this_epoch.num_read_unmapped.saturating_sub(self.last_epoch.num_read_unmapped);
            this_epoch.num_read_mapped =
                this_epoch.num_read_mapped.saturating_sub(self.last_epoch.num_read_mapped);
            this_epoch.num_write_unmapped =
                this_epoch.num_write_unmapped.saturating_sub(self.last_epoch.num_write_unmapped);
            this_epoch.num_write_mapped =
                this_epoch.num_write_mapped.saturating_sub(self.last_epoch.num_write_mapped);
            this_epoch.average_read_latency = this_epoch
                .average_read_latency
                .saturating_sub(self.last_epoch.average_read_latency);
            this_epoch.average_write_latency = this_epoch
                .average_write_latency
                .saturating_sub(self.last_epoch.average_write_latency);
            this_epoch.average_queue_latency = this_epoch
                .average_queue_latency
                .saturating_sub(self.last_epoch.average_queue_latency);
            for i in 0..this_epoch.idle_energy.len() {
                this_epoch.idle_energy[i] -= self.last_epoch.idle_energy.get(i).copied().unwrap_or(0.0);
                this_epoch.access_energy[i] -= self.last_epoch.access_energy.get(i).copied().unwrap_or(0.0);
            }
        }

        if self.runtime_write {
            let path = self.log_dir.join("NVDIMM_EPOCH.log");
            let mut file = open_log_file(&path, epoch != 0)?;
            writeln!(file)?;
            writeln!(file, "Data for Epoch: {}", epoch)?;
            writeln!(file, "===========================")?;
            self.write_section(&mut file, cycle, &this_epoch)?;
            writeln!(file, "-------------------------------------------------")?;
        } else {
            self.epoch_queue.push_front(this_epoch);
        }

        self.last_epoch = full_snapshot;
        Ok(())
    }
}

fn open_log_file(path: &Path, append: bool) -> Result<std::fs::File, NvSimError> {
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(NvSimError::from)
}

fn divide(num: f64, denom: f64) -> f64 {
    if denom == 0.0 {
        0.0
    } else {
        num / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger_in(dir: &Path) -> Logger {
        Logger::new(
            2,
            false,
            false,
            false,
            dir,
            EnergyParams {
                icc1: 1.0,
                icc2: 1.0,
                icc3: 1.0,
                isb2: 0.1,
                read_i: 1.0,
                write_i: 1.0,
                erase_i: 1.0,
                standby_i: 0.1,
                vcc: 1.8,
            },
            1.0,
            4096,
        )
    }

    #[test]
    fn access_lifecycle_updates_read_counters_and_latency() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = logger_in(dir.path());
        log.access_start(0x1000, 0);
        log.access_process(0x1000, 0, PacketKind::Read, 10);
        log.access_stop(0x1000, 0x1000, 50);
        assert_eq!(log.num_reads, 1);
        assert_eq!(log.num_accesses, 1);
        assert_eq!(log.average_queue_latency, 10);
        assert_eq!(log.average_read_latency, 50);
    }

    #[test]
    fn wear_level_log_tracks_write_frequency_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = logger_in(dir.path());
        log.wear_level_log = true;
        log.access_start(0x1000, 0);
        log.access_process(0x1000, 0, PacketKind::Write, 0);
        log.access_stop(0x1000, 0x2000, 100);
        assert_eq!(log.writes_per_address.get(&0x2000), Some(&1));
    }

    #[test]
    fn save_epoch_deltas_against_the_previous_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = logger_in(dir.path());
        log.num_reads = 5;
        log.save_epoch(100, 0).unwrap();
        log.num_reads = 8;
        log.save_epoch(150, 1).unwrap();
        let deltas: Vec<_> = log.epoch_queue.iter().map(|e| e.num_reads).collect();
        assert_eq!(deltas, vec![3, 5]);
    }

    #[test]
    fn save_writes_the_expected_log_sections_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = logger_in(dir.path());
        log.access_start(0x1000, 0);
        log.access_process(0x1000, 0, PacketKind::Write, 5);
        log.access_stop(0x1000, 0x1000, 20);
        log.save(100).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("NVDIMM.log")).unwrap();
        assert!(contents.contains("NVDIMM Log"));
        assert!(contents.contains("Writes completed: 1"));
        assert!(contents.contains("Power Data:"));
    }
}
