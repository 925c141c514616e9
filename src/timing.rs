//! Cycle-latency and energy-current parameters, all sourced from the
//! config file except the two bus constants noted below.

#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub read_time: u32,
    pub write_time: u32,
    pub erase_time: u32,
    pub lookup_time: u32,
    /// Nanoseconds per simulated cycle.
    pub cycle_time_ns: f64,

    /// Fixed bus-transfer cost, in cycles, for a command packet (Read,
    /// Write, Erase). Not a config key -- there is no per-command
    /// bus-overhead setting to expose, so this is a constant rather than an
    /// invented config field. See DESIGN.md for the rationale.
    pub command_xfer_cycles: u32,
    /// Bus width in bytes, used to compute a DATA packet's transfer time as
    /// `NV_PAGE_SIZE / bus_width_bytes` cycles. Also not a config key, for
    /// the same reason.
    pub bus_width_bytes: u32,
}

impl Timing {
    pub fn data_xfer_cycles(&self, page_size: u32) -> u32 {
        (page_size / self.bus_width_bytes).max(1)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnergyParams {
    pub icc1: f64,
    pub icc2: f64,
    pub icc3: f64,
    pub isb2: f64,
    pub read_i: f64,
    pub write_i: f64,
    pub erase_i: f64,
    pub standby_i: f64,
    pub vcc: f64,
}
