/// Payload returned for a `DATA_READ` of a `vAddr` that was never written.
/// Unmapped reads are not an error (see `NvSimError`); this sentinel is
/// delivered to the harness as an ordinary `HarnessEvent::ReadComplete`.
pub const UNMAPPED_READ_SENTINEL: u64 = 0xdead_beef;

/// Garbage collection fires when `used_page_count / TOTAL_SIZE` exceeds this
/// ratio. `TOTAL_SIZE` is a byte count while `used_page_count` is a page
/// count, so this is not actually a utilization fraction -- it is carried
/// over bit-for-bit from the original `Ftl::checkGC`, which has the same
/// mismatched units. At realistic geometries (`NV_PAGE_SIZE` in the
/// thousands) this makes the threshold fire far later than 70% page
/// utilization would suggest. See DESIGN.md for the preserved-quirk note.
pub const GC_TRIGGER_RATIO: f64 = 0.70;

pub const LOG_BITS_IN_BYTE: u32 = 3;
