use thiserror::Error;

/// Fatal modeling errors. None of these are runtime faults to be retried --
/// a simulation that hits one has a configuration bug and must stop.
#[derive(Debug, Error)]
pub enum NvSimError {
    #[error("physical address {addr:#x} is out of range (total size {total:#x})")]
    AddressOutOfRange { addr: u64, total: u64 },

    #[error("geometry parameter `{name}` = {value} is not a power of two")]
    NotPowerOfTwo { name: &'static str, value: u64 },

    #[error("config is missing required key `{0}`")]
    MissingKey(&'static str),

    #[error("config key `{key}` has invalid value `{value}`")]
    InvalidValue { key: String, value: String },

    #[error("no free page available and garbage collection could not reclaim one")]
    AllocationExhausted,

    #[error("unknown transaction kind reached the FTL")]
    UnknownTransactionKind,

    /// Covers both the `LogIOFailure` disposition (logger call sites catch
    /// and `log::warn!` this, then continue) and a failure to read the
    /// config file itself (fatal: propagated to the caller of
    /// `Config::from_path`).
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
