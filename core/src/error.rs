use thiserror::Error;

/// Errors the sort engine can raise. Every variant corresponds to a failure
/// kind the engine must distinguish; message formatting for end users happens
/// above this layer, not here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("bad boot sector: {0}")]
    BadBootSector(String),

    #[error("checksum mismatch: {0}")]
    ChecksumMismatch(String),

    #[error("volume is marked dirty")]
    VolumeDirty,

    #[error("device error: {0}")]
    DeviceError(#[from] std::io::Error),

    #[error("cluster chain exceeds the volume's chain length bound ({bound})")]
    ChainTooLong { bound: u32 },

    #[error("cycle detected in cluster chain at cluster {cluster}")]
    CycleDetected { cluster: u32 },

    #[error("free (unallocated) cluster {cluster} encountered before end-of-chain")]
    FreeInChain { cluster: u32 },

    #[error("cluster {cluster} is out of range (cluster count + 2 = {limit})")]
    OutOfRange { cluster: u32, limit: u32 },

    #[error("exFAT secondary count out of range: {0}")]
    BadSecondaryCount(u8),

    #[error("exFAT entry set incomplete: expected {expected} secondaries, found {found}")]
    IncompleteSet { expected: u8, found: u8 },

    #[error("long-name entry list has no short entry to attach to")]
    OrphanLongEntries,

    #[error("long-name entry ordinal {found} does not match expected {expected}")]
    BadOrdinal { expected: u8, found: u8 },

    #[error("volume is mounted; refusing to open without --force")]
    MountedRefused,

    #[error("unsupported option combination: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
