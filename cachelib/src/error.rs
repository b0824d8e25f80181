use thiserror::Error;

/// Raised once, when a cache is constructed from an invalid geometry or policy choice.
///
/// A cache can never exist in an invalid geometric state, so none of these are recoverable
/// for the cache being built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{name} must be greater than zero")]
    ZeroParameter { name: &'static str },

    #[error("{name} must be a power of two, got {value}")]
    NotPowerOfTwo { name: &'static str, value: u64 },

    #[error("cache size {size} is not divisible by block size {block_size} x associativity {associativity}")]
    UnevenSize {
        size: u64,
        block_size: u64,
        associativity: u64,
    },

    #[error("address width must be between 1 and 64 bits, got {0}")]
    AddressWidth(u32),

    #[error("{address_bits}-bit addresses cannot hold {offset_bits} offset bits and {index_bits} index bits")]
    AddressTooNarrow {
        address_bits: u32,
        offset_bits: u32,
        index_bits: u32,
    },

    #[error("pseudo-LRU needs a power-of-two way count between 2 and 64, got {0}")]
    UnsupportedPseudoLruWays(usize),
}

/// A single trace entry that could not be understood. Readers log these and move on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceFormatError {
    #[error("line {line}: not valid UTF-8")]
    InvalidEncoding { line: usize },

    #[error("line {line}: expected an access kind and an address")]
    MissingField { line: usize },

    #[error("line {line}: unknown access kind {token:?}")]
    UnknownAccessKind { line: usize, token: String },

    #[error("line {line}: couldn't parse address {token:?}")]
    BadAddress { line: usize, token: String },

    #[error("line {line}: couldn't parse way index {token:?}")]
    BadWay { line: usize, token: String },

    #[error("line {line}: way {way} is out of range for a {ways}-way set")]
    WayOutOfRange { line: usize, way: usize, ways: usize },
}

/// Errors surfaced by the simulator driver and the command line front end.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid cache configuration for {name:?}: {source}")]
    Configuration {
        name: String,
        #[source]
        source: ConfigurationError,
    },

    #[error("the configuration doesn't define any caches")]
    NoCaches,

    #[error("couldn't parse the configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
