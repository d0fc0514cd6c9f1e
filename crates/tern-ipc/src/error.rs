//! Wire decoding errors.

/// Errors that can occur while encoding or decoding a wire structure.
///
/// These errors indicate malformed or inconsistent byte buffers. The kernel
/// maps them onto per-call status codes; they never cross the syscall
/// boundary as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Buffer is too short to contain the fixed header or field.
    #[error("buffer too short: need {needed} bytes, have {available}")]
    TooShort { needed: usize, available: usize },

    /// Declared region lengths do not match the bytes that follow the header.
    #[error("length mismatch: declared {declared} bytes, {available} available")]
    LengthMismatch { declared: usize, available: usize },

    /// Command tag in the header is not the expected one.
    #[error("unexpected command: expected {expected}, got {got}")]
    UnexpectedCommand { expected: u32, got: u32 },

    /// Enum discriminant is not a valid variant.
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: u32 },

    /// Output region is smaller than the layout being written.
    #[error("output buffer too small: need {needed} bytes, capacity {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },
}
