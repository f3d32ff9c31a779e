//! Error types

use thiserror::Error;

/// A mapping request that can never be satisfied. This indicates a
/// misconfigured buffer size, not a runtime condition, so it is fatal.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("requested mapping of {requested} bytes exceeds total capacity of {capacity} bytes")]
    OutOfSpace { requested: usize, capacity: usize },
}

/// Indicates invalid usage of an API.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("map called while another mapping is still open")]
    AlreadyMapped,

    #[error("no mapping is open")]
    NotMapped,

    #[error("committed {used} bytes but only {reserved} were reserved")]
    CommitTooLarge { used: usize, reserved: usize },

    #[error("index output would overrun the mapped index region")]
    IndexOverflow,

    #[error("flush called before a vertex format was set")]
    NoVertexFormat,

    #[error("batch capacity larger than its stream buffer")]
    BatchTooLarge,
}

/// Displays an error with full backtrace
pub fn full_error_display(err: anyhow::Error) -> String {
    let cont = err
        .chain()
        .skip(1)
        .map(|cause| format!("    caused by: {}", cause))
        .collect::<Vec<String>>()
        .join("\n");

    format!("Error: {}\n{}", err, cont)
}
