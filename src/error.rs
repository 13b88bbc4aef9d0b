//! Error taxonomy for the emulation core.
//!
//! Host I/O failures (missing ROM, missing script) are fatal and should be
//! surfaced to the caller as `anyhow::Error` at the binary boundary. Every
//! other variant here is non-fatal by convention: the driver logs it and
//! continues, per the "nothing is retried, everything is reported" rule.

use thiserror::Error;

/// Errors raised while stepping or configuring the machine.
#[derive(Debug, Error)]
pub enum MachineError {
    /// The CPU fetched a byte with no defined 8080 decoding. Unlike the
    /// other variants, this one is fatal: the model is meant to be complete
    /// for 8080, so hitting this means either corrupt firmware or a gap in
    /// the decoder.
    #[error("unknown opcode {opcode:02x} at pc {pc:04x}")]
    UnknownOpcode { pc: u16, opcode: u8 },

    /// A ROM, character ROM, or script file could not be read.
    #[error("failed to read {path}: {source}")]
    HostIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A command-script line didn't match any known command.
    #[error("malformed script command: {0}")]
    ScriptError(String),

    /// The character generator ROM has no data for the requested scan row.
    #[error("missing character ROM scan row {row} for glyph {code:#04x}")]
    MissingGlyphRow { code: u8, row: u8 },
}
