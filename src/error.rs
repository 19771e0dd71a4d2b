//! Error types raised by cartridge initialisation and by the running core.
//!
//! Runtime errors are terminal: once `Host::on_error` has been invoked (or
//! `Cpu::step`/`GameBoy::run_frame` has returned `Err`), the host must not
//! call back into the core — it makes no guarantee about subsequent state.

use thiserror::Error;

/// Failure modes of [`crate::GameBoy::init`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    #[error("cartridge type byte {code:#04x} maps to an unsupported MBC")]
    CartridgeUnsupported { code: u8 },
    #[error("header checksum mismatch: rom declares {expected:#04x}, computed {computed:#04x}")]
    InvalidChecksum { expected: u8, computed: u8 },
}

/// Terminal run-time failures, reported through [`crate::host::Host::on_error`]
/// and also returned from `step`/`run_frame` so callers can `?`-propagate.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("invalid opcode {0:#04x} fetched")]
    InvalidOpcode(u8),
    /// Defensive: address decoding fell through every case. Unreachable with
    /// correct decoding, kept only because the reference treats it as a
    /// distinct, reportable condition rather than a panic.
    #[error("invalid read: address decoding fell through")]
    InvalidRead,
}

/// Returned by [`crate::host::Host::serial_rx`] when no peripheral answers.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("no serial peripheral connected")]
pub struct NoConnection;
