//! Cycle-level functional emulation core for the DEC VT100 serial video
//! terminal.
//!
//! # Architecture
//!
//! - `cpu`: Intel 8080 CPU, decoded against a `bus::Bus` trait object so it
//!   never depends on a concrete peripheral set.
//! - `memory`: ROM/RAM address decoding, including the AVO-absent attribute
//!   fixup and the optional RAM-bug byte.
//! - `nvr`: the ER1400 bit-serial non-volatile RAM.
//! - `peripherals`: PUSART, keyboard scanner, interrupt network, DC011/DC012
//!   video timing chips.
//! - `cadence`: the VBI/RECI/KBDI/LBA7 deadline scheduler.
//! - `raster`: the DMA-driven display-list walk that turns video RAM into
//!   pixels.
//! - `coverage`: the EXEC/READ/WRITE/DATA/SYMBOL/UNREACH/DMA coverage vector
//!   and the address watch table.
//! - `symbols`: symbol/equate table loading and the end-of-run uncovered-ROM
//!   span report.
//! - `machine`: `Machine`, which owns all of the above and implements `Bus`
//!   for itself.
//! - `script`: `ScriptDriver`, which replays a command script against a
//!   `Machine`.

pub mod bus;
pub mod cadence;
pub mod config;
pub mod coverage;
pub mod cpu;
pub mod error;
pub mod machine;
pub mod memory;
pub mod nvr;
pub mod peripherals;
pub mod raster;
pub mod script;
pub mod symbols;

pub use error::MachineError;
pub use machine::Machine;
