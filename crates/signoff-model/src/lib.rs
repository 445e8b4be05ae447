//! Core in-memory data model for Signoff.
//!
//! This crate is deliberately free of I/O: it defines cell addressing, the
//! sheet layout (header row + identity column) with the row arithmetic that
//! maps roster positions back to physical sheet rows, the cleaned roster
//! table, the session-scoped signature registry, and the display geometry
//! for embedded signature images.

mod address;
mod display;
mod layout;
mod registry;
mod roster;

pub use address::{col_to_name, name_to_col, A1ParseError, CellRef};
pub use display::{SignatureDisplay, EMU_PER_PIXEL};
pub use layout::SheetLayout;
pub use registry::SignatureRegistry;
pub use roster::{Roster, RosterColumn, RosterError, RosterRow};
