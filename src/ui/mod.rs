//! Terminal status display and console input
//!
//! The display follows the engine from its own thread:
//! - beat and bar progress bars
//! - transport state, tempo and per-sink connectivity
//!
//! Input is line based: each line read from stdin maps to at most one
//! transport command.

pub mod input;
mod inspector;
mod progress;

pub use input::{map_input_line, InputAction};
pub use inspector::{render_status_line, run_status_display};
pub use progress::{create_bar_progress, create_beat_progress, create_transport_spinner};
