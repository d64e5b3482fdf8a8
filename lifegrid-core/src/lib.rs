//! # lifegrid-core
//!
//! Domain model shared by the Lifegrid client crates.
//!
//! ## Modules
//!
//! - [`cell`]: packed `u32` cell layout (alive flag, colour, weight, dead runs)
//! - [`board`]: board snapshots and the lazy run-length decoder
//! - [`pattern`]: stampable cell masks from the server catalog
//! - [`player`]: roster entries
//! - [`command`]: user intents sent to the server
//!
//! Nothing here touches the network; `lifegrid-collab` maps these types to
//! and from the wire.

pub mod board;
pub mod cell;
pub mod command;
pub mod pattern;
pub mod player;

pub use board::{pack_rows, AliveCell, AliveCells, BoardSnapshot, ChangeToken, DenseBoard, DenseCell};
pub use cell::{weight_to_alpha, PackedCell, Rgb};
pub use command::Command;
pub use pattern::Pattern;
pub use player::Player;
