//! Application layer: executing protocol requests against local files.

pub mod session;

pub use session::{Session, SessionEnd};
