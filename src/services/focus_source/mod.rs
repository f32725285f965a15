//! Focus sources: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for noticing that the
//! active window changed and reporting the raw (class, title) pair to a
//! WindowHandler. They MUST NOT normalize identities, read rules or talk to
//! keyd: all of that belongs to the dispatcher.

mod dry_run;
mod kde;
mod r#trait;
mod xdotool;

pub use self::r#trait::{detect_focus_source, Detection};
