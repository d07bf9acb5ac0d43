//! Data models
//!
//! Each sub-module covers one part of the staging workflow.

mod diff;
mod export;
mod journal;
mod upload;

pub use diff::*;
pub use export::*;
pub use journal::*;
pub use upload::*;
