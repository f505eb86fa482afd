//! Command implementations

mod parse;
mod status;

pub use parse::run_parse;
pub use status::run_status;
