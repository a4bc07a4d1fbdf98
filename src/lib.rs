pub mod archive;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod executor;
pub mod models;
pub mod notify;
pub mod planner;
pub mod sync;
pub mod tool;
pub mod transcribe;

#[cfg(test)]
pub(crate) mod test_support;
