//! Platform audio backends.

pub mod audio_output;
mod kira_backend;

pub use kira_backend::KiraBackend;
