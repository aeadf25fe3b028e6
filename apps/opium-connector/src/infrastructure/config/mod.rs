//! Configuration loading.

mod settings;

pub use settings::{Credentials, Endpoints, Intervals, Settings};
