pub mod beans;
pub mod common;
pub mod information_view;
pub mod instance;
pub mod rest;
pub mod types;

pub use beans::*;
pub use common::*;
pub use information_view::*;
pub use instance::*;
pub use rest::*;
pub use types::*;
