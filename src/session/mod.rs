//! The analysis session: view-state controller and the terminal driver
//! that feeds it user commands.

pub mod controller;
pub mod driver;

pub use controller::ViewController;
pub use driver::{Session, SessionOptions};
