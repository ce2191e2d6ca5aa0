//! Pipeline module - preference formatting, supervised conversion, driver.

mod driver;
mod preference;
pub mod supervised;

pub use driver::*;
pub use preference::*;
