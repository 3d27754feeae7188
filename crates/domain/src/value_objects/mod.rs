pub mod amount;
pub mod percentage;

pub use amount::{Amount, format_units, parse_units};
pub use percentage::Percentage;
