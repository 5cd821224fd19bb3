/// Record shapes the engine reads from and writes to the record store
pub mod check;

pub use check::{Check, CheckState, Method, Protocol};
