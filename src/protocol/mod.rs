pub mod commands;
pub mod framing;

pub use commands::ProductInfo;
pub use framing::{CommandFramer, HexBytes};
