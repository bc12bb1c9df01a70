pub mod traits;

pub use traits::{Transport, TransportError};

#[cfg(test)]
pub use traits::mock;
