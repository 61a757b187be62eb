pub mod commitment;
pub mod engine;
pub mod error;
pub mod round;

pub use commitment::*;
pub use engine::*;
pub use error::*;
pub use round::*;
