mod error;

pub use error::{BisectError, BisectResult};
