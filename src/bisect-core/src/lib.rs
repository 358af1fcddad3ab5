pub mod array;
pub mod kernels;
pub mod prelude;
