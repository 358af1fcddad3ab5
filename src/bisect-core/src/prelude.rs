//! Prelude for the bisect core library.
//!
//! Re-exports the items most callers need.

pub use common_error::{BisectError, BisectResult};

pub use crate::array::ChunkedArray;
pub use crate::kernels::search_sorted::{search_sorted, search_sorted_multi_array};
