use arrow2::{
    array::Array,
    datatypes::{DataType, Field},
};
use common_error::{BisectError, BisectResult};

use crate::{array::ChunkedArray, kernels::search_sorted};

impl ChunkedArray {
    /// Lower-bound positions of `keys` within this sorted column. The output
    /// is a UInt64 column named "indices" chunked exactly like `keys`.
    pub fn search_sorted(&self, keys: &Self, descending: bool) -> BisectResult<Self> {
        if self.data_type() != keys.data_type() {
            return Err(BisectError::TypeError(format!(
                "Mismatch of data types in search_sorted: data: {:?} vs keys: {:?}",
                self.data_type(),
                keys.data_type()
            )));
        }
        let data_chunks: Vec<&dyn Array> =
            self.chunks().iter().map(|chunk| chunk.as_ref()).collect();
        let key_chunks: Vec<&dyn Array> =
            keys.chunks().iter().map(|chunk| chunk.as_ref()).collect();
        let results = search_sorted::search_sorted(&data_chunks, &key_chunks, descending)?;
        Self::try_new(
            Field::new("indices", DataType::UInt64, true),
            results.into_iter().map(|chunk| chunk.boxed()).collect(),
        )
    }
}
