mod ops;

use std::sync::Arc;

use arrow2::{
    array::Array,
    datatypes::{DataType, Field},
};
use common_error::{BisectError, BisectResult};

/// One logical column held as an ordered list of arrow2 chunks.
///
/// The chunks are never concatenated; operations resolve logical positions
/// into them on the fly. Chunk boundaries carry no meaning beyond storage,
/// so any two layouts with the same values behave identically.
#[derive(Debug, Clone)]
pub struct ChunkedArray {
    field: Arc<Field>,
    chunks: Vec<Box<dyn Array>>,
    length: usize,
}

impl ChunkedArray {
    pub fn try_new(field: Field, chunks: Vec<Box<dyn Array>>) -> BisectResult<Self> {
        for chunk in &chunks {
            if chunk.data_type() != &field.data_type {
                return Err(BisectError::SchemaMismatch(format!(
                    "expected all chunks to be {:?}, got {:?}",
                    field.data_type,
                    chunk.data_type()
                )));
            }
        }
        let length = chunks.iter().map(|chunk| chunk.len()).sum();
        Ok(Self {
            field: Arc::new(field),
            chunks,
            length,
        })
    }

    /// Builds a column named `name` from `chunks`, taking the data type from
    /// the first chunk. Use `empty` for a column with no chunks at all.
    pub fn from_chunks<S: AsRef<str>>(name: S, chunks: Vec<Box<dyn Array>>) -> BisectResult<Self> {
        let Some(first) = chunks.first() else {
            return Err(BisectError::ValueError(format!(
                "cannot infer a data type for column \"{}\" from zero chunks",
                name.as_ref()
            )));
        };
        let field = Field::new(name.as_ref(), first.data_type().clone(), true);
        Self::try_new(field, chunks)
    }

    pub fn empty(name: &str, data_type: DataType) -> Self {
        Self {
            field: Arc::new(Field::new(name, data_type, true)),
            chunks: vec![],
            length: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn name(&self) -> &str {
        self.field.name.as_str()
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn data_type(&self) -> &DataType {
        &self.field.data_type
    }

    pub fn chunks(&self) -> &[Box<dyn Array>] {
        &self.chunks
    }

    pub fn chunk_lengths(&self) -> impl Iterator<Item = usize> + '_ {
        self.chunks.iter().map(|chunk| chunk.len())
    }

    pub fn null_count(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.null_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use arrow2::{
        array::PrimitiveArray,
        datatypes::{DataType, Field},
    };
    use common_error::{BisectError, BisectResult};

    use super::ChunkedArray;

    #[test]
    fn length_spans_all_chunks() -> BisectResult<()> {
        let column = ChunkedArray::from_chunks(
            "values",
            vec![
                PrimitiveArray::<i64>::from_slice([1, 2]).boxed(),
                PrimitiveArray::<i64>::from_vec(vec![]).boxed(),
                PrimitiveArray::<i64>::from_slice([3]).boxed(),
            ],
        )?;
        assert_eq!(column.len(), 3);
        assert_eq!(column.chunk_lengths().collect::<Vec<_>>(), vec![2, 0, 1]);
        assert_eq!(column.data_type(), &DataType::Int64);
        Ok(())
    }

    #[test]
    fn null_counts_span_all_chunks() -> BisectResult<()> {
        let column = ChunkedArray::from_chunks(
            "values",
            vec![
                PrimitiveArray::<i64>::from([None, Some(1)]).boxed(),
                PrimitiveArray::<i64>::from_slice([2]).boxed(),
                PrimitiveArray::<i64>::from([Some(3), None]).boxed(),
            ],
        )?;
        assert_eq!(column.null_count(), 2);
        assert_eq!(column.len(), 5);
        Ok(())
    }

    #[test]
    fn chunks_must_match_the_field_type() {
        let result = ChunkedArray::try_new(
            Field::new("values", DataType::Int64, true),
            vec![PrimitiveArray::<i32>::from_slice([1]).boxed()],
        );
        assert!(matches!(result, Err(BisectError::SchemaMismatch(_))));
    }

    #[test]
    fn zero_chunk_columns_need_an_explicit_type() {
        let result = ChunkedArray::from_chunks("values", vec![]);
        assert!(matches!(result, Err(BisectError::ValueError(_))));

        let column = ChunkedArray::empty("values", DataType::Utf8);
        assert!(column.is_empty());
        assert_eq!(column.data_type(), &DataType::Utf8);
    }
}
