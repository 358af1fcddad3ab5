mod ops;

use std::sync::Arc;

use arrow2::datatypes::Schema;
use bisect_core::array::ChunkedArray;
use common_error::{BisectError, BisectResult};

pub type SchemaRef = Arc<Schema>;

/// Equal-length columns that share one row chunking, so any row index
/// resolves to the same (chunk, offset) pair in every column.
#[derive(Debug, Clone)]
pub struct Table {
    pub schema: SchemaRef,
    columns: Vec<ChunkedArray>,
}

impl Table {
    pub fn from_columns(columns: Vec<ChunkedArray>) -> BisectResult<Self> {
        let mut num_rows = None;
        let mut chunk_lengths: Option<Vec<usize>> = None;
        for column in &columns {
            match num_rows {
                None => num_rows = Some(column.len()),
                Some(expected) if expected != column.len() => {
                    return Err(BisectError::ValueError(format!(
                        "While building a Table, we found that the column lengths did not match. Column named: {} had length: {} vs rest of the Table had length: {}",
                        column.name(),
                        column.len(),
                        expected
                    )));
                }
                Some(_) => {}
            }
            let lengths: Vec<usize> = column.chunk_lengths().collect();
            match &chunk_lengths {
                None => chunk_lengths = Some(lengths),
                Some(expected) if expected != &lengths => {
                    return Err(BisectError::ValueError(format!(
                        "While building a Table, we found that the column chunk layouts did not match. Column named: {} had chunks {:?} vs rest of the Table had chunks {:?}",
                        column.name(),
                        lengths,
                        expected
                    )));
                }
                Some(_) => {}
            }
        }
        let fields = columns
            .iter()
            .map(|column| column.field().clone())
            .collect::<Vec<_>>();
        Ok(Self {
            schema: Arc::new(Schema::from(fields)),
            columns,
        })
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, ChunkedArray::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_column<S: AsRef<str>>(&self, name: S) -> BisectResult<&ChunkedArray> {
        let name = name.as_ref();
        self.columns
            .iter()
            .find(|column| column.name() == name)
            .ok_or_else(|| BisectError::FieldNotFound(format!("Column \"{name}\" not found")))
    }

    pub fn get_column_by_index(&self, idx: usize) -> BisectResult<&ChunkedArray> {
        self.columns.get(idx).ok_or_else(|| {
            BisectError::ValueError(format!(
                "Column index {idx} out of bounds for a Table with {} columns",
                self.num_columns()
            ))
        })
    }

    pub fn columns(&self) -> &[ChunkedArray] {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use arrow2::array::PrimitiveArray;
    use bisect_core::array::ChunkedArray;
    use common_error::{BisectError, BisectResult};

    use super::Table;

    fn int_column(name: &str, chunks: &[&[i64]]) -> BisectResult<ChunkedArray> {
        ChunkedArray::from_chunks(
            name,
            chunks
                .iter()
                .map(|chunk| PrimitiveArray::<i64>::from_slice(*chunk).boxed())
                .collect(),
        )
    }

    #[test]
    fn tables_report_their_shape() -> BisectResult<()> {
        let table = Table::from_columns(vec![
            int_column("a", &[&[1, 2], &[3]])?,
            int_column("b", &[&[4, 5], &[6]])?,
        ])?;
        assert_eq!(table.num_columns(), 2);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get_column("b")?.name(), "b");
        assert!(matches!(
            table.get_column("c"),
            Err(BisectError::FieldNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn column_lengths_must_match() -> BisectResult<()> {
        let result = Table::from_columns(vec![
            int_column("a", &[&[1, 2]])?,
            int_column("b", &[&[4]])?,
        ]);
        assert!(matches!(result, Err(BisectError::ValueError(_))));
        Ok(())
    }

    #[test]
    fn column_chunk_layouts_must_match() -> BisectResult<()> {
        let result = Table::from_columns(vec![
            int_column("a", &[&[1, 2], &[3]])?,
            int_column("b", &[&[4], &[5, 6]])?,
        ]);
        assert!(matches!(result, Err(BisectError::ValueError(_))));
        Ok(())
    }
}
