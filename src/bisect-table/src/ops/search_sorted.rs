use arrow2::{
    array::Array,
    datatypes::{DataType, Field},
};
use bisect_core::{array::ChunkedArray, kernels::search_sorted};
use common_error::{BisectError, BisectResult};

use crate::Table;

fn column_chunks(columns: &[ChunkedArray]) -> Vec<Vec<&dyn Array>> {
    columns
        .iter()
        .map(|column| column.chunks().iter().map(|chunk| chunk.as_ref()).collect())
        .collect()
}

impl Table {
    /// Lower-bound positions of each row of `keys` within this table's rows.
    /// Columns are compared left to right and `descending` holds one
    /// direction flag per column. The output is a UInt64 column named
    /// "indices" chunked exactly like the key table.
    pub fn search_sorted(&self, keys: &Self, descending: &[bool]) -> BisectResult<ChunkedArray> {
        if self.schema != keys.schema {
            return Err(BisectError::SchemaMismatch(format!(
                "Schema Mismatch in search_sorted: data: {:?} vs keys: {:?}",
                self.schema, keys.schema
            )));
        }
        if self.num_columns() != descending.len() {
            return Err(BisectError::ValueError(format!(
                "Mismatch in number of arguments for `descending` in search sorted: num_columns: {} vs : descending.len() {}",
                self.num_columns(),
                descending.len()
            )));
        }

        if self.num_columns() == 1 {
            return self
                .get_column_by_index(0)?
                .search_sorted(keys.get_column_by_index(0)?, *descending.first().unwrap());
        }

        let data_columns = column_chunks(self.columns());
        let key_columns = column_chunks(keys.columns());
        let results =
            search_sorted::search_sorted_multi_array(&data_columns, &key_columns, descending)?;
        ChunkedArray::try_new(
            Field::new("indices", DataType::UInt64, true),
            results.into_iter().map(|chunk| chunk.boxed()).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use arrow2::array::PrimitiveArray;
    use bisect_core::array::ChunkedArray;
    use common_error::{BisectError, BisectResult};
    use rstest::rstest;

    use crate::Table;

    fn int_column(name: &str, chunks: &[&[i64]]) -> BisectResult<ChunkedArray> {
        ChunkedArray::from_chunks(
            name,
            chunks
                .iter()
                .map(|chunk| PrimitiveArray::<i64>::from_slice(*chunk).boxed())
                .collect(),
        )
    }

    fn positions(indices: &ChunkedArray) -> Vec<u64> {
        indices
            .chunks()
            .iter()
            .flat_map(|chunk| {
                chunk
                    .as_any()
                    .downcast_ref::<PrimitiveArray<u64>>()
                    .unwrap()
                    .values_iter()
                    .copied()
            })
            .collect()
    }

    #[test]
    fn single_column_tables_delegate_to_the_column_search() -> BisectResult<()> {
        let data = Table::from_columns(vec![int_column("values", &[&[1, 3], &[3, 5, 7]])?])?;
        let keys = Table::from_columns(vec![int_column("values", &[&[0, 3, 6, 8]])?])?;
        let indices = data.search_sorted(&keys, &[false])?;
        assert_eq!(indices.name(), "indices");
        assert_eq!(positions(&indices), vec![0, 1, 4, 5]);
        Ok(())
    }

    #[rstest]
    #[case::one_key_chunk(&[[1i64, 1, 3].as_slice()], &[[4i64, 9, 0].as_slice()])]
    #[case::split_key_chunks(&[[1i64].as_slice(), &[1, 3]], &[[4i64].as_slice(), &[9, 0]])]
    fn composite_keys_break_ties_on_later_columns(
        #[case] key_a_chunks: &[&[i64]],
        #[case] key_b_chunks: &[&[i64]],
    ) -> BisectResult<()> {
        let data = Table::from_columns(vec![
            int_column("a", &[&[1, 1], &[2]])?,
            int_column("b", &[&[5, 3], &[9]])?,
        ])?;
        let keys = Table::from_columns(vec![
            int_column("a", key_a_chunks)?,
            int_column("b", key_b_chunks)?,
        ])?;
        let indices = data.search_sorted(&keys, &[false, true])?;
        assert_eq!(
            indices.chunk_lengths().collect::<Vec<_>>(),
            key_a_chunks
                .iter()
                .map(|chunk| chunk.len())
                .collect::<Vec<_>>()
        );
        assert_eq!(positions(&indices), vec![1, 0, 3]);
        Ok(())
    }

    #[test]
    fn composite_output_mirrors_the_key_chunking() -> BisectResult<()> {
        let data = Table::from_columns(vec![
            int_column("a", &[&[1, 1], &[2]])?,
            int_column("b", &[&[5, 3], &[9]])?,
        ])?;
        let keys = Table::from_columns(vec![
            int_column("a", &[&[1], &[], &[3]])?,
            int_column("b", &[&[4], &[], &[0]])?,
        ])?;
        let indices = data.search_sorted(&keys, &[false, true])?;
        assert_eq!(indices.name(), "indices");
        assert_eq!(indices.chunk_lengths().collect::<Vec<_>>(), vec![1, 0, 1]);
        assert_eq!(positions(&indices), vec![1, 3]);
        Ok(())
    }

    #[test]
    fn composite_nulls_sort_ahead_of_valid_ties() -> BisectResult<()> {
        let a = ChunkedArray::from_chunks(
            "a",
            vec![PrimitiveArray::<i64>::from_slice([1, 1]).boxed()],
        )?;
        let b = ChunkedArray::from_chunks(
            "b",
            vec![PrimitiveArray::<i64>::from([None, Some(2)]).boxed()],
        )?;
        let key_a = ChunkedArray::from_chunks(
            "a",
            vec![PrimitiveArray::<i64>::from_slice([1, 1]).boxed()],
        )?;
        let key_b = ChunkedArray::from_chunks(
            "b",
            vec![PrimitiveArray::<i64>::from([None, Some(5)]).boxed()],
        )?;
        let data = Table::from_columns(vec![a, b])?;
        let keys = Table::from_columns(vec![key_a, key_b])?;
        assert_eq!(
            positions(&data.search_sorted(&keys, &[false, false])?),
            vec![0, 2]
        );
        Ok(())
    }

    #[test]
    fn schemas_must_match_between_data_and_keys() -> BisectResult<()> {
        let data = Table::from_columns(vec![int_column("a", &[&[1]])?])?;
        let keys = Table::from_columns(vec![int_column("b", &[&[1]])?])?;
        assert!(matches!(
            data.search_sorted(&keys, &[false]),
            Err(BisectError::SchemaMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn one_direction_flag_is_required_per_column() -> BisectResult<()> {
        let data = Table::from_columns(vec![
            int_column("a", &[&[1]])?,
            int_column("b", &[&[2]])?,
        ])?;
        let keys = data.clone();
        assert!(matches!(
            data.search_sorted(&keys, &[false]),
            Err(BisectError::ValueError(_))
        ));
        Ok(())
    }

    #[test]
    fn zero_column_tables_cannot_be_searched() -> BisectResult<()> {
        let data = Table::from_columns(vec![])?;
        let keys = Table::from_columns(vec![])?;
        assert!(matches!(
            data.search_sorted(&keys, &[]),
            Err(BisectError::ArrowError(_))
        ));
        Ok(())
    }
}
