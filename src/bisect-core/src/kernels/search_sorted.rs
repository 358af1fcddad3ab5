//! Lower-bound binary search over chunked sorted arrays.
//!
//! Data and keys each arrive as a sequence of arrow2 chunks that together
//! form one logical array; probes resolve logical positions into the chunks
//! directly, so nothing is ever concatenated. Callers are responsible for
//! the data actually being sorted in the claimed order. Unsorted inputs
//! produce unspecified positions, never a panic or an out-of-bounds index.
//!
//! Nulls sort ahead of every valid value for ascending and descending data
//! alike. NaN compares greater than every other float and equal to itself.

use std::cmp::Ordering;

use arrow2::{
    array::{
        ord::{build_compare, DynComparator},
        Array, BinaryArray, BooleanArray, PrimitiveArray, Utf8Array,
    },
    datatypes::{DataType, PhysicalType, PrimitiveType},
    error::{Error, Result},
    types::{NativeType, Offset},
};
use num_traits::Float;

/// Maps logical positions in a chunked array to (chunk, offset) pairs.
///
/// Built once per search from the chunk lengths; `resolve` binary-searches
/// the running offsets, so each probe costs O(log chunks).
pub struct ChunkResolver {
    offsets: Vec<usize>,
}

impl ChunkResolver {
    pub fn new(chunks: &[&dyn Array]) -> Self {
        Self::from_lengths(chunks.iter().map(|chunk| chunk.len()))
    }

    pub fn from_lengths<I: IntoIterator<Item = usize>>(lengths: I) -> Self {
        let mut offsets = vec![0];
        let mut total = 0;
        for length in lengths {
            total += length;
            offsets.push(total);
        }
        Self { offsets }
    }

    /// Total number of rows across all chunks.
    pub fn len(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves a logical position to (chunk index, offset within chunk).
    /// `idx` must be below `len()`; the result never lands in an empty chunk.
    pub fn resolve(&self, idx: usize) -> (usize, usize) {
        let chunk = self.offsets.partition_point(|&start| start <= idx) - 1;
        (chunk, idx - self.offsets[chunk])
    }

    /// Inverse of `resolve`.
    pub fn logical_index(&self, chunk: usize, offset: usize) -> usize {
        self.offsets[chunk] + offset
    }
}

/// First position in `0..length` whose element does not compare `Less` than
/// the key. `compare` reports the ordering of the element at the probed
/// position relative to the key.
fn lower_bound_by<F: Fn(usize) -> Ordering>(length: usize, compare: F) -> usize {
    let mut lo = 0;
    let mut hi = length;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if compare(mid) == Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Total ordering for floats: NaN is greater than every non-NaN value and
/// equal to itself, regardless of its sign bit.
pub fn cmp_float<F: Float>(l: &F, r: &F) -> Ordering {
    match (l.is_nan(), r.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => l.partial_cmp(r).unwrap(),
    }
}

pub fn build_is_valid(array: &dyn Array) -> Box<dyn Fn(usize) -> bool + Send + Sync> {
    if let Some(validity) = array.validity() {
        let validity = validity.clone();
        Box::new(move |x| validity.get_bit(x))
    } else {
        Box::new(|_| true)
    }
}

/// Nulls stay ahead of every valid value in both directions, so only the
/// valid-vs-valid arm is reversed for descending data.
fn cmp_with_validity(
    data_is_valid: bool,
    key_is_valid: bool,
    descending: bool,
    cmp_values: impl FnOnce() -> Ordering,
) -> Ordering {
    match (data_is_valid, key_is_valid) {
        (true, true) => {
            let ordering = cmp_values();
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

fn build_compare_float<F: Float + NativeType>(left: &dyn Array, right: &dyn Array) -> DynComparator {
    let left = left
        .as_any()
        .downcast_ref::<PrimitiveArray<F>>()
        .unwrap()
        .clone();
    let right = right
        .as_any()
        .downcast_ref::<PrimitiveArray<F>>()
        .unwrap()
        .clone();
    Box::new(move |i, j| cmp_float::<F>(&left.value(i), &right.value(j)))
}

fn build_compare_with_nan(left: &dyn Array, right: &dyn Array) -> Result<DynComparator> {
    if left.data_type() == &DataType::Null && right.data_type() == &DataType::Null {
        // Null arrays carry no values; every pairing is null vs null.
        Ok(Box::new(|_, _| Ordering::Equal))
    } else if (left.data_type() == &DataType::Float32) && (right.data_type() == &DataType::Float32)
    {
        Ok(build_compare_float::<f32>(left, right))
    } else if (left.data_type() == &DataType::Float64) && (right.data_type() == &DataType::Float64)
    {
        Ok(build_compare_float::<f64>(left, right))
    } else {
        build_compare(left, right)
    }
}

/// Comparator from rows of `left` (the sorted data) to rows of `right` (the
/// keys). A null data row compares `Less` than any valid key and a valid
/// data row compares `Greater` than a null key, whatever `descending` says;
/// the flag only reverses the ordering between two valid rows.
pub fn build_compare_with_nulls(
    left: &dyn Array,
    right: &dyn Array,
    descending: bool,
) -> Result<DynComparator> {
    let comparator = build_compare_with_nan(left, right)?;
    let left_is_valid = build_is_valid(left);
    let right_is_valid = build_is_valid(right);
    Ok(Box::new(move |i, j| {
        cmp_with_validity(left_is_valid(i), right_is_valid(j), descending, || {
            comparator(i, j)
        })
    }))
}

fn search_sorted_primitive_chunks<T: NativeType, C: Fn(&T, &T) -> Ordering>(
    sorted: &[&PrimitiveArray<T>],
    keys: &[&PrimitiveArray<T>],
    descending: bool,
    cmp: C,
) -> Vec<PrimitiveArray<u64>> {
    let resolver = ChunkResolver::from_lengths(sorted.iter().map(|chunk| chunk.len()));
    let length = resolver.len();
    keys.iter()
        .map(|key_chunk| {
            let positions = (0..key_chunk.len())
                .map(|i| {
                    let key = key_chunk.is_valid(i).then(|| key_chunk.value(i));
                    lower_bound_by(length, |idx| {
                        let (chunk, offset) = resolver.resolve(idx);
                        let data = sorted[chunk];
                        cmp_with_validity(data.is_valid(offset), key.is_some(), descending, || {
                            cmp(&data.value(offset), key.as_ref().unwrap())
                        })
                    }) as u64
                })
                .collect::<Vec<_>>();
            PrimitiveArray::<u64>::new(DataType::UInt64, positions.into(), None)
        })
        .collect()
}

fn search_sorted_boolean_chunks(
    sorted: &[&BooleanArray],
    keys: &[&BooleanArray],
    descending: bool,
) -> Vec<PrimitiveArray<u64>> {
    let resolver = ChunkResolver::from_lengths(sorted.iter().map(|chunk| chunk.len()));
    let length = resolver.len();
    keys.iter()
        .map(|key_chunk| {
            let positions = (0..key_chunk.len())
                .map(|i| {
                    let key = key_chunk.is_valid(i).then(|| key_chunk.value(i));
                    lower_bound_by(length, |idx| {
                        let (chunk, offset) = resolver.resolve(idx);
                        let data = sorted[chunk];
                        cmp_with_validity(data.is_valid(offset), key.is_some(), descending, || {
                            data.value(offset).cmp(&key.unwrap())
                        })
                    }) as u64
                })
                .collect::<Vec<_>>();
            PrimitiveArray::<u64>::new(DataType::UInt64, positions.into(), None)
        })
        .collect()
}

fn search_sorted_utf8_chunks<O: Offset>(
    sorted: &[&Utf8Array<O>],
    keys: &[&Utf8Array<O>],
    descending: bool,
) -> Vec<PrimitiveArray<u64>> {
    let resolver = ChunkResolver::from_lengths(sorted.iter().map(|chunk| chunk.len()));
    let length = resolver.len();
    keys.iter()
        .map(|key_chunk| {
            let positions = (0..key_chunk.len())
                .map(|i| {
                    let key = key_chunk.is_valid(i).then(|| key_chunk.value(i));
                    lower_bound_by(length, |idx| {
                        let (chunk, offset) = resolver.resolve(idx);
                        let data = sorted[chunk];
                        cmp_with_validity(data.is_valid(offset), key.is_some(), descending, || {
                            data.value(offset).cmp(key.unwrap())
                        })
                    }) as u64
                })
                .collect::<Vec<_>>();
            PrimitiveArray::<u64>::new(DataType::UInt64, positions.into(), None)
        })
        .collect()
}

fn search_sorted_binary_chunks<O: Offset>(
    sorted: &[&BinaryArray<O>],
    keys: &[&BinaryArray<O>],
    descending: bool,
) -> Vec<PrimitiveArray<u64>> {
    let resolver = ChunkResolver::from_lengths(sorted.iter().map(|chunk| chunk.len()));
    let length = resolver.len();
    keys.iter()
        .map(|key_chunk| {
            let positions = (0..key_chunk.len())
                .map(|i| {
                    let key = key_chunk.is_valid(i).then(|| key_chunk.value(i));
                    lower_bound_by(length, |idx| {
                        let (chunk, offset) = resolver.resolve(idx);
                        let data = sorted[chunk];
                        cmp_with_validity(data.is_valid(offset), key.is_some(), descending, || {
                            data.value(offset).cmp(key.unwrap())
                        })
                    }) as u64
                })
                .collect::<Vec<_>>();
            PrimitiveArray::<u64>::new(DataType::UInt64, positions.into(), None)
        })
        .collect()
}

/// One comparator per (data chunk, key chunk) pair, laid out row-major:
/// `comparators[data_chunk * keys.len() + key_chunk]`.
fn build_chunk_comparators(
    sorted: &[&dyn Array],
    keys: &[&dyn Array],
    descending: bool,
) -> Result<Vec<DynComparator>> {
    let mut comparators = Vec::with_capacity(sorted.len() * keys.len());
    for data_chunk in sorted {
        for key_chunk in keys {
            comparators.push(build_compare_with_nulls(*data_chunk, *key_chunk, descending)?);
        }
    }
    Ok(comparators)
}

fn search_sorted_dyn_chunks(
    sorted: &[&dyn Array],
    keys: &[&dyn Array],
    descending: bool,
) -> Result<Vec<PrimitiveArray<u64>>> {
    let comparators = build_chunk_comparators(sorted, keys, descending)?;
    let resolver = ChunkResolver::new(sorted);
    let length = resolver.len();
    let key_chunk_count = keys.len();
    let mut results = Vec::with_capacity(key_chunk_count);
    for (key_chunk, key_array) in keys.iter().enumerate() {
        let positions = (0..key_array.len())
            .map(|i| {
                lower_bound_by(length, |idx| {
                    let (chunk, offset) = resolver.resolve(idx);
                    comparators[chunk * key_chunk_count + key_chunk](offset, i)
                }) as u64
            })
            .collect::<Vec<_>>();
        results.push(PrimitiveArray::<u64>::new(
            DataType::UInt64,
            positions.into(),
            None,
        ));
    }
    Ok(results)
}

fn uniform_data_type<'a>(side: &str, chunks: &[&'a dyn Array]) -> Result<Option<&'a DataType>> {
    let Some((first, rest)) = chunks.split_first() else {
        return Ok(None);
    };
    let data_type = first.data_type();
    for chunk in rest {
        if chunk.data_type() != data_type {
            return Err(Error::InvalidArgumentError(format!(
                "{side} chunks must share one data type, got {:?} vs {:?}",
                data_type,
                chunk.data_type()
            )));
        }
    }
    Ok(Some(data_type))
}

fn aligned_chunk_lengths(side: &str, columns: &[Vec<&dyn Array>]) -> Result<Vec<usize>> {
    let lengths: Vec<usize> = columns[0].iter().map(|chunk| chunk.len()).collect();
    for column in &columns[1..] {
        let column_lengths: Vec<usize> = column.iter().map(|chunk| chunk.len()).collect();
        if column_lengths != lengths {
            return Err(Error::InvalidArgumentError(format!(
                "{side} columns must share one chunk layout, got {lengths:?} vs {column_lengths:?}"
            )));
        }
    }
    Ok(lengths)
}

fn all_zero_positions<I: IntoIterator<Item = usize>>(lengths: I) -> Vec<PrimitiveArray<u64>> {
    lengths
        .into_iter()
        .map(|length| PrimitiveArray::<u64>::new(DataType::UInt64, vec![0; length].into(), None))
        .collect()
}

fn downcast_chunks<'a, A: 'static>(chunks: &[&'a dyn Array]) -> Vec<&'a A> {
    chunks
        .iter()
        .map(|chunk| chunk.as_any().downcast_ref().unwrap())
        .collect()
}

macro_rules! with_match_searchable_primitive_type {(
    $key_type:expr, | $_:tt $T:ident | $($body:tt)*
) => ({
    macro_rules! __with_ty__ {( $_ $T:ident ) => ( $($body)* )}
    use arrow2::datatypes::PrimitiveType::*;
    match $key_type {
        Int8 => __with_ty__! { i8 },
        Int16 => __with_ty__! { i16 },
        Int32 => __with_ty__! { i32 },
        Int64 => __with_ty__! { i64 },
        Int128 => __with_ty__! { i128 },
        UInt8 => __with_ty__! { u8 },
        UInt16 => __with_ty__! { u16 },
        UInt32 => __with_ty__! { u32 },
        UInt64 => __with_ty__! { u64 },
        _ => return Err(Error::NotYetImplemented(format!(
            "Search sorted not implemented for type {:?}",
            $key_type
        )))
    }
})}

/// Lower-bound positions of `keys` within the logical concatenation of the
/// `sorted` chunks. Returns one UInt64 chunk of positions per key chunk, in
/// order, each the same length as its key chunk.
pub fn search_sorted(
    sorted: &[&dyn Array],
    keys: &[&dyn Array],
    descending: bool,
) -> Result<Vec<PrimitiveArray<u64>>> {
    let sorted_type = uniform_data_type("sorted", sorted)?;
    let keys_type = uniform_data_type("keys", keys)?;
    if let (Some(sorted_type), Some(keys_type)) = (sorted_type, keys_type) {
        if sorted_type != keys_type {
            return Err(Error::InvalidArgumentError(format!(
                "sorted and keys must share one data type, got {sorted_type:?} vs {keys_type:?}"
            )));
        }
    }
    if keys.is_empty() {
        return Ok(vec![]);
    }
    if sorted.iter().map(|chunk| chunk.len()).sum::<usize>() == 0 {
        // Every key lands at position 0 of empty data.
        return Ok(all_zero_positions(keys.iter().map(|chunk| chunk.len())));
    }

    use PhysicalType::*;
    Ok(match sorted[0].data_type().to_physical_type() {
        // Null arrays hold nothing but nulls, and null vs null compares
        // equal, so every key lands at the first position.
        Null => all_zero_positions(keys.iter().map(|chunk| chunk.len())),
        Boolean => search_sorted_boolean_chunks(
            &downcast_chunks(sorted),
            &downcast_chunks(keys),
            descending,
        ),
        Primitive(PrimitiveType::Float32) => search_sorted_primitive_chunks(
            &downcast_chunks::<PrimitiveArray<f32>>(sorted),
            &downcast_chunks(keys),
            descending,
            cmp_float::<f32>,
        ),
        Primitive(PrimitiveType::Float64) => search_sorted_primitive_chunks(
            &downcast_chunks::<PrimitiveArray<f64>>(sorted),
            &downcast_chunks(keys),
            descending,
            cmp_float::<f64>,
        ),
        Primitive(primitive) => with_match_searchable_primitive_type!(primitive, |$T| {
            search_sorted_primitive_chunks::<$T, _>(
                &downcast_chunks::<PrimitiveArray<$T>>(sorted),
                &downcast_chunks(keys),
                descending,
                |l: &$T, r: &$T| l.cmp(r),
            )
        }),
        Utf8 => search_sorted_utf8_chunks::<i32>(
            &downcast_chunks(sorted),
            &downcast_chunks(keys),
            descending,
        ),
        LargeUtf8 => search_sorted_utf8_chunks::<i64>(
            &downcast_chunks(sorted),
            &downcast_chunks(keys),
            descending,
        ),
        Binary => search_sorted_binary_chunks::<i32>(
            &downcast_chunks(sorted),
            &downcast_chunks(keys),
            descending,
        ),
        LargeBinary => search_sorted_binary_chunks::<i64>(
            &downcast_chunks(sorted),
            &downcast_chunks(keys),
            descending,
        ),
        _ => search_sorted_dyn_chunks(sorted, keys, descending)?,
    })
}

/// Multi-column lower bound: columns are compared left to right and the
/// first non-equal column decides, with each column's `descending` flag
/// applied on its own. Chunks must line up across columns within each side;
/// the two sides may chunk independently.
pub fn search_sorted_multi_array(
    sorted: &[Vec<&dyn Array>],
    keys: &[Vec<&dyn Array>],
    descending: &[bool],
) -> Result<Vec<PrimitiveArray<u64>>> {
    if sorted.is_empty() || keys.is_empty() {
        return Err(Error::InvalidArgumentError(
            "Need at least 1 column to perform search_sorted".to_string(),
        ));
    }
    if sorted.len() != keys.len() {
        return Err(Error::InvalidArgumentError(format!(
            "Mismatch in number of columns for search_sorted: {} vs {}",
            sorted.len(),
            keys.len()
        )));
    }
    if sorted.len() != descending.len() {
        return Err(Error::InvalidArgumentError(format!(
            "Mismatch in number of descending flags for search_sorted: num_columns: {} vs descending.len(): {}",
            sorted.len(),
            descending.len()
        )));
    }
    for (column, (data_column, key_column)) in sorted.iter().zip(keys.iter()).enumerate() {
        let data_type = uniform_data_type(&format!("sorted column {column}"), data_column)?;
        let key_type = uniform_data_type(&format!("key column {column}"), key_column)?;
        if let (Some(data_type), Some(key_type)) = (data_type, key_type) {
            if data_type != key_type {
                return Err(Error::InvalidArgumentError(format!(
                    "sorted and key columns must share one data type, column {column}: {data_type:?} vs {key_type:?}"
                )));
            }
        }
    }
    let data_lengths = aligned_chunk_lengths("sorted", sorted)?;
    let key_lengths = aligned_chunk_lengths("keys", keys)?;
    if key_lengths.is_empty() {
        return Ok(vec![]);
    }
    let length: usize = data_lengths.iter().sum();
    if length == 0 {
        return Ok(all_zero_positions(key_lengths.iter().copied()));
    }

    let mut columns = Vec::with_capacity(sorted.len());
    for ((data_column, key_column), descending) in
        sorted.iter().zip(keys.iter()).zip(descending.iter())
    {
        columns.push(build_chunk_comparators(data_column, key_column, *descending)?);
    }

    let resolver = ChunkResolver::from_lengths(data_lengths.iter().copied());
    let key_chunk_count = key_lengths.len();
    let mut results = Vec::with_capacity(key_chunk_count);
    for (key_chunk, key_length) in key_lengths.iter().enumerate() {
        let positions = (0..*key_length)
            .map(|i| {
                lower_bound_by(length, |idx| {
                    let (chunk, offset) = resolver.resolve(idx);
                    for comparators in &columns {
                        match comparators[chunk * key_chunk_count + key_chunk](offset, i) {
                            Ordering::Equal => {}
                            ordering => return ordering,
                        }
                    }
                    Ordering::Equal
                }) as u64
            })
            .collect::<Vec<_>>();
        results.push(PrimitiveArray::<u64>::new(
            DataType::UInt64,
            positions.into(),
            None,
        ));
    }
    Ok(results)
}
