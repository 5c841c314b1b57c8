use std::collections::HashMap as OriginalHashMap;
use std::hash::{BuildHasherDefault, Hasher};
use twox_hash::XxHash64;
use nohash_hasher::IntMap;

/// Arbitrary HashMap using more performant hashing algorithm
pub type FullHashMap<K, V> = OriginalHashMap<K, V, BuildHasherDefault<XxHash64>>;

/// HashMap for Int Types using more performant hashing algorithm
pub type HashMap<K,V> = IntMap<K,V>;

/// Hash of a sparse row, insensitive to coefficient noise below `1e-9`.
/// Two rows with the same support, the same rounded coefficients and the
/// same rounded sides hash alike.
pub fn hash_sparse_row(indices: &[usize], values: &[f64], lower: f64, upper: f64) -> u64 {
    let mut hasher = XxHash64::with_seed(0);

    for (index, value) in quantized_entries(indices, values) {
        hasher.write_usize(index);
        hasher.write_i64(value);
    }
    hasher.write_i64(quantize(lower));
    hasher.write_i64(quantize(upper));
    hasher.finish()
}

/// Terms of a sparse row sorted by index, coefficients rounded like in [`hash_sparse_row`]
pub fn quantized_entries(indices: &[usize], values: &[f64]) -> Vec<(usize, i64)> {
    let mut entries: Vec<(usize, i64)> = indices.iter().copied().zip(values.iter().map(|v| quantize(*v))).collect();
    entries.sort_unstable_by_key(|(i, _)| *i);
    entries
}

pub fn quantize(value: f64) -> i64 {
    if value.is_infinite() {
        if value > 0.0 { i64::MAX } else { i64::MIN }
    } else {
        #[allow(clippy::cast_possible_truncation)]
        let q = (value * 1e9).round() as i64;
        q
    }
}
