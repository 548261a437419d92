//! Append-only record/string/index tables shared by part writers.
//!
//! Tables are built once per serialization pass, frozen with `finalize`, and
//! then only read. The dedup mode of each builder is fixed at construction;
//! there is no process-wide switch. `finalize` consumes the builder, so
//! insert-after-finalize is rejected at compile time.

use std::collections::HashMap;

/// Append-only table of fixed-stride records, optionally deduplicating
/// byte-identical records. Indices are stable: entries are never renumbered.
pub struct RecordTableBuilder {
    stride: usize,
    records: Vec<u8>,
    count: u32,
    dedup: Option<HashMap<Vec<u8>, u32>>,
}

impl RecordTableBuilder {
    /// Creates a table of `stride`-byte records. When `dedup` is true, a
    /// byte-identical re-insertion returns the first-assigned index.
    pub fn new(stride: usize, dedup: bool) -> Self {
        assert!(stride > 0, "record stride must be nonzero");
        Self {
            stride,
            records: Vec::new(),
            count: 0,
            dedup: dedup.then(HashMap::new),
        }
    }

    /// Inserts one record, returning its index.
    pub fn insert_record(&mut self, record: &[u8]) -> u32 {
        assert_eq!(
            record.len(),
            self.stride,
            "record length does not match table stride"
        );
        if let Some(map) = &self.dedup {
            if let Some(&index) = map.get(record) {
                return index;
            }
        }
        let index = self.count;
        self.records.extend_from_slice(record);
        self.count += 1;
        if let Some(map) = &mut self.dedup {
            map.insert(record.to_vec(), index);
        }
        index
    }

    /// Number of records inserted.
    pub fn len(&self) -> u32 {
        self.count
    }

    /// Record stride in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Freezes the table and yields its packed bytes.
    pub fn finalize(self) -> Vec<u8> {
        self.records
    }
}

/// A contiguous buffer of NUL-terminated strings referenced by byte offset.
///
/// The empty string is pre-seeded at offset 0 so "no name" needs no flag.
/// With dedup enabled (content-keyed), interning the same string twice
/// yields the same offset. The legacy no-dedup mode appends unconditionally.
pub struct StringTableBuilder {
    buffer: Vec<u8>,
    offsets: Option<HashMap<String, u32>>,
}

impl StringTableBuilder {
    /// Creates a string table; `dedup` fixes the mode for this instance.
    pub fn new(dedup: bool) -> Self {
        let mut builder = Self {
            buffer: Vec::new(),
            offsets: dedup.then(HashMap::new),
        };
        // Conventional empty string at offset 0.
        builder.buffer.push(0);
        if let Some(map) = &mut builder.offsets {
            map.insert(String::new(), 0);
        }
        builder
    }

    /// Interns `text`, returning the byte offset it starts at.
    pub fn insert_string(&mut self, text: &str) -> u32 {
        if let Some(map) = &self.offsets {
            if let Some(&offset) = map.get(text) {
                return offset;
            }
        }
        let offset = u32::try_from(self.buffer.len()).expect("string table exceeds u32 range");
        self.buffer.extend_from_slice(text.as_bytes());
        self.buffer.push(0);
        if let Some(map) = &mut self.offsets {
            map.insert(text.to_owned(), offset);
        }
        offset
    }

    /// Freezes the table. With `align4`, pads with up to 3 trailing NULs;
    /// the padding carries no semantic entries.
    pub fn finalize(mut self, align4: bool) -> Vec<u8> {
        if align4 {
            while self.buffer.len() % 4 != 0 {
                self.buffer.push(0);
            }
        }
        self.buffer
    }
}

/// A contiguous buffer of `u32` values referenced by element offset + count.
///
/// Re-insertion dedup is a linear scan for an equal contiguous subsequence,
/// not a hash lookup. Binary compactness wins over insertion speed here:
/// index arrays are bounded by shader complexity, not program size.
pub struct IndexArrayBuilder {
    values: Vec<u32>,
}

impl IndexArrayBuilder {
    /// Creates an empty index pool.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Interns `indices`, returning `(element_offset, count)`. An existing
    /// equal run is reused; otherwise the values are appended.
    pub fn insert_array(&mut self, indices: &[u32]) -> (u32, u32) {
        let count = indices.len();
        if count == 0 {
            return (0, 0);
        }
        if count <= self.values.len() {
            for start in 0..=(self.values.len() - count) {
                if &self.values[start..start + count] == indices {
                    return (start as u32, count as u32);
                }
            }
        }
        let offset = self.values.len() as u32;
        self.values.extend_from_slice(indices);
        (offset, count as u32)
    }

    /// Freezes the pool and yields its values.
    pub fn finalize(self) -> Vec<u32> {
        self.values
    }
}

impl Default for IndexArrayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_table_dedup_returns_first_index() {
        let mut table = RecordTableBuilder::new(4, true);
        let a = table.insert_record(&[1, 2, 3, 4]);
        let b = table.insert_record(&[5, 6, 7, 8]);
        let a_again = table.insert_record(&[1, 2, 3, 4]);
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(a_again, a);
        assert_eq!(table.len(), 2);
        assert_eq!(table.finalize(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn record_table_append_only_never_dedups() {
        let mut table = RecordTableBuilder::new(2, false);
        assert_eq!(table.insert_record(&[9, 9]), 0);
        assert_eq!(table.insert_record(&[9, 9]), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn string_table_preseeds_empty_string() {
        let mut table = StringTableBuilder::new(true);
        assert_eq!(table.insert_string(""), 0);
        let a = table.insert_string("A");
        assert_eq!(a, 1);
        assert_eq!(table.insert_string("A"), a);
        let bytes = table.finalize(false);
        assert_eq!(bytes, b"\0A\0");
    }

    #[test]
    fn string_table_interning_is_idempotent_and_regions_disjoint() {
        let mut table = StringTableBuilder::new(true);
        let a = table.insert_string("POSITION");
        let b = table.insert_string("TEXCOORD");
        let a2 = table.insert_string("POSITION");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        // Regions must not overlap.
        assert!(b >= a + "POSITION\0".len() as u32);
    }

    #[test]
    fn string_table_no_dedup_appends_every_time() {
        let mut table = StringTableBuilder::new(false);
        let a = table.insert_string("A");
        let b = table.insert_string("A");
        assert_ne!(a, b);
    }

    #[test]
    fn string_table_alignment_padding_is_at_most_three_nuls() {
        let mut table = StringTableBuilder::new(true);
        table.insert_string("AB"); // buffer: \0 A B \0 -> already 4 bytes
        let bytes = table.finalize(true);
        assert_eq!(bytes.len() % 4, 0);
        assert!(bytes.len() - b"\0AB\0".len() <= 3);
    }

    #[test]
    fn index_array_reuses_equal_runs() {
        let mut pool = IndexArrayBuilder::new();
        let (off_a, len_a) = pool.insert_array(&[0, 1, 2]);
        let (off_b, len_b) = pool.insert_array(&[1, 2]);
        assert_eq!((off_a, len_a), (0, 3));
        // [1, 2] is a subsequence of the existing run.
        assert_eq!((off_b, len_b), (1, 2));
        let (off_c, len_c) = pool.insert_array(&[7]);
        assert_eq!((off_c, len_c), (3, 1));
        assert_eq!(pool.finalize(), vec![0, 1, 2, 7]);
    }

    #[test]
    fn index_array_empty_insert_is_offset_zero() {
        let mut pool = IndexArrayBuilder::new();
        assert_eq!(pool.insert_array(&[]), (0, 0));
        assert!(pool.finalize().is_empty());
    }
}
