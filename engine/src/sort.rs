//! Sort & writer (§4.7): stable-insert records into an ordered list, detect
//! reorder, rewrite the chain under signal guard, recurse into
//! subdirectories.

use std::cmp::Ordering;

use fatsort_core::collator::Collator;
use fatsort_core::critical_section::critical_section;
use fatsort_core::device::BlockDevice;
use fatsort_core::error::Result;
use fatsort_core::options::SortOptions;
use fatsort_core::rng::Xorshift64;
use fatsort_core::selection::Selection;

use crate::comparator::{self, Comparable};
use crate::directory::{ExFatRecord, Fat1xRecord};
use crate::stream::DirectorySource;

/// What a record contributes to the rewrite: its raw slots, and (when it is
/// itself a directory eligible for recursion) the first cluster of its own
/// chain.
pub trait Record: Comparable + Clone {
    fn slots(&self) -> Vec<[u8; 32]>;

    /// `Some(cluster)` if this record is a live, non-anchor directory whose
    /// contents should be recursed into; `None` otherwise (files, ".", "..",
    /// deleted entries, volume labels).
    fn recursion_cluster(&self) -> Option<u32>;
}

impl Record for Fat1xRecord {
    fn slots(&self) -> Vec<[u8; 32]> {
        Fat1xRecord::slots(self)
    }

    fn recursion_cluster(&self) -> Option<u32> {
        if self.is_directory() && !self.is_dot() && !self.is_dotdot() && !self.is_deleted() {
            Some(Fat1xRecord::first_cluster(self))
        } else {
            None
        }
    }
}

impl Record for ExFatRecord {
    fn slots(&self) -> Vec<[u8; 32]> {
        ExFatRecord::slots(self)
    }

    fn recursion_cluster(&self) -> Option<u32> {
        if self.is_directory() && !self.is_deleted() {
            ExFatRecord::first_cluster(self)
        } else {
            None
        }
    }
}

/// Builds the ordered record list via stable insertion, reporting whether
/// any record was inserted anywhere other than the current tail (§4.7 step
/// 1's "reordered" flag).
fn build_ordered_list<T: Clone>(
    records: Vec<T>,
    mut compare: impl FnMut(&T, &T) -> Ordering,
) -> (Vec<T>, bool) {
    let mut ordered: Vec<T> = Vec::with_capacity(records.len());
    let mut reordered = false;

    for record in records {
        let len_before = ordered.len();
        let mut insert_at = len_before;
        for (i, existing) in ordered.iter().enumerate() {
            if compare(&record, existing) == Ordering::Less {
                insert_at = i;
                break;
            }
        }
        if insert_at != len_before {
            reordered = true;
        }
        ordered.insert(insert_at, record);
    }

    (ordered, reordered)
}

/// Fisher-Yates over the sub-range that is neither a leading anchor
/// (volume label, ".", "..") nor part of the trailing deleted suffix
/// (§4.7 step 2).
fn randomize_non_anchored<T: Comparable>(records: &mut [T], rng: &mut Xorshift64) {
    let anchor_end = records
        .iter()
        .position(|r| !(r.is_volume_label() || r.is_dot() || r.is_dotdot()))
        .unwrap_or(records.len());
    let deleted_start = records
        .iter()
        .position(|r| r.is_deleted())
        .unwrap_or(records.len());
    if deleted_start <= anchor_end {
        return;
    }
    let range = &mut records[anchor_end..deleted_start];
    for i in (1..range.len()).rev() {
        let j = rng.below((i + 1) as u32) as usize;
        range.swap(i, j);
    }
}

/// Result of sorting one directory: whether it was written, and the set of
/// child directories discovered (for the caller to recurse into).
pub struct SortOutcome {
    pub written: bool,
    pub display_order: Vec<String>,
    pub children: Vec<u32>,
}

/// Sorts the records already assembled for one directory and, unless in
/// list-only mode, rewrites the directory's slot stream if anything moved.
/// Does not recurse; the caller walks `children` and repeats per
/// subdirectory.
pub fn sort_directory<T: Record>(
    device: &mut dyn BlockDevice,
    source: &DirectorySource,
    records: Vec<T>,
    opts: &SortOptions,
    compare: impl FnMut(&T, &T) -> Ordering,
) -> Result<SortOutcome> {
    let (mut ordered, mut reordered) = build_ordered_list(records, compare);

    if opts.random {
        let mut rng = Xorshift64::new(opts.random_seed);
        randomize_non_anchored(&mut ordered, &mut rng);
        reordered = true;
    }

    let display_order = ordered.iter().map(|r| r.display_name().to_string()).collect();
    let children: Vec<u32> = ordered.iter().filter_map(|r| r.recursion_cluster()).collect();

    let written = if reordered && !opts.list_only {
        critical_section(|| write_back(device, source, &ordered))?;
        true
    } else {
        false
    };

    Ok(SortOutcome {
        written,
        display_order,
        children,
    })
}

/// Rewrite protocol (§4.7): write every record's slots in order, then a
/// single zeroed terminator slot if short of the region's capacity, then
/// sync.
fn write_back<T: Record>(
    device: &mut dyn BlockDevice,
    source: &DirectorySource,
    ordered: &[T],
) -> Result<()> {
    let capacity = source.slot_count();
    let mut slot_index = 0u32;

    for record in ordered {
        for slot in record.slots() {
            source.write_slot(device, slot_index, &slot)?;
            slot_index += 1;
        }
    }

    if slot_index < capacity {
        source.write_slot(device, slot_index, &[0u8; 32])?;
    }

    device.sync()?;
    Ok(())
}

pub fn compare_fat1x_records<'a>(
    opts: &'a SortOptions,
    collator: &'a dyn Collator,
) -> impl FnMut(&Fat1xRecord, &Fat1xRecord) -> Ordering + 'a {
    move |a, b| comparator::compare_fat1x(a, b, opts, collator)
}

pub fn compare_exfat_records<'a>(
    opts: &'a SortOptions,
    collator: &'a dyn Collator,
) -> impl FnMut(&ExFatRecord, &ExFatRecord) -> Ordering + 'a {
    move |a, b| comparator::compare_exfat(a, b, opts, collator)
}

/// Whether a directory at the given normalized path should be processed at
/// all (§4.7's selection filter).
pub fn is_selected(selection: &Selection, path: &str) -> bool {
    selection.matches(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatsort_core::collator::AsciiCollator;
    use fatsort_core::device::MemoryDevice;

    fn short_entry(name: &str, attrs: u8) -> Fat1xRecord {
        let mut slot = [0x20u8; 32];
        let bytes = name.as_bytes();
        slot[..bytes.len().min(11)].copy_from_slice(&bytes[..bytes.len().min(11)]);
        slot[11] = attrs;
        Fat1xRecord {
            long_slots: Vec::new(),
            short_slot: slot,
            short_name: crate::directory::entry::decode_short_name(&slot),
            long_name: None,
        }
    }

    #[test]
    fn no_op_sort_produces_no_write() {
        let opts = SortOptions::default();
        let collator = AsciiCollator;
        let records = vec![short_entry("AAA", 0), short_entry("ZZZ", 0)];
        let mut dev = MemoryDevice::new(vec![0u8; 4096]);
        let source = crate::stream::static_root_source(0, 512, 16);
        let outcome = sort_directory(
            &mut dev,
            &source,
            records,
            &opts,
            compare_fat1x_records(&opts, &collator),
        )
        .unwrap();
        assert!(!outcome.written);
        assert_eq!(outcome.display_order, vec!["AAA", "ZZZ"]);
    }

    #[test]
    fn out_of_order_input_triggers_write() {
        let opts = SortOptions::default();
        let collator = AsciiCollator;
        let records = vec![short_entry("ZZZ", 0), short_entry("AAA", 0)];
        let mut dev = MemoryDevice::new(vec![0u8; 4096]);
        let source = crate::stream::static_root_source(0, 512, 16);
        let outcome = sort_directory(
            &mut dev,
            &source,
            records,
            &opts,
            compare_fat1x_records(&opts, &collator),
        )
        .unwrap();
        assert!(outcome.written);
        assert_eq!(outcome.display_order, vec!["AAA", "ZZZ"]);
    }

    #[test]
    fn list_only_never_writes() {
        let mut opts = SortOptions::default();
        opts.list_only = true;
        let collator = AsciiCollator;
        let records = vec![short_entry("ZZZ", 0), short_entry("AAA", 0)];
        let mut dev = MemoryDevice::new(vec![0u8; 4096]);
        let source = crate::stream::static_root_source(0, 512, 16);
        let outcome = sort_directory(
            &mut dev,
            &source,
            records,
            &opts,
            compare_fat1x_records(&opts, &collator),
        )
        .unwrap();
        assert!(!outcome.written);
    }

    #[test]
    fn list_only_preserves_stream_order_with_three_entries() {
        let mut opts = SortOptions::default();
        opts.list_only = true;
        let collator = AsciiCollator;
        let records = vec![short_entry("AAA", 0), short_entry("MMM", 0), short_entry("ZZZ", 0)];
        let mut dev = MemoryDevice::new(vec![0u8; 4096]);
        let source = crate::stream::static_root_source(0, 512, 16);
        let outcome = sort_directory(
            &mut dev,
            &source,
            records,
            &opts,
            compare_fat1x_records(&opts, &collator),
        )
        .unwrap();
        assert!(!outcome.written);
        assert_eq!(outcome.display_order, vec!["AAA", "MMM", "ZZZ"]);
    }

    #[test]
    fn anchors_stay_ahead_of_randomized_range() {
        let mut opts = SortOptions::default();
        opts.random = true;
        opts.random_seed = 7;
        let collator = AsciiCollator;
        let records = vec![
            short_entry(".          ", 0x10),
            short_entry("..         ", 0x10),
            short_entry("AAA", 0),
            short_entry("BBB", 0),
            short_entry("CCC", 0),
        ];
        let mut dev = MemoryDevice::new(vec![0u8; 4096]);
        let source = crate::stream::static_root_source(0, 512, 16);
        let outcome = sort_directory(
            &mut dev,
            &source,
            records,
            &opts,
            compare_fat1x_records(&opts, &collator),
        )
        .unwrap();
        assert_eq!(&outcome.display_order[0..2], &[".".to_string(), "..".to_string()]);
    }
}
