//! Comparator (§4.6): positional overrides evaluated first, then grouping,
//! modification-time, prefix-strip, case-fold and the order function, in
//! the fixed precedence the spec defines.

use std::cmp::Ordering;

use fatsort_core::collator::Collator;
use fatsort_core::options::{GroupOrder, OrderFunction, SortOptions};

use crate::directory::{ExFatRecord, Fat1xRecord};
use crate::natural_order::natural_compare;

/// Shared view the comparator needs, regardless of FAT1x/32 vs. exFAT.
pub trait Comparable {
    fn is_volume_label(&self) -> bool;
    fn is_dot(&self) -> bool;
    fn is_dotdot(&self) -> bool;
    fn is_deleted(&self) -> bool;
    fn is_directory(&self) -> bool;
    fn display_name(&self) -> &str;
    fn modification_time_key(&self) -> u64;
}

impl Comparable for Fat1xRecord {
    fn is_volume_label(&self) -> bool {
        Fat1xRecord::is_volume_label(self)
    }
    fn is_dot(&self) -> bool {
        Fat1xRecord::is_dot(self)
    }
    fn is_dotdot(&self) -> bool {
        Fat1xRecord::is_dotdot(self)
    }
    fn is_deleted(&self) -> bool {
        Fat1xRecord::is_deleted(self)
    }
    fn is_directory(&self) -> bool {
        Fat1xRecord::is_directory(self)
    }
    fn display_name(&self) -> &str {
        Fat1xRecord::display_name(self)
    }
    fn modification_time_key(&self) -> u64 {
        Fat1xRecord::write_time_key(self) as u64
    }
}

impl Comparable for ExFatRecord {
    fn is_volume_label(&self) -> bool {
        ExFatRecord::is_volume_label(self)
    }
    fn is_dot(&self) -> bool {
        false // exFAT has no "." / ".." entries
    }
    fn is_dotdot(&self) -> bool {
        false
    }
    fn is_deleted(&self) -> bool {
        ExFatRecord::is_deleted(self)
    }
    fn is_directory(&self) -> bool {
        ExFatRecord::is_directory(self)
    }
    fn display_name(&self) -> &str {
        ExFatRecord::display_name(self)
    }
    fn modification_time_key(&self) -> u64 {
        ExFatRecord::modification_time_key(self)
    }
}

/// Evaluates the positional overrides common to both FAT kinds (volume
/// label first, "." then ".." for FAT1x/32, deleted last, list/random
/// short-circuit). Returns `Some(ordering)` if a rule fixed the result.
fn positional_override<T: Comparable>(a: &T, b: &T, opts: &SortOptions) -> Option<Ordering> {
    if a.is_volume_label() != b.is_volume_label() {
        return Some(if a.is_volume_label() { Ordering::Less } else { Ordering::Greater });
    }
    if a.is_volume_label() && b.is_volume_label() {
        return Some(Ordering::Equal);
    }
    if a.is_dot() != b.is_dot() {
        return Some(if a.is_dot() { Ordering::Less } else { Ordering::Greater });
    }
    if a.is_dotdot() != b.is_dotdot() {
        return Some(if a.is_dotdot() { Ordering::Less } else { Ordering::Greater });
    }
    if a.is_deleted() != b.is_deleted() {
        return Some(if a.is_deleted() { Ordering::Greater } else { Ordering::Less });
    }
    if opts.list_only || opts.random {
        return Some(Ordering::Greater);
    }
    None
}

fn strip_prefix<'a>(name: &'a str, prefixes: &[String]) -> &'a str {
    for prefix in prefixes {
        if name.len() >= prefix.len() && name[..prefix.len()].eq_ignore_ascii_case(prefix) {
            return &name[prefix.len()..];
        }
    }
    name
}

fn compare_names(a: &str, b: &str, opts: &SortOptions, collator: &dyn Collator) -> Ordering {
    let a = strip_prefix(a, &opts.ignore_prefixes);
    let b = strip_prefix(b, &opts.ignore_prefixes);

    let (a_owned, b_owned);
    let (a, b): (&str, &str) = if opts.ignore_case {
        a_owned = a.to_lowercase();
        b_owned = b.to_lowercase();
        (&a_owned, &b_owned)
    } else {
        (a, b)
    };

    let base_order = match opts.order_function {
        OrderFunction::Natural => natural_compare(a, b, opts.ignore_case),
        OrderFunction::Ascii => a.as_bytes().cmp(b.as_bytes()),
        OrderFunction::Locale => collator.sort_key(a).cmp(&collator.sort_key(b)),
    };

    apply_reverse(base_order, opts)
}

fn apply_reverse(order: Ordering, opts: &SortOptions) -> Ordering {
    if opts.reverse_multiplier() < 0 {
        order.reverse()
    } else {
        order
    }
}

/// The shared tail of the comparator once positional overrides are out of
/// the way: directory grouping, modification time, then name comparison.
fn compare_by_options<T: Comparable>(
    a: &T,
    b: &T,
    opts: &SortOptions,
    collator: &dyn Collator,
) -> Ordering {
    match opts.order {
        GroupOrder::Mixed => {}
        GroupOrder::DirsFirst => {
            if a.is_directory() != b.is_directory() {
                return if a.is_directory() { Ordering::Less } else { Ordering::Greater };
            }
        }
        GroupOrder::FilesFirst => {
            if a.is_directory() != b.is_directory() {
                return if a.is_directory() { Ordering::Greater } else { Ordering::Less };
            }
        }
    }

    if opts.modification_time {
        let order = a.modification_time_key().cmp(&b.modification_time_key());
        let order = apply_reverse(order, opts);
        if order != Ordering::Equal {
            return order;
        }
    }

    compare_names(a.display_name(), b.display_name(), opts, collator)
}

pub fn compare_fat1x(
    a: &Fat1xRecord,
    b: &Fat1xRecord,
    opts: &SortOptions,
    collator: &dyn Collator,
) -> Ordering {
    if let Some(order) = positional_override(a, b, opts) {
        return order;
    }
    compare_by_options(a, b, opts, collator)
}

/// exFAT's positional rules add one thing FAT1x/32 does not have: sets with
/// no real name (volume label, allocation bitmap, upcase table, volume GUID
/// — every primary other than File) sort together, ahead of real files.
pub fn compare_exfat(
    a: &ExFatRecord,
    b: &ExFatRecord,
    opts: &SortOptions,
    collator: &dyn Collator,
) -> Ordering {
    if let Some(order) = positional_override(a, b, opts) {
        return order;
    }
    if a.has_real_name() != b.has_real_name() {
        return if a.has_real_name() { Ordering::Greater } else { Ordering::Less };
    }
    if !a.has_real_name() && !b.has_real_name() {
        return Ordering::Equal;
    }
    compare_by_options(a, b, opts, collator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatsort_core::collator::AsciiCollator;

    fn entry(name: &str, attrs: u8) -> Fat1xRecord {
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
    fn dirs_first_beats_name_order() {
        let opts = SortOptions::default();
        let collator = AsciiCollator;
        let dir = entry("ZDIR", 0x10);
        let file = entry("AFILE", 0x20);
        assert_eq!(compare_fat1x(&dir, &file, &opts, &collator), Ordering::Less);
    }

    #[test]
    fn dot_and_dotdot_are_anchored() {
        let opts = SortOptions::default();
        let collator = AsciiCollator;
        let dot = entry(".", 0x10);
        let dotdot = entry("..", 0x10);
        let other = entry("ADIR", 0x10);
        assert_eq!(compare_fat1x(&dot, &dotdot, &opts, &collator), Ordering::Less);
        assert_eq!(compare_fat1x(&dotdot, &other, &opts, &collator), Ordering::Less);
    }

    #[test]
    fn deleted_sorts_last() {
        let opts = SortOptions::default();
        let collator = AsciiCollator;
        let mut deleted = entry("FOO", 0);
        deleted.short_slot[0] = 0xE5;
        let live = entry("BAR", 0);
        assert_eq!(compare_fat1x(&deleted, &live, &opts, &collator), Ordering::Greater);
    }
}
