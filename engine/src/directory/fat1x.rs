//! FAT1x/32 record assembler (§4.4): folds the 32-byte raw entry stream
//! into records, each a short entry plus its preceding long-name entries.

use fatsort_core::error::{EngineError, Result};

use super::entry::{self, FatAttributes};
use super::long_name;

#[derive(Debug, Clone)]
pub struct Fat1xRecord {
    /// Long-name entries in stream order (highest ordinal first).
    pub long_slots: Vec<[u8; 32]>,
    pub short_slot: [u8; 32],
    pub short_name: String,
    pub long_name: Option<String>,
}

impl Fat1xRecord {
    pub fn display_name(&self) -> &str {
        self.long_name.as_deref().filter(|s| !s.is_empty()).unwrap_or(&self.short_name)
    }

    pub fn attributes(&self) -> FatAttributes {
        entry::attributes(&self.short_slot)
    }

    pub fn is_deleted(&self) -> bool {
        entry::is_deleted(&self.short_slot)
    }

    pub fn is_volume_label(&self) -> bool {
        self.attributes().is_volume_label()
    }

    pub fn is_dot(&self) -> bool {
        self.short_name == "."
    }

    pub fn is_dotdot(&self) -> bool {
        self.short_name == ".."
    }

    pub fn is_directory(&self) -> bool {
        self.attributes().is_directory()
    }

    pub fn first_cluster(&self) -> u32 {
        entry::first_cluster(&self.short_slot)
    }

    pub fn write_time_key(&self) -> u32 {
        entry::write_time_key(&self.short_slot)
    }

    /// Slots in the order they must be written: long entries (stream
    /// order), then the short entry.
    pub fn slots(&self) -> Vec<[u8; 32]> {
        let mut out = Vec::with_capacity(self.long_slots.len() + 1);
        out.extend_from_slice(&self.long_slots);
        out.push(self.short_slot);
        out
    }

    pub fn slot_count(&self) -> usize {
        self.long_slots.len() + 1
    }
}

/// Verifies the cross-entry invariants of §3/§4.4 for a non-deleted record:
/// LAST-flag on the earliest long entry, contiguous descending ordinals,
/// and a checksum match on every long entry.
fn verify_long_entries(long_slots: &[[u8; 32]], short_slot: &[u8; 32]) -> Result<()> {
    if long_slots.is_empty() {
        return Ok(());
    }
    let n = long_slots.len() as u8;
    if !long_name::has_last_flag(&long_slots[0]) {
        return Err(EngineError::BadOrdinal {
            expected: n | long_name::LAST_LONG_ENTRY_FLAG,
            found: long_name::ordinal(&long_slots[0]),
        });
    }
    for (i, slot) in long_slots.iter().enumerate() {
        let expected = n - i as u8;
        let found = long_name::ordinal(slot);
        if found != expected {
            return Err(EngineError::BadOrdinal { expected, found });
        }
    }
    let short_name_bytes: [u8; 11] = short_slot[0..11].try_into().unwrap();
    let expected_checksum = long_name::calculate_checksum(&short_name_bytes);
    for slot in long_slots {
        let found = long_name::entry_checksum(slot);
        if found != expected_checksum {
            return Err(EngineError::ChecksumMismatch(format!(
                "long-name checksum mismatch: expected 0x{:02X}, found 0x{:02X}",
                expected_checksum, found
            )));
        }
    }
    Ok(())
}

/// Assembles the raw 32-byte slot stream of a directory into records,
/// stopping at the first end-of-directory slot.
pub fn assemble(slots: &[[u8; 32]]) -> Result<Vec<Fat1xRecord>> {
    let mut records = Vec::new();
    let mut pending: Vec<[u8; 32]> = Vec::new();

    for slot in slots {
        if entry::is_end_of_directory(slot) {
            if !pending.is_empty() {
                return Err(EngineError::OrphanLongEntries);
            }
            break;
        }

        let attrs = entry::attributes(slot);
        if attrs.is_long_name() {
            pending.push(*slot);
            continue;
        }

        let is_deleted = entry::is_deleted(slot);
        if !is_deleted {
            verify_long_entries(&pending, slot)?;
        }

        let long_name = if is_deleted {
            None
        } else {
            long_name::decode_long_name(&pending)
        };

        records.push(Fat1xRecord {
            long_slots: std::mem::take(&mut pending),
            short_slot: *slot,
            short_name: entry::decode_short_name(slot),
            long_name,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_entry(name: &str, attrs: u8) -> [u8; 32] {
        let mut slot = [0x20u8; 32];
        let bytes = name.as_bytes();
        slot[..bytes.len().min(11)].copy_from_slice(&bytes[..bytes.len().min(11)]);
        slot[11] = attrs;
        slot
    }

    #[test]
    fn assembles_plain_short_entries() {
        let slots = vec![short_entry("FOO        ", 0), short_entry("BAR        ", 0)];
        let records = assemble(&slots).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].short_name, "FOO");
    }

    #[test]
    fn assembles_with_long_name() {
        let short = short_entry("LONGNA~1TXT", 0x20);
        let short_name_bytes: [u8; 11] = short[0..11].try_into().unwrap();
        let long_entries = long_name::encode_long_name("a rather long name.txt", &short_name_bytes);
        let mut slots = long_entries.clone();
        slots.push(short);
        let records = assemble(&slots).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].display_name(), "a rather long name.txt");
    }

    #[test]
    fn stops_at_end_marker() {
        let mut slots = vec![short_entry("FOO        ", 0)];
        slots.push([0u8; 32]);
        slots.push(short_entry("NEVERSEEN", 0));
        let records = assemble(&slots).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn deleted_short_entry_without_long_name_verification() {
        let mut slot = short_entry("FOO        ", 0);
        slot[0] = 0xE5;
        let records = assemble(&[slot]).unwrap();
        assert!(records[0].is_deleted());
    }
}
