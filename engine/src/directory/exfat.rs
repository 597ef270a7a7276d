//! exFAT entry-set assembler (§4.5): folds the 32-byte raw entry stream
//! into entry sets — a primary entry plus its ordered secondaries.

use fatsort_core::error::{EngineError, Result};

const IN_USE: u8 = 0x80;
const SECONDARY: u8 = 0x40;
const TYPE_MASK: u8 = 0x1F;

const TYPE_FILE: u8 = 0x05;
const TYPE_STREAM_EXTENSION: u8 = 0x00;
const TYPE_FILE_NAME: u8 = 0x01;

pub const ENTRY_TYPE_FILE: u8 = IN_USE | TYPE_FILE; // 0x85
const ENTRY_TYPE_FILE_DELETED: u8 = TYPE_FILE; // 0x05
const ENTRY_TYPE_STREAM_EXT: u8 = IN_USE | SECONDARY | TYPE_STREAM_EXTENSION; // 0xC0
const ENTRY_TYPE_STREAM_EXT_DELETED: u8 = SECONDARY | TYPE_STREAM_EXTENSION; // 0x40
const ENTRY_TYPE_FILE_NAME: u8 = IN_USE | SECONDARY | TYPE_FILE_NAME; // 0xC1
const ENTRY_TYPE_FILE_NAME_DELETED: u8 = SECONDARY | TYPE_FILE_NAME; // 0x41
const END_OF_DIRECTORY: u8 = 0x00;

const NO_FAT_CHAIN_FLAG: u8 = 0x02;

#[derive(Debug, Clone)]
pub struct ExFatRecord {
    pub primary: [u8; 32],
    /// Secondaries in stream order: Stream Extension first, then File Name
    /// Extensions.
    pub secondaries: Vec<[u8; 32]>,
    pub name: Option<String>,
}

impl ExFatRecord {
    pub fn is_file(&self) -> bool {
        self.primary[0] & TYPE_MASK == TYPE_FILE && self.primary[0] & SECONDARY == 0
    }

    pub fn is_deleted(&self) -> bool {
        self.is_file() && self.primary[0] & IN_USE == 0
    }

    /// Non-File primaries (volume label, allocation bitmap, upcase table,
    /// GUID, ...) have fewer than 3 total slots and sort together, ahead of
    /// real File entries (§4.6 exFAT comparator note).
    pub fn has_real_name(&self) -> bool {
        self.is_file()
    }

    pub fn is_volume_label(&self) -> bool {
        self.primary[0] & TYPE_MASK == 0x03 && self.primary[0] & SECONDARY == 0
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn is_directory(&self) -> bool {
        if !self.is_file() {
            return false;
        }
        let file_attributes = u16::from_le_bytes([self.primary[4], self.primary[5]]);
        file_attributes & 0x10 != 0
    }

    pub fn modification_time_key(&self) -> u64 {
        let last_modified = u32::from_le_bytes([
            self.primary[8],
            self.primary[9],
            self.primary[10],
            self.primary[11],
        ]) as u64;
        let last_modified_10ms = self.primary[17] as u64;
        (last_modified << 8) | last_modified_10ms
    }

    fn stream_extension(&self) -> Option<&[u8; 32]> {
        self.secondaries.first()
    }

    pub fn first_cluster(&self) -> Option<u32> {
        self.stream_extension().map(|s| u32::from_le_bytes([s[20], s[21], s[22], s[23]]))
    }

    pub fn is_no_fat_chain(&self) -> bool {
        self.stream_extension().map(|s| s[1] & NO_FAT_CHAIN_FLAG != 0).unwrap_or(false)
    }

    pub fn valid_data_length(&self) -> u64 {
        self.stream_extension()
            .map(|s| {
                u64::from_le_bytes([s[8], s[9], s[10], s[11], s[12], s[13], s[14], s[15]])
            })
            .unwrap_or(0)
    }

    /// Slots in the order they must be written: primary, then secondaries.
    pub fn slots(&self) -> Vec<[u8; 32]> {
        let mut out = Vec::with_capacity(1 + self.secondaries.len());
        out.push(self.primary);
        out.extend_from_slice(&self.secondaries);
        out
    }

    pub fn slot_count(&self) -> usize {
        1 + self.secondaries.len()
    }
}

fn decode_name(secondaries: &[[u8; 32]], name_length: usize) -> String {
    let mut units = Vec::with_capacity(name_length);
    for secondary in secondaries.iter().skip(1) {
        for pair in secondary[2..32].chunks_exact(2) {
            if units.len() >= name_length {
                break;
            }
            units.push(u16::from_le_bytes([pair[0], pair[1]]));
        }
    }
    char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or('?'))
        .collect()
}

/// §3: rotate-right-1-then-add 16-bit checksum over every byte of the set
/// except bytes 2-3 of the File entry (the checksum field itself).
fn set_checksum(primary: &[u8; 32], secondaries: &[[u8; 32]]) -> u16 {
    let mut checksum: u16 = 0;
    for (i, &byte) in primary.iter().enumerate() {
        if i == 2 || i == 3 {
            continue;
        }
        checksum = checksum.rotate_right(1).wrapping_add(byte as u16);
    }
    for secondary in secondaries {
        for &byte in secondary {
            checksum = checksum.rotate_right(1).wrapping_add(byte as u16);
        }
    }
    checksum
}

fn verify_file_set(primary: &[u8; 32], secondaries: &[[u8; 32]]) -> Result<()> {
    let name_length = primary[3] as usize;
    let expected_secondary_count = secondaries.len() as u8;
    if name_length > 15 * expected_secondary_count.saturating_sub(1) as usize {
        return Err(EngineError::BadSecondaryCount(expected_secondary_count + 1));
    }
    let computed = set_checksum(primary, secondaries);
    let stored = u16::from_le_bytes([primary[2], primary[3]]);
    if computed != stored {
        return Err(EngineError::ChecksumMismatch(format!(
            "exFAT entry-set checksum mismatch: expected 0x{:04X}, found 0x{:04X}",
            stored, computed
        )));
    }
    Ok(())
}

/// Assembles the raw 32-byte slot stream of an exFAT directory into entry
/// sets, stopping at the first end-of-directory slot.
pub fn assemble(slots: &[[u8; 32]]) -> Result<Vec<ExFatRecord>> {
    let mut records = Vec::new();
    let mut i = 0;

    while i < slots.len() {
        let slot = &slots[i];
        let type_byte = slot[0];

        if type_byte == END_OF_DIRECTORY {
            break;
        }

        if type_byte == ENTRY_TYPE_FILE || type_byte == ENTRY_TYPE_FILE_DELETED {
            let live = type_byte == ENTRY_TYPE_FILE;
            let secondary_count = slot[1];
            if !(2..=18).contains(&secondary_count) {
                return Err(EngineError::BadSecondaryCount(secondary_count));
            }
            let expected = secondary_count as usize + 1;
            if i + expected > slots.len() {
                return Err(EngineError::IncompleteSet {
                    expected: secondary_count,
                    found: (slots.len() - i - 1) as u8,
                });
            }
            let secondaries = &slots[i + 1..i + expected];

            let want_stream = if live {
                ENTRY_TYPE_STREAM_EXT
            } else {
                ENTRY_TYPE_STREAM_EXT_DELETED
            };
            let want_name = if live {
                ENTRY_TYPE_FILE_NAME
            } else {
                ENTRY_TYPE_FILE_NAME_DELETED
            };
            if secondaries.is_empty() || secondaries[0][0] != want_stream {
                return Err(EngineError::IncompleteSet {
                    expected: secondary_count,
                    found: 0,
                });
            }
            for secondary in &secondaries[1..] {
                if secondary[0] != want_name {
                    return Err(EngineError::IncompleteSet {
                        expected: secondary_count,
                        found: secondaries.len() as u8,
                    });
                }
            }

            let name_length = slot[3] as usize;
            let name = if live {
                if secondaries.len() < 2 {
                    None
                } else {
                    Some(decode_name(secondaries, name_length))
                }
            } else {
                None
            };

            if live {
                verify_file_set(slot, secondaries)?;
            }

            records.push(ExFatRecord {
                primary: *slot,
                secondaries: secondaries.to_vec(),
                name,
            });
            i += expected;
            continue;
        }

        // Any other primary (volume label, allocation bitmap, upcase
        // table, GUID, TexFAT padding, ...) is a singleton set.
        records.push(ExFatRecord {
            primary: *slot,
            secondaries: Vec::new(),
            name: None,
        });
        i += 1;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_extension(first_cluster: u32, name_length: u8) -> [u8; 32] {
        let mut slot = [0u8; 32];
        slot[0] = ENTRY_TYPE_STREAM_EXT;
        slot[3] = name_length;
        slot[20..24].copy_from_slice(&first_cluster.to_le_bytes());
        slot
    }

    fn name_extension(chars: &str) -> [u8; 32] {
        let mut slot = [0u8; 32];
        slot[0] = ENTRY_TYPE_FILE_NAME;
        for (i, unit) in chars.encode_utf16().enumerate().take(15) {
            let b = unit.to_le_bytes();
            slot[2 + i * 2] = b[0];
            slot[3 + i * 2] = b[1];
        }
        slot
    }

    fn build_file_set(name: &str, first_cluster: u32) -> Vec<[u8; 32]> {
        let stream = stream_extension(first_cluster, name.encode_utf16().count() as u8);
        let name_entry = name_extension(name);
        let secondaries = vec![stream, name_entry];
        let mut primary = [0u8; 32];
        primary[0] = ENTRY_TYPE_FILE;
        primary[1] = secondaries.len() as u8;
        primary[3] = name.encode_utf16().count() as u8;
        let checksum = set_checksum(&primary, &secondaries);
        primary[2..4].copy_from_slice(&checksum.to_le_bytes());
        let mut out = vec![primary];
        out.extend(secondaries);
        out
    }

    #[test]
    fn assembles_single_file_set() {
        let slots = build_file_set("song.mp3", 5);
        let records = assemble(&slots).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].display_name(), "song.mp3");
        assert_eq!(records[0].first_cluster(), Some(5));
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut slots = build_file_set("song.mp3", 5);
        slots[0][2] ^= 0xFF;
        let err = assemble(&slots).unwrap_err();
        assert!(matches!(err, EngineError::ChecksumMismatch(_)));
    }

    #[test]
    fn singleton_non_file_primary() {
        let mut slot = [0u8; 32];
        slot[0] = 0x83; // volume label
        let records = assemble(&[slot]).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].has_real_name());
    }
}
