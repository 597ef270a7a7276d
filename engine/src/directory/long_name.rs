//! VFAT long-filename entries (§3, §4.4): 13 UTF-16LE code units per entry
//! split across three discontiguous byte regions, with an ordinal/LAST-flag
//! sequence and a rotate-and-add checksum tying each entry to its short
//! entry.

pub const ATTR_LONG_NAME: u8 = 0x0F;
pub const LAST_LONG_ENTRY_FLAG: u8 = 0x40;
const ORDINAL_MASK: u8 = 0x3F;

/// Byte offsets of the three UTF-16LE name regions within a 32-byte slot.
const NAME1_RANGE: std::ops::Range<usize> = 1..11; // 5 chars
const NAME2_RANGE: std::ops::Range<usize> = 14..26; // 6 chars
const NAME3_RANGE: std::ops::Range<usize> = 28..32; // 2 chars

pub fn ordinal(slot: &[u8; 32]) -> u8 {
    slot[0] & ORDINAL_MASK
}

pub fn has_last_flag(slot: &[u8; 32]) -> bool {
    slot[0] & LAST_LONG_ENTRY_FLAG != 0
}

pub fn entry_checksum(slot: &[u8; 32]) -> u8 {
    slot[13]
}

/// §3: rotate-right-1-then-add over the 11-byte short name.
pub fn calculate_checksum(short_name: &[u8; 11]) -> u8 {
    let mut sum: u8 = 0;
    for &byte in short_name {
        sum = ((sum >> 1) | (sum << 7)).wrapping_add(byte);
    }
    sum
}

/// Decodes the long name from its long-name entries, given in stream order
/// (the order they occur in the directory, i.e. highest ordinal first).
/// Returns `None` if the slice is empty.
pub fn decode_long_name(long_slots_stream_order: &[[u8; 32]]) -> Option<String> {
    if long_slots_stream_order.is_empty() {
        return None;
    }
    let mut units: Vec<u16> = Vec::new();
    // Display order is the reverse of stream order.
    for slot in long_slots_stream_order.iter().rev() {
        let mut stop = false;
        for range in [NAME1_RANGE, NAME2_RANGE, NAME3_RANGE] {
            if stop {
                break;
            }
            for pair in slot[range].chunks_exact(2) {
                let unit = u16::from_le_bytes([pair[0], pair[1]]);
                if unit == 0x0000 || unit == 0xFFFF {
                    stop = true;
                    break;
                }
                units.push(unit);
            }
        }
    }
    Some(String::from_utf16_lossy(&units))
}

/// Builds the long-name entries for `name`, in stream order (highest
/// ordinal first, immediately preceding the short entry it attaches to).
pub fn encode_long_name(name: &str, short_name: &[u8; 11]) -> Vec<[u8; 32]> {
    let checksum = calculate_checksum(short_name);
    let units: Vec<u16> = name.encode_utf16().collect();
    let entry_count = ((units.len() + 12) / 13).max(1);

    let mut entries = Vec::with_capacity(entry_count);
    for i in 0..entry_count {
        let base = i * 13;
        let mut chars = [0xFFFFu16; 13];
        let mut terminated = false;
        for (j, slot_char) in chars.iter_mut().enumerate() {
            let idx = base + j;
            if idx < units.len() {
                *slot_char = units[idx];
            } else if !terminated {
                *slot_char = 0x0000;
                terminated = true;
            }
        }

        let mut slot = [0u8; 32];
        let mut ordinal_byte = (i as u8) + 1;
        if i == entry_count - 1 {
            ordinal_byte |= LAST_LONG_ENTRY_FLAG;
        }
        slot[0] = ordinal_byte;
        for (k, c) in chars[0..5].iter().enumerate() {
            let b = c.to_le_bytes();
            slot[1 + k * 2] = b[0];
            slot[2 + k * 2] = b[1];
        }
        slot[11] = ATTR_LONG_NAME;
        slot[12] = 0;
        slot[13] = checksum;
        for (k, c) in chars[5..11].iter().enumerate() {
            let b = c.to_le_bytes();
            slot[14 + k * 2] = b[0];
            slot[15 + k * 2] = b[1];
        }
        slot[26] = 0;
        slot[27] = 0;
        for (k, c) in chars[11..13].iter().enumerate() {
            let b = c.to_le_bytes();
            slot[28 + k * 2] = b[0];
            slot[29 + k * 2] = b[1];
        }
        entries.push(slot);
    }
    // Stream order is highest ordinal first.
    entries.reverse();
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_name() {
        let short_name = b"TEST    TXT";
        let entries = encode_long_name("test-long-name.txt", short_name);
        assert!(has_last_flag(&entries[0]));
        let decoded = decode_long_name(&entries).unwrap();
        assert_eq!(decoded, "test-long-name.txt");
        for e in &entries {
            assert_eq!(entry_checksum(e), calculate_checksum(short_name));
        }
    }

    #[test]
    fn ordinals_count_down_from_stream_start() {
        let short_name = b"LONGNA~1TXT";
        let entries =
            encode_long_name("a-rather-long-file-name-needing-several-entries.txt", short_name);
        let n = entries.len() as u8;
        assert_eq!(ordinal(&entries[0]), n);
        assert_eq!(ordinal(&entries[entries.len() - 1]), 1);
    }
}
