//! Exercises the real-file device adapter end to end: write a synthetic
//! FAT16 image to disk, sort it through `FileDevice`, read it back.

use std::io::Write;

use fatsort_core::collator::AsciiCollator;
use fatsort_core::device::FileDevice;
use fatsort_core::options::SortOptions;
use fatsort_core::selection::Selection;

fn fat16_image_with_root(entries: &[(&str, u8)]) -> Vec<u8> {
    let mut img = vec![0u8; 512 * 64];
    img[0] = 0xEB;
    img[1] = 0x3C;
    img[2] = 0x90;
    img[3..11].copy_from_slice(b"MSDOS5.0");
    img[11..13].copy_from_slice(&512u16.to_le_bytes());
    img[13] = 1;
    img[14..16].copy_from_slice(&1u16.to_le_bytes());
    img[16] = 1;
    img[17..19].copy_from_slice(&16u16.to_le_bytes());
    img[19..21].copy_from_slice(&64u16.to_le_bytes());
    img[21] = 0xF8;
    img[22..24].copy_from_slice(&4u16.to_le_bytes());
    img[510] = 0x55;
    img[511] = 0xAA;

    let root_start = 5 * 512;
    for (i, (name, attrs)) in entries.iter().enumerate() {
        let offset = root_start + i * 32;
        let bytes = name.as_bytes();
        img[offset..offset + bytes.len().min(11)].copy_from_slice(&bytes[..bytes.len().min(11)]);
        img[offset + 11] = *attrs;
    }
    img
}

#[test]
fn sorts_a_real_file_backed_volume() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&fat16_image_with_root(&[("ZEBRA", 0), ("APPLE", 0), ("MANGO", 0)]))
        .unwrap();
    file.flush().unwrap();

    let mut device = FileDevice::open(file.path(), true).unwrap();
    let opts = SortOptions::default();
    let selection = Selection::All;
    let collator = AsciiCollator;

    let report = fatsort_engine::sort_volume(&mut device, &opts, &selection, &collator).unwrap();
    assert_eq!(report.directories_written, 1);
    assert_eq!(report.entries[0].1, vec!["APPLE", "MANGO", "ZEBRA"]);

    // A second pass over the now-sorted image must be a no-op (§8 property 1/2).
    let mut device = FileDevice::open(file.path(), true).unwrap();
    let report = fatsort_engine::sort_volume(&mut device, &opts, &selection, &collator).unwrap();
    assert_eq!(report.directories_written, 0);
}
