//! Top-level orchestration (§2 data flow, §4.8): open a volume, walk its
//! directory tree from the root, sort each selected directory, recurse.

use fatsort_core::collator::Collator;
use fatsort_core::device::BlockDevice;
use fatsort_core::error::Result;
use fatsort_core::options::SortOptions;
use fatsort_core::selection::Selection;

use crate::directory;
use crate::fat_walker;
use crate::sort;
use crate::stream::{self, DirectorySource};
use crate::volume::{self, FatKind, Geometry};

/// Summary of one full sort pass over a volume, enough for the CLI's
/// `info`/`more-info`/`list-only` reporting without exposing engine
/// internals.
#[derive(Debug, Default)]
pub struct SortReport {
    pub directories_visited: u32,
    pub directories_written: u32,
    /// Normalized directory path paired with its post-sort display-name
    /// order, for every directory that was selected.
    pub entries: Vec<(String, Vec<String>)>,
    /// The volume's derived geometry, for `--info`/`--more-info` reporting.
    pub geometry: Option<Geometry>,
    /// exFAT only: the root directory's allocation-bitmap primary, if one was
    /// found (first cluster, length in bytes), for `--more-info` reporting.
    pub allocation_bitmap: Option<(u32, u64)>,
}

fn read_all_slots(device: &mut dyn BlockDevice, source: &DirectorySource) -> Result<Vec<[u8; 32]>> {
    let count = source.slot_count();
    let mut raw = Vec::with_capacity(count as usize);
    for i in 0..count {
        raw.push(source.read_slot(device, i)?);
    }
    Ok(raw)
}

fn process_fat1x_directory(
    device: &mut dyn BlockDevice,
    geometry: &Geometry,
    source: &DirectorySource,
    path: &str,
    opts: &SortOptions,
    selection: &Selection,
    collator: &dyn Collator,
    report: &mut SortReport,
) -> Result<()> {
    report.directories_visited += 1;

    let raw = read_all_slots(device, source)?;
    let records = directory::fat1x::assemble(&raw)?;
    log::debug!("{}: {} slots, {} records", path, raw.len(), records.len());

    if selection.matches(path) {
        let compare = sort::compare_fat1x_records(opts, collator);
        let outcome = sort::sort_directory(device, source, records.clone(), opts, compare)?;
        if outcome.written {
            report.directories_written += 1;
            log::info!("{}: reordered, {} slots written", path, outcome.display_order.len());
        } else {
            log::debug!("{}: already in order, no write", path);
        }
        report.entries.push((path.to_string(), outcome.display_order));
    } else {
        log::debug!("{}: not selected, skipping sort", path);
    }

    for record in &records {
        if let Some(cluster) = sort::Record::recursion_cluster(record) {
            let chain = fat_walker::walk_chain(device, geometry, cluster)?;
            let child_source = stream::cluster_chain_source(
                chain,
                geometry.cluster_size,
                geometry.first_data_sector,
                geometry.sector_size,
            );
            let child_path = format!("{}{}/", path, record.display_name());
            process_fat1x_directory(
                device,
                geometry,
                &child_source,
                &child_path,
                opts,
                selection,
                collator,
                report,
            )?;
        }
    }

    Ok(())
}

/// Builds the `DirectorySource` for an exFAT subdirectory's Stream
/// Extension, honoring the `NoFatChain` contiguous shortcut when set
/// (§4.1, §4.7).
fn exfat_child_source(
    device: &mut dyn BlockDevice,
    geometry: &Geometry,
    record: &directory::ExFatRecord,
) -> Result<DirectorySource> {
    let first_cluster = record.first_cluster().unwrap_or(0);
    let clusters = if record.is_no_fat_chain() {
        let valid_data_length = record.valid_data_length();
        let cluster_count =
            ((valid_data_length + geometry.cluster_size as u64 - 1) / geometry.cluster_size as u64).max(1) as u32;
        (first_cluster..first_cluster + cluster_count).collect()
    } else {
        fat_walker::walk_chain(device, geometry, first_cluster)?
    };
    Ok(stream::cluster_chain_source(
        clusters,
        geometry.cluster_size,
        geometry.first_data_sector,
        geometry.sector_size,
    ))
}

fn process_exfat_directory(
    device: &mut dyn BlockDevice,
    geometry: &Geometry,
    source: &DirectorySource,
    path: &str,
    opts: &SortOptions,
    selection: &Selection,
    collator: &dyn Collator,
    report: &mut SortReport,
) -> Result<()> {
    report.directories_visited += 1;

    let raw = read_all_slots(device, source)?;
    let records = directory::exfat::assemble(&raw)?;
    log::debug!("{}: {} slots, {} entry sets", path, raw.len(), records.len());

    if path == "/" {
        let flat: Vec<u8> = raw.iter().flatten().copied().collect();
        report.allocation_bitmap = volume::find_allocation_bitmap(&flat);
    }

    if selection.matches(path) {
        let compare = sort::compare_exfat_records(opts, collator);
        let outcome = sort::sort_directory(device, source, records.clone(), opts, compare)?;
        if outcome.written {
            report.directories_written += 1;
            log::info!("{}: reordered, {} slots written", path, outcome.display_order.len());
        } else {
            log::debug!("{}: already in order, no write", path);
        }
        report.entries.push((path.to_string(), outcome.display_order));
    } else {
        log::debug!("{}: not selected, skipping sort", path);
    }

    for record in &records {
        if sort::Record::recursion_cluster(record).is_some() {
            let child_source = exfat_child_source(device, geometry, record)?;
            let child_path = format!("{}{}/", path, record.display_name());
            process_exfat_directory(
                device,
                geometry,
                &child_source,
                &child_path,
                opts,
                selection,
                collator,
                report,
            )?;
        }
    }

    Ok(())
}

/// Opens `device` as a FAT-family volume and sorts every selected directory
/// in its tree, starting at the root. Dispatches on the volume's on-disk
/// kind to the FAT1x static-root handler, the FAT32 cluster-chain-rooted
/// handler, or the exFAT handler.
pub fn sort_volume(
    device: &mut dyn BlockDevice,
    opts: &SortOptions,
    selection: &Selection,
    collator: &dyn Collator,
) -> Result<SortReport> {
    let geometry = volume::open_volume(device)?;
    volume::verify_fat_copies(device, &geometry)?;

    let mut report = SortReport::default();

    match geometry.kind {
        FatKind::Fat12 | FatKind::Fat16 => {
            let source = stream::static_root_source(
                geometry.root_dir_sector,
                geometry.sector_size,
                geometry.root_entry_count,
            );
            process_fat1x_directory(device, &geometry, &source, "/", opts, selection, collator, &mut report)?;
        }
        FatKind::Fat32 => {
            let chain = fat_walker::walk_chain(device, &geometry, geometry.root_cluster)?;
            let source = stream::cluster_chain_source(
                chain,
                geometry.cluster_size,
                geometry.first_data_sector,
                geometry.sector_size,
            );
            process_fat1x_directory(device, &geometry, &source, "/", opts, selection, collator, &mut report)?;
        }
        FatKind::ExFat => {
            let chain = fat_walker::walk_chain(device, &geometry, geometry.root_cluster)?;
            let source = stream::cluster_chain_source(
                chain,
                geometry.cluster_size,
                geometry.first_data_sector,
                geometry.sector_size,
            );
            process_exfat_directory(device, &geometry, &source, "/", opts, selection, collator, &mut report)?;
        }
    }

    report.geometry = Some(geometry);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatsort_core::collator::AsciiCollator;
    use fatsort_core::device::MemoryDevice;

    /// Builds a minimal FAT16 image with a root directory containing two
    /// out-of-order short entries and no subdirectories.
    fn fat16_image_with_root(entries: &[(&str, u8)]) -> Vec<u8> {
        let mut img = vec![0u8; 512 * 64];
        img[0] = 0xEB;
        img[1] = 0x3C;
        img[2] = 0x90;
        img[3..11].copy_from_slice(b"MSDOS5.0");
        img[11..13].copy_from_slice(&512u16.to_le_bytes());
        img[13] = 1; // sectors per cluster
        img[14..16].copy_from_slice(&1u16.to_le_bytes()); // reserved sectors
        img[16] = 1; // num fats
        img[17..19].copy_from_slice(&16u16.to_le_bytes()); // root entries
        img[19..21].copy_from_slice(&64u16.to_le_bytes()); // total sectors 16
        img[21] = 0xF8;
        img[22..24].copy_from_slice(&4u16.to_le_bytes()); // sectors per fat 16
        img[510] = 0x55;
        img[511] = 0xAA;

        // root dir starts right after reserved (1) + fat (4) sectors.
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
    fn sorts_root_directory_in_place() {
        let img = fat16_image_with_root(&[("ZZZ", 0), ("AAA", 0)]);
        let mut dev = MemoryDevice::new(img);
        let opts = SortOptions::default();
        let selection = Selection::All;
        let collator = AsciiCollator;
        let report = sort_volume(&mut dev, &opts, &selection, &collator).unwrap();
        assert_eq!(report.directories_visited, 1);
        assert_eq!(report.directories_written, 1);
        assert_eq!(report.entries[0].1, vec!["AAA", "ZZZ"]);
    }

    #[test]
    fn list_only_leaves_bytes_untouched() {
        let img = fat16_image_with_root(&[("ZZZ", 0), ("AAA", 0)]);
        let mut dev = MemoryDevice::new(img.clone());
        let mut opts = SortOptions::default();
        opts.list_only = true;
        let selection = Selection::All;
        let collator = AsciiCollator;
        let report = sort_volume(&mut dev, &opts, &selection, &collator).unwrap();
        assert_eq!(report.directories_written, 0);
        assert_eq!(dev.as_slice(), img.as_slice());
    }
}
