//! Volume layout: boot-sector parsing and validation, geometry derivation,
//! and exFAT allocation-bitmap discovery (§4.1).

use std::fmt;

use fatsort_core::device::BlockDevice;
use fatsort_core::error::{EngineError, Result};

/// Common BPB fields, identical in layout for FAT12/16/32 (the first 36
/// bytes of the boot sector).
#[repr(C, packed(1))]
#[derive(Clone, Copy)]
pub struct FatCommonBpb {
    pub jump_boot: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub root_entries: u16,
    pub total_sectors_16: u16,
    pub media_descriptor: u8,
    pub sectors_per_fat_16: u16,
    pub sectors_per_track: u16,
    pub num_heads: u16,
    pub hidden_sectors: u32,
    pub total_sectors_32: u32,
}

impl fmt::Debug for FatCommonBpb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes_per_sector = self.bytes_per_sector;
        let sectors_per_cluster = self.sectors_per_cluster;
        f.debug_struct("FatCommonBpb")
            .field("bytes_per_sector", &bytes_per_sector)
            .field("sectors_per_cluster", &sectors_per_cluster)
            .finish()
    }
}

/// FAT32-only extension (offset 0x24 onward).
#[repr(C, packed(1))]
#[derive(Debug, Clone, Copy)]
pub struct Fat32ExtendedBpb {
    pub sectors_per_fat_32: u32,
    pub ext_flags: u16,
    pub fs_version: u16,
    pub root_cluster: u32,
    pub fs_info: u16,
    pub backup_boot_sector: u16,
    pub reserved: [u8; 12],
    pub drive_number: u8,
    pub reserved1: u8,
    pub boot_signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub fs_type: [u8; 8],
}

/// FAT12/16 extension (offset 0x24 onward).
#[repr(C, packed(1))]
#[derive(Debug, Clone, Copy)]
pub struct Fat16ExtendedBpb {
    pub drive_number: u8,
    pub reserved: u8,
    pub boot_signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub fs_type: [u8; 8],
}

/// exFAT boot sector (offset 0x0B onward differs entirely from the FAT1x/32
/// layout; bytes 0x0B..0x40 are the reserved zero region checked in §4.1).
#[repr(C, packed(1))]
#[derive(Clone, Copy)]
pub struct ExFatBootSector {
    pub jump_boot: [u8; 3],
    pub fs_name: [u8; 8],
    pub must_be_zero: [u8; 53],
    pub partition_offset: u64,
    pub volume_length: u64,
    pub fat_offset: u32,
    pub fat_length: u32,
    pub cluster_heap_offset: u32,
    pub cluster_count: u32,
    pub root_dir_cluster: u32,
    pub volume_serial: u32,
    pub fs_revision: u16,
    pub volume_flags: u16,
    pub bytes_per_sector_shift: u8,
    pub sectors_per_cluster_shift: u8,
    pub num_fats: u8,
    pub drive_select: u8,
    pub percent_in_use: u8,
    pub reserved: [u8; 7],
}

impl fmt::Debug for ExFatBootSector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cluster_count = self.cluster_count;
        let bps_shift = self.bytes_per_sector_shift;
        f.debug_struct("ExFatBootSector")
            .field("cluster_count", &cluster_count)
            .field("bytes_per_sector_shift", &bps_shift)
            .finish()
    }
}

const VOLUME_FLAG_VOLUME_DIRTY: u16 = 0x0002;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatKind {
    Fat12,
    Fat16,
    Fat32,
    ExFat,
}

impl FatKind {
    pub fn end_of_chain_threshold(self) -> u32 {
        match self {
            FatKind::Fat12 => 0x0FF8,
            FatKind::Fat16 => 0xFFF8,
            FatKind::Fat32 => 0x0FFFFFF8,
            FatKind::ExFat => 0xFFFFFFF8,
        }
    }
}

/// Derived geometry plus identifying fields for an opened volume.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub kind: FatKind,
    pub sector_size: u32,
    pub sectors_per_cluster: u32,
    pub cluster_size: u32,
    pub fat_count: u32,
    pub fat_size_sectors: u64,
    pub first_fat_sector: u64,
    pub reserved_sectors: u32,
    pub cluster_count: u32,
    pub first_data_sector: u64,
    /// FAT1x only: static root directory region.
    pub root_dir_sector: u64,
    pub root_dir_sectors: u32,
    pub root_entry_count: u32,
    /// FAT32/exFAT only: cluster the root directory chain starts at.
    pub root_cluster: u32,
    /// exFAT only.
    pub bitmap_first_cluster: Option<u32>,
    pub bitmap_length_bytes: Option<u64>,
}

impl Geometry {
    /// The per-volume bound a cluster chain's length must not exceed
    /// (§3, §4.2): no chain can legitimately be longer than the number of
    /// clusters the volume has.
    pub fn max_chain_length(&self) -> u32 {
        self.cluster_count
    }

    pub fn slots_per_cluster(&self) -> u32 {
        self.cluster_size / 32
    }

    pub fn cluster_byte_offset(&self, cluster: u32) -> u64 {
        self.first_data_sector * self.sector_size as u64
            + (cluster as u64 - 2) * self.cluster_size as u64
    }
}

fn validate_common_header(sector: &[u8]) -> Result<()> {
    if sector.len() < 512 {
        return Err(EngineError::BadBootSector("sector shorter than 512 bytes".into()));
    }
    let jump_ok = (sector[0] == 0xEB && sector[2] == 0x90) || sector[0] == 0xE9;
    if !jump_ok {
        return Err(EngineError::BadBootSector(format!(
            "unexpected jump instruction 0x{:02X}",
            sector[0]
        )));
    }
    if sector[510] != 0x55 || sector[511] != 0xAA {
        return Err(EngineError::BadBootSector("missing 0x55AA boot signature".into()));
    }
    Ok(())
}

/// Parses and validates the first 512 bytes of a volume, returning its
/// derived geometry. Does not read anything past the boot sector except, for
/// exFAT, the VBR checksum sectors consumed from `device`.
pub fn open_volume(device: &mut dyn BlockDevice) -> Result<Geometry> {
    let mut sector = [0u8; 512];
    device.read_at(0, &mut sector)?;
    validate_common_header(&sector)?;

    if &sector[3..11] == b"EXFAT   " {
        open_exfat(device, &sector)
    } else {
        open_fat1x_or_32(&sector)
    }
}

fn read_struct<T: Copy>(bytes: &[u8], offset: usize) -> T {
    unsafe { std::ptr::read_unaligned(bytes.as_ptr().add(offset) as *const T) }
}

fn open_fat1x_or_32(sector: &[u8]) -> Result<Geometry> {
    let bpb: FatCommonBpb = read_struct(sector, 0);

    let bytes_per_sector = bpb.bytes_per_sector;
    let sectors_per_cluster = bpb.sectors_per_cluster;
    let reserved_sectors = bpb.reserved_sectors;
    let num_fats = bpb.num_fats;
    let root_entries = bpb.root_entries;

    if bytes_per_sector == 0 || bytes_per_sector % 512 != 0 {
        return Err(EngineError::BadBootSector(format!(
            "bytes_per_sector {} is not a nonzero multiple of 512",
            bytes_per_sector
        )));
    }
    if sectors_per_cluster == 0 {
        return Err(EngineError::BadBootSector("sectors_per_cluster is zero".into()));
    }
    let cluster_size = bytes_per_sector as u32 * sectors_per_cluster as u32;
    if cluster_size > 64 * 1024 {
        return Err(EngineError::BadBootSector(format!(
            "cluster size {} exceeds 64 KiB",
            cluster_size
        )));
    }
    if reserved_sectors == 0 {
        return Err(EngineError::BadBootSector("reserved_sectors is zero".into()));
    }
    if num_fats == 0 {
        return Err(EngineError::BadBootSector("num_fats is zero".into()));
    }

    let root_dir_sectors =
        ((root_entries as u32 * 32) + (bytes_per_sector as u32 - 1)) / bytes_per_sector as u32;
    let fat_size_16 = bpb.sectors_per_fat_16;
    let total_sectors_16 = bpb.total_sectors_16;
    let total_sectors_32 = bpb.total_sectors_32;

    let fat32_ext: Option<Fat32ExtendedBpb> = if fat_size_16 == 0 {
        Some(read_struct(sector, 36))
    } else {
        None
    };
    let fat_size_sectors = if fat_size_16 != 0 {
        fat_size_16 as u64
    } else {
        fat32_ext
            .ok_or_else(|| EngineError::BadBootSector("FAT32 sectors_per_fat_32 is zero".into()))?
            .sectors_per_fat_32 as u64
    };
    if fat_size_sectors == 0 {
        return Err(EngineError::BadBootSector("FAT size in sectors is zero".into()));
    }

    let total_sectors = if total_sectors_16 != 0 {
        total_sectors_16 as u64
    } else {
        total_sectors_32 as u64
    };

    let data_sectors = total_sectors
        .saturating_sub(reserved_sectors as u64)
        .saturating_sub(num_fats as u64 * fat_size_sectors)
        .saturating_sub(root_dir_sectors as u64);
    let cluster_count = (data_sectors / sectors_per_cluster as u64) as u32;

    let kind = if cluster_count < 4085 {
        FatKind::Fat12
    } else if cluster_count < 65525 {
        FatKind::Fat16
    } else {
        FatKind::Fat32
    };

    if cluster_count > 268_435_445 {
        return Err(EngineError::BadBootSector(format!(
            "cluster count {} exceeds the maximum of 268,435,445",
            cluster_count
        )));
    }

    let root_cluster;
    if kind == FatKind::Fat32 {
        if root_entries != 0 {
            return Err(EngineError::BadBootSector(
                "FAT32 volume must have root_entries == 0".into(),
            ));
        }
        let ext = fat32_ext
            .ok_or_else(|| EngineError::BadBootSector("missing FAT32 extended BPB".into()))?;
        root_cluster = ext.root_cluster;
    } else {
        if root_entries == 0 {
            return Err(EngineError::BadBootSector(
                "FAT12/16 volume must have a nonzero root_entries".into(),
            ));
        }
        root_cluster = 0;
    }

    let first_fat_sector = reserved_sectors as u64;
    let first_data_sector =
        first_fat_sector + (num_fats as u64 * fat_size_sectors) + root_dir_sectors as u64;
    let root_dir_sector = first_fat_sector + (num_fats as u64 * fat_size_sectors);

    Ok(Geometry {
        kind,
        sector_size: bytes_per_sector as u32,
        sectors_per_cluster: sectors_per_cluster as u32,
        cluster_size,
        fat_count: num_fats as u32,
        fat_size_sectors,
        first_fat_sector,
        reserved_sectors: reserved_sectors as u32,
        cluster_count,
        first_data_sector,
        root_dir_sector,
        root_dir_sectors,
        root_entry_count: root_entries as u32,
        root_cluster,
        bitmap_first_cluster: None,
        bitmap_length_bytes: None,
    })
}

fn open_exfat(device: &mut dyn BlockDevice, sector: &[u8]) -> Result<Geometry> {
    let bs: ExFatBootSector = read_struct(sector, 0);

    if bs.must_be_zero != [0u8; 53] {
        return Err(EngineError::BadBootSector(
            "exFAT reserved region at offset 0x0B is not zero".into(),
        ));
    }
    let sector_bits = bs.bytes_per_sector_shift;
    let spc_bits = bs.sectors_per_cluster_shift;
    if !(9..=12).contains(&sector_bits) {
        return Err(EngineError::BadBootSector(format!(
            "exFAT bytes_per_sector_shift {} out of [9,12]",
            sector_bits
        )));
    }
    if sector_bits as u32 + spc_bits as u32 > 25 {
        return Err(EngineError::BadBootSector(
            "exFAT sector_bits + spc_bits exceeds 25".into(),
        ));
    }
    let num_fats = bs.num_fats;
    if num_fats != 1 {
        return Err(EngineError::BadBootSector(format!(
            "exFAT fat_count must be 1, found {}",
            num_fats
        )));
    }
    let fs_revision = bs.fs_revision;
    if fs_revision != 0x0100 {
        return Err(EngineError::BadBootSector(format!(
            "unsupported exFAT revision 0x{:04X}",
            fs_revision
        )));
    }

    let sector_size = 1u32 << sector_bits;
    let volume_length = bs.volume_length;
    let fat_offset = bs.fat_offset;
    let cluster_count = bs.cluster_count;
    let root_dir_cluster = bs.root_dir_cluster;
    let cluster_heap_offset = bs.cluster_heap_offset;

    if (fat_offset as u64) >= volume_length {
        return Err(EngineError::BadBootSector("exFAT fat_offset beyond volume".into()));
    }
    if cluster_count >= 0xFFFFFFF6 {
        return Err(EngineError::BadBootSector("exFAT cluster_count out of range".into()));
    }
    if root_dir_cluster as u64 > cluster_count as u64 + 1 {
        return Err(EngineError::BadBootSector("exFAT root_dir_cluster out of range".into()));
    }
    if (cluster_heap_offset as u64) >= volume_length {
        return Err(EngineError::BadBootSector(
            "exFAT cluster_heap_offset beyond volume".into(),
        ));
    }

    let volume_flags = bs.volume_flags;
    if volume_flags & VOLUME_FLAG_VOLUME_DIRTY != 0 {
        return Err(EngineError::VolumeDirty);
    }

    verify_exfat_vbr_checksum(device, sector_size)?;

    let sectors_per_cluster = 1u32 << spc_bits;
    let cluster_size = sector_size * sectors_per_cluster;
    let fat_length = bs.fat_length;

    Ok(Geometry {
        kind: FatKind::ExFat,
        sector_size,
        sectors_per_cluster,
        cluster_size,
        fat_count: 1,
        fat_size_sectors: fat_length as u64,
        first_fat_sector: fat_offset as u64,
        reserved_sectors: fat_offset as u32,
        cluster_count,
        first_data_sector: cluster_heap_offset as u64,
        root_dir_sector: 0,
        root_dir_sectors: 0,
        root_entry_count: 0,
        root_cluster: root_dir_cluster,
        bitmap_first_cluster: None,
        bitmap_length_bytes: None,
    })
}

/// §4.1: rotate-right-1-then-add checksum over the first eleven sectors
/// (skipping bytes 106/107/112 of sector 0), verified against every 32-bit
/// word of the twelfth sector.
fn verify_exfat_vbr_checksum(device: &mut dyn BlockDevice, sector_size: u32) -> Result<()> {
    let mut checksum: u32 = 0;
    let mut buf = vec![0u8; sector_size as usize];

    for j in 0..11u64 {
        device.read_at(j * sector_size as u64, &mut buf)?;
        for (i, &byte) in buf.iter().enumerate() {
            if j != 0 || (i != 106 && i != 107 && i != 112) {
                checksum = checksum.rotate_right(1).wrapping_add(byte as u32);
            }
        }
    }

    device.read_at(11 * sector_size as u64, &mut buf)?;
    for word in buf.chunks_exact(4) {
        let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        if value != checksum {
            return Err(EngineError::ChecksumMismatch(format!(
                "VBR checksum mismatch: calculated 0x{:08X}, found 0x{:08X}",
                checksum, value
            )));
        }
    }
    Ok(())
}

/// `[SUPPLEMENT]` §4.1: compares every one of the volume's *N* on-disk FAT
/// copies against FAT 1, byte for byte. The source's equivalent routine
/// re-reads a fixed offset on every iteration instead of the *i*-th FAT's
/// offset, so it only ever compares FAT 1 against itself; this is the fixed
/// version, actually exercising FAT 2..N.
pub fn verify_fat_copies(device: &mut dyn BlockDevice, geometry: &Geometry) -> Result<()> {
    if geometry.fat_count <= 1 {
        return Ok(());
    }
    let fat_bytes = geometry.fat_size_sectors * geometry.sector_size as u64;
    let mut reference = vec![0u8; fat_bytes as usize];
    device.read_at(geometry.first_fat_sector * geometry.sector_size as u64, &mut reference)?;

    let mut candidate = vec![0u8; fat_bytes as usize];
    for i in 1..geometry.fat_count as u64 {
        let offset = (geometry.first_fat_sector + i * geometry.fat_size_sectors) * geometry.sector_size as u64;
        device.read_at(offset, &mut candidate)?;
        if candidate != reference {
            return Err(EngineError::ChecksumMismatch(format!(
                "FAT copy {} disagrees with FAT 1",
                i + 1
            )));
        }
    }
    Ok(())
}

/// Locates the exFAT allocation bitmap by walking the root directory's
/// entry stream for a primary of type Allocation Bitmap (§4.1). This is a
/// best-effort pass used only for diagnostic (`info`) purposes; the sort
/// engine itself never needs to allocate or free clusters.
pub fn find_allocation_bitmap(entries: &[u8]) -> Option<(u32, u64)> {
    const ENTRY_TYPE_ALLOCATION_BITMAP: u8 = 0x81;
    for chunk in entries.chunks_exact(32) {
        if chunk[0] == ENTRY_TYPE_ALLOCATION_BITMAP {
            let first_cluster = u32::from_le_bytes([chunk[20], chunk[21], chunk[22], chunk[23]]);
            let length = u64::from_le_bytes([
                chunk[24], chunk[25], chunk[26], chunk[27], chunk[28], chunk[29], chunk[30],
                chunk[31],
            ]);
            return Some((first_cluster, length));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatsort_core::device::MemoryDevice;

    fn fat16_image() -> Vec<u8> {
        let mut img = vec![0u8; 512 * 4096];
        img[0] = 0xEB;
        img[1] = 0x3C;
        img[2] = 0x90;
        img[3..11].copy_from_slice(b"MSDOS5.0");
        img[11..13].copy_from_slice(&512u16.to_le_bytes());
        img[13] = 4; // sectors per cluster
        img[14..16].copy_from_slice(&1u16.to_le_bytes()); // reserved sectors
        img[16] = 2; // num fats
        img[17..19].copy_from_slice(&512u16.to_le_bytes()); // root entries
        img[19..21].copy_from_slice(&4096u16.to_le_bytes()); // total sectors 16
        img[21] = 0xF8;
        img[22..24].copy_from_slice(&8u16.to_le_bytes()); // sectors per fat 16
        img[510] = 0x55;
        img[511] = 0xAA;
        img
    }

    #[test]
    fn parses_fat16_geometry() {
        let img = fat16_image();
        let mut dev = MemoryDevice::new(img);
        let geom = open_volume(&mut dev).unwrap();
        assert_eq!(geom.kind, FatKind::Fat16);
        assert_eq!(geom.sector_size, 512);
        assert_eq!(geom.cluster_size, 2048);
        assert_eq!(geom.fat_count, 2);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut img = fat16_image();
        img[511] = 0x00;
        let mut dev = MemoryDevice::new(img);
        assert!(open_volume(&mut dev).is_err());
    }

    #[test]
    fn detects_disagreeing_fat_copy() {
        let img = fat16_image();
        let mut dev = MemoryDevice::new(img);
        let geom = open_volume(&mut dev).unwrap();
        assert!(verify_fat_copies(&mut dev, &geom).is_ok());

        let mut img = fat16_image();
        let second_fat_start = (1 + 8) * 512; // reserved_sectors + sectors_per_fat_16
        img[second_fat_start] ^= 0xFF;
        let mut dev = MemoryDevice::new(img);
        let geom = open_volume(&mut dev).unwrap();
        let err = verify_fat_copies(&mut dev, &geom).unwrap_err();
        assert!(matches!(err, EngineError::ChecksumMismatch(_)));
    }
}
