//! Byte-addressable block device access.
//!
//! The engine only ever talks to a volume through [`BlockDevice`]: open is
//! the caller's job (path resolution, mount checks, exclusive-open mode),
//! everything past that point is seek/read/write/sync/close on an already
//! open handle.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Narrow device I/O contract consumed by the engine. Offsets are always
/// byte-absolute from the start of the device or image.
pub trait BlockDevice {
    fn seek(&mut self, offset: u64) -> io::Result<()>;
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek(offset)?;
        self.read_exact(buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.seek(offset)?;
        self.write_all(buf)
    }
}

/// A real block device or disk image backed by an open file.
///
/// Plain files and most modern block devices tolerate unaligned reads and
/// writes directly; this adapter does not impose sector-aligned buffering
/// itself; platforms whose raw device nodes demand sector alignment should
/// wrap this in [`SectorCache`].
pub struct FileDevice {
    file: std::fs::File,
}

impl FileDevice {
    pub fn open(path: &std::path::Path, write: bool) -> io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(write)
            .open(path)?;
        Ok(Self { file })
    }
}

impl BlockDevice for FileDevice {
    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        Read::read_exact(&mut self.file, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.file, buf)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

/// Unaligned-safe view over a device whose backing medium only accepts
/// sector-sized, sector-aligned transfers. Reads and writes are routed
/// through a one-sector cache; the cached sector is flushed on sector
/// change and on [`BlockDevice::sync`].
pub struct SectorCache<D: BlockDevice> {
    inner: D,
    sector_size: usize,
    cached_sector: Option<u64>,
    buf: Vec<u8>,
    dirty: bool,
    position: u64,
}

impl<D: BlockDevice> SectorCache<D> {
    pub fn new(inner: D, sector_size: usize) -> Self {
        Self {
            inner,
            sector_size,
            cached_sector: None,
            buf: vec![0u8; sector_size],
            dirty: false,
            position: 0,
        }
    }

    fn load_sector(&mut self, sector: u64) -> io::Result<()> {
        if self.cached_sector == Some(sector) {
            return Ok(());
        }
        self.flush_sector()?;
        self.inner.seek(sector * self.sector_size as u64)?;
        self.inner.read_exact(&mut self.buf)?;
        self.cached_sector = Some(sector);
        Ok(())
    }

    fn flush_sector(&mut self) -> io::Result<()> {
        if self.dirty {
            if let Some(sector) = self.cached_sector {
                self.inner.seek(sector * self.sector_size as u64)?;
                self.inner.write_all(&self.buf)?;
            }
            self.dirty = false;
        }
        Ok(())
    }
}

impl<D: BlockDevice> BlockDevice for SectorCache<D> {
    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.position = offset;
        Ok(())
    }

    fn read_exact(&mut self, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            let sector = self.position / self.sector_size as u64;
            let within = (self.position % self.sector_size as u64) as usize;
            self.load_sector(sector)?;
            let n = (self.sector_size - within).min(buf.len());
            buf[..n].copy_from_slice(&self.buf[within..within + n]);
            self.position += n as u64;
            buf = &mut buf[n..];
        }
        Ok(())
    }

    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            let sector = self.position / self.sector_size as u64;
            let within = (self.position % self.sector_size as u64) as usize;
            self.load_sector(sector)?;
            let n = (self.sector_size - within).min(buf.len());
            self.buf[within..within + n].copy_from_slice(&buf[..n]);
            self.dirty = true;
            self.position += n as u64;
            buf = &buf[n..];
        }
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.flush_sector()?;
        self.inner.sync()
    }
}

/// In-memory device used by the test harness and by `--list-only` dry runs
/// over a loaded image; never touches a real disk.
pub struct MemoryDevice {
    data: Vec<u8>,
    position: u64,
}

impl MemoryDevice {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl BlockDevice for MemoryDevice {
    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.position = offset;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let start = self.position as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of image"));
        }
        buf.copy_from_slice(&self.data[start..end]);
        self.position = end as u64;
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let start = self.position as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "write past end of image"));
        }
        self.data[start..end].copy_from_slice(buf);
        self.position = end as u64;
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}
