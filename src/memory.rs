use crate::{*, error::*};
use std::{fs, mem::MaybeUninit, sync::Arc, path::Path};
use libc::{pid_t, c_void};

// Thing for reading debuggee's memory, either from a running (stopped) process or from a snapshot of some of its memory.
// Copyable for convenience, even though it adds extra Arc dereference when reading from snapshot.
#[derive(Clone)]
pub enum MemReader {
    Invalid,
    Pid(PidMemReader),
    Snapshot(Arc<SnapshotMemReader>),
}
impl MemReader {
    pub fn check_valid(&self) -> Result<()> { match &self {Self::Invalid => err!(ProcessState, "no process"), _ => Ok(())} }

    pub fn read_uninit<'a>(&self, offset: usize, buf: &'a mut [MaybeUninit<u8>]) -> Result<&'a mut [u8]> {
        match self {
            Self::Invalid => return err!(ProcessState, "no process"),
            Self::Pid(r) => return r.read_uninit(offset, buf),
            Self::Snapshot(r) => return r.read_uninit(offset, buf),
        }
    }
}

#[derive(Clone)]
pub struct PidMemReader {
    pid: pid_t,
}
impl PidMemReader {
    pub fn new(pid: pid_t) -> Self { PidMemReader {pid: pid} }

    pub fn read_uninit<'a>(&self, addr: usize, buf: &'a mut [MaybeUninit<u8>]) -> Result<&'a mut [u8]> {
        if buf.is_empty() {
            return Ok(&mut []);
        }
        unsafe {
            let local_iov = libc::iovec {iov_base: buf.as_mut_ptr() as *mut c_void, iov_len: buf.len()};
            let remote_iov = libc::iovec {iov_base: addr as *mut c_void, iov_len: buf.len()};
            let r = libc::process_vm_readv(self.pid, &local_iov as *const libc::iovec, 1, &remote_iov as *const libc::iovec, 1, 0);
            if r < 0 {
                if *libc::__errno_location() == libc::EFAULT {
                    return err!(ProcessState, "bad address"); // shorter message for the common case (e.g. null or garbage pointer)
                } else {
                    return errno_err!("process_vm_readv failed");
                }
            }
            if r != buf.len() as isize {
                return err!(ProcessState, "unexpected EOF in mem @{:x}:0x{:x}", addr, buf.len());
            }
            Ok(std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut u8, buf.len()))
        }
    }
}

// Some ranges of debuggee's memory, copied out earlier. Reads outside the ranges fail like reads of unmapped memory.
// Used for offline inspection (dlpp --snapshot) and for simulating a debuggee in tests.
pub struct SnapshotMemReader {
    // Sorted by start address, non-overlapping, start + len fits in usize.
    pub ranges: Vec<(usize, Vec<u8>)>,
}
impl SnapshotMemReader {
    pub fn new(mut ranges: Vec<(usize, Vec<u8>)>) -> Result<Self> {
        ranges.retain(|(_, data)| !data.is_empty());
        for (start, data) in &ranges {
            if start.checked_add(data.len()).is_none() {
                return err!(Sanity, "snapshot range at 0x{:x} of {} bytes wraps around the address space", start, data.len());
            }
        }
        ranges.sort_by_key(|(start, _)| *start);
        for i in 1..ranges.len() {
            let (prev_start, prev) = &ranges[i-1];
            if prev_start + prev.len() > ranges[i].0 {
                return err!(Sanity, "overlapping snapshot ranges at 0x{:x} and 0x{:x}", prev_start, ranges[i].0);
            }
        }
        Ok(Self {ranges})
    }

    // File format: repeated records of [start: u64 LE][len: u64 LE][len bytes].
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read(path) {
            Ok(d) => d,
            Err(e) => return Err(Error::from_io_error(e, format!("failed to read {}", path.display()))),
        };
        let mut ranges: Vec<(usize, Vec<u8>)> = Vec::new();
        let mut pos = 0usize;
        while pos < data.len() {
            if data.len() - pos < 16 {
                return err!(Format, "truncated snapshot record header at offset {}", pos);
            }
            let start = u64::from_le_bytes(data[pos..pos+8].try_into().unwrap()) as usize;
            let len = u64::from_le_bytes(data[pos+8..pos+16].try_into().unwrap()) as usize;
            pos += 16;
            if len > data.len() - pos {
                return err!(Format, "snapshot record at 0x{:x} claims {} bytes, only {} left", start, len, data.len() - pos);
            }
            ranges.push((start, data[pos..pos+len].to_vec()));
            pos += len;
        }
        Self::new(ranges)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        for (start, data) in &self.ranges {
            out.extend_from_slice(&(*start as u64).to_le_bytes());
            out.extend_from_slice(&(data.len() as u64).to_le_bytes());
            out.extend_from_slice(data);
        }
        out
    }

    pub fn read_uninit<'a>(&self, addr: usize, buf: &'a mut [MaybeUninit<u8>]) -> Result<&'a mut [u8]> {
        if buf.is_empty() {
            return Ok(&mut []);
        }
        let idx = self.ranges.partition_point(|(start, data)| start + data.len() <= addr);
        if idx == self.ranges.len() || self.ranges[idx].0 > addr {
            return err!(ProcessState, "bad address");
        }
        let (start, data) = &self.ranges[idx];
        let off = addr - start;
        if buf.len() > data.len() - off {
            return err!(ProcessState, "unexpected EOF in mem @{:x}:0x{:x}", addr, buf.len());
        }
        let len = buf.len();
        for (d, s) in buf.iter_mut().zip(&data[off..off + len]) {
            d.write(*s);
        }
        Ok(unsafe {std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut u8, buf.len())})
    }
}

const PAGE_SIZE: usize = 4096;

// Reads debuggee's memory, caches last read page. Good for sequential small reads, like walking a bucket array.
// The cache must be dropped (invalidate()) whenever the debuggee may have run.
pub struct CachedMemReader {
    pub mem: MemReader,
    addr: Option<usize>,
    page: Box<[MaybeUninit<u8>; PAGE_SIZE]>,
}
impl CachedMemReader {
    pub fn new(mem: MemReader) -> Self { Self {mem, addr: None, page: Box::new([MaybeUninit::uninit(); PAGE_SIZE])} }

    pub fn invalidate(&mut self) { self.addr = None; }

    pub fn read_uninit<'a>(&mut self, mut offset: usize, mut buf: &'a mut [MaybeUninit<u8>]) -> Result<&'a mut [u8]> {
        if buf.is_empty() {
            return Ok(&mut []);
        }
        if buf.len() > usize::MAX - offset {
            return err!(Runtime, "bad memory range: 0x{:x} + 0x{:x}", offset, buf.len());
        }
        let last_page = (offset + buf.len() - 1) & !(PAGE_SIZE - 1);
        // Read non-last pages without populating cache.
        while offset & !(PAGE_SIZE - 1) < last_page {
            let start = offset & (PAGE_SIZE - 1);
            let len = PAGE_SIZE - start;
            if self.addr == Some(offset & !(PAGE_SIZE - 1)) {
                buf[..len].copy_from_slice(&self.page[start..start+len]);
            } else {
                self.mem.read_uninit(offset, &mut buf[..len])?;
            }
            buf = &mut buf[len..];
            offset += len;
        }
        // Read last page through cache. If the whole page isn't readable (e.g. the end of a snapshot range), read directly.
        if self.addr != Some(last_page) {
            self.addr = None;
            if self.mem.read_uninit(last_page, &mut self.page[..]).is_ok() {
                self.addr = Some(last_page);
            } else {
                return self.mem.read_uninit(offset, buf);
            }
        }
        let start = offset & (PAGE_SIZE - 1);
        buf.copy_from_slice(&self.page[start..start + buf.len()]);
        Ok(unsafe {std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut u8, buf.len())})
    }

    pub fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        unsafe {self.read_uninit(offset, std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len()))}?;
        Ok(())
    }

    pub fn read_vec(&mut self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let mut v = vec![0u8; len];
        self.read(offset, &mut v)?;
        Ok(v)
    }

    pub fn read_u8(&mut self, offset: usize) -> Result<u8> {
        if self.addr == Some(offset & !(PAGE_SIZE - 1)) {
            // Fast path.
            return Ok(unsafe {self.page[offset & (PAGE_SIZE - 1)].assume_init()});
        }
        let mut buf = [0u8; 1];
        self.read(offset, &mut buf)?;
        Ok(buf[0])
    }
    pub fn read_u32(&mut self, offset: usize) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
    pub fn read_u64(&mut self, offset: usize) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read(offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    // size_t or pointer of a 32-bit or 64-bit debuggee.
    pub fn read_word(&mut self, offset: usize, word_size: usize) -> Result<usize> {
        match word_size {
            4 => Ok(self.read_u32(offset)? as usize),
            8 => Ok(self.read_u64(offset)? as usize),
            _ => err!(Internal, "unsupported word size: {}", word_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{*, memory::*};

    fn snapshot() -> CachedMemReader {
        let mut page = vec![0u8; PAGE_SIZE * 2];
        for i in 0..page.len() {
            page[i] = (i % 251) as u8;
        }
        let s = SnapshotMemReader::new(vec![(0x10000, page), (0x1000, vec![1, 2, 3])]).unwrap();
        CachedMemReader::new(MemReader::Snapshot(Arc::new(s)))
    }

    #[test]
    fn snapshot_reads() {
        let mut m = snapshot();
        assert_eq!(m.read_u8(0x1001).unwrap(), 2);
        assert_eq!(m.read_vec(0x1000, 3).unwrap(), vec![1, 2, 3]);
        assert!(m.read_vec(0x1000, 4).unwrap_err().is_process_state());
        assert!(m.read_u32(0x0).is_err());
        assert!(m.read_u32(0x2000).is_err());

        // Spans a page boundary.
        let v = m.read_vec(0x10000 + PAGE_SIZE - 2, 4).unwrap();
        let expected: Vec<u8> = (PAGE_SIZE - 2..PAGE_SIZE + 2).map(|i| (i % 251) as u8).collect();
        assert_eq!(v, expected);

        assert_eq!(m.read_word(0x10000, 4).unwrap(), u32::from_le_bytes([0, 1, 2, 3]) as usize);
        assert_eq!(m.read_word(0x10000, 8).unwrap(), u64::from_le_bytes([0, 1, 2, 3, 4, 5, 6, 7]) as usize);
        assert!(m.read_word(0x10000, 3).is_err());
    }

    #[test]
    fn invalidate_drops_cache() {
        let mut m = snapshot();
        assert_eq!(m.read_u8(0x10005).unwrap(), 5);
        m.mem = MemReader::Snapshot(Arc::new(SnapshotMemReader::new(vec![(0x10000, vec![9; 16])]).unwrap()));
        // Stale page is still cached.
        assert_eq!(m.read_u8(0x10005).unwrap(), 5);
        m.invalidate();
        assert_eq!(m.read_u8(0x10005).unwrap(), 9);
    }

    #[test]
    fn overlapping_ranges() {
        assert!(SnapshotMemReader::new(vec![(0x100, vec![0; 16]), (0x108, vec![0; 4])]).is_err());
        assert!(SnapshotMemReader::new(vec![(0x100, vec![0; 16]), (0x110, vec![0; 4])]).is_ok());
    }

    #[test]
    fn wrapping_ranges() {
        assert!(matches!(SnapshotMemReader::new(vec![(usize::MAX - 2, vec![0; 4])]), Err(e) if e.code() == Some(ErrorCode::Sanity)));
        // Ends exactly at the top of the address space.
        let s = SnapshotMemReader::new(vec![(usize::MAX - 4, vec![7; 4])]).unwrap();
        let mut m = CachedMemReader::new(MemReader::Snapshot(Arc::new(s)));
        assert_eq!(m.read_u8(usize::MAX - 1).unwrap(), 7);
        assert!(m.read_u8(0x1000).is_err());

        let mut crafted = Vec::new();
        crafted.extend_from_slice(&u64::MAX.to_le_bytes());
        crafted.extend_from_slice(&2u64.to_le_bytes());
        crafted.extend_from_slice(&[1, 2]);
        let path = std::env::temp_dir().join(format!("dlpp-wrapping-test-{}", std::process::id()));
        fs::write(&path, crafted).unwrap();
        let r = SnapshotMemReader::load(&path);
        fs::remove_file(&path).unwrap();
        assert!(r.is_err());
    }

    #[test]
    fn serialize_and_load() {
        let s = SnapshotMemReader::new(vec![(0x2000, vec![7; 5]), (0x1000, vec![1, 2])]).unwrap();
        let path = std::env::temp_dir().join(format!("dlpp-snapshot-test-{}", std::process::id()));
        fs::write(&path, s.serialize()).unwrap();
        let loaded = SnapshotMemReader::load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded.ranges, s.ranges);

        let mut bad = s.serialize();
        bad.truncate(bad.len() - 1);
        fs::write(&path, bad).unwrap();
        assert!(SnapshotMemReader::load(&path).is_err());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn invalid_reader() {
        let mut m = CachedMemReader::new(MemReader::Invalid);
        assert!(m.mem.check_valid().is_err());
        assert!(m.read_u8(0x1000).unwrap_err().is_process_state());
    }
}
