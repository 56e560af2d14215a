use crate::{*, error::*, memory::*};

// Reading druntime's associative array (rt/aaA.d) out of debuggee memory.
//
// An AA value is a single pointer to an "Impl" block, null for an empty map. With w = size_t size:
//   +0      size_t  buckets.length
//   +w      Bucket* buckets.ptr
//   +2w     uint    used       (filled buckets, including deleted ones)
//   +2w+4   uint    deleted
//   +2w+8   TypeInfo_Struct entryTI
//   +3w+8   uint    firstUsed, keysz, valsz
//   +3w+20  uint    valoff     (offset of the value within an entry)
//   +3w+24  ubyte   flags
// struct Bucket {size_t hash; void* entry;}
// A bucket is filled iff the top bit of its hash is set. An entry is the key followed by the value at valoff.

// Anything bigger is garbage memory, not a real table.
pub const MAX_BUCKETS: usize = 1 << 28;

pub fn hash_filled_mark(word_size: usize) -> usize { 1usize << (8 * word_size - 1) }

pub fn is_filled(hash: usize, word_size: usize) -> bool { hash & hash_filled_mark(word_size) != 0 }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AALayout {
    pub impl_ptr: usize,
    pub buckets_len: usize,
    pub buckets_ptr: usize,
    pub used: u32,
    pub deleted: u32,
    pub valoff: u32,
    pub word_size: usize,
    pub pointer_size: usize,
}

impl AALayout {
    pub fn empty(word_size: usize, pointer_size: usize) -> Self { Self {word_size, pointer_size, ..Default::default()} }

    pub fn read(memory: &mut CachedMemReader, impl_ptr: usize, word_size: usize, pointer_size: usize) -> Result<Self> {
        if impl_ptr == 0 {
            return Ok(Self::empty(word_size, pointer_size));
        }
        let w = word_size;
        let buckets_len = memory.read_word(impl_ptr, w)?;
        if buckets_len > MAX_BUCKETS {
            return err!(Sanity, "AA @0x{:x} has implausible bucket count {}", impl_ptr, buckets_len);
        }
        Ok(Self {
            impl_ptr,
            buckets_len,
            buckets_ptr: memory.read_word(impl_ptr + w, pointer_size)?,
            used: memory.read_u32(impl_ptr + 2*w)?,
            deleted: memory.read_u32(impl_ptr + 2*w + 4)?,
            valoff: memory.read_u32(impl_ptr + 3*w + 20)?,
            word_size,
            pointer_size,
        })
    }

    // The number of entries the map claims to have.
    pub fn visible_len(&self) -> usize { self.used.saturating_sub(self.deleted) as usize }

    pub fn bucket_stride(&self) -> usize { self.pointer_size + self.word_size }

    pub fn cursor(&self) -> OccupiedEntries {
        OccupiedEntries {layout: *self, index: 0, done: self.impl_ptr == 0 || self.buckets_ptr == 0}
    }

    // Entry addresses of filled buckets, in bucket order. Each call walks the table from the start.
    pub fn occupied_entries<'a>(&self, memory: &'a mut CachedMemReader) -> impl Iterator<Item = Result<usize>> + 'a {
        let mut cursor = self.cursor();
        std::iter::from_fn(move || cursor.next_entry(memory))
    }
}

// Position in a walk over the bucket array. Doesn't hold on to memory, so it can be kept between
// requests of a lazy children list and advanced with whatever reader is current.
#[derive(Clone, Debug)]
pub struct OccupiedEntries {
    pub layout: AALayout,
    pub index: usize,
    done: bool,
}

impl OccupiedEntries {
    // Ok(entry address), or Err on a read failure, after which the walk is over.
    pub fn next_entry(&mut self, memory: &mut CachedMemReader) -> Option<Result<usize>> {
        let l = &self.layout;
        while !self.done && self.index < l.buckets_len {
            let bucket = l.buckets_ptr + self.index * l.bucket_stride();
            self.index += 1;
            let hash = match memory.read_word(bucket, l.word_size) {
                Ok(h) => h,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if !is_filled(hash, l.word_size) {
                continue;
            }
            match memory.read_word(bucket + l.word_size, l.pointer_size) {
                // Removed entry whose hash still has the filled bit.
                Ok(0) => continue,
                Ok(entry) => return Some(Ok(entry)),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        self.done = true;
        None
    }
}
