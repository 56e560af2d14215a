// Test helpers for laying out debuggee memory: slices, strings, druntime AA tables.
// Each allocation is a separate snapshot range with a gap after it, so reading past the end of an object fails.

use crate::aa::*;

pub struct MemoryBuilder {
    pub word_size: usize,
    next: usize,
    ranges: Vec<(usize, Vec<u8>)>,
}

// Bucket description for MemoryBuilder::aa(): (hash, entry address).
pub struct AABuilder {
    pub buckets: Vec<(usize, usize)>,
    pub used: u32,
    pub deleted: u32,
    pub valoff: u32,
}

pub fn filled(word_size: usize, hash: usize) -> usize { hash | hash_filled_mark(word_size) }

impl MemoryBuilder {
    pub fn new(word_size: usize) -> Self { Self {word_size, next: 0x10000, ranges: Vec::new()} }

    pub fn alloc(&mut self, bytes: Vec<u8>) -> usize {
        let addr = self.next;
        self.next += (bytes.len() + 15) / 16 * 16 + 64;
        if !bytes.is_empty() {
            self.ranges.push((addr, bytes));
        }
        addr
    }

    pub fn word(&self, x: usize) -> Vec<u8> { x.to_le_bytes()[..self.word_size].to_vec() }

    // {length, ptr} of a D slice.
    pub fn slice(&self, len: usize, ptr: usize) -> Vec<u8> {
        let mut v = self.word(len);
        v.extend(self.word(ptr));
        v
    }

    // Allocates the characters and returns the slice struct's bytes.
    pub fn string(&mut self, s: &str) -> Vec<u8> {
        let ptr = self.alloc(s.as_bytes().to_vec());
        self.slice(s.len(), ptr)
    }

    pub fn wstring(&mut self, s: &str) -> Vec<u8> {
        let units: Vec<u16> = s.encode_utf16().collect();
        let ptr = self.alloc(units.iter().flat_map(|u| u.to_le_bytes()).collect());
        self.slice(units.len(), ptr)
    }

    pub fn dstring(&mut self, s: &str) -> Vec<u8> {
        let ptr = self.alloc(s.chars().flat_map(|c| (c as u32).to_le_bytes()).collect());
        self.slice(s.chars().count(), ptr)
    }

    // Key at +0, value at +valoff.
    pub fn entry(&mut self, key: &[u8], value: &[u8], valoff: usize) -> usize {
        assert!(key.len() <= valoff);
        let mut v = key.to_vec();
        v.resize(valoff, 0);
        v.extend_from_slice(value);
        self.alloc(v)
    }

    // Writes the bucket array and the Impl block, returns the Impl pointer.
    pub fn aa(&mut self, b: &AABuilder) -> usize {
        let mut buckets: Vec<u8> = Vec::new();
        for &(hash, entry) in &b.buckets {
            buckets.extend(self.word(hash));
            buckets.extend(self.word(entry));
        }
        let buckets_ptr = if buckets.is_empty() {0} else {self.alloc(buckets)};
        let w = self.word_size;
        let mut block = self.slice(b.buckets.len(), buckets_ptr);
        block.extend_from_slice(&b.used.to_le_bytes());
        block.extend_from_slice(&b.deleted.to_le_bytes());
        block.extend(self.word(0)); // entryTI
        block.extend_from_slice(&[0u8; 12]); // firstUsed, keysz, valsz
        assert_eq!(block.len(), 3*w + 20);
        block.extend_from_slice(&b.valoff.to_le_bytes());
        block.extend_from_slice(&[0u8; 4]); // flags + padding
        self.alloc(block)
    }

    // Map with the given live entries spread over twice as many buckets.
    pub fn aa_of(&mut self, pairs: &[(Vec<u8>, Vec<u8>)], valoff: u32) -> usize {
        let mut buckets: Vec<(usize, usize)> = Vec::new();
        for (i, (k, v)) in pairs.iter().enumerate() {
            let e = self.entry(k, v, valoff as usize);
            buckets.push((0, 0));
            buckets.push((filled(self.word_size, 0x100 + i), e));
        }
        self.aa(&AABuilder {buckets, used: pairs.len() as u32, deleted: 0, valoff})
    }

    pub fn build(self) -> Vec<(usize, Vec<u8>)> { self.ranges }
}
