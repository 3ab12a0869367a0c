// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Directory entry records in the FUSE `fuse_dirent` layout.
//!
//! Each record is `ino: u64`, `off: u64`, `namelen: u32`, `type: u32`, then
//! the name, zero-padded to an 8-byte boundary. `off` is the byte offset of
//! the record that follows, so a reader can resume a listing from any record
//! boundary.

use crate::namespace::{Attributes, NodeKind};

/// Size of the fixed record header
pub const DIRENT_HEADER_SIZE: usize = 24;

const DIRENT_ALIGN: usize = 8;

/// Encoded size of a record carrying a name of `name_len` bytes.
pub fn entry_size(name_len: usize) -> usize {
    (DIRENT_HEADER_SIZE + name_len + DIRENT_ALIGN - 1) & !(DIRENT_ALIGN - 1)
}

/// Growable buffer of encoded directory entries, built per listing request.
#[derive(Debug, Default)]
pub struct DirBuffer {
    buf: Vec<u8>,
}

impl DirBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append one entry. The buffer grows by exactly `entry_size(name.len())`.
    pub fn push(&mut self, name: &str, attr: &Attributes) {
        let name = name.as_bytes();
        let start = self.buf.len();
        let next_offset = start + entry_size(name.len());

        self.buf.reserve(next_offset - start);
        self.buf.extend_from_slice(&attr.ino.to_ne_bytes());
        self.buf.extend_from_slice(&(next_offset as u64).to_ne_bytes());
        self.buf.extend_from_slice(&(name.len() as u32).to_ne_bytes());
        self.buf.extend_from_slice(&attr.kind.dirent_type().to_ne_bytes());
        self.buf.extend_from_slice(name);
        self.buf.resize(next_offset, 0);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// A decoded directory entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dirent {
    pub ino: u64,
    /// Byte offset of the following record; the resume cookie for this entry
    pub next_offset: u64,
    /// `None` when the type field holds a value other than `DT_DIR`/`DT_REG`
    pub kind: Option<NodeKind>,
    pub name: Vec<u8>,
}

/// Iterator over the records of an encoded window. Stops at the first
/// truncated record, the way the kernel treats a short readdir reply.
pub struct DirentIter<'a> {
    rest: &'a [u8],
}

/// Decode the complete records in `bytes`.
pub fn parse(bytes: &[u8]) -> DirentIter<'_> {
    DirentIter { rest: bytes }
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_ne_bytes(raw)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_ne_bytes(raw)
}

impl Iterator for DirentIter<'_> {
    type Item = Dirent;

    fn next(&mut self) -> Option<Dirent> {
        if self.rest.len() < DIRENT_HEADER_SIZE {
            return None;
        }
        let namelen = read_u32(self.rest, 16) as usize;
        let reclen = entry_size(namelen);
        if self.rest.len() < reclen {
            return None;
        }

        let dirent = Dirent {
            ino: read_u64(self.rest, 0),
            next_offset: read_u64(self.rest, 8),
            kind: NodeKind::from_dirent_type(read_u32(self.rest, 20)),
            name: self.rest[DIRENT_HEADER_SIZE..DIRENT_HEADER_SIZE + namelen].to_vec(),
        };
        self.rest = &self.rest[reclen..];
        Some(dirent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{HELLO_INO, Namespace, ROOT_INO};

    #[test]
    fn entry_size_is_eight_byte_aligned() {
        assert_eq!(entry_size(0), 24);
        assert_eq!(entry_size(1), 32);
        assert_eq!(entry_size(8), 32);
        assert_eq!(entry_size(9), 40);
    }

    #[test]
    fn push_grows_by_entry_size_and_chains_offsets() {
        let ns = Namespace::new();
        let root = ns.stat(ROOT_INO).unwrap();
        let hello = ns.stat(HELLO_INO).unwrap();

        let mut buf = DirBuffer::new();
        assert!(buf.is_empty());
        buf.push(".", &root);
        assert_eq!(buf.len(), 32);
        buf.push("..", &root);
        assert_eq!(buf.len(), 64);
        buf.push("hello", &hello);
        assert_eq!(buf.len(), 96);

        let offsets: Vec<u64> = parse(buf.as_bytes()).map(|d| d.next_offset).collect();
        assert_eq!(offsets, vec![32, 64, 96]);
    }

    #[test]
    fn record_layout_matches_fuse_dirent() {
        let hello = Namespace::new().stat(HELLO_INO).unwrap();
        let mut buf = DirBuffer::new();
        buf.push("hello", &hello);
        let bytes = buf.into_bytes();

        assert_eq!(&bytes[0..8], &2u64.to_ne_bytes());
        assert_eq!(&bytes[8..16], &32u64.to_ne_bytes());
        assert_eq!(&bytes[16..20], &5u32.to_ne_bytes());
        assert_eq!(&bytes[20..24], &(libc::DT_REG as u32).to_ne_bytes());
        assert_eq!(&bytes[24..29], b"hello");
        assert!(bytes[29..32].iter().all(|b| *b == 0));
    }

    #[test]
    fn parse_drops_truncated_trailing_record() {
        let root = Namespace::new().stat(ROOT_INO).unwrap();
        let mut buf = DirBuffer::new();
        buf.push(".", &root);
        buf.push("..", &root);

        let window = &buf.as_bytes()[..50];
        let names: Vec<Vec<u8>> = parse(window).map(|d| d.name).collect();
        assert_eq!(names, vec![b".".to_vec()]);
        assert_eq!(parse(&buf.as_bytes()[..10]).count(), 0);
    }
}
