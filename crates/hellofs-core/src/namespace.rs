// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Static two-node namespace: the root directory and a single read-only file.

use crate::error::{FsError, FsResult};

/// Inode of the mount root
pub const ROOT_INO: u64 = 1;

/// Inode of the only regular file
pub const HELLO_INO: u64 = 2;

/// Name of the file inside the root directory
pub const HELLO_NAME: &str = "hello";

/// Contents served for [`HELLO_NAME`]
pub const HELLO_CONTENT: &str = "Hello World!\n";

const ROOT_PERM: u16 = 0o755;
const HELLO_PERM: u16 = 0o444;

/// Node kind as reported to the kernel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    RegularFile,
}

impl NodeKind {
    /// `S_IFMT` bits for this kind
    pub fn format_bits(self) -> u32 {
        match self {
            NodeKind::Directory => libc::S_IFDIR as u32,
            NodeKind::RegularFile => libc::S_IFREG as u32,
        }
    }

    /// `DT_*` value used in directory entries
    pub fn dirent_type(self) -> u32 {
        self.format_bits() >> 12
    }

    pub fn from_dirent_type(typ: u32) -> Option<Self> {
        match typ {
            t if t == NodeKind::Directory.dirent_type() => Some(NodeKind::Directory),
            t if t == NodeKind::RegularFile.dirent_type() => Some(NodeKind::RegularFile),
            _ => None,
        }
    }
}

/// Attributes of a node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attributes {
    pub ino: u64,
    pub kind: NodeKind,
    pub perm: u16,
    pub nlink: u32,
    /// Byte length; zero for directories
    pub size: u64,
}

impl Attributes {
    /// Full `st_mode` (format bits plus permission bits)
    pub fn mode(&self) -> u32 {
        self.kind.format_bits() | self.perm as u32
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// One name in a directory listing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Child {
    pub name: &'static str,
    pub ino: u64,
}

/// The immutable namespace. Zero-sized; every lookup is answered from constants.
#[derive(Clone, Copy, Debug, Default)]
pub struct Namespace;

impl Namespace {
    pub fn new() -> Self {
        Self
    }

    /// Attributes for `ino`, with the reported inode equal to the input.
    pub fn stat(&self, ino: u64) -> FsResult<Attributes> {
        match ino {
            ROOT_INO => Ok(Attributes {
                ino,
                kind: NodeKind::Directory,
                perm: ROOT_PERM,
                nlink: 2,
                size: 0,
            }),
            HELLO_INO => Ok(Attributes {
                ino,
                kind: NodeKind::RegularFile,
                perm: HELLO_PERM,
                nlink: 1,
                size: HELLO_CONTENT.len() as u64,
            }),
            _ => Err(FsError::NotFound),
        }
    }

    /// Resolve `name` under `parent`. Names are compared byte for byte.
    pub fn resolve(&self, parent: u64, name: &[u8]) -> FsResult<u64> {
        if parent == ROOT_INO && name == HELLO_NAME.as_bytes() {
            Ok(HELLO_INO)
        } else {
            Err(FsError::NotFound)
        }
    }

    /// File contents. Only the hello file has any; asking for another inode
    /// means the caller skipped validation.
    pub fn content(&self, ino: u64) -> FsResult<&'static [u8]> {
        if ino == HELLO_INO {
            Ok(HELLO_CONTENT.as_bytes())
        } else {
            Err(FsError::ContractViolation { op: "read", ino })
        }
    }

    /// Ordered listing of a directory, including `.` and `..`.
    pub fn children(&self, ino: u64) -> FsResult<[Child; 3]> {
        if ino != ROOT_INO {
            return Err(FsError::NotADirectory);
        }
        Ok([
            Child {
                name: ".",
                ino: ROOT_INO,
            },
            // The root is its own parent.
            Child {
                name: "..",
                ino: ROOT_INO,
            },
            Child {
                name: HELLO_NAME,
                ino: HELLO_INO,
            },
        ])
    }

    /// Whether `ino` names a node at all.
    pub fn contains(&self, ino: u64) -> bool {
        matches!(ino, ROOT_INO | HELLO_INO)
    }
}
