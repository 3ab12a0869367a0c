// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Hello filesystem FUSE adapter
//!
//! Maps FUSE requests to `HelloFs` calls and delivers each result as the one
//! reply the kernel waits for.

#[cfg(not(all(feature = "fuse", target_os = "linux")))]
compile_error!("This module requires the 'fuse' feature on Linux");

use fuser::{
    FileAttr, FileType, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen,
    ReplyXattr, Request,
};
use hellofs_core::dirent;
use hellofs_core::handler::FUSE_CAP_ASYNC_READ;
use hellofs_core::{Attributes, FsError, HelloFs, NodeKind, Operation, Reply};
use libc::{c_int, EINVAL, EIO};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

/// Bytes of encoded entries offered per readdir call. Holds the whole root
/// listing; fuser still stops early if the kernel buffer is smaller.
const READDIR_WINDOW: usize = 4096;

const BLOCK_SIZE: u32 = 512;

pub struct HelloFuse {
    fs: HelloFs,
}

impl HelloFuse {
    pub fn new(fs: HelloFs) -> Self {
        Self { fs }
    }

    /// Fields the namespace does not define stay zeroed: root ownership and
    /// epoch timestamps.
    fn attr_to_fuse(attr: &Attributes) -> FileAttr {
        FileAttr {
            ino: attr.ino,
            size: attr.size,
            blocks: attr.size.div_ceil(BLOCK_SIZE as u64),
            atime: SystemTime::UNIX_EPOCH,
            mtime: SystemTime::UNIX_EPOCH,
            ctime: SystemTime::UNIX_EPOCH,
            crtime: SystemTime::UNIX_EPOCH,
            kind: file_type(Some(attr.kind)),
            perm: attr.perm,
            nlink: attr.nlink,
            uid: 0,
            gid: 0,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    fn errno(op: &'static str, ino: u64, err: &FsError) -> c_int {
        if err.is_contract_violation() {
            error!(op, ino, %err, "kernel request broke the handler contract; failing request");
        }
        err.errno()
    }

    /// Errno for any reply the request kind cannot be answered with.
    fn failure(op: &'static str, ino: u64, reply: Reply) -> c_int {
        match reply {
            Reply::Error(err) => Self::errno(op, ino, &err),
            unexpected => {
                error!(op, ino, ?unexpected, "handler produced a reply of the wrong kind");
                EIO
            }
        }
    }
}

fn file_type(kind: Option<NodeKind>) -> FileType {
    match kind {
        Some(NodeKind::Directory) => FileType::Directory,
        Some(NodeKind::RegularFile) | None => FileType::RegularFile,
    }
}

/// Negative offsets never come from a well-behaved kernel.
fn offset_from_kernel(op: &'static str, ino: u64, offset: i64) -> Option<u64> {
    let converted = u64::try_from(offset).ok();
    if converted.is_none() {
        warn!(op, ino, offset, "rejecting negative offset");
    }
    converted
}

impl fuser::Filesystem for HelloFuse {
    fn init(&mut self, _req: &Request, config: &mut fuser::KernelConfig) -> Result<(), c_int> {
        let policy = self.fs.init();

        if policy.want & FUSE_CAP_ASYNC_READ != 0 {
            if let Err(unsupported) = config.add_capabilities(fuser::consts::FUSE_ASYNC_READ) {
                warn!("Kernel does not support capabilities {:#x}", unsupported);
            }
        }
        if policy.no_interrupt {
            // fuser never forwards FUSE_INTERRUPT to the filesystem, which is
            // exactly the requested behaviour.
            debug!("Interrupt delivery disabled");
        }

        info!(want = policy.want, "Hello filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        info!("Hello filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let op = Operation::Lookup {
            parent,
            name: name.as_bytes(),
        };
        match self.fs.dispatch(op) {
            Reply::Entry(entry) => {
                let attr = Self::attr_to_fuse(&entry.attr);
                reply.entry(&entry.entry_ttl, &attr, entry.generation);
            }
            other => reply.error(Self::failure(op.name(), parent, other)),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let op = Operation::GetAttr { ino };
        match self.fs.dispatch(op) {
            Reply::Attr(found) => reply.attr(&found.ttl, &Self::attr_to_fuse(&found.attr)),
            other => reply.error(Self::failure(op.name(), ino, other)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(offset) = offset_from_kernel("readdir", ino, offset) else {
            reply.error(EINVAL);
            return;
        };

        let op = Operation::ReadDir {
            ino,
            size: READDIR_WINDOW,
            offset,
        };
        match self.fs.dispatch(op) {
            Reply::Data(window) => {
                // Each record's byte offset becomes the kernel's resume cookie.
                for entry in dirent::parse(&window) {
                    let full = reply.add(
                        entry.ino,
                        entry.next_offset as i64,
                        file_type(entry.kind),
                        OsStr::from_bytes(&entry.name),
                    );
                    if full {
                        break;
                    }
                }
                reply.ok();
            }
            other => reply.error(Self::failure(op.name(), ino, other)),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        let op = Operation::Open { ino, flags };
        match self.fs.dispatch(op) {
            Reply::Opened(opened) => reply.opened(opened.fh, opened.flags),
            other => reply.error(Self::failure(op.name(), ino, other)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(offset) = offset_from_kernel("read", ino, offset) else {
            reply.error(EINVAL);
            return;
        };

        let op = Operation::Read {
            ino,
            size: size as usize,
            offset,
        };
        match self.fs.dispatch(op) {
            Reply::Data(data) => reply.data(&data),
            other => reply.error(Self::failure(op.name(), ino, other)),
        }
    }

    fn getxattr(&mut self, _req: &Request, ino: u64, name: &OsStr, size: u32, reply: ReplyXattr) {
        let op = Operation::GetXattr {
            ino,
            name: name.as_bytes(),
            size,
        };
        match self.fs.dispatch(op) {
            Reply::Data(value) => reply.data(&value),
            other => reply.error(Self::failure(op.name(), ino, other)),
        }
    }

    fn setxattr(
        &mut self,
        _req: &Request,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        let op = Operation::SetXattr {
            ino,
            name: name.as_bytes(),
            value,
            size: value.len(),
            flags,
        };
        match self.fs.dispatch(op) {
            Reply::Empty => reply.ok(),
            other => reply.error(Self::failure(op.name(), ino, other)),
        }
    }

    fn removexattr(&mut self, _req: &Request, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        let op = Operation::RemoveXattr {
            ino,
            name: name.as_bytes(),
        };
        match self.fs.dispatch(op) {
            Reply::Empty => reply.ok(),
            other => reply.error(Self::failure(op.name(), ino, other)),
        }
    }
}
