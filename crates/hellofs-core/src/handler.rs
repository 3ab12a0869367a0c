// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request handler for the hello filesystem.
//!
//! Every operation is a pure function of the namespace and its arguments and
//! returns one value. The transport turns that value into exactly one reply.

use std::time::Duration;

use tracing::debug;

use crate::dirent::{DirBuffer, entry_size};
use crate::error::{FsError, FsResult};
use crate::namespace::{Attributes, HELLO_INO, Namespace};

/// Validity of entry and attribute replies
pub const TTL: Duration = Duration::from_secs(1);

pub const GETXATTR_NAME: &str = "hello_ll_getxattr_name";
pub const GETXATTR_VALUE: &str = "hello_ll_getxattr_value";
pub const SETXATTR_NAME: &str = "hello_ll_setxattr_name";
pub const SETXATTR_VALUE: &str = "hello_ll_setxattr_value";
pub const REMOVEXATTR_NAME: &str = "hello_ll_removexattr_name";

/// `FUSE_CAP_ASYNC_READ` from the kernel ABI
pub const FUSE_CAP_ASYNC_READ: u64 = 1 << 0;

/// Connection settings chosen at init time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionPolicy {
    /// Do not deliver FUSE_INTERRUPT requests
    pub no_interrupt: bool,
    /// Optional capabilities the filesystem wants enabled
    pub want: u64,
}

/// Successful lookup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub attr: Attributes,
    pub attr_ttl: Duration,
    pub entry_ttl: Duration,
    pub generation: u64,
}

/// Successful getattr
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttrReply {
    pub attr: Attributes,
    pub ttl: Duration,
}

/// Successful open. No handle is allocated; the kernel's zeroed file info is
/// echoed back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Opened {
    pub fh: u64,
    pub flags: u32,
}

/// Window of `buf` starting at `offset` and at most `size` bytes long.
/// An offset at or past the end yields an empty window, which signals end of
/// data rather than an error.
pub fn reply_limited(buf: &[u8], offset: u64, size: usize) -> &[u8] {
    match usize::try_from(offset) {
        Ok(start) if start < buf.len() => {
            let len = (buf.len() - start).min(size);
            &buf[start..start + len]
        }
        _ => &[],
    }
}

/// A request as decoded by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation<'a> {
    Lookup {
        parent: u64,
        name: &'a [u8],
    },
    GetAttr {
        ino: u64,
    },
    ReadDir {
        ino: u64,
        size: usize,
        offset: u64,
    },
    Open {
        ino: u64,
        flags: i32,
    },
    Read {
        ino: u64,
        size: usize,
        offset: u64,
    },
    GetXattr {
        ino: u64,
        name: &'a [u8],
        size: u32,
    },
    SetXattr {
        ino: u64,
        name: &'a [u8],
        value: &'a [u8],
        size: usize,
        flags: i32,
    },
    RemoveXattr {
        ino: u64,
        name: &'a [u8],
    },
}

impl Operation<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Lookup { .. } => "lookup",
            Operation::GetAttr { .. } => "getattr",
            Operation::ReadDir { .. } => "readdir",
            Operation::Open { .. } => "open",
            Operation::Read { .. } => "read",
            Operation::GetXattr { .. } => "getxattr",
            Operation::SetXattr { .. } => "setxattr",
            Operation::RemoveXattr { .. } => "removexattr",
        }
    }
}

/// The single reply produced for an [`Operation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Entry(Entry),
    Attr(AttrReply),
    Data(Vec<u8>),
    Opened(Opened),
    Empty,
    Error(FsError),
}

impl<T: Into<Reply>> From<FsResult<T>> for Reply {
    fn from(result: FsResult<T>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(err) => Reply::Error(err),
        }
    }
}

impl From<Entry> for Reply {
    fn from(entry: Entry) -> Self {
        Reply::Entry(entry)
    }
}

impl From<AttrReply> for Reply {
    fn from(attr: AttrReply) -> Self {
        Reply::Attr(attr)
    }
}

impl From<Vec<u8>> for Reply {
    fn from(data: Vec<u8>) -> Self {
        Reply::Data(data)
    }
}

impl From<Opened> for Reply {
    fn from(opened: Opened) -> Self {
        Reply::Opened(opened)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

/// The hello filesystem request handler.
///
/// Holds nothing but the immutable namespace, so it is `Send + Sync` and can
/// be called from any number of worker threads without locking.
#[derive(Clone, Copy, Debug, Default)]
pub struct HelloFs {
    ns: Namespace,
}

fn log_outcome<T>(op: &'static str, ino: u64, result: &FsResult<T>) {
    match result {
        Ok(_) => debug!(target: "hellofs::handler", op, ino, "ok"),
        Err(err) => debug!(target: "hellofs::handler", op, ino, errno = err.errno(), %err),
    }
}

impl HelloFs {
    pub fn new() -> Self {
        Self {
            ns: Namespace::new(),
        }
    }

    /// Connection negotiation. Interrupts are switched off and no optional
    /// capability survives: async read is requested and then cleared again,
    /// the same sequence a legacy `want` bitmask user would go through.
    pub fn init(&self) -> ConnectionPolicy {
        let mut want = FUSE_CAP_ASYNC_READ;
        want &= !FUSE_CAP_ASYNC_READ;
        debug!(target: "hellofs::handler", op = "init", want, "connection policy");
        ConnectionPolicy {
            no_interrupt: true,
            want,
        }
    }

    pub fn lookup(&self, parent: u64, name: &[u8]) -> FsResult<Entry> {
        let result = self
            .ns
            .resolve(parent, name)
            .and_then(|ino| self.ns.stat(ino))
            .map(|attr| Entry {
                attr,
                attr_ttl: TTL,
                entry_ttl: TTL,
                generation: 0,
            });
        log_outcome("lookup", parent, &result);
        result
    }

    pub fn getattr(&self, ino: u64) -> FsResult<AttrReply> {
        let result = self.ns.stat(ino).map(|attr| AttrReply { attr, ttl: TTL });
        log_outcome("getattr", ino, &result);
        result
    }

    /// Encoded listing of the root, windowed by `offset` and `size`.
    /// The record buffer lives only for the duration of this call.
    pub fn readdir(&self, ino: u64, size: usize, offset: u64) -> FsResult<Vec<u8>> {
        let result = self.ns.children(ino).and_then(|children| {
            let capacity = children.iter().map(|c| entry_size(c.name.len())).sum();
            let mut buf = DirBuffer::with_capacity(capacity);
            for child in &children {
                buf.push(child.name, &self.ns.stat(child.ino)?);
            }
            Ok(reply_limited(buf.as_bytes(), offset, size).to_vec())
        });
        log_outcome("readdir", ino, &result);
        result
    }

    pub fn open(&self, ino: u64, flags: i32) -> FsResult<Opened> {
        let result = if ino != HELLO_INO {
            Err(FsError::IsADirectory)
        } else if flags & libc::O_ACCMODE != libc::O_RDONLY {
            Err(FsError::PermissionDenied)
        } else {
            Ok(Opened::default())
        };
        log_outcome("open", ino, &result);
        result
    }

    pub fn read(&self, ino: u64, size: usize, offset: u64) -> FsResult<Vec<u8>> {
        let result = self
            .ns
            .content(ino)
            .map(|content| reply_limited(content, offset, size).to_vec());
        log_outcome("read", ino, &result);
        result
    }

    /// The requested buffer size is ignored: the full value is returned and
    /// a zero-size probe is not answered with the value length.
    pub fn getxattr(&self, ino: u64, name: &[u8], _size: u32) -> FsResult<Vec<u8>> {
        let result = self.require_node("getxattr", ino).and_then(|()| {
            if name == GETXATTR_NAME.as_bytes() {
                Ok(GETXATTR_VALUE.as_bytes().to_vec())
            } else {
                Err(FsError::NotSupported)
            }
        });
        log_outcome("getxattr", ino, &result);
        result
    }

    /// Accepts only the one expected name/value pair. `flags` are ignored.
    pub fn setxattr(
        &self,
        ino: u64,
        name: &[u8],
        value: &[u8],
        size: usize,
        _flags: i32,
    ) -> FsResult<()> {
        let result = self.require_node("setxattr", ino).and_then(|()| {
            let expected = SETXATTR_VALUE.as_bytes();
            let matches = name == SETXATTR_NAME.as_bytes()
                && size == expected.len()
                && value.get(..size) == Some(expected);
            if matches {
                Ok(())
            } else {
                Err(FsError::NotSupported)
            }
        });
        log_outcome("setxattr", ino, &result);
        result
    }

    pub fn removexattr(&self, ino: u64, name: &[u8]) -> FsResult<()> {
        let result = self.require_node("removexattr", ino).and_then(|()| {
            if name == REMOVEXATTR_NAME.as_bytes() {
                Ok(())
            } else {
                Err(FsError::NotSupported)
            }
        });
        log_outcome("removexattr", ino, &result);
        result
    }

    /// Route a decoded request to its handler.
    pub fn dispatch(&self, op: Operation<'_>) -> Reply {
        match op {
            Operation::Lookup { parent, name } => self.lookup(parent, name).into(),
            Operation::GetAttr { ino } => self.getattr(ino).into(),
            Operation::ReadDir { ino, size, offset } => self.readdir(ino, size, offset).into(),
            Operation::Open { ino, flags } => self.open(ino, flags).into(),
            Operation::Read { ino, size, offset } => self.read(ino, size, offset).into(),
            Operation::GetXattr { ino, name, size } => self.getxattr(ino, name, size).into(),
            Operation::SetXattr {
                ino,
                name,
                value,
                size,
                flags,
            } => self.setxattr(ino, name, value, size, flags).into(),
            Operation::RemoveXattr { ino, name } => self.removexattr(ino, name).into(),
        }
    }

    fn require_node(&self, op: &'static str, ino: u64) -> FsResult<()> {
        if self.ns.contains(ino) {
            Ok(())
        } else {
            Err(FsError::ContractViolation { op, ino })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirent::parse;
    use crate::namespace::{HELLO_CONTENT, NodeKind, ROOT_INO};

    #[test]
    fn init_disables_interrupts_and_all_capabilities() {
        let policy = HelloFs::new().init();
        assert!(policy.no_interrupt);
        assert_eq!(policy.want, 0);
    }

    #[test]
    fn reply_limited_windows() {
        let buf = b"0123456789";
        assert_eq!(reply_limited(buf, 0, 4), b"0123");
        assert_eq!(reply_limited(buf, 8, 4), b"89");
        assert_eq!(reply_limited(buf, 3, 0), b"");
        assert_eq!(reply_limited(buf, 10, 4), b"");
        assert_eq!(reply_limited(buf, u64::MAX, usize::MAX), b"");
        assert_eq!(reply_limited(buf, 0, usize::MAX), buf);
    }

    #[test]
    fn lookup_hello_under_root() {
        let entry = HelloFs::new().lookup(ROOT_INO, b"hello").unwrap();
        assert_eq!(entry.attr.ino, HELLO_INO);
        assert_eq!(entry.attr_ttl, Duration::from_secs_f64(1.0));
        assert_eq!(entry.entry_ttl, Duration::from_secs_f64(1.0));
        assert_eq!(entry.generation, 0);
    }

    #[test]
    fn lookup_misses_are_not_found() {
        let fs = HelloFs::new();
        assert_eq!(fs.lookup(ROOT_INO, b"world"), Err(FsError::NotFound));
        assert_eq!(fs.lookup(ROOT_INO, b""), Err(FsError::NotFound));
        assert_eq!(fs.lookup(HELLO_INO, b"hello"), Err(FsError::NotFound));
        assert_eq!(fs.lookup(77, b"hello"), Err(FsError::NotFound));
    }

    #[test]
    fn getattr_known_and_unknown() {
        let fs = HelloFs::new();
        let reply = fs.getattr(ROOT_INO).unwrap();
        assert_eq!(reply.attr.kind, NodeKind::Directory);
        assert_eq!(reply.ttl, TTL);
        assert_eq!(fs.getattr(3), Err(FsError::NotFound));
        assert_eq!(fs.getattr(0), Err(FsError::NotFound));
    }

    #[test]
    fn readdir_lists_dot_dotdot_and_hello() {
        let bytes = HelloFs::new().readdir(ROOT_INO, 4096, 0).unwrap();
        let entries: Vec<_> = parse(&bytes).map(|d| (d.name, d.ino)).collect();
        assert_eq!(
            entries,
            vec![
                (b".".to_vec(), 1),
                (b"..".to_vec(), 1),
                (b"hello".to_vec(), 2)
            ]
        );
    }

    #[test]
    fn readdir_resumes_at_record_offset() {
        let fs = HelloFs::new();
        let full = fs.readdir(ROOT_INO, 4096, 0).unwrap();
        let first = parse(&full).next().unwrap();

        let rest = fs.readdir(ROOT_INO, 4096, first.next_offset).unwrap();
        let names: Vec<_> = parse(&rest).map(|d| d.name).collect();
        assert_eq!(names, vec![b"..".to_vec(), b"hello".to_vec()]);
    }

    #[test]
    fn readdir_past_end_is_empty_every_time() {
        let fs = HelloFs::new();
        let total = fs.readdir(ROOT_INO, 4096, 0).unwrap().len() as u64;
        for _ in 0..3 {
            assert!(fs.readdir(ROOT_INO, 4096, total).unwrap().is_empty());
            assert!(fs.readdir(ROOT_INO, 4096, total + 100).unwrap().is_empty());
        }
    }

    #[test]
    fn readdir_respects_requested_size() {
        let window = HelloFs::new().readdir(ROOT_INO, 40, 0).unwrap();
        assert_eq!(window.len(), 40);
        assert_eq!(parse(&window).count(), 1);
    }

    #[test]
    fn readdir_on_file_is_not_a_directory() {
        let fs = HelloFs::new();
        assert_eq!(fs.readdir(HELLO_INO, 4096, 0), Err(FsError::NotADirectory));
        assert_eq!(fs.readdir(5, 4096, 0), Err(FsError::NotADirectory));
    }

    #[test]
    fn open_checks_inode_then_access_mode() {
        let fs = HelloFs::new();
        assert_eq!(fs.open(HELLO_INO, libc::O_RDONLY), Ok(Opened::default()));
        assert_eq!(
            fs.open(HELLO_INO, libc::O_RDONLY | libc::O_NONBLOCK),
            Ok(Opened::default())
        );
        assert_eq!(fs.open(HELLO_INO, libc::O_WRONLY), Err(FsError::PermissionDenied));
        assert_eq!(fs.open(HELLO_INO, libc::O_RDWR), Err(FsError::PermissionDenied));
        assert_eq!(fs.open(ROOT_INO, libc::O_RDONLY), Err(FsError::IsADirectory));
        assert_eq!(fs.open(ROOT_INO, libc::O_RDWR), Err(FsError::IsADirectory));
    }

    #[test]
    fn read_windows_the_content() {
        let fs = HelloFs::new();
        assert_eq!(fs.read(HELLO_INO, 4096, 0).unwrap(), HELLO_CONTENT.as_bytes());
        assert_eq!(fs.read(HELLO_INO, 5, 0).unwrap(), b"Hello");
        assert_eq!(fs.read(HELLO_INO, 4096, 6).unwrap(), b"World!\n");
        assert!(fs.read(HELLO_INO, 4096, 13).unwrap().is_empty());
    }

    #[test]
    fn read_on_directory_is_contract_violation() {
        let err = HelloFs::new().read(ROOT_INO, 10, 0).unwrap_err();
        assert_eq!(err, FsError::ContractViolation { op: "read", ino: ROOT_INO });
        assert_eq!(err.errno(), libc::EIO);
    }

    #[test]
    fn getxattr_returns_full_value_regardless_of_size() {
        let fs = HelloFs::new();
        for size in [0, 1, 4096] {
            assert_eq!(
                fs.getxattr(HELLO_INO, GETXATTR_NAME.as_bytes(), size).unwrap(),
                GETXATTR_VALUE.as_bytes()
            );
        }
        assert_eq!(
            fs.getxattr(ROOT_INO, b"user.other", 64),
            Err(FsError::NotSupported)
        );
    }

    #[test]
    fn setxattr_accepts_only_exact_pair() {
        let fs = HelloFs::new();
        let name = SETXATTR_NAME.as_bytes();
        let value = SETXATTR_VALUE.as_bytes();
        assert_eq!(fs.setxattr(ROOT_INO, name, value, value.len(), 0), Ok(()));
        assert_eq!(fs.setxattr(HELLO_INO, name, value, value.len(), libc::XATTR_CREATE), Ok(()));
        assert_eq!(
            fs.setxattr(HELLO_INO, name, value, value.len() - 1, 0),
            Err(FsError::NotSupported)
        );
        assert_eq!(
            fs.setxattr(HELLO_INO, name, b"hello_ll_setxattr_valuX", value.len(), 0),
            Err(FsError::NotSupported)
        );
        assert_eq!(
            fs.setxattr(HELLO_INO, name, b"short", value.len(), 0),
            Err(FsError::NotSupported)
        );
        assert_eq!(
            fs.setxattr(HELLO_INO, b"wrongName", value, value.len(), 0),
            Err(FsError::NotSupported)
        );
    }

    #[test]
    fn setxattr_compares_only_the_first_size_bytes() {
        let mut padded = SETXATTR_VALUE.as_bytes().to_vec();
        padded.extend_from_slice(b"trailing");
        assert_eq!(
            HelloFs::new().setxattr(
                HELLO_INO,
                SETXATTR_NAME.as_bytes(),
                &padded,
                SETXATTR_VALUE.len(),
                0
            ),
            Ok(())
        );
    }

    #[test]
    fn removexattr_accepts_only_known_name() {
        let fs = HelloFs::new();
        assert_eq!(fs.removexattr(HELLO_INO, REMOVEXATTR_NAME.as_bytes()), Ok(()));
        assert_eq!(
            fs.removexattr(HELLO_INO, GETXATTR_NAME.as_bytes()),
            Err(FsError::NotSupported)
        );
    }

    #[test]
    fn xattr_ops_outside_namespace_are_contract_violations() {
        let fs = HelloFs::new();
        assert!(fs.getxattr(9, GETXATTR_NAME.as_bytes(), 0).unwrap_err().is_contract_violation());
        assert!(
            fs.setxattr(9, SETXATTR_NAME.as_bytes(), b"", 0, 0)
                .unwrap_err()
                .is_contract_violation()
        );
        assert!(
            fs.removexattr(9, REMOVEXATTR_NAME.as_bytes())
                .unwrap_err()
                .is_contract_violation()
        );
    }

    #[test]
    fn dispatch_produces_matching_reply_variant() {
        let fs = HelloFs::new();
        assert!(matches!(
            fs.dispatch(Operation::Lookup {
                parent: ROOT_INO,
                name: b"hello"
            }),
            Reply::Entry(_)
        ));
        assert!(matches!(fs.dispatch(Operation::GetAttr { ino: HELLO_INO }), Reply::Attr(_)));
        assert!(matches!(
            fs.dispatch(Operation::Open {
                ino: HELLO_INO,
                flags: libc::O_RDONLY
            }),
            Reply::Opened(_)
        ));
        assert_eq!(
            fs.dispatch(Operation::RemoveXattr {
                ino: ROOT_INO,
                name: REMOVEXATTR_NAME.as_bytes()
            }),
            Reply::Empty
        );
        assert_eq!(
            fs.dispatch(Operation::ReadDir {
                ino: HELLO_INO,
                size: 4096,
                offset: 0
            }),
            Reply::Error(FsError::NotADirectory)
        );
        assert_eq!(Operation::GetAttr { ino: 1 }.name(), "getattr");
    }
}
