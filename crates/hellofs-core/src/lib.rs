// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Hello filesystem core
//!
//! A fixed two-entry namespace (the root directory and one read-only file)
//! and the handler that answers filesystem requests against it. Transport
//! concerns such as mounting and wire decoding live in the host crate.

pub mod dirent;
pub mod error;
pub mod handler;
pub mod namespace;

pub use dirent::{DirBuffer, Dirent, entry_size};
pub use error::{FsError, FsResult};
pub use handler::{
    AttrReply, ConnectionPolicy, Entry, HelloFs, Opened, Operation, Reply, TTL, reply_limited,
};
pub use namespace::{
    Attributes, HELLO_CONTENT, HELLO_INO, HELLO_NAME, Namespace, NodeKind, ROOT_INO,
};
