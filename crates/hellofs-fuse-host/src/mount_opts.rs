// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `-o` mount option parsing.

use crate::config::HostConfig;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MountOpt {
    FsName(String),
    Subtype(String),
    AllowOther,
    AllowRoot,
    AutoUnmount,
    DefaultPermissions,
    ReadOnly,
    ReadWrite,
    Suid,
    NoSuid,
    Dev,
    NoDev,
    Exec,
    NoExec,
    Atime,
    NoAtime,
    Sync,
    Async,
    /// Passed through to the kernel untouched
    Custom(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MountOptError {
    #[error("empty mount option")]
    Empty,
    #[error("mount option `{0}` requires a value")]
    MissingValue(&'static str),
}

impl FromStr for MountOpt {
    type Err = MountOptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let opt = match s.trim() {
            "" => return Err(MountOptError::Empty),
            "allow_other" => MountOpt::AllowOther,
            "allow_root" => MountOpt::AllowRoot,
            "auto_unmount" => MountOpt::AutoUnmount,
            "default_permissions" => MountOpt::DefaultPermissions,
            "ro" => MountOpt::ReadOnly,
            "rw" => MountOpt::ReadWrite,
            "suid" => MountOpt::Suid,
            "nosuid" => MountOpt::NoSuid,
            "dev" => MountOpt::Dev,
            "nodev" => MountOpt::NoDev,
            "exec" => MountOpt::Exec,
            "noexec" => MountOpt::NoExec,
            "atime" => MountOpt::Atime,
            "noatime" => MountOpt::NoAtime,
            "sync" => MountOpt::Sync,
            "async" => MountOpt::Async,
            other => match other.split_once('=') {
                Some(("fsname", "")) => return Err(MountOptError::MissingValue("fsname")),
                Some(("subtype", "")) => return Err(MountOptError::MissingValue("subtype")),
                Some(("fsname", name)) => MountOpt::FsName(name.to_string()),
                Some(("subtype", name)) => MountOpt::Subtype(name.to_string()),
                _ => MountOpt::Custom(other.to_string()),
            },
        };
        Ok(opt)
    }
}

/// Parse option strings, each of which may itself be comma separated.
pub fn parse_options<I, S>(raw: I) -> Result<Vec<MountOpt>, MountOptError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed = Vec::new();
    for item in raw {
        for part in item.as_ref().split(',') {
            parsed.push(part.parse()?);
        }
    }
    Ok(parsed)
}

/// Final option list: names and switches from the config, then explicit
/// options. An explicit `fsname=`/`subtype=` replaces the configured one.
pub fn resolve(config: &HostConfig, explicit: Vec<MountOpt>) -> Vec<MountOpt> {
    let mut options = Vec::with_capacity(explicit.len() + 4);

    if !explicit.iter().any(|o| matches!(o, MountOpt::FsName(_))) {
        options.push(MountOpt::FsName(config.fs_name.clone()));
    }
    if !explicit.iter().any(|o| matches!(o, MountOpt::Subtype(_))) {
        options.push(MountOpt::Subtype(config.subtype.clone()));
    }
    if config.allow_other {
        options.push(MountOpt::AllowOther);
    }
    if config.auto_unmount {
        options.push(MountOpt::AutoUnmount);
    }

    for opt in explicit {
        if !options.contains(&opt) {
            options.push(opt);
        }
    }
    options
}

#[cfg(all(feature = "fuse", target_os = "linux"))]
impl From<&MountOpt> for fuser::MountOption {
    fn from(opt: &MountOpt) -> Self {
        use fuser::MountOption;

        match opt {
            MountOpt::FsName(name) => MountOption::FSName(name.clone()),
            MountOpt::Subtype(name) => MountOption::Subtype(name.clone()),
            MountOpt::AllowOther => MountOption::AllowOther,
            MountOpt::AllowRoot => MountOption::AllowRoot,
            MountOpt::AutoUnmount => MountOption::AutoUnmount,
            MountOpt::DefaultPermissions => MountOption::DefaultPermissions,
            MountOpt::ReadOnly => MountOption::RO,
            MountOpt::ReadWrite => MountOption::RW,
            MountOpt::Suid => MountOption::Suid,
            MountOpt::NoSuid => MountOption::NoSuid,
            MountOpt::Dev => MountOption::Dev,
            MountOpt::NoDev => MountOption::NoDev,
            MountOpt::Exec => MountOption::Exec,
            MountOpt::NoExec => MountOption::NoExec,
            MountOpt::Atime => MountOption::Atime,
            MountOpt::NoAtime => MountOption::NoAtime,
            MountOpt::Sync => MountOption::Sync,
            MountOpt::Async => MountOption::Async,
            MountOpt::Custom(raw) => MountOption::CUSTOM(raw.clone()),
        }
    }
}
