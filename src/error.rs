//! Domain-level error kinds shared by every handler in the crate.
//!
//! Mirrors the source's `errno`-style return codes (`EOK`, `ENOENT`, ...)
//! as a closed, `Copy` enum rather than a raw integer, the same way
//! [`crate::backend`] replaces the source's function-pointer table with a
//! trait.

use std::fmt;

/// Result alias used throughout the dispatch/lookup/FAT layers.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Domain-level error kinds (§7).
///
/// Deliberately a plain enum with no payload: the source's error codes
/// carry no auxiliary data either, and backend-specific detail (e.g. an
/// `io::Error`) belongs on the backend's own associated `Error` type, not
/// smuggled in here.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// No such file or directory.
    NoEntry,
    /// The caller specified a non-directory in a directory operation.
    NotDirectory,
    /// The caller specified a directory in a non-directory operation.
    IsDirectory,
    /// `L_CREATE | L_EXCLUSIVE` (or a plain create) found an existing node.
    AlreadyExists,
    /// Malformed or contradictory arguments (e.g. `L_UNLINK | L_CREATE`).
    InvalidArgument,
    /// A path component exceeded `NAME_MAX`.
    NameTooLong,
    /// A length or offset argument was out of range.
    Range,
    /// The backend has no space left to allocate a new node.
    NoSpace,
    /// Out of memory (e.g. failure to map the PLB at registration).
    NoMemory,
    /// The mount point already carries an active mount.
    Busy,
    /// The file handle / node reference was invalid.
    BadFd,
    /// Unknown dispatch method.
    NotSupported,
    /// A fixed-size destination buffer was too small (e.g. LFN decode).
    Overflow,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RpcError::NoEntry => "no such file or directory",
            RpcError::NotDirectory => "not a directory",
            RpcError::IsDirectory => "is a directory",
            RpcError::AlreadyExists => "already exists",
            RpcError::InvalidArgument => "invalid argument",
            RpcError::NameTooLong => "name too long",
            RpcError::Range => "value out of range",
            RpcError::NoSpace => "no space left on device",
            RpcError::NoMemory => "out of memory",
            RpcError::Busy => "resource busy",
            RpcError::BadFd => "bad file descriptor",
            RpcError::NotSupported => "operation not supported",
            RpcError::Overflow => "buffer overflow",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    /// "First error wins" combinator (§7): `combine_rc(a, b) = a==OK ? b : a`.
    pub fn combine(a: Result<()>, b: Result<()>) -> Result<()> {
        match a {
            Ok(()) => b,
            Err(_) => a,
        }
    }
}
