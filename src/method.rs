//! Wire-level method ids, argument layout, and lookup flags (§6).

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Dispatch method ids the core recognizes (§4.2, §6).
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Method {
    Mounted = 1,
    Mount = 2,
    Unmounted = 3,
    Unmount = 4,
    Link = 5,
    Lookup = 6,
    Read = 7,
    Write = 8,
    Truncate = 9,
    Close = 10,
    Destroy = 11,
    OpenNode = 12,
    Stat = 13,
    Sync = 14,
}

impl Method {
    /// Decodes a raw wire method id. `0` is the connection-termination
    /// sentinel (§4.2) and intentionally has no `Method` variant — callers
    /// must check for it before calling this. Any other unrecognized id
    /// yields `None`, to be answered with `NotSupported` (§4.2).
    pub fn from_raw(raw: u32) -> Option<Method> {
        FromPrimitive::from_u32(raw)
    }
}

/// Up to five 32-bit argument slots carried by every request (§4.2, §6).
pub type Args = [u32; 5];

/// A decoded inbound request: method plus its raw argument slots. Each
/// handler interprets the slots per the table in §6 (e.g. reassembling
/// 64-bit offsets as `lo | hi << 32`).
#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub method: Method,
    pub args: Args,
}

impl Request {
    pub fn new(method: Method, args: Args) -> Self {
        Self { method, args }
    }

    /// Reassembles a 64-bit value split across two adjacent argument
    /// slots, as the source's `MERGE_LOUP32` does.
    pub fn merge64(lo: u32, hi: u32) -> u64 {
        (lo as u64) | ((hi as u64) << 32)
    }

    /// Splits a 64-bit value into `(lo, hi)` 32-bit slots, as the
    /// source's `LOWER32`/`UPPER32` macros do.
    pub fn split64(value: u64) -> (u32, u32) {
        (value as u32, (value >> 32) as u32)
    }
}

/// Bitmask of lookup flags. Bit values are implementation detail;
/// only the semantics are normative.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct LookupFlags(u32);

impl LookupFlags {
    pub const FILE: LookupFlags = LookupFlags(1 << 0);
    pub const DIRECTORY: LookupFlags = LookupFlags(1 << 1);
    pub const OPEN: LookupFlags = LookupFlags(1 << 2);
    pub const CREATE: LookupFlags = LookupFlags(1 << 3);
    pub const EXCLUSIVE: LookupFlags = LookupFlags(1 << 4);
    pub const UNLINK: LookupFlags = LookupFlags(1 << 5);
    pub const MP: LookupFlags = LookupFlags(1 << 6);

    pub fn from_bits(bits: u32) -> Self {
        LookupFlags(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, flag: LookupFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn union(self, other: LookupFlags) -> Self {
        LookupFlags(self.0 | other.0)
    }
}

impl std::ops::BitOr for LookupFlags {
    type Output = LookupFlags;
    fn bitor(self, rhs: LookupFlags) -> LookupFlags {
        self.union(rhs)
    }
}

/// Reply payloads the core produces (§6). Every handler produces exactly
/// one of these (or an error, via [`crate::error::RpcError`]) per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Bare success with no payload (`UNMOUNTED`, `UNMOUNT`, `LINK`,
    /// `TRUNCATE`, `CLOSE`, `DESTROY`, `SYNC`, `STAT`'s final answer).
    Empty,
    /// `MOUNTED` reply: mounted root's `(index, size_lo, size_hi, link_count)`.
    Mounted { index: u64, size: u64, link_count: u32 },
    /// `MOUNT` reply: the mountee's four fields, forwarded verbatim.
    Mount { index: u64, size: u64, link_count: u32 },
    /// `LOOKUP` success reply (§4.4 steps 5 and 8).
    Lookup { fs_handle: u32, service_id: u64, index: u64, size: u64, link_count: u32 },
    /// `READ` reply: bytes read (the payload itself travels via a
    /// data-read handshake; this carries the byte count).
    Read { bytes: u32 },
    /// `WRITE` reply: bytes written plus the file's new size.
    Write { bytes: u32, new_size: u64 },
    /// `OPEN_NODE` reply.
    OpenNode { size: u64, link_count: u32, kind_flags: u32 },
}
