//! FAT 8.3/LFN directory-entry codec (§2, §4.6).
//!
//! Grounded on the source's `fat_dentry.c`: converts between the
//! on-disk 32-byte directory-entry layout and host-side names, computes
//! checksums, and classifies entries during a directory scan. Concrete
//! block I/O, cluster allocation, and FAT-chain walking are out of
//! scope (§1) — this module is the pure encode/decode/classify layer a
//! concrete FAT backend builds on.

pub mod dentry;
pub mod lfn;
pub mod name;

pub use dentry::{classify_dentry, DentryClass, RawDentry, DENTRY_SIZE, EXT_LEN, NAME_LEN};
pub use lfn::{lfn_convert_name, lfn_copy_entry, lfn_copy_part, lfn_seq_byte, lfn_size, lfn_str_nlength};
pub use name::{chksum, name_get, name_set, name_verify, namecmp};
