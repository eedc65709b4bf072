//! 32-byte on-disk directory entry and its classification (§4.6, §6).
//!
//! A [`RawDentry`] is the same 32 bytes whether it holds a short (8.3)
//! entry or an LFN fragment ([`crate::fat::lfn`]) — which view applies is
//! decided by [`classify_dentry`], not by the type system, mirroring the
//! source's single `fat_dentry_t` struct overlaying both layouts.

/// Size of one directory entry record, fixed by the FAT format.
pub const DENTRY_SIZE: usize = 32;
/// Length of the 8.3 base name field.
pub const NAME_LEN: usize = 8;
/// Length of the 8.3 extension field.
pub const EXT_LEN: usize = 3;

/// Padding byte filling unused name/extension positions.
pub const PAD: u8 = 0x20;
/// Escapes a leading `0xE5` byte in a real name, distinguishing it from
/// the erased-entry marker below.
pub const DENTRY_E5_ESC: u8 = 0x05;
/// `name[0]` (or the LFN order byte) marking a reusable, erased entry.
pub const DENTRY_ERASED: u8 = 0xe5;
/// `name[0]` marking an entry that was never used; scanning may stop.
pub const DENTRY_UNUSED: u8 = 0x00;
/// `name[0] == '.'`: a `.`/`..` entry, skipped but not a terminator.
pub const DENTRY_DOT: u8 = b'.';

/// Volume-label bit in `attr`.
pub const ATTR_VOLLABEL: u8 = 0x08;
/// `attr` value identifying an LFN fragment.
pub const ATTR_LFN: u8 = 0x0f;

/// `lcase` bit: base name was stored upper-case but displays lower-case.
pub const LCASE_LOWER_NAME: u8 = 0x08;
/// `lcase` bit: same, for the extension.
pub const LCASE_LOWER_EXT: u8 = 0x10;

const EXT_OFFSET: usize = 8;
const ATTR_OFFSET: usize = 11;
const LCASE_OFFSET: usize = 12;

/// One raw 32-byte directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDentry(pub [u8; DENTRY_SIZE]);

impl RawDentry {
    pub fn zeroed() -> Self {
        Self([0u8; DENTRY_SIZE])
    }

    pub fn from_bytes(bytes: [u8; DENTRY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DENTRY_SIZE] {
        &self.0
    }

    /// Byte shared by a short entry's `name[0]` and an LFN fragment's
    /// sequence/order byte.
    pub fn order(&self) -> u8 {
        self.0[0]
    }

    pub fn name_bytes(&self) -> [u8; NAME_LEN] {
        self.0[0..NAME_LEN].try_into().unwrap()
    }

    pub fn set_name_bytes(&mut self, name: [u8; NAME_LEN]) {
        self.0[0..NAME_LEN].copy_from_slice(&name);
    }

    pub fn ext_bytes(&self) -> [u8; EXT_LEN] {
        self.0[EXT_OFFSET..EXT_OFFSET + EXT_LEN].try_into().unwrap()
    }

    pub fn set_ext_bytes(&mut self, ext: [u8; EXT_LEN]) {
        self.0[EXT_OFFSET..EXT_OFFSET + EXT_LEN].copy_from_slice(&ext);
    }

    pub fn attr(&self) -> u8 {
        self.0[ATTR_OFFSET]
    }

    pub fn set_attr(&mut self, attr: u8) {
        self.0[ATTR_OFFSET] = attr;
    }

    pub fn lcase(&self) -> u8 {
        self.0[LCASE_OFFSET]
    }

    pub fn set_lcase(&mut self, lcase: u8) {
        self.0[LCASE_OFFSET] = lcase;
    }
}

/// Result of classifying one raw entry during a directory scan (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DentryClass {
    /// Reusable (erased) slot.
    Free,
    /// An LFN fragment, accumulated before the short entry it precedes.
    Lfn,
    /// Neither a usable node nor a scan terminator (volume label, `.`/`..`).
    Skip,
    /// Never-used entry; scanning may stop here.
    Last,
    /// A live short (8.3) entry.
    Valid,
}

/// Classifies one raw entry (§4.6).
pub fn classify_dentry(d: &RawDentry) -> DentryClass {
    if d.attr() == ATTR_LFN {
        return if d.order() == DENTRY_ERASED { DentryClass::Free } else { DentryClass::Lfn };
    }
    if d.attr() & ATTR_VOLLABEL != 0 {
        return DentryClass::Skip;
    }
    match d.name_bytes()[0] {
        DENTRY_ERASED => DentryClass::Free,
        DENTRY_UNUSED => DentryClass::Last,
        DENTRY_DOT => DentryClass::Skip,
        _ => DentryClass::Valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_entry(name0: u8) -> RawDentry {
        let mut d = RawDentry::zeroed();
        let mut name = [PAD; NAME_LEN];
        name[0] = name0;
        d.set_name_bytes(name);
        d
    }

    #[test]
    fn erased_short_entry_is_free() {
        assert_eq!(classify_dentry(&short_entry(DENTRY_ERASED)), DentryClass::Free);
    }

    #[test]
    fn never_used_short_entry_is_last() {
        assert_eq!(classify_dentry(&short_entry(DENTRY_UNUSED)), DentryClass::Last);
    }

    #[test]
    fn dot_entry_is_skipped() {
        assert_eq!(classify_dentry(&short_entry(b'.')), DentryClass::Skip);
    }

    #[test]
    fn ordinary_short_entry_is_valid() {
        assert_eq!(classify_dentry(&short_entry(b'F')), DentryClass::Valid);
    }

    #[test]
    fn volume_label_is_skipped() {
        let mut d = short_entry(b'V');
        d.set_attr(ATTR_VOLLABEL);
        assert_eq!(classify_dentry(&d), DentryClass::Skip);
    }

    #[test]
    fn lfn_fragment_is_classified_lfn_unless_erased() {
        let mut d = RawDentry::zeroed();
        d.set_attr(ATTR_LFN);
        assert_eq!(classify_dentry(&d), DentryClass::Lfn);

        let mut erased = RawDentry::zeroed();
        erased.set_attr(ATTR_LFN);
        erased.0[0] = DENTRY_ERASED;
        assert_eq!(classify_dentry(&erased), DentryClass::Free);
    }
}
