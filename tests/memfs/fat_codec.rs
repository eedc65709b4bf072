//! Exercises the FAT directory-entry codec the way a directory scan
//! would: a short 8.3 entry preceded by a chain of LFN fragments,
//! classified and reassembled back into the long name.

use fs_glue::fat::{chksum, classify_dentry, lfn_convert_name, lfn_copy_entry, lfn_seq_byte, lfn_size, name_get, name_set, namecmp, DentryClass, RawDentry, EXT_LEN, NAME_LEN};

const LFN_PART1_OFFSET: usize = 1;
const LFN_PART1_SIZE: usize = 10;
const LFN_PART2_OFFSET: usize = 14;
const LFN_PART2_SIZE: usize = 12;
const LFN_PART3_OFFSET: usize = 28;
const LFN_PART3_SIZE: usize = 4;
const ATTR_LFN: u8 = 0x0f;

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn lfn_fragment(seq_byte: u8, part1: &str, part2: &str, part3: &str, checksum: u8) -> RawDentry {
    let mut d = RawDentry::zeroed();
    d.set_attr(ATTR_LFN);
    let mut raw = *d.as_bytes();
    raw[0] = seq_byte;
    raw[13] = checksum;

    let fill = |raw: &mut [u8], offset: usize, size: usize, s: &str| {
        let bytes = utf16le(s);
        raw[offset..offset + bytes.len()].copy_from_slice(&bytes);
        for i in bytes.len()..size {
            raw[offset + i] = 0xff;
        }
    };
    fill(&mut raw, LFN_PART1_OFFSET, LFN_PART1_SIZE, part1);
    fill(&mut raw, LFN_PART2_OFFSET, LFN_PART2_SIZE, part2);
    fill(&mut raw, LFN_PART3_OFFSET, LFN_PART3_SIZE, part3);
    RawDentry::from_bytes(raw)
}

#[test]
fn a_two_fragment_long_name_is_classified_and_reassembled() {
    let mut short = RawDentry::zeroed();
    name_set(&mut short, "NOPQRST.TXT");
    let sum = chksum(&{
        let mut buf = [0u8; NAME_LEN + EXT_LEN];
        buf[..NAME_LEN].copy_from_slice(&short.name_bytes());
        buf[NAME_LEN..].copy_from_slice(&short.ext_bytes());
        buf
    });

    // On disk, LFN fragments precede the short entry in descending
    // sequence order: the fragment closest to the short entry (seq 1)
    // scans last, the one marked "last" (highest seq, 0x40 set) scans
    // first.
    let entry1 = lfn_fragment(lfn_seq_byte(1, false), "abcde", "fghijk", "lm", sum);
    let entry2 = lfn_fragment(lfn_seq_byte(2, true), "nopqr", "st", "", sum);

    assert_eq!(classify_dentry(&entry2), DentryClass::Lfn);
    assert_eq!(classify_dentry(&entry1), DentryClass::Lfn);
    assert_eq!(classify_dentry(&short), DentryClass::Valid);

    let total = lfn_size(&entry1) + lfn_size(&entry2);
    let mut dst = vec![0u8; total];
    let mut offset = total;
    lfn_copy_entry(&entry2, &mut dst, &mut offset);
    lfn_copy_entry(&entry1, &mut dst, &mut offset);
    assert_eq!(offset, 0);

    let long_name = lfn_convert_name(&dst).unwrap();
    assert_eq!(long_name, "abcdefghijklmnopqrst");
    assert!(namecmp(&name_get(&short), "nopqrst.txt"));
}

#[test]
fn an_erased_lfn_fragment_is_free_not_lfn() {
    let fragment = lfn_fragment(lfn_seq_byte(1, false), "a", "", "", 0);
    let mut raw = *fragment.as_bytes();
    raw[0] = 0xe5;
    let fragment = RawDentry::from_bytes(raw);
    assert_eq!(classify_dentry(&fragment), DentryClass::Free);
}
