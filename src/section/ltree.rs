//! Ltree / single-files-data section: the embedded logical-file listing
//! (§4.12).

use crate::checksum::adler32;
use crate::endian::{read_bytes, read_u64_le, write_bytes, write_u64_le};
use crate::error::{Error, Result};
use crate::hash_sections::md5_of;

const V1_HEADER_SIZE: usize = 48; // unknown1[16] + data_size[8] + checksum[4] + unknown2[20]

/// Parses a v1 ltree section payload: header, UTF-16LE listing, and a
/// trailing MD5 integrity check over the listing bytes (stored in the
/// `unknown1` slot on write, per §4.12).
pub fn read_ltree_v1(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() < V1_HEADER_SIZE {
        return Err(Error::truncated("ltree header (v1)", 0));
    }
    let stored_integrity_md5: [u8; 16] = read_bytes(payload, 0, 16)?.try_into().unwrap();
    let data_size = read_u64_le(payload, 16)? as usize;
    let stored_checksum = {
        let bytes = read_bytes(payload, 24, 4)?;
        u32::from_le_bytes(bytes.try_into().unwrap())
    };
    let computed_checksum = adler32(&payload[..24], 1);
    if stored_checksum != computed_checksum {
        return Err(Error::checksum_mismatch("ltree header (v1)", stored_checksum, computed_checksum));
    }

    let listing_start = V1_HEADER_SIZE;
    let listing_end = listing_start
        .checked_add(data_size)
        .ok_or_else(|| Error::OutOfBounds("ltree listing region overflows usize".into()))?;
    if payload.len() < listing_end {
        return Err(Error::truncated("ltree listing (v1)", listing_start as u64));
    }
    let listing = &payload[listing_start..listing_end];

    let computed_integrity_md5 = md5_of(listing);
    if stored_integrity_md5 != [0u8; 16] && stored_integrity_md5 != computed_integrity_md5 {
        return Err(Error::FormatInvariant(
            "ltree listing MD5 integrity hash does not match the listing bytes".into(),
        ));
    }

    Ok(listing.to_vec())
}

/// Serializes `listing` (already UTF-16LE encoded) into a v1 ltree section
/// payload, embedding the listing's MD5 integrity hash.
pub fn write_ltree_v1(listing: &[u8]) -> Result<Vec<u8>> {
    let data_size =
        u64::try_from(listing.len()).map_err(|_| Error::OutOfBounds("ltree listing too large".into()))?;
    let mut payload = vec![0u8; V1_HEADER_SIZE];
    write_bytes(&mut payload, 0, &md5_of(listing));
    write_u64_le(&mut payload, 16, data_size);
    let checksum = adler32(&payload[..24], 1);
    payload[24..28].copy_from_slice(&checksum.to_le_bytes());
    payload.extend_from_slice(listing);
    Ok(payload)
}

/// v2 has no section-local header: the whole payload is the listing, and
/// its MD5 integrity hash lives in the owning [`super::SectionDescriptor`]'s
/// `data_integrity_hash` field instead.
pub fn read_ltree_v2<'a>(payload: &'a [u8], data_integrity_hash: [u8; 16]) -> Result<&'a [u8]> {
    if data_integrity_hash != [0u8; 16] {
        let computed = md5_of(payload);
        if data_integrity_hash != computed {
            return Err(Error::FormatInvariant(
                "ltree (v2) data_integrity_hash does not match the listing bytes".into(),
            ));
        }
    }
    Ok(payload)
}

/// Computes the MD5 a v2 section descriptor should carry for `listing`.
pub fn ltree_v2_integrity_hash(listing: &[u8]) -> [u8; 16] {
    md5_of(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::header::encode_utf16le;

    #[test]
    fn v1_round_trips_listing_and_integrity_hash() {
        let listing = encode_utf16le("root\\file.txt\r\n");
        let payload = write_ltree_v1(&listing).unwrap();
        let parsed = read_ltree_v1(&payload).unwrap();
        assert_eq!(parsed, listing);
    }

    #[test]
    fn v1_rejects_tampered_listing() {
        let listing = encode_utf16le("root\\file.txt\r\n");
        let mut payload = write_ltree_v1(&listing).unwrap();
        let last = payload.len() - 1;
        payload[last] ^= 0xff;

        let result = read_ltree_v1(&payload);
        assert!(matches!(result, Err(Error::FormatInvariant(_))));
    }

    #[test]
    fn v2_uses_descriptor_level_integrity_hash() {
        let listing = encode_utf16le("root\\notes.txt\r\n");
        let hash = ltree_v2_integrity_hash(&listing);

        let parsed = read_ltree_v2(&listing, hash).unwrap();
        assert_eq!(parsed, &listing[..]);
    }

    #[test]
    fn v2_zero_hash_skips_verification() {
        let listing = encode_utf16le("unset\r\n");
        let parsed = read_ltree_v2(&listing, [0u8; 16]).unwrap();
        assert_eq!(parsed, &listing[..]);
    }
}
