//! Hash / digest / md5_hash / sha1_hash sections (§4.10).

use crate::checksum::adler32;
use crate::endian::{read_bytes, read_u32_le, write_bytes, write_u32_le};
use crate::error::{Error, Result};
use crate::hash_sections::HashSections;

const HASH_V1_SIZE: usize = 36;
const DIGEST_SIZE: usize = 80;
const MD5_HASH_V2_SIZE: usize = 32;
const SHA1_HASH_V2_SIZE: usize = 32;

fn is_all_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

/// Parses a v1 `hash` section (MD5 only) into `hashes`.
pub fn read_hash_v1(payload: &[u8], hashes: &mut HashSections) -> Result<()> {
    if payload.len() < HASH_V1_SIZE {
        return Err(Error::truncated("hash section (v1)", 0));
    }
    let stored_checksum = read_u32_le(payload, 32)?;
    let computed_checksum = adler32(&payload[..32], 1);
    if stored_checksum != computed_checksum {
        return Err(Error::checksum_mismatch("hash section (v1)", stored_checksum, computed_checksum));
    }

    let md5: [u8; 16] = read_bytes(payload, 0, 16)?.try_into().unwrap();
    if !is_all_zero(&md5) {
        hashes.set_md5_hash(md5);
    }
    Ok(())
}

/// Serializes `hashes.md5_hash` into a v1 `hash` section payload.
pub fn write_hash_v1(hashes: &HashSections) -> [u8; HASH_V1_SIZE] {
    let mut buf = [0u8; HASH_V1_SIZE];
    if hashes.md5_hash_set {
        write_bytes(&mut buf, 0, &hashes.md5_hash);
    }
    let checksum = adler32(&buf[..32], 1);
    write_u32_le(&mut buf, 32, checksum);
    buf
}

/// Parses a `digest` section (MD5 + SHA-1) into `hashes`.
pub fn read_digest(payload: &[u8], hashes: &mut HashSections) -> Result<()> {
    if payload.len() < DIGEST_SIZE {
        return Err(Error::truncated("digest section", 0));
    }
    let stored_checksum = read_u32_le(payload, 76)?;
    let computed_checksum = adler32(&payload[..76], 1);
    if stored_checksum != computed_checksum {
        return Err(Error::checksum_mismatch("digest section", stored_checksum, computed_checksum));
    }

    let md5: [u8; 16] = read_bytes(payload, 0, 16)?.try_into().unwrap();
    let sha1: [u8; 20] = read_bytes(payload, 16, 20)?.try_into().unwrap();
    if !is_all_zero(&md5) {
        hashes.set_md5_digest(md5);
    }
    if !is_all_zero(&sha1) {
        hashes.set_sha1_digest(sha1);
    }
    Ok(())
}

/// Serializes `hashes`'s digest fields into a `digest` section payload.
pub fn write_digest(hashes: &HashSections) -> [u8; DIGEST_SIZE] {
    let mut buf = [0u8; DIGEST_SIZE];
    if hashes.md5_digest_set {
        write_bytes(&mut buf, 0, &hashes.md5_digest);
    }
    if hashes.sha1_digest_set {
        write_bytes(&mut buf, 16, &hashes.sha1_digest);
    }
    let checksum = adler32(&buf[..76], 1);
    write_u32_le(&mut buf, 76, checksum);
    buf
}

/// Parses a v2 `md5_hash` section into `hashes`.
pub fn read_md5_hash_v2(payload: &[u8], hashes: &mut HashSections) -> Result<()> {
    if payload.len() < MD5_HASH_V2_SIZE {
        return Err(Error::truncated("md5_hash section (v2)", 0));
    }
    let stored_checksum = read_u32_le(payload, 16)?;
    let computed_checksum = adler32(&payload[..16], 1);
    if stored_checksum != computed_checksum {
        return Err(Error::checksum_mismatch("md5_hash section (v2)", stored_checksum, computed_checksum));
    }

    let md5: [u8; 16] = read_bytes(payload, 0, 16)?.try_into().unwrap();
    if !is_all_zero(&md5) {
        hashes.set_md5_hash(md5);
    }
    Ok(())
}

/// Serializes `hashes.md5_hash` into a v2 `md5_hash` section payload.
pub fn write_md5_hash_v2(hashes: &HashSections) -> [u8; MD5_HASH_V2_SIZE] {
    let mut buf = [0u8; MD5_HASH_V2_SIZE];
    if hashes.md5_hash_set {
        write_bytes(&mut buf, 0, &hashes.md5_hash);
    }
    let checksum = adler32(&buf[..16], 1);
    write_u32_le(&mut buf, 16, checksum);
    buf
}

/// Parses a v2 `sha1_hash` section into `hashes`.
pub fn read_sha1_hash_v2(payload: &[u8], hashes: &mut HashSections) -> Result<()> {
    if payload.len() < SHA1_HASH_V2_SIZE {
        return Err(Error::truncated("sha1_hash section (v2)", 0));
    }
    let stored_checksum = read_u32_le(payload, 20)?;
    let computed_checksum = adler32(&payload[..20], 1);
    if stored_checksum != computed_checksum {
        return Err(Error::checksum_mismatch("sha1_hash section (v2)", stored_checksum, computed_checksum));
    }

    let sha1: [u8; 20] = read_bytes(payload, 0, 20)?.try_into().unwrap();
    if !is_all_zero(&sha1) {
        hashes.set_sha1_hash(sha1);
    }
    Ok(())
}

/// Serializes `hashes.sha1_hash` into a v2 `sha1_hash` section payload.
pub fn write_sha1_hash_v2(hashes: &HashSections) -> [u8; SHA1_HASH_V2_SIZE] {
    let mut buf = [0u8; SHA1_HASH_V2_SIZE];
    if hashes.sha1_hash_set {
        write_bytes(&mut buf, 0, &hashes.sha1_hash);
    }
    let checksum = adler32(&buf[..20], 1);
    write_u32_le(&mut buf, 20, checksum);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_md5() -> [u8; 16] {
        let mut md5 = [0u8; 16];
        let hex = "03c9d5339abf1ebdc144b9ed3d7e4597";
        for (i, byte) in md5.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).unwrap();
        }
        md5
    }

    fn sample_sha1() -> [u8; 20] {
        let mut sha1 = [0u8; 20];
        let hex = "8ac00925fa09a899839bda5f7fbfa5a357ec0e67";
        for (i, byte) in sha1.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).unwrap();
        }
        sha1
    }

    /// §8.2 scenario 3.
    #[test]
    fn digest_section_sets_both_hashes() {
        let mut hashes = HashSections::new();
        hashes.set_md5_digest(sample_md5());
        hashes.set_sha1_digest(sample_sha1());
        let payload = write_digest(&hashes);

        let mut parsed = HashSections::new();
        read_digest(&payload, &mut parsed).unwrap();

        assert!(parsed.md5_digest_set);
        assert_eq!(parsed.md5_digest, sample_md5());
        assert!(parsed.sha1_digest_set);
        assert_eq!(parsed.sha1_digest, sample_sha1());
    }

    /// §8.2 scenario 4.
    #[test]
    fn all_zero_digest_section_leaves_flags_unset() {
        let empty = HashSections::new();
        let payload = write_digest(&empty);

        let mut parsed = HashSections::new();
        read_digest(&payload, &mut parsed).unwrap();

        assert!(!parsed.md5_digest_set);
        assert!(!parsed.sha1_digest_set);
    }

    /// §8.2 scenario 5.
    #[test]
    fn md5_hash_v2_round_trips() {
        let mut hashes = HashSections::new();
        hashes.set_md5_hash(sample_md5());
        let payload = write_md5_hash_v2(&hashes);

        let mut parsed = HashSections::new();
        read_md5_hash_v2(&payload, &mut parsed).unwrap();

        assert!(parsed.md5_hash_set);
        assert_eq!(parsed.md5_hash, sample_md5());

        let roundtrip = write_md5_hash_v2(&parsed);
        assert_eq!(roundtrip, payload);
    }

    #[test]
    fn sha1_hash_v2_round_trips() {
        let mut hashes = HashSections::new();
        hashes.set_sha1_hash(sample_sha1());
        let payload = write_sha1_hash_v2(&hashes);

        let mut parsed = HashSections::new();
        read_sha1_hash_v2(&payload, &mut parsed).unwrap();

        assert!(parsed.sha1_hash_set);
        assert_eq!(parsed.sha1_hash, sample_sha1());
    }

    #[test]
    fn hash_v1_checksum_mismatch_is_rejected() {
        let mut hashes = HashSections::new();
        hashes.set_md5_hash(sample_md5());
        let mut payload = write_hash_v1(&hashes);
        payload[32..36].copy_from_slice(&0xFFFFFFFFu32.to_le_bytes());

        let mut parsed = HashSections::new();
        let result = read_hash_v1(&payload, &mut parsed);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }
}
