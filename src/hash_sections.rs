//! Hash sections: digests and xhash blob (§3.1, §4.10).

/// Digests and the opaque xhash blob collected from `hash`/`digest`/
/// `md5_hash`/`sha1_hash`/`xhash` sections, consumed by verify/export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashSections {
    pub md5_hash: [u8; 16],
    pub md5_hash_set: bool,
    pub sha1_hash: [u8; 20],
    pub sha1_hash_set: bool,
    pub md5_digest: [u8; 16],
    pub md5_digest_set: bool,
    pub sha1_digest: [u8; 20],
    pub sha1_digest_set: bool,
    pub xhash: Vec<u8>,
}

impl HashSections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_md5_hash(&mut self, md5: [u8; 16]) {
        self.md5_hash = md5;
        self.md5_hash_set = true;
    }

    pub fn set_sha1_hash(&mut self, sha1: [u8; 20]) {
        self.sha1_hash = sha1;
        self.sha1_hash_set = true;
    }

    pub fn set_md5_digest(&mut self, md5: [u8; 16]) {
        self.md5_digest = md5;
        self.md5_digest_set = true;
    }

    pub fn set_sha1_digest(&mut self, sha1: [u8; 20]) {
        self.sha1_digest = sha1;
        self.sha1_digest_set = true;
    }

    pub fn set_xhash(&mut self, xhash: Vec<u8>) {
        self.xhash = xhash;
    }
}

/// Computes the MD5 digest of `data`, used both when writing a new hash
/// section and when verifying a read-back image against its stored digest
/// (§8.3's end-to-end scenario).
pub fn md5_of(data: &[u8]) -> [u8; 16] {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes the SHA-1 digest of `data`.
pub fn sha1_of(data: &[u8]) -> [u8; 20] {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_of_empty_matches_known_vector() {
        assert_eq!(
            md5_of(b""),
            [
                0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8,
                0x42, 0x7e
            ]
        );
    }

    #[test]
    fn sha1_of_empty_matches_known_vector() {
        assert_eq!(
            sha1_of(b""),
            [
                0xda, 0x39, 0xa3, 0xee, 0x5e, 0x6b, 0x4b, 0x0d, 0x32, 0x55, 0xbf, 0xef, 0x95, 0x60,
                0x18, 0x90, 0xaf, 0xd8, 0x07, 0x09
            ]
        );
    }

    #[test]
    fn set_methods_flip_the_presence_flag() {
        let mut hashes = HashSections::new();
        assert!(!hashes.md5_digest_set);
        hashes.set_md5_digest([1u8; 16]);
        assert!(hashes.md5_digest_set);
        assert_eq!(hashes.md5_digest, [1u8; 16]);
    }
}
