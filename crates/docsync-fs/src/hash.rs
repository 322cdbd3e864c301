//! Truncated SHA-256 content hashes
//!
//! Every "has this changed" decision in docsync compares [`ContentHash`]
//! values: the hash of a local file is compared against the hash the store
//! reports for a revision part, so both sides must be computed here.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Number of digest bytes kept.
pub const HASH_LEN: usize = 16;

const CHUNK_SIZE: usize = 0x10000;

/// A 128-bit content digest (SHA-256 truncated to 16 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; HASH_LEN]);

impl ContentHash {
    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Hash an in-memory byte slice.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self::finish(Sha256::new_with_prefix(data))
    }

    /// Hash everything a reader yields, in fixed-size chunks.
    pub fn of_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => hasher.update(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(Self::finish(hasher))
    }

    /// Hash a file's contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn of_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Self::of_reader(file).map_err(|e| Error::io(path, e))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn finish(hasher: Sha256) -> Self {
        let digest = hasher.finalize();
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&digest[..HASH_LEN]);
        Self(out)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut out = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut out).map_err(|_| Error::InvalidHash {
            value: s.to_string(),
        })?;
        Ok(Self(out))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(ContentHash::of_bytes(b"test"), ContentHash::of_bytes(b"test"));
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(ContentHash::of_bytes(b"aaa"), ContentHash::of_bytes(b"bbb"));
    }

    #[test]
    fn hash_known_value() {
        // First 16 bytes of SHA-256("hello world")
        assert_eq!(
            ContentHash::of_bytes(b"hello world").to_hex(),
            "b94d27b9934d3e08a52e52d7da7dabfa"
        );
    }

    /// Yields `Interrupted` before every successful read.
    struct Flaky<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl Read for Flaky<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(std::io::ErrorKind::Interrupted.into());
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let data = b"interrupted but complete";
        let hash = ContentHash::of_reader(Flaky { data, interrupt: false }).unwrap();
        assert_eq!(hash, ContentHash::of_bytes(data));
    }

    #[test]
    fn reader_hash_matches_bytes_hash_across_chunks() {
        let data: Vec<u8> = (0..CHUNK_SIZE * 2 + 17).map(|i| (i % 251) as u8).collect();
        let streamed = ContentHash::of_reader(&data[..]).unwrap();
        assert_eq!(streamed, ContentHash::of_bytes(&data));
    }

    #[test]
    fn file_hash_matches_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.txt");
        std::fs::write(&path, "hello world").unwrap();

        assert_eq!(
            ContentHash::of_file(&path).unwrap(),
            ContentHash::of_bytes(b"hello world")
        );
    }

    #[test]
    fn hex_parse_roundtrip() {
        let hash = ContentHash::of_bytes(b"x");
        let parsed: ContentHash = hash.to_hex().parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!("abcd".parse::<ContentHash>().is_err());
    }
}
