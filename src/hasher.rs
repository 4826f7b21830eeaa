// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Content hashing
//!
//! 64-bit content hashes are the first eight bytes (little endian) of a
//! BLAKE3 digest. File content is streamed in fixed-size chunks so large
//! files never have to be resident in memory, except when a caller asks for
//! a copy of the bytes (document parsing reuses the same read).

use std::io::{self, BufRead, BufReader, Read, Write};

/// Chunk size used when streaming file content into the hasher
pub const HASH_CHUNK_SIZE: usize = 10 * 1024;

#[inline]
fn digest_to_u64(digest: blake3::Hash) -> u64 {
    let mut low = [0u8; 8];
    low.copy_from_slice(&digest.as_bytes()[0..8]);
    u64::from_le_bytes(low)
}

/// Hash an in-memory buffer
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    digest_to_u64(blake3::hash(bytes))
}

/// Fold `value` into a running hash.
///
/// Order dependent: callers feed inputs in a deterministic order.
#[inline]
pub fn combine_hash(running: u64, value: u64) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&running.to_le_bytes());
    hasher.update(&value.to_le_bytes());
    digest_to_u64(hasher.finalize())
}

/// Incremental content hasher
#[derive(Default, Clone)]
pub struct ContentHasher {
    inner: blake3::Hasher,
    bytes: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes fed so far
    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    pub fn finish(&self) -> u64 {
        digest_to_u64(self.inner.finalize())
    }
}

/// Stream `reader` through the hasher, optionally copying every chunk into `tee`.
pub fn hash_reader<R: Read>(reader: R, mut tee: Option<&mut dyn Write>) -> io::Result<u64> {
    let mut hasher = ContentHasher::new();
    let mut reader = BufReader::with_capacity(HASH_CHUNK_SIZE, reader);
    loop {
        let length = {
            let buffer = reader.fill_buf()?;
            hasher.update(buffer);
            if let Some(tee) = tee.as_deref_mut() {
                tee.write_all(buffer)?;
            }
            buffer.len()
        };
        if length == 0 {
            break;
        }
        reader.consume(length);
    }
    Ok(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_matches_buffer_hash() {
        let data: Vec<u8> = (0..(HASH_CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let streamed = hash_reader(&data[..], None).unwrap();
        assert_eq!(streamed, hash_bytes(&data));
    }

    #[test]
    fn tee_receives_all_bytes() {
        let data = b"asset document payload".repeat(2000);
        let mut copy = Vec::new();
        let hash = hash_reader(&data[..], Some(&mut copy)).unwrap();
        assert_eq!(copy, data);
        assert_eq!(hash, hash_bytes(&data));
    }

    #[test]
    fn combine_is_order_dependent() {
        let a = hash_bytes(b"a");
        let b = hash_bytes(b"b");
        assert_ne!(combine_hash(combine_hash(0, a), b), combine_hash(combine_hash(0, b), a));
        assert_eq!(combine_hash(7, a), combine_hash(7, a));
    }

    #[test]
    fn empty_input_hashes() {
        assert_eq!(hash_reader(io::empty(), None).unwrap(), hash_bytes(&[]));
        assert!(ContentHasher::new().is_empty());
    }
}
