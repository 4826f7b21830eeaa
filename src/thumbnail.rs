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

//! Thumbnail trailing record
//!
//! Thumbnails carry a fixed 20 byte record at the very end of the image file:
//!
//! | bytes | content                       |
//! |-------|-------------------------------|
//! | 0..7  | magic `crThumb`               |
//! | 7..15 | reference hash, `u64` LE      |
//! | 15..17| manager version, `u16` LE     |
//! | 17..20| reserved, zero                |
//!
//! Image decoders ignore trailing bytes, so the record can be appended to a
//! finished image and read back by seeking to the end.

use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const THUMBNAIL_MAGIC: [u8; 7] = *b"crThumb";
pub const THUMBNAIL_RECORD_SIZE: usize = 20;

/// Hash and version a thumbnail was generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThumbnailInfo {
    pub reference_hash: u64,
    pub version: u16,
}

impl ThumbnailInfo {
    pub fn new(reference_hash: u64, version: u16) -> Self {
        Self {
            reference_hash,
            version,
        }
    }

    pub fn to_bytes(&self) -> [u8; THUMBNAIL_RECORD_SIZE] {
        let mut bytes = [0u8; THUMBNAIL_RECORD_SIZE];
        bytes[0..7].copy_from_slice(&THUMBNAIL_MAGIC);
        bytes[7..15].copy_from_slice(&self.reference_hash.to_le_bytes());
        bytes[15..17].copy_from_slice(&self.version.to_le_bytes());
        bytes
    }

    /// Parse a record; `None` when the magic does not match
    pub fn from_bytes(bytes: &[u8; THUMBNAIL_RECORD_SIZE]) -> Option<Self> {
        if bytes[0..7] != THUMBNAIL_MAGIC {
            return None;
        }
        let mut hash = [0u8; 8];
        hash.copy_from_slice(&bytes[7..15]);
        let version = u16::from_le_bytes([bytes[15], bytes[16]]);
        Some(Self {
            reference_hash: u64::from_le_bytes(hash),
            version,
        })
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    /// Read a record at the reader's position
    pub fn deserialize<R: Read>(reader: &mut R) -> io::Result<Option<Self>> {
        let mut bytes = [0u8; THUMBNAIL_RECORD_SIZE];
        reader.read_exact(&mut bytes)?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn append_to_file(&self, path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(path)?;
        self.serialize(&mut file)
    }

    /// Read the record from the end of a thumbnail file
    pub fn read_from_file(path: &Path) -> io::Result<Option<Self>> {
        let mut file = std::fs::File::open(path)?;
        let len = file.metadata()?.len();
        if len < THUMBNAIL_RECORD_SIZE as u64 {
            return Ok(None);
        }
        file.seek(SeekFrom::End(-(THUMBNAIL_RECORD_SIZE as i64)))?;
        Self::deserialize(&mut file)
    }
}

/// True when the thumbnail at `path` was generated for this hash and version
pub fn is_thumbnail_up_to_date(path: &Path, reference_hash: u64, version: u16) -> bool {
    matches!(
        ThumbnailInfo::read_from_file(path),
        Ok(Some(info)) if info.reference_hash == reference_hash && info.version == version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout() {
        let info = ThumbnailInfo::new(0x1122_3344_5566_7788, 0x0102);
        let bytes = info.to_bytes();
        assert_eq!(&bytes[0..7], b"crThumb");
        assert_eq!(bytes[7], 0x88);
        assert_eq!(bytes[14], 0x11);
        assert_eq!(&bytes[15..17], &[0x02, 0x01]);
        assert_eq!(&bytes[17..], &[0, 0, 0]);
        assert_eq!(ThumbnailInfo::from_bytes(&bytes), Some(info));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = ThumbnailInfo::new(1, 1).to_bytes();
        bytes[0] = b'x';
        assert_eq!(ThumbnailInfo::from_bytes(&bytes), None);
    }

    #[test]
    fn appended_record_is_read_from_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thumb.jpg");
        std::fs::write(&path, b"\xFF\xD8 not really a jpeg \xFF\xD9").unwrap();
        ThumbnailInfo::new(42, 3).append_to_file(&path).unwrap();

        assert_eq!(ThumbnailInfo::read_from_file(&path).unwrap(), Some(ThumbnailInfo::new(42, 3)));
        assert!(is_thumbnail_up_to_date(&path, 42, 3));
        assert!(!is_thumbnail_up_to_date(&path, 42, 4));
        assert!(!is_thumbnail_up_to_date(&dir.path().join("missing.jpg"), 42, 3));
    }
}
