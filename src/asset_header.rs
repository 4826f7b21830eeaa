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

//! Header embedded at the start of every transformed output file

use std::io::{self, Read, Write};
use std::path::Path;

pub const ASSET_HEADER_MAGIC: [u8; 7] = *b"crAsset";
pub const ASSET_HEADER_SIZE: usize = 17;

/// Dependency hash and manager version an output was produced from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssetFileHeader {
    pub hash: u64,
    pub version: u16,
}

impl AssetFileHeader {
    pub fn new(hash: u64, version: u16) -> Self {
        Self { hash, version }
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&ASSET_HEADER_MAGIC)?;
        writer.write_all(&self.hash.to_le_bytes())?;
        writer.write_all(&self.version.to_le_bytes())
    }

    /// `None` when the stream does not start with a header
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Option<Self>> {
        let mut bytes = [0u8; ASSET_HEADER_SIZE];
        match reader.read_exact(&mut bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        if bytes[0..7] != ASSET_HEADER_MAGIC {
            return Ok(None);
        }
        let mut hash = [0u8; 8];
        hash.copy_from_slice(&bytes[7..15]);
        Ok(Some(Self {
            hash: u64::from_le_bytes(hash),
            version: u16::from_le_bytes([bytes[15], bytes[16]]),
        }))
    }

    pub fn read_from_file(path: &Path) -> io::Result<Option<Self>> {
        let mut file = std::fs::File::open(path)?;
        Self::read(&mut file)
    }
}

/// True when the output at `path` exists and carries this hash and version
pub fn is_output_up_to_date(path: &Path, hash: u64, version: u16) -> bool {
    matches!(
        AssetFileHeader::read_from_file(path),
        Ok(Some(header)) if header == AssetFileHeader::new(hash, version)
    )
}
