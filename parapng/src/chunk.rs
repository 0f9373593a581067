// SPDX-License-Identifier: LGPL-2.1

//! PNG chunk framing: `length (4B, BE) ++ type (4B) ++ body ++ CRC-32 (4B, BE)`.
//!
//! The CRC covers `type ++ body` and is computed incrementally (hasher seeded
//! with the tag, then extended with the body) so the concatenation is never
//! materialized. This codec does not interpret chunk bodies; every structural
//! unit of the file (IHDR, pLLd, IDAT, IEND) goes through it.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;

use crate::{ParapngError, Result};

pub type ChunkType = [u8; 4];

pub const CHUNK_IHDR: ChunkType = *b"IHDR";
pub const CHUNK_PLLD: ChunkType = *b"pLLd";
pub const CHUNK_IDAT: ChunkType = *b"IDAT";
pub const CHUNK_IEND: ChunkType = *b"IEND";

/// Printable form of a chunk tag for error messages and logs.
pub fn tag_name(tag: &ChunkType) -> String {
  String::from_utf8_lossy(tag).into_owned()
}

fn chunk_crc(tag: &ChunkType, body: &[u8]) -> u32 {
  let mut hasher = Hasher::new();
  hasher.update(tag);
  hasher.update(body);
  hasher.finalize()
}

/// A short read inside the framing means the stream is cut off, not an I/O environment problem.
pub(crate) fn map_truncation(err: io::Error) -> ParapngError {
  if err.kind() == io::ErrorKind::UnexpectedEof {
    ParapngError::Framing("truncated stream".into())
  } else {
    ParapngError::Io(err)
  }
}

pub fn write_chunk<W: Write>(out: &mut W, tag: ChunkType, body: &[u8]) -> Result<()> {
  let len = u32::try_from(body.len()).map_err(|_| ParapngError::General(format!("chunk body too large: {} bytes", body.len())))?;
  out.write_u32::<BigEndian>(len)?;
  out.write_all(&tag)?;
  out.write_all(body)?;
  out.write_u32::<BigEndian>(chunk_crc(&tag, body))?;
  Ok(())
}

pub fn read_chunk<R: Read>(stream: &mut R) -> Result<(ChunkType, Vec<u8>)> {
  let len = stream.read_u32::<BigEndian>().map_err(map_truncation)? as usize;
  let mut tag: ChunkType = [0; 4];
  stream.read_exact(&mut tag).map_err(map_truncation)?;
  let mut body = vec![0; len];
  stream.read_exact(&mut body).map_err(map_truncation)?;
  let stored = stream.read_u32::<BigEndian>().map_err(map_truncation)?;
  let computed = chunk_crc(&tag, &body);
  if stored != computed {
    return Err(ParapngError::Framing(format!(
      "CRC mismatch in chunk {}: stored {:08x}, computed {:08x}",
      tag_name(&tag),
      stored,
      computed
    )));
  }
  Ok((tag, body))
}

/// Read one chunk and require a specific tag at this position.
pub fn expect_chunk<R: Read>(stream: &mut R, want: ChunkType) -> Result<Vec<u8>> {
  let (tag, body) = read_chunk(stream)?;
  if tag != want {
    return Err(ParapngError::UnexpectedChunk {
      expected: tag_name(&want),
      found: tag_name(&tag),
    });
  }
  Ok(body)
}
