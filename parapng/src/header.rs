// SPDX-License-Identifier: LGPL-2.1

//! File signature, IHDR header and the custom `pLLd` piece descriptor.
//!
//! Only one profile is supported: 8-bit truecolor RGB, compression 0,
//! filter method 0, no interlacing. Anything else is rejected before any
//! data chunk is touched, since the whole pipeline assumes the profile holds.

use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, warn};

use crate::chunk::{self, CHUNK_IDAT, CHUNK_IHDR, CHUNK_PLLD};
use crate::{ParapngError, Result, RgbImage};

pub const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const IHDR_LEN: usize = 13;
const PLLD_LEN: usize = 5;

const BIT_DEPTH_8: u8 = 8;
const COLOR_TYPE_RGB: u8 = 2;

/// Flags bit 0: every band was written at a full-flush boundary and may be inflated independently.
const FLAG_PARALLEL_DECODE: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
  pub width: u32,
  pub height: u32,
  pub bit_depth: u8,
  pub color_type: u8,
  pub compression: u8,
  pub filter: u8,
  pub interlace: u8,
}

impl ImageHeader {
  /// Header for an image in the fixed profile.
  pub fn for_image(image: &RgbImage) -> Self {
    Self {
      width: image.width,
      height: image.height,
      bit_depth: BIT_DEPTH_8,
      color_type: COLOR_TYPE_RGB,
      compression: 0,
      filter: 0,
      interlace: 0,
    }
  }

  pub fn parse(body: &[u8]) -> Result<Self> {
    if body.len() != IHDR_LEN {
      return Err(ParapngError::Framing(format!("IHDR body must be {} bytes, got {}", IHDR_LEN, body.len())));
    }
    let mut cursor = Cursor::new(body);
    let header = Self {
      width: cursor.read_u32::<BigEndian>()?,
      height: cursor.read_u32::<BigEndian>()?,
      bit_depth: cursor.read_u8()?,
      color_type: cursor.read_u8()?,
      compression: cursor.read_u8()?,
      filter: cursor.read_u8()?,
      interlace: cursor.read_u8()?,
    };
    header.check_profile()?;
    Ok(header)
  }

  pub fn to_body(&self) -> Vec<u8> {
    let mut body = Vec::with_capacity(IHDR_LEN);
    body.extend_from_slice(&self.width.to_be_bytes());
    body.extend_from_slice(&self.height.to_be_bytes());
    body.extend_from_slice(&[self.bit_depth, self.color_type, self.compression, self.filter, self.interlace]);
    body
  }

  fn check_profile(&self) -> Result<()> {
    if self.width == 0 || self.height == 0 {
      return Err(ParapngError::UnsupportedProfile(format!("zero image dimension: {}x{}", self.width, self.height)));
    }
    if self.bit_depth != BIT_DEPTH_8 {
      return Err(ParapngError::UnsupportedProfile(format!("bit depth {} (only 8 supported)", self.bit_depth)));
    }
    if self.color_type != COLOR_TYPE_RGB {
      return Err(ParapngError::UnsupportedProfile(format!("color type {} (only truecolor supported)", self.color_type)));
    }
    if self.compression != 0 {
      return Err(ParapngError::UnsupportedProfile(format!("compression method {}", self.compression)));
    }
    if self.filter != 0 {
      return Err(ParapngError::UnsupportedProfile(format!("filter method {}", self.filter)));
    }
    if self.interlace != 0 {
      return Err(ParapngError::UnsupportedProfile(format!("interlace method {}", self.interlace)));
    }
    Ok(())
  }
}

/// Band height and decode capability declared by the `pLLd` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceDescriptor {
  pub piece_height: u32,
  pub parallel_decode: bool,
}

impl PieceDescriptor {
  pub fn parse(body: &[u8]) -> Result<Self> {
    if body.len() != PLLD_LEN {
      return Err(ParapngError::Framing(format!("pLLd body must be {} bytes, got {}", PLLD_LEN, body.len())));
    }
    let mut cursor = Cursor::new(body);
    let piece_height = cursor.read_u32::<BigEndian>()?;
    let flags = cursor.read_u8()?;
    Ok(Self {
      piece_height,
      parallel_decode: flags & FLAG_PARALLEL_DECODE != 0,
    })
  }

  pub fn to_body(&self) -> Vec<u8> {
    let mut body = Vec::with_capacity(PLLD_LEN);
    body.extend_from_slice(&self.piece_height.to_be_bytes());
    body.push(if self.parallel_decode { FLAG_PARALLEL_DECODE } else { 0 });
    body
  }

  fn validate(&self) -> Result<()> {
    if !self.parallel_decode {
      return Err(ParapngError::UnsupportedDescriptor("parallel decode flag is unset and no fallback path is defined".into()));
    }
    if self.piece_height == 0 {
      return Err(ParapngError::UnsupportedDescriptor("piece height must be > 0".into()));
    }
    Ok(())
  }
}

pub fn write_signature<W: Write>(out: &mut W) -> Result<()> {
  out.write_all(&PNG_MAGIC)?;
  Ok(())
}

pub fn read_signature<R: Read>(stream: &mut R) -> Result<()> {
  let mut magic = [0; PNG_MAGIC.len()];
  stream.read_exact(&mut magic).map_err(chunk::map_truncation)?;
  if magic != PNG_MAGIC {
    return Err(ParapngError::Framing(format!("bad PNG signature: {:02x?}", magic)));
  }
  Ok(())
}

/// Read and validate the IHDR chunk, which must come first.
pub fn read_header<R: Read>(stream: &mut R) -> Result<ImageHeader> {
  let body = chunk::expect_chunk(stream, CHUNK_IHDR)?;
  let header = ImageHeader::parse(&body)?;
  debug!("parsed header: size={}x{}", header.width, header.height);
  Ok(header)
}

pub fn write_header<W: Write>(out: &mut W, header: &ImageHeader) -> Result<()> {
  chunk::write_chunk(out, CHUNK_IHDR, &header.to_body())
}

pub fn write_descriptor<W: Write>(out: &mut W, descriptor: &PieceDescriptor) -> Result<()> {
  chunk::write_chunk(out, CHUNK_PLLD, &descriptor.to_body())
}

/// Scan forward from just after IHDR to the first IDAT chunk.
///
/// Unrecognised chunk types are skipped with a warning; only `pLLd` carries
/// meaning here. The descriptor must appear before the first data chunk,
/// there is no single-stream fallback.
pub fn scan_to_data<R: Read>(stream: &mut R) -> Result<(PieceDescriptor, Vec<u8>)> {
  let mut descriptor = None;
  loop {
    let (tag, body) = chunk::read_chunk(stream)?;
    match tag {
      CHUNK_PLLD => descriptor = Some(PieceDescriptor::parse(&body)?),
      CHUNK_IDAT => {
        let descriptor = descriptor.ok_or_else(|| ParapngError::UnsupportedDescriptor("no pLLd chunk before first IDAT".into()))?;
        descriptor.validate()?;
        return Ok((descriptor, body));
      }
      other => warn!("skipping over unrecognised chunk: {}", chunk::tag_name(&other)),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;
  use crate::chunk::write_chunk;

  fn header_4x4() -> ImageHeader {
    ImageHeader {
      width: 4,
      height: 4,
      bit_depth: 8,
      color_type: 2,
      compression: 0,
      filter: 0,
      interlace: 0,
    }
  }

  #[test]
  fn header_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let header = header_4x4();
    let mut buf = Vec::new();
    write_header(&mut buf, &header)?;
    assert_eq!(read_header(&mut Cursor::new(&buf))?, header);
    Ok(())
  }

  #[test]
  fn header_body_layout() {
    let body = header_4x4().to_body();
    assert_eq!(body, vec![0, 0, 0, 4, 0, 0, 0, 4, 8, 2, 0, 0, 0]);
  }

  #[test]
  fn profile_rejection() {
    for (field, value) in [("bit_depth", 16_u8), ("color_type", 6), ("compression", 1), ("filter", 1), ("interlace", 1)] {
      let mut header = header_4x4();
      match field {
        "bit_depth" => header.bit_depth = value,
        "color_type" => header.color_type = value,
        "compression" => header.compression = value,
        "filter" => header.filter = value,
        _ => header.interlace = value,
      }
      assert!(
        matches!(ImageHeader::parse(&header.to_body()), Err(ParapngError::UnsupportedProfile(_))),
        "{} = {} not rejected",
        field,
        value
      );
    }
  }

  #[test]
  fn signature_mismatch() {
    let mut bad = PNG_MAGIC;
    bad[0] = 0x88;
    assert!(matches!(read_signature(&mut Cursor::new(&bad)), Err(ParapngError::Framing(_))));
    assert!(read_signature(&mut Cursor::new(&PNG_MAGIC)).is_ok());
  }

  #[test]
  fn signature_read_errors_keep_their_kind() {
    struct FailingReader;
    impl std::io::Read for FailingReader {
      fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"))
      }
    }
    // A genuine I/O failure must surface as Io, only a short read is a framing error.
    assert!(matches!(read_signature(&mut FailingReader), Err(ParapngError::Io(_))));
    assert!(matches!(read_signature(&mut Cursor::new(&PNG_MAGIC[..4])), Err(ParapngError::Framing(_))));
  }

  #[test]
  fn descriptor_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let descriptor = PieceDescriptor {
      piece_height: 2,
      parallel_decode: true,
    };
    assert_eq!(PieceDescriptor::parse(&descriptor.to_body())?, descriptor);
    assert_eq!(descriptor.to_body(), vec![0, 0, 0, 2, 1]);
    Ok(())
  }

  #[test]
  fn scan_skips_unknown_chunks() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let mut buf = Vec::new();
    write_chunk(&mut buf, *b"tEXt", b"comment")?;
    write_descriptor(
      &mut buf,
      &PieceDescriptor {
        piece_height: 1,
        parallel_decode: true,
      },
    )?;
    write_chunk(&mut buf, *b"gAMA", &[0, 1, 2, 3])?;
    write_chunk(&mut buf, CHUNK_IDAT, &[9, 9])?;
    let (descriptor, idat) = scan_to_data(&mut Cursor::new(&buf))?;
    assert_eq!(descriptor.piece_height, 1);
    assert_eq!(idat, vec![9, 9]);
    Ok(())
  }

  #[test]
  fn missing_descriptor_is_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut buf = Vec::new();
    write_chunk(&mut buf, CHUNK_IDAT, &[9, 9])?;
    assert!(matches!(scan_to_data(&mut Cursor::new(&buf)), Err(ParapngError::UnsupportedDescriptor(_))));
    Ok(())
  }

  #[test]
  fn unset_parallel_flag_is_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut buf = Vec::new();
    write_descriptor(
      &mut buf,
      &PieceDescriptor {
        piece_height: 2,
        parallel_decode: false,
      },
    )?;
    write_chunk(&mut buf, CHUNK_IDAT, &[9])?;
    assert!(matches!(scan_to_data(&mut Cursor::new(&buf)), Err(ParapngError::UnsupportedDescriptor(_))));
    Ok(())
  }
}
