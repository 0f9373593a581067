// SPDX-License-Identifier: LGPL-2.1

//! Decode orchestration: parse and validate the chunk structure, then inflate
//! and defilter all bands concurrently.
//!
//! First/last flags for a band are derived from its position in the chunk
//! sequence, never from chunk contents. As an extra integrity check beyond the
//! per-chunk CRCs, the per-band Adler-32 values are refolded and compared
//! against the trailer stored in the final data chunk.

use std::io::Read;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, info};
use rayon::prelude::*;

use crate::checksum::adler32_combine;
use crate::chunk::{self, CHUNK_IDAT, CHUNK_IEND};
use crate::header::{self, PieceDescriptor};
use crate::piece::{DecodedPiece, decode_piece};
use crate::{ParapngError, Result, RgbImage};

const ZLIB_TRAILER_LEN: usize = 4;

fn read_pieces<R: Read>(stream: &mut R, descriptor: &PieceDescriptor, height: u32, first_idat: Vec<u8>) -> Result<Vec<Vec<u8>>> {
  if height % descriptor.piece_height != 0 {
    return Err(ParapngError::UnsupportedDescriptor(format!(
      "image height {} is not divisible by piece height {}",
      height, descriptor.piece_height
    )));
  }
  let num_pieces = (height / descriptor.piece_height) as usize;
  info!("image is split into {} pieces of height {}px", num_pieces, descriptor.piece_height);

  let mut pieces = Vec::with_capacity(num_pieces);
  pieces.push(first_idat);
  for _ in 1..num_pieces {
    pieces.push(chunk::expect_chunk(stream, CHUNK_IDAT)?);
  }
  chunk::expect_chunk(stream, CHUNK_IEND)?;
  Ok(pieces)
}

/// Decode a parallel-decodable PNG into a pixel buffer.
pub fn decode<R: Read>(stream: &mut R) -> Result<RgbImage> {
  header::read_signature(stream)?;
  let hdr = header::read_header(stream)?;
  info!("size={}x{}", hdr.width, hdr.height);

  let (descriptor, first_idat) = header::scan_to_data(stream)?;
  let pieces = read_pieces(stream, &descriptor, hdr.height, first_idat)?;
  debug!("finished parsing chunks, {} data pieces", pieces.len());

  let last = pieces.len() - 1;
  let trailer_chunk = &pieces[last];
  if trailer_chunk.len() < ZLIB_TRAILER_LEN {
    return Err(ParapngError::Framing("last data chunk too short for Adler-32 trailer".into()));
  }
  let stored_adler = BigEndian::read_u32(&trailer_chunk[trailer_chunk.len() - ZLIB_TRAILER_LEN..]);

  let decoded: Result<Vec<DecodedPiece>> = pieces
    .par_iter()
    .enumerate()
    .map(|(index, body)| decode_piece(body, index == 0, index == last, hdr.width, descriptor.piece_height))
    .collect();
  let decoded = decoded?;

  let mut adler = None;
  for piece in &decoded {
    adler = Some(adler32_combine(adler, piece.adler, piece.raw_len));
  }
  if adler != Some(stored_adler) {
    return Err(ParapngError::Framing(format!(
      "stream checksum mismatch: trailer {:08x}, recombined {:08x}",
      stored_adler,
      adler.unwrap_or_default()
    )));
  }

  let mut data = Vec::with_capacity(3 * hdr.width as usize * hdr.height as usize);
  for piece in decoded {
    data.extend_from_slice(&piece.pixels);
  }
  RgbImage::new(hdr.width, hdr.height, data)
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;
  use crate::encoder::encode;

  fn gradient_image(width: u32, height: u32) -> RgbImage {
    let data = (0..3 * width as usize * height as usize).map(|i| (i * 7 % 256) as u8).collect();
    RgbImage::new(width, height, data).unwrap()
  }

  #[test]
  fn roundtrip_two_pieces() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let img = gradient_image(5, 6);
    let mut buf = Vec::new();
    encode(&mut buf, &img, 2)?;
    let out = decode(&mut Cursor::new(&buf))?;
    assert_eq!(out.width, 5);
    assert_eq!(out.height, 6);
    assert_eq!(out.data, img.data);
    Ok(())
  }

  #[test]
  fn missing_iend_is_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let img = gradient_image(4, 2);
    let mut buf = Vec::new();
    encode(&mut buf, &img, 1)?;
    let truncated = &buf[..buf.len() - 12]; // drop the IEND chunk
    assert!(matches!(decode(&mut Cursor::new(truncated)), Err(ParapngError::Framing(_))));
    Ok(())
  }

  #[test]
  fn tampered_trailer_fails_checksum_fold() -> std::result::Result<(), Box<dyn std::error::Error>> {
    use crate::chunk::{CHUNK_IDAT, read_chunk, write_chunk};
    use crate::header::PNG_MAGIC;

    let img = gradient_image(4, 4);
    let mut buf = Vec::new();
    encode(&mut buf, &img, 2)?;

    // Rebuild the file, rewriting the final IDAT with a corrupted trailer and
    // a freshly computed (valid) CRC, so only the fold check can catch it.
    let mut rebuilt = PNG_MAGIC.to_vec();
    let mut cursor = Cursor::new(&buf[8..]);
    let mut chunks = Vec::new();
    while (cursor.position() as usize) < buf.len() - 8 {
      chunks.push(read_chunk(&mut cursor)?);
    }
    let last_idat = chunks.iter().rposition(|(tag, _)| *tag == CHUNK_IDAT).unwrap();
    for (index, (tag, mut body)) in chunks.into_iter().enumerate() {
      if index == last_idat {
        let len = body.len();
        body[len - 1] ^= 0xFF;
      }
      write_chunk(&mut rebuilt, tag, &body)?;
    }

    match decode(&mut Cursor::new(&rebuilt)) {
      Err(ParapngError::Framing(msg)) => assert!(msg.contains("checksum mismatch"), "unexpected message: {}", msg),
      other => panic!("expected checksum fold failure, got {:?}", other.map(|img| (img.width, img.height))),
    }
    Ok(())
  }
}
