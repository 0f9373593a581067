// SPDX-License-Identifier: LGPL-2.1

//! Encode orchestration: split the image into equal bands, compress them on
//! the worker pool, then write chunks in band order.
//!
//! Band compression runs in parallel and completes in arbitrary order; the
//! checksum fold and all chunk writes happen on this thread, strictly in band
//! index order, after the join.

use std::io::Write;

use log::debug;
use rayon::prelude::*;

use crate::checksum::adler32_combine;
use crate::chunk::{self, CHUNK_IDAT, CHUNK_IEND};
use crate::header::{self, ImageHeader, PieceDescriptor};
use crate::piece::{PieceResult, encode_piece};
use crate::{ParapngError, Result, RgbImage};

/// Encode `image` as a parallel-decodable PNG split into `pieces` bands.
///
/// The height must be exactly divisible by the piece count; uneven splits are
/// not part of the format.
pub fn encode<W: Write>(out: &mut W, image: &RgbImage, pieces: u32) -> Result<()> {
  if pieces == 0 {
    return Err(ParapngError::UnsupportedDescriptor("piece count must be > 0".into()));
  }
  if image.height % pieces != 0 {
    return Err(ParapngError::UnsupportedDescriptor(format!(
      "image height {} is not divisible by piece count {}",
      image.height, pieces
    )));
  }
  let piece_height = image.height / pieces;
  debug!("splitting {}x{} image into {} pieces of height {}", image.width, image.height, pieces, piece_height);

  header::write_signature(out)?;
  header::write_header(out, &ImageHeader::for_image(image))?;
  header::write_descriptor(
    out,
    &PieceDescriptor {
      piece_height,
      parallel_decode: true,
    },
  )?;

  let results: Result<Vec<PieceResult>> = (0..pieces)
    .into_par_iter()
    .map(|index| {
      let ystart = index * piece_height;
      encode_piece(image, ystart, ystart + piece_height)
    })
    .collect();
  let results = results?;

  let mut adler = None;
  let last = results.len() - 1;
  for (index, piece) in results.into_iter().enumerate() {
    let folded = adler32_combine(adler, piece.adler, piece.raw_len);
    adler = Some(folded);
    let mut body = piece.data;
    if index == last {
      // The joined stream's zlib trailer rides in the final data chunk.
      body.extend_from_slice(&folded.to_be_bytes());
    }
    chunk::write_chunk(out, CHUNK_IDAT, &body)?;
  }
  chunk::write_chunk(out, CHUNK_IEND, &[])?;
  Ok(())
}
