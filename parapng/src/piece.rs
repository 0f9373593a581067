// SPDX-License-Identifier: LGPL-2.1

//! Per-band compression and decompression.
//!
//! Each band is a fragment of one logical zlib stream, not a self-contained
//! stream. The compressor runs in raw deflate mode: interior bands end at a
//! full-flush boundary (so the next band's independently compressed output can
//! be concatenated and the joined stream stays valid deflate), the last band
//! is finished normally, and the 2-byte zlib header is prepended only to the
//! first band. The band's Adler-32 is computed alongside compression over the
//! uncompressed filtered bytes, which is exactly the trailer a zlib compressor
//! would emit for those bytes on finish.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use simd_adler32::Adler32;

use crate::{ParapngError, Result, RgbImage};

/// The only scanline filter in the supported profile.
pub const FILTER_NONE: u8 = 0;

/// CMF/FLG pair for deflate with a 32 KiB window at maximum compression level.
const ZLIB_HEADER: [u8; 2] = [0x78, 0xDA];
const ZLIB_TRAILER_LEN: usize = 4;

const OUT_CHUNK: usize = 32 * 1024;

/// One compressed band, as handed from the piece codec to the encode orchestrator.
pub struct PieceResult {
  /// Compressed bytes, framed per band position (header only on the first band).
  pub data: Vec<u8>,
  /// Adler-32 of this band's uncompressed filtered bytes, not cumulative.
  pub adler: u32,
  /// Uncompressed length: `(3*width + 1) * rows`.
  pub raw_len: u64,
}

/// One decompressed band, mirrored for the decode-side checksum fold.
pub struct DecodedPiece {
  pub pixels: Vec<u8>,
  pub adler: u32,
  pub raw_len: u64,
}

fn compress_err(err: flate2::CompressError) -> ParapngError {
  ParapngError::General(format!("deflate error: {}", err))
}

fn decompress_err(err: flate2::DecompressError) -> ParapngError {
  ParapngError::Framing(format!("corrupt deflate data: {}", err))
}

fn deflate_input(comp: &mut Compress, mut input: &[u8], out: &mut Vec<u8>) -> Result<()> {
  while !input.is_empty() {
    if out.len() == out.capacity() {
      out.reserve(OUT_CHUNK);
    }
    let before = comp.total_in();
    comp.compress_vec(input, out, FlushCompress::None).map_err(compress_err)?;
    let consumed = (comp.total_in() - before) as usize;
    input = &input[consumed..];
  }
  Ok(())
}

fn deflate_flush(comp: &mut Compress, out: &mut Vec<u8>, flush: FlushCompress) -> Result<()> {
  loop {
    out.reserve(OUT_CHUNK);
    let status = comp.compress_vec(&[], out, flush).map_err(compress_err)?;
    match status {
      Status::StreamEnd => return Ok(()),
      // Spare output capacity after the call means the flush fully drained;
      // only an exactly-filled buffer requires another round.
      Status::Ok | Status::BufError if out.len() < out.capacity() => return Ok(()),
      Status::Ok | Status::BufError => {}
    }
  }
}

/// Compress scanlines `[ystart, yend)` of `image` into one band.
///
/// Band position within the stream is derived from the row range: `ystart == 0`
/// marks the first band, `yend == image.height` the last.
pub fn encode_piece(image: &RgbImage, ystart: u32, yend: u32) -> Result<PieceResult> {
  let is_first = ystart == 0;
  let is_last = yend == image.height;
  let rows = (yend - ystart) as u64;
  let stride = 3 * image.width as u64;

  let mut comp = Compress::new(Compression::best(), false);
  let mut adler = Adler32::new();
  let mut data = Vec::with_capacity(OUT_CHUNK);
  if is_first {
    data.extend_from_slice(&ZLIB_HEADER);
  }

  for y in ystart..yend {
    let row = image.row(y);
    adler.write(&[FILTER_NONE]);
    adler.write(row);
    deflate_input(&mut comp, &[FILTER_NONE], &mut data)?;
    deflate_input(&mut comp, row, &mut data)?;
  }
  let flush = if is_last { FlushCompress::Finish } else { FlushCompress::Full };
  deflate_flush(&mut comp, &mut data, flush)?;

  Ok(PieceResult {
    data,
    adler: adler.finish(),
    raw_len: (stride + 1) * rows,
  })
}

fn inflate_piece(data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
  let mut inflater = Decompress::new(false);
  let mut out = Vec::with_capacity(size_hint);
  let mut input = data;
  loop {
    if out.len() == out.capacity() {
      out.reserve(OUT_CHUNK);
    }
    let before = inflater.total_in();
    let status = inflater.decompress_vec(input, &mut out, FlushDecompress::None).map_err(decompress_err)?;
    let consumed = (inflater.total_in() - before) as usize;
    input = &input[consumed..];
    match status {
      Status::StreamEnd => {
        if !input.is_empty() {
          return Err(ParapngError::Framing(format!("{} trailing bytes after end of deflate stream", input.len())));
        }
        return Ok(out);
      }
      // An interior band ends at a full-flush boundary with no final block;
      // all input consumed with room to spare means the fragment is done.
      Status::Ok | Status::BufError if input.is_empty() && out.len() < out.capacity() => return Ok(out),
      Status::BufError if input.is_empty() => {}
      Status::BufError => return Err(ParapngError::Framing("truncated deflate stream in band".into())),
      Status::Ok => {}
    }
  }
}

/// Decompress and defilter one band.
///
/// The first band carries the stream's 2-byte zlib header, the last band the
/// 4-byte Adler trailer; both belong to the logical joined stream and are
/// stripped before raw inflation.
pub fn decode_piece(body: &[u8], is_first: bool, is_last: bool, width: u32, expected_rows: u32) -> Result<DecodedPiece> {
  let mut data = body;
  if is_first {
    if data.len() < ZLIB_HEADER.len() {
      return Err(ParapngError::Framing("first band too short for zlib header".into()));
    }
    data = &data[ZLIB_HEADER.len()..];
  }
  if is_last {
    if data.len() < ZLIB_TRAILER_LEN {
      return Err(ParapngError::Framing("last band too short for Adler-32 trailer".into()));
    }
    data = &data[..data.len() - ZLIB_TRAILER_LEN];
  }

  let stride = 1 + 3 * width as usize;
  let expected = stride * expected_rows as usize;
  let raw = inflate_piece(data, expected)?;
  if raw.len() != expected {
    return Err(ParapngError::Framing(format!("band decompressed to {} bytes, expected {}", raw.len(), expected)));
  }

  let mut adler = Adler32::new();
  adler.write(&raw);

  let mut pixels = Vec::with_capacity(expected - expected_rows as usize);
  for scanline in raw.chunks_exact(stride) {
    if scanline[0] != FILTER_NONE {
      return Err(ParapngError::UnsupportedFilter(scanline[0]));
    }
    pixels.extend_from_slice(&scanline[1..]);
  }

  Ok(DecodedPiece {
    pixels,
    adler: adler.finish(),
    raw_len: raw.len() as u64,
  })
}
