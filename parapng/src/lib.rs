// SPDX-License-Identifier: LGPL-2.1

//! Library to encode and decode parallel-decodable PNG files: a restricted
//! PNG profile (8-bit truecolor, no interlacing, filter "none" only) whose
//! zlib stream is split into independently compressed bands. A custom `pLLd`
//! chunk declares the band height so a decoder can inflate and defilter all
//! bands concurrently instead of running one sequential pass over the image.
//!
//! # Example
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::{BufReader, BufWriter};
//!
//! fn main() {
//!   let image = {
//!     let mut input = BufReader::new(File::open("image.ppng").unwrap());
//!     parapng::decode(&mut input).unwrap()
//!   };
//!   let mut output = BufWriter::new(File::create("copy.ppng").unwrap());
//!   parapng::encode(&mut output, &image, 8).unwrap();
//! }
//! ```

use thiserror::Error;

pub mod checksum;
pub mod chunk;
pub mod decoder;
pub mod encoder;
pub mod header;
pub mod piece;

pub use decoder::decode;
pub use encoder::encode;
pub use header::{ImageHeader, PieceDescriptor};

#[derive(Error, Debug)]
pub enum ParapngError {
  /// Broken wire structure: bad magic, CRC mismatch, truncation, corrupt deflate data.
  #[error("Framing error: {}", _0)]
  Framing(String),

  #[error("Unsupported profile: {}", _0)]
  UnsupportedProfile(String),

  #[error("Unsupported descriptor: {}", _0)]
  UnsupportedDescriptor(String),

  #[error("Unsupported filter type: {}", _0)]
  UnsupportedFilter(u8),

  #[error("Expected {} chunk, found {}", expected, found)]
  UnexpectedChunk { expected: String, found: String },

  #[error("{}", _0)]
  General(String),

  #[error("I/O error: {:?}", _0)]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ParapngError>;

/// Row-major RGB image with 3 bytes per pixel.
///
/// The codec never retains a buffer past a single encode or decode call.
pub struct RgbImage {
  pub width: u32,
  pub height: u32,
  pub data: Vec<u8>,
}

impl RgbImage {
  pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
    if width == 0 || height == 0 {
      return Err(ParapngError::General(format!("invalid image dimensions: {}x{}", width, height)));
    }
    let expected = 3 * width as usize * height as usize;
    if data.len() != expected {
      return Err(ParapngError::General(format!(
        "pixel buffer size mismatch: got {} bytes, expected {} for {}x{}",
        data.len(),
        expected,
        width,
        height
      )));
    }
    Ok(Self { width, height, data })
  }

  /// Scanline `y` as raw RGB bytes.
  pub fn row(&self, y: u32) -> &[u8] {
    let stride = 3 * self.width as usize;
    let offset = y as usize * stride;
    &self.data[offset..offset + stride]
  }
}

#[cfg(test)]
pub(crate) fn init_test_logger() {
  static INIT: std::sync::Once = std::sync::Once::new();
  INIT.call_once(|| {
    let _ = env_logger::builder().is_test(true).try_init();
  });
}
