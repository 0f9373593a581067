// SPDX-License-Identifier: LGPL-2.1

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::ArgMatches;
use log::info;

use crate::AppError;

/// Entry point for Clap sub command `encode`
pub fn encode(options: &ArgMatches) -> crate::Result<()> {
  let in_path: &PathBuf = options.get_one("INPUT").expect("INPUT not available");
  let out_path: &PathBuf = options.get_one("OUTPUT").expect("OUTPUT not available");
  let pieces: u32 = *options.get_one("pieces").expect("pieces has a default");

  if !in_path.is_file() {
    return Err(AppError::NotFound(in_path.clone()));
  }

  let img = image::open(in_path)?.to_rgb8();
  let (width, height) = img.dimensions();
  info!("opened {:?}, size={}x{}", in_path, width, height);

  let image = parapng::RgbImage::new(width, height, img.into_raw())?;
  let mut out = BufWriter::new(File::create(out_path)?);
  parapng::encode(&mut out, &image, pieces)?;
  out.flush()?;

  println!("Encoded {}x{} image into {} pieces: {}", width, height, pieces, out_path.display());
  Ok(())
}
