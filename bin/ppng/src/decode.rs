// SPDX-License-Identifier: LGPL-2.1

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::ArgMatches;
use log::info;

use crate::AppError;

/// Entry point for Clap sub command `decode`
pub fn decode(options: &ArgMatches) -> crate::Result<()> {
  let in_path: &PathBuf = options.get_one("INPUT").expect("INPUT not available");
  let out_path: &PathBuf = options.get_one("OUTPUT").expect("OUTPUT not available");

  if !in_path.is_file() {
    return Err(AppError::NotFound(in_path.clone()));
  }

  let mut input = BufReader::new(File::open(in_path)?);
  let decoded = parapng::decode(&mut input)?;
  info!("decoded {:?}, size={}x{}", in_path, decoded.width, decoded.height);

  let img = image::RgbImage::from_raw(decoded.width, decoded.height, decoded.data)
    .ok_or_else(|| AppError::General("decoded pixel buffer does not match image dimensions".into()))?;
  img.save(out_path)?;

  println!("Saved to {}", out_path.display());
  Ok(())
}
