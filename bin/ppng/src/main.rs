// SPDX-License-Identifier: LGPL-2.1

mod app;
mod decode;
mod encode;

use std::path::PathBuf;

use fern::colors::{Color, ColoredLevelConfig};
use image::ImageError;
use parapng::ParapngError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
  #[error("{}", _0)]
  General(String),
  #[error("I/O error: {}", _0)]
  Io(#[from] std::io::Error),
  #[error("Not found: {}", _0.display())]
  NotFound(PathBuf),
  #[error("Codec failed: {}", _0)]
  CodecFailed(#[from] ParapngError),
  #[error(transparent)]
  Other(#[from] anyhow::Error),
}

impl From<ImageError> for AppError {
  fn from(value: ImageError) -> Self {
    anyhow::Error::new(value).into()
  }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Main entry function
///
/// We initialize the fern logger here, create a Clap command line
/// parser and dispatch to the subcommand handlers.
fn main() -> anyhow::Result<()> {
  let app = app::create_app();
  let matches = app.try_get_matches().unwrap_or_else(|e| e.exit());

  let colors = ColoredLevelConfig::new().debug(Color::Magenta);
  fern::Dispatch::new()
    .chain(std::io::stderr())
    .level({
      match matches.get_count("debug") {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
      }
    })
    .format(move |out, message, record| {
      out.finish(format_args!(
        "[{:6}][{}] {} ({}:{})",
        colors.color(record.level()),
        record.target(),
        message,
        record.file().unwrap_or("<undefined>"),
        record.line().unwrap_or(0)
      ))
    })
    .apply()
    .expect("Invalid fern configuration, exiting");

  match matches.subcommand() {
    Some(("encode", sc)) => encode::encode(sc)?,
    Some(("decode", sc)) => decode::decode(sc)?,
    _ => panic!("Unknown subcommand was used"),
  }
  Ok(())
}
