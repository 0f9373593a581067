// SPDX-License-Identifier: LGPL-2.1

use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, value_parser};
use log::debug;

pub fn create_app() -> Command {
  debug!("Creating CLAP app configuration");
  Command::new("ppng")
    .version(env!("CARGO_PKG_VERSION"))
    .about("ppng - encoder and decoder for parallel-decodable PNG files")
    .subcommand_required(true)
    .arg_required_else_help(true)
    .arg(
      Arg::new("debug")
        .short('d')
        .action(ArgAction::Count)
        .global(true)
        .help("Sets the level of debugging information"),
    )
    .subcommand(
      Command::new("encode")
        .about("Encode an image into a parallel-decodable PNG")
        .arg(
          Arg::new("pieces")
            .short('n')
            .long("pieces")
            .value_parser(value_parser!(u32))
            .default_value("8")
            .help("The number of pieces to split the image into"),
        )
        .arg(Arg::new("INPUT").required(true).value_parser(value_parser!(PathBuf)).help("Input image file"))
        .arg(Arg::new("OUTPUT").required(true).value_parser(value_parser!(PathBuf)).help("Output file name")),
    )
    .subcommand(
      Command::new("decode")
        .about("Decode a parallel-decodable PNG into a displayable image")
        .arg(Arg::new("INPUT").required(true).value_parser(value_parser!(PathBuf)).help("Input file name"))
        .arg(Arg::new("OUTPUT").required(true).value_parser(value_parser!(PathBuf)).help("Output image file")),
    )
}
