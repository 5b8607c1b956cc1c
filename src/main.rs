use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use doomlib::lumps::Archive;
use doomlib::{colors, png_dump, wad_graphics};
use image::imageops::{self, FilterType};
use log::info;
use regex::RegexBuilder;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

#[derive(Debug, Parser)]
#[command(version, about = "Decode a picture from a Doom WAD and write it as PNG", long_about = None)]
struct Cli {
  /// Input WAD file path
  #[arg(default_value = "doom2.wad")]
  wad: PathBuf,
  /// Picture lump to decode
  #[arg(long, default_value = "TITLEPIC")]
  lump: String,
  /// Lump holding the palettes
  #[arg(long, default_value = "PLAYPAL")]
  palette_lump: String,
  /// Which palette of the palette lump to use
  #[arg(long, default_value_t = 0)]
  palette: usize,
  /// Target width, defaults to 640
  #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
  width: Option<u32>,
  /// Target height, defaults to 480
  #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
  height: Option<u32>,
  /// Keep the picture's own size instead of scaling to the target resolution
  #[arg(long, conflicts_with_all = ["width", "height"])]
  native: bool,
  /// Decode the lump as a 64x64 flat
  #[arg(long)]
  flat: bool,
  /// Output PNG path, defaults to `<lump>.png`
  #[arg(short, long)]
  output: Option<PathBuf>,
  /// List the WAD directory instead of decoding
  #[arg(long)]
  list: bool,
  /// Only list lumps whose name matches this regex (case-insensitive)
  #[arg(long, requires = "list")]
  filter: Option<String>,
  /// Also append log output to this file
  #[arg(long)]
  log_file: Option<PathBuf>,
}

/// Sends log lines to stderr and a file.
struct Tee {
  file: File,
}

impl Write for Tee {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.file.write_all(buf)?;
    io::stderr().write_all(buf)?;
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    self.file.flush()?;
    io::stderr().flush()
  }
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
  let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

  if let Some(path) = log_file {
    let file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(path)
      .with_context(|| format!("Failed to open log file `{}`", path.display()))?;
    builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
  }

  builder.init();
  Ok(())
}

fn read_named(wad: &Archive, name: &str) -> Result<Vec<u8>> {
  let index = wad
    .find_first_lump(name)
    .with_context(|| format!("`{}` has no lump `{name}`", wad.path().display()))?;
  wad
    .read_lump(index)
    .with_context(|| format!("Failed to read lump {index} (`{name}`)"))
}

fn list_lumps(wad: &Archive, filter: Option<&str>) -> Result<()> {
  let filter = filter
    .map(|pattern| RegexBuilder::new(pattern).case_insensitive(true).build())
    .transpose()
    .context("Invalid lump name filter")?;

  println!("{} {}: {} lumps", wad.kind(), wad.path().display(), wad.len());
  for (index, lump) in wad.lumps().iter().enumerate() {
    if filter.as_ref().map_or(true, |re| re.is_match(&lump.name)) {
      println!("{index:>6} {:<8} {:>10} {:>8}", lump.name, lump.filepos, lump.size);
    }
  }

  Ok(())
}

fn show_picture(wad: &Archive, cli: &Cli) -> Result<()> {
  let palettes = colors::make_palettes(&read_named(wad, &cli.palette_lump)?)
    .with_context(|| format!("Failed to decode palettes from `{}`", cli.palette_lump))?;
  let palette = palettes.get(cli.palette).ok_or_else(|| {
    anyhow!(
      "Palette {} out of range, `{}` holds {} palettes",
      cli.palette,
      cli.palette_lump,
      palettes.len()
    )
  })?;

  let bytes = read_named(wad, &cli.lump)?;
  let picture = if cli.flat {
    wad_graphics::load_flat(&bytes, palette)
  } else {
    wad_graphics::load_doom_graphic(&bytes, palette)
  }
  .with_context(|| format!("Failed to decode lump `{}`", cli.lump))?;
  info!(
    "Loaded {} ({}x{}, offset {},{})",
    cli.lump,
    picture.width(),
    picture.height(),
    picture.left_offset(),
    picture.top_offset()
  );

  let mut rgba = picture.to_rgba_image();
  if !cli.native {
    let width = cli.width.unwrap_or(DEFAULT_WIDTH);
    let height = cli.height.unwrap_or(DEFAULT_HEIGHT);
    rgba = imageops::resize(&rgba, width, height, FilterType::Nearest);
  }

  let output = cli
    .output
    .clone()
    .unwrap_or_else(|| PathBuf::from(format!("{}.png", cli.lump.to_ascii_lowercase())));
  png_dump::dump_rgba(&output, &rgba)
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.log_file.as_deref())?;
  info!("=== {} {} ===", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

  let mut wad = Archive::open(&cli.wad).with_context(|| format!("Failed to open WAD `{}`", cli.wad.display()))?;

  if cli.list {
    list_lumps(&wad, cli.filter.as_deref())?;
  } else {
    show_picture(&wad, &cli)?;
  }

  wad.close();
  Ok(())
}
