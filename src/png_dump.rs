use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Writes an 8-bit RGBA PNG.
pub fn dump_rgba<P: AsRef<Path>>(path: P, image: &image::RgbaImage) -> Result<()> {
  let path = path.as_ref();
  let file = File::create(path).with_context(|| format!("Failed to create `{}`", path.display()))?;
  let w = BufWriter::new(file);

  let (width, height) = image.dimensions();
  let mut encoder = png::Encoder::new(w, width, height);
  encoder.set_color(png::ColorType::Rgba);
  encoder.set_depth(png::BitDepth::Eight);

  let mut writer = encoder.write_header()?;
  writer.write_image_data(image.as_raw())?;
  writer.finish()?;

  info!("Wrote {width}x{height} image to {}", path.display());
  Ok(())
}
