use crate::error::{Result, WadError};
use std::ops::Index;

pub const PALETTE_COLORS: usize = 256;
/// Bytes in one palette table: 256 RGB triples.
pub const PALETTE_SIZE: usize = PALETTE_COLORS * 3;
pub const COLORMAP_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PaletteColor {
  pub r: u8,
  pub g: u8,
  pub b: u8,
}

impl PaletteColor {
  pub const fn new(r: u8, g: u8, b: u8) -> Self {
    PaletteColor { r, g, b }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
  colors: [PaletteColor; PALETTE_COLORS],
}

impl Palette {
  /// `bytes` must hold exactly one 768-byte table.
  fn from_table(bytes: &[u8]) -> Self {
    let mut colors = [PaletteColor::default(); PALETTE_COLORS];
    for (color, c) in colors.iter_mut().zip(bytes.chunks_exact(3)) {
      *color = PaletteColor {
        r: c[0],
        g: c[1],
        b: c[2],
      };
    }
    Palette { colors }
  }

  pub fn colors(&self) -> &[PaletteColor; PALETTE_COLORS] {
    &self.colors
  }
}

impl Index<u8> for Palette {
  type Output = PaletteColor;

  #[inline]
  fn index(&self, index: u8) -> &PaletteColor {
    &self.colors[index as usize]
  }
}

/// Splits a PLAYPAL-style lump into its palettes, default palette first.
pub fn make_palettes(bytes: &[u8]) -> Result<Vec<Palette>> {
  if bytes.is_empty() || bytes.len() % PALETTE_SIZE != 0 {
    return Err(WadError::InvalidPaletteSize(bytes.len()));
  }

  Ok(bytes.chunks_exact(PALETTE_SIZE).map(Palette::from_table).collect())
}

/// Maps every palette index to another one, e.g. one light level of COLORMAP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Colormap {
  pub palette_indexes: [u8; COLORMAP_SIZE],
}

impl Colormap {
  /// The palette as seen through this map.
  pub fn apply(&self, palette: &Palette) -> Palette {
    let mut colors = [PaletteColor::default(); PALETTE_COLORS];
    for (color, &index) in colors.iter_mut().zip(self.palette_indexes.iter()) {
      *color = palette[index];
    }
    Palette { colors }
  }
}

pub fn make_colormaps(bytes: &[u8]) -> Result<Vec<Colormap>> {
  if bytes.is_empty() || bytes.len() % COLORMAP_SIZE != 0 {
    return Err(WadError::InvalidColormapSize(bytes.len()));
  }

  Ok(
    bytes
      .chunks_exact(COLORMAP_SIZE)
      .map(|chunk| {
        let mut palette_indexes = [0u8; COLORMAP_SIZE];
        palette_indexes.copy_from_slice(chunk);
        Colormap { palette_indexes }
      })
      .collect(),
  )
}
