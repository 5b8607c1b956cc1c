use crate::colors::{Palette, PaletteColor};
use crate::error::{Result, WadError};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};
use std::ops::Range;

// Picture lump layout:
//
//   u16 width, u16 height, u16 leftoffset, u16 topoffset
//   u32 column_offsets[width]   (from the start of the lump)
//
// Each column is a list of posts, ended by a topdelta of 0xFF:
//
//   u8 topdelta, u8 length, u8 unused, u8 pixels[length], u8 unused
pub const PICTURE_HEADER_SIZE: usize = 8;
pub const END_OF_COLUMN: u8 = 0xFF;

pub const FLAT_WIDTH: u16 = 64;
pub const FLAT_HEIGHT: u16 = 64;
pub const FLAT_SIZE: usize = FLAT_WIDTH as usize * FLAT_HEIGHT as usize;

/// A picture with its palette resolved. Row-major; pixels no post covered are
/// transparent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
  width: u16,
  height: u16,
  leftoffset: u16,
  topoffset: u16,
  pixels: Vec<PaletteColor>,
  opaque: Vec<bool>,
}

impl DecodedImage {
  fn transparent(width: u16, height: u16, leftoffset: u16, topoffset: u16) -> Self {
    let len = width as usize * height as usize;
    DecodedImage {
      width,
      height,
      leftoffset,
      topoffset,
      pixels: vec![PaletteColor::default(); len],
      opaque: vec![false; len],
    }
  }

  #[inline]
  fn put_pixel(&mut self, x: usize, y: usize, color: PaletteColor) {
    let index = x + y * self.width as usize;
    self.pixels[index] = color;
    self.opaque[index] = true;
  }

  #[inline]
  pub fn width(&self) -> u16 {
    self.width
  }

  #[inline]
  pub fn height(&self) -> u16 {
    self.height
  }

  #[inline]
  pub fn left_offset(&self) -> u16 {
    self.leftoffset
  }

  #[inline]
  pub fn top_offset(&self) -> u16 {
    self.topoffset
  }

  /// Resolved colors, row-major. Transparent pixels read as black.
  pub fn pixels(&self) -> &[PaletteColor] {
    &self.pixels
  }

  /// One flag per pixel, `true` where a post drew it.
  pub fn mask(&self) -> &[bool] {
    &self.opaque
  }

  /// `None` for transparent or out-of-bounds pixels.
  pub fn pixel(&self, x: usize, y: usize) -> Option<PaletteColor> {
    if x >= self.width as usize || y >= self.height as usize {
      return None;
    }
    let index = x + y * self.width as usize;
    self.opaque[index].then(|| self.pixels[index])
  }

  pub fn is_opaque(&self, x: usize, y: usize) -> bool {
    self.pixel(x, y).is_some()
  }

  pub fn opaque_count(&self) -> usize {
    self.opaque.iter().filter(|&&o| o).count()
  }

  /// RGBA8, transparent pixels as all zeroes.
  pub fn to_rgba_bytes(&self) -> Vec<u8> {
    let mut data = vec![0u8; self.pixels.len() * 4];
    for (i, (color, &opaque)) in self.pixels.iter().zip(self.opaque.iter()).enumerate() {
      if opaque {
        let index = i * 4;
        data[index] = color.r;
        data[index + 1] = color.g;
        data[index + 2] = color.b;
        data[index + 3] = 0xFF; // alpha
      }
    }
    data
  }

  /// The buffer handed to texture upload or image output.
  pub fn to_rgba_image(&self) -> image::RgbaImage {
    image::RgbaImage::from_fn(self.width as u32, self.height as u32, |x, y| {
      match self.pixel(x as usize, y as usize) {
        Some(c) => image::Rgba([c.r, c.g, c.b, 0xFF]),
        None => image::Rgba([0, 0, 0, 0]),
      }
    })
  }
}

/// One validated run of pixels; `pixels` indexes into the lump.
struct Post {
  column: usize,
  topdelta: usize,
  pixels: Range<usize>,
}

/// Decodes a picture lump (patches, sprites, TITLEPIC and friends).
pub fn load_doom_graphic(bytes: &[u8], palette: &Palette) -> Result<DecodedImage> {
  let len = bytes.len();
  if len < PICTURE_HEADER_SIZE {
    return Err(WadError::TruncatedPicture {
      len,
      expected: PICTURE_HEADER_SIZE,
    });
  }

  let width = LittleEndian::read_u16(&bytes[0..2]);
  let height = LittleEndian::read_u16(&bytes[2..4]);
  let leftoffset = LittleEndian::read_u16(&bytes[4..6]);
  let topoffset = LittleEndian::read_u16(&bytes[6..8]);

  if width == 0 || height == 0 {
    return Err(WadError::EmptyPicture { width, height });
  }

  let column_array_end = PICTURE_HEADER_SIZE + width as usize * 4;
  if len < column_array_end {
    return Err(WadError::TruncatedPicture {
      len,
      expected: column_array_end,
    });
  }

  // Every column is validated before the width * height buffer is allocated.
  let mut posts = Vec::new();
  for (column, raw_offset) in bytes[PICTURE_HEADER_SIZE..column_array_end].chunks_exact(4).enumerate() {
    let column_offset = LittleEndian::read_u32(raw_offset);
    if column_offset as usize >= len {
      return Err(WadError::InvalidColumnOffset {
        column,
        offset: column_offset,
        len,
      });
    }

    let mut position = column_offset as usize;
    loop {
      let truncated = move || WadError::TruncatedPost { column, position, len };

      let topdelta = *bytes.get(position).ok_or_else(truncated)?;
      if topdelta == END_OF_COLUMN {
        break;
      }

      let length = *bytes.get(position + 1).ok_or_else(truncated)? as usize;
      let pixels_start = position + 3;
      let pixels_end = pixels_start + length;
      if pixels_end > len {
        return Err(truncated());
      }

      let end = topdelta as usize + length;
      if end > height as usize {
        return Err(WadError::PostOutOfBounds {
          column,
          top_delta: topdelta,
          end,
          height,
        });
      }

      posts.push(Post {
        column,
        topdelta: topdelta as usize,
        pixels: pixels_start..pixels_end,
      });
      position = pixels_end + 1;
    }
  }

  let mut image = DecodedImage::transparent(width, height, leftoffset, topoffset);
  for post in posts {
    for (row, &pixel) in (post.topdelta..).zip(&bytes[post.pixels]) {
      image.put_pixel(post.column, row, palette[pixel]);
    }
  }

  debug!(
    "Decoded {width}x{height} picture, {} of {} pixels opaque",
    image.opaque_count(),
    image.pixels.len()
  );

  Ok(image)
}

/// Decodes a 64x64 floor/ceiling flat. Flats have no transparency.
pub fn load_flat(bytes: &[u8], palette: &Palette) -> Result<DecodedImage> {
  if bytes.len() < FLAT_SIZE {
    return Err(WadError::InvalidFlatSize(bytes.len()));
  }
  if bytes.len() > FLAT_SIZE {
    warn!("Flat lump is {} bytes, ignoring past {FLAT_SIZE}", bytes.len());
  }

  let mut image = DecodedImage::transparent(FLAT_WIDTH, FLAT_HEIGHT, 0, 0);
  for (i, &pixel) in bytes[..FLAT_SIZE].iter().enumerate() {
    image.put_pixel(i % FLAT_WIDTH as usize, i / FLAT_WIDTH as usize, palette[pixel]);
  }

  Ok(image)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::colors::{make_palettes, PALETTE_SIZE};
  use crate::error::ErrorKind;

  fn test_palette() -> Palette {
    let bytes: Vec<u8> = (0..PALETTE_SIZE).map(|i| (i * 7 % 256) as u8).collect();
    make_palettes(&bytes).unwrap().remove(0)
  }

  /// Lays out a picture lump from per-column post data (terminator included).
  fn build_picture(width: u16, height: u16, columns: &[Vec<u8>]) -> Vec<u8> {
    let mut lump = Vec::new();
    lump.extend_from_slice(&width.to_le_bytes());
    lump.extend_from_slice(&height.to_le_bytes());
    lump.extend_from_slice(&3u16.to_le_bytes());
    lump.extend_from_slice(&5u16.to_le_bytes());

    let mut offset = PICTURE_HEADER_SIZE + columns.len() * 4;
    for column in columns {
      lump.extend_from_slice(&(offset as u32).to_le_bytes());
      offset += column.len();
    }
    for column in columns {
      lump.extend_from_slice(column);
    }
    lump
  }

  fn post(topdelta: u8, pixels: &[u8]) -> Vec<u8> {
    let mut data = vec![topdelta, pixels.len() as u8, 0];
    data.extend_from_slice(pixels);
    data.push(0);
    data
  }

  fn column(posts: &[Vec<u8>]) -> Vec<u8> {
    let mut data: Vec<u8> = posts.concat();
    data.push(END_OF_COLUMN);
    data
  }

  #[test]
  fn decodes_fully_opaque_2x2() {
    let palette = test_palette();
    let lump = build_picture(2, 2, &[column(&[post(0, &[10, 11])]), column(&[post(0, &[200, 255])])]);
    let image = load_doom_graphic(&lump, &palette).unwrap();

    assert_eq!((image.width(), image.height()), (2, 2));
    assert_eq!((image.left_offset(), image.top_offset()), (3, 5));
    assert_eq!(image.opaque_count(), 4);
    assert_eq!(image.pixel(0, 0), Some(palette[10]));
    assert_eq!(image.pixel(0, 1), Some(palette[11]));
    assert_eq!(image.pixel(1, 0), Some(palette[200]));
    assert_eq!(image.pixel(1, 1), Some(palette[255]));
    assert_eq!(image.pixel(2, 0), None);
  }

  #[test]
  fn gaps_between_posts_stay_transparent() {
    let palette = test_palette();
    let lump = build_picture(1, 6, &[column(&[post(0, &[1]), post(3, &[2, 3])])]);
    let image = load_doom_graphic(&lump, &palette).unwrap();

    let mask: Vec<bool> = (0..6).map(|y| image.is_opaque(0, y)).collect();
    assert_eq!(mask, vec![true, false, false, true, true, false]);
    assert_eq!(image.pixel(0, 4), Some(palette[3]));
  }

  #[test]
  fn empty_column_is_transparent() {
    let palette = test_palette();
    let lump = build_picture(2, 1, &[column(&[]), column(&[post(0, &[9])])]);
    let image = load_doom_graphic(&lump, &palette).unwrap();

    assert!(!image.is_opaque(0, 0));
    assert!(image.is_opaque(1, 0));
    assert_eq!(image.mask(), &[false, true]);
  }

  #[test]
  fn end_of_column_stops_before_trailing_bytes() {
    let palette = test_palette();
    // Junk after the terminator would be an out-of-bounds post if parsed.
    let mut col = column(&[post(0, &[4])]);
    col.extend_from_slice(&[50, 200, 0]);
    let lump = build_picture(1, 1, &[col]);
    let image = load_doom_graphic(&lump, &palette).unwrap();

    assert_eq!(image.pixel(0, 0), Some(palette[4]));
  }

  #[test]
  fn terminator_as_last_byte() {
    let palette = test_palette();
    let lump = build_picture(1, 1, &[vec![END_OF_COLUMN]]);
    let image = load_doom_graphic(&lump, &palette).unwrap();

    assert_eq!(image.opaque_count(), 0);
  }

  #[test]
  fn rejects_column_offset_past_end() {
    let palette = test_palette();
    let mut lump = build_picture(1, 1, &[column(&[post(0, &[1])])]);
    let past_end = lump.len() as u32 + 10;
    lump[8..12].copy_from_slice(&past_end.to_le_bytes());

    let err = load_doom_graphic(&lump, &palette).unwrap_err();
    assert!(matches!(err, WadError::InvalidColumnOffset { column: 0, .. }));
    assert_eq!(err.kind(), ErrorKind::Format);
  }

  #[test]
  fn rejects_bad_column_before_allocating() {
    let palette = test_palette();
    // 65535x65535 would be billions of pixels; the last column is broken.
    let width = u16::MAX;
    let mut lump = Vec::new();
    for field in [width, u16::MAX, 0, 0] {
      lump.extend_from_slice(&field.to_le_bytes());
    }
    let terminator = (PICTURE_HEADER_SIZE + width as usize * 4) as u32;
    for _ in 0..width - 1 {
      lump.extend_from_slice(&terminator.to_le_bytes());
    }
    lump.extend_from_slice(&(terminator + 1).to_le_bytes());
    lump.push(END_OF_COLUMN);

    let err = load_doom_graphic(&lump, &palette).unwrap_err();
    assert!(matches!(
      err,
      WadError::InvalidColumnOffset { column, .. } if column == width as usize - 1
    ));
  }

  #[test]
  fn posts_need_unused_byte_before_pixels() {
    let palette = test_palette();
    // topdelta, length, pixels, unused: no byte between length and pixels.
    let lump = build_picture(2, 2, &[vec![0, 2, 10, 20, 0, 0xFF], vec![0, 2, 30, 40, 0, 0xFF]]);

    // Column 0's post swallows its terminator and runs on into column 1.
    let err = load_doom_graphic(&lump, &palette).unwrap_err();
    assert!(matches!(
      err,
      WadError::TruncatedPost {
        column: 0,
        position: 28,
        len: 28
      }
    ));

    // The same pixels with the unused byte in place decode cleanly.
    let lump = build_picture(2, 2, &[vec![0, 2, 0, 10, 20, 0, 0xFF], vec![0, 2, 0, 30, 40, 0, 0xFF]]);
    let image = load_doom_graphic(&lump, &palette).unwrap();
    assert_eq!(image.opaque_count(), 4);
    assert_eq!(image.pixel(0, 1), Some(palette[20]));
    assert_eq!(image.pixel(1, 0), Some(palette[30]));
  }

  #[test]
  fn rejects_post_past_height() {
    let palette = test_palette();
    let lump = build_picture(1, 4, &[column(&[post(2, &[1, 2, 3])])]);

    let err = load_doom_graphic(&lump, &palette).unwrap_err();
    assert!(matches!(
      err,
      WadError::PostOutOfBounds {
        column: 0,
        top_delta: 2,
        end: 5,
        height: 4
      }
    ));
  }

  #[test]
  fn rejects_truncated_post() {
    let palette = test_palette();
    // Claims 10 pixels, carries 2 and no terminator.
    let lump = build_picture(1, 16, &[vec![0, 10, 0, 1, 2]]);

    let err = load_doom_graphic(&lump, &palette).unwrap_err();
    assert!(matches!(err, WadError::TruncatedPost { column: 0, .. }));
  }

  #[test]
  fn rejects_missing_terminator() {
    let palette = test_palette();
    let lump = build_picture(1, 2, &[post(0, &[1])]);

    let err = load_doom_graphic(&lump, &palette).unwrap_err();
    assert!(matches!(err, WadError::TruncatedPost { .. }));
  }

  #[test]
  fn rejects_zero_dimensions() {
    let palette = test_palette();
    let lump = build_picture(0, 4, &[]);
    assert!(matches!(
      load_doom_graphic(&lump, &palette).unwrap_err(),
      WadError::EmptyPicture { width: 0, height: 4 }
    ));

    let lump = build_picture(1, 0, &[column(&[])]);
    assert!(matches!(
      load_doom_graphic(&lump, &palette).unwrap_err(),
      WadError::EmptyPicture { width: 1, height: 0 }
    ));
  }

  #[test]
  fn rejects_truncated_header_and_directory() {
    let palette = test_palette();
    assert!(matches!(
      load_doom_graphic(&[1, 0, 1], &palette).unwrap_err(),
      WadError::TruncatedPicture { len: 3, expected: 8 }
    ));

    // Width 3 needs 12 bytes of column offsets.
    let lump = [3u8, 0, 1, 0, 0, 0, 0, 0, 20, 0, 0, 0];
    assert!(matches!(
      load_doom_graphic(&lump, &palette).unwrap_err(),
      WadError::TruncatedPicture { len: 12, expected: 20 }
    ));
  }

  #[test]
  fn rgba_output_marks_transparency() {
    let palette = test_palette();
    let lump = build_picture(1, 2, &[column(&[post(1, &[6])])]);
    let image = load_doom_graphic(&lump, &palette).unwrap();
    let c = palette[6];

    assert_eq!(image.to_rgba_bytes(), vec![0, 0, 0, 0, c.r, c.g, c.b, 0xFF]);

    let rgba = image.to_rgba_image();
    assert_eq!(rgba.dimensions(), (1, 2));
    assert_eq!(rgba.get_pixel(0, 0).0, [0, 0, 0, 0]);
    assert_eq!(rgba.get_pixel(0, 1).0, [c.r, c.g, c.b, 0xFF]);
  }

  #[test]
  fn flat_is_row_major_and_opaque() {
    let palette = test_palette();
    let bytes: Vec<u8> = (0..FLAT_SIZE).map(|i| (i / 64) as u8).collect();
    let image = load_flat(&bytes, &palette).unwrap();

    assert_eq!((image.width(), image.height()), (64, 64));
    assert_eq!(image.opaque_count(), FLAT_SIZE);
    assert_eq!(image.pixel(63, 0), Some(palette[0]));
    assert_eq!(image.pixel(0, 1), Some(palette[1]));

    let err = load_flat(&bytes[..4000], &palette).unwrap_err();
    assert!(matches!(err, WadError::InvalidFlatSize(4000)));
  }
}
