//! Reading Doom WAD archives and decoding their palettes and pictures.
//!
//! ```no_run
//! use doomlib::{colors, lumps::Archive, wad_graphics};
//!
//! # fn main() -> doomlib::error::Result<()> {
//! let wad = Archive::open("doom2.wad")?;
//! let palette = colors::make_palettes(&wad.read_lump(wad.find_first_lump("playpal")?)?)?.remove(0);
//! let titlepic = wad_graphics::load_doom_graphic(&wad.read_lump(wad.find_first_lump("titlepic")?)?, &palette)?;
//! let rgba = titlepic.to_rgba_image();
//! # Ok(())
//! # }
//! ```

pub mod colors;
pub mod error;
pub mod lumps;
pub mod png_dump;
pub mod wad_graphics;

pub use colors::{Colormap, Palette, PaletteColor};
pub use error::{ErrorKind, Result, WadError};
pub use lumps::{Archive, Lump, WadKind};
pub use wad_graphics::DecodedImage;
