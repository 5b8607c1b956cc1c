pub type Result<T> = std::result::Result<T, WadError>;

/// Broad classification of a [`WadError`], for callers that only care about
/// how to react (retry with another lump, give up, report a bug).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Malformed header, directory, palette or picture data.
  Format,
  /// No lump with the requested name.
  NotFound,
  /// Lump index past the end of the directory.
  Range,
  /// Operation on an archive that was already closed.
  Closed,
  Io,
}

#[derive(Debug, thiserror::Error)]
pub enum WadError {
  #[error("Upstream IO Error: {0}")]
  Io(#[from] std::io::Error),

  #[error("File too small for a WAD header: {file_size} bytes")]
  TruncatedHeader { file_size: u64 },
  #[error("Invalid WAD magic: expected IWAD or PWAD, found {found:X?}")]
  InvalidMagic { found: [u8; 4] },
  #[error("Invalid WAD directory: lump_count={lump_count}, directory_offset={directory_offset}, file_size={file_size}")]
  InvalidDirectory {
    lump_count: i32,
    directory_offset: i32,
    file_size: u64,
  },
  #[error("Lump {index} ({name}) out of file bounds: offset={offset}, size={size}, file_size={file_size}")]
  InvalidLumpRange {
    index: usize,
    name: String,
    offset: i64,
    size: i64,
    file_size: u64,
  },

  #[error("Invalid palette lump size: {0} bytes is not a positive multiple of 768")]
  InvalidPaletteSize(usize),
  #[error("Invalid colormap lump size: {0} bytes is not a positive multiple of 256")]
  InvalidColormapSize(usize),
  #[error("Flat lump too small: {0} bytes, expected at least 4096")]
  InvalidFlatSize(usize),

  #[error("Picture lump too small: {len} bytes, expected at least {expected}")]
  TruncatedPicture { len: usize, expected: usize },
  #[error("Picture has zero dimension: {width}x{height}")]
  EmptyPicture { width: u16, height: u16 },
  #[error("Picture column {column} offset {offset} out of bounds (lump is {len} bytes)")]
  InvalidColumnOffset { column: usize, offset: u32, len: usize },
  #[error("Picture column {column} post at {position} runs past end of lump ({len} bytes)")]
  TruncatedPost { column: usize, position: usize, len: usize },
  #[error("Picture column {column} post writes rows {top_delta}..{end} past height {height}")]
  PostOutOfBounds {
    column: usize,
    top_delta: u8,
    end: usize,
    height: u16,
  },

  #[error("Lump not found: {0}")]
  LumpNotFound(String),
  #[error("Lump index out of bounds: {index} (lump count {count})")]
  LumpIndexOutOfBounds { index: usize, count: usize },
  #[error("Archive is closed")]
  Closed,
}

impl WadError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      WadError::Io(_) => ErrorKind::Io,
      WadError::LumpNotFound(_) => ErrorKind::NotFound,
      WadError::LumpIndexOutOfBounds { .. } => ErrorKind::Range,
      WadError::Closed => ErrorKind::Closed,
      WadError::TruncatedHeader { .. }
      | WadError::InvalidMagic { .. }
      | WadError::InvalidDirectory { .. }
      | WadError::InvalidLumpRange { .. }
      | WadError::InvalidPaletteSize(_)
      | WadError::InvalidColormapSize(_)
      | WadError::InvalidFlatSize(_)
      | WadError::TruncatedPicture { .. }
      | WadError::EmptyPicture { .. }
      | WadError::InvalidColumnOffset { .. }
      | WadError::TruncatedPost { .. }
      | WadError::PostOutOfBounds { .. } => ErrorKind::Format,
    }
  }
}
