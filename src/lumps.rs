use crate::error::{Result, WadError};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info, trace};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const HEADER_SIZE: usize = 12;
pub const DIRECTORY_ENTRY_SIZE: usize = 16;
pub const LUMP_NAME_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WadKind {
  /// Internal WAD, a complete game data set.
  Iwad,
  /// Patch WAD, loaded on top of an IWAD.
  Pwad,
}

impl WadKind {
  fn from_magic(magic: [u8; 4]) -> Result<Self> {
    match &magic {
      b"IWAD" => Ok(WadKind::Iwad),
      b"PWAD" => Ok(WadKind::Pwad),
      _ => Err(WadError::InvalidMagic { found: magic }),
    }
  }
}

impl fmt::Display for WadKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      WadKind::Iwad => write!(f, "IWAD"),
      WadKind::Pwad => write!(f, "PWAD"),
    }
  }
}

/// One directory entry. `name` is upper-cased with the NUL padding removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lump {
  pub filepos: u64,
  pub size: usize,
  pub name: String,
}

/// Read-only view over a WAD file.
///
/// The header and directory are read and validated once in [`Archive::open`];
/// every lump is known to lie inside the file afterwards. Lumps are read with
/// positional reads, so `read_lump` only needs `&self` and never moves a shared
/// cursor. On Unix and Windows that makes concurrent reads from several threads
/// safe. Other targets fall back to seek + read on the shared handle, where
/// concurrent reads must be serialized by the caller.
#[derive(Debug)]
pub struct Archive {
  file: Option<File>,
  path: PathBuf,
  kind: WadKind,
  file_size: u64,
  lumps: Vec<Lump>,
  first_by_name: HashMap<String, usize>,
}

impl Archive {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let file = File::open(&path)?;
    let file_size = file.metadata()?.len();

    if file_size < HEADER_SIZE as u64 {
      return Err(WadError::TruncatedHeader { file_size });
    }

    let mut header = [0u8; HEADER_SIZE];
    read_exact_at(&file, &mut header, 0)?;

    let kind = WadKind::from_magic([header[0], header[1], header[2], header[3]])?;
    let lump_count = LittleEndian::read_i32(&header[4..8]);
    let directory_offset = LittleEndian::read_i32(&header[8..12]);

    let invalid_directory = || WadError::InvalidDirectory {
      lump_count,
      directory_offset,
      file_size,
    };

    if lump_count < 0 || directory_offset < 0 {
      return Err(invalid_directory());
    }

    // Both fields are non-negative i32, so this cannot overflow a u64.
    let directory_end = directory_offset as u64 + lump_count as u64 * DIRECTORY_ENTRY_SIZE as u64;
    if directory_end > file_size {
      return Err(invalid_directory());
    }

    let mut directory = vec![0u8; lump_count as usize * DIRECTORY_ENTRY_SIZE];
    read_exact_at(&file, &mut directory, directory_offset as u64)?;

    let lumps = parse_directory(&directory, file_size)?;

    let mut first_by_name = HashMap::with_capacity(lumps.len());
    for (index, lump) in lumps.iter().enumerate() {
      trace!("{index}: {lump:?}");
      first_by_name.entry(lump.name.clone()).or_insert(index);
    }

    info!(
      "Opened {kind} {}: {} lumps, {file_size} bytes",
      path.display(),
      lumps.len()
    );

    Ok(Archive {
      file: Some(file),
      path,
      kind,
      file_size,
      lumps,
      first_by_name,
    })
  }

  #[inline]
  pub fn kind(&self) -> WadKind {
    self.kind
  }

  #[inline]
  pub fn path(&self) -> &Path {
    &self.path
  }

  #[inline]
  pub fn file_size(&self) -> u64 {
    self.file_size
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.lumps.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.lumps.is_empty()
  }

  /// Directory entries in directory order.
  pub fn lumps(&self) -> &[Lump] {
    &self.lumps
  }

  pub fn lump(&self, index: usize) -> Result<&Lump> {
    self.lumps.get(index).ok_or(WadError::LumpIndexOutOfBounds {
      index,
      count: self.lumps.len(),
    })
  }

  /// Index of the first lump named `name`, ignoring case.
  pub fn find_first_lump(&self, name: &str) -> Result<usize> {
    self
      .first_by_name
      .get(&name.to_ascii_uppercase())
      .copied()
      .ok_or_else(|| WadError::LumpNotFound(name.to_string()))
  }

  /// Index of the first lump named `name` at or after `start`, ignoring case.
  pub fn find_next_lump(&self, name: &str, start: usize) -> Result<usize> {
    let wanted = name.to_ascii_uppercase();
    self
      .lumps
      .iter()
      .enumerate()
      .skip(start)
      .find(|(_, lump)| lump.name == wanted)
      .map(|(index, _)| index)
      .ok_or_else(|| WadError::LumpNotFound(name.to_string()))
  }

  pub fn read_lump(&self, index: usize) -> Result<Vec<u8>> {
    let file = self.file.as_ref().ok_or(WadError::Closed)?;
    let lump = self.lump(index)?;

    let mut data = vec![0u8; lump.size];
    read_exact_at(file, &mut data, lump.filepos)?;
    debug!("Read lump {index} ({}): {} bytes", lump.name, lump.size);

    Ok(data)
  }

  pub fn read_lump_by_name(&self, name: &str) -> Result<Vec<u8>> {
    let index = self.find_first_lump(name)?;
    self.read_lump(index)
  }

  /// Releases the file handle. Reads after this fail with [`WadError::Closed`].
  pub fn close(&mut self) {
    if self.file.take().is_some() {
      info!("Closed {}", self.path.display());
    }
  }

  #[inline]
  pub fn is_closed(&self) -> bool {
    self.file.is_none()
  }
}

fn parse_directory(directory: &[u8], file_size: u64) -> Result<Vec<Lump>> {
  let mut lumps = Vec::with_capacity(directory.len() / DIRECTORY_ENTRY_SIZE);

  for (index, entry) in directory.chunks_exact(DIRECTORY_ENTRY_SIZE).enumerate() {
    let filepos = LittleEndian::read_i32(&entry[0..4]);
    let size = LittleEndian::read_i32(&entry[4..8]);
    let name = lump_name(&entry[8..8 + LUMP_NAME_SIZE]);

    if filepos < 0 || size < 0 || filepos as u64 + size as u64 > file_size {
      return Err(WadError::InvalidLumpRange {
        index,
        name,
        offset: filepos as i64,
        size: size as i64,
        file_size,
      });
    }

    lumps.push(Lump {
      filepos: filepos as u64,
      size: size as usize,
      name,
    });
  }

  Ok(lumps)
}

/// Decodes a fixed-width name field: stops at the first NUL, upper-cases.
pub fn lump_name(raw: &[u8]) -> String {
  raw
    .iter()
    .take_while(|&&b| b != 0)
    .map(|&b| (b as char).to_ascii_uppercase())
    .collect()
}

fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
  cfg_if::cfg_if! {
    if #[cfg(unix)] {
      use std::os::unix::fs::FileExt;
      file.read_exact_at(buf, offset)
    } else if #[cfg(windows)] {
      use std::os::windows::fs::FileExt;
      let mut filled = 0;
      while filled < buf.len() {
        match file.seek_read(&mut buf[filled..], offset + filled as u64)? {
          0 => return Err(std::io::ErrorKind::UnexpectedEof.into()),
          n => filled += n,
        }
      }
      Ok(())
    } else {
      use std::io::{Read, Seek, SeekFrom};
      let mut file = file;
      file.seek(SeekFrom::Start(offset))?;
      file.read_exact(buf)
    }
  }
}
