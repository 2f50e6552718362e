//! Clearing the PIE flag of an ELF64 executable.
//!
//! glibc 2.30 and later refuse to `dlopen` a file whose `DT_FLAGS_1` entry
//! carries `DF_1_PIE`. Clearing that one bit lets a single position
//! independent file be both executed and preloaded.
//!
//! The file is patched in place through a shared writable mapping. Every
//! check happens before the single write, so a rejected file is left
//! byte-for-byte unchanged.

use std::fs::OpenOptions;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use goblin::container::{Container, Ctx, Endian};
use goblin::elf::{Elf, SectionHeader};
use goblin::elf::dynamic::{DF_1_PIE, DT_FLAGS_1, DT_NULL};
use goblin::elf::header::{EI_CLASS, EI_DATA, ELFCLASS64, ELFDATA2LSB, ELFDATA2MSB, ELFMAG, SELFMAG};
use goblin::elf::section_header::SHT_DYNAMIC;
use memmap2::MmapMut;
use thiserror::Error;
use tracing::debug;

/// Size of an `Elf64_Dyn`.
const DYN_SIZE: usize = 16;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Not a valid ELF file")]
    NotElf,

    #[error("unsupported ELF class {0} (only ELF64 is handled)")]
    UnsupportedClass(u8),

    #[error("unsupported ELF data encoding {0}")]
    UnsupportedEncoding(u8),

    #[error("malformed ELF header: {0}")]
    Header(#[from] goblin::error::Error),

    #[error("{0} lies outside the file")]
    OutOfBounds(&'static str),

    #[error("no dynamic section; failed to unset PIE flag")]
    NoDynamicSection,

    #[error("no DT_FLAGS_1 entry; failed to unset PIE flag")]
    NoFlagsEntry,

    #[error("The PIE flag is not set")]
    FlagNotSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u64_at(self, bytes: &[u8], at: usize) -> Option<u64> {
        let raw: [u8; 8] = bytes.get(at..at.checked_add(8)?)?.try_into().ok()?;
        Some(match self {
            Self::Little => u64::from_le_bytes(raw),
            Self::Big => u64::from_be_bytes(raw),
        })
    }

    fn endian(self) -> Endian {
        match self {
            Self::Little => Endian::Little,
            Self::Big => Endian::Big,
        }
    }

    fn encode(self, value: u64) -> [u8; 8] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }
}

/// Location of the `DT_FLAGS_1` value and its current contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagsEntry {
    /// File offset of `d_val`.
    pub offset: usize,
    pub value: u64,
}

fn byte_order(image: &[u8]) -> Result<ByteOrder, PatchError> {
    if image.len() < SELFMAG || image[..SELFMAG] != ELFMAG[..] {
        return Err(PatchError::NotElf);
    }
    let class = *image.get(EI_CLASS).ok_or(PatchError::NotElf)?;
    if class != ELFCLASS64 {
        return Err(PatchError::UnsupportedClass(class));
    }
    match *image.get(EI_DATA).ok_or(PatchError::NotElf)? {
        ELFDATA2LSB => Ok(ByteOrder::Little),
        ELFDATA2MSB => Ok(ByteOrder::Big),
        other => Err(PatchError::UnsupportedEncoding(other)),
    }
}

fn to_usize(value: u64, what: &'static str) -> Result<usize, PatchError> {
    usize::try_from(value).map_err(|_| PatchError::OutOfBounds(what))
}

/// Byte ranges of every `SHT_DYNAMIC` section, in header order.
fn dynamic_sections(image: &[u8], order: ByteOrder) -> Result<Vec<Range<usize>>, PatchError> {
    let header = Elf::parse_header(image)?;
    let ctx = Ctx::new(Container::Big, order.endian());
    let headers = SectionHeader::parse(
        image,
        to_usize(header.e_shoff, "section header table")?,
        usize::from(header.e_shnum),
        ctx,
    )?;

    let mut sections = Vec::new();
    for shdr in headers.iter().filter(|shdr| shdr.sh_type == SHT_DYNAMIC) {
        let start = to_usize(shdr.sh_offset, "dynamic section")?;
        let end = start
            .checked_add(to_usize(shdr.sh_size, "dynamic section")?)
            .ok_or(PatchError::OutOfBounds("dynamic section"))?;
        if end > image.len() {
            return Err(PatchError::OutOfBounds("dynamic section"));
        }
        sections.push(start..end);
    }
    Ok(sections)
}

/// Finds the first `DT_FLAGS_1` entry of the image.
pub fn find_flags(image: &[u8]) -> Result<FlagsEntry, PatchError> {
    let order = byte_order(image)?;
    let sections = dynamic_sections(image, order)?;
    if sections.is_empty() {
        return Err(PatchError::NoDynamicSection);
    }

    for section in sections {
        let mut entry = section.start;
        while entry + DYN_SIZE <= section.end {
            let tag = order.u64_at(image, entry).ok_or(PatchError::OutOfBounds("d_tag"))?;
            if tag == DT_NULL {
                break;
            }
            if tag == DT_FLAGS_1 {
                let offset = entry + 8;
                let value = order.u64_at(image, offset).ok_or(PatchError::OutOfBounds("d_val"))?;
                debug!(offset, value = format_args!("{value:#x}"), "DT_FLAGS_1");
                return Ok(FlagsEntry { offset, value });
            }
            entry += DYN_SIZE;
        }
    }
    Err(PatchError::NoFlagsEntry)
}

/// Clears `DF_1_PIE` in `image`. Nothing is written unless the flag was set.
pub fn clear_pie_flag_in(image: &mut [u8]) -> Result<FlagsEntry, PatchError> {
    let order = byte_order(image)?;
    let entry = find_flags(image)?;
    if entry.value & DF_1_PIE == 0 {
        return Err(PatchError::FlagNotSet);
    }
    let cleared = entry.value & !DF_1_PIE;
    image[entry.offset..entry.offset + 8].copy_from_slice(&order.encode(cleared));
    Ok(FlagsEntry {
        offset: entry.offset,
        value: cleared,
    })
}

/// Clears `DF_1_PIE` in the file at `path`, in place.
pub fn clear_pie_flag(path: &Path) -> Result<FlagsEntry, PatchError> {
    let io_error = |source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(io_error)?;

    #[allow(unsafe_code)]
    // SAFETY: the mapping is private to this process for its whole lifetime;
    // concurrent modification of the file by others is outside our contract.
    let mut image = unsafe { MmapMut::map_mut(&file) }.map_err(io_error)?;

    let entry = clear_pie_flag_in(&mut image)?;
    image.flush().map_err(io_error)?;
    Ok(entry)
}
