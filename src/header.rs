use derivative::Derivative;
use log::warn;

use crate::constants;
use crate::cursor::ByteCursor;
use crate::error::{HeaderErrorType, OleError};

/**
 * https://github.com/libyal/libolecf/blob/main/documentation/OLE%20Compound%20File%20format.asciidoc
 * https://winprotocoldoc.blob.core.windows.net/productionwindowsarchives/MS-CFB/%5bMS-CFB%5d.pdf
 */
#[derive(Clone, Derivative, PartialEq)]
#[derivative(Debug)]
pub struct OleHeader {
    pub(crate) major_version: u16,
    /// 512 or 4096
    pub(crate) sector_size: usize,
    /**
    Sector identifier (SID) of first sector of the directory stream (chain).
     */
    pub(crate) directory_first_sector: u32,
    // sector allocation table AKA "FAT"
    pub(crate) sector_allocation_table_len: u32,
    // short sector allocation table AKA "mini-FAT"
    pub(crate) short_sector_allocation_table_first_sector: u32,
    pub(crate) short_sector_allocation_table_len: u32,
    // master sector allocation table AKA "DI-FAT"
    pub(crate) master_sector_allocation_table_first_sector: u32,
    pub(crate) master_sector_allocation_table_len: u32,
    /**
    This array of 32-bit integer fields contains the first 109 FAT sector locations of
    the compound file.
     */
    #[derivative(Debug = "ignore")]
    pub(crate) sector_allocation_table_head: Vec<u32>,
}

impl OleHeader {
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    /// Byte offset of a sector; sector 0 follows the header block.
    pub fn sector_offset(&self, sector_index: u32) -> u64 {
        (sector_index as u64 + 1) * self.sector_size as u64
    }
}

/// Decodes the fixed-offset header fields. Only the signature is mandatory; the remaining
/// MS-CFB "MUST" rules are not enforced because real-world writers break them.
pub(crate) fn parse_header(data: &[u8], strict_sector_size: bool) -> Result<OleHeader, OleError> {
    if data.len() < constants::HEADER_LENGTH {
        return Err(OleError::InvalidHeader(HeaderErrorType::NotEnoughBytes(
            constants::HEADER_LENGTH,
            data.len(),
        )));
    }
    let mut cursor = ByteCursor::new(data);

    //Identification signature for the compound file structure, and MUST be
    // set to the value 0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1.
    let signature = cursor.read_bytes(constants::MAGIC_BYTES.len())?;
    if signature != constants::MAGIC_BYTES {
        return Err(OleError::InvalidHeader(HeaderErrorType::WrongMagicBytes(
            signature,
        )));
    }

    cursor.seek(constants::OFFSET_MAJOR_VERSION);
    let major_version = cursor.read_u16()?;

    //  If Major Version is 3, the Sector Shift MUST be 0x0009, specifying a sector size of 512 bytes.
    //  If Major Version is 4, the Sector Shift MUST be 0x000C, specifying a sector size of 4096 bytes.
    cursor.seek(constants::OFFSET_SECTOR_SHIFT);
    let sector_shift = cursor.read_u8()?;
    let sector_size = match sector_shift {
        constants::SECTOR_SHIFT_VERSION_3 => constants::SECTOR_SIZE_VERSION_3,
        constants::SECTOR_SHIFT_VERSION_4 => constants::SECTOR_SIZE_VERSION_4,
        anything_else if strict_sector_size => {
            return Err(OleError::InvalidHeader(HeaderErrorType::Parsing(
                "sector_size",
                format!("incorrect sector shift {:#x}", anything_else),
            )));
        }
        anything_else => {
            warn!(
                "[ole] unknown sector shift {:#x}, assuming {} byte sectors",
                anything_else,
                constants::SECTOR_SIZE_VERSION_3
            );
            constants::SECTOR_SIZE_VERSION_3
        }
    };

    cursor.seek(constants::OFFSET_FAT_SECTOR_COUNT);
    let sector_allocation_table_len = cursor.read_u32()?;
    cursor.seek(constants::OFFSET_DIRECTORY_START);
    let directory_first_sector = cursor.read_u32()?;
    cursor.seek(constants::OFFSET_MINI_FAT_START);
    let short_sector_allocation_table_first_sector = cursor.read_u32()?;
    cursor.seek(constants::OFFSET_MINI_FAT_COUNT);
    let short_sector_allocation_table_len = cursor.read_u32()?;
    cursor.seek(constants::OFFSET_DIFAT_START);
    let master_sector_allocation_table_first_sector = cursor.read_u32()?;
    cursor.seek(constants::OFFSET_DIFAT_COUNT);
    let master_sector_allocation_table_len = cursor.read_u32()?;

    cursor.seek(constants::OFFSET_HEADER_DIFAT);
    let mut sector_allocation_table_head = Vec::with_capacity(constants::HEADER_DIFAT_ENTRIES);
    for _ in 0..constants::HEADER_DIFAT_ENTRIES {
        sector_allocation_table_head.push(cursor.read_u32()?);
    }

    Ok(OleHeader {
        major_version,
        sector_size,
        directory_first_sector,
        sector_allocation_table_len,
        short_sector_allocation_table_first_sector,
        short_sector_allocation_table_len,
        master_sector_allocation_table_first_sector,
        master_sector_allocation_table_len,
        sector_allocation_table_head,
    })
}
