use log::warn;

use crate::allocation::read_sector;
use crate::constants;
use crate::directory::{DirectoryEntry, ObjectType};
use crate::error::OleError;
use crate::property::PropertyValue;
use crate::OleFile;

/// Where a stream's bytes live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamLocation {
    MiniStream,
    Regular,
}

impl StreamLocation {
    /// Streams strictly smaller than the cutoff are stored in the mini stream.
    pub fn for_size(stream_size: u64) -> Self {
        if stream_size < constants::MINI_STREAM_CUTOFF {
            StreamLocation::MiniStream
        } else {
            StreamLocation::Regular
        }
    }
}

/// How to turn stream bytes into a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEncoding {
    /// `001E`, one code unit per byte
    Ascii,
    /// `001F`, UTF-16LE
    Unicode,
    /// `0102` and anything unrecognized
    Binary,
}

impl StreamEncoding {
    /// Multi-valued codes (`101E`, `101F`) decode each value like their base type.
    pub fn from_type_code(type_code: &str) -> Self {
        let base_code = match u16::from_str_radix(type_code, 16) {
            Ok(code) => format!("{:04X}", code & !constants::MULTI_VALUE_TYPE_FLAG),
            Err(_) => return StreamEncoding::Binary,
        };
        match base_code.as_str() {
            constants::STORAGE_TYPE_STRING => StreamEncoding::Ascii,
            constants::STORAGE_TYPE_UNICODE => StreamEncoding::Unicode,
            _ => StreamEncoding::Binary,
        }
    }

    pub fn decode(self, data: Vec<u8>) -> PropertyValue {
        match self {
            StreamEncoding::Ascii => PropertyValue::String(
                trim_nulls(data.iter().map(|byte| *byte as char).collect()),
            ),
            StreamEncoding::Unicode => {
                let units = data
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect::<Vec<_>>();
                PropertyValue::Unicode(trim_nulls(String::from_utf16_lossy(&units)))
            }
            StreamEncoding::Binary => PropertyValue::Binary(data),
        }
    }
}

// writers usually include the terminator in the stream length
fn trim_nulls(mut text: String) -> String {
    let trimmed_len = text.trim_end_matches('\0').len();
    text.truncate(trimmed_len);
    text
}

impl OleFile {
    /// Reads the stream at directory index `index`.
    pub fn read_entry(&self, index: usize) -> Result<Vec<u8>, OleError> {
        let entry = self.entry(index).ok_or(OleError::DirectoryEntryNotFound)?;
        if entry.is_stream() || entry.object_type() == ObjectType::RootStorage {
            Ok(self.read_entry_data(entry))
        } else {
            Err(OleError::NotAStream(index))
        }
    }

    /// Reads and decodes the stream at directory index `index`.
    pub fn read_entry_as(
        &self,
        index: usize,
        encoding: StreamEncoding,
    ) -> Result<PropertyValue, OleError> {
        Ok(encoding.decode(self.read_entry(index)?))
    }

    /// The bytes of a stream entry, truncated to its declared size. A chain that ends early
    /// yields what was collected. The root entry's data is the mini stream itself.
    pub fn read_entry_data(&self, entry: &DirectoryEntry) -> Vec<u8> {
        let stream_size = entry.stream_size();
        if stream_size == 0 {
            return vec![];
        }
        let location = if entry.object_type() == ObjectType::RootStorage {
            StreamLocation::Regular
        } else {
            StreamLocation::for_size(stream_size)
        };
        let data = match location {
            StreamLocation::MiniStream => {
                self.read_mini_chain(entry.starting_sector_location(), stream_size)
            }
            StreamLocation::Regular => {
                self.read_regular_chain(entry.starting_sector_location(), stream_size)
            }
        };
        if (data.len() as u64) < stream_size {
            warn!(
                "[ole] stream {} ({}) declares {} bytes but its chain holds {}",
                entry.index(),
                entry.name(),
                stream_size,
                data.len()
            );
        }
        data
    }

    fn read_regular_chain(&self, start: u32, stream_size: u64) -> Vec<u8> {
        let sector_size = self.sector_size();
        let sectors_needed = stream_size.div_ceil(sector_size as u64) as usize;
        let mut data = Vec::with_capacity(stream_size.min(self.data().len() as u64) as usize);
        for sector_index in self
            .sector_allocation_table()
            .chain_with_limit(start, sectors_needed)
        {
            match read_sector(self.data(), sector_size, sector_index) {
                Some(sector) => data.extend_from_slice(sector),
                None => {
                    warn!(
                        "[ole] sector {} lies beyond the end of the file",
                        sector_index
                    );
                    break;
                }
            }
        }
        data.truncate(stream_size as usize);
        data
    }

    /// Mini sector `n` sits at byte `n * 64` of the mini stream, which is itself stored in the
    /// regular sectors chained from the root entry.
    fn read_mini_chain(&self, start: u32, stream_size: u64) -> Vec<u8> {
        let sector_size = self.sector_size();
        let mini_sectors_needed =
            stream_size.div_ceil(constants::MINI_SECTOR_SIZE as u64) as usize;
        let mut data = Vec::with_capacity(stream_size as usize);
        for mini_sector in self
            .short_sector_allocation_table()
            .chain_with_limit(start, mini_sectors_needed)
        {
            let offset = mini_sector as usize * constants::MINI_SECTOR_SIZE;
            let within = offset % sector_size;
            let Some(sector_index) = self.mini_stream_sectors().get(offset / sector_size) else {
                warn!(
                    "[ole] mini sector {} is past the end of the mini stream",
                    mini_sector
                );
                break;
            };
            let Some(sector) = read_sector(self.data(), sector_size, *sector_index) else {
                warn!(
                    "[ole] mini stream sector {} lies beyond the end of the file",
                    sector_index
                );
                break;
            };
            if within >= sector.len() {
                break;
            }
            let end = (within + constants::MINI_SECTOR_SIZE).min(sector.len());
            data.extend_from_slice(&sector[within..end]);
        }
        data.truncate(stream_size as usize);
        data
    }
}
