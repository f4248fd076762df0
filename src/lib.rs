use std::marker::Unpin;

use derivative::Derivative;
use log::warn;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::allocation::AllocationTable;
use crate::config::ParserConfig;
use crate::directory::{DirectoryEntry, ObjectType};
use crate::error::OleError;
use crate::header::OleHeader;

pub mod allocation;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod directory;
pub mod error;
pub mod header;
pub mod message;
pub mod property;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::message::{Message, MessageFields};
pub use crate::property::{FixedPropertyRecord, FixedValue, PropertyBag, PropertyValue};

pub trait Readable: Unpin + AsyncRead {}

impl Readable for tokio::fs::File {}
impl Readable for &[u8] {}

/// A decoded compound file: header, both allocation tables and the directory tree, over the
/// original bytes.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct OleFile {
    header: OleHeader,
    #[derivative(Debug = "ignore")]
    data: Vec<u8>,
    #[derivative(Debug = "ignore")]
    sector_allocation_table: AllocationTable,
    #[derivative(Debug = "ignore")]
    short_sector_allocation_table: AllocationTable,
    directory_entries: Vec<Option<DirectoryEntry>>,
    // regular sectors backing the mini stream, in order
    #[derivative(Debug = "ignore")]
    mini_stream_sectors: Vec<u32>,
}

impl OleFile {
    pub fn parse(data: Vec<u8>) -> Result<Self, OleError> {
        Self::parse_with_config(data, &ParserConfig::default())
    }

    pub fn parse_with_config(data: Vec<u8>, config: &ParserConfig) -> Result<Self, OleError> {
        let header = header::parse_header(&data, config.strict_sector_size)?;
        let sector_allocation_table = allocation::build_sector_allocation_table(&data, &header);
        let short_sector_allocation_table =
            allocation::build_mini_allocation_table(&data, &header, &sector_allocation_table);
        let mut directory_entries =
            directory::parse_directory_entries(&data, &header, &sector_allocation_table)?;

        match directory_entries.first() {
            Some(Some(root)) if root.object_type() == ObjectType::RootStorage => {}
            _ => {
                return Err(OleError::InvalidDirectoryEntry(
                    "object_type",
                    "first directory entry is not the root storage".to_string(),
                ))
            }
        }
        directory::build_hierarchy(&mut directory_entries);

        let mini_stream_sectors = directory_entries[0]
            .as_ref()
            .map(|root| sector_allocation_table.chain(root.starting_sector_location()))
            .unwrap_or_default();

        Ok(OleFile {
            header,
            data,
            sector_allocation_table,
            short_sector_allocation_table,
            directory_entries,
            mini_stream_sectors,
        })
    }

    /// Reads `read` to the end, then parses the buffered bytes.
    pub async fn from_reader<R>(mut read: R, config: &ParserConfig) -> Result<Self, OleError>
    where
        R: Readable,
    {
        let mut data = vec![];
        read.read_to_end(&mut data).await?;
        Self::parse_with_config(data, config)
    }

    pub fn header(&self) -> &OleHeader {
        &self.header
    }

    pub fn sector_size(&self) -> usize {
        self.header.sector_size()
    }

    pub fn sector_allocation_table(&self) -> &AllocationTable {
        &self.sector_allocation_table
    }

    pub fn short_sector_allocation_table(&self) -> &AllocationTable {
        &self.short_sector_allocation_table
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn mini_stream_sectors(&self) -> &[u32] {
        &self.mini_stream_sectors
    }

    pub fn root(&self) -> &DirectoryEntry {
        // checked in parse_with_config
        self.directory_entries[0]
            .as_ref()
            .unwrap_or_else(|| unreachable!("root entry is validated during parsing"))
    }

    pub fn entry(&self, index: usize) -> Option<&DirectoryEntry> {
        self.directory_entries.get(index).and_then(Option::as_ref)
    }

    /// Every allocated entry in directory order.
    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.directory_entries.iter().flatten()
    }

    /// Number of directory slots, including unallocated ones.
    pub fn directory_len(&self) -> usize {
        self.directory_entries.len()
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = &DirectoryEntry> {
        self.entry(index)
            .map(DirectoryEntry::children)
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.entry(*child))
    }

    pub fn list_streams(&self) -> Vec<String> {
        self.entries()
            .filter(|entry| entry.object_type() == ObjectType::Stream)
            .map(|entry| entry.name().to_string())
            .collect()
    }

    pub fn list_storage(&self) -> Vec<String> {
        self.entries()
            .filter(|entry| entry.object_type() == ObjectType::Storage)
            .map(|entry| entry.name().to_string())
            .collect()
    }

    /// Walks the hierarchy from the root, one path element per level.
    pub fn find_entry(&self, path: &[&str]) -> Option<&DirectoryEntry> {
        let mut current = self.root();
        for element in path {
            current = self
                .children(current.index())
                .find(|child| child.name() == *element)?;
        }
        Some(current)
    }

    pub fn open_stream(&self, path: &[&str]) -> Result<Vec<u8>, OleError> {
        match self.find_entry(path) {
            Some(entry) if entry.is_stream() => Ok(self.read_entry_data(entry)),
            Some(entry) => Err(OleError::NotAStream(entry.index())),
            None => {
                warn!("[ole] no entry at path {:?}", path);
                Err(OleError::DirectoryEntryNotFound)
            }
        }
    }
}
