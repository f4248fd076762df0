use chrono::NaiveDateTime;
use derivative::Derivative;
use log::{debug, warn};

use crate::allocation::{read_sector, AllocationTable};
use crate::constants;
use crate::cursor::ByteCursor;
use crate::error::OleError;
use crate::header::OleHeader;

#[derive(Clone, Derivative, Copy, PartialEq, Eq)]
#[derivative(Debug)]
pub enum ObjectType {
    Storage,
    Stream,
    RootStorage,
}

#[derive(Clone, Derivative, Copy, PartialEq, Eq)]
#[derivative(Debug)]
pub enum NodeColor {
    Red,
    Black,
}

/**
https://winprotocoldoc.blob.core.windows.net/productionwindowsarchives/MS-CFB/%5bMS-CFB%5d.pdf
Each storage object or stream object within a compound file is represented by a single directory
entry. The valid values for a stream ID, which are used in the Child ID, Right Sibling ID, and Left
Sibling ID fields, are 0 through MAXREGSID (0xFFFFFFFA). The special value NOSTREAM (0xFFFFFFFF) is
used as a terminator.
 */
#[derive(Clone, Derivative, PartialEq)]
#[derivative(Debug)]
pub struct DirectoryEntry {
    //the index in the directory array
    index: usize,
    object_type: ObjectType,
    name: String,
    color: NodeColor,
    left_sibling_id: Option<u32>,
    right_sibling_id: Option<u32>,
    child_id: Option<u32>,
    class_id: Option<String>,
    creation_time: Option<NaiveDateTime>,
    modification_time: Option<NaiveDateTime>,
    starting_sector_location: u32,
    stream_size: u64,
    // filled in by the hierarchy pass, traversal order
    children: Vec<usize>,
}

impl DirectoryEntry {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> NodeColor {
        self.color
    }

    pub fn left_sibling_id(&self) -> Option<u32> {
        self.left_sibling_id
    }

    pub fn right_sibling_id(&self) -> Option<u32> {
        self.right_sibling_id
    }

    pub fn child_id(&self) -> Option<u32> {
        self.child_id
    }

    pub fn class_id(&self) -> Option<&str> {
        self.class_id.as_deref()
    }

    pub fn creation_time(&self) -> Option<NaiveDateTime> {
        self.creation_time
    }

    pub fn modification_time(&self) -> Option<NaiveDateTime> {
        self.modification_time
    }

    pub fn starting_sector_location(&self) -> u32 {
        self.starting_sector_location
    }

    pub fn stream_size(&self) -> u64 {
        self.stream_size
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn is_storage(&self) -> bool {
        matches!(
            self.object_type,
            ObjectType::Storage | ObjectType::RootStorage
        )
    }

    pub fn is_stream(&self) -> bool {
        self.object_type == ObjectType::Stream
    }

    /// Decodes one 128-byte record. Unallocated or unknown object types yield `None`.
    pub(crate) fn parse(
        record: &[u8],
        index: usize,
        major_version: u16,
    ) -> Result<Option<Self>, OleError> {
        let mut cursor = ByteCursor::new(record);

        cursor.seek(66);
        let object_type = match cursor.read_u8()? {
            constants::OBJECT_TYPE_ROOT_STORAGE => ObjectType::RootStorage,
            constants::OBJECT_TYPE_STORAGE => ObjectType::Storage,
            constants::OBJECT_TYPE_STREAM => ObjectType::Stream,
            constants::OBJECT_TYPE_UNKNOWN_OR_UNALLOCATED => return Ok(None),
            anything_else => {
                debug!(
                    "[ole] directory entry {} has unknown object type {:#x}",
                    index, anything_else
                );
                return Ok(None);
            }
        };
        let color = match cursor.read_u8()? {
            constants::NODE_COLOR_RED => NodeColor::Red,
            _ => NodeColor::Black,
        };
        let left_sibling_id = read_stream_id(&mut cursor, index, "left_sibling_id")?;
        let right_sibling_id = read_stream_id(&mut cursor, index, "right_sibling_id")?;
        let child_id = read_stream_id(&mut cursor, index, "child_id")?;

        // the name length is in bytes and includes the terminator
        cursor.seek(64);
        let name_len = (cursor.read_u16()? as usize).min(constants::DIRECTORY_NAME_LENGTH);
        let name = cursor
            .read_utf16_at(0, name_len / 2)?
            .chars()
            .filter(|character| *character != '\0')
            .collect::<String>();

        cursor.seek(80);
        let class_id = format_class_id(&cursor.read_bytes(16)?);

        cursor.seek(100);
        let creation_time = match cursor.read_u64()? as i64 {
            0 => None,
            time => epochs::windows_file(time),
        };
        let modification_time = match cursor.read_u64()? as i64 {
            0 => None,
            time => epochs::windows_file(time),
        };

        let starting_sector_location = cursor.read_u32()?;
        let stream_size = if major_version == constants::MAJOR_VERSION_3_VALUE {
            // version 3 writers did not always initialize the most significant 32 bits,
            // MS-CFB recommends ignoring them
            cursor.read_u32()? as u64
        } else {
            cursor.read_u64()?
        };
        if stream_size != 0 && object_type == ObjectType::Storage {
            debug!(
                "[ole] storage entry {} ({}) has non-zero stream size {}",
                index, name, stream_size
            );
        }

        Ok(Some(Self {
            index,
            object_type,
            name,
            color,
            left_sibling_id,
            right_sibling_id,
            child_id,
            class_id,
            creation_time,
            modification_time,
            starting_sector_location,
            stream_size,
            children: vec![],
        }))
    }
}

fn read_stream_id(
    cursor: &mut ByteCursor,
    index: usize,
    field: &'static str,
) -> Result<Option<u32>, OleError> {
    match cursor.read_u32()? {
        constants::NO_STREAM => Ok(None),
        value if value > constants::MAX_REG_STREAM_ID_VALUE => {
            warn!(
                "[ole] directory entry {} has invalid {} {:#x}",
                index, field, value
            );
            Ok(None)
        }
        value => Ok(Some(value)),
    }
}

/// GUID text for a CLSID: three little-endian groups, then eight bytes in stored order.
fn format_class_id(bytes: &[u8]) -> Option<String> {
    let bytes: &[u8; 16] = bytes.try_into().ok()?;
    if bytes.iter().all(|byte| *byte == 0) {
        return None;
    }
    let mut groups = ByteCursor::new(bytes);
    let data1 = groups.read_u32().ok()?;
    let data2 = groups.read_u16().ok()?;
    let data3 = groups.read_u16().ok()?;
    let tail: String = bytes[8..].iter().map(|byte| format!("{:02X}", byte)).collect();
    Some(format!(
        "{:08X}-{:04X}-{:04X}-{}-{}",
        data1,
        data2,
        data3,
        &tail[..4],
        &tail[4..]
    ))
}

/// Reads every directory record along the directory sector chain. Slots that hold no entry
/// stay `None` so indices keep matching the on-disk layout.
pub(crate) fn parse_directory_entries(
    data: &[u8],
    header: &OleHeader,
    sector_allocation_table: &AllocationTable,
) -> Result<Vec<Option<DirectoryEntry>>, OleError> {
    let per_sector = header.sector_size / constants::SIZE_OF_DIRECTORY_ENTRY;
    let mut entries = vec![];

    for sector_index in sector_allocation_table.chain(header.directory_first_sector) {
        let Some(sector) = read_sector(data, header.sector_size, sector_index) else {
            warn!(
                "[ole] directory sector {} lies beyond the end of the file",
                sector_index
            );
            break;
        };
        for record in sector
            .chunks_exact(constants::SIZE_OF_DIRECTORY_ENTRY)
            .take(per_sector)
        {
            let index = entries.len();
            entries.push(DirectoryEntry::parse(record, index, header.major_version)?);
        }
    }

    Ok(entries)
}

/// Rebuilds each storage's child list from the sibling trees.
///
/// A storage's `child` points at one node of a binary tree of siblings, so both `left` and
/// `right` of every visited sibling go back on the worklist. Storages are expanded from an
/// explicit stack rather than by recursion. An entry is attached to the first parent that
/// reaches it; later references to it are ignored.
pub(crate) fn build_hierarchy(entries: &mut [Option<DirectoryEntry>]) {
    let mut claimed = vec![false; entries.len()];
    let mut storages = vec![];
    if let Some(Some(root)) = entries.first() {
        if root.object_type == ObjectType::RootStorage {
            claimed[0] = true;
            storages.push(0usize);
        }
    }

    while let Some(parent) = storages.pop() {
        let Some(child_id) = entries[parent].as_ref().and_then(|entry| entry.child_id) else {
            continue;
        };
        let mut children = vec![];
        let mut worklist = vec![child_id];
        while let Some(id) = worklist.pop() {
            let id = id as usize;
            let Some(Some(entry)) = entries.get(id) else {
                continue;
            };
            if claimed[id] {
                warn!(
                    "[ole] directory entry {} is referenced more than once, skipping",
                    id
                );
                continue;
            }
            claimed[id] = true;
            children.push(id);
            worklist.extend(entry.left_sibling_id);
            worklist.extend(entry.right_sibling_id);
            if entry.is_storage() {
                storages.push(id);
            }
        }
        if let Some(entry) = entries[parent].as_mut() {
            entry.children = children;
        }
    }
}
