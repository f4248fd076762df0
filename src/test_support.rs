//! Builds small compound files in memory for tests.

use crate::constants;

pub(crate) enum Node {
    Stream(String, Vec<u8>),
    Storage(String, Vec<Node>),
}

pub(crate) fn stream(name: &str, data: impl Into<Vec<u8>>) -> Node {
    Node::Stream(name.to_string(), data.into())
}

pub(crate) fn storage(name: &str, children: Vec<Node>) -> Node {
    Node::Storage(name.to_string(), children)
}

/// A directory entry with explicit tree pointers.
#[derive(Clone)]
pub(crate) struct RawEntry {
    pub(crate) name: String,
    pub(crate) object_type: u8,
    pub(crate) left: u32,
    pub(crate) right: u32,
    pub(crate) child: u32,
    pub(crate) data: Vec<u8>,
}

impl RawEntry {
    pub(crate) fn new(name: &str, object_type: u8) -> Self {
        Self {
            name: name.to_string(),
            object_type,
            left: constants::NO_STREAM,
            right: constants::NO_STREAM,
            child: constants::NO_STREAM,
            data: vec![],
        }
    }

    pub(crate) fn siblings(mut self, left: u32, right: u32) -> Self {
        self.left = left;
        self.right = right;
        self
    }

    pub(crate) fn child(mut self, child: u32) -> Self {
        self.child = child;
        self
    }

    pub(crate) fn data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }
}

pub(crate) struct ContainerBuilder {
    sector_size: usize,
    children: Vec<Node>,
    raw_entries: Option<Vec<RawEntry>>,
}

impl ContainerBuilder {
    pub(crate) fn new(sector_size: usize) -> Self {
        Self {
            sector_size,
            children: vec![],
            raw_entries: None,
        }
    }

    /// Uses the given entries verbatim; entry 0 should be the root.
    pub(crate) fn with_raw_entries(sector_size: usize, entries: Vec<RawEntry>) -> Self {
        Self {
            sector_size,
            children: vec![],
            raw_entries: Some(entries),
        }
    }

    pub(crate) fn stream(mut self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.children.push(stream(name, data));
        self
    }

    pub(crate) fn storage(mut self, name: &str, children: Vec<Node>) -> Self {
        self.children.push(storage(name, children));
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let sector_size = self.sector_size;
        let entries = match self.raw_entries {
            Some(entries) => entries,
            None => flatten(self.children),
        };
        Layout::new(sector_size).write(entries)
    }
}

fn flatten(children: Vec<Node>) -> Vec<RawEntry> {
    let mut entries = vec![RawEntry::new("Root Entry", constants::OBJECT_TYPE_ROOT_STORAGE)];
    let child = add_level(&mut entries, children);
    entries[0].child = child;
    entries
}

/// Appends a sibling level as a balanced tree and returns the id of its top entry.
fn add_level(entries: &mut Vec<RawEntry>, children: Vec<Node>) -> u32 {
    let mut ids = Vec::with_capacity(children.len());
    for node in children {
        let id = entries.len();
        match node {
            Node::Stream(name, data) => {
                entries.push(RawEntry::new(&name, constants::OBJECT_TYPE_STREAM).data(data));
            }
            Node::Storage(name, grandchildren) => {
                entries.push(RawEntry::new(&name, constants::OBJECT_TYPE_STORAGE));
                let child = add_level(entries, grandchildren);
                entries[id].child = child;
            }
        }
        ids.push(id as u32);
    }
    link_siblings(entries, &ids)
}

fn link_siblings(entries: &mut [RawEntry], ids: &[u32]) -> u32 {
    if ids.is_empty() {
        return constants::NO_STREAM;
    }
    let middle = ids.len() / 2;
    let top = ids[middle];
    let left = link_siblings(entries, &ids[..middle]);
    let right = link_siblings(entries, &ids[middle + 1..]);
    entries[top as usize].left = left;
    entries[top as usize].right = right;
    top
}

struct Layout {
    sector_size: usize,
    sectors: Vec<Vec<u8>>,
    fat: Vec<u32>,
}

impl Layout {
    fn new(sector_size: usize) -> Self {
        Self {
            sector_size,
            sectors: vec![],
            fat: vec![],
        }
    }

    fn allocate(&mut self, data: &[u8]) -> u32 {
        if data.is_empty() {
            return constants::CHAIN_END;
        }
        let start = self.sectors.len() as u32;
        for chunk in data.chunks(self.sector_size) {
            let mut sector = chunk.to_vec();
            sector.resize(self.sector_size, 0);
            self.sectors.push(sector);
            self.fat.push(self.sectors.len() as u32);
        }
        if let Some(last) = self.fat.last_mut() {
            *last = constants::CHAIN_END;
        }
        start
    }

    fn write(mut self, mut entries: Vec<RawEntry>) -> Vec<u8> {
        let mut mini_stream: Vec<u8> = vec![];
        let mut mini_fat: Vec<u32> = vec![];
        let mut starts = vec![constants::CHAIN_END; entries.len()];

        for (index, entry) in entries.iter().enumerate() {
            if entry.object_type != constants::OBJECT_TYPE_STREAM || entry.data.is_empty() {
                continue;
            }
            if (entry.data.len() as u64) < constants::MINI_STREAM_CUTOFF {
                starts[index] = mini_fat.len() as u32;
                for chunk in entry.data.chunks(constants::MINI_SECTOR_SIZE) {
                    let mut mini_sector = chunk.to_vec();
                    mini_sector.resize(constants::MINI_SECTOR_SIZE, 0);
                    mini_stream.extend(mini_sector);
                    mini_fat.push(mini_fat.len() as u32 + 1);
                }
                if let Some(last) = mini_fat.last_mut() {
                    *last = constants::CHAIN_END;
                }
            } else {
                starts[index] = self.allocate(&entry.data);
            }
        }

        starts[0] = self.allocate(&mini_stream);
        entries[0].data = mini_stream;

        let mini_fat_bytes = pad_u32s(&mini_fat, self.sector_size);
        let mini_fat_start = self.allocate(&mini_fat_bytes);
        let mini_fat_len = mini_fat_bytes.len() / self.sector_size;

        let per_sector = self.sector_size / constants::SIZE_OF_DIRECTORY_ENTRY;
        let mut directory = vec![];
        for (index, entry) in entries.iter().enumerate() {
            directory.extend(encode_entry(entry, starts[index]));
        }
        while directory.len() % (per_sector * constants::SIZE_OF_DIRECTORY_ENTRY) != 0 {
            directory.extend(encode_entry(&RawEntry::new("", 0), 0));
        }
        let directory_start = self.allocate(&directory);

        let per_fat_sector = self.sector_size / 4;
        let mut fat_sector_count = 1;
        while self.sectors.len() + fat_sector_count > fat_sector_count * per_fat_sector {
            fat_sector_count += 1;
        }
        assert!(fat_sector_count <= constants::HEADER_DIFAT_ENTRIES);
        let first_fat_sector = self.sectors.len() as u32;
        for _ in 0..fat_sector_count {
            self.fat.push(constants::FAT_SECTOR);
        }
        let fat_bytes = pad_u32s(&self.fat, self.sector_size);
        for chunk in fat_bytes.chunks(self.sector_size) {
            self.sectors.push(chunk.to_vec());
        }

        let mut header = vec![0u8; self.sector_size];
        header[0..8].copy_from_slice(&constants::MAGIC_BYTES);
        let (major, shift) = if self.sector_size == constants::SECTOR_SIZE_VERSION_4 {
            (4u16, constants::SECTOR_SHIFT_VERSION_4 as u16)
        } else {
            (3u16, constants::SECTOR_SHIFT_VERSION_3 as u16)
        };
        put_u16(&mut header, 24, 0x003E);
        put_u16(&mut header, 26, major);
        put_u16(&mut header, 28, 0xFFFE);
        put_u16(&mut header, 30, shift);
        put_u16(&mut header, 32, 6);
        put_u32(&mut header, 44, fat_sector_count as u32);
        put_u32(&mut header, 48, directory_start);
        put_u32(&mut header, 56, constants::MINI_STREAM_CUTOFF as u32);
        put_u32(&mut header, 60, mini_fat_start);
        put_u32(&mut header, 64, mini_fat_len as u32);
        put_u32(&mut header, 68, constants::CHAIN_END);
        put_u32(&mut header, 72, 0);
        for slot in 0..constants::HEADER_DIFAT_ENTRIES {
            let value = if slot < fat_sector_count {
                first_fat_sector + slot as u32
            } else {
                constants::UNALLOCATED_SECTOR
            };
            put_u32(&mut header, 0x4C + slot * 4, value);
        }

        let mut file = header;
        for sector in self.sectors {
            file.extend(sector);
        }
        file
    }
}

fn encode_entry(entry: &RawEntry, start: u32) -> Vec<u8> {
    let mut raw = vec![0u8; constants::SIZE_OF_DIRECTORY_ENTRY];
    if entry.object_type != 0 || !entry.name.is_empty() {
        let units: Vec<u16> = entry.name.encode_utf16().collect();
        for (index, unit) in units.iter().take(31).enumerate() {
            put_u16(&mut raw, index * 2, *unit);
        }
        put_u16(&mut raw, 64, ((units.len().min(31) + 1) * 2) as u16);
    }
    raw[66] = entry.object_type;
    raw[67] = 1;
    put_u32(&mut raw, 68, entry.left);
    put_u32(&mut raw, 72, entry.right);
    put_u32(&mut raw, 76, entry.child);
    put_u32(&mut raw, 116, start);
    raw[120..128].copy_from_slice(&(entry.data.len() as u64).to_le_bytes());
    raw
}

fn pad_u32s(values: &[u32], sector_size: usize) -> Vec<u8> {
    let mut bytes: Vec<u8> = values.iter().flat_map(|value| value.to_le_bytes()).collect();
    if !bytes.is_empty() {
        while bytes.len() % sector_size != 0 {
            bytes.extend(constants::UNALLOCATED_SECTOR.to_le_bytes());
        }
    }
    bytes
}

pub(crate) fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

/// A 16-byte fixed property record.
pub(crate) fn property_record(property_type: u16, tag: u16, flags: u32, value: [u8; 8]) -> Vec<u8> {
    let mut record = vec![];
    record.extend(property_type.to_le_bytes());
    record.extend(tag.to_le_bytes());
    record.extend(flags.to_le_bytes());
    record.extend(value);
    record
}

/// Root-level `__properties_version1.0` contents.
pub(crate) fn top_level_properties(records: &[Vec<u8>]) -> Vec<u8> {
    let mut data = vec![0u8; 8];
    data.extend(3u32.to_le_bytes());
    data.extend(2u32.to_le_bytes());
    data.extend(3u32.to_le_bytes());
    data.extend(2u32.to_le_bytes());
    data.extend([0u8; 8]);
    for record in records {
        data.extend(record);
    }
    data
}
