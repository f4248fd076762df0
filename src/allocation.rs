use std::collections::HashSet;

use derivative::Derivative;
use log::warn;

use crate::constants;
use crate::header::OleHeader;

/// Maps a sector index to the next sector of its chain, or to a sentinel.
#[derive(Clone, Default, Derivative, PartialEq)]
#[derivative(Debug)]
pub struct AllocationTable {
    #[derivative(Debug = "ignore")]
    entries: Vec<u32>,
}

impl AllocationTable {
    pub fn new(entries: Vec<u32>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[u32] {
        &self.entries
    }

    pub fn next(&self, index: u32) -> Option<u32> {
        self.entries.get(index as usize).copied()
    }

    /// Follows the chain from `start` until a sentinel.
    pub fn chain(&self, start: u32) -> Vec<u32> {
        self.chain_with_limit(start, usize::MAX)
    }

    /// Follows the chain from `start` for at most `limit` sectors. Cycles and indices outside
    /// the table truncate the chain instead of failing.
    pub fn chain_with_limit(&self, start: u32, limit: usize) -> Vec<u32> {
        let mut chain = vec![];
        let mut visited = HashSet::new();
        let mut current = start;
        while current <= constants::MAX_REG_SECTOR && chain.len() < limit {
            if !visited.insert(current) {
                warn!(
                    "[ole] sector chain starting at {} loops back to {}, truncating",
                    start, current
                );
                break;
            }
            chain.push(current);
            match self.next(current) {
                Some(next) => current = next,
                None => {
                    warn!(
                        "[ole] sector {} is outside the allocation table ({} entries), truncating",
                        current,
                        self.entries.len()
                    );
                    break;
                }
            }
        }
        chain
    }
}

/// Returns the bytes of a regular sector. The final sector of a file may be short.
pub(crate) fn read_sector(data: &[u8], sector_size: usize, sector_index: u32) -> Option<&[u8]> {
    let offset = (sector_index as usize).checked_add(1)?.checked_mul(sector_size)?;
    if offset >= data.len() {
        return None;
    }
    let end = offset.saturating_add(sector_size).min(data.len());
    Some(&data[offset..end])
}

fn sector_as_u32s(sector: &[u8]) -> impl Iterator<Item = u32> + '_ {
    sector
        .chunks_exact(4)
        .map(|quad| u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
}

/// Appends one sector worth of table entries, keeping index alignment when the sector is
/// missing or short.
fn extend_from_sector(table: &mut Vec<u32>, data: &[u8], sector_size: usize, sector_index: u32) {
    let per_sector = sector_size / 4;
    let before = table.len();
    match read_sector(data, sector_size, sector_index) {
        Some(sector) => table.extend(sector_as_u32s(sector)),
        None => warn!(
            "[ole] allocation table sector {} lies beyond the end of the file",
            sector_index
        ),
    }
    table.resize(before + per_sector, constants::UNALLOCATED_SECTOR);
}

fn is_end(sector_index: u32) -> bool {
    sector_index == constants::UNALLOCATED_SECTOR || sector_index == constants::CHAIN_END
}

pub(crate) fn build_sector_allocation_table(data: &[u8], header: &OleHeader) -> AllocationTable {
    let sector_size = header.sector_size;
    let mut table = vec![];
    let mut fat_sectors_read = 0usize;

    // first 109 sectors live in the header
    for sector_index in header.sector_allocation_table_head.iter() {
        if is_end(*sector_index) {
            break;
        }
        extend_from_sector(&mut table, data, sector_size, *sector_index);
        fat_sectors_read += 1;
    }

    // DI-FAT used
    // https://docs.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/0afa4e43-b18f-432a-9917-4f276eca7a73
    let mut remaining_fats =
        (header.sector_allocation_table_len as usize).saturating_sub(fat_sectors_read);
    let mut next_di_fat_sector = header.master_sector_allocation_table_first_sector;
    let mut visited = HashSet::new();
    'difat: while remaining_fats > 0 && next_di_fat_sector <= constants::MAX_REG_SECTOR {
        if !visited.insert(next_di_fat_sector) {
            warn!(
                "[ole] DI-FAT chain loops back to sector {}",
                next_di_fat_sector
            );
            break;
        }
        let di_fat_block = match read_sector(data, sector_size, next_di_fat_sector) {
            Some(sector) => sector_as_u32s(sector).collect::<Vec<_>>(),
            None => {
                warn!(
                    "[ole] DI-FAT sector {} lies beyond the end of the file",
                    next_di_fat_sector
                );
                break;
            }
        };
        // every entry but the last is a FAT sector id, the last links to the next DI-FAT sector
        let Some((last_sec_id, fat_ids)) = di_fat_block.split_last() else {
            break;
        };
        for sector_index in fat_ids {
            if remaining_fats == 0 || is_end(*sector_index) {
                break 'difat;
            }
            extend_from_sector(&mut table, data, sector_size, *sector_index);
            remaining_fats -= 1;
        }
        next_di_fat_sector = *last_sec_id;
    }

    if remaining_fats > 0 {
        warn!(
            "[ole] header declares {} FAT sectors but {} could not be located",
            header.sector_allocation_table_len, remaining_fats
        );
    }

    AllocationTable::new(table)
}

pub(crate) fn build_mini_allocation_table(
    data: &[u8],
    header: &OleHeader,
    sector_allocation_table: &AllocationTable,
) -> AllocationTable {
    let declared = header.short_sector_allocation_table_len as usize;
    if declared == 0 || is_end(header.short_sector_allocation_table_first_sector) {
        return AllocationTable::default(); //no mini stream here
    }

    let chain = sector_allocation_table
        .chain_with_limit(header.short_sector_allocation_table_first_sector, declared);
    if chain.len() < declared {
        warn!(
            "[ole] mini FAT chain ends after {} of {} sectors",
            chain.len(),
            declared
        );
    }

    let mut table = vec![];
    for sector_index in chain {
        extend_from_sector(&mut table, data, header.sector_size, sector_index);
    }
    AllocationTable::new(table)
}
