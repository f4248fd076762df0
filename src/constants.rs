//https://winprotocoldoc.blob.core.windows.net/productionwindowsarchives/MS-CFB/%5bMS-CFB%5d.pdf

pub const MAGIC_BYTES: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
/// The header block is always 512 bytes, even when the sector size is 4096.
pub const HEADER_LENGTH: usize = 512;

pub const MAJOR_VERSION_3_VALUE: u16 = 3;
pub const MAJOR_VERSION_4_VALUE: u16 = 4;

pub const SECTOR_SHIFT_VERSION_3: u8 = 9;
pub const SECTOR_SHIFT_VERSION_4: u8 = 12;
pub const SECTOR_SIZE_VERSION_3: usize = 512;
pub const SECTOR_SIZE_VERSION_4: usize = 4096;

pub const MINI_SECTOR_SIZE: usize = 64;
/// Streams strictly smaller than this live in the mini stream.
pub const MINI_STREAM_CUTOFF: u64 = 4096;

// fixed header offsets
pub const OFFSET_MAJOR_VERSION: u64 = 26;
pub const OFFSET_SECTOR_SHIFT: u64 = 30;
pub const OFFSET_FAT_SECTOR_COUNT: u64 = 44;
pub const OFFSET_DIRECTORY_START: u64 = 48;
pub const OFFSET_MINI_FAT_START: u64 = 60;
pub const OFFSET_MINI_FAT_COUNT: u64 = 64;
pub const OFFSET_DIFAT_START: u64 = 68;
pub const OFFSET_DIFAT_COUNT: u64 = 72;
pub const OFFSET_HEADER_DIFAT: u64 = 0x4C;
/// (512 - 0x4C) / 4
pub const HEADER_DIFAT_ENTRIES: usize = 109;

// sector sentinels
pub const MAX_REG_SECTOR: u32 = 0xFFFF_FFFA;
pub const DIFAT_SECTOR: u32 = 0xFFFF_FFFC;
pub const FAT_SECTOR: u32 = 0xFFFF_FFFD;
pub const CHAIN_END: u32 = 0xFFFF_FFFE;
pub const UNALLOCATED_SECTOR: u32 = 0xFFFF_FFFF;

// directory entries
pub const SIZE_OF_DIRECTORY_ENTRY: usize = 128;
pub const DIRECTORY_NAME_LENGTH: usize = 64;
pub const OBJECT_TYPE_UNKNOWN_OR_UNALLOCATED: u8 = 0x00;
pub const OBJECT_TYPE_STORAGE: u8 = 0x01;
pub const OBJECT_TYPE_STREAM: u8 = 0x02;
pub const OBJECT_TYPE_ROOT_STORAGE: u8 = 0x05;
pub const NODE_COLOR_RED: u8 = 0x00;
pub const MAX_REG_STREAM_ID_VALUE: u32 = 0xFFFF_FFFA;
pub const NO_STREAM: u32 = 0xFFFF_FFFF;

// https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxmsg
pub const ATTACHMENT_STORAGE_PREFIX: &str = "__attach_version1.0";
pub const RECIPIENT_STORAGE_PREFIX: &str = "__recip_version1.0";
pub const PROPERTIES_STREAM_NAME: &str = "__properties_version1.0";
pub const SUBSTORAGE_PREFIX: &str = "__substg1.";
// skips the "0_" that follows the prefix
pub const SUBSTORAGE_CODE_OFFSET: usize = 2;

pub const STORAGE_TYPE_STRING: &str = "001E";
pub const STORAGE_TYPE_UNICODE: &str = "001F";
pub const STORAGE_TYPE_BINARY: &str = "0102";
pub const STORAGE_TYPE_OBJECT: &str = "000D";
pub const MULTI_VALUE_TYPE_FLAG: u16 = 0x1000;

/// PidTagAttachDataBinary / PidTagAttachDataObject
pub const ATTACHMENT_DATA_TAG: &str = "3701";

// fixed property stream
pub const TOP_LEVEL_PROPERTY_HEADER_LENGTH: usize = 32;
pub const SUB_OBJECT_PROPERTY_HEADER_LENGTH: usize = 8;
pub const PROPERTY_RECORD_LENGTH: usize = 16;

pub const PROPERTY_TYPE_INT16: u16 = 0x0002;
pub const PROPERTY_TYPE_INT32: u16 = 0x0003;
pub const PROPERTY_TYPE_BOOLEAN: u16 = 0x000B;
pub const PROPERTY_TYPE_INT64: u16 = 0x0014;
pub const PROPERTY_TYPE_TIME: u16 = 0x0040;

pub const PROPERTY_FLAG_MANDATORY: u32 = 0x0000_0001;
pub const PROPERTY_FLAG_READABLE: u32 = 0x0000_0002;
pub const PROPERTY_FLAG_WRITABLE: u32 = 0x0000_0004;

/// 100ns ticks between 1601-01-01 and 1970-01-01
pub const FILETIME_UNIX_EPOCH_TICKS: i128 = 116_444_736_000_000_000;
pub const FILETIME_TICKS_PER_MILLISECOND: i128 = 10_000;

// reserved keys in the produced property bag
pub const KEY_PROPERTIES: &str = "_properties";
pub const KEY_ATTACHMENTS: &str = "attachments";
pub const KEY_RECIPIENTS: &str = "recipients";
pub const KEY_DATA_ID: &str = "dataId";
pub const KEY_CONTENT_LENGTH: &str = "contentLength";
pub const KEY_EMBEDDED_MESSAGE: &str = "EmbeddedMessage";
