use crate::disk::BLOCK_SIZE;

/// 魔数，用于识别文件系统
pub const MAGIC: u32 = 0x1003_2013;
pub const VERSION: u32 = 1;

pub const SUPER_BLOCK_BLOCK_ID: u32 = 0;
pub const INODE_STORE_BLOCK_ID: u32 = 1;
pub const ROOT_DATA_BLOCK_ID: u32 = 2;

// 0~2 号块保留给超级块、inode 区和根目录数据块
pub const RESERVED_BLOCKS: u32 = 3;

// 空闲块位图是一个 u32，每一位对应一个块
pub const MAX_BLOCKS: u32 = u32::BITS;

pub const ROOT_INODE_NO: u32 = 1;

// mode + inode_no + data_block_no + size，各 4 字节
pub const INODE_RECORD_SIZE: usize = 16;

// inode 区只占一个块：4096 / 16 = 256 个槽位
pub const INODE_STORE_CAPACITY: u32 = (BLOCK_SIZE / INODE_RECORD_SIZE) as u32;

// 文件系统对象（文件 + 目录，含根目录）上限
pub const MAX_FILESYSTEM_OBJECTS: u32 = 64;

pub const FILENAME_MAX_LEN: usize = 255;

// 文件名 255 字节 + inode_no 4 字节
pub const DIR_ENTRY_SIZE: usize = FILENAME_MAX_LEN + 4;

// 每个目录的数据块能放下的目录项数：4096 / 259 = 15
pub const DIR_ENTRY_CAPACITY: u32 = (BLOCK_SIZE / DIR_ENTRY_SIZE) as u32;
