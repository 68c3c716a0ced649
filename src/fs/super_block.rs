use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    disk::{Block, BLOCK_SIZE},
    fs::{
        config::{MAGIC, MAX_BLOCKS, RESERVED_BLOCKS, VERSION},
        error::{FileSystemError, Result},
        inode_table::{self, InodeRecord},
    },
};

// 低 3 位对应保留块，永远不会被标记为空闲
const RESERVED_MASK: u32 = (1 << RESERVED_BLOCKS) - 1;

/// 超级块：块 0 的头部，其余部分填 0
///
/// `free_blocks` 中第 i 位为 1 表示第 i 块空闲。
/// `root_inode` 是根目录 inode 记录的副本，随根目录的变化一起刷新。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    pub version: u32,
    pub magic: u32,
    pub block_size: u32,
    pub free_blocks: u32,
    pub inodes_count: u32,
    pub root_inode: InodeRecord,
}

impl SuperBlock {
    /// 新格式化的超级块：除保留块外，设备上存在的块全部空闲，只有根目录一个对象
    pub fn new(device_blocks: u64, root_inode: InodeRecord) -> Self {
        Self {
            version: VERSION,
            magic: MAGIC,
            block_size: BLOCK_SIZE as u32,
            free_blocks: allocatable_mask(device_blocks),
            inodes_count: 1,
            root_inode,
        }
    }

    /// 从块 0 解码并校验魔数和块大小
    pub fn load(block: &Block) -> Result<Self> {
        let sb: SuperBlock = bincode::deserialize(&block[..])
            .map_err(|e| FileSystemError::CorruptSuperblock(e.to_string()))?;

        if sb.magic != MAGIC {
            return Err(FileSystemError::CorruptSuperblock(format!(
                "bad magic {:#010x}, expected {:#010x}",
                sb.magic, MAGIC
            )));
        }
        if sb.block_size != BLOCK_SIZE as u32 {
            return Err(FileSystemError::CorruptSuperblock(format!(
                "block size {} does not match {}",
                sb.block_size, BLOCK_SIZE
            )));
        }
        if sb.inodes_count == 0 || sb.inodes_count > inode_table::capacity() {
            return Err(FileSystemError::CorruptSuperblock(format!(
                "inodes_count {} outside 1..={}",
                sb.inodes_count,
                inode_table::capacity()
            )));
        }
        if sb.free_blocks & RESERVED_MASK != 0 {
            return Err(FileSystemError::CorruptSuperblock(format!(
                "reserved blocks marked free in bitmap {:#034b}",
                sb.free_blocks
            )));
        }
        if sb.version != VERSION {
            warn!("superblock version {} differs from {}", sb.version, VERSION);
        }
        Ok(sb)
    }

    /// 完整的块 0 镜像
    pub fn encode(&self) -> Result<Box<Block>> {
        let mut block = Box::new([0u8; BLOCK_SIZE]);
        bincode::serialize_into(&mut block[..], self)?;
        Ok(block)
    }

    /// 从第一个非保留块开始找最低的空闲位，清零后返回块号
    pub fn allocate_block(&mut self) -> Result<u32> {
        let candidates = self.free_blocks & !RESERVED_MASK;
        if candidates == 0 {
            return Err(FileSystemError::DiskFull);
        }
        let block_no = candidates.trailing_zeros();
        self.free_blocks &= !(1 << block_no);
        debug!("allocated block {}", block_no);
        Ok(block_no)
    }

    pub fn is_free(&self, block_no: u32) -> bool {
        block_no < MAX_BLOCKS && self.free_blocks & (1 << block_no) != 0
    }

    pub fn free_count(&self) -> u32 {
        self.free_blocks.count_ones()
    }
}

/// 设备上可被位图跟踪的块数
pub fn tracked_blocks(device_blocks: u64) -> u32 {
    device_blocks.min(MAX_BLOCKS as u64) as u32
}

fn allocatable_mask(device_blocks: u64) -> u32 {
    let tracked = tracked_blocks(device_blocks);
    let all = if tracked == MAX_BLOCKS {
        u32::MAX
    } else {
        (1u32 << tracked) - 1
    };
    all & !RESERVED_MASK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{
        config::{ROOT_DATA_BLOCK_ID, ROOT_INODE_NO},
        error::ErrorKind,
        inode_table::Mode,
    };

    fn root() -> InodeRecord {
        InodeRecord::new(Mode::DIRECTORY | Mode::from_bits_retain(0o755), ROOT_INODE_NO, ROOT_DATA_BLOCK_ID)
    }

    #[test]
    fn header_encodes_to_fixed_layout() {
        let sb = SuperBlock::new(32, root());
        let block = sb.encode().unwrap();

        assert_eq!(&block[0..4], &VERSION.to_le_bytes());
        assert_eq!(&block[4..8], &MAGIC.to_le_bytes());
        assert_eq!(&block[8..12], &(BLOCK_SIZE as u32).to_le_bytes());
        assert_eq!(&block[12..16], &0xFFFF_FFF8u32.to_le_bytes());
        assert_eq!(&block[16..20], &1u32.to_le_bytes());
        // 根目录记录紧跟其后
        assert_eq!(&block[24..28], &ROOT_INODE_NO.to_le_bytes());
        assert!(block[36..].iter().all(|&b| b == 0));
    }

    #[test]
    fn allocation_is_lowest_free_and_skips_reserved() {
        let mut sb = SuperBlock::new(32, root());
        assert_eq!(sb.allocate_block().unwrap(), 3);
        assert_eq!(sb.allocate_block().unwrap(), 4);
        assert!(!sb.is_free(3));
        assert!(!sb.is_free(ROOT_DATA_BLOCK_ID));
        assert_eq!(sb.free_count(), 27);
    }

    #[test]
    fn small_device_exhausts_early() {
        let mut sb = SuperBlock::new(5, root());
        assert_eq!(sb.allocate_block().unwrap(), 3);
        assert_eq!(sb.allocate_block().unwrap(), 4);
        let err = sb.allocate_block().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(sb.free_blocks, 0);
    }

    #[test]
    fn load_round_trips_and_validates() {
        let sb = SuperBlock::new(32, root());
        let block = sb.encode().unwrap();
        assert_eq!(SuperBlock::load(&block).unwrap(), sb);

        let mut bad_magic = block.clone();
        bad_magic[4] ^= 0xFF;
        assert_eq!(
            SuperBlock::load(&bad_magic).unwrap_err().kind(),
            ErrorKind::CorruptSuperblock
        );

        let mut bad_size = block.clone();
        bad_size[8..12].copy_from_slice(&512u32.to_le_bytes());
        assert_eq!(
            SuperBlock::load(&bad_size).unwrap_err().kind(),
            ErrorKind::CorruptSuperblock
        );
    }

    #[test]
    fn zeroed_block_is_corrupt() {
        let block = [0u8; BLOCK_SIZE];
        assert_eq!(
            SuperBlock::load(&block).unwrap_err().kind(),
            ErrorKind::CorruptSuperblock
        );
    }
}
