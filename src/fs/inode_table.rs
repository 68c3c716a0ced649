use bitflags::bitflags;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    disk::BlockDevice,
    fs::{
        config::{INODE_RECORD_SIZE, INODE_STORE_BLOCK_ID, INODE_STORE_CAPACITY, MAX_FILESYSTEM_OBJECTS},
        error::{FileSystemError, Result},
        journal::Transaction,
    },
};

bitflags! {
    /// 类型位 + 权限位，取值与 Unix `st_mode` 一致
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Mode: u32 {
        const TYPE_MASK = 0o170000;
        const DIRECTORY = 0o040000;
        const REGULAR = 0o100000;

        const OWNER_READ = 0o400;
        const OWNER_WRITE = 0o200;
        const OWNER_EXEC = 0o100;
        const GROUP_READ = 0o040;
        const GROUP_WRITE = 0o020;
        const GROUP_EXEC = 0o010;
        const OTHER_READ = 0o004;
        const OTHER_WRITE = 0o002;
        const OTHER_EXEC = 0o001;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    File,      // 普通文件
    Directory, // 目录
}

impl Mode {
    /// 只认普通文件和目录，其余类型返回 None
    pub fn file_type(self) -> Option<InodeType> {
        let kind = self.bits() & Self::TYPE_MASK.bits();
        if kind == Self::REGULAR.bits() {
            Some(InodeType::File)
        } else if kind == Self::DIRECTORY.bits() {
            Some(InodeType::Directory)
        } else {
            None
        }
    }

    pub fn permissions(self) -> u32 {
        self.bits() & 0o777
    }
}

/// inode 区中的一条记录，编码后正好 16 字节
///
/// `size` 对普通文件是文件长度，对目录是子项个数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodeRecord {
    pub mode: u32,
    pub inode_no: u32,
    pub data_block_no: u32,
    pub size: u32,
}

impl InodeRecord {
    pub fn new(mode: Mode, inode_no: u32, data_block_no: u32) -> Self {
        Self {
            mode: mode.bits(),
            inode_no,
            data_block_no,
            size: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        Mode::from_bits_retain(self.mode)
    }

    pub fn inode_type(&self) -> Option<InodeType> {
        self.mode().file_type()
    }

    pub fn is_dir(&self) -> bool {
        self.inode_type() == Some(InodeType::Directory)
    }

    pub fn is_file(&self) -> bool {
        self.inode_type() == Some(InodeType::File)
    }

    pub fn file_size(&self) -> u32 {
        self.size
    }

    pub fn children_count(&self) -> u32 {
        self.size
    }

    // inode_no 为 0 的槽位不是活跃 inode
    fn is_live(&self) -> bool {
        self.inode_no != 0
    }
}

/// inode 表可容纳的对象数
pub fn capacity() -> u32 {
    INODE_STORE_CAPACITY.min(MAX_FILESYSTEM_OBJECTS)
}

/// 块 1 中按分配顺序紧密排列的 inode 记录数组
///
/// 查找和更新都是对 `[0, count)` 的线性扫描，没有二级索引。
/// `count` 与超级块的 `inodes_count` 保持一致。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeTable {
    count: u32,
}

impl InodeTable {
    pub fn new(count: u32) -> Self {
        Self { count }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_full(&self) -> bool {
        self.count >= capacity()
    }

    /// 下一个要分配的 inode 编号，单调递增
    pub fn next_inode_no(&self) -> u32 {
        self.count + 1
    }

    /// 写到 `count` 号槽位并递增计数
    pub fn append<D: BlockDevice>(
        &mut self,
        tx: &mut Transaction<'_, D>,
        record: &InodeRecord,
    ) -> Result<()> {
        if self.is_full() {
            return Err(FileSystemError::InodeFull);
        }
        write_slot(tx, self.count, record)?;
        debug!("inode {} appended at slot {}", record.inode_no, self.count);
        self.count += 1;
        Ok(())
    }

    pub fn find<D: BlockDevice>(
        &self,
        tx: &mut Transaction<'_, D>,
        inode_no: u32,
    ) -> Result<InodeRecord> {
        self.locate(tx, inode_no).map(|(_, record)| record)
    }

    /// 原地覆盖已存在的记录；必须先 `append` 过
    pub fn save<D: BlockDevice>(
        &self,
        tx: &mut Transaction<'_, D>,
        record: &InodeRecord,
    ) -> Result<()> {
        let (slot, _) = self.locate(tx, record.inode_no)?;
        write_slot(tx, slot, record)
    }

    fn locate<D: BlockDevice>(
        &self,
        tx: &mut Transaction<'_, D>,
        inode_no: u32,
    ) -> Result<(u32, InodeRecord)> {
        if inode_no != 0 {
            let block = tx.read(INODE_STORE_BLOCK_ID)?;
            for slot in 0..self.count {
                let record = decode_slot(block, slot)?;
                if record.is_live() && record.inode_no == inode_no {
                    return Ok((slot, record));
                }
            }
        }
        Err(FileSystemError::NotFound(format!("inode {}", inode_no)))
    }
}

fn decode_slot(block: &[u8], slot: u32) -> Result<InodeRecord> {
    let offset = slot as usize * INODE_RECORD_SIZE;
    Ok(bincode::deserialize(&block[offset..offset + INODE_RECORD_SIZE])?)
}

fn write_slot<D: BlockDevice>(
    tx: &mut Transaction<'_, D>,
    slot: u32,
    record: &InodeRecord,
) -> Result<()> {
    let offset = slot as usize * INODE_RECORD_SIZE;
    let block = tx.block_mut(INODE_STORE_BLOCK_ID)?;
    bincode::serialize_into(&mut block[offset..offset + INODE_RECORD_SIZE], record)?;
    Ok(())
}
