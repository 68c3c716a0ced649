use std::{io::Result, sync::Arc};

use crate::disk::types::Block;

/// 块设备抽象：由宿主提供的原始块读写
/// 每次调用都读写一个完整的块，不存在部分写。
pub trait BlockDevice: Send + Sync {
    fn read_block(&self, block_id: u64, buf: &mut Block) -> Result<()>;
    fn write_block(&self, block_id: u64, buf: &Block) -> Result<()>;

    /// 持久化屏障：返回时之前完成的写入都已落盘
    fn flush(&self) -> Result<()>;

    /// 设备上可寻址的块数
    fn num_blocks(&self) -> u64;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &T {
    fn read_block(&self, block_id: u64, buf: &mut Block) -> Result<()> {
        (**self).read_block(block_id, buf)
    }

    fn write_block(&self, block_id: u64, buf: &Block) -> Result<()> {
        (**self).write_block(block_id, buf)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn num_blocks(&self) -> u64 {
        (**self).num_blocks()
    }
}

impl<T: BlockDevice + ?Sized> BlockDevice for Arc<T> {
    fn read_block(&self, block_id: u64, buf: &mut Block) -> Result<()> {
        (**self).read_block(block_id, buf)
    }

    fn write_block(&self, block_id: u64, buf: &Block) -> Result<()> {
        (**self).write_block(block_id, buf)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn num_blocks(&self) -> u64 {
        (**self).num_blocks()
    }
}
