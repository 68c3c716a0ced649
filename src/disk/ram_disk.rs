use std::{
    io::{Error, ErrorKind, Result},
    sync::{Arc, Mutex, MutexGuard},
};

use crate::disk::{
    block_device::BlockDevice,
    types::{Block, BLOCK_SIZE},
};

/// 内存盘：克隆出的句柄共享同一块缓冲区，
/// 方便“卸载后重新挂载同一设备”。
#[derive(Debug, Clone)]
pub struct RamDisk {
    inner: Arc<Mutex<Vec<u8>>>,
    num_blocks: u64,
}

impl RamDisk {
    pub fn new(num_blocks: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(vec![0u8; num_blocks as usize * BLOCK_SIZE])),
            num_blocks,
        }
    }

    /// 整个设备内容的拷贝
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(self.data()?.clone())
    }

    fn data(&self) -> Result<MutexGuard<'_, Vec<u8>>> {
        self.inner
            .lock()
            .map_err(|_| Error::new(ErrorKind::Other, "ram disk lock poisoned"))
    }

    fn range(&self, block_id: u64) -> Result<std::ops::Range<usize>> {
        if block_id >= self.num_blocks {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("block {} out of range", block_id),
            ));
        }
        let start = block_id as usize * BLOCK_SIZE;
        Ok(start..start + BLOCK_SIZE)
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: u64, buf: &mut Block) -> Result<()> {
        let range = self.range(block_id)?;
        buf.copy_from_slice(&self.data()?[range]);
        Ok(())
    }

    fn write_block(&self, block_id: u64, buf: &Block) -> Result<()> {
        let range = self.range(block_id)?;
        self.data()?[range].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn num_blocks(&self) -> u64 {
        self.num_blocks
    }
}
