use std::io::{Error, ErrorKind};

use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::{error::Result, journal::Transaction},
};

/// 块存储层：在块设备之上按块号读写整块，
/// 并把设备错误统一成 `FileSystemError::Io`。
#[derive(Debug)]
pub struct BlockStore<D> {
    device: D,
}

impl<D: BlockDevice> BlockStore<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    pub fn num_blocks(&self) -> u64 {
        self.device.num_blocks()
    }

    pub fn read(&self, block_no: u32) -> Result<Box<Block>> {
        self.check(block_no)?;
        let mut block = Box::new([0u8; BLOCK_SIZE]);
        self.device.read_block(block_no as u64, &mut block)?;
        Ok(block)
    }

    pub fn write(&self, block_no: u32, block: &Block) -> Result<()> {
        self.check(block_no)?;
        self.device.write_block(block_no as u64, block)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.device.flush()?;
        Ok(())
    }

    /// 开启一个事务，所有修改先落在内存副本上，提交时统一写回
    pub fn begin(&self) -> Transaction<'_, D> {
        Transaction::new(self)
    }

    pub fn into_inner(self) -> D {
        self.device
    }

    fn check(&self, block_no: u32) -> Result<()> {
        if block_no as u64 >= self.device.num_blocks() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "block {} outside device of {} blocks",
                    block_no,
                    self.device.num_blocks()
                ),
            )
            .into());
        }
        Ok(())
    }
}
