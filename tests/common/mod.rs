//! 集成测试共用的设备和辅助函数
#![allow(dead_code)]

use std::{
    io,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use lfs::{disk::Block, BlockDevice, FileSystem, RamDisk};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 格式化并挂载一个 32 块的内存盘，返回文件系统和设备句柄
pub fn mounted_ram_disk() -> (FileSystem<RamDisk>, RamDisk) {
    init_logger();
    let disk = RamDisk::new(32);
    FileSystem::format(&disk).unwrap();
    (FileSystem::mount(disk.clone()).unwrap(), disk)
}

/// 每个测试进程独享的镜像路径
pub fn image_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("lfs-it-{}-{}.img", std::process::id(), name))
}

/// 可以注入写失败或 flush 失败的设备
#[derive(Debug, Clone)]
pub struct FaultyDisk {
    inner: RamDisk,
    fail_writes: Arc<AtomicBool>,
    fail_flush: Arc<AtomicBool>,
    fail_superblock_reads: Arc<AtomicBool>,
}

impl FaultyDisk {
    pub fn new(num_blocks: u64) -> Self {
        Self {
            inner: RamDisk::new(num_blocks),
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_flush: Arc::new(AtomicBool::new(false)),
            fail_superblock_reads: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_flush(&self, on: bool) {
        self.fail_flush.store(on, Ordering::SeqCst);
    }

    /// 只让块 0 的读取失败
    pub fn fail_superblock_reads(&self, on: bool) {
        self.fail_superblock_reads.store(on, Ordering::SeqCst);
    }
}

impl BlockDevice for FaultyDisk {
    fn read_block(&self, block_id: u64, buf: &mut Block) -> io::Result<()> {
        if block_id == 0 && self.fail_superblock_reads.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
        }
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: u64, buf: &Block) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        self.inner.write_block(block_id, buf)
    }

    fn flush(&self) -> io::Result<()> {
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected flush failure"));
        }
        Ok(())
    }

    fn num_blocks(&self) -> u64 {
        self.inner.num_blocks()
    }
}
