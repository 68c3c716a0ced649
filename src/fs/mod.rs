//! 文件系统引擎
//!
//! 磁盘布局（块大小固定 4KB）：
//! - 块 0：超级块
//! - 块 1：inode 区
//! - 块 2：根目录数据块
//! - 块 3..N：数据块，由超级块中的空闲位图管理
//!
//! 三把锁的获取顺序固定为：目录结构锁 → inode 表锁 → 超级块锁。

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use log::{debug, error, info, warn};

use crate::disk::{BlockDevice, BLOCK_SIZE};

use self::{
    block_store::BlockStore,
    config::{
        INODE_STORE_BLOCK_ID, RESERVED_BLOCKS, ROOT_DATA_BLOCK_ID, ROOT_INODE_NO,
        SUPER_BLOCK_BLOCK_ID,
    },
    directory::ReadDir,
    inode_table::InodeTable,
    super_block::SuperBlock,
};

pub mod block_store;
pub mod config;
pub mod directory;
pub mod error;
pub mod inode_table;
pub mod journal;
pub mod super_block;

pub use directory::DirEntry;
pub use error::{ErrorKind, FileSystemError, Result};
pub use inode_table::{InodeRecord, InodeType, Mode};

/// `statfs` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    pub block_size: u32,
    pub total_blocks: u32, // 位图能跟踪的块数（含保留块）
    pub free_blocks: u32,
    pub inodes_count: u32,
    pub max_inodes: u32,
}

#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    store: BlockStore<D>,           // 底层块存储
    dir_lock: RwLock<()>,           // 目录项数组及子项计数
    inode_table: Mutex<InodeTable>, // inode 表
    super_block: Mutex<SuperBlock>, // 分配位图与对象计数
    stale: AtomicBool,              // 提交失败且未能重读超级块，内存状态不可信
}

impl<D: BlockDevice> FileSystem<D> {
    /// 写入初始超级块、根目录 inode 和空的根目录数据块
    pub fn format(device: &D) -> Result<()> {
        let store = BlockStore::new(device);
        let num_blocks = store.num_blocks();
        if num_blocks < RESERVED_BLOCKS as u64 {
            return Err(FileSystemError::InvalidArgument(format!(
                "device has {} blocks, at least {} required",
                num_blocks, RESERVED_BLOCKS
            )));
        }

        let root = InodeRecord::new(
            Mode::DIRECTORY | Mode::from_bits_retain(0o755),
            ROOT_INODE_NO,
            ROOT_DATA_BLOCK_ID,
        );
        let sb = SuperBlock::new(num_blocks, root);

        let mut tx = store.begin();
        tx.stage(SUPER_BLOCK_BLOCK_ID, sb.encode()?);
        tx.stage(INODE_STORE_BLOCK_ID, Box::new([0u8; BLOCK_SIZE]));
        tx.stage(ROOT_DATA_BLOCK_ID, Box::new([0u8; BLOCK_SIZE]));
        InodeTable::new(0).append(&mut tx, &root)?;
        tx.commit()?;

        info!(
            "formatted device: {} blocks, {} free",
            num_blocks,
            sb.free_count()
        );
        Ok(())
    }

    /// 校验超级块并加载根目录 inode。校验失败时不会写设备。
    pub fn mount(device: D) -> Result<Self> {
        let store = BlockStore::new(device);
        let sb = SuperBlock::load(&*store.read(SUPER_BLOCK_BLOCK_ID)?)?;
        let table = InodeTable::new(sb.inodes_count);

        let root = table.find(&mut store.begin(), ROOT_INODE_NO)?;
        if !root.is_dir() {
            return Err(FileSystemError::Corrupted(format!(
                "root inode has mode {:o}",
                root.mode
            )));
        }

        info!(
            "mounted: {} objects, {} free blocks, root has {} children",
            sb.inodes_count,
            sb.free_count(),
            root.children_count()
        );
        Ok(Self {
            store,
            dir_lock: RwLock::new(()),
            inode_table: Mutex::new(table),
            super_block: Mutex::new(sb),
            stale: AtomicBool::new(false),
        })
    }

    /// 刷盘后交还设备
    pub fn unmount(self) -> Result<D> {
        self.sync()?;
        info!("unmounted");
        Ok(self.store.into_inner())
    }

    pub fn root(&self) -> u32 {
        ROOT_INODE_NO
    }

    /// 在父目录中按名字查找，返回 inode 编号
    pub fn lookup(&self, parent: u32, name: &str) -> Result<u32> {
        let _dir = read_lock(&self.dir_lock)?;
        let table = lock(&self.inode_table)?;
        let mut tx = self.store.begin();

        let parent = self.find_dir(&table, &mut tx, parent)?;
        directory::find(&mut tx, &parent, name)?
            .ok_or_else(|| FileSystemError::NotFound(name.to_string()))
    }

    /// 新建文件或目录
    ///
    /// 分配数据块、追加 inode、追加目录项、递增父目录子项计数，
    /// 四步放在同一个事务里，只 flush 一次。
    pub fn create(&self, parent: u32, name: &str, mode: Mode) -> Result<InodeRecord> {
        if mode.file_type().is_none() {
            return Err(FileSystemError::InvalidArgument(format!(
                "mode {:o} is neither a regular file nor a directory",
                mode.bits()
            )));
        }
        directory::validate_name(name)?;

        let _dir = write_lock(&self.dir_lock)?;
        let mut table_guard = lock(&self.inode_table)?;
        let mut sb_guard = lock(&self.super_block)?;
        self.ensure_synced(&mut table_guard, &mut sb_guard)?;

        if table_guard.is_full() {
            return Err(FileSystemError::InodeFull);
        }

        let mut tx = self.store.begin();
        let mut parent = self.find_dir(&table_guard, &mut tx, parent)?;
        if directory::find(&mut tx, &parent, name)?.is_some() {
            return Err(FileSystemError::AlreadyExists(name.to_string()));
        }

        // 在副本上修改，提交成功后再替换
        let mut table = table_guard.clone();
        let mut sb = sb_guard.clone();

        let block_no = sb.allocate_block()?;
        tx.stage(block_no, Box::new([0u8; BLOCK_SIZE]));

        let inode = InodeRecord::new(mode, table.next_inode_no(), block_no);
        table.append(&mut tx, &inode)?;
        sb.inodes_count = table.count();

        directory::append_entry(&mut tx, &parent, name, inode.inode_no)?;
        parent.size += 1;
        table.save(&mut tx, &parent)?;
        if parent.inode_no == ROOT_INODE_NO {
            sb.root_inode = parent;
        }
        tx.stage(SUPER_BLOCK_BLOCK_ID, sb.encode()?);

        if let Err(e) = tx.commit() {
            self.stale.store(true, Ordering::SeqCst);
            if let Err(resync_err) = self.resync(&mut table_guard, &mut sb_guard) {
                error!(
                    "commit failed and superblock could not be re-read: {}",
                    resync_err
                );
            }
            return Err(e);
        }
        *table_guard = table;
        *sb_guard = sb;

        info!(
            "created {:?} as inode {} (block {}) in directory {}",
            name, inode.inode_no, block_no, parent.inode_no
        );
        Ok(inode)
    }

    pub fn mkdir(&self, parent: u32, name: &str) -> Result<InodeRecord> {
        self.create(parent, name, Mode::DIRECTORY | Mode::from_bits_retain(0o755))
    }

    /// 读取文件内容；偏移不小于文件长度时返回空
    pub fn read(&self, inode_no: u32, offset: usize, len: usize) -> Result<Vec<u8>> {
        let table = lock(&self.inode_table)?;
        let mut tx = self.store.begin();
        let inode = self.find_file(&table, &mut tx, inode_no)?;

        let size = inode.file_size() as usize;
        if size > BLOCK_SIZE {
            return Err(FileSystemError::Corrupted(format!(
                "inode {} claims {} bytes in one block",
                inode_no, size
            )));
        }
        if offset >= size {
            return Ok(Vec::new());
        }
        let end = size.min(offset.saturating_add(len));
        let block = tx.read(inode.data_block_no)?;
        Ok(block[offset..end].to_vec())
    }

    /// 数据块和新的文件长度在同一个事务里落盘
    pub fn write(&self, inode_no: u32, offset: usize, buf: &[u8]) -> Result<usize> {
        let table = lock(&self.inode_table)?;
        let mut tx = self.store.begin();
        let mut inode = self.find_file(&table, &mut tx, inode_no)?;

        let end = offset
            .checked_add(buf.len())
            .filter(|&end| end <= BLOCK_SIZE)
            .ok_or(FileSystemError::FileTooLarge {
                inode_no,
                end: offset.saturating_add(buf.len()),
            })?;
        if buf.is_empty() {
            return Ok(0);
        }

        tx.block_mut(inode.data_block_no)?[offset..end].copy_from_slice(buf);
        inode.size = inode.size.max(end as u32);
        table.save(&mut tx, &inode)?;
        tx.commit()?;

        debug!(
            "wrote {} bytes at {} to inode {}, size now {}",
            buf.len(),
            offset,
            inode_no,
            inode.size
        );
        Ok(buf.len())
    }

    /// 从 `offset` 开始枚举目录项
    pub fn readdir(&self, dir: u32, offset: u32) -> Result<ReadDir> {
        let _dir = read_lock(&self.dir_lock)?;
        let table = lock(&self.inode_table)?;
        let mut tx = self.store.begin();

        let dir = self.find_dir(&table, &mut tx, dir)?;
        Ok(directory::list(&mut tx, &dir, offset)?.into())
    }

    pub fn stat(&self, inode_no: u32) -> Result<InodeRecord> {
        let table = lock(&self.inode_table)?;
        table.find(&mut self.store.begin(), inode_no)
    }

    pub fn statfs(&self) -> Result<FsStat> {
        let sb = lock(&self.super_block)?;
        Ok(FsStat {
            block_size: sb.block_size,
            total_blocks: super_block::tracked_blocks(self.store.num_blocks()),
            free_blocks: sb.free_count(),
            inodes_count: sb.inodes_count,
            max_inodes: inode_table::capacity(),
        })
    }

    /// 重写超级块并 flush 设备
    pub fn sync(&self) -> Result<()> {
        let mut table = lock(&self.inode_table)?;
        let mut sb = lock(&self.super_block)?;
        self.ensure_synced(&mut table, &mut sb)?;
        let mut tx = self.store.begin();
        tx.stage(SUPER_BLOCK_BLOCK_ID, sb.encode()?);
        tx.commit()
    }

    fn find_dir(
        &self,
        table: &InodeTable,
        tx: &mut journal::Transaction<'_, D>,
        inode_no: u32,
    ) -> Result<InodeRecord> {
        let inode = table.find(tx, inode_no)?;
        if !inode.is_dir() {
            return Err(FileSystemError::NotADirectory(inode_no));
        }
        Ok(inode)
    }

    fn find_file(
        &self,
        table: &InodeTable,
        tx: &mut journal::Transaction<'_, D>,
        inode_no: u32,
    ) -> Result<InodeRecord> {
        let inode = table.find(tx, inode_no)?;
        if !inode.is_file() {
            return Err(FileSystemError::IsADirectory(inode_no));
        }
        Ok(inode)
    }

    // 上次重读失败时，分配或回写超级块之前必须先重读成功
    fn ensure_synced(&self, table: &mut InodeTable, sb: &mut SuperBlock) -> Result<()> {
        if self.stale.load(Ordering::SeqCst) {
            self.resync(table, sb)?;
        }
        Ok(())
    }

    // 提交失败时部分块可能已经写到设备上，按设备上的超级块重建内存状态
    fn resync(&self, table: &mut InodeTable, sb: &mut SuperBlock) -> Result<()> {
        let on_disk = SuperBlock::load(&*self.store.read(SUPER_BLOCK_BLOCK_ID)?)?;
        warn!(
            "resynced from device: {} objects, {} free blocks",
            on_disk.inodes_count,
            on_disk.free_count()
        );
        *table = InodeTable::new(on_disk.inodes_count);
        *sb = on_disk;
        self.stale.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| FileSystemError::Interrupted)
}

fn read_lock<T>(rw: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    rw.read().map_err(|_| FileSystemError::Interrupted)
}

fn write_lock<T>(rw: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    rw.write().map_err(|_| FileSystemError::Interrupted)
}
