//! 事务写：一次逻辑修改涉及的所有块先在内存里改好，
//! `commit` 时按固定顺序写回并只做一次 flush。
//!
//! 写回顺序：数据块（含目录块）→ 超级块 → inode 区。
//! inode 区最后写，是整个事务的提交点；在它之前崩溃，
//! 最多泄漏一个已分配的块，或在 `[0, inodes_count)` 内留下一条全零记录，
//! 不会出现指向未写入 inode 的目录项或子项计数。

use std::collections::{btree_map::Entry, BTreeMap};

use log::debug;

use crate::{
    disk::{Block, BlockDevice},
    fs::{
        block_store::BlockStore,
        config::{INODE_STORE_BLOCK_ID, SUPER_BLOCK_BLOCK_ID},
        error::Result,
    },
};

#[derive(Debug)]
struct Staged {
    block: Box<Block>,
    dirty: bool,
}

#[derive(Debug)]
pub struct Transaction<'a, D> {
    store: &'a BlockStore<D>,
    staged: BTreeMap<u32, Staged>,
}

impl<'a, D: BlockDevice> Transaction<'a, D> {
    pub(crate) fn new(store: &'a BlockStore<D>) -> Self {
        Self {
            store,
            staged: BTreeMap::new(),
        }
    }

    /// 读一个块，能看到本事务里尚未提交的修改
    pub fn read(&mut self, block_no: u32) -> Result<&Block> {
        Ok(&*self.entry(block_no)?.block)
    }

    /// 取块的可变副本，并把它标记为脏
    pub fn block_mut(&mut self, block_no: u32) -> Result<&mut Block> {
        let staged = self.entry(block_no)?;
        staged.dirty = true;
        Ok(&mut *staged.block)
    }

    /// 整块覆盖，不需要先读旧内容
    pub fn stage(&mut self, block_no: u32, block: Box<Block>) {
        self.staged.insert(block_no, Staged { block, dirty: true });
    }

    pub fn is_dirty(&self) -> bool {
        self.staged.values().any(|s| s.dirty)
    }

    /// 按顺序写回所有脏块并 flush。任何一步失败，事务即被丢弃。
    pub fn commit(self) -> Result<()> {
        let mut dirty: Vec<(u32, Box<Block>)> = self
            .staged
            .into_iter()
            .filter(|(_, s)| s.dirty)
            .map(|(no, s)| (no, s.block))
            .collect();
        if dirty.is_empty() {
            return Ok(());
        }
        dirty.sort_by_key(|(no, _)| (commit_rank(*no), *no));

        for (block_no, block) in &dirty {
            self.store.write(*block_no, block)?;
        }
        self.store.flush()?;

        debug!(
            "committed blocks {:?}",
            dirty.iter().map(|(no, _)| *no).collect::<Vec<_>>()
        );
        Ok(())
    }

    fn entry(&mut self, block_no: u32) -> Result<&mut Staged> {
        match self.staged.entry(block_no) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let block = self.store.read(block_no)?;
                Ok(e.insert(Staged {
                    block,
                    dirty: false,
                }))
            }
        }
    }
}

fn commit_rank(block_no: u32) -> u8 {
    match block_no {
        SUPER_BLOCK_BLOCK_ID => 1,
        INODE_STORE_BLOCK_ID => 2,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Mutex,
        },
    };

    use super::*;
    use crate::{
        disk::{RamDisk, BLOCK_SIZE},
        fs::error::ErrorKind,
    };

    // 记录写入顺序和 flush 次数的设备
    #[derive(Default)]
    struct RecordingDisk {
        inner: Option<RamDisk>,
        writes: Mutex<Vec<u64>>,
        flushes: AtomicUsize,
        fail_flush: AtomicBool,
    }

    impl RecordingDisk {
        fn new(blocks: u64) -> Self {
            Self {
                inner: Some(RamDisk::new(blocks)),
                ..Default::default()
            }
        }

        fn disk(&self) -> &RamDisk {
            self.inner.as_ref().unwrap()
        }
    }

    impl BlockDevice for RecordingDisk {
        fn read_block(&self, block_id: u64, buf: &mut Block) -> io::Result<()> {
            self.disk().read_block(block_id, buf)
        }

        fn write_block(&self, block_id: u64, buf: &Block) -> io::Result<()> {
            self.writes.lock().unwrap().push(block_id);
            self.disk().write_block(block_id, buf)
        }

        fn flush(&self) -> io::Result<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            if self.fail_flush.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "flush failed"));
            }
            Ok(())
        }

        fn num_blocks(&self) -> u64 {
            self.disk().num_blocks()
        }
    }

    #[test]
    fn commit_orders_data_then_superblock_then_inode_store() {
        let store = BlockStore::new(RecordingDisk::new(8));
        let mut tx = store.begin();
        tx.stage(INODE_STORE_BLOCK_ID, Box::new([1; BLOCK_SIZE]));
        tx.stage(SUPER_BLOCK_BLOCK_ID, Box::new([2; BLOCK_SIZE]));
        tx.stage(5, Box::new([3; BLOCK_SIZE]));
        tx.block_mut(2).unwrap()[0] = 4;
        tx.commit().unwrap();

        let device = store.into_inner();
        assert_eq!(*device.writes.lock().unwrap(), vec![2, 5, 0, 1]);
        assert_eq!(device.flushes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reads_see_staged_writes_and_are_not_written_back() {
        let store = BlockStore::new(RecordingDisk::new(8));
        let mut tx = store.begin();
        tx.block_mut(3).unwrap()[10] = 0xEE;
        assert_eq!(tx.read(3).unwrap()[10], 0xEE);
        tx.read(4).unwrap();
        tx.commit().unwrap();

        assert_eq!(*store.into_inner().writes.lock().unwrap(), vec![3]);
    }

    #[test]
    fn dropped_transaction_writes_nothing() {
        let store = BlockStore::new(RecordingDisk::new(8));
        {
            let mut tx = store.begin();
            tx.block_mut(3).unwrap()[0] = 1;
            assert!(tx.is_dirty());
        }
        assert_eq!(store.read(3).unwrap()[0], 0);
        assert!(store.into_inner().writes.lock().unwrap().is_empty());
    }

    #[test]
    fn clean_transaction_skips_flush() {
        let store = BlockStore::new(RecordingDisk::new(8));
        let mut tx = store.begin();
        tx.read(1).unwrap();
        tx.commit().unwrap();
        assert_eq!(store.into_inner().flushes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_flush_fails_commit() {
        let disk = RecordingDisk::new(8);
        disk.fail_flush.store(true, Ordering::SeqCst);
        let store = BlockStore::new(disk);

        let mut tx = store.begin();
        tx.stage(3, Box::new([9; BLOCK_SIZE]));
        let err = tx.commit().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
