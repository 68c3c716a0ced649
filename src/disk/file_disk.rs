use std::{
    fs::{File, OpenOptions},
    io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write},
    path::Path,
    sync::{Mutex, MutexGuard},
};

use crate::disk::{
    block_device::BlockDevice,
    types::{Block, BLOCK_SIZE},
};

/// 以镜像文件模拟的磁盘
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
    num_blocks: u64,
}

impl FileDisk {
    /// 打开（必要时创建）镜像文件，文件不足 `num_blocks` 块时扩展到该大小。
    /// 已存在且更大的镜像保持原大小。
    pub fn open(path: impl AsRef<Path>, num_blocks: u64) -> Result<Self> {
        let wanted = num_blocks.checked_mul(BLOCK_SIZE as u64).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("{} blocks exceed the addressable image size", num_blocks),
            )
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        if len < wanted {
            file.set_len(wanted)?;
        }

        Ok(Self {
            file: Mutex::new(file),
            num_blocks: len.max(wanted) / BLOCK_SIZE as u64,
        })
    }

    fn file(&self) -> Result<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| Error::new(ErrorKind::Other, "disk file lock poisoned"))
    }
}

impl BlockDevice for FileDisk {
    fn read_block(&self, block_id: u64, buf: &mut Block) -> Result<()> {
        let mut file = self.file()?;
        file.seek(SeekFrom::Start(block_id * BLOCK_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: u64, buf: &Block) -> Result<()> {
        let mut file = self.file()?;
        file.seek(SeekFrom::Start(block_id * BLOCK_SIZE as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut file = self.file()?;
        file.flush()?;
        file.sync_all()
    }

    fn num_blocks(&self) -> u64 {
        self.num_blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("lfs-file-disk-{}-{}.img", std::process::id(), name))
    }

    #[test]
    fn open_extends_small_image() {
        let path = image_path("extend");
        let _ = std::fs::remove_file(&path);

        let disk = FileDisk::open(&path, 8).unwrap();
        assert_eq!(disk.num_blocks(), 8);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            8 * BLOCK_SIZE as u64
        );

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn block_written_is_read_back() {
        let path = image_path("rw");
        let _ = std::fs::remove_file(&path);

        let disk = FileDisk::open(&path, 4).unwrap();
        let mut block: Block = [0; BLOCK_SIZE];
        block[0] = 0xAB;
        block[BLOCK_SIZE - 1] = 0xCD;
        disk.write_block(3, &block).unwrap();
        disk.flush().unwrap();

        let mut read: Block = [0; BLOCK_SIZE];
        disk.read_block(3, &mut read).unwrap();
        assert_eq!(read[0], 0xAB);
        assert_eq!(read[BLOCK_SIZE - 1], 0xCD);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn huge_block_count_is_rejected() {
        let path = image_path("huge");
        let _ = std::fs::remove_file(&path);

        let err = FileDisk::open(&path, u64::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(!path.exists());
    }

    #[test]
    fn larger_existing_image_is_not_shrunk() {
        let path = image_path("keep");
        let _ = std::fs::remove_file(&path);

        drop(FileDisk::open(&path, 16).unwrap());
        let disk = FileDisk::open(&path, 4).unwrap();
        assert_eq!(disk.num_blocks(), 16);

        std::fs::remove_file(&path).unwrap();
    }
}
