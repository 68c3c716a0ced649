use serde::{Deserialize, Serialize};

use crate::{
    disk::BlockDevice,
    fs::{
        config::{DIR_ENTRY_CAPACITY, DIR_ENTRY_SIZE, FILENAME_MAX_LEN},
        error::{FileSystemError, Result},
        inode_table::InodeRecord,
        journal::Transaction,
    },
};

// 磁盘上的目录项：定长文件名（NUL 填充）+ inode 编号
#[derive(Debug, Serialize, Deserialize)]
struct RawDirEntry {
    #[serde(with = "filename_bytes")]
    filename: [u8; FILENAME_MAX_LEN],
    inode_no: u32,
}

/// 一个目录项
///
/// `offset` 是紧随其后的位置，把它传回 `readdir` 即可从下一项继续枚举。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inode_no: u32,
    pub offset: u32,
}

/// `readdir` 返回的有限序列，数据在创建时已全部解码
#[derive(Debug)]
pub struct ReadDir {
    entries: std::vec::IntoIter<DirEntry>,
}

impl Iterator for ReadDir {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for ReadDir {}

impl From<Vec<DirEntry>> for ReadDir {
    fn from(entries: Vec<DirEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

/// 文件名校验：非空、不超过 255 字节、不含 `/` 和 NUL，且不是 `.` / `..`
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(FileSystemError::InvalidArgument(format!(
            "invalid file name {:?}",
            name
        )));
    }
    if name.len() > FILENAME_MAX_LEN {
        return Err(FileSystemError::InvalidArgument(format!(
            "file name longer than {} bytes",
            FILENAME_MAX_LEN
        )));
    }
    if name.bytes().any(|b| b == b'/' || b == 0) {
        return Err(FileSystemError::InvalidArgument(format!(
            "file name {:?} contains '/' or NUL",
            name
        )));
    }
    Ok(())
}

/// 从 `start` 开始按顺序解码目录数据块中的前 `children_count` 项
pub fn list<D: BlockDevice>(
    tx: &mut Transaction<'_, D>,
    dir: &InodeRecord,
    start: u32,
) -> Result<Vec<DirEntry>> {
    let count = dir.children_count();
    if count > DIR_ENTRY_CAPACITY {
        return Err(FileSystemError::Corrupted(format!(
            "directory {} claims {} entries",
            dir.inode_no, count
        )));
    }

    let block = tx.read(dir.data_block_no)?;
    (start.min(count)..count)
        .map(|index| {
            let offset = index as usize * DIR_ENTRY_SIZE;
            let raw: RawDirEntry = bincode::deserialize(&block[offset..offset + DIR_ENTRY_SIZE])?;
            Ok(DirEntry {
                name: decode_name(&raw.filename),
                inode_no: raw.inode_no,
                offset: index + 1,
            })
        })
        .collect()
}

/// 线性查找同名项，返回其 inode 编号
pub fn find<D: BlockDevice>(
    tx: &mut Transaction<'_, D>,
    dir: &InodeRecord,
    name: &str,
) -> Result<Option<u32>> {
    Ok(list(tx, dir, 0)?
        .into_iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.inode_no))
}

/// 在 `children_count` 位置写入一项。
/// 不修改子项计数，调用方负责递增并通过 `InodeTable::save` 保存。
pub fn append_entry<D: BlockDevice>(
    tx: &mut Transaction<'_, D>,
    dir: &InodeRecord,
    name: &str,
    inode_no: u32,
) -> Result<()> {
    validate_name(name)?;
    let index = dir.children_count();
    if index >= DIR_ENTRY_CAPACITY {
        return Err(FileSystemError::DirectoryFull(dir.inode_no));
    }

    let mut filename = [0u8; FILENAME_MAX_LEN];
    filename[..name.len()].copy_from_slice(name.as_bytes());
    let raw = RawDirEntry { filename, inode_no };

    let offset = index as usize * DIR_ENTRY_SIZE;
    let block = tx.block_mut(dir.data_block_no)?;
    bincode::serialize_into(&mut block[offset..offset + DIR_ENTRY_SIZE], &raw)?;
    Ok(())
}

fn decode_name(filename: &[u8]) -> String {
    let len = filename.iter().position(|&b| b == 0).unwrap_or(filename.len());
    String::from_utf8_lossy(&filename[..len]).into_owned()
}

// serde 的数组实现只到 32 个元素，文件名按定长元组编码
mod filename_bytes {
    use std::fmt;

    use serde::{
        de::{self, SeqAccess, Visitor},
        ser::SerializeTuple,
        Deserializer, Serializer,
    };

    use crate::fs::config::FILENAME_MAX_LEN;

    pub fn serialize<S: Serializer>(
        filename: &[u8; FILENAME_MAX_LEN],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(FILENAME_MAX_LEN)?;
        for byte in filename {
            tuple.serialize_element(byte)?;
        }
        tuple.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; FILENAME_MAX_LEN], D::Error> {
        struct FilenameVisitor;

        impl<'de> Visitor<'de> for FilenameVisitor {
            type Value = [u8; FILENAME_MAX_LEN];

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{} filename bytes", FILENAME_MAX_LEN)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut filename = [0u8; FILENAME_MAX_LEN];
                for (i, byte) in filename.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                Ok(filename)
            }
        }

        deserializer.deserialize_tuple(FILENAME_MAX_LEN, FilenameVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        disk::RamDisk,
        fs::{block_store::BlockStore, error::ErrorKind, inode_table::Mode},
    };

    fn dir(children: u32) -> InodeRecord {
        let mut record = InodeRecord::new(Mode::DIRECTORY, 1, 2);
        record.size = children;
        record
    }

    #[test]
    fn entry_is_fixed_size() {
        let raw = RawDirEntry {
            filename: [b'x'; FILENAME_MAX_LEN],
            inode_no: 9,
        };
        let bytes = bincode::serialize(&raw).unwrap();
        assert_eq!(bytes.len(), DIR_ENTRY_SIZE);
        assert_eq!(&bytes[FILENAME_MAX_LEN..], &9u32.to_le_bytes());
    }

    #[test]
    fn list_reads_exactly_children_count() {
        let store = BlockStore::new(RamDisk::new(4));
        let mut tx = store.begin();
        append_entry(&mut tx, &dir(0), "a", 2).unwrap();
        append_entry(&mut tx, &dir(1), "b", 3).unwrap();
        append_entry(&mut tx, &dir(2), "c", 4).unwrap();

        // 第三项已写入但计数只有 2，不可见
        let names: Vec<_> = list(&mut tx, &dir(2), 0)
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.inode_no, e.offset))
            .collect();
        assert_eq!(names, vec![("a".to_string(), 2, 1), ("b".to_string(), 3, 2)]);

        let rest = list(&mut tx, &dir(3), 2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, "c");
        assert!(list(&mut tx, &dir(3), 10).unwrap().is_empty());
    }

    #[test]
    fn find_by_name() {
        let store = BlockStore::new(RamDisk::new(4));
        let mut tx = store.begin();
        append_entry(&mut tx, &dir(0), "notes.txt", 5).unwrap();

        assert_eq!(find(&mut tx, &dir(1), "notes.txt").unwrap(), Some(5));
        assert_eq!(find(&mut tx, &dir(1), "notes").unwrap(), None);
    }

    #[test]
    fn longest_name_round_trips() {
        let store = BlockStore::new(RamDisk::new(4));
        let mut tx = store.begin();
        let name = "n".repeat(FILENAME_MAX_LEN);
        append_entry(&mut tx, &dir(0), &name, 2).unwrap();
        assert_eq!(list(&mut tx, &dir(1), 0).unwrap()[0].name, name);
    }

    #[test]
    fn full_directory_is_rejected() {
        let store = BlockStore::new(RamDisk::new(4));
        let mut tx = store.begin();
        let err = append_entry(&mut tx, &dir(DIR_ENTRY_CAPACITY), "late", 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn bad_names() {
        for name in ["", ".", "..", "a/b", "nul\0byte"] {
            assert_eq!(
                validate_name(name).unwrap_err().kind(),
                ErrorKind::InvalidArgument,
                "{:?}",
                name
            );
        }
        let too_long = "x".repeat(FILENAME_MAX_LEN + 1);
        assert_eq!(
            validate_name(&too_long).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert!(validate_name("hello.txt").is_ok());
    }
}
