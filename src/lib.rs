//! LFS：一个运行在定长块设备上的极简持久化层级文件系统。
//!
//! - [`disk`]：块设备抽象与两个实现（镜像文件、内存盘）
//! - [`fs`]：超级块、inode 表、目录项、事务写以及对外的 [`FileSystem`] 引擎
//!
//! 把文件系统注册到宿主 VFS、解析路径的胶水代码不在本 crate 内，
//! 宿主只需调用 `format` / `mount` / `lookup` / `create` / `read` / `write` / `readdir` / `sync`。

pub mod disk;
pub mod fs;

pub use disk::{BlockDevice, FileDisk, RamDisk};
pub use fs::{DirEntry, ErrorKind, FileSystem, FileSystemError, InodeRecord, InodeType, Mode};
