use std::fmt;

/// 宿主框架据此翻译成自己的 I/O 错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CorruptSuperblock,
    ResourceExhausted,
    NotFound,
    AlreadyExists,
    NotADirectory,
    InvalidArgument,
    Io,
    Interrupted,
    Corrupted,
}

/// 文件系统错误类型
#[derive(Debug)]
pub enum FileSystemError {
    Io(std::io::Error),                            // 底层 I/O 错误
    CorruptSuperblock(String),                     // 超级块校验失败
    DiskFull,                                      // 没有空闲数据块
    InodeFull,                                     // inode 区已满
    DirectoryFull(u32),                            // 目录数据块已写满
    FileTooLarge { inode_no: u32, end: usize },    // 超出单个数据块
    NotFound(String),                              // 文件、目录或 inode 不存在
    AlreadyExists(String),                         // 同名目录项已存在
    NotADirectory(u32),                            // 期望目录，实际不是
    IsADirectory(u32),                             // 期望文件，实际是目录
    InvalidArgument(String),                       // 参数非法（mode、文件名）
    Corrupted(String),                             // 记录无法解码
    Interrupted,                                   // 等锁被打断（锁已中毒）
}

impl FileSystemError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::CorruptSuperblock(_) => ErrorKind::CorruptSuperblock,
            Self::DiskFull | Self::InodeFull | Self::DirectoryFull(_) | Self::FileTooLarge { .. } => {
                ErrorKind::ResourceExhausted
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::NotADirectory(_) => ErrorKind::NotADirectory,
            Self::IsADirectory(_) | Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Corrupted(_) => ErrorKind::Corrupted,
            Self::Interrupted => ErrorKind::Interrupted,
        }
    }
}

impl From<std::io::Error> for FileSystemError {
    fn from(e: std::io::Error) -> Self {
        FileSystemError::Io(e)
    }
}

impl From<bincode::Error> for FileSystemError {
    fn from(e: bincode::Error) -> Self {
        match *e {
            bincode::ErrorKind::Io(io) => FileSystemError::Io(io),
            other => FileSystemError::Corrupted(other.to_string()),
        }
    }
}

// 实现 Display trait，用于打印错误信息
impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Disk I/O error: {}", e),
            Self::CorruptSuperblock(desc) => write!(f, "Corrupt superblock: {}", desc),
            Self::DiskFull => write!(f, "No free data block available"),
            Self::InodeFull => write!(f, "Maximum number of filesystem objects reached"),
            Self::DirectoryFull(inode) => write!(f, "Directory {} has no room for entries", inode),
            Self::FileTooLarge { inode_no, end } => write!(
                f,
                "Write up to byte {} does not fit in the data block of inode {}",
                end, inode_no
            ),
            Self::NotFound(what) => write!(f, "Not found: {}", what),
            Self::AlreadyExists(name) => write!(f, "File or directory already exists: {}", name),
            Self::NotADirectory(inode) => write!(f, "Inode {} is not a directory", inode),
            Self::IsADirectory(inode) => write!(f, "Inode {} is a directory", inode),
            Self::InvalidArgument(desc) => write!(f, "Invalid argument: {}", desc),
            Self::Corrupted(desc) => write!(f, "File system corrupted: {}", desc),
            Self::Interrupted => write!(f, "Lock acquisition interrupted"),
        }
    }
}

// 支持链式错误，方便追踪底层原因
impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
