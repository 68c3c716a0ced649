use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use lfs::{FileDisk, FileSystem, InodeType, Mode};

use crate::utils::{format_mode, split_parent, split_path};

#[derive(Debug)]
pub enum Command {
    Help,
    Ls(Option<String>),
    Pwd,
    Mkdir(String),
    Create(String),
    Cd(String),
    Read(String),
    Write(String, String),
    Stat(String),
    Df,
    Sync,
    Format,
    Exit,
}

/// shell 会话：已挂载的文件系统 + 当前目录
///
/// 文件系统没有父目录指针，当前目录保存为从根开始的 (名字, inode) 栈。
pub struct Session {
    fs: Option<FileSystem<FileDisk>>,
    disk_path: PathBuf,
    cwd: Vec<(String, u32)>,
}

impl Session {
    pub fn new(fs: FileSystem<FileDisk>, disk_path: PathBuf) -> Self {
        Self {
            fs: Some(fs),
            disk_path,
            cwd: Vec::new(),
        }
    }

    pub fn cwd(&self) -> String {
        if self.cwd.is_empty() {
            return "/".to_string();
        }
        self.cwd.iter().fold(String::new(), |mut path, (name, _)| {
            path.push('/');
            path.push_str(name);
            path
        })
    }

    /// 卸载并交还设备
    pub fn close(mut self) -> anyhow::Result<()> {
        if let Some(fs) = self.fs.take() {
            fs.unmount()?;
        }
        Ok(())
    }

    fn fs(&self) -> anyhow::Result<&FileSystem<FileDisk>> {
        self.fs
            .as_ref()
            .ok_or_else(|| anyhow!("file system is not mounted"))
    }

    // 逐级 lookup，返回走过的 (名字, inode) 栈
    fn walk(&self, path: &str) -> anyhow::Result<Vec<(String, u32)>> {
        let fs = self.fs()?;
        let mut stack = if path.starts_with('/') {
            Vec::new()
        } else {
            self.cwd.clone()
        };

        for part in split_path(path) {
            if part == ".." {
                stack.pop();
                continue;
            }
            let parent = stack.last().map(|(_, ino)| *ino).unwrap_or(fs.root());
            let ino = fs
                .lookup(parent, part)
                .with_context(|| format!("cannot resolve '{}'", path))?;
            stack.push((part.to_string(), ino));
        }
        Ok(stack)
    }

    fn resolve(&self, path: &str) -> anyhow::Result<u32> {
        let root = self.fs()?.root();
        Ok(self.walk(path)?.last().map(|(_, ino)| *ino).unwrap_or(root))
    }

    fn resolve_parent<'p>(&self, path: &'p str) -> anyhow::Result<(u32, &'p str)> {
        let (dir, name) =
            split_parent(path).ok_or_else(|| anyhow!("'{}' does not name an entry", path))?;
        let parent = if dir.is_empty() {
            self.resolve(".")?
        } else {
            self.resolve(dir)?
        };
        Ok((parent, name))
    }
}

pub fn execute_command(cmd: &Command, session: &mut Session) -> anyhow::Result<()> {
    match cmd {
        Command::Help => print_help(),
        Command::Ls(path) => list(session, path.as_deref().unwrap_or("."))?,
        Command::Pwd => println!("📍 {}", session.cwd().cyan()),
        Command::Mkdir(path) => {
            let (parent, name) = session.resolve_parent(path)?;
            let inode = session.fs()?.mkdir(parent, name)?;
            println!(
                "✅ Created directory: {} (inode {})",
                path.green(),
                inode.inode_no
            );
        }
        Command::Create(path) => {
            let (parent, name) = session.resolve_parent(path)?;
            let mode = Mode::REGULAR | Mode::from_bits_retain(0o644);
            let inode = session.fs()?.create(parent, name, mode)?;
            println!("📝 Created file: {} (inode {})", path.green(), inode.inode_no);
        }
        Command::Cd(path) => {
            let stack = session.walk(path)?;
            let target = stack
                .last()
                .map(|(_, ino)| *ino)
                .unwrap_or(session.fs()?.root());
            if !session.fs()?.stat(target)?.is_dir() {
                bail!("'{}' is not a directory", path);
            }
            session.cwd = stack;
            println!("📂 Moved to {}", session.cwd().blue());
        }
        Command::Read(path) => {
            let fs = session.fs()?;
            let ino = session.resolve(path)?;
            let size = fs.stat(ino)?.file_size() as usize;
            let data = fs.read(ino, 0, size)?;
            println!("{}", String::from_utf8_lossy(&data));
        }
        Command::Write(path, content) => {
            let fs = session.fs()?;
            let ino = match session.resolve(path) {
                Ok(ino) => ino,
                Err(_) => {
                    let (parent, name) = session.resolve_parent(path)?;
                    let mode = Mode::REGULAR | Mode::from_bits_retain(0o644);
                    fs.create(parent, name, mode)?.inode_no
                }
            };
            let written = fs.write(ino, 0, content.as_bytes())?;
            println!("✏️  Wrote {} bytes to {}", written, path.cyan());
            let size = fs.stat(ino)?.file_size() as usize;
            if size > written {
                println!(
                    "{}",
                    format!("   file is still {} bytes, the old tail was kept", size).bright_black()
                );
            }
        }
        Command::Stat(path) => {
            let ino = session.resolve(path)?;
            let inode = session.fs()?.stat(ino)?;
            let (kind, size_label) = match inode.inode_type() {
                Some(InodeType::Directory) => ("Directory", "Entries"),
                _ => ("File", "Size"),
            };
            println!(
                "{}\n{}: {}\n{}: {}\n{}: {}\n{}: {}\n{}: {}\n",
                "📊 File Info".bright_yellow().bold(),
                "Name".blue(),
                path,
                "Type".blue(),
                kind,
                "Mode".blue(),
                format_mode(inode.mode()),
                "Inode / Block".blue(),
                format!("{} / {}", inode.inode_no, inode.data_block_no),
                size_label.blue(),
                inode.size
            );
        }
        Command::Df => {
            let stat = session.fs()?.statfs()?;
            println!(
                "{}\n  block size : {}\n  blocks     : {} free of {}\n  objects    : {} of {}",
                "💽 Disk usage".bright_yellow().bold(),
                stat.block_size,
                stat.free_blocks,
                stat.total_blocks,
                stat.inodes_count,
                stat.max_inodes
            );
        }
        Command::Sync => {
            session.fs()?.sync()?;
            println!("{}", "💾 Synced to disk".green());
        }
        Command::Format => format(session)?,
        Command::Exit => println!("{}", "👋 Exiting LFS shell...".yellow().bold()),
    }

    Ok(())
}

fn list(session: &Session, path: &str) -> anyhow::Result<()> {
    let fs = session.fs()?;
    let dir = session.resolve(path)?;

    let mut entries = Vec::new();
    for entry in fs.readdir(dir, 0)? {
        let inode = fs.stat(entry.inode_no)?;
        entries.push((entry.name, inode));
    }
    // 目录在前，其余按名字排序
    entries.sort_by(|(a_name, a), (b_name, b)| {
        b.is_dir().cmp(&a.is_dir()).then_with(|| a_name.cmp(b_name))
    });

    for (name, inode) in entries {
        if inode.is_dir() {
            println!("📁  {}", name.blue().bold());
        } else {
            println!(
                "📄  {} {}",
                name,
                format!("({} bytes)", inode.file_size()).bright_black()
            );
        }
    }
    Ok(())
}

fn format(session: &mut Session) -> anyhow::Result<()> {
    let confirmed = Confirm::new()
        .with_prompt("This erases every file on the disk. Continue?")
        .default(false)
        .interact()?;
    if !confirmed {
        println!("{}", "Format cancelled".yellow());
        return Ok(());
    }

    let pb = ProgressBar::new(3);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.green/black}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    pb.set_message("unmounting");
    let fs = session
        .fs
        .take()
        .ok_or_else(|| anyhow!("file system is not mounted"))?;
    let disk = fs.unmount()?;
    pb.inc(1);

    pb.set_message("formatting");
    FileSystem::format(&disk)?;
    pb.inc(1);

    pb.set_message("mounting");
    session.fs = Some(FileSystem::mount(disk)?);
    session.cwd.clear();
    pb.inc(1);

    pb.finish_with_message(format!(
        "✅ {} formatted successfully!",
        session.disk_path.display()
    ));
    Ok(())
}

fn print_help() {
    println!("{}", "📘 LFS Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  ls [dir]           List entries of a directory
  pwd                Print current path
  cd [dir]           Change directory (defaults to /)
  mkdir <dir>        Create directory
  create <file>      Create empty file
  read <file>        Read file content
  write <file> <str> Overwrite from offset 0 (creates it if missing);
                     bytes past the new text are kept, files never shrink
  stat <path>        Show inode info
  df                 Show free blocks and object count
  sync               Flush the superblock to disk
  format             Format the disk image
  help               Show this help message
  exit               Quit the shell
"
        .bright_black()
    );
}
