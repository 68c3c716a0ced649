//! 格式化工具：在首次挂载前写入超级块、根目录 inode 和空的根目录块
use std::path::PathBuf;

use clap::Parser;
use lfs::{disk::BLOCK_COUNT, BlockDevice, FileDisk, FileSystem};

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about = "make a new LFS file system")]
struct MkfsArgs {
    /// the device or image file to format
    device: PathBuf,
    /// the block count used when the image has to be created or grown
    #[arg(short, long, default_value_t = BLOCK_COUNT as u64)]
    blocks: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_millis().init();
    let args = MkfsArgs::parse();

    let disk = FileDisk::open(&args.device, args.blocks)?;
    FileSystem::format(&disk)?;
    disk.flush()?;

    println!(
        "superblock written successfully ({} blocks on {})",
        disk.num_blocks(),
        args.device.display()
    );
    Ok(())
}
