use std::path::PathBuf;

use clap::Parser;
use lfs::disk::BLOCK_COUNT;

use crate::shell::start_shell;

mod shell;
mod utils;

/// 在 LFS 磁盘镜像上运行的交互式 shell
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// 磁盘镜像路径，不存在时会新建并格式化
    #[arg(short, long, env = "LFS_DISK", default_value = "disk.img")]
    disk: PathBuf,
    /// 新建镜像时的块数
    #[arg(short, long, default_value_t = BLOCK_COUNT as u64)]
    blocks: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_millis().init();
    let cli = Cli::parse();
    start_shell(cli.disk, cli.blocks)
}
