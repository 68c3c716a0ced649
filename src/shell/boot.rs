use std::{path::PathBuf, sync::mpsc::Sender};

use lfs::{fs::Result, FileDisk, FileSystem};
use log::info;

/// 初始化线程发回给 shell 的启动进度
pub enum BootProgress {
    Step(&'static str),
    Progress(u64),
    Finished(Result<FileSystem<FileDisk>>),
}

pub fn perform_disk_initialization(disk_path: PathBuf, blocks: u64, tx: Sender<BootProgress>) {
    let _ = tx.send(BootProgress::Step("🧠 Initializing virtual disk..."));

    let disk_exists = disk_path.exists();

    // 初始化 FileDisk
    let disk = match FileDisk::open(&disk_path, blocks) {
        Ok(d) => d,
        Err(e) => {
            let _ = tx.send(BootProgress::Finished(Err(e.into())));
            return;
        }
    };
    let _ = tx.send(BootProgress::Progress(30));

    if !disk_exists {
        // 只有“明确是新磁盘”才格式化
        let _ = tx.send(BootProgress::Step(
            "🔧 No disk found, formatting new file system...",
        ));
        if let Err(e) = FileSystem::format(&disk) {
            let _ = tx.send(BootProgress::Finished(Err(e)));
            return;
        }
        info!("formatted new image {}", disk_path.display());
    }
    let _ = tx.send(BootProgress::Progress(60));

    // 不论是否新盘，最终都要 mount
    let _ = tx.send(BootProgress::Step("⚙️  Mounting file system..."));
    let result = FileSystem::mount(disk);
    let _ = tx.send(BootProgress::Progress(100));
    let _ = tx.send(BootProgress::Finished(result));
}
