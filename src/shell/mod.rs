pub mod boot;
pub mod command;
pub mod parse;

use crate::shell::{
    boot::{perform_disk_initialization, BootProgress},
    command::{execute_command, Command, Session},
    parse::parse_command,
};
use anyhow::anyhow;
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use lfs::{FileDisk, FileSystem};
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::{
    io::stdout,
    path::PathBuf,
    sync::mpsc,
    thread,
};

pub fn start_shell(disk_path: PathBuf, blocks: u64) -> anyhow::Result<()> {
    let fs = boot(disk_path.clone(), blocks)?;
    let mut session = Session::new(fs, disk_path);

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lfs_history");

    let mut line_editor = Reedline::create()
        .with_history(Box::new(FileBackedHistory::with_file(100, history_path)?));

    // 命令补全
    let commands = [
        "help", "ls", "pwd", "cd", "mkdir", "create", "read", "write", "stat", "df", "sync",
        "format", "exit",
    ];
    let completer =
        DefaultCompleter::new_with_wordlen(commands.iter().map(|c| c.to_string()).collect(), 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    loop {
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(format!(
                "{}:{}",
                format!("{}@{}", username, hostname).green(),
                session.cwd().blue()
            )),
            DefaultPromptSegment::Basic("LFS".bright_blue().bold().to_string()),
        );

        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut session) {
                            println!("{} {:#}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command. Type 'help' for command list.".yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting LFS...".yellow());
                break;
            }
            #[allow(unreachable_patterns)]
            Ok(_) => continue,
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    session.close()?;
    println!("{}", "GoodBye!".bright_yellow());
    Ok(())
}

/// 在后台线程打开并挂载磁盘，前台显示进度条
fn boot(disk_path: PathBuf, blocks: u64) -> anyhow::Result<FileSystem<FileDisk>> {
    let mut stdout = stdout();
    execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    println!("{}", "[LFS Booting...]".bright_yellow().bold());

    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || perform_disk_initialization(disk_path, blocks, tx));

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> "),
    );

    let mut mounted = None;
    for progress in rx {
        match progress {
            BootProgress::Step(step) => pb.set_message(step),
            BootProgress::Progress(pos) => pb.set_position(pos),
            BootProgress::Finished(result) => {
                mounted = Some(result);
                break;
            }
        }
    }
    worker
        .join()
        .map_err(|_| anyhow!("disk initialization thread panicked"))?;

    let fs = match mounted {
        Some(Ok(fs)) => fs,
        Some(Err(e)) => {
            pb.abandon_with_message("❌ Boot failed");
            return Err(e.into());
        }
        None => return Err(anyhow!("disk initialization ended without a result")),
    };
    pb.finish_with_message("✅ Ready!");

    execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print(format!("Welcome to LFS v{}\n", env!("CARGO_PKG_VERSION"))),
        ResetColor
    )?;
    Ok(fs)
}
