//! Line-oriented command loop.

use anyhow::Result;
use reget_core::{CommandHistory, DownloadManager, RegetError, TaskAction};
use reget_types::{Task, TaskStatus};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_BATCH: i64 = 50;

pub async fn run(manager: &DownloadManager, json: bool) -> Result<()> {
    let mut history = CommandHistory::new();

    println!("reget - resumable download manager. Commands:");
    println!("  add <url> <file>       start a new download");
    println!("  pause <id>             pause a download");
    println!("  resume <id>            resume a download");
    println!("  list [filter] [batch]  list tasks (all|running|paused|completed|error)");
    println!("  limit <bytes_per_sec>  set the global bandwidth cap (0 = unlimited)");
    println!("  undo                   undo the last pause/resume");
    println!("  redo                   redo the last undone pause/resume");
    println!("  history                show applied pause/resume actions");
    println!("  exit                   quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = parts.first() else {
            continue;
        };

        let result = match command.to_ascii_lowercase().as_str() {
            "add" => add(manager, &parts).await,
            "pause" | "resume" => toggle(manager, &mut history, command, &parts).await,
            "undo" => match history.undo(manager).await {
                Ok(Some(description)) => {
                    println!("Undone: {description}");
                    Ok(())
                }
                Ok(None) => {
                    println!("Nothing to undo");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            "redo" => match history.redo(manager).await {
                Ok(Some(description)) => {
                    println!("Redone: {description}");
                    Ok(())
                }
                Ok(None) => {
                    println!("Nothing to redo");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            "history" => {
                let entries = history.descriptions();
                if entries.is_empty() {
                    println!("History is empty");
                } else {
                    for (i, entry) in entries.iter().enumerate() {
                        println!("{}. {entry}", i + 1);
                    }
                }
                Ok(())
            }
            "list" => list(manager, &parts, json).await,
            "limit" => match parts.get(1).and_then(|s| s.parse::<i64>().ok()) {
                Some(bps) => {
                    manager.set_limit(bps);
                    println!("Limit set to {} B/s", manager.limit());
                    Ok(())
                }
                None => {
                    println!("Usage: limit <bytes_per_sec|0>");
                    Ok(())
                }
            },
            "exit" | "quit" => {
                manager.close().await;
                return Ok(());
            }
            _ => {
                println!("Unknown command");
                Ok(())
            }
        };

        if let Err(e) = result {
            eprintln!("Error: {e}");
        }
    }

    manager.close().await;
    Ok(())
}

async fn add(manager: &DownloadManager, parts: &[&str]) -> Result<(), RegetError> {
    let (Some(url), Some(file)) = (parts.get(1), parts.get(2)) else {
        println!("Usage: add <url> <file>");
        return Ok(());
    };
    let id = manager.add(url, &PathBuf::from(file)).await?;
    println!("Task created: #{id}");
    Ok(())
}

async fn toggle(
    manager: &DownloadManager,
    history: &mut CommandHistory,
    command: &str,
    parts: &[&str],
) -> Result<(), RegetError> {
    let Some(id) = parts.get(1).and_then(|s| s.parse::<i64>().ok()) else {
        println!("Usage: {command} <id>");
        return Ok(());
    };

    let action = if command.eq_ignore_ascii_case("pause") {
        TaskAction::pause(id)
    } else {
        TaskAction::resume(id)
    };
    let description = action.describe();
    history.execute(manager, action).await?;
    println!("Applied: {description}");
    Ok(())
}

async fn list(manager: &DownloadManager, parts: &[&str], json: bool) -> Result<(), RegetError> {
    let mode = parts.get(1).copied().unwrap_or("all").to_ascii_lowercase();
    let batch = parts
        .get(2)
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_BATCH);

    let status = match mode.as_str() {
        "running" => Some(TaskStatus::Running),
        "paused" => Some(TaskStatus::Paused),
        "completed" => Some(TaskStatus::Completed),
        "error" => Some(TaskStatus::Error),
        _ => None,
    };

    let pages = manager.pages(batch);
    match status {
        Some(wanted) => {
            let mut tasks = pages.filtered(move |t| t.status == wanted);
            while let Some(task) = tasks.next().await? {
                print_task(&task, json);
            }
        }
        None => {
            let mut tasks = pages;
            while let Some(task) = tasks.next().await? {
                print_task(&task, json);
            }
        }
    }
    Ok(())
}

fn print_task(task: &Task, json: bool) {
    if json {
        match serde_json::to_string(task) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    } else {
        println!(
            "#{} [{}] {} ({}/{}) -> {}",
            task.id,
            task.status,
            task.url,
            task.last_byte,
            task.total_bytes,
            task.target.display()
        );
    }
}
