use crate::scanner::{Action, Plan};
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SEPARATOR: &str =
    "===================================================================================================";
pub const UNCHANGED_HEADER: &str = "The following file has NO CHANGE:";
pub const RENAME_HEADER: &str = "The following file will RENAME:";
pub const DELETE_HEADER: &str = "The following file will DELETE:";

#[derive(Debug, Error)]
#[error("无法写入审计日志 {}: {source}", path.display())]
pub struct AuditError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// 日志文件名，如 log/2024-05-01_13-45-09.log
pub fn log_path(dir: &Path, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("{}.log", at.format("%Y-%m-%d_%H-%M-%S")))
}

/// 重命名行，原文件名按最长者左对齐
pub fn rename_lines(plan: &Plan) -> Vec<String> {
    let renames: Vec<_> = plan.with_action(Action::Rename).collect();
    let width = renames
        .iter()
        .map(|entry| entry.original_name.chars().count())
        .max()
        .unwrap_or(0);

    renames
        .iter()
        .map(|entry| {
            format!(
                "'{:<width$}'\t->\t'{}'",
                entry.original_name,
                entry.proposed_name,
                width = width
            )
        })
        .collect()
}

pub fn render(plan: &Plan) -> String {
    let mut out = String::new();

    out.push_str(UNCHANGED_HEADER);
    out.push('\n');
    for entry in plan.with_action(Action::Unchanged) {
        out.push_str(&entry.original_name);
        out.push('\n');
    }
    out.push_str(SEPARATOR);
    out.push('\n');

    out.push_str(RENAME_HEADER);
    out.push('\n');
    for line in rename_lines(plan) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(SEPARATOR);
    out.push('\n');

    out.push_str(DELETE_HEADER);
    out.push('\n');
    for entry in plan.with_action(Action::Delete) {
        out.push_str(&entry.original_name);
        out.push('\n');
    }

    out
}

/// 写入一次预览的结果，同一秒内的重复运行追加到同一文件
pub fn write(dir: &Path, plan: &Plan, at: DateTime<Local>) -> Result<PathBuf, AuditError> {
    let path = log_path(dir, at);
    let wrap = |source| AuditError {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(dir).map_err(wrap)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(wrap)?;
    file.write_all(render(plan).as_bytes()).map_err(wrap)?;

    tracing::info!(path = %path.display(), "审计日志已写入");
    Ok(path)
}
