use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct LayoutFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

#[derive(Debug, Default)]
pub struct FlattenReport {
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// 根目录已有同名文件，未移动
    pub skipped: Vec<PathBuf>,
    pub removed_dirs: Vec<PathBuf>,
    pub failures: Vec<LayoutFailure>,
}

fn is_excluded(path: &Path, exclude: &[PathBuf]) -> bool {
    !exclude.is_empty()
        && path
            .canonicalize()
            .is_ok_and(|path| exclude.contains(&path))
}

/// 把子目录中的文件移到根目录，再自底向上删除空目录
pub fn flatten(root: &Path, exclude: &[PathBuf]) -> FlattenReport {
    let mut report = FlattenReport::default();

    // min_depth 跳过的目录不会经过 filter_entry，深度在过滤之后再判断
    let nested: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && is_excluded(e.path(), exclude)))
        .filter_map(|e| e.ok())
        .filter(|e| e.depth() >= 2 && e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    for source in nested {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = root.join(name);

        if fs::symlink_metadata(&target).is_ok() {
            tracing::warn!(
                from = %source.display(),
                to = %target.display(),
                "根目录已有同名文件，跳过"
            );
            report.skipped.push(source);
            continue;
        }

        match fs::rename(&source, &target) {
            Ok(()) => {
                tracing::info!(from = %source.display(), to = %target.display(), "已移动");
                report.moved.push((source, target));
            }
            Err(error) => {
                tracing::error!("移动失败: {} - {}", source.display(), error);
                report.failures.push(LayoutFailure {
                    path: source,
                    error,
                });
            }
        }
    }

    remove_empty_dirs(root, exclude, &mut report);
    report
}

fn remove_empty_dirs(root: &Path, exclude: &[PathBuf], report: &mut FlattenReport) {
    let mut dirs: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && is_excluded(e.path(), exclude)))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();
    // 先序遍历反转后，子目录排在父目录之前
    dirs.reverse();

    for dir in dirs {
        let is_empty = match fs::read_dir(&dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(error) => {
                report.failures.push(LayoutFailure { path: dir, error });
                continue;
            }
        };
        if !is_empty {
            continue;
        }

        match fs::remove_dir(&dir) {
            Ok(()) => {
                tracing::info!(path = %dir.display(), "已删除空目录");
                report.removed_dirs.push(dir);
            }
            Err(error) => {
                tracing::error!("删除目录失败: {} - {}", dir.display(), error);
                report.failures.push(LayoutFailure { path: dir, error });
            }
        }
    }
}
