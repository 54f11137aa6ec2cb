use crate::naming::{Proposal, Renamer};
use crate::policy::Conflict;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Unchanged,
    Rename,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub path: PathBuf,
    pub original_name: String,
    pub proposed_name: String,
    pub action: Action,
}

impl PlanEntry {
    /// 同目录下的新路径
    pub fn target(&self) -> PathBuf {
        self.path.with_file_name(&self.proposed_name)
    }
}

/// 等待人工决定的标签不一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingConflict {
    pub path: PathBuf,
    pub original_name: String,
    pub accepted_name: String,
    pub conflict: Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyKind {
    /// 无法分解，文件保持原样
    Parse { reason: String },
    /// 不阻止重命名的策略异常
    Policy { message: String },
    /// 目标文件名已被占用
    Collision { target: PathBuf },
    /// 未做决定的标签不一致，文件保持原样
    Undecided { conflict: Conflict },
    /// 读取目录或元数据失败
    Unreadable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    pub path: PathBuf,
    #[serde(flatten)]
    pub kind: AnomalyKind,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.display();
        match &self.kind {
            AnomalyKind::Parse { reason } => write!(f, "无法解析 {}: {}", path, reason),
            AnomalyKind::Policy { message } => write!(f, "{}: {}", path, message),
            AnomalyKind::Collision { target } => {
                write!(f, "目标已存在，跳过 {} -> {}", path, target.display())
            }
            AnomalyKind::Undecided { conflict } => write!(f, "未决定，跳过 {}: {}", path, conflict),
            AnomalyKind::Unreadable { reason } => write!(f, "无法读取 {}: {}", path, reason),
        }
    }
}

/// 一次扫描的结果
#[derive(Debug, Default, Serialize)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
    pub conflicts: Vec<PendingConflict>,
    pub anomalies: Vec<Anomaly>,
}

impl Plan {
    pub fn with_action(&self, action: Action) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(move |entry| entry.action == action)
    }

    pub fn count(&self, action: Action) -> usize {
        self.with_action(action).count()
    }

    fn anomaly(&mut self, path: &Path, kind: AnomalyKind) {
        let anomaly = Anomaly {
            path: path.to_path_buf(),
            kind,
        };
        tracing::warn!("{}", anomaly);
        self.anomalies.push(anomaly);
    }
}

/// 对标签不一致的决定，按文件路径记录
#[derive(Debug, Default, Clone)]
pub struct Decisions {
    accepted: HashSet<PathBuf>,
    declined: HashSet<PathBuf>,
}

impl Decisions {
    pub fn accept(&mut self, path: &Path) {
        self.declined.remove(path);
        self.accepted.insert(path.to_path_buf());
    }

    pub fn decline(&mut self, path: &Path) {
        self.accepted.remove(path);
        self.declined.insert(path.to_path_buf());
    }

    /// Some(true) 接受，Some(false) 拒绝，None 未决定
    pub fn verdict(&self, path: &Path) -> Option<bool> {
        if self.accepted.contains(path) {
            Some(true)
        } else if self.declined.contains(path) {
            Some(false)
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub action: Action,
    pub error: io::Error,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.action {
            Action::Delete => "删除失败",
            Action::Rename => "重命名失败",
            Action::Unchanged => "处理失败",
        };
        write!(f, "{}: {} - {}", verb, self.path.display(), self.error)
    }
}

#[derive(Debug, Default)]
pub struct ApplyReport {
    pub deleted: Vec<PathBuf>,
    pub renamed: Vec<(PathBuf, PathBuf)>,
    pub failures: Vec<FileFailure>,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub min_size: u64,
    /// 小写，不带点
    pub video_extensions: Vec<String>,
    /// 不进入的目录（已规范化），如审计日志目录
    pub exclude: Vec<PathBuf>,
}

/// 扫描得到的一个常规文件
struct Candidate {
    path: PathBuf,
    name: String,
    /// 文件名是合法 UTF-8
    valid_name: bool,
    size: u64,
}

pub struct FileScanner {
    options: ScanOptions,
    renamer: Renamer,
}

impl FileScanner {
    pub fn new(options: ScanOptions, renamer: Renamer) -> Self {
        Self { options, renamer }
    }

    fn is_video(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.options.video_extensions.contains(&ext)
            })
    }

    fn is_excluded(&self, path: &Path) -> bool {
        !self.options.exclude.is_empty()
            && path
                .canonicalize()
                .is_ok_and(|path| self.options.exclude.contains(&path))
    }

    /// 递归收集根目录下的常规文件，按文件名排序
    fn scan(&self, root: &Path, plan: &mut Plan) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(entry.file_type().is_dir() && self.is_excluded(entry.path())));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    plan.anomaly(&path, AnomalyKind::Unreadable { reason: e.to_string() });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    plan.anomaly(entry.path(), AnomalyKind::Unreadable { reason: e.to_string() });
                    continue;
                }
            };
            let file_name = entry.file_name();
            candidates.push(Candidate {
                path: entry.path().to_path_buf(),
                name: file_name.to_string_lossy().into_owned(),
                valid_name: file_name.to_str().is_some(),
                size,
            });
        }

        candidates
    }

    /// 扫描 → 分类 → 规划，不触碰文件系统
    pub fn plan(&self, root: &Path, decisions: &Decisions) -> Plan {
        let mut plan = Plan::default();
        let mut claimed = HashSet::new();

        let candidates = self.scan(root, &mut plan);
        // 本轮会被删除的文件不占用重命名目标
        let deleting: HashSet<PathBuf> = candidates
            .iter()
            .filter(|candidate| candidate.size < self.options.min_size)
            .map(|candidate| candidate.path.clone())
            .collect();

        for candidate in candidates {
            if candidate.size < self.options.min_size {
                plan.entries.push(PlanEntry {
                    proposed_name: candidate.name.clone(),
                    original_name: candidate.name,
                    path: candidate.path,
                    action: Action::Delete,
                });
                continue;
            }

            if !self.is_video(&candidate.name) {
                tracing::debug!(path = %candidate.path.display(), "跳过非视频文件");
                continue;
            }

            if !candidate.valid_name {
                plan.anomaly(
                    &candidate.path,
                    AnomalyKind::Parse {
                        reason: "文件名不是合法的 UTF-8".to_string(),
                    },
                );
                continue;
            }

            match self.renamer.propose(&candidate.name) {
                Err(e) => plan.anomaly(&candidate.path, AnomalyKind::Parse { reason: e.to_string() }),
                Ok(Proposal::Resolved { name, note }) => {
                    if let Some(message) = note {
                        plan.anomaly(&candidate.path, AnomalyKind::Policy { message });
                    }
                    plan_rename(&mut plan, &mut claimed, &deleting, candidate, name);
                }
                Ok(Proposal::Conflict {
                    conflict,
                    accepted_name,
                }) => match decisions.verdict(&candidate.path) {
                    Some(true) => plan_rename(&mut plan, &mut claimed, &deleting, candidate, accepted_name),
                    Some(false) => {
                        tracing::debug!(path = %candidate.path.display(), "已拒绝追加标签");
                        let unchanged = candidate.name.clone();
                        plan_rename(&mut plan, &mut claimed, &deleting, candidate, unchanged)
                    }
                    None => plan.conflicts.push(PendingConflict {
                        path: candidate.path,
                        original_name: candidate.name,
                        accepted_name,
                        conflict,
                    }),
                },
            }
        }

        plan
    }

    /// 重新扫描并执行删除和重命名；单个文件失败不影响其余文件
    pub fn apply(&self, root: &Path, decisions: &Decisions) -> (Plan, ApplyReport) {
        let mut plan = self.plan(root, decisions);
        for pending in std::mem::take(&mut plan.conflicts) {
            plan.anomaly(
                &pending.path,
                AnomalyKind::Undecided {
                    conflict: pending.conflict,
                },
            );
        }

        let report = execute(&plan);
        (plan, report)
    }
}

/// 执行计划：先删除再重命名，单个文件失败只记录不中断
pub fn execute(plan: &Plan) -> ApplyReport {
    let mut report = ApplyReport::default();

    let deletes = plan.with_action(Action::Delete);
    let renames = plan.with_action(Action::Rename);
    for entry in deletes.chain(renames) {
        let result = match entry.action {
            Action::Unchanged => continue,
            Action::Delete => fs::remove_file(&entry.path).map(|()| {
                tracing::info!(path = %entry.path.display(), "已删除");
                report.deleted.push(entry.path.clone());
            }),
            Action::Rename => rename_in_place(entry).map(|target| {
                tracing::info!(
                    from = %entry.path.display(),
                    to = %target.display(),
                    "已重命名"
                );
                report.renamed.push((entry.path.clone(), target));
            }),
        };

        if let Err(error) = result {
            let failure = FileFailure {
                path: entry.path.clone(),
                action: entry.action,
                error,
            };
            tracing::error!("{}", failure);
            report.failures.push(failure);
        }
    }

    report
}

fn plan_rename(
    plan: &mut Plan,
    claimed: &mut HashSet<PathBuf>,
    deleting: &HashSet<PathBuf>,
    candidate: Candidate,
    proposed: String,
) {
    if proposed == candidate.name {
        plan.entries.push(PlanEntry {
            path: candidate.path,
            original_name: candidate.name,
            proposed_name: proposed,
            action: Action::Unchanged,
        });
        return;
    }

    let target = candidate.path.with_file_name(&proposed);
    let occupied = !deleting.contains(&target) && target_occupied(&candidate.path, &proposed);
    if claimed.contains(&target) || occupied {
        plan.anomaly(&candidate.path, AnomalyKind::Collision { target });
        return;
    }

    claimed.insert(target);
    plan.entries.push(PlanEntry {
        path: candidate.path,
        original_name: candidate.name,
        proposed_name: proposed,
        action: Action::Rename,
    });
}

/// 同目录下是否已有另一个文件叫 proposed
///
/// 只有大小写不同时，在不区分大小写的文件系统上 exists() 会命中源文件本身，
/// 因此改为比对目录中的实际文件名。
fn target_occupied(source: &Path, proposed: &str) -> bool {
    let target = source.with_file_name(proposed);
    if fs::symlink_metadata(&target).is_err() {
        return false;
    }

    let same_ignoring_case = source
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.eq_ignore_ascii_case(proposed));
    if !same_ignoring_case {
        return true;
    }

    let Some(parent) = source.parent() else {
        return true;
    };
    match fs::read_dir(parent) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_str() == Some(proposed)),
        Err(_) => true,
    }
}

fn rename_in_place(entry: &PlanEntry) -> io::Result<PathBuf> {
    let target = entry.target();
    if target_occupied(&entry.path, &entry.proposed_name) {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("目标已存在: {}", target.display()),
        ));
    }
    fs::rename(&entry.path, &target)?;
    Ok(target)
}
