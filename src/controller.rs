use crate::audit;
use crate::config::{ConflictMode, Settings};
use crate::layout::{self, FlattenReport};
use crate::naming::Renamer;
use crate::scanner::{Action, ApplyReport, Decisions, FileScanner, PendingConflict, Plan, ScanOptions};
use anyhow::{Context, Result};
use chrono::Local;
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

const BANNER: &str =
    "==========================================================================================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Decline,
    /// 接受这一个以及剩余所有
    AcceptAll,
    /// 拒绝这一个以及剩余所有
    DeclineAll,
}

/// 对单个标签不一致做出决定
pub trait ConflictReviewer {
    fn review(&mut self, pending: &PendingConflict) -> Verdict;
}

/// 在终端逐个询问
pub struct StdinReviewer;

impl ConflictReviewer for StdinReviewer {
    fn review(&mut self, pending: &PendingConflict) -> Verdict {
        println!("\n{}", pending.path.display());
        println!("  {}", pending.conflict);
        println!("  '{}'\t->\t'{}'", pending.original_name, pending.accepted_name);
        print!("追加标签？[y/N/a(全部接受)/d(全部拒绝)] ");

        let mut input = String::new();
        if let Err(e) = io::stdout().flush().and_then(|()| io::stdin().read_line(&mut input)) {
            tracing::warn!("读取输入失败，按拒绝处理: {}", e);
            return Verdict::Decline;
        }

        match input.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Verdict::Accept,
            "a" => Verdict::AcceptAll,
            "d" => Verdict::DeclineAll,
            _ => Verdict::Decline,
        }
    }
}

/// 不询问，统一接受或拒绝
pub struct FixedReviewer(pub Verdict);

impl ConflictReviewer for FixedReviewer {
    fn review(&mut self, _pending: &PendingConflict) -> Verdict {
        self.0
    }
}

pub fn reviewer_for(mode: ConflictMode) -> Box<dyn ConflictReviewer> {
    match mode {
        ConflictMode::Ask => Box::new(StdinReviewer),
        ConflictMode::Accept => Box::new(FixedReviewer(Verdict::Accept)),
        ConflictMode::Decline => Box::new(FixedReviewer(Verdict::Decline)),
    }
}

/// 一次性处理预览中收集到的所有不一致
pub fn review_conflicts(conflicts: &[PendingConflict], reviewer: &mut dyn ConflictReviewer) -> Decisions {
    let mut decisions = Decisions::default();
    let mut for_all = None;

    for pending in conflicts {
        let accept = match for_all {
            Some(accept) => accept,
            None => match reviewer.review(pending) {
                Verdict::Accept => true,
                Verdict::Decline => false,
                Verdict::AcceptAll => *for_all.insert(true),
                Verdict::DeclineAll => *for_all.insert(false),
            },
        };

        if accept {
            decisions.accept(&pending.path);
        } else {
            decisions.decline(&pending.path);
        }
    }

    decisions
}

/// 倒计时；cancel 先完成则返回 false
pub async fn countdown<F>(seconds: u64, cancel: F) -> bool
where
    F: Future<Output = ()>,
{
    tokio::pin!(cancel);

    for remaining in (1..=seconds).rev() {
        print!("\r等待 {} 秒...", remaining);
        if let Err(e) = io::stdout().flush() {
            tracing::debug!("刷新标准输出失败: {}", e);
        }

        tokio::select! {
            biased;
            _ = &mut cancel => {
                println!();
                return false;
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }

    if seconds > 0 {
        println!();
    }
    true
}

/// 预览的结果
#[derive(Debug)]
pub struct Preview {
    pub plan: Plan,
    pub decisions: Decisions,
    pub log: PathBuf,
}

#[derive(Debug)]
pub enum Outcome {
    /// 仅预览
    Previewed { log: PathBuf },
    /// 倒计时中被取消，未做任何修改
    Cancelled { log: PathBuf },
    Applied {
        log: PathBuf,
        plan: Plan,
        report: ApplyReport,
        flatten: Option<FlattenReport>,
    },
}

pub struct Controller<'a> {
    settings: &'a Settings,
}

impl<'a> Controller<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// 日志目录在根目录内时不参与扫描
    fn excluded_dirs(&self) -> Vec<PathBuf> {
        self.settings.log_dir.canonicalize().into_iter().collect()
    }

    fn scanner(&self) -> FileScanner {
        FileScanner::new(
            ScanOptions {
                min_size: self.settings.min_size,
                video_extensions: self.settings.video_extensions.clone(),
                exclude: self.excluded_dirs(),
            },
            Renamer::new(self.settings.policy, self.settings.keep_prefix_number),
        )
    }

    /// 预览：扫描，处理不一致，打印并写入审计日志
    pub fn preview(&self, reviewer: &mut dyn ConflictReviewer) -> Result<Preview> {
        let root = &self.settings.root;
        let scanner = self.scanner();

        println!("扫描目录: {}", root.display());
        let first = scanner.plan(root, &Decisions::default());

        let (plan, decisions) = if first.conflicts.is_empty() {
            (first, Decisions::default())
        } else {
            println!("\n{} 个文件的标签与策略 {} 不一致", first.conflicts.len(), self.settings.policy);
            let decisions = review_conflicts(&first.conflicts, reviewer);
            (scanner.plan(root, &decisions), decisions)
        };

        print_plan(&plan);
        if self.settings.json {
            let json = serde_json::to_string_pretty(&plan).context("无法序列化预览结果")?;
            println!("{}", json);
        }

        let log = audit::write(&self.settings.log_dir, &plan, Local::now())?;

        Ok(Preview {
            plan,
            decisions,
            log,
        })
    }

    /// 预览 → 倒计时 → 执行
    pub async fn run<F>(&self, reviewer: &mut dyn ConflictReviewer, cancel: F) -> Result<Outcome>
    where
        F: Future<Output = ()>,
    {
        let preview = self.preview(reviewer)?;
        let log = preview.log;

        if self.settings.dry_run {
            println!("\n预览模式，未做任何修改");
            return Ok(Outcome::Previewed { log });
        }
        if preview.plan.count(Action::Rename) == 0
            && preview.plan.count(Action::Delete) == 0
            && !self.settings.flatten
        {
            println!("\n没有需要修改的文件");
            return Ok(Outcome::Previewed { log });
        }

        println!("\n{}", BANNER);
        println!(
            "将在 {} 秒后按上面的列表执行删除和重命名。如需仔细检查，请按 CTRL+C 取消，\n然后使用 -n/--dry-run 重新预览。",
            self.settings.review_seconds
        );
        println!("{}", BANNER);

        if !countdown(self.settings.review_seconds, cancel).await {
            println!("已取消");
            return Ok(Outcome::Cancelled { log });
        }

        let (plan, report) = self.scanner().apply(&self.settings.root, &preview.decisions);

        let flatten = self.flatten_after(&report);

        Ok(Outcome::Applied {
            log,
            plan,
            report,
            flatten,
        })
    }

    /// 只在执行全部成功后移动到根目录
    fn flatten_after(&self, report: &ApplyReport) -> Option<FlattenReport> {
        if !self.settings.flatten {
            return None;
        }
        if !report.failures.is_empty() {
            println!("\n有 {} 个文件处理失败，跳过移动到根目录", report.failures.len());
            return None;
        }
        println!("\n移动文件到根目录...");
        Some(layout::flatten(&self.settings.root, &self.excluded_dirs()))
    }
}

fn print_plan(plan: &Plan) {
    println!();
    for entry in plan.with_action(Action::Unchanged) {
        println!("(UNCHANGE) {}", entry.original_name);
    }
    for line in audit::rename_lines(plan) {
        println!("(RENAME) {}", line);
    }
    for entry in plan.with_action(Action::Delete) {
        println!("(DELETE) {}", entry.original_name);
    }

    if !plan.anomalies.is_empty() {
        println!("\n{} 个异常:", plan.anomalies.len());
        for anomaly in &plan.anomalies {
            println!("  {}", anomaly);
        }
    }

    println!(
        "\n保持: {}  重命名: {}  删除: {}",
        plan.count(Action::Unchanged),
        plan.count(Action::Rename),
        plan.count(Action::Delete)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::TaggingPolicy;
    use std::fs;
    use std::path::Path;
    use walkdir::WalkDir;

    const MIN_SIZE: u64 = 16;

    fn settings(root: &Path, log_dir: &Path) -> Settings {
        Settings {
            root: root.to_path_buf(),
            policy: TaggingPolicy::Subtitled,
            dry_run: false,
            min_size: MIN_SIZE,
            keep_prefix_number: false,
            video_extensions: vec!["mp4".to_string()],
            log_dir: log_dir.to_path_buf(),
            review_seconds: 0,
            conflicts: ConflictMode::Accept,
            flatten: false,
            json: false,
            catalog: None,
        }
    }

    fn populate(root: &Path) {
        fs::write(root.join("SSNI334C.mp4"), vec![b'x'; MIN_SIZE as usize]).unwrap();
        fs::write(root.join("ABP-123.mp4"), vec![b'y'; MIN_SIZE as usize]).unwrap();
        fs::write(root.join("sample.mp4"), b"tiny").unwrap();
    }

    fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| (e.path().to_path_buf(), fs::read(e.path()).unwrap()))
            .collect()
    }

    /// 按顺序返回预设的决定
    struct Scripted(Vec<Verdict>);

    impl ConflictReviewer for Scripted {
        fn review(&mut self, _pending: &PendingConflict) -> Verdict {
            self.0.remove(0)
        }
    }

    fn pending(name: &str) -> PendingConflict {
        let record = crate::parser::FileParser::new().parse(name).unwrap();
        let crate::policy::Resolution::Inconsistent(conflict) =
            crate::policy::resolve(&record, TaggingPolicy::Subtitled)
        else {
            panic!("应当报告不一致");
        };
        PendingConflict {
            path: PathBuf::from("/videos").join(name),
            original_name: name.to_string(),
            accepted_name: String::new(),
            conflict,
        }
    }

    #[test]
    fn test_review_all_stops_asking() {
        let conflicts = vec![pending("A-001.mp4"), pending("B-002.mp4"), pending("C-003.mp4")];
        let mut reviewer = Scripted(vec![Verdict::Decline, Verdict::AcceptAll]);

        let decisions = review_conflicts(&conflicts, &mut reviewer);
        assert!(reviewer.0.is_empty());
        assert_eq!(decisions.verdict(Path::new("/videos/A-001.mp4")), Some(false));
        assert_eq!(decisions.verdict(Path::new("/videos/B-002.mp4")), Some(true));
        assert_eq!(decisions.verdict(Path::new("/videos/C-003.mp4")), Some(true));
    }

    #[tokio::test]
    async fn test_countdown_cancelled() {
        assert!(!countdown(5, std::future::ready(())).await);
    }

    #[tokio::test]
    async fn test_countdown_zero_seconds() {
        assert!(countdown(0, std::future::pending::<()>()).await);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_tree_untouched() {
        let root = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        populate(root.path());
        let before = snapshot(root.path());

        let mut settings = settings(root.path(), logs.path());
        settings.dry_run = true;
        let outcome = Controller::new(&settings)
            .run(&mut FixedReviewer(Verdict::Accept), std::future::pending())
            .await
            .unwrap();

        let Outcome::Previewed { log } = outcome else {
            panic!("预览模式不应执行");
        };
        assert_eq!(snapshot(root.path()), before);
        let text = fs::read_to_string(log).unwrap();
        assert!(text.contains("'ABP-123.mp4 '\t->\t'ABP-123-C.mp4'"));
        assert!(text.contains("sample.mp4"));
    }

    #[tokio::test]
    async fn test_cancel_keeps_log_and_files() {
        let root = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        populate(root.path());
        let before = snapshot(root.path());

        let mut settings = settings(root.path(), logs.path());
        settings.review_seconds = 10;
        let outcome = Controller::new(&settings)
            .run(&mut FixedReviewer(Verdict::Accept), std::future::ready(()))
            .await
            .unwrap();

        let Outcome::Cancelled { log } = outcome else {
            panic!("应当被取消");
        };
        assert!(log.exists());
        assert_eq!(snapshot(root.path()), before);
    }

    #[tokio::test]
    async fn test_apply_follows_preview() {
        let root = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        populate(root.path());

        let settings = settings(root.path(), logs.path());
        let outcome = Controller::new(&settings)
            .run(&mut FixedReviewer(Verdict::Accept), std::future::pending())
            .await
            .unwrap();

        let Outcome::Applied { report, .. } = outcome else {
            panic!("应当执行");
        };
        assert_eq!(report.deleted.len(), 1);
        assert_eq!(report.renamed.len(), 2);
        assert!(report.failures.is_empty());

        let names: Vec<_> = snapshot(root.path())
            .into_iter()
            .map(|(path, _)| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ABP-123-C.mp4", "SSNI-334-C.mp4"]);
    }

    #[tokio::test]
    async fn test_declined_conflict_stays() {
        let root = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        populate(root.path());

        let settings = settings(root.path(), logs.path());
        let outcome = Controller::new(&settings)
            .run(&mut FixedReviewer(Verdict::Decline), std::future::pending())
            .await
            .unwrap();

        let Outcome::Applied { log, report, .. } = outcome else {
            panic!("应当执行");
        };
        assert_eq!(report.renamed.len(), 1);
        assert!(root.path().join("ABP-123.mp4").exists());

        let text = fs::read_to_string(log).unwrap();
        let rename_section = text.find(audit::RENAME_HEADER).unwrap();
        assert!(text[..rename_section].contains("ABP-123.mp4"));
    }

    #[tokio::test]
    async fn test_log_dir_inside_root_is_not_cleaned() {
        let root = tempfile::tempdir().unwrap();
        populate(root.path());
        let log_dir = root.path().join("log");

        let mut settings = settings(root.path(), &log_dir);
        settings.flatten = true;
        let outcome = Controller::new(&settings)
            .run(&mut FixedReviewer(Verdict::Accept), std::future::pending())
            .await
            .unwrap();

        let Outcome::Applied { log, flatten, .. } = outcome else {
            panic!("应当执行");
        };
        assert!(log.exists());
        assert!(flatten.unwrap().moved.is_empty());
    }

    #[test]
    fn test_flatten_skipped_after_failures() {
        let root = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("sub")).unwrap();
        fs::write(root.path().join("sub/movie.mp4"), b"1").unwrap();

        let mut settings = settings(root.path(), logs.path());
        settings.flatten = true;
        let controller = Controller::new(&settings);

        let failed = ApplyReport {
            failures: vec![crate::scanner::FileFailure {
                path: root.path().join("gone.mp4"),
                action: Action::Delete,
                error: io::Error::from(io::ErrorKind::NotFound),
            }],
            ..Default::default()
        };
        assert!(controller.flatten_after(&failed).is_none());
        assert!(root.path().join("sub/movie.mp4").exists());

        let flatten = controller.flatten_after(&ApplyReport::default()).unwrap();
        assert_eq!(flatten.moved.len(), 1);
        assert!(root.path().join("movie.mp4").exists());
    }
}
