mod audit;
mod catalog;
mod config;
mod controller;
mod layout;
mod naming;
mod parser;
mod policy;
mod scanner;

use anyhow::{Context, Result};
use catalog::CatalogTool;
use clap::Parser as ClapParser;
use config::{ConflictMode, FileConfig, Settings};
use controller::{Controller, Outcome, reviewer_for};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// 要整理的目录路径
    pub path: PathBuf,

    /// 有字幕：确保文件名带 -C
    #[arg(short = 'c', long = "sub")]
    pub sub: bool,

    /// 无字幕：保持已有标签
    #[arg(long)]
    pub no_sub: bool,

    /// 无码破解：确保文件名带 -hack
    #[arg(short = 'u', long)]
    pub hack: bool,

    /// 无码破解且有字幕：确保文件名带 -hack-C
    #[arg(long)]
    pub hack_sub: bool,

    /// 预览模式（不实际删除或重命名）
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// 小于该大小（字节）的文件将被删除，默认 500 MiB
    #[arg(long)]
    pub min_size: Option<u64>,

    /// 保留番号前缀前的数字（如 232GANA）
    #[arg(long)]
    pub keep_prefix_number: bool,

    /// 标签与策略不一致时的处理方式
    #[arg(long, value_enum)]
    pub conflicts: Option<ConflictMode>,

    /// 执行后把所有文件移到根目录并删除空目录
    #[arg(long)]
    pub flatten: bool,

    /// 以 JSON 输出预览结果
    #[arg(long)]
    pub json: bool,

    /// 配置文件路径（默认 ./movie_cleaner.toml）
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long)]
    pub verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,movie_cleaner=debug"
    } else {
        "warn,movie_cleaner=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let file_config = FileConfig::load(args.config.as_deref()).context("读取配置失败")?;
    let settings = Settings::from_args(&args, file_config).context("参数错误")?;

    if settings.dry_run {
        println!("预览模式，不会修改任何文件");
    }
    println!("后缀策略: {}", settings.policy);

    let controller = Controller::new(&settings);
    let mut reviewer = reviewer_for(settings.conflicts);
    let outcome = controller.run(reviewer.as_mut(), ctrl_c()).await?;

    let (log, plan, report, flatten) = match outcome {
        Outcome::Previewed { log } | Outcome::Cancelled { log } => {
            println!("审计日志: {}", log.display());
            return Ok(());
        }
        Outcome::Applied {
            log,
            plan,
            report,
            flatten,
        } => (log, plan, report, flatten),
    };

    for anomaly in &plan.anomalies {
        println!("跳过: {}", anomaly);
    }
    for failure in &report.failures {
        println!("{}", failure);
    }
    println!(
        "\n成功删除 {} 个文件，成功重命名 {} 个文件，失败 {} 个",
        report.deleted.len(),
        report.renamed.len(),
        report.failures.len()
    );
    println!("审计日志: {}", log.display());

    if let Some(flatten) = flatten {
        for failure in &flatten.failures {
            println!("移动失败: {} - {}", failure.path.display(), failure.error);
        }
        println!(
            "移动 {} 个文件，跳过 {} 个同名文件，删除 {} 个空目录",
            flatten.moved.len(),
            flatten.skipped.len(),
            flatten.removed_dirs.len()
        );
    }

    if let Some(catalog) = &settings.catalog {
        let tool = CatalogTool::new(catalog);
        match tool.run(&settings.root).await {
            Ok(status) if status.success() => println!("刮削完成"),
            Ok(status) => println!("刮削程序异常退出: {}", status),
            Err(e) => println!("刮削失败: {:#}", e),
        }
    }

    Ok(())
}
