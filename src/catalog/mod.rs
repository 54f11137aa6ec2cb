use crate::config::CatalogConfig;
use anyhow::{Context, Result};
use std::path::{self, Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;

const SOURCE_FOLDER: &str = "SOURCE_FOLDER";
const SUCCESS_OUTPUT_FOLDER: &str = "SUCCESS_OUTPUT_FOLDER";
const FAILED_OUTPUT_FOLDER: &str = "FAILED_OUTPUT_FOLDER";
const FAILED_DIR_NAME: &str = "fail";

/// 整理完成后调用的下游刮削程序
pub struct CatalogTool {
    program: PathBuf,
    destination: PathBuf,
}

impl CatalogTool {
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            program: config.program.clone(),
            destination: config.destination.clone(),
        }
    }

    /// 通过环境变量传给程序的目录
    pub fn environment(&self, source: &Path) -> Vec<(&'static str, String)> {
        let mut source = source.display().to_string();
        if !source.ends_with('/') {
            source.push('/');
        }
        let failed = format!("{}{}", source, FAILED_DIR_NAME);

        vec![
            (SOURCE_FOLDER, source),
            (SUCCESS_OUTPUT_FOLDER, self.destination.display().to_string()),
            (FAILED_OUTPUT_FOLDER, failed),
        ]
    }

    /// 相对路径按当前目录解析，之后才能切换到程序所在目录
    fn resolved_program(&self) -> Result<PathBuf> {
        path::absolute(&self.program)
            .with_context(|| format!("无法解析刮削程序路径 {}", self.program.display()))
    }

    pub async fn run(&self, source: &Path) -> Result<ExitStatus> {
        let program = self.resolved_program()?;
        let mut command = Command::new(&program);
        command.envs(self.environment(source));
        if let Some(dir) = program.parent() {
            command.current_dir(dir);
        }

        tracing::info!(program = %program.display(), "启动刮削程序");
        let status = command
            .status()
            .await
            .with_context(|| format!("无法启动刮削程序 {}", self.program.display()))?;

        if status.success() {
            tracing::info!(%status, "刮削程序已结束");
        } else {
            tracing::warn!(%status, "刮削程序异常退出");
        }
        Ok(status)
    }
}
