use crate::Args;
use crate::policy::TaggingPolicy;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 500 MiB
pub const DEFAULT_MIN_SIZE: u64 = 500 * 1024 * 1024;
pub const DEFAULT_CONFIG_FILE: &str = "movie_cleaner.toml";
pub const DEFAULT_LOG_DIR: &str = "log";
pub const DEFAULT_REVIEW_SECONDS: u64 = 10;
const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "flv", "mov", "wmv", "rmvb"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("路径不存在: {}", .0.display())]
    MissingRoot(PathBuf),
    #[error("路径不是目录: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("必须选择一个后缀策略: -c、--no-sub、-u、--hack-sub 或配置文件中的 policy")]
    NoPolicy,
    #[error("只能选择一个后缀策略，当前选择了: {0}")]
    MultiplePolicies(String),
    #[error("无法读取配置文件 {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("配置文件 {} 格式错误: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("视频扩展名列表为空")]
    NoVideoExtensions,
}

/// 标签不一致时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictMode {
    /// 逐个询问
    #[default]
    Ask,
    /// 全部追加标签
    Accept,
    /// 全部保持原名
    Decline,
}

/// 下游刮削工具
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    pub program: PathBuf,
    pub destination: PathBuf,
}

/// 配置文件内容，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub policy: Option<TaggingPolicy>,
    pub min_size: Option<u64>,
    pub keep_prefix_number: bool,
    pub video_extensions: Option<Vec<String>>,
    pub log_dir: Option<PathBuf>,
    pub review_seconds: Option<u64>,
    pub conflicts: Option<ConflictMode>,
    pub flatten: bool,
    pub catalog: Option<CatalogConfig>,
}

impl FileConfig {
    /// 读取配置文件；未指定路径且默认文件不存在时使用默认值
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
    }
}

/// 一次运行的不可变配置
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub policy: TaggingPolicy,
    pub dry_run: bool,
    pub min_size: u64,
    pub keep_prefix_number: bool,
    /// 小写，不带点
    pub video_extensions: Vec<String>,
    pub log_dir: PathBuf,
    pub review_seconds: u64,
    pub conflicts: ConflictMode,
    pub flatten: bool,
    pub json: bool,
    pub catalog: Option<CatalogConfig>,
}

impl Settings {
    /// 合并命令行参数和配置文件，命令行优先
    pub fn from_args(args: &Args, file: FileConfig) -> Result<Self, ConfigError> {
        let policy = select_policy(args, file.policy)?;

        if !args.path.exists() {
            return Err(ConfigError::MissingRoot(args.path.clone()));
        }
        if !args.path.is_dir() {
            return Err(ConfigError::NotADirectory(args.path.clone()));
        }

        let video_extensions: Vec<String> = match file.video_extensions {
            Some(extensions) => extensions
                .iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
            None => DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        };
        if video_extensions.is_empty() {
            return Err(ConfigError::NoVideoExtensions);
        }

        Ok(Self {
            root: args.path.clone(),
            policy,
            dry_run: args.dry_run,
            min_size: args.min_size.or(file.min_size).unwrap_or(DEFAULT_MIN_SIZE),
            keep_prefix_number: args.keep_prefix_number || file.keep_prefix_number,
            video_extensions,
            log_dir: file
                .log_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            review_seconds: file.review_seconds.unwrap_or(DEFAULT_REVIEW_SECONDS),
            conflicts: args.conflicts.or(file.conflicts).unwrap_or_default(),
            flatten: args.flatten || file.flatten,
            json: args.json,
            catalog: file.catalog,
        })
    }
}

fn select_policy(
    args: &Args,
    fallback: Option<TaggingPolicy>,
) -> Result<TaggingPolicy, ConfigError> {
    let flags = [
        (args.sub, TaggingPolicy::Subtitled, "-c/--sub"),
        (args.no_sub, TaggingPolicy::NoSubtitle, "--no-sub"),
        (args.hack, TaggingPolicy::Uncensored, "-u/--hack"),
        (args.hack_sub, TaggingPolicy::UncensoredSubtitled, "--hack-sub"),
    ];
    let selected: Vec<_> = flags.iter().filter(|(on, _, _)| *on).collect();

    match selected.as_slice() {
        [] => fallback.ok_or(ConfigError::NoPolicy),
        [(_, policy, _)] => Ok(*policy),
        many => Err(ConfigError::MultiplePolicies(
            many.iter()
                .map(|(_, _, flag)| *flag)
                .collect::<Vec<_>>()
                .join(", "),
        )),
    }
}
