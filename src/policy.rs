use crate::parser::FilenameRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SUBTITLE_TAG: &str = "C";
pub const UNCENSORED_TAG: &str = "hack";

/// 整批文件统一使用的后缀策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaggingPolicy {
    /// 有字幕（-C）
    Subtitled,
    /// 无字幕
    NoSubtitle,
    /// 无码破解（-hack）
    Uncensored,
    /// 无码破解且有字幕（-hack-C）
    UncensoredSubtitled,
}

impl fmt::Display for TaggingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaggingPolicy::Subtitled => "有字幕(C)",
            TaggingPolicy::NoSubtitle => "无字幕",
            TaggingPolicy::Uncensored => "无码破解(hack)",
            TaggingPolicy::UncensoredSubtitled => "无码破解+字幕(hack-C)",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Subtitle,
    Uncensored,
    /// uc / cu / hackc 这类合写
    Both,
    Other,
}

fn classify(tag: &str) -> TagKind {
    match tag.to_ascii_lowercase().as_str() {
        "c" => TagKind::Subtitle,
        "u" | "hack" => TagKind::Uncensored,
        "uc" | "cu" | "hackc" | "chack" => TagKind::Both,
        _ => TagKind::Other,
    }
}

/// 已有标签与策略不一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub policy: TaggingPolicy,
    pub existing: Vec<String>,
    /// 接受时要渲染的标签
    pub accepted_tags: Vec<String>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.existing.is_empty() {
            write!(f, "策略为 {}，但文件名没有标签", self.policy)?;
        } else {
            write!(
                f,
                "策略为 {}，但已有标签为 [{}]",
                self.policy,
                self.existing.join(", ")
            )?;
        }
        write!(f, "，接受后追加为 -{}", self.accepted_tags.join("-"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        tags: Vec<String>,
        /// 不阻止重命名的异常说明
        note: Option<String>,
    },
    Inconsistent(Conflict),
}

/// 根据策略决定最终要渲染的标签（0-2个）
pub fn resolve(record: &FilenameRecord, policy: TaggingPolicy) -> Resolution {
    let existing = record.tags();
    let kinds: Vec<TagKind> = existing.iter().map(|t| classify(t)).collect();

    let resolved = match policy {
        TaggingPolicy::NoSubtitle => {
            let note = (existing.len() == 2).then(|| {
                format!(
                    "策略为无字幕，但已有两个标签 [{}]，保持原样",
                    existing.join(", ")
                )
            });
            return Resolution::Resolved {
                tags: existing.iter().map(|t| t.to_string()).collect(),
                note,
            };
        }
        TaggingPolicy::Subtitled => kinds
            .contains(&TagKind::Subtitle)
            .then(|| canonical_case(&existing)),
        TaggingPolicy::Uncensored => kinds
            .contains(&TagKind::Uncensored)
            .then(|| canonical_case(&existing)),
        TaggingPolicy::UncensoredSubtitled => {
            let combined = kinds.contains(&TagKind::Both)
                || (kinds.contains(&TagKind::Uncensored) && kinds.contains(&TagKind::Subtitle));
            combined.then(|| vec![UNCENSORED_TAG.to_string(), SUBTITLE_TAG.to_string()])
        }
    };

    match resolved {
        Some(tags) => Resolution::Resolved { tags, note: None },
        None => Resolution::Inconsistent(Conflict {
            policy,
            existing: existing.iter().map(|t| t.to_string()).collect(),
            accepted_tags: accepted_tags(&existing, policy),
        }),
    }
}

/// 识别出的标签转为规范写法，其余原样保留
fn canonical_case(tags: &[&str]) -> Vec<String> {
    tags.iter()
        .map(|tag| match classify(tag) {
            TagKind::Subtitle => SUBTITLE_TAG.to_string(),
            TagKind::Uncensored => UNCENSORED_TAG.to_string(),
            _ => tag.to_string(),
        })
        .collect()
}

/// 接受追加后的标签：保留可识别的标签，丢弃站点垃圾，按 hack, C 排序
fn accepted_tags(existing: &[&str], policy: TaggingPolicy) -> Vec<String> {
    let (mut uncensored, mut subtitle) = (false, false);
    for tag in existing {
        match classify(tag) {
            TagKind::Subtitle => subtitle = true,
            TagKind::Uncensored => uncensored = true,
            TagKind::Both => (uncensored, subtitle) = (true, true),
            TagKind::Other => {}
        }
    }
    match policy {
        TaggingPolicy::Subtitled => subtitle = true,
        TaggingPolicy::Uncensored => uncensored = true,
        TaggingPolicy::UncensoredSubtitled => (uncensored, subtitle) = (true, true),
        TaggingPolicy::NoSubtitle => {}
    }

    let mut tags = Vec::new();
    if uncensored {
        tags.push(UNCENSORED_TAG.to_string());
    }
    if subtitle {
        tags.push(SUBTITLE_TAG.to_string());
    }
    tags
}
