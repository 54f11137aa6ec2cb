use crate::parser::{FileParser, FilenameRecord, ParseError};
use crate::policy::{self, Conflict, Resolution, TaggingPolicy};

/// 按固定顺序拼回文件名：[前缀数字]前缀-番号[-标签]*[-CDn].扩展名
pub fn reassemble(record: &FilenameRecord, tags: &[String], keep_prefix_number: bool) -> String {
    let mut head = String::new();
    if keep_prefix_number && let Some(prefix_number) = &record.prefix_number {
        head.push_str(prefix_number);
    }
    head.push_str(&record.prefix);

    let cd = record.cd_marker();

    let mut parts = vec![head.as_str(), record.number.as_str()];
    parts.extend(tags.iter().map(String::as_str));
    if let Some(cd) = &cd {
        parts.push(cd.as_str());
    }

    let body = parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    format!("{}{}", body, record.extension)
}

/// 单个文件的重命名建议
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    Resolved {
        name: String,
        note: Option<String>,
    },
    /// 需要人工决定；接受则改为 accepted_name
    Conflict {
        conflict: Conflict,
        accepted_name: String,
    },
}

/// 分解 → 策略 → 重组
pub struct Renamer {
    parser: FileParser,
    policy: TaggingPolicy,
    keep_prefix_number: bool,
}

impl Renamer {
    pub fn new(policy: TaggingPolicy, keep_prefix_number: bool) -> Self {
        Self {
            parser: FileParser::new(),
            policy,
            keep_prefix_number,
        }
    }

    pub fn propose(&self, filename: &str) -> Result<Proposal, ParseError> {
        let record = self.parser.parse(filename)?;

        Ok(match policy::resolve(&record, self.policy) {
            Resolution::Resolved { tags, note } => Proposal::Resolved {
                name: reassemble(&record, &tags, self.keep_prefix_number),
                note,
            },
            Resolution::Inconsistent(conflict) => Proposal::Conflict {
                accepted_name: reassemble(
                    &record,
                    &conflict.accepted_tags,
                    self.keep_prefix_number,
                ),
                conflict,
            },
        })
    }
}
