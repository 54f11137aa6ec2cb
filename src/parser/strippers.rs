use regex::Regex;
use std::sync::LazyLock;

static DEFAULT_CHAIN: LazyLock<StripperChain> = LazyLock::new(StripperChain::default);
static EDGE_JUNK: LazyLock<EdgeJunkStripper> = LazyLock::new(EdgeJunkStripper::new);

/// 剥离结果
#[derive(Debug, Clone, PartialEq)]
pub struct StripResult {
    pub removed: String,
    pub rest_start: usize,
}

/// 剥离器 trait - 清理链中的一环
pub trait Stripper: Send + Sync {
    fn try_strip(&self, body: &str) -> Option<StripResult>;

    fn priority(&self) -> u32;

    /// 用于调试
    fn name(&self) -> &str;
}

/// 清理链管理器
///
/// 每个剥离器按优先级执行一次，前一个的输出是后一个的输入。
pub struct StripperChain {
    strippers: Vec<Box<dyn Stripper>>,
}

impl StripperChain {
    pub fn new() -> Self {
        Self {
            strippers: Vec::new(),
        }
    }

    pub fn add_stripper(mut self, stripper: Box<dyn Stripper>) -> Self {
        self.strippers.push(stripper);
        // 按优先级排序
        self.strippers.sort_by_key(|s| s.priority());
        self
    }

    /// 执行清理链，返回剩余的文件名主体
    pub fn execute(&self, body: &str) -> String {
        let mut rest = body;
        for stripper in &self.strippers {
            if let Some(result) = stripper.try_strip(rest) {
                tracing::debug!(
                    stripper = stripper.name(),
                    removed = %result.removed,
                    "剥离装饰"
                );
                rest = &rest[result.rest_start..];
            }
        }
        rest.to_string()
    }
}

impl Default for StripperChain {
    /// 方括号站点标签 → 域名前缀 → 首尾杂字符
    fn default() -> Self {
        Self::new()
            .add_stripper(Box::new(BracketTagStripper::new()))
            .add_stripper(Box::new(DomainPrefixStripper::new()))
            .add_stripper(Box::new(EdgeJunkStripper::new()))
    }
}

/// 清理文件名主体（不含扩展名）中的装饰性前缀和首尾杂字符
pub fn normalize(body: &str) -> String {
    let trimmed = DEFAULT_CHAIN.execute(body);
    EDGE_JUNK.trim_end(&trimmed).to_string()
}

/// [233.com] 开头的站点标签
pub struct BracketTagStripper {
    regex: Regex,
}

impl BracketTagStripper {
    pub fn new() -> Self {
        Self {
            regex: Regex::new(r"^\s*[\[【][^\]】]*[\]】]").unwrap(),
        }
    }
}

impl Stripper for BracketTagStripper {
    fn try_strip(&self, body: &str) -> Option<StripResult> {
        let m = self.regex.find(body)?;
        Some(StripResult {
            removed: m.as_str().to_string(),
            rest_start: m.end(),
        })
    }

    fn priority(&self) -> u32 {
        1
    }
    fn name(&self) -> &str {
        "BracketTag([233.com])"
    }
}

/// japlib.top- 域名前缀
pub struct DomainPrefixStripper {
    regex: Regex,
}

impl DomainPrefixStripper {
    pub fn new() -> Self {
        Self {
            regex: Regex::new(r"^\s*[A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)*\.[A-Za-z][A-Za-z0-9]*[-_@]")
                .unwrap(),
        }
    }
}

impl Stripper for DomainPrefixStripper {
    fn try_strip(&self, body: &str) -> Option<StripResult> {
        let m = self.regex.find(body)?;
        Some(StripResult {
            removed: m.as_str().to_string(),
            rest_start: m.end(),
        })
    }

    fn priority(&self) -> u32 {
        2
    }
    fn name(&self) -> &str {
        "DomainPrefix(japlib.top-)"
    }
}

/// 开头不在 [A-Za-z0-9_-] 中的字符
pub struct EdgeJunkStripper {
    leading: Regex,
    trailing: Regex,
}

impl EdgeJunkStripper {
    pub fn new() -> Self {
        Self {
            leading: Regex::new(r"^[^A-Za-z0-9_\-]+").unwrap(),
            trailing: Regex::new(r"[^A-Za-z0-9_\-]+$").unwrap(),
        }
    }

    pub fn trim_end<'a>(&self, body: &'a str) -> &'a str {
        match self.trailing.find(body) {
            Some(m) => &body[..m.start()],
            None => body,
        }
    }
}

impl Stripper for EdgeJunkStripper {
    fn try_strip(&self, body: &str) -> Option<StripResult> {
        let m = self.leading.find(body)?;
        Some(StripResult {
            removed: m.as_str().to_string(),
            rest_start: m.end(),
        })
    }

    fn priority(&self) -> u32 {
        10
    }
    fn name(&self) -> &str {
        "EdgeJunk"
    }
}
