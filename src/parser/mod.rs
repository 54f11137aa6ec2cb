pub mod strippers;

use regex::Regex;
use thiserror::Error;

/// 分解失败：找不到必需的字段
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("文件名 '{0}' 没有扩展名")]
    MissingExtension(String),
    #[error("文件名 '{filename}' 清理后为空")]
    EmptyBody { filename: String },
    #[error("文件名 '{filename}' 不匹配番号格式（主体: '{body}'）")]
    NoMatch { filename: String, body: String },
}

/// 从文件名中分解出的字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameRecord {
    /// 前缀前面的数字，如 232GANA 中的 232
    pub prefix_number: Option<String>,
    pub prefix: String,
    pub number: String,
    pub tag1: Option<String>,
    pub tag2: Option<String>,
    /// 原样保留的光盘标记，如 cd2
    pub cd: Option<String>,
    /// 包含前导点，如 .mp4
    pub extension: String,
}

impl FilenameRecord {
    /// 已存在的后缀标签，按出现顺序
    pub fn tags(&self) -> Vec<&str> {
        [self.tag1.as_deref(), self.tag2.as_deref()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// 规范大小写的光盘标记，如 CD2
    pub fn cd_marker(&self) -> Option<String> {
        self.cd
            .as_deref()
            .map(|cd| format!("CD{}", &cd[2..]))
    }
}

pub struct FileParser {
    extension_regex: Regex,
    name_regex: Regex,
}

impl FileParser {
    pub fn new() -> Self {
        // (前缀数字)? 字母前缀 2-4位数字 (cd)? (标签1)? (标签2)? (cd)?
        let name_regex = Regex::new(
            r"(?x)
            ^(?:(?P<prefix_number>\d+)[-_]?)?
            (?P<prefix>[A-Za-z]+)[-_]?
            (?P<number>\d{2,4})
            (?:[-_]?(?P<cd_lead>[Cc][Dd]\d))?
            (?:[-_]?(?P<tag1>[A-Za-z]+))?
            (?:[-_]?(?P<tag2>[A-Za-z]+))?
            (?:[-_]?(?P<cd>[Cc][Dd]\d))?
            [-_]?$",
        )
        .unwrap();

        Self {
            extension_regex: Regex::new(r"^(.*?)(\.\w+)$").unwrap(),
            name_regex,
        }
    }

    pub fn parse(&self, filename: &str) -> Result<FilenameRecord, ParseError> {
        let captures = self
            .extension_regex
            .captures(filename)
            .ok_or_else(|| ParseError::MissingExtension(filename.to_string()))?;
        let extension = captures[2].to_string();

        let body = strippers::normalize(&captures[1]);
        if body.is_empty() {
            return Err(ParseError::EmptyBody {
                filename: filename.to_string(),
            });
        }

        let fields = self
            .name_regex
            .captures(&body)
            .ok_or_else(|| ParseError::NoMatch {
                filename: filename.to_string(),
                body: body.clone(),
            })?;

        let field = |name: &str| fields.name(name).map(|m| m.as_str().to_string());

        let number = field("number").unwrap_or_default();
        if number.len() < 3 {
            tracing::warn!(filename, number = %number, "番号数字部分小于三个数字");
        }

        Ok(FilenameRecord {
            prefix_number: field("prefix_number"),
            prefix: field("prefix").unwrap_or_default(),
            number,
            tag1: field("tag1"),
            tag2: field("tag2"),
            cd: field("cd_lead").or_else(|| field("cd")),
            extension,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_prefix_number() {
        let parser = FileParser::new();
        let result = parser.parse("232GANA-334-C.mp4").unwrap();
        assert_eq!(result.prefix_number.as_deref(), Some("232"));
        assert_eq!(result.prefix, "GANA");
        assert_eq!(result.number, "334");
        assert_eq!(result.tag1.as_deref(), Some("C"));
        assert_eq!(result.tag2, None);
        assert_eq!(result.extension, ".mp4");
    }

    #[test]
    fn test_parse_simple() {
        let parser = FileParser::new();
        let result = parser.parse("SSNI-334.mp4").unwrap();
        assert_eq!(result.prefix_number, None);
        assert_eq!(result.prefix, "SSNI");
        assert_eq!(result.number, "334");
        assert!(result.tags().is_empty());
        assert_eq!(result.cd, None);
    }

    #[test]
    fn test_parse_without_separators() {
        let parser = FileParser::new();
        let result = parser.parse("SSNI334C.mp4").unwrap();
        assert_eq!(result.prefix, "SSNI");
        assert_eq!(result.number, "334");
        assert_eq!(result.tags(), vec!["C"]);
    }

    #[rstest]
    #[case("[233.com]SSNI-334-C.mp4")]
    #[case("japlib.top-SSNI-334-C.mp4")]
    #[case("【字幕】SSNI-334-C.mp4")]
    #[case("SSNI_334_C.mp4")]
    fn test_parse_decorated(#[case] filename: &str) {
        let parser = FileParser::new();
        let result = parser.parse(filename).unwrap();
        assert_eq!(result.prefix, "SSNI");
        assert_eq!(result.number, "334");
        assert_eq!(result.tags(), vec!["C"]);
        assert_eq!(result.extension, ".mp4");
    }

    #[rstest]
    #[case("SSNI-888-CD2.mp4", None, None)]
    #[case("SSNI-888-cd2.mp4", None, None)]
    #[case("SSNI-888-C-CD2.mp4", Some("C"), None)]
    #[case("SSNI-888-CD2-C.mp4", Some("C"), None)]
    #[case("SSNI-888-hack-C-cd2.mkv", Some("hack"), Some("C"))]
    fn test_parse_cd_marker(
        #[case] filename: &str,
        #[case] tag1: Option<&str>,
        #[case] tag2: Option<&str>,
    ) {
        let parser = FileParser::new();
        let result = parser.parse(filename).unwrap();
        assert_eq!(result.cd_marker().as_deref(), Some("CD2"));
        assert_eq!(result.tag1.as_deref(), tag1);
        assert_eq!(result.tag2.as_deref(), tag2);
    }

    #[test]
    fn test_parse_two_digit_number() {
        let parser = FileParser::new();
        let result = parser.parse("ABC-12.mp4").unwrap();
        assert_eq!(result.number, "12");
    }

    /// 收集一次调用期间输出的日志
    fn captured_logs(f: impl FnOnce()) -> String {
        use std::io;
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Buffer(Arc<Mutex<Vec<u8>>>);

        impl io::Write for Buffer {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_short_number_is_warned() {
        let parser = FileParser::new();
        let logs = captured_logs(|| {
            parser.parse("ABC-12.mp4").unwrap();
        });
        assert!(logs.contains("WARN"));
        assert!(logs.contains("ABC-12.mp4"));
        assert!(logs.contains("番号数字部分小于三个数字"));

        let logs = captured_logs(|| {
            parser.parse("ABC-123.mp4").unwrap();
        });
        assert!(!logs.contains("番号数字部分小于三个数字"));
    }

    #[test]
    fn test_parse_keeps_extension_case() {
        let parser = FileParser::new();
        let result = parser.parse("ABP-123-U.MKV").unwrap();
        assert_eq!(result.extension, ".MKV");
        assert_eq!(result.tags(), vec!["U"]);
    }

    #[test]
    fn test_missing_extension() {
        let parser = FileParser::new();
        assert_eq!(
            parser.parse("SSNI-334"),
            Err(ParseError::MissingExtension("SSNI-334".to_string()))
        );
    }

    #[test]
    fn test_empty_body() {
        let parser = FileParser::new();
        assert!(matches!(
            parser.parse("[233.com].mp4"),
            Err(ParseError::EmptyBody { .. })
        ));
    }

    #[rstest]
    #[case("334.mp4")]
    #[case("SSNI.mp4")]
    #[case("SSNI-33445.mp4")]
    #[case("SSNI-334-1080p.mp4")]
    #[case("SSNI-334-a-b-c.mp4")]
    fn test_no_match(#[case] filename: &str) {
        let parser = FileParser::new();
        assert!(matches!(
            parser.parse(filename),
            Err(ParseError::NoMatch { .. })
        ));
    }
}
