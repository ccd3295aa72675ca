use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 限定名：命名空间 URI 与本地名的二元组，用于标识服务、端口、操作与 XML 类型。
///
/// # 契约说明（What）
/// - 文本形式采用 `{namespace}local` 记法，命名空间为空时退化为 `local`；
/// - 相等性与排序同时比较命名空间与本地名，保证在 `BTreeMap` 中的迭代顺序稳定；
/// - 本地名不得为空，解析与构造入口都会拒绝空字符串。
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QName {
    namespace_uri: Cow<'static, str>,
    local_part: Cow<'static, str>,
}

impl QName {
    /// 以命名空间与本地名构造限定名。
    ///
    /// 调用方需保证 `local_part` 非空；需要校验的场景请使用 [`str::parse`]。
    pub fn new<N, L>(namespace_uri: N, local_part: L) -> Self
    where
        N: Into<Cow<'static, str>>,
        L: Into<Cow<'static, str>>,
    {
        Self {
            namespace_uri: namespace_uri.into(),
            local_part: local_part.into(),
        }
    }

    /// 构造不带命名空间的限定名。
    pub fn local<L>(local_part: L) -> Self
    where
        L: Into<Cow<'static, str>>,
    {
        Self::new(Cow::Borrowed(""), local_part)
    }

    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    /// 命名空间是否为空。
    pub fn is_unqualified(&self) -> bool {
        self.namespace_uri.is_empty()
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_uri.is_empty() {
            f.write_str(&self.local_part)
        } else {
            write!(f, "{{{}}}{}", self.namespace_uri, self.local_part)
        }
    }
}

/// 限定名解析失败。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum QNameParseError {
    #[error("qualified name is empty")]
    Empty,
    #[error("qualified name `{0}` has an unterminated namespace")]
    UnterminatedNamespace(String),
    #[error("qualified name `{0}` has an empty local part")]
    EmptyLocalPart(String),
}

impl FromStr for QName {
    type Err = QNameParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err(QNameParseError::Empty);
        }
        let Some(rest) = input.strip_prefix('{') else {
            return Ok(QName::local(input.to_owned()));
        };
        let Some((namespace, local)) = rest.split_once('}') else {
            return Err(QNameParseError::UnterminatedNamespace(input.to_owned()));
        };
        if local.is_empty() {
            return Err(QNameParseError::EmptyLocalPart(input.to_owned()));
        }
        Ok(QName::new(namespace.to_owned(), local.to_owned()))
    }
}

impl TryFrom<String> for QName {
    type Error = QNameParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QName> for String {
    fn from(value: QName) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        let name = QName::new("urn:weather", "WeatherPort");
        assert_eq!(name.to_string(), "{urn:weather}WeatherPort");
        assert_eq!("{urn:weather}WeatherPort".parse::<QName>(), Ok(name));
    }

    #[test]
    fn unqualified_names_round_through_text() {
        let name: QName = "getTemperature".parse().expect("本地名应可解析");
        assert!(name.is_unqualified());
        assert_eq!(name.to_string(), "getTemperature");
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert_eq!("".parse::<QName>(), Err(QNameParseError::Empty));
        assert!(matches!(
            "{urn:weather".parse::<QName>(),
            Err(QNameParseError::UnterminatedNamespace(_))
        ));
        assert!(matches!(
            "{urn:weather}".parse::<QName>(),
            Err(QNameParseError::EmptyLocalPart(_))
        ));
    }
}
