//! 工厂配置：端口选择策略、支持的协议绑定、注册表定制开关与默认编码风格。
//!
//! 配置以 TOML 声明，所有字段均有默认值；未知字段直接拒绝，避免拼写错误被静默忽略。
//!
//! ```toml
//! port_selection = "lexicographic"
//! supported_protocols = ["soap11", "soap12"]
//! allow_interceptor_customization = false
//! default_encoding_style = "http://schemas.xmlsoap.org/soap/encoding/"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use spark_rpc_core::{EncodingStyle, ProtocolBinding, RpcError};
use thiserror::Error;

/// 省略端口时的候选排序策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSelection {
    /// 按元数据仓库的声明顺序，第一个满足条件的端口胜出。
    #[default]
    FirstDeclared,
    /// 按端口限定名的字典序。
    Lexicographic,
}

/// 默认工厂的配置。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FactoryConfig {
    pub port_selection: PortSelection,
    pub supported_protocols: Vec<ProtocolBinding>,
    pub allow_type_mapping_customization: bool,
    pub allow_interceptor_customization: bool,
    /// 绑定信息未声明编码风格时使用的风格；空字符串表示 literal。
    pub default_encoding_style: String,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            port_selection: PortSelection::default(),
            supported_protocols: vec![
                ProtocolBinding::Soap11,
                ProtocolBinding::Soap12,
                ProtocolBinding::Http,
            ],
            allow_type_mapping_customization: true,
            allow_interceptor_customization: true,
            default_encoding_style: String::new(),
        }
    }
}

impl FactoryConfig {
    /// 解析并校验 TOML 文本。
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: FactoryConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 读取并解析 TOML 文件。
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// 校验字段之间的约束。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.supported_protocols.is_empty() {
            return Err(ConfigError::Invalid {
                detail: "supported_protocols must list at least one protocol binding".to_owned(),
            });
        }
        let mut seen = self.supported_protocols.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.supported_protocols.len() {
            return Err(ConfigError::Invalid {
                detail: "supported_protocols contains duplicates".to_owned(),
            });
        }
        Ok(())
    }

    pub fn supports(&self, protocol: ProtocolBinding) -> bool {
        self.supported_protocols.contains(&protocol)
    }

    pub fn default_encoding_style(&self) -> EncodingStyle {
        EncodingStyle::new(self.default_encoding_style.clone())
    }
}

/// 配置加载失败。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read factory config `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse factory config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid factory config: {detail}")]
    Invalid { detail: String },
}

impl From<ConfigError> for RpcError {
    fn from(error: ConfigError) -> Self {
        RpcError::factory(error.to_string())
    }
}
