//! 服务元数据契约：元数据仓库接口与其返回的描述结构。
//!
//! 元数据仓库由外部的文档解析代码构建，本 crate 只消费 [`MetadataStore`] 暴露的只读视图。
//! 仓库方法返回 `None` 表示“无法确定”（文档缺失对应段落），由工厂翻译为
//! [`RpcError::MetadataUnavailable`](crate::RpcError::MetadataUnavailable)。

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::qname::QName;

/// 元数据来源文档的位置。
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentLocation(Cow<'static, str>);

impl DocumentLocation {
    pub fn new(location: impl Into<Cow<'static, str>>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for DocumentLocation {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DocumentLocation {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for DocumentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 参数传递方向。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    InOut,
}

impl ParameterMode {
    /// 是否需要调用方在请求中提供实参。
    pub fn is_input(self) -> bool {
        matches!(self, ParameterMode::In | ParameterMode::InOut)
    }
}

/// 操作风格。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStyle {
    #[default]
    Rpc,
    Document,
}

impl OperationStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationStyle::Rpc => "rpc",
            OperationStyle::Document => "document",
        }
    }
}

/// 端口使用的协议绑定。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolBinding {
    Soap11,
    Soap12,
    Http,
}

/// 单个参数的声明。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    name: String,
    xml_type: QName,
    #[serde(default)]
    mode: ParameterMode,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, xml_type: QName, mode: ParameterMode) -> Self {
        Self {
            name: name.into(),
            xml_type,
            mode,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn xml_type(&self) -> &QName {
        &self.xml_type
    }

    pub fn mode(&self) -> ParameterMode {
        self.mode
    }
}

/// 远程操作的签名描述。
///
/// # 契约说明（What）
/// - `name` 在端口内唯一；匹配时既可按限定名，也可按本地名；
/// - `parameters` 保持声明顺序，调用实参按 IN/INOUT 参数的顺序对应；
/// - `return_type` 为 `None` 表示无返回值。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    name: QName,
    #[serde(default)]
    parameters: Vec<ParameterDescriptor>,
    #[serde(default)]
    return_type: Option<QName>,
    #[serde(default)]
    style: OperationStyle,
    #[serde(default)]
    soap_action: Option<String>,
}

impl OperationDescriptor {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            parameters: Vec::new(),
            return_type: None,
            style: OperationStyle::default(),
            soap_action: None,
        }
    }

    /// 追加一个参数声明。
    pub fn with_parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_return_type(mut self, return_type: QName) -> Self {
        self.return_type = Some(return_type);
        self
    }

    pub fn with_style(mut self, style: OperationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_soap_action(mut self, soap_action: impl Into<String>) -> Self {
        self.soap_action = Some(soap_action.into());
        self
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn return_type(&self) -> Option<&QName> {
        self.return_type.as_ref()
    }

    pub fn style(&self) -> OperationStyle {
        self.style
    }

    pub fn soap_action(&self) -> Option<&str> {
        self.soap_action.as_deref()
    }

    /// 需要调用方提供实参的参数数量。
    pub fn input_arity(&self) -> usize {
        self.parameters
            .iter()
            .filter(|parameter| parameter.mode().is_input())
            .count()
    }
}

/// 操作标识：限定名或本地名，两者均按精确匹配解析。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationRef<'a> {
    Qualified(&'a QName),
    Local(&'a str),
}

impl OperationRef<'_> {
    /// 限定名比较命名空间与本地名；本地名只比较本地部分。
    pub fn matches(&self, name: &QName) -> bool {
        match self {
            OperationRef::Qualified(qualified) => *qualified == name,
            OperationRef::Local(local) => name.local_part() == *local,
        }
    }
}

impl fmt::Display for OperationRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationRef::Qualified(qualified) => fmt::Display::fmt(qualified, f),
            OperationRef::Local(local) => f.write_str(local),
        }
    }
}

impl<'a> From<&'a QName> for OperationRef<'a> {
    fn from(value: &'a QName) -> Self {
        OperationRef::Qualified(value)
    }
}

impl<'a> From<&'a str> for OperationRef<'a> {
    fn from(value: &'a str) -> Self {
        OperationRef::Local(value)
    }
}

/// 端口的协议绑定信息。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingInfo {
    protocol: ProtocolBinding,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    port_type: Option<QName>,
    #[serde(default)]
    encoding_style: Option<String>,
}

impl BindingInfo {
    pub fn new(protocol: ProtocolBinding) -> Self {
        Self {
            protocol,
            address: None,
            port_type: None,
            encoding_style: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_port_type(mut self, port_type: QName) -> Self {
        self.port_type = Some(port_type);
        self
    }

    pub fn with_encoding_style(mut self, encoding_style: impl Into<String>) -> Self {
        self.encoding_style = Some(encoding_style.into());
        self
    }

    pub fn protocol(&self) -> ProtocolBinding {
        self.protocol
    }

    /// 网络可达地址；空字符串视同缺失。
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref().filter(|address| !address.is_empty())
    }

    pub fn port_type(&self) -> Option<&QName> {
        self.port_type.as_ref()
    }

    pub fn encoding_style(&self) -> Option<&str> {
        self.encoding_style.as_deref()
    }
}

/// 外部元数据仓库的只读接口。
///
/// # 契约说明（What）
/// - 实现必须在构造后保持不可变，工厂会在多个线程上并发读取；
/// - `ports` 的返回顺序即“声明顺序”，工厂的端口选择策略依赖该顺序；
/// - 返回 `None` 表示该部分元数据无法确定，而非“集合为空”。
pub trait MetadataStore: Send + Sync + 'static {
    /// 服务的限定名。
    fn service_name(&self) -> &QName;

    /// 服务暴露的全部端口。
    fn ports(&self) -> Option<Vec<QName>>;

    /// 指定端口的操作列表。
    fn operations_for_port(&self, port: &QName) -> Option<Vec<OperationDescriptor>>;

    /// 指定端口的协议绑定信息。
    fn binding_info_for_port(&self, port: &QName) -> Option<BindingInfo>;

    /// 元数据来源文档位置。
    fn document_location(&self) -> Option<&DocumentLocation>;
}
