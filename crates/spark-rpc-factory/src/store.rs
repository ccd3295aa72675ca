//! 内存元数据仓库。
//!
//! [`StaticMetadataStore`] 是 [`MetadataStore`] 的不可变实现，可以用构建器组装，也可以从 TOML
//! 服务描述加载。它不解析 WSDL，只承载解析结果；字段缺失即表示“无法确定”。

use serde::Deserialize;
use spark_rpc_core::{BindingInfo, DocumentLocation, MetadataStore, OperationDescriptor, QName};

use crate::config::ConfigError;

/// 单个端口的元数据。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticPort {
    name: QName,
    #[serde(default)]
    binding: Option<BindingInfo>,
    #[serde(default)]
    operations: Option<Vec<OperationDescriptor>>,
}

impl StaticPort {
    /// 新端口既无绑定信息也无操作列表。
    pub fn new(name: QName) -> Self {
        Self {
            name,
            binding: None,
            operations: None,
        }
    }

    pub fn with_binding(mut self, binding: BindingInfo) -> Self {
        self.binding = Some(binding);
        self
    }

    /// 设置操作列表；传入空列表表示“端口没有操作”，与未设置不同。
    pub fn with_operations(mut self, operations: Vec<OperationDescriptor>) -> Self {
        self.operations = Some(operations);
        self
    }

    pub fn name(&self) -> &QName {
        &self.name
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceDocument {
    service: QName,
    #[serde(default)]
    document_location: Option<DocumentLocation>,
    #[serde(default)]
    ports: Option<Vec<StaticPort>>,
}

/// 构造后不可变的元数据仓库。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticMetadataStore {
    service_name: QName,
    document_location: Option<DocumentLocation>,
    ports: Option<Vec<StaticPort>>,
}

impl StaticMetadataStore {
    /// 端口集合已知（初始为空）的仓库。
    pub fn new(service_name: QName) -> Self {
        Self {
            service_name,
            document_location: None,
            ports: Some(Vec::new()),
        }
    }

    /// 端口集合无法确定的仓库。
    pub fn opaque(service_name: QName) -> Self {
        Self {
            service_name,
            document_location: None,
            ports: None,
        }
    }

    pub fn with_document_location(mut self, location: impl Into<DocumentLocation>) -> Self {
        self.document_location = Some(location.into());
        self
    }

    /// 追加端口；同名端口替换旧条目并保留其声明位置。
    ///
    /// 构建器按覆盖层语义工作：在既有描述上再次声明同名端口即为修订该端口。
    /// 需要拒绝重复声明时使用 [`StaticMetadataStore::try_with_port`]。
    pub fn with_port(mut self, port: StaticPort) -> Self {
        let ports = self.ports.get_or_insert_with(Vec::new);
        match ports.iter_mut().find(|existing| existing.name == port.name) {
            Some(existing) => *existing = port,
            None => ports.push(port),
        }
        self
    }

    /// 追加端口；同名端口已存在时返回 [`ConfigError::Invalid`]，与 TOML 描述的加载规则一致。
    pub fn try_with_port(mut self, port: StaticPort) -> Result<Self, ConfigError> {
        let ports = self.ports.get_or_insert_with(Vec::new);
        if ports.iter().any(|existing| existing.name == port.name) {
            return Err(ConfigError::Invalid {
                detail: format!("port `{}` is declared more than once", port.name),
            });
        }
        ports.push(port);
        Ok(self)
    }

    /// 从 TOML 服务描述加载。
    ///
    /// ```toml
    /// service = "{urn:weather}Weather"
    /// document_location = "https://weather.example/weather?wsdl"
    ///
    /// [[ports]]
    /// name = "{urn:weather}WeatherPort"
    /// binding = { protocol = "soap11", address = "https://weather.example/soap" }
    ///
    /// [[ports.operations]]
    /// name = "{urn:weather}getTemperature"
    /// return_type = "{http://www.w3.org/2001/XMLSchema}double"
    /// parameters = [{ name = "city", xml_type = "{http://www.w3.org/2001/XMLSchema}string" }]
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let document: ServiceDocument = toml::from_str(text)?;
        let store = Self {
            service_name: document.service,
            document_location: document.document_location,
            ports: document.ports.as_ref().map(|_| Vec::new()),
        };
        document
            .ports
            .into_iter()
            .flatten()
            .try_fold(store, Self::try_with_port)
    }

    fn port(&self, name: &QName) -> Option<&StaticPort> {
        self.ports
            .as_deref()
            .and_then(|ports| ports.iter().find(|port| &port.name == name))
    }
}

impl MetadataStore for StaticMetadataStore {
    fn service_name(&self) -> &QName {
        &self.service_name
    }

    fn ports(&self) -> Option<Vec<QName>> {
        self.ports
            .as_ref()
            .map(|ports| ports.iter().map(|port| port.name.clone()).collect())
    }

    fn operations_for_port(&self, port: &QName) -> Option<Vec<OperationDescriptor>> {
        self.port(port)?.operations.clone()
    }

    fn binding_info_for_port(&self, port: &QName) -> Option<BindingInfo> {
        self.port(port)?.binding.clone()
    }

    fn document_location(&self) -> Option<&DocumentLocation> {
        self.document_location.as_ref()
    }
}
