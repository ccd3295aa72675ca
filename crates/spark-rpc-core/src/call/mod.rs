//! 调用句柄（Call）：一次远程操作调用的配置与执行入口。
//!
//! # 生命周期（What）
//! - [`CallState::Unconfigured`]：由 `create_unconfigured_call` 产生，端口、地址、操作与参数均由调用方设置；
//! - [`CallState::PortBound`]：由 `create_call_for_port` 产生，端口与地址固定，操作可通过
//!   [`Call::bind_operation`] 从端口元数据补全，或手工设置签名；
//! - [`CallState::Preconfigured`]：由 `get_calls` / `create_call_for_operation` 产生，寻址、签名与
//!   类型映射全部固定，修改会返回 [`RpcError::ReadOnlyCall`]。
//!
//! # 所有权
//! - 句柄不持有工厂引用；端口操作列表、类型映射与拦截器链都是创建时捕获的不可变快照；
//! - 每次创建得到独立的值，`Clone` 也会得到独立副本，属性修改互不影响。

pub mod executor;
pub mod properties;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

pub use executor::{CallExecutor, UnboundExecutor};

use crate::encoding::{EncodingStyle, TypeMapping, TypeMappingSnapshot};
use crate::error::{Result, RpcError};
use crate::interceptor::{InterceptorChain, InvocationContext};
use crate::metadata::{
    BindingInfo, OperationDescriptor, OperationRef, OperationStyle, ParameterDescriptor,
    ParameterMode,
};
use crate::qname::QName;

/// 句柄生命周期状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallState {
    Unconfigured,
    PortBound,
    Preconfigured,
}

/// 工厂解析端口后得到的绑定材料，用于构造句柄与代理。
#[derive(Clone, Debug)]
pub struct PortBinding {
    service_name: QName,
    port_name: QName,
    binding: BindingInfo,
    encoding_style: EncodingStyle,
    operations: Arc<[OperationDescriptor]>,
}

impl PortBinding {
    pub fn new(
        service_name: QName,
        port_name: QName,
        binding: BindingInfo,
        encoding_style: EncodingStyle,
        operations: Vec<OperationDescriptor>,
    ) -> Self {
        Self {
            service_name,
            port_name,
            binding,
            encoding_style,
            operations: Arc::from(operations),
        }
    }

    pub fn service_name(&self) -> &QName {
        &self.service_name
    }

    pub fn port_name(&self) -> &QName {
        &self.port_name
    }

    pub fn binding(&self) -> &BindingInfo {
        &self.binding
    }

    pub fn encoding_style(&self) -> &EncodingStyle {
        &self.encoding_style
    }

    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    pub fn find_operation(&self, operation: OperationRef<'_>) -> Result<&OperationDescriptor> {
        lookup_operation(&self.port_name, &self.operations, operation)
    }
}

/// 按标识在端口操作中查找唯一匹配；本地名命中多个命名空间时返回歧义错误。
fn lookup_operation<'d>(
    port: &QName,
    operations: &'d [OperationDescriptor],
    operation: OperationRef<'_>,
) -> Result<&'d OperationDescriptor> {
    let mut hits = operations
        .iter()
        .filter(|descriptor| operation.matches(descriptor.name()));
    match (hits.next(), hits.next()) {
        (Some(descriptor), None) => Ok(descriptor),
        (None, _) => Err(RpcError::UnknownOperation {
            port: port.clone(),
            operation: operation.to_string(),
        }),
        (Some(first), Some(second)) => {
            let candidates = [first, second]
                .into_iter()
                .chain(hits)
                .map(|descriptor| descriptor.name().to_string())
                .collect();
            Err(RpcError::AmbiguousOperation {
                port: port.clone(),
                operation: operation.to_string(),
                candidates,
            })
        }
    }
}

/// 一次远程操作调用的句柄。
#[derive(Clone, Debug)]
pub struct Call {
    state: CallState,
    service_name: Option<QName>,
    port_name: Option<QName>,
    port_type_name: Option<QName>,
    operation_name: Option<QName>,
    target_endpoint_address: Option<String>,
    parameters: Vec<ParameterDescriptor>,
    return_type: Option<QName>,
    operation_style: OperationStyle,
    encoding_style: EncodingStyle,
    soap_action: Option<String>,
    properties: BTreeMap<String, Value>,
    port_operations: Option<Arc<[OperationDescriptor]>>,
    type_mappings: TypeMappingSnapshot,
    interceptors: InterceptorChain,
}

impl Call {
    /// 创建未配置句柄。
    pub fn unconfigured(type_mappings: TypeMappingSnapshot, interceptors: InterceptorChain) -> Self {
        Self {
            state: CallState::Unconfigured,
            service_name: None,
            port_name: None,
            port_type_name: None,
            operation_name: None,
            target_endpoint_address: None,
            parameters: Vec::new(),
            return_type: None,
            operation_style: OperationStyle::default(),
            encoding_style: EncodingStyle::default(),
            soap_action: None,
            properties: BTreeMap::new(),
            port_operations: None,
            type_mappings,
            interceptors,
        }
    }

    /// 创建绑定端口、尚未绑定操作的句柄。
    pub fn for_port(
        port: &PortBinding,
        type_mappings: TypeMappingSnapshot,
        interceptors: InterceptorChain,
    ) -> Self {
        let mut call = Self::unconfigured(type_mappings, interceptors);
        call.state = CallState::PortBound;
        call.service_name = Some(port.service_name.clone());
        call.port_name = Some(port.port_name.clone());
        call.port_type_name = port.binding.port_type().cloned();
        call.target_endpoint_address = port.binding.address().map(str::to_owned);
        call.encoding_style = port.encoding_style.clone();
        call.port_operations = Some(Arc::clone(&port.operations));
        call
    }

    /// 创建绑定到指定操作的预配置句柄。
    pub fn for_operation(
        port: &PortBinding,
        operation: &OperationDescriptor,
        type_mappings: TypeMappingSnapshot,
        interceptors: InterceptorChain,
    ) -> Self {
        let mut call = Self::for_port(port, type_mappings, interceptors);
        call.apply_operation(operation);
        call.state = CallState::Preconfigured;
        call
    }

    fn apply_operation(&mut self, operation: &OperationDescriptor) {
        self.operation_name = Some(operation.name().clone());
        self.parameters = operation.parameters().to_vec();
        self.return_type = operation.return_type().cloned();
        self.operation_style = operation.style();
        self.soap_action = operation.soap_action().map(str::to_owned);
    }

    /// 寻址字段（端口、端口类型、地址）仅在未配置状态下可改。
    fn ensure_addressing_mutable(&self, property: &'static str) -> Result<()> {
        match self.state {
            CallState::Unconfigured => Ok(()),
            state => Err(self.read_only(property, state)),
        }
    }

    /// 签名字段在预配置状态下只读。
    fn ensure_signature_mutable(&self, property: &'static str) -> Result<()> {
        match self.state {
            CallState::Unconfigured | CallState::PortBound => Ok(()),
            state => Err(self.read_only(property, state)),
        }
    }

    fn read_only(&self, property: &'static str, state: CallState) -> RpcError {
        tracing::warn!(
            property,
            ?state,
            operation = ?self.operation_name,
            "rejected mutation of a configured call"
        );
        RpcError::ReadOnlyCall { property, state }
    }

    pub fn set_port_name(&mut self, port_name: QName) -> Result<&mut Self> {
        self.ensure_addressing_mutable("port name")?;
        self.port_name = Some(port_name);
        Ok(self)
    }

    pub fn set_port_type_name(&mut self, port_type_name: QName) -> Result<&mut Self> {
        self.ensure_addressing_mutable("port type name")?;
        self.port_type_name = Some(port_type_name);
        Ok(self)
    }

    pub fn set_target_endpoint_address(
        &mut self,
        address: impl Into<String>,
    ) -> Result<&mut Self> {
        self.ensure_addressing_mutable("target endpoint address")?;
        self.target_endpoint_address = Some(address.into());
        Ok(self)
    }

    /// 手工设置操作名，不会从端口元数据补全签名。
    pub fn set_operation_name(&mut self, operation_name: QName) -> Result<&mut Self> {
        self.ensure_signature_mutable("operation name")?;
        self.operation_name = Some(operation_name);
        Ok(self)
    }

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        xml_type: QName,
        mode: ParameterMode,
    ) -> Result<&mut Self> {
        self.ensure_signature_mutable("parameters")?;
        self.parameters
            .push(ParameterDescriptor::new(name, xml_type, mode));
        Ok(self)
    }

    pub fn remove_all_parameters(&mut self) -> Result<&mut Self> {
        self.ensure_signature_mutable("parameters")?;
        self.parameters.clear();
        Ok(self)
    }

    pub fn set_return_type(&mut self, return_type: Option<QName>) -> Result<&mut Self> {
        self.ensure_signature_mutable("return type")?;
        self.return_type = return_type;
        Ok(self)
    }

    pub fn set_operation_style(&mut self, style: OperationStyle) -> Result<&mut Self> {
        self.ensure_signature_mutable("operation style")?;
        self.operation_style = style;
        Ok(self)
    }

    pub fn set_encoding_style(&mut self, encoding_style: EncodingStyle) -> Result<&mut Self> {
        self.ensure_signature_mutable("encoding style")?;
        self.encoding_style = encoding_style;
        Ok(self)
    }

    pub fn set_soap_action(&mut self, soap_action: Option<String>) -> Result<&mut Self> {
        self.ensure_signature_mutable("soap action")?;
        self.soap_action = soap_action;
        Ok(self)
    }

    /// 从端口元数据绑定操作，成功后句柄进入预配置状态。
    pub fn bind_operation(&mut self, operation: OperationRef<'_>) -> Result<&mut Self> {
        match self.state {
            CallState::Unconfigured => {
                return Err(RpcError::IncompleteCall {
                    missing: "port binding",
                });
            }
            CallState::Preconfigured => {
                return Err(self.read_only("operation", CallState::Preconfigured));
            }
            CallState::PortBound => {}
        }
        let unbound = QName::local("<unbound>");
        let port = self.port_name.as_ref().unwrap_or(&unbound);
        let operations = self.port_operations.as_deref().unwrap_or_default();
        let descriptor = lookup_operation(port, operations, operation)?.clone();
        self.apply_operation(&descriptor);
        self.state = CallState::Preconfigured;
        Ok(self)
    }

    /// 设置属性。签名相关的标准属性会路由到对应 setter 并受状态约束。
    pub fn set_property(&mut self, name: &str, value: Value) -> Result<&mut Self> {
        properties::check_shape(name, &value)?;
        match name {
            properties::SOAPACTION_URI => {
                let action = value.as_str().map(str::to_owned);
                self.set_soap_action(action)
            }
            properties::ENCODING_STYLE_URI => {
                let style = EncodingStyle::new(value.as_str().unwrap_or_default().to_owned());
                self.set_encoding_style(style)
            }
            properties::OPERATION_STYLE => {
                let style = match value.as_str() {
                    Some("rpc") => OperationStyle::Rpc,
                    Some("document") => OperationStyle::Document,
                    _ => {
                        return Err(RpcError::InvalidProperty {
                            name: name.to_owned(),
                            detail: format!("expected \"rpc\" or \"document\", got {value}"),
                        });
                    }
                };
                self.set_operation_style(style)
            }
            _ => {
                self.properties.insert(name.to_owned(), value);
                Ok(self)
            }
        }
    }

    /// 移除自由属性；路由到字段的标准属性不受影响。
    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// 读取属性，签名相关的标准属性从对应字段合成。
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            properties::SOAPACTION_URI => self.soap_action.clone().map(Value::String),
            properties::ENCODING_STYLE_URI => {
                Some(Value::String(self.encoding_style.as_str().to_owned()))
            }
            properties::OPERATION_STYLE => {
                Some(Value::String(self.operation_style.as_str().to_owned()))
            }
            _ => self.properties.get(name).cloned(),
        }
    }

    /// 已设置的自由属性名。
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn is_preconfigured(&self) -> bool {
        self.state == CallState::Preconfigured
    }

    pub fn service_name(&self) -> Option<&QName> {
        self.service_name.as_ref()
    }

    pub fn port_name(&self) -> Option<&QName> {
        self.port_name.as_ref()
    }

    pub fn port_type_name(&self) -> Option<&QName> {
        self.port_type_name.as_ref()
    }

    pub fn operation_name(&self) -> Option<&QName> {
        self.operation_name.as_ref()
    }

    pub fn target_endpoint_address(&self) -> Option<&str> {
        self.target_endpoint_address.as_deref()
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn parameter_type_by_name(&self, name: &str) -> Option<&QName> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name() == name)
            .map(ParameterDescriptor::xml_type)
    }

    pub fn return_type(&self) -> Option<&QName> {
        self.return_type.as_ref()
    }

    pub fn operation_style(&self) -> OperationStyle {
        self.operation_style
    }

    pub fn encoding_style(&self) -> &EncodingStyle {
        &self.encoding_style
    }

    pub fn soap_action(&self) -> Option<&str> {
        self.soap_action.as_deref()
    }

    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    /// 端口绑定句柄可选的操作；未绑定端口时为空。
    pub fn port_operations(&self) -> &[OperationDescriptor] {
        self.port_operations.as_deref().unwrap_or_default()
    }

    /// 调用 `operation` 前是否需要手工声明参数与返回类型。
    pub fn is_parameter_and_return_spec_required(&self, operation: &QName) -> bool {
        match self.state {
            CallState::Preconfigured => false,
            CallState::PortBound => !self
                .port_operations()
                .iter()
                .any(|descriptor| descriptor.name() == operation),
            CallState::Unconfigured => true,
        }
    }

    /// 当前编码风格下生效的类型映射。
    pub fn type_mapping(&self) -> Option<&TypeMapping> {
        self.type_mappings.resolve(&self.encoding_style)
    }

    /// 校验句柄是否具备执行条件：操作名、目标地址、类型映射齐全，且所有参数与返回类型均有映射。
    pub fn validate(&self) -> Result<()> {
        if self.operation_name.is_none() {
            return Err(RpcError::IncompleteCall {
                missing: "operation name",
            });
        }
        if self.target_endpoint_address.is_none() {
            return Err(RpcError::IncompleteCall {
                missing: "target endpoint address",
            });
        }
        let mapping = self.type_mapping().ok_or(RpcError::IncompleteCall {
            missing: "type mapping",
        })?;
        for parameter in &self.parameters {
            if !mapping.is_registered(parameter.xml_type()) {
                return Err(self.unmapped(parameter.name(), parameter.xml_type()));
            }
        }
        if let Some(return_type) = &self.return_type {
            if !mapping.is_registered(return_type) {
                return Err(self.unmapped("return", return_type));
            }
        }
        Ok(())
    }

    fn unmapped(&self, parameter: &str, xml_type: &QName) -> RpcError {
        RpcError::Marshal {
            parameter: parameter.to_owned(),
            detail: format!(
                "no type mapping for `{xml_type}` under encoding style `{}`",
                self.encoding_style
            ),
        }
    }

    /// 执行请求-响应调用。
    ///
    /// # 执行流程（How）
    /// 1. [`Self::validate`] 并按类型映射检查实参；
    /// 2. 按链顺序执行拦截器请求钩子；
    /// 3. 交给 `executor` 执行，并按返回类型检查结果；
    /// 4. 逆序执行响应钩子；任一步骤失败时逆序通知已执行拦截器的故障钩子。
    pub fn invoke(&self, executor: &dyn CallExecutor, arguments: Vec<Value>) -> Result<Value> {
        let mut context = self.prepare(arguments)?;
        let entered = self.run_request_chain(&mut context)?;
        let outcome = executor
            .execute(self, &mut context)
            .and_then(|response| self.check_return(response));
        let response = match outcome {
            Ok(response) => response,
            Err(error) => {
                self.notify_fault(&context, &error, entered);
                return Err(error);
            }
        };
        context.set_response(response);
        for entry in self.interceptors.iter().rev() {
            if let Err(error) = entry.interceptor().handle_response(&mut context) {
                self.notify_fault(&context, &error, entered);
                return Err(error);
            }
        }
        Ok(context.take_response().unwrap_or(Value::Null))
    }

    /// 执行单向调用，不等待也不检查响应。
    pub fn invoke_one_way(&self, executor: &dyn CallExecutor, arguments: Vec<Value>) -> Result<()> {
        let mut context = self.prepare(arguments)?;
        let entered = self.run_request_chain(&mut context)?;
        executor
            .execute_one_way(self, &mut context)
            .inspect_err(|error| self.notify_fault(&context, error, entered))
    }

    fn prepare(&self, arguments: Vec<Value>) -> Result<InvocationContext> {
        self.validate()?;
        let inputs: Vec<&ParameterDescriptor> = self
            .parameters
            .iter()
            .filter(|parameter| parameter.mode().is_input())
            .collect();
        if inputs.len() != arguments.len() {
            return Err(RpcError::Marshal {
                parameter: "<arguments>".to_owned(),
                detail: format!(
                    "expected {} argument(s), got {}",
                    inputs.len(),
                    arguments.len()
                ),
            });
        }
        let mapping = self.type_mapping().ok_or(RpcError::IncompleteCall {
            missing: "type mapping",
        })?;
        for (parameter, value) in inputs.iter().zip(&arguments) {
            let Some(local_type) = mapping.local_type(parameter.xml_type()) else {
                return Err(self.unmapped(parameter.name(), parameter.xml_type()));
            };
            if !local_type.accepts(value) {
                return Err(RpcError::Marshal {
                    parameter: parameter.name().to_owned(),
                    detail: format!(
                        "value {value} does not conform to `{}` ({local_type:?})",
                        parameter.xml_type()
                    ),
                });
            }
        }
        let operation = self.operation_name.clone().ok_or(RpcError::IncompleteCall {
            missing: "operation name",
        })?;
        tracing::debug!(
            operation = %operation,
            port = ?self.port_name,
            arguments = arguments.len(),
            "invoking call"
        );
        Ok(InvocationContext::new(
            operation,
            self.port_name.clone(),
            self.target_endpoint_address.clone(),
            arguments,
            self.properties.clone(),
        ))
    }

    /// 顺序执行请求钩子，返回成功执行的拦截器数量。
    fn run_request_chain(&self, context: &mut InvocationContext) -> Result<usize> {
        for (index, entry) in self.interceptors.iter().enumerate() {
            if let Err(error) = entry.interceptor().handle_request(context) {
                tracing::debug!(label = entry.label(), %error, "interceptor rejected request");
                self.notify_fault(context, &error, index);
                return Err(error);
            }
        }
        Ok(self.interceptors.len())
    }

    fn notify_fault(&self, context: &InvocationContext, error: &RpcError, entered: usize) {
        for entry in self.interceptors.iter().take(entered).rev() {
            entry.interceptor().handle_fault(context, error);
        }
    }

    fn check_return(&self, response: Value) -> Result<Value> {
        let Some(return_type) = &self.return_type else {
            return Ok(response);
        };
        let accepted = self
            .type_mapping()
            .and_then(|mapping| mapping.local_type(return_type))
            .is_some_and(|local_type| local_type.accepts(&response));
        if accepted {
            Ok(response)
        } else {
            Err(RpcError::Marshal {
                parameter: "return".to_owned(),
                detail: format!("response {response} does not conform to `{return_type}`"),
            })
        }
    }
}
