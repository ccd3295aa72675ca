//! 端点代理：以静态 trait 表达能力契约，以分发表把契约方法映射到远端操作。
//!
//! # 教案级说明
//! - **意图 (Why)**：调用方声明一个实现 [`EndpointContract`] 的具体类型，工厂解析端口后构造
//!   [`EndpointBinding`] 并交给 [`EndpointContract::from_binding`]，不需要运行时生成代码；
//! - **契约 (What)**：契约声明的每个 [`OperationSignature`] 必须在端口上找到唯一对应的操作，否则解析以
//!   [`RpcError::ContractMismatch`] 失败；分发表在解析完成后不可变；
//! - **执行 (How)**：分发表的每一项持有一个预配置 [`Call`] 模板与一个编组闭包，闭包在调用时
//!   校验实参并经由 [`CallExecutor`] 执行；
//! - **权衡 (Trade-offs)**：契约方法的参数在分发层统一表示为 [`Value`]，类型安全由契约实现方
//!   借助 [`EndpointBinding::invoke_as`] 在边界上恢复。

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::call::{Call, CallExecutor};
use crate::error::{Result, RpcError};
use crate::metadata::OperationDescriptor;
use crate::qname::QName;

/// 契约中的一个方法签名。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationSignature {
    name: Cow<'static, str>,
    arity: Option<usize>,
}

impl OperationSignature {
    /// 按名称匹配的签名；名称既可以是本地名，也可以是 `{ns}local` 形式的限定名。
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            arity: None,
        }
    }

    /// 额外要求端口操作的输入参数个数一致。
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    /// 判断端口操作是否满足该签名。
    pub fn matches(&self, operation: &OperationDescriptor) -> bool {
        let name = operation.name();
        let named = name.local_part() == self.name || name.to_string() == self.name;
        named
            && self
                .arity
                .is_none_or(|arity| arity == operation.input_arity())
    }
}

/// 调用方提供的能力契约。
///
/// 实现类型通常是一个包装 [`EndpointBinding`] 的结构体，其方法通过
/// [`EndpointBinding::invoke`] 或 [`EndpointBinding::invoke_as`] 转发到远端操作。
pub trait EndpointContract: Sized + Send + Sync + 'static {
    /// 契约名称，用于错误与日志。
    const NAME: &'static str;

    /// 契约声明的全部操作签名。
    fn operations() -> Vec<OperationSignature>;

    /// 由已解析的绑定构造代理。
    fn from_binding(binding: EndpointBinding) -> Self;
}

/// 能力契约的类型擦除描述，供对象安全的工厂方法使用。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractDescriptor {
    name: Cow<'static, str>,
    operations: Vec<OperationSignature>,
}

impl ContractDescriptor {
    pub fn new(name: impl Into<Cow<'static, str>>, operations: Vec<OperationSignature>) -> Self {
        Self {
            name: name.into(),
            operations,
        }
    }

    /// 从静态契约类型生成描述。
    pub fn of<C: EndpointContract>() -> Self {
        Self::new(C::NAME, C::operations())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operations(&self) -> &[OperationSignature] {
        &self.operations
    }

    /// 判断端口操作集合能否满足契约，不构造任何句柄。
    pub fn is_satisfied_by(&self, operations: &[OperationDescriptor]) -> bool {
        match_contract(&self.operations, operations).is_ok()
    }

    /// 构造指向本契约的 [`RpcError::ContractMismatch`]。
    pub fn mismatch(&self, port: Option<QName>, missing: Vec<String>) -> RpcError {
        RpcError::ContractMismatch {
            contract: self.name.clone(),
            port,
            missing,
        }
    }
}

/// 把契约签名逐一匹配到端口操作。
///
/// 成功时按签名顺序返回 `(签名名称, 操作描述)`；失败时返回全部未匹配的签名名称。
/// 一个签名匹配到多个操作（例如同名不同命名空间）视为未匹配，避免分发歧义。
pub fn match_contract<'a>(
    signatures: &[OperationSignature],
    operations: &'a [OperationDescriptor],
) -> core::result::Result<Vec<(String, &'a OperationDescriptor)>, Vec<String>> {
    let mut matched = Vec::with_capacity(signatures.len());
    let mut missing = Vec::new();
    for signature in signatures {
        let mut candidates = operations
            .iter()
            .filter(|operation| signature.matches(operation));
        match (candidates.next(), candidates.next()) {
            (Some(operation), None) => matched.push((signature.name().to_owned(), operation)),
            _ => missing.push(signature.name().to_owned()),
        }
    }
    if missing.is_empty() {
        Ok(matched)
    } else {
        Err(missing)
    }
}

/// 分发表中一个操作的编组闭包。
pub type Dispatch = Arc<dyn Fn(&dyn CallExecutor, Vec<Value>) -> Result<Value> + Send + Sync>;

/// 分发表条目：预配置句柄模板与编组闭包。
#[derive(Clone)]
pub struct DispatchEntry {
    template: Arc<Call>,
    dispatch: Dispatch,
}

impl DispatchEntry {
    /// 以句柄模板构造条目，闭包直接调用 [`Call::invoke`]。
    pub fn from_call(call: Call) -> Self {
        let template = Arc::new(call);
        let captured = Arc::clone(&template);
        Self {
            template,
            dispatch: Arc::new(move |executor: &dyn CallExecutor, arguments: Vec<Value>| {
                captured.invoke(executor, arguments)
            }),
        }
    }

    pub fn template(&self) -> &Call {
        &self.template
    }
}

impl fmt::Debug for DispatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEntry")
            .field("operation", &self.template.operation_name())
            .finish_non_exhaustive()
    }
}

/// 已解析端口与能力契约之间的绑定，是所有代理的内部状态。
///
/// 每次解析产生新的绑定；绑定之间不共享可变状态，也不持有工厂引用。
#[derive(Clone)]
pub struct EndpointBinding {
    contract: Cow<'static, str>,
    port_name: QName,
    endpoint_address: String,
    executor: Arc<dyn CallExecutor>,
    dispatch: BTreeMap<String, DispatchEntry>,
}

impl EndpointBinding {
    pub fn new(
        contract: impl Into<Cow<'static, str>>,
        port_name: QName,
        endpoint_address: impl Into<String>,
        executor: Arc<dyn CallExecutor>,
        dispatch: BTreeMap<String, DispatchEntry>,
    ) -> Self {
        Self {
            contract: contract.into(),
            port_name,
            endpoint_address: endpoint_address.into(),
            executor,
            dispatch,
        }
    }

    /// 通过分发表调用契约方法。
    pub fn invoke(&self, operation: &str, arguments: Vec<Value>) -> Result<Value> {
        let entry = self
            .dispatch
            .get(operation)
            .ok_or_else(|| RpcError::UnknownOperation {
                port: self.port_name.clone(),
                operation: operation.to_owned(),
            })?;
        (entry.dispatch)(self.executor.as_ref(), arguments)
    }

    /// 调用契约方法并把结果反序列化为本地类型。
    pub fn invoke_as<R: DeserializeOwned>(
        &self,
        operation: &str,
        arguments: Vec<Value>,
    ) -> Result<R> {
        let response = self.invoke(operation, arguments)?;
        serde_json::from_value(response).map_err(|error| RpcError::Marshal {
            parameter: "return".to_owned(),
            detail: error.to_string(),
        })
    }

    /// 契约方法对应的句柄模板，可用于检查预配置的签名。
    pub fn call_template(&self, operation: &str) -> Option<&Call> {
        self.dispatch.get(operation).map(DispatchEntry::template)
    }

    /// 分发表中的契约方法名。
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.dispatch.keys().map(String::as_str)
    }

    pub fn port_name(&self) -> &QName {
        &self.port_name
    }

    pub fn endpoint_address(&self) -> &str {
        &self.endpoint_address
    }

    pub fn contract_name(&self) -> &str {
        &self.contract
    }
}

impl fmt::Debug for EndpointBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointBinding")
            .field("contract", &self.contract)
            .field("port_name", &self.port_name)
            .field("endpoint_address", &self.endpoint_address)
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::XSD_NAMESPACE;
    use crate::metadata::{ParameterDescriptor, ParameterMode};

    fn operations() -> Vec<OperationDescriptor> {
        let string = QName::new(XSD_NAMESPACE, "string");
        let int = QName::new(XSD_NAMESPACE, "int");
        vec![
            OperationDescriptor::new(QName::new("urn:weather", "getTemperature")).with_parameter(
                ParameterDescriptor::new("city", string.clone(), ParameterMode::In),
            ),
            OperationDescriptor::new(QName::new("urn:weather", "getForecast"))
                .with_parameter(ParameterDescriptor::new("city", string, ParameterMode::In))
                .with_parameter(ParameterDescriptor::new("days", int, ParameterMode::In)),
        ]
    }

    #[test]
    fn signatures_match_by_local_or_qualified_name() {
        let operations = operations();
        let signatures = vec![
            OperationSignature::new("getTemperature"),
            OperationSignature::new("{urn:weather}getForecast").with_arity(2),
        ];
        let matched = match_contract(&signatures, &operations).expect("契约应被满足");
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[1].1.name().local_part(), "getForecast");
    }

    #[test]
    fn missing_and_mismatched_arity_are_reported() {
        let operations = operations();
        let signatures = vec![
            OperationSignature::new("getTemperature").with_arity(2),
            OperationSignature::new("getHumidity"),
        ];
        assert_eq!(
            match_contract(&signatures, &operations).unwrap_err(),
            vec!["getTemperature".to_owned(), "getHumidity".to_owned()]
        );
    }

    #[test]
    fn ambiguous_local_name_is_not_matched() {
        let mut operations = operations();
        operations.push(OperationDescriptor::new(QName::new(
            "urn:legacy",
            "getTemperature",
        )));
        let descriptor =
            ContractDescriptor::new("Thermo", vec![OperationSignature::new("getTemperature")]);
        assert!(!descriptor.is_satisfied_by(&operations));

        let qualified = ContractDescriptor::new(
            "Thermo",
            vec![OperationSignature::new("{urn:legacy}getTemperature")],
        );
        assert!(qualified.is_satisfied_by(&operations));
    }
}
