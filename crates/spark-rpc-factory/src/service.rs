use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use spark_rpc_core::{
    Call, CallExecutor, Capability, ContractDescriptor, DispatchEntry, DocumentLocation,
    EncodingStyle, EndpointBinding, InterceptorChain, InterceptorRegistry, MetadataStore,
    OperationDescriptor, OperationRef, PortBinding, Ports, QName, Result, RpcError, RpcErrorKind,
    ServiceFactory, TypeMappingRegistry, TypeMappingSnapshot, UnboundExecutor, match_contract,
};

use crate::config::{ConfigError, FactoryConfig};
use crate::selection;

/// 基于 [`MetadataStore`] 的默认服务工厂。
///
/// # 教案级说明
/// - **意图 (Why)**：以一个元数据源为根，按需把端口/操作标识解析为预配置的 [`Call`] 与端点代理，
///   调用方不需要手工拼装地址、签名与类型映射；
/// - **契约 (What)**：
///   - 构造后元数据只读，工厂可在多个线程上并发使用；
///   - 每次解析都重新读取元数据并生成新值，不缓存句柄或代理；
///   - 一次解析只捕获一次注册表快照，同一批句柄看到同一版本的类型映射与拦截器链；
/// - **校验 (How)**：端口必须存在于端口集合；绑定信息、地址与操作列表缺一即
///   [`RpcError::MetadataUnavailable`]；操作重名、协议不受支持、参数类型没有映射等自相矛盾的元数据
///   归为 [`RpcError::Factory`]。
pub struct MetadataServiceFactory {
    store: Arc<dyn MetadataStore>,
    config: FactoryConfig,
    type_mappings: Arc<TypeMappingRegistry>,
    interceptors: Arc<InterceptorRegistry>,
    executor: Arc<dyn CallExecutor>,
}

impl MetadataServiceFactory {
    /// 使用默认配置、标准类型映射与空拦截器链构造工厂。
    pub fn new(store: impl MetadataStore) -> Self {
        Self {
            store: Arc::new(store),
            config: FactoryConfig::default(),
            type_mappings: Arc::new(TypeMappingRegistry::with_standard_mappings()),
            interceptors: Arc::new(InterceptorRegistry::new()),
            executor: Arc::new(UnboundExecutor),
        }
    }

    pub fn builder(store: impl MetadataStore) -> MetadataServiceFactoryBuilder {
        MetadataServiceFactoryBuilder::new(Arc::new(store))
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    fn known_ports(&self) -> Result<Vec<QName>> {
        self.store.ports().ok_or_else(|| {
            RpcError::metadata_unavailable(format!(
                "service `{}` does not declare a port set",
                self.store.service_name()
            ))
        })
    }

    fn ensure_declared(&self, port: &QName) -> Result<()> {
        if self.known_ports()?.contains(port) {
            return Ok(());
        }
        tracing::warn!(
            service = %self.store.service_name(),
            port = %port,
            "requested port is not declared"
        );
        Err(RpcError::UnknownPort {
            service: self.store.service_name().clone(),
            port: port.clone(),
        })
    }

    /// 读取并校验端口元数据，前提是端口已声明。
    fn bind_declared_port(&self, port: &QName) -> Result<PortBinding> {
        let binding = self.store.binding_info_for_port(port).ok_or_else(|| {
            RpcError::metadata_unavailable(format!("port `{port}` has no binding information"))
        })?;
        if !self.config.supports(binding.protocol()) {
            return Err(RpcError::factory(format!(
                "port `{port}` uses protocol binding {:?}, which this factory does not support",
                binding.protocol()
            )));
        }
        if binding.address().is_none() {
            return Err(RpcError::metadata_unavailable(format!(
                "port `{port}` has no endpoint address"
            )));
        }
        let operations = self.store.operations_for_port(port).ok_or_else(|| {
            RpcError::metadata_unavailable(format!("operation list of port `{port}` is unknown"))
        })?;
        ensure_unique_operations(port, &operations)?;
        let encoding_style = binding
            .encoding_style()
            .map(|style| EncodingStyle::new(style.to_owned()))
            .unwrap_or_else(|| self.config.default_encoding_style());
        Ok(PortBinding::new(
            self.store.service_name().clone(),
            port.clone(),
            binding,
            encoding_style,
            operations,
        ))
    }

    fn bind_port(&self, port: &QName) -> Result<PortBinding> {
        self.ensure_declared(port)?;
        self.bind_declared_port(port)
    }

    fn snapshots(&self, port: Option<&QName>) -> (TypeMappingSnapshot, InterceptorChain) {
        (
            self.type_mappings.snapshot(),
            self.interceptors.chain_for(port),
        )
    }

    /// 生成预配置句柄并确认其签名能被类型映射完整覆盖。
    fn preconfigured(
        &self,
        port: &PortBinding,
        operation: &OperationDescriptor,
        type_mappings: &TypeMappingSnapshot,
        interceptors: &InterceptorChain,
    ) -> Result<Call> {
        let call = Call::for_operation(
            port,
            operation,
            type_mappings.clone(),
            interceptors.clone(),
        );
        call.validate().map_err(|error| {
            RpcError::factory(format!(
                "operation `{}` on port `{}` is inconsistent with the type mappings: {error}",
                operation.name(),
                port.port_name()
            ))
        })?;
        Ok(call)
    }

    /// 在已绑定的端口上构造满足契约的代理绑定。
    fn bind_contract(
        &self,
        port: &PortBinding,
        contract: &ContractDescriptor,
    ) -> Result<EndpointBinding> {
        let matched = match_contract(contract.operations(), port.operations()).map_err(|missing| {
            contract.mismatch(Some(port.port_name().clone()), missing)
        })?;
        let (type_mappings, interceptors) = self.snapshots(Some(port.port_name()));
        let mut dispatch = BTreeMap::new();
        for (method, operation) in matched {
            let call = self.preconfigured(port, operation, &type_mappings, &interceptors)?;
            dispatch.insert(method, DispatchEntry::from_call(call));
        }
        let address = port.binding().address().ok_or_else(|| {
            RpcError::metadata_unavailable(format!(
                "port `{}` has no endpoint address",
                port.port_name()
            ))
        })?;
        Ok(EndpointBinding::new(
            contract.name().to_owned(),
            port.port_name().clone(),
            address,
            Arc::clone(&self.executor),
            dispatch,
        ))
    }

    /// 省略端口时按配置的顺序逐个尝试候选端口。
    fn select_for_contract(&self, contract: &ContractDescriptor) -> Result<EndpointBinding> {
        let ports = self.known_ports()?;
        let mut eligible = 0usize;
        // 元数据完整但被工厂拒绝的端口（例如协议不受支持）。
        let mut rejected: Vec<String> = Vec::new();
        // 所有合格端口都缺失的契约方法。
        let mut unsatisfied: Option<Vec<String>> = None;
        let chosen = selection::select(&ports, self.config.port_selection, |candidate| {
            let port = match self.bind_declared_port(candidate) {
                Ok(port) => port,
                Err(error) => {
                    tracing::debug!(port = %candidate, %error, "port skipped during selection");
                    if error.kind() != RpcErrorKind::MetadataUnavailable {
                        rejected.push(candidate.to_string());
                    }
                    return None;
                }
            };
            eligible += 1;
            match self.bind_contract(&port, contract) {
                Ok(binding) => Some(Ok(binding)),
                Err(RpcError::ContractMismatch { missing, .. }) => {
                    tracing::debug!(port = %candidate, ?missing, "port does not satisfy contract");
                    unsatisfied = Some(match unsatisfied.take() {
                        None => missing,
                        Some(previous) => previous
                            .into_iter()
                            .filter(|name| missing.contains(name))
                            .collect(),
                    });
                    None
                }
                Err(error) => Some(Err(error)),
            }
        });
        match chosen {
            Some(result) => result,
            None if eligible == 0 && !rejected.is_empty() => Err(RpcError::factory(format!(
                "no port of service `{}` is usable by this factory; rejected ports: {rejected:?}",
                self.store.service_name()
            ))),
            None if eligible == 0 && !ports.is_empty() => Err(RpcError::metadata_unavailable(
                format!(
                    "no port of service `{}` carries complete metadata",
                    self.store.service_name()
                ),
            )),
            None => {
                tracing::warn!(
                    service = %self.store.service_name(),
                    contract = contract.name(),
                    "no port satisfies the contract"
                );
                let missing = unsatisfied
                    .filter(|missing| !missing.is_empty())
                    .unwrap_or_else(|| {
                        contract
                            .operations()
                            .iter()
                            .map(|signature| signature.name().to_owned())
                            .collect()
                    });
                Err(contract.mismatch(None, missing))
            }
        }
    }
}

fn ensure_unique_operations(port: &QName, operations: &[OperationDescriptor]) -> Result<()> {
    for (index, operation) in operations.iter().enumerate() {
        if operations[..index]
            .iter()
            .any(|earlier| earlier.name() == operation.name())
        {
            return Err(RpcError::factory(format!(
                "operation `{}` is declared more than once on port `{port}`",
                operation.name()
            )));
        }
    }
    Ok(())
}

impl ServiceFactory for MetadataServiceFactory {
    fn service_name(&self) -> &QName {
        self.store.service_name()
    }

    fn ports(&self) -> Result<Ports> {
        self.known_ports().map(Ports::new)
    }

    fn document_location(&self) -> Option<&DocumentLocation> {
        self.store.document_location()
    }

    fn type_mapping_registry(&self) -> Result<Arc<TypeMappingRegistry>> {
        if !self.config.allow_type_mapping_customization {
            return Err(RpcError::UnsupportedCapability {
                capability: Capability::TypeMappingCustomization,
            });
        }
        Ok(Arc::clone(&self.type_mappings))
    }

    fn interceptor_registry(&self) -> Result<Arc<InterceptorRegistry>> {
        if !self.config.allow_interceptor_customization {
            return Err(RpcError::UnsupportedCapability {
                capability: Capability::InterceptorCustomization,
            });
        }
        Ok(Arc::clone(&self.interceptors))
    }

    fn get_calls(&self, port: &QName) -> Result<Vec<Call>> {
        let binding = self.bind_port(port)?;
        let (type_mappings, interceptors) = self.snapshots(Some(port));
        let calls = binding
            .operations()
            .iter()
            .map(|operation| self.preconfigured(&binding, operation, &type_mappings, &interceptors))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(port = %port, calls = calls.len(), "calls enumerated");
        Ok(calls)
    }

    fn create_call(
        &self,
        port: Option<&QName>,
        operation: Option<OperationRef<'_>>,
    ) -> Result<Call> {
        match (port, operation) {
            (None, None) => {
                let (type_mappings, interceptors) = self.snapshots(None);
                Ok(Call::unconfigured(type_mappings, interceptors))
            }
            (None, Some(operation)) => Err(RpcError::factory(format!(
                "operation `{operation}` cannot be bound without a port"
            ))),
            (Some(port), None) => {
                let binding = self.bind_port(port)?;
                let (type_mappings, interceptors) = self.snapshots(Some(port));
                Ok(Call::for_port(&binding, type_mappings, interceptors))
            }
            (Some(port), Some(operation)) => {
                let binding = self.bind_port(port)?;
                let descriptor = binding.find_operation(operation).inspect_err(|error| {
                    tracing::warn!(
                        port = %port,
                        operation = %operation,
                        %error,
                        "operation lookup failed"
                    );
                })?;
                let (type_mappings, interceptors) = self.snapshots(Some(port));
                self.preconfigured(&binding, descriptor, &type_mappings, &interceptors)
            }
        }
    }

    fn resolve_binding(
        &self,
        port: Option<&QName>,
        contract: &ContractDescriptor,
    ) -> Result<EndpointBinding> {
        let binding = match port {
            Some(port) => {
                let bound = self.bind_port(port)?;
                self.bind_contract(&bound, contract).inspect_err(|error| {
                    tracing::warn!(port = %port, contract = contract.name(), %error, "resolution rejected");
                })?
            }
            None => self.select_for_contract(contract)?,
        };
        tracing::debug!(
            port = %binding.port_name(),
            contract = contract.name(),
            address = binding.endpoint_address(),
            "endpoint resolved"
        );
        Ok(binding)
    }
}

impl fmt::Debug for MetadataServiceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataServiceFactory")
            .field("service_name", self.store.service_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// [`MetadataServiceFactory`] 构建器。
///
/// 未提供的注册表会新建；同一个注册表 `Arc` 可以交给多个工厂共享。
pub struct MetadataServiceFactoryBuilder {
    store: Arc<dyn MetadataStore>,
    config: FactoryConfig,
    type_mappings: Option<Arc<TypeMappingRegistry>>,
    interceptors: Option<Arc<InterceptorRegistry>>,
    executor: Option<Arc<dyn CallExecutor>>,
}

impl MetadataServiceFactoryBuilder {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            config: FactoryConfig::default(),
            type_mappings: None,
            interceptors: None,
            executor: None,
        }
    }

    pub fn config(mut self, config: FactoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn type_mapping_registry(mut self, registry: Arc<TypeMappingRegistry>) -> Self {
        self.type_mappings = Some(registry);
        self
    }

    pub fn interceptor_registry(mut self, registry: Arc<InterceptorRegistry>) -> Self {
        self.interceptors = Some(registry);
        self
    }

    /// 代理执行调用所用的执行器；未设置时所有代理调用都以
    /// [`RpcError::Invocation`] 失败。
    pub fn executor(mut self, executor: Arc<dyn CallExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> Result<MetadataServiceFactory, ConfigError> {
        self.config.validate()?;
        tracing::debug!(
            service = %self.store.service_name(),
            port_selection = ?self.config.port_selection,
            "service factory constructed"
        );
        Ok(MetadataServiceFactory {
            store: self.store,
            config: self.config,
            type_mappings: self
                .type_mappings
                .unwrap_or_else(|| Arc::new(TypeMappingRegistry::with_standard_mappings())),
            interceptors: self
                .interceptors
                .unwrap_or_else(|| Arc::new(InterceptorRegistry::new())),
            executor: self.executor.unwrap_or_else(|| Arc::new(UnboundExecutor)),
        })
    }
}
