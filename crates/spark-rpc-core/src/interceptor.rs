//! 拦截器契约与共享拦截器注册表。
//!
//! # 结构说明（How）
//! - [`Interceptor`]：请求、响应、故障三个钩子，均有空默认实现；
//! - [`InvocationContext`]：一次调用在拦截器链上流转的可变上下文；
//! - [`InterceptorRegistry`]：默认链 + 按端口的附加链，以 [`ArcSwap`] 整表替换；
//! - [`InterceptorChain`]：句柄创建时捕获的不可变链快照。
//!
//! # 执行顺序（What）
//! - 请求阶段按链顺序执行（默认链在前，端口链在后）；
//! - 响应与故障阶段按逆序执行。

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::error::Result;
use crate::qname::QName;

/// 一次调用在拦截器链上流转的上下文。
#[derive(Clone, Debug, PartialEq)]
pub struct InvocationContext {
    operation: QName,
    port_name: Option<QName>,
    endpoint_address: Option<String>,
    arguments: Vec<Value>,
    properties: BTreeMap<String, Value>,
    response: Option<Value>,
}

impl InvocationContext {
    pub fn new(
        operation: QName,
        port_name: Option<QName>,
        endpoint_address: Option<String>,
        arguments: Vec<Value>,
        properties: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            operation,
            port_name,
            endpoint_address,
            arguments,
            properties,
            response: None,
        }
    }

    pub fn operation(&self) -> &QName {
        &self.operation
    }

    pub fn port_name(&self) -> Option<&QName> {
        self.port_name.as_ref()
    }

    pub fn endpoint_address(&self) -> Option<&str> {
        self.endpoint_address.as_deref()
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut Vec<Value> {
        &mut self.arguments
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// 写入请求级属性（例如认证头），只影响本次调用。
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.properties.insert(name.into(), value)
    }

    pub fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    pub fn set_response(&mut self, response: Value) {
        self.response = Some(response);
    }

    pub fn take_response(&mut self) -> Option<Value> {
        self.response.take()
    }
}

/// 横切请求/响应处理器。
///
/// 实现必须满足 `Send + Sync + 'static`，同一实例会被多个句柄并发共享。
pub trait Interceptor: Send + Sync + 'static {
    /// 请求发出前调用；返回错误将中止调用，且不再执行后续拦截器。
    fn handle_request(&self, _context: &mut InvocationContext) -> Result<()> {
        Ok(())
    }

    /// 响应返回后调用。
    fn handle_response(&self, _context: &mut InvocationContext) -> Result<()> {
        Ok(())
    }

    /// 调用失败时调用，只用于观测，不能改变错误。
    fn handle_fault(&self, _context: &InvocationContext, _error: &crate::RpcError) {}
}

/// 带标签的拦截器登记项。
#[derive(Clone)]
pub struct InterceptorEntry {
    label: Cow<'static, str>,
    interceptor: Arc<dyn Interceptor>,
}

impl InterceptorEntry {
    pub fn new(label: impl Into<Cow<'static, str>>, interceptor: Arc<dyn Interceptor>) -> Self {
        Self {
            label: label.into(),
            interceptor,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn interceptor(&self) -> &Arc<dyn Interceptor> {
        &self.interceptor
    }
}

impl fmt::Debug for InterceptorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorEntry")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// 句柄持有的拦截器链快照，顺序即请求阶段的执行顺序。
#[derive(Clone, Debug)]
pub struct InterceptorChain {
    entries: Arc<[InterceptorEntry]>,
}

impl InterceptorChain {
    pub fn empty() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InterceptorEntry> {
        self.entries.iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(InterceptorEntry::label).collect()
    }
}

impl Default for InterceptorChain {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Clone, Debug, Default)]
struct InterceptorTable {
    default_chain: Vec<InterceptorEntry>,
    port_chains: BTreeMap<QName, Vec<InterceptorEntry>>,
}

/// 工厂共享的有序、可变拦截器注册表。
///
/// # 教案级说明
/// - **契约 (What)**：默认链作用于所有句柄与代理；端口链只追加到绑定该端口的句柄之后；
///   修改对之后创建的句柄与代理可见，已创建的句柄保留创建时的链快照。
/// - **并发 (How)**：写操作通过 `ArcSwap::rcu` 基于当前表复制出新表后原子替换，并发写不会丢失更新；
///   读操作 `load` 无锁，[`Self::chain_for`] 在一次 `load` 内完成默认链与端口链的拼接。
#[derive(Debug, Default)]
pub struct InterceptorRegistry {
    table: ArcSwap<InterceptorTable>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加到默认链末尾。
    pub fn push(&self, label: impl Into<Cow<'static, str>>, interceptor: Arc<dyn Interceptor>) {
        let entry = InterceptorEntry::new(label, interceptor);
        self.table.rcu(|table| {
            let mut next = InterceptorTable::clone(table);
            next.default_chain.push(entry.clone());
            next
        });
        tracing::debug!(label = entry.label(), "interceptor appended to default chain");
    }

    /// 插入到默认链的指定位置，越界时追加到末尾。
    pub fn insert(
        &self,
        index: usize,
        label: impl Into<Cow<'static, str>>,
        interceptor: Arc<dyn Interceptor>,
    ) {
        let entry = InterceptorEntry::new(label, interceptor);
        self.table.rcu(|table| {
            let mut next = InterceptorTable::clone(table);
            let position = index.min(next.default_chain.len());
            next.default_chain.insert(position, entry.clone());
            next
        });
    }

    /// 从默认链与所有端口链中移除指定标签的拦截器，返回是否有条目被移除。
    pub fn remove(&self, label: &str) -> bool {
        let previous = self.table.rcu(|table| {
            let mut next = InterceptorTable::clone(table);
            next.default_chain.retain(|entry| entry.label() != label);
            for chain in next.port_chains.values_mut() {
                chain.retain(|entry| entry.label() != label);
            }
            next
        });
        previous
            .default_chain
            .iter()
            .chain(previous.port_chains.values().flatten())
            .any(|entry| entry.label() == label)
    }

    /// 追加到指定端口链末尾。
    pub fn push_for_port(
        &self,
        port: &QName,
        label: impl Into<Cow<'static, str>>,
        interceptor: Arc<dyn Interceptor>,
    ) {
        let entry = InterceptorEntry::new(label, interceptor);
        self.table.rcu(|table| {
            let mut next = InterceptorTable::clone(table);
            next.port_chains
                .entry(port.clone())
                .or_default()
                .push(entry.clone());
            next
        });
    }

    /// 整体替换指定端口链；传入空列表等价于移除端口链。
    pub fn set_port_chain(&self, port: &QName, chain: Vec<InterceptorEntry>) {
        self.table.rcu(|table| {
            let mut next = InterceptorTable::clone(table);
            if chain.is_empty() {
                next.port_chains.remove(port);
            } else {
                next.port_chains.insert(port.clone(), chain.clone());
            }
            next
        });
    }

    /// 默认链的标签列表。
    pub fn labels(&self) -> Vec<String> {
        self.table
            .load()
            .default_chain
            .iter()
            .map(|entry| entry.label().to_owned())
            .collect()
    }

    /// 仅端口链部分。
    pub fn port_chain(&self, port: &QName) -> Vec<InterceptorEntry> {
        self.table
            .load()
            .port_chains
            .get(port)
            .cloned()
            .unwrap_or_default()
    }

    /// 生成作用于某端口的完整链快照：默认链在前，端口链在后。
    pub fn chain_for(&self, port: Option<&QName>) -> InterceptorChain {
        let table = self.table.load();
        let port_chain = port
            .and_then(|port| table.port_chains.get(port))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let entries: Vec<InterceptorEntry> = table
            .default_chain
            .iter()
            .chain(port_chain)
            .cloned()
            .collect();
        tracing::trace!(
            port = ?port,
            interceptors = entries.len(),
            "interceptor chain captured"
        );
        InterceptorChain {
            entries: Arc::from(entries),
        }
    }
}
