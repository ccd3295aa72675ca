//! 服务工厂契约。
//!
//! # 教案级说明
//! - **意图 (Why)**：把“按端口/操作生成调用句柄”和“按能力契约生成端点代理”收敛到同一个对象安全的
//!   trait，调用方可以持有 `Arc<dyn ServiceFactory>`；
//! - **契约 (What)**：
//!   - 每次调用都返回全新的句柄或代理，工厂不缓存、不保留引用；
//!   - 所有失败同步返回，且不存在部分成功；
//!   - 端口集合、操作列表等元数据在工厂构造后不再变化，只有两个共享注册表可变；
//! - **重载收敛 (How)**：四种创建句柄的方式统一到 [`ServiceFactory::create_call`] 的
//!   `(Option<端口>, Option<操作>)` 参数组合，便捷方法只是其默认实现；
//! - **泛型入口 (Trade-offs)**：[`ServiceFactory::resolve`] 与
//!   [`ServiceFactory::create_call_for_operation`] 带有泛型参数，因此以 `where Self: Sized`
//!   排除在 trait 对象之外；trait 对象使用 [`ServiceFactory::resolve_binding`]。

use std::sync::Arc;

use crate::call::Call;
use crate::encoding::TypeMappingRegistry;
use crate::error::Result;
use crate::interceptor::InterceptorRegistry;
use crate::metadata::{DocumentLocation, OperationRef};
use crate::proxy::{ContractDescriptor, EndpointBinding, EndpointContract};
use crate::qname::QName;

/// 服务端点工厂。
pub trait ServiceFactory: Send + Sync {
    /// 服务限定名；工厂存在期间恒定。
    fn service_name(&self) -> &QName;

    /// 工厂已知的全部端口。返回值可重复遍历。
    fn ports(&self) -> Result<Ports>;

    /// 元数据来源文档位置，构造时未提供则为 `None`。
    fn document_location(&self) -> Option<&DocumentLocation>;

    /// 工厂共享的类型映射注册表。
    fn type_mapping_registry(&self) -> Result<Arc<TypeMappingRegistry>>;

    /// 工厂共享的拦截器注册表。
    fn interceptor_registry(&self) -> Result<Arc<InterceptorRegistry>>;

    /// 为端口上的每个操作创建一个预配置句柄，顺序与端口元数据的声明顺序一致。
    fn get_calls(&self, port: &QName) -> Result<Vec<Call>>;

    /// 统一的句柄创建入口。
    ///
    /// | 端口 | 操作 | 结果 |
    /// | --- | --- | --- |
    /// | `None` | `None` | 未配置句柄 |
    /// | `Some` | `None` | 端口绑定句柄 |
    /// | `Some` | `Some` | 预配置句柄 |
    /// | `None` | `Some` | 失败 |
    fn create_call(
        &self,
        port: Option<&QName>,
        operation: Option<OperationRef<'_>>,
    ) -> Result<Call>;

    fn create_call_for_port(&self, port: &QName) -> Result<Call> {
        self.create_call(Some(port), None)
    }

    fn create_call_for_operation<'a>(
        &self,
        port: &QName,
        operation: impl Into<OperationRef<'a>>,
    ) -> Result<Call>
    where
        Self: Sized,
    {
        self.create_call(Some(port), Some(operation.into()))
    }

    fn create_unconfigured_call(&self) -> Result<Call> {
        self.create_call(None, None)
    }

    /// 解析端口并为能力契约构造绑定；`port` 为 `None` 时由工厂按确定性策略选择端口。
    fn resolve_binding(
        &self,
        port: Option<&QName>,
        contract: &ContractDescriptor,
    ) -> Result<EndpointBinding>;

    /// 解析端口并构造实现能力契约 `C` 的代理。
    fn resolve<C: EndpointContract>(&self, port: Option<&QName>) -> Result<C>
    where
        Self: Sized,
    {
        self.resolve_binding(port, &ContractDescriptor::of::<C>())
            .map(C::from_binding)
    }
}

/// 可重复遍历的端口序列。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ports {
    entries: Arc<[QName]>,
}

impl Ports {
    pub fn new(entries: impl Into<Arc<[QName]>>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QName> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, port: &QName) -> bool {
        self.entries.contains(port)
    }

    pub fn as_slice(&self) -> &[QName] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a Ports {
    type Item = &'a QName;
    type IntoIter = std::slice::Iter<'a, QName>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for Ports {
    type Item = QName;
    type IntoIter = PortIter;

    fn into_iter(self) -> Self::IntoIter {
        PortIter {
            entries: self.entries,
            cursor: 0,
        }
    }
}

/// [`Ports`] 的按值迭代器，只共享底层切片。
#[derive(Clone, Debug)]
pub struct PortIter {
    entries: Arc<[QName]>,
    cursor: usize,
}

impl Iterator for PortIter {
    type Item = QName;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.entries.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len().saturating_sub(self.cursor);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PortIter {}
