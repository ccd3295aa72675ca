//! # spark-rpc-core
//!
//! 服务端点工厂与调用配置的核心契约：限定名、元数据仓库接口、类型映射与拦截器注册表、
//! 调用句柄（[`Call`]）、端点代理绑定（[`EndpointBinding`]）以及工厂 trait（[`ServiceFactory`]）。
//!
//! ## 边界
//! - 不解析元数据文档，只消费 [`MetadataStore`]；
//! - 不做网络 I/O 与消息编解码，调用执行委托给 [`CallExecutor`]；
//! - 不生成代码，能力契约以 [`EndpointContract`] trait 静态声明。
//!
//! 默认工厂实现位于 `spark-rpc-factory`。

pub mod call;
pub mod encoding;
pub mod error;
pub mod factory;
pub mod interceptor;
pub mod metadata;
pub mod proxy;
pub mod qname;

pub use call::{Call, CallExecutor, CallState, PortBinding, UnboundExecutor};
pub use encoding::{EncodingStyle, LocalType, TypeMapping, TypeMappingRegistry, TypeMappingSnapshot};
pub use error::{Capability, Result, RpcError, RpcErrorKind, codes};
pub use factory::{PortIter, Ports, ServiceFactory};
pub use interceptor::{
    Interceptor, InterceptorChain, InterceptorEntry, InterceptorRegistry, InvocationContext,
};
pub use metadata::{
    BindingInfo, DocumentLocation, MetadataStore, OperationDescriptor, OperationRef,
    OperationStyle, ParameterDescriptor, ParameterMode, ProtocolBinding,
};
pub use proxy::{
    ContractDescriptor, Dispatch, DispatchEntry, EndpointBinding, EndpointContract,
    OperationSignature, match_contract,
};
pub use qname::{QName, QNameParseError};
