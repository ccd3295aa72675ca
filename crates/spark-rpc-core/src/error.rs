//! # error 模块说明
//!
//! ## 角色定位
//! - 集中定义工厂解析、调用句柄配置与调用执行三个阶段的错误语义；
//! - 每个变体映射到一个 [`RpcErrorKind`] 与一个稳定错误码（见 [`codes`]），供日志与告警聚合。
//!
//! ## 传播策略
//! - 所有失败都同步返回给触发操作的调用方，本层不做本地恢复或重试；
//! - 不存在部分成功：操作要么返回完整结果，要么以单一错误失败。

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

use crate::call::CallState;
use crate::qname::QName;

/// 稳定错误码，格式为 `<域>.<子域>.<原因>`。
pub mod codes {
    pub const UNKNOWN_PORT: &str = "rpc.factory.unknown_port";
    pub const UNKNOWN_OPERATION: &str = "rpc.factory.unknown_operation";
    pub const CONTRACT_MISMATCH: &str = "rpc.factory.contract_mismatch";
    pub const METADATA_UNAVAILABLE: &str = "rpc.factory.metadata_unavailable";
    pub const UNSUPPORTED_CAPABILITY: &str = "rpc.factory.unsupported_capability";
    pub const FACTORY_INTERNAL: &str = "rpc.factory.internal";
    pub const CALL_READ_ONLY: &str = "rpc.call.read_only";
    pub const CALL_INCOMPLETE: &str = "rpc.call.incomplete";
    pub const CALL_INVALID_PROPERTY: &str = "rpc.call.invalid_property";
    pub const CALL_MARSHAL: &str = "rpc.call.marshal";
    pub const CALL_INVOCATION: &str = "rpc.call.invocation";
    pub const CALL_INTERCEPTOR_REJECTED: &str = "rpc.call.interceptor_rejected";
}

/// 统一的结果别名。
pub type Result<T, E = RpcError> = core::result::Result<T, E>;

/// 错误类别，与 [`RpcError`] 变体一一对应。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RpcErrorKind {
    UnknownPort,
    UnknownOperation,
    ContractMismatch,
    MetadataUnavailable,
    UnsupportedCapability,
    Factory,
    ReadOnlyCall,
    IncompleteCall,
    InvalidProperty,
    Marshal,
    Invocation,
    InterceptorRejected,
}

/// 工厂可声明为“不支持定制”的注册表能力。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// 类型映射注册表定制。
    TypeMappingCustomization,
    /// 拦截器注册表定制。
    InterceptorCustomization,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::TypeMappingCustomization => f.write_str("type-mapping customization"),
            Capability::InterceptorCustomization => f.write_str("interceptor customization"),
        }
    }
}

/// 服务端点工厂与调用句柄的错误域。
///
/// # 契约说明（What）
/// - 所有变体满足 `Send + Sync + 'static`，可跨线程传播；
/// - 变体携带可读上下文（端口、操作、缺失字段），`Display` 文本面向运维排障；
/// - [`RpcError::kind`] 与 [`RpcError::code`] 提供稳定的分类维度。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RpcError {
    /// 请求的端口不在服务元数据中。
    #[error("port `{port}` is not declared by service `{service}`")]
    UnknownPort { service: QName, port: QName },

    /// 请求的操作不在已解析端口的操作集合中。
    #[error("operation `{operation}` is not declared on port `{port}`")]
    UnknownOperation { port: QName, operation: String },

    /// 本地名在端口上命中多个命名空间的操作，需改用限定名。
    #[error(
        "operation `{operation}` is ambiguous on port `{port}`: qualify it as one of {candidates:?}"
    )]
    AmbiguousOperation {
        port: QName,
        operation: String,
        candidates: Vec<String>,
    },

    /// 能力契约声明的操作无法全部映射到端口操作。
    #[error(
        "contract `{contract}` is not satisfied{}: missing operations {missing:?}",
        .port.as_ref().map(|port| format!(" by port `{port}`")).unwrap_or_default()
    )]
    ContractMismatch {
        contract: Cow<'static, str>,
        port: Option<QName>,
        missing: Vec<String>,
    },

    /// 必需的元数据（地址、绑定、操作列表、端口集合）缺失。
    #[error("metadata unavailable: {detail}")]
    MetadataUnavailable { detail: String },

    /// 当前工厂不允许定制对应注册表。
    #[error("{capability} is not supported by this service factory")]
    UnsupportedCapability { capability: Capability },

    /// 未归入上述类别的构造失败，例如元数据自相矛盾。
    #[error("service factory failure: {detail}")]
    Factory { detail: String },

    /// 在不允许修改的生命周期状态下修改调用句柄。
    #[error("call property `{property}` is read-only for a {state:?} call")]
    ReadOnlyCall {
        property: &'static str,
        state: CallState,
    },

    /// 调用句柄缺少执行所需的配置。
    #[error("call is not ready for invocation: missing {missing}")]
    IncompleteCall { missing: &'static str },

    /// 标准属性取值类型错误。
    #[error("call property `{name}` is invalid: {detail}")]
    InvalidProperty { name: String, detail: String },

    /// 参数或返回值无法按类型映射规则编组。
    #[error("cannot marshal `{parameter}`: {detail}")]
    Marshal { parameter: String, detail: String },

    /// 调用执行器报告的失败。
    #[error("invocation of `{operation}` failed: {detail}")]
    Invocation { operation: String, detail: String },

    /// 拦截器拒绝继续处理。
    #[error("interceptor `{label}` rejected `{operation}`: {reason}")]
    InterceptorRejected {
        label: String,
        operation: String,
        reason: String,
    },
}

impl RpcError {
    /// 构造 [`RpcError::MetadataUnavailable`]。
    pub fn metadata_unavailable(detail: impl Into<String>) -> Self {
        RpcError::MetadataUnavailable {
            detail: detail.into(),
        }
    }

    /// 构造 [`RpcError::Factory`]。
    pub fn factory(detail: impl Into<String>) -> Self {
        RpcError::Factory {
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> RpcErrorKind {
        match self {
            RpcError::UnknownPort { .. } => RpcErrorKind::UnknownPort,
            RpcError::UnknownOperation { .. } | RpcError::AmbiguousOperation { .. } => {
                RpcErrorKind::UnknownOperation
            }
            RpcError::ContractMismatch { .. } => RpcErrorKind::ContractMismatch,
            RpcError::MetadataUnavailable { .. } => RpcErrorKind::MetadataUnavailable,
            RpcError::UnsupportedCapability { .. } => RpcErrorKind::UnsupportedCapability,
            RpcError::Factory { .. } => RpcErrorKind::Factory,
            RpcError::ReadOnlyCall { .. } => RpcErrorKind::ReadOnlyCall,
            RpcError::IncompleteCall { .. } => RpcErrorKind::IncompleteCall,
            RpcError::InvalidProperty { .. } => RpcErrorKind::InvalidProperty,
            RpcError::Marshal { .. } => RpcErrorKind::Marshal,
            RpcError::Invocation { .. } => RpcErrorKind::Invocation,
            RpcError::InterceptorRejected { .. } => RpcErrorKind::InterceptorRejected,
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self.kind() {
            RpcErrorKind::UnknownPort => codes::UNKNOWN_PORT,
            RpcErrorKind::UnknownOperation => codes::UNKNOWN_OPERATION,
            RpcErrorKind::ContractMismatch => codes::CONTRACT_MISMATCH,
            RpcErrorKind::MetadataUnavailable => codes::METADATA_UNAVAILABLE,
            RpcErrorKind::UnsupportedCapability => codes::UNSUPPORTED_CAPABILITY,
            RpcErrorKind::Factory => codes::FACTORY_INTERNAL,
            RpcErrorKind::ReadOnlyCall => codes::CALL_READ_ONLY,
            RpcErrorKind::IncompleteCall => codes::CALL_INCOMPLETE,
            RpcErrorKind::InvalidProperty => codes::CALL_INVALID_PROPERTY,
            RpcErrorKind::Marshal => codes::CALL_MARSHAL,
            RpcErrorKind::Invocation => codes::CALL_INVOCATION,
            RpcErrorKind::InterceptorRejected => codes::CALL_INTERCEPTOR_REJECTED,
        }
    }
}
