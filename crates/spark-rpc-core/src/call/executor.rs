use serde_json::Value;

use super::Call;
use crate::error::{Result, RpcError};
use crate::interceptor::InvocationContext;

/// 调用执行器：负责把已配置的句柄与编组后的实参发送到远端。
///
/// 传输、消息编解码、重试与超时均由实现方负责；本 crate 只在拦截器链的请求阶段之后调用它。
pub trait CallExecutor: Send + Sync + 'static {
    /// 执行请求-响应调用，返回远端结果。
    fn execute(&self, call: &Call, context: &mut InvocationContext) -> Result<Value>;

    /// 执行单向调用，默认丢弃响应。
    fn execute_one_way(&self, call: &Call, context: &mut InvocationContext) -> Result<()> {
        self.execute(call, context).map(|_| ())
    }
}

/// 未配置执行器时使用的占位实现，所有调用均失败。
#[derive(Clone, Copy, Debug, Default)]
pub struct UnboundExecutor;

impl CallExecutor for UnboundExecutor {
    fn execute(&self, _call: &Call, context: &mut InvocationContext) -> Result<Value> {
        Err(RpcError::Invocation {
            operation: context.operation().to_string(),
            detail: "no call executor is configured".to_owned(),
        })
    }
}
