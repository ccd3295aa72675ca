//! 集成测试共享夹具：Weather 服务元数据、录制型执行器与拦截器、能力契约样例。

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use spark_rpc_core::encoding::XSD_NAMESPACE;
use spark_rpc_core::{
    BindingInfo, Call, CallExecutor, EndpointBinding, EndpointContract, Interceptor,
    InvocationContext, OperationDescriptor, OperationSignature, ParameterDescriptor,
    ParameterMode, ProtocolBinding, QName, Result, RpcError,
};
use spark_rpc_factory::{StaticMetadataStore, StaticPort};

pub const NS: &str = "urn:weather";
pub const ADDRESS: &str = "https://weather.example/soap";
pub const DOCUMENT: &str = "https://weather.example/weather?wsdl";

pub fn xsd(local: &'static str) -> QName {
    QName::new(XSD_NAMESPACE, local)
}

pub fn qname(local: &'static str) -> QName {
    QName::new(NS, local)
}

pub fn service_name() -> QName {
    qname("Weather")
}

pub fn weather_port() -> QName {
    qname("WeatherPort")
}

pub fn weather_operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(qname("getTemperature"))
            .with_parameter(ParameterDescriptor::new("city", xsd("string"), ParameterMode::In))
            .with_return_type(xsd("double")),
        OperationDescriptor::new(qname("getForecast"))
            .with_parameter(ParameterDescriptor::new("city", xsd("string"), ParameterMode::In))
            .with_parameter(ParameterDescriptor::new("days", xsd("int"), ParameterMode::In))
            .with_return_type(xsd("string")),
    ]
}

pub fn soap_binding() -> BindingInfo {
    BindingInfo::new(ProtocolBinding::Soap11).with_address(ADDRESS)
}

/// `{urn:weather}Weather`：单端口 `WeatherPort`，暴露 `getTemperature` 与 `getForecast`。
pub fn weather_store() -> StaticMetadataStore {
    StaticMetadataStore::new(service_name())
        .with_document_location(DOCUMENT)
        .with_port(
            StaticPort::new(weather_port())
                .with_binding(soap_binding())
                .with_operations(weather_operations()),
        )
}

/// 执行器：记录收到的操作与实参，并按操作名返回固定响应。
#[derive(Default)]
pub struct RecordingExecutor {
    journal: Mutex<Vec<(String, Vec<Value>)>>,
}

impl RecordingExecutor {
    pub fn journal(&self) -> Vec<(String, Vec<Value>)> {
        self.journal.lock().clone()
    }
}

impl CallExecutor for RecordingExecutor {
    fn execute(&self, call: &Call, context: &mut InvocationContext) -> Result<Value> {
        let operation = context.operation().local_part().to_owned();
        self.journal
            .lock()
            .push((operation.clone(), context.arguments().to_vec()));
        match operation.as_str() {
            "getTemperature" => Ok(json!(21.5)),
            "getForecast" => Ok(json!("sunny")),
            _ => Err(RpcError::Invocation {
                operation,
                detail: format!(
                    "no canned response for endpoint {}",
                    call.target_endpoint_address().unwrap_or("<none>")
                ),
            }),
        }
    }
}

/// 拦截器：把经过的阶段写入共享日志。
pub struct JournalInterceptor {
    pub label: &'static str,
    pub journal: Arc<Mutex<Vec<String>>>,
}

impl Interceptor for JournalInterceptor {
    fn handle_request(&self, context: &mut InvocationContext) -> Result<()> {
        self.journal.lock().push(format!(
            "{}:request:{}",
            self.label,
            context.operation().local_part()
        ));
        Ok(())
    }

    fn handle_response(&self, _context: &mut InvocationContext) -> Result<()> {
        self.journal.lock().push(format!("{}:response", self.label));
        Ok(())
    }
}

/// 调用方声明的 Weather 能力契约。
#[derive(Debug)]
pub struct WeatherClient {
    binding: EndpointBinding,
}

impl WeatherClient {
    pub fn temperature(&self, city: &str) -> Result<f64> {
        self.binding.invoke_as("getTemperature", vec![json!(city)])
    }

    pub fn forecast(&self, city: &str, days: i32) -> Result<String> {
        self.binding
            .invoke_as("getForecast", vec![json!(city), json!(days)])
    }

    pub fn binding(&self) -> &EndpointBinding {
        &self.binding
    }
}

impl EndpointContract for WeatherClient {
    const NAME: &'static str = "WeatherClient";

    fn operations() -> Vec<OperationSignature> {
        vec![
            OperationSignature::new("getTemperature").with_arity(1),
            OperationSignature::new("getForecast").with_arity(2),
        ]
    }

    fn from_binding(binding: EndpointBinding) -> Self {
        Self { binding }
    }
}

/// 需要端口上不存在的操作的契约。
pub struct HumidityClient {
    pub binding: EndpointBinding,
}

impl EndpointContract for HumidityClient {
    const NAME: &'static str = "HumidityClient";

    fn operations() -> Vec<OperationSignature> {
        vec![
            OperationSignature::new("getTemperature"),
            OperationSignature::new("getHumidity"),
        ]
    }

    fn from_binding(binding: EndpointBinding) -> Self {
        Self { binding }
    }
}
