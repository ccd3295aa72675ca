//! Weather 服务端到端场景：端口枚举、句柄创建、代理解析与注册表共享。

mod support;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use spark_rpc_core::{
    BindingInfo, CallState, ContractDescriptor, LocalType, OperationDescriptor, OperationRef,
    OperationSignature, ParameterDescriptor, ParameterMode, ProtocolBinding, QName, RpcError,
    RpcErrorKind, ServiceFactory,
};
use spark_rpc_factory::{
    FactoryConfig, MetadataServiceFactory, PortSelection, StaticMetadataStore, StaticPort,
};

use support::*;

fn factory() -> MetadataServiceFactory {
    MetadataServiceFactory::new(weather_store())
}

#[test]
fn get_calls_returns_one_preconfigured_call_per_operation() {
    let factory = factory();
    let calls = factory.get_calls(&weather_port()).expect("端口应存在");

    let operations: Vec<_> = calls
        .iter()
        .map(|call| call.operation_name().map(QName::local_part))
        .collect();
    assert_eq!(operations, vec![Some("getTemperature"), Some("getForecast")]);
    for call in &calls {
        assert_eq!(call.state(), CallState::Preconfigured);
        assert_eq!(call.target_endpoint_address(), Some(ADDRESS));
        assert_eq!(call.port_name(), Some(&weather_port()));
        assert_eq!(call.service_name(), Some(&service_name()));
    }
}

#[test]
fn successive_get_calls_do_not_alias() {
    let factory = factory();
    let mut first = factory.get_calls(&weather_port()).expect("端口应存在");
    let second = factory.get_calls(&weather_port()).expect("端口应存在");

    assert!(!std::ptr::eq(first.as_ptr(), second.as_ptr()));
    first[0]
        .set_property("x-trace-id", json!("abc"))
        .expect("自由属性可设置");
    assert_eq!(first[0].property("x-trace-id"), Some(json!("abc")));
    assert_eq!(second[0].property("x-trace-id"), None);
}

#[test]
fn unknown_port_is_rejected_everywhere() {
    let factory = factory();
    let missing = qname("ArchivePort");

    let expected = RpcError::UnknownPort {
        service: service_name(),
        port: missing.clone(),
    };
    assert_eq!(factory.get_calls(&missing).unwrap_err(), expected);
    assert_eq!(factory.create_call_for_port(&missing).unwrap_err(), expected);
    assert_eq!(
        factory
            .create_call_for_operation(&missing, "getTemperature")
            .unwrap_err(),
        expected
    );
    assert_eq!(
        factory.resolve::<WeatherClient>(Some(&missing)).unwrap_err(),
        expected
    );
}

#[test]
fn create_call_binds_named_operation_or_fails() {
    let factory = factory();

    let call = factory
        .create_call_for_operation(&weather_port(), "getForecast")
        .expect("操作应存在");
    assert_eq!(call.operation_name(), Some(&qname("getForecast")));
    assert_eq!(call.parameter_type_by_name("days"), Some(&xsd("int")));
    assert!(call.is_preconfigured());

    let qualified = qname("getTemperature");
    let call = factory
        .create_call_for_operation(&weather_port(), &qualified)
        .expect("限定名应匹配");
    assert_eq!(call.return_type(), Some(&xsd("double")));

    let error = factory
        .create_call_for_operation(&weather_port(), "getHumidity")
        .unwrap_err();
    assert_eq!(error.kind(), RpcErrorKind::UnknownOperation);

    // 限定名按精确匹配，命名空间不同即视为不存在。
    let foreign = QName::new("urn:other", "getTemperature");
    assert!(matches!(
        factory.create_call(Some(&weather_port()), Some(OperationRef::Qualified(&foreign))),
        Err(RpcError::UnknownOperation { .. })
    ));
}

#[test]
fn local_name_shared_across_namespaces_must_be_qualified() {
    let first = QName::new("urn:a", "getTemperature");
    let second = QName::new("urn:b", "getTemperature");
    let store = StaticMetadataStore::new(service_name()).with_port(
        StaticPort::new(weather_port())
            .with_binding(soap_binding())
            .with_operations(vec![
                OperationDescriptor::new(first.clone()),
                OperationDescriptor::new(second.clone()),
            ]),
    );
    let factory = MetadataServiceFactory::new(store);

    let error = factory
        .create_call_for_operation(&weather_port(), "getTemperature")
        .unwrap_err();
    assert_eq!(error.kind(), RpcErrorKind::UnknownOperation);
    match error {
        RpcError::AmbiguousOperation { candidates, .. } => {
            assert_eq!(candidates, vec![first.to_string(), second.to_string()]);
        }
        other => panic!("期望歧义错误，实际为 {other:?}"),
    }

    let call = factory
        .create_call_for_operation(&weather_port(), &second)
        .expect("限定名可消除歧义");
    assert_eq!(call.operation_name(), Some(&second));

    let mut bound = factory.create_call_for_port(&weather_port()).expect("端口已声明");
    assert!(matches!(
        bound.bind_operation(OperationRef::Local("getTemperature")),
        Err(RpcError::AmbiguousOperation { .. })
    ));
    assert_eq!(bound.state(), CallState::PortBound);

    // 代理解析对同一本地名同样拒绝猜测。
    let contract =
        ContractDescriptor::new("Thermometer", vec![OperationSignature::new("getTemperature")]);
    assert_eq!(
        factory.resolve_binding(None, &contract).unwrap_err().kind(),
        RpcErrorKind::ContractMismatch
    );
}

#[test]
fn port_bound_and_unconfigured_calls() {
    let factory = factory();

    let mut bound = factory
        .create_call_for_port(&weather_port())
        .expect("端口应存在");
    assert_eq!(bound.state(), CallState::PortBound);
    assert_eq!(bound.operation_name(), None);
    assert_eq!(bound.port_operations().len(), 2);
    bound
        .bind_operation(OperationRef::Local("getTemperature"))
        .expect("端口上存在该操作");
    assert!(bound.is_preconfigured());

    let mut adhoc = factory.create_unconfigured_call().expect("未配置句柄总能创建");
    assert_eq!(adhoc.state(), CallState::Unconfigured);
    assert_eq!(adhoc.port_name(), None);
    adhoc
        .set_port_name(weather_port())
        .and_then(|call| call.set_target_endpoint_address(ADDRESS))
        .and_then(|call| call.set_operation_name(qname("getTemperature")))
        .and_then(|call| call.add_parameter("city", xsd("string"), ParameterMode::In))
        .and_then(|call| call.set_return_type(Some(xsd("double"))))
        .expect("未配置句柄可以手工配置");
    assert_eq!(
        adhoc.invoke(&RecordingExecutor::default(), vec![json!("Oslo")]),
        Ok(json!(21.5))
    );

    let error = factory
        .create_call(None, Some(OperationRef::Local("getTemperature")))
        .unwrap_err();
    assert_eq!(error.kind(), RpcErrorKind::Factory);
}

#[test]
fn resolved_proxy_dispatches_every_contract_method() {
    let executor = Arc::new(RecordingExecutor::default());
    let factory = MetadataServiceFactory::builder(weather_store())
        .executor(executor.clone())
        .build()
        .expect("默认配置合法");

    for port in [None, Some(weather_port())] {
        let client: WeatherClient = factory.resolve(port.as_ref()).expect("契约应被满足");
        assert_eq!(client.binding().port_name(), &weather_port());
        assert_eq!(client.binding().endpoint_address(), ADDRESS);
        assert_eq!(
            client.binding().operations().collect::<Vec<_>>(),
            vec!["getForecast", "getTemperature"]
        );
        assert_eq!(client.temperature("Oslo"), Ok(21.5));
        assert_eq!(client.forecast("Oslo", 3), Ok("sunny".to_owned()));
    }

    assert_eq!(executor.journal().len(), 4);
    assert_eq!(
        executor.journal()[1],
        ("getForecast".to_owned(), vec![json!("Oslo"), json!(3)])
    );
}

#[test]
fn proxy_without_executor_fails_at_invocation_not_resolution() {
    let client: WeatherClient = factory().resolve(None).expect("解析不做网络调用");
    let error = client.temperature("Oslo").unwrap_err();
    assert_eq!(error.kind(), RpcErrorKind::Invocation);
}

#[test]
fn contract_with_absent_operation_is_a_mismatch() {
    let factory = factory();

    let error = factory
        .resolve::<HumidityClient>(Some(&weather_port()))
        .map(|_| ())
        .unwrap_err();
    assert_eq!(
        error,
        RpcError::ContractMismatch {
            contract: "HumidityClient".into(),
            port: Some(weather_port()),
            missing: vec!["getHumidity".to_owned()],
        }
    );

    let error = factory.resolve::<HumidityClient>(None).map(|_| ()).unwrap_err();
    assert!(matches!(
        error,
        RpcError::ContractMismatch { port: None, ref missing, .. } if missing == &["getHumidity".to_owned()]
    ));
}

#[test]
fn omitted_port_selection_is_deterministic_and_configurable() {
    let store = || {
        StaticMetadataStore::new(service_name())
            .with_port(
                StaticPort::new(qname("ZuluPort"))
                    .with_binding(
                        BindingInfo::new(ProtocolBinding::Soap12).with_address("https://zulu.example"),
                    )
                    .with_operations(weather_operations()),
            )
            .with_port(
                // 地址缺失，不参与选择。
                StaticPort::new(qname("AlphaDraftPort"))
                    .with_binding(BindingInfo::new(ProtocolBinding::Soap11))
                    .with_operations(weather_operations()),
            )
            .with_port(
                StaticPort::new(qname("AlphaPort"))
                    .with_binding(soap_binding())
                    .with_operations(weather_operations()),
            )
    };

    let first_declared = MetadataServiceFactory::new(store());
    for _ in 0..3 {
        let client: WeatherClient = first_declared.resolve(None).expect("存在候选");
        assert_eq!(client.binding().port_name(), &qname("ZuluPort"));
    }

    let lexicographic = MetadataServiceFactory::builder(store())
        .config(FactoryConfig {
            port_selection: PortSelection::Lexicographic,
            ..FactoryConfig::default()
        })
        .build()
        .expect("配置合法");
    let client: WeatherClient = lexicographic.resolve(None).expect("存在候选");
    assert_eq!(client.binding().port_name(), &qname("AlphaPort"));

    let soap11_only = MetadataServiceFactory::builder(store())
        .config(FactoryConfig {
            supported_protocols: vec![ProtocolBinding::Soap11],
            ..FactoryConfig::default()
        })
        .build()
        .expect("配置合法");
    let client: WeatherClient = soap11_only.resolve(None).expect("存在候选");
    assert_eq!(client.binding().port_name(), &qname("AlphaPort"));
    assert_eq!(
        soap11_only
            .get_calls(&qname("ZuluPort"))
            .unwrap_err()
            .kind(),
        RpcErrorKind::Factory
    );
}

#[test]
fn missing_metadata_is_reported_as_unavailable() {
    let store = StaticMetadataStore::new(service_name())
        .with_port(StaticPort::new(qname("Unbound")).with_operations(weather_operations()))
        .with_port(
            StaticPort::new(qname("NoAddress")).with_binding(BindingInfo::new(ProtocolBinding::Http)),
        )
        .with_port(StaticPort::new(qname("NoOperations")).with_binding(soap_binding()));
    let factory = MetadataServiceFactory::new(store);

    for port in ["Unbound", "NoAddress", "NoOperations"] {
        let error = factory.get_calls(&qname(port)).unwrap_err();
        assert_eq!(error.kind(), RpcErrorKind::MetadataUnavailable, "{port}");
    }
    assert_eq!(
        factory.resolve::<WeatherClient>(None).unwrap_err().kind(),
        RpcErrorKind::MetadataUnavailable
    );

    let opaque = MetadataServiceFactory::new(StaticMetadataStore::opaque(service_name()));
    assert_eq!(opaque.ports().unwrap_err().kind(), RpcErrorKind::MetadataUnavailable);
    assert_eq!(
        opaque.get_calls(&weather_port()).unwrap_err().kind(),
        RpcErrorKind::MetadataUnavailable
    );
    assert!(opaque.create_unconfigured_call().is_ok());
}

#[test]
fn unsupported_protocol_is_a_factory_error_with_or_without_port() {
    let store = StaticMetadataStore::new(service_name())
        .with_port(
            StaticPort::new(weather_port())
                .with_binding(soap_binding())
                .with_operations(weather_operations()),
        )
        .with_port(StaticPort::new(qname("Unbound")).with_operations(weather_operations()));
    let factory = MetadataServiceFactory::builder(store)
        .config(FactoryConfig {
            supported_protocols: vec![ProtocolBinding::Soap12],
            ..FactoryConfig::default()
        })
        .build()
        .expect("配置合法");

    let explicit = factory.resolve::<WeatherClient>(Some(&weather_port())).unwrap_err();
    assert_eq!(explicit.kind(), RpcErrorKind::Factory);

    let omitted = factory.resolve::<WeatherClient>(None).unwrap_err();
    assert_eq!(omitted.kind(), RpcErrorKind::Factory);
    assert!(omitted.to_string().contains("WeatherPort"), "{omitted}");
}

#[test]
fn inconsistent_metadata_is_a_factory_error() {
    let duplicated = StaticMetadataStore::new(service_name()).with_port(
        StaticPort::new(weather_port())
            .with_binding(soap_binding())
            .with_operations(vec![
                OperationDescriptor::new(qname("getTemperature")),
                OperationDescriptor::new(qname("getTemperature")),
            ]),
    );
    let error = MetadataServiceFactory::new(duplicated)
        .get_calls(&weather_port())
        .unwrap_err();
    assert_eq!(error.kind(), RpcErrorKind::Factory);

    let unmapped = StaticMetadataStore::new(service_name()).with_port(
        StaticPort::new(weather_port())
            .with_binding(soap_binding())
            .with_operations(vec![OperationDescriptor::new(qname("store")).with_parameter(
                ParameterDescriptor::new("reading", qname("Reading"), ParameterMode::In),
            )]),
    );
    let factory = MetadataServiceFactory::new(unmapped);
    assert_eq!(
        factory
            .create_call_for_operation(&weather_port(), "store")
            .unwrap_err()
            .kind(),
        RpcErrorKind::Factory
    );

    // 注册类型后同一元数据即可生成句柄。
    factory
        .type_mapping_registry()
        .expect("默认允许定制")
        .register_type(&Default::default(), qname("Reading"), LocalType::Struct);
    assert!(factory.create_call_for_operation(&weather_port(), "store").is_ok());
}

#[test]
fn empty_operation_list_yields_no_calls() {
    let store = StaticMetadataStore::new(service_name()).with_port(
        StaticPort::new(weather_port())
            .with_binding(soap_binding())
            .with_operations(Vec::new()),
    );
    let factory = MetadataServiceFactory::new(store);
    assert_eq!(factory.get_calls(&weather_port()).map(|calls| calls.len()), Ok(0));
}

#[test]
fn metadata_accessors() {
    let factory = factory();
    assert_eq!(factory.service_name(), &service_name());
    assert_eq!(factory.service_name(), factory.service_name());
    assert_eq!(
        factory.document_location().map(|location| location.as_str()),
        Some(DOCUMENT)
    );

    let ports = factory.ports().expect("端口集合已知");
    assert_eq!(ports.iter().collect::<Vec<_>>(), vec![&weather_port()]);
    assert_eq!(ports.iter().count(), ports.iter().count());

    let without_location = MetadataServiceFactory::new(
        StaticMetadataStore::new(service_name())
            .with_port(StaticPort::new(weather_port()).with_binding(soap_binding())),
    );
    assert_eq!(without_location.document_location(), None);
}

#[test]
fn registries_are_shared_and_snapshotted() {
    let factory = factory();
    let journal = Arc::new(Mutex::new(Vec::new()));

    let before = factory
        .create_call_for_operation(&weather_port(), "getTemperature")
        .expect("操作应存在");

    let first = factory.interceptor_registry().expect("默认允许定制");
    let second = factory.interceptor_registry().expect("默认允许定制");
    assert!(Arc::ptr_eq(&first, &second));
    first.push(
        "audit",
        Arc::new(JournalInterceptor {
            label: "audit",
            journal: Arc::clone(&journal),
        }),
    );
    second.push_for_port(
        &weather_port(),
        "auth",
        Arc::new(JournalInterceptor {
            label: "auth",
            journal: Arc::clone(&journal),
        }),
    );
    assert_eq!(first.labels(), vec!["audit".to_owned()]);

    let after = factory
        .create_call_for_operation(&weather_port(), "getTemperature")
        .expect("操作应存在");
    assert!(before.interceptors().is_empty());
    assert_eq!(after.interceptors().labels(), vec!["audit", "auth"]);

    let executor = RecordingExecutor::default();
    assert_eq!(after.invoke(&executor, vec![json!("Oslo")]), Ok(json!(21.5)));
    assert_eq!(
        journal.lock().as_slice(),
        [
            "audit:request:getTemperature",
            "auth:request:getTemperature",
            "auth:response",
            "audit:response"
        ]
    );
    assert_eq!(before.invoke(&executor, vec![json!("Oslo")]), Ok(json!(21.5)));
    assert_eq!(journal.lock().len(), 4);
}

#[test]
fn customization_can_be_disabled() {
    let config = FactoryConfig::from_toml_str(
        r#"
        allow_type_mapping_customization = false
        allow_interceptor_customization = false
        "#,
    )
    .expect("配置合法");
    let factory = MetadataServiceFactory::builder(weather_store())
        .config(config)
        .build()
        .expect("配置合法");

    assert_eq!(
        factory.type_mapping_registry().unwrap_err().kind(),
        RpcErrorKind::UnsupportedCapability
    );
    assert_eq!(
        factory.interceptor_registry().unwrap_err().code(),
        "rpc.factory.unsupported_capability"
    );
    assert_eq!(factory.get_calls(&weather_port()).map(|calls| calls.len()), Ok(2));
}

#[test]
fn object_safe_resolution_through_trait_objects() {
    let factory: Arc<dyn ServiceFactory> = Arc::new(factory());
    let descriptor = ContractDescriptor::new(
        "ForecastOnly",
        vec![OperationSignature::new("{urn:weather}getForecast")],
    );
    let binding = factory
        .resolve_binding(None, &descriptor)
        .expect("契约应被满足");
    assert_eq!(binding.contract_name(), "ForecastOnly");
    let template = binding.call_template("{urn:weather}getForecast").expect("分发项存在");
    assert_eq!(template.parameters().len(), 2);
    assert!(template.is_preconfigured());
}

#[test]
fn service_description_loaded_from_toml() {
    let store = StaticMetadataStore::from_toml_str(
        r#"
        service = "{urn:weather}Weather"

        [[ports]]
        name = "{urn:weather}WeatherPort"
        binding = { protocol = "soap11", address = "https://weather.example/soap" }

        [[ports.operations]]
        name = "{urn:weather}getTemperature"
        return_type = "{http://www.w3.org/2001/XMLSchema}double"
        parameters = [{ name = "city", xml_type = "{http://www.w3.org/2001/XMLSchema}string" }]

        [[ports.operations]]
        name = "{urn:weather}getForecast"
        return_type = "{http://www.w3.org/2001/XMLSchema}string"
        parameters = [
            { name = "city", xml_type = "{http://www.w3.org/2001/XMLSchema}string" },
            { name = "days", xml_type = "{http://www.w3.org/2001/XMLSchema}int" },
        ]
        "#,
    )
    .expect("描述合法");
    let factory = MetadataServiceFactory::new(store);

    assert_eq!(factory.document_location(), None);
    let calls = factory.get_calls(&weather_port()).expect("端口应存在");
    assert_eq!(calls.len(), 2);
    let client: WeatherClient = factory.resolve(None).expect("契约应被满足");
    assert_eq!(client.binding().endpoint_address(), ADDRESS);
}
