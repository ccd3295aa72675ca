//! # spark-rpc-factory
//!
//! [`spark_rpc_core::ServiceFactory`] 的默认实现：
//! - [`MetadataServiceFactory`]：以一个 [`spark_rpc_core::MetadataStore`] 为根解析端口、操作与能力契约；
//! - [`StaticMetadataStore`]：构建器或 TOML 描述加载的内存元数据仓库；
//! - [`FactoryConfig`]：端口选择策略、协议绑定与注册表定制开关。

pub mod config;
pub mod selection;
pub mod service;
pub mod store;

pub use config::{ConfigError, FactoryConfig, PortSelection};
pub use service::{MetadataServiceFactory, MetadataServiceFactoryBuilder};
pub use store::{StaticMetadataStore, StaticPort};
