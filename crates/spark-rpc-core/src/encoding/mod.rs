//! 类型映射：XML 类型系统与本地值表示之间的对应关系。
//!
//! - `mapping`：单个编码风格下的映射表、本地类型分类与标准映射；
//! - `registry`：工厂共享的注册表与句柄持有的快照。

pub mod mapping;
pub mod registry;

pub use mapping::{
    EncodingStyle, LocalType, SOAP_ENCODING_NAMESPACE, TypeMapping, XSD_NAMESPACE,
};
pub use registry::{TypeMappingRegistry, TypeMappingSnapshot};
