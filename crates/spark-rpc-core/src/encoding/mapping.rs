use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::qname::QName;

/// XML Schema 命名空间。
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
/// SOAP 1.1 编码命名空间，同时作为 SOAP 编码风格的标识。
pub const SOAP_ENCODING_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// 编码风格标识，空字符串表示 literal 风格。
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingStyle(Cow<'static, str>);

impl EncodingStyle {
    /// literal 风格。
    pub const LITERAL: EncodingStyle = EncodingStyle(Cow::Borrowed(""));
    /// SOAP section 5 编码风格。
    pub const SOAP_ENCODED: EncodingStyle = EncodingStyle(Cow::Borrowed(SOAP_ENCODING_NAMESPACE));

    pub fn new(uri: impl Into<Cow<'static, str>>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EncodingStyle {
    fn default() -> Self {
        EncodingStyle::LITERAL
    }
}

impl fmt::Display for EncodingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("literal")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// 本地值表示的类型分类。本地值统一使用 [`serde_json::Value`] 承载。
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum LocalType {
    String,
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// 十进制数，接受数字或数字字符串。
    Decimal,
    /// 二进制，接受 base64 字符串或字节数组。
    Bytes,
    /// 时间戳，以字符串承载。
    DateTime,
    /// 限定名，以 `{ns}local` 字符串承载。
    QName,
    /// 结构体，以对象承载。
    Struct,
    /// 数组，以列表承载。
    Array,
    /// 不做约束。
    Any,
}

impl LocalType {
    /// 判断本地值是否可以按该类型编组。`null` 对所有类型均合法（表示 nil）。
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            LocalType::String | LocalType::DateTime => value.is_string(),
            LocalType::QName => value
                .as_str()
                .is_some_and(|text| text.parse::<QName>().is_ok()),
            LocalType::Boolean => value.is_boolean(),
            LocalType::Byte => integer_within(value, i64::from(i8::MIN), i64::from(i8::MAX)),
            LocalType::Short => integer_within(value, i64::from(i16::MIN), i64::from(i16::MAX)),
            LocalType::Int => integer_within(value, i64::from(i32::MIN), i64::from(i32::MAX)),
            LocalType::Long => value.is_i64(),
            LocalType::Float | LocalType::Double => value.is_number(),
            LocalType::Decimal => {
                value.is_number()
                    || value
                        .as_str()
                        .is_some_and(|text| text.trim().parse::<f64>().is_ok())
            }
            LocalType::Bytes => {
                value.is_string()
                    || value.as_array().is_some_and(|items| {
                        items
                            .iter()
                            .all(|item| integer_within(item, 0, i64::from(u8::MAX)))
                    })
            }
            LocalType::Struct => value.is_object(),
            LocalType::Array => value.is_array(),
            LocalType::Any => true,
        }
    }
}

fn integer_within(value: &Value, min: i64, max: i64) -> bool {
    value
        .as_i64()
        .is_some_and(|number| (min..=max).contains(&number))
}

/// 单个编码风格下的 XML 类型 → 本地类型映射表。
///
/// # 契约说明（What）
/// - 映射表本身是值类型，注册表通过 `Arc` 持有并以写时复制方式更新；
/// - 调用句柄在创建时捕获 `Arc` 快照，之后注册表的修改不会影响已创建的句柄。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeMapping {
    encoding_style: EncodingStyle,
    entries: BTreeMap<QName, LocalType>,
}

impl TypeMapping {
    /// 创建空映射。
    pub fn new(encoding_style: EncodingStyle) -> Self {
        Self {
            encoding_style,
            entries: BTreeMap::new(),
        }
    }

    /// 创建预置标准 XML Schema 映射的表；SOAP 编码风格额外包含 `soapenc` 命名空间下的同名类型。
    pub fn standard(encoding_style: EncodingStyle) -> Self {
        let mut mapping = Self::new(encoding_style);
        for (local, local_type) in STANDARD_XSD_TYPES {
            mapping.register(QName::new(XSD_NAMESPACE, *local), local_type.clone());
        }
        if mapping.encoding_style == EncodingStyle::SOAP_ENCODED {
            for (local, local_type) in STANDARD_SOAPENC_TYPES {
                mapping.register(
                    QName::new(SOAP_ENCODING_NAMESPACE, *local),
                    local_type.clone(),
                );
            }
        }
        mapping
    }

    /// 链式注册。
    pub fn with_type(mut self, xml_type: QName, local_type: LocalType) -> Self {
        self.register(xml_type, local_type);
        self
    }

    /// 注册或覆盖一条映射，返回旧值。
    pub fn register(&mut self, xml_type: QName, local_type: LocalType) -> Option<LocalType> {
        self.entries.insert(xml_type, local_type)
    }

    pub fn remove(&mut self, xml_type: &QName) -> Option<LocalType> {
        self.entries.remove(xml_type)
    }

    pub fn encoding_style(&self) -> &EncodingStyle {
        &self.encoding_style
    }

    pub fn local_type(&self, xml_type: &QName) -> Option<&LocalType> {
        self.entries.get(xml_type)
    }

    pub fn is_registered(&self, xml_type: &QName) -> bool {
        self.entries.contains_key(xml_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QName, &LocalType)> {
        self.entries.iter()
    }
}

const STANDARD_XSD_TYPES: &[(&str, LocalType)] = &[
    ("string", LocalType::String),
    ("normalizedString", LocalType::String),
    ("token", LocalType::String),
    ("anyURI", LocalType::String),
    ("boolean", LocalType::Boolean),
    ("byte", LocalType::Byte),
    ("short", LocalType::Short),
    ("int", LocalType::Int),
    ("long", LocalType::Long),
    ("integer", LocalType::Decimal),
    ("float", LocalType::Float),
    ("double", LocalType::Double),
    ("decimal", LocalType::Decimal),
    ("base64Binary", LocalType::Bytes),
    ("hexBinary", LocalType::Bytes),
    ("dateTime", LocalType::DateTime),
    ("date", LocalType::DateTime),
    ("time", LocalType::DateTime),
    ("QName", LocalType::QName),
    ("anyType", LocalType::Any),
];

const STANDARD_SOAPENC_TYPES: &[(&str, LocalType)] = &[
    ("string", LocalType::String),
    ("boolean", LocalType::Boolean),
    ("byte", LocalType::Byte),
    ("short", LocalType::Short),
    ("int", LocalType::Int),
    ("long", LocalType::Long),
    ("float", LocalType::Float),
    ("double", LocalType::Double),
    ("decimal", LocalType::Decimal),
    ("base64", LocalType::Bytes),
    ("Array", LocalType::Array),
    ("Struct", LocalType::Struct),
];
