//! 调用句柄的标准属性名。
//!
//! 签名相关的属性（SOAPAction URI、编码风格、操作风格）会被路由到对应的 setter，
//! 因此同样受句柄生命周期状态约束；其余属性在任何状态下都可设置。

use serde_json::Value;

use crate::error::{Result, RpcError};

pub const USERNAME: &str = "javax.xml.rpc.security.auth.username";
pub const PASSWORD: &str = "javax.xml.rpc.security.auth.password";
pub const SESSION_MAINTAIN: &str = "javax.xml.rpc.session.maintain";
pub const SOAPACTION_USE: &str = "javax.xml.rpc.soap.http.soapaction.use";
pub const SOAPACTION_URI: &str = "javax.xml.rpc.soap.http.soapaction.uri";
pub const ENCODING_STYLE_URI: &str = "javax.xml.rpc.encodingstyle.namespace.uri";
pub const OPERATION_STYLE: &str = "javax.xml.rpc.soap.operation.style";

/// 属性值的期望形态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PropertyShape {
    Text,
    Flag,
    Free,
}

pub(crate) fn shape_of(name: &str) -> PropertyShape {
    match name {
        USERNAME | PASSWORD | SOAPACTION_URI | ENCODING_STYLE_URI | OPERATION_STYLE => {
            PropertyShape::Text
        }
        SESSION_MAINTAIN | SOAPACTION_USE => PropertyShape::Flag,
        _ => PropertyShape::Free,
    }
}

pub(crate) fn check_shape(name: &str, value: &Value) -> Result<()> {
    let valid = match shape_of(name) {
        PropertyShape::Text => value.is_string(),
        PropertyShape::Flag => value.is_boolean(),
        PropertyShape::Free => true,
    };
    if valid {
        Ok(())
    } else {
        let expected = match shape_of(name) {
            PropertyShape::Text => "a string",
            _ => "a boolean",
        };
        Err(RpcError::InvalidProperty {
            name: name.to_owned(),
            detail: format!("expected {expected}, got {value}"),
        })
    }
}
