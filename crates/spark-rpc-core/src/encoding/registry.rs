use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::mapping::{EncodingStyle, LocalType, TypeMapping};
use crate::qname::QName;

/// 注册表的不可变内容：按编码风格索引的映射表与默认映射。
#[derive(Clone, Debug, Default)]
struct TypeMappingTable {
    mappings: BTreeMap<EncodingStyle, Arc<TypeMapping>>,
    default_mapping: Option<Arc<TypeMapping>>,
}

/// 工厂共享的类型映射注册表。
///
/// # 教案级说明
/// - **契约 (What)**：每个编码风格至多一张 [`TypeMapping`]；另有一张可选的默认映射，在风格未注册时兜底；
///   通过 [`Self::with_standard_mappings`] 构造的实例预置 literal 与 SOAP 编码两种风格的标准映射。
/// - **并发 (How)**：内部以 [`ArcSwap`] 持有整张表，读路径 `load` 无锁，写路径使用 `rcu` 整表替换；
///   [`Self::snapshot`] 返回的 [`TypeMappingSnapshot`] 在句柄创建期间保持一致视图。
/// - **共享语义**：注册表以 `Arc` 在工厂与调用方之间共享，任一持有者的修改对其他持有者与之后创建的
///   句柄、代理立即可见；已创建的句柄不受影响。
#[derive(Debug)]
pub struct TypeMappingRegistry {
    table: ArcSwap<TypeMappingTable>,
}

impl TypeMappingRegistry {
    /// 创建空注册表。
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(TypeMappingTable::default()),
        }
    }

    /// 创建预置标准映射的注册表，默认映射为 literal 风格。
    pub fn with_standard_mappings() -> Self {
        let literal = Arc::new(TypeMapping::standard(EncodingStyle::LITERAL));
        let encoded = Arc::new(TypeMapping::standard(EncodingStyle::SOAP_ENCODED));
        let mut mappings = BTreeMap::new();
        mappings.insert(EncodingStyle::LITERAL, Arc::clone(&literal));
        mappings.insert(EncodingStyle::SOAP_ENCODED, encoded);
        Self {
            table: ArcSwap::from_pointee(TypeMappingTable {
                mappings,
                default_mapping: Some(literal),
            }),
        }
    }

    /// 以映射表自身的编码风格注册，返回被替换的旧表。
    pub fn register(&self, mapping: TypeMapping) -> Option<Arc<TypeMapping>> {
        let style = mapping.encoding_style().clone();
        let mapping = Arc::new(mapping);
        let previous = self.table.rcu(|table| {
            let mut next = TypeMappingTable::clone(table);
            next.mappings.insert(style.clone(), Arc::clone(&mapping));
            next
        });
        tracing::debug!(encoding_style = %style, "type mapping registered");
        previous.mappings.get(&style).cloned()
    }

    /// 设置默认映射，返回旧的默认映射。
    pub fn register_default(&self, mapping: TypeMapping) -> Option<Arc<TypeMapping>> {
        let mapping = Arc::new(mapping);
        let previous = self.table.rcu(|table| {
            let mut next = TypeMappingTable::clone(table);
            next.default_mapping = Some(Arc::clone(&mapping));
            next
        });
        previous.default_mapping.clone()
    }

    /// 在指定风格的映射表中注册单个类型；风格尚未注册时先创建空表。
    ///
    /// 旧表若仍被句柄快照持有，则复制后再修改，已发出的快照保持不变。
    pub fn register_type(&self, style: &EncodingStyle, xml_type: QName, local_type: LocalType) {
        self.table.rcu(|table| {
            let mut next = TypeMappingTable::clone(table);
            let entry = next
                .mappings
                .entry(style.clone())
                .or_insert_with(|| Arc::new(TypeMapping::new(style.clone())));
            Arc::make_mut(entry).register(xml_type.clone(), local_type.clone());
            next
        });
        tracing::debug!(encoding_style = %style, xml_type = %xml_type, "type registered");
    }

    /// 移除指定风格的映射表。
    pub fn unregister(&self, style: &EncodingStyle) -> Option<Arc<TypeMapping>> {
        let previous = self.table.rcu(|table| {
            let mut next = TypeMappingTable::clone(table);
            next.mappings.remove(style);
            next
        });
        previous.mappings.get(style).cloned()
    }

    /// 清空所有映射（包括默认映射）。
    pub fn clear(&self) {
        self.table.store(Arc::new(TypeMappingTable::default()));
    }

    /// 创建指定风格的空映射表，不会注册到注册表。
    pub fn create_type_mapping(&self, style: EncodingStyle) -> TypeMapping {
        TypeMapping::new(style)
    }

    /// 精确查询某风格的映射表，不回退到默认映射。
    pub fn type_mapping(&self, style: &EncodingStyle) -> Option<Arc<TypeMapping>> {
        self.table.load().mappings.get(style).cloned()
    }

    pub fn default_type_mapping(&self) -> Option<Arc<TypeMapping>> {
        self.table.load().default_mapping.clone()
    }

    /// 已注册的编码风格，按字典序排列。
    pub fn registered_encoding_styles(&self) -> Vec<EncodingStyle> {
        self.table.load().mappings.keys().cloned().collect()
    }

    /// 捕获当前注册表的一致快照。
    pub fn snapshot(&self) -> TypeMappingSnapshot {
        TypeMappingSnapshot {
            table: self.table.load_full(),
        }
    }
}

impl Default for TypeMappingRegistry {
    fn default() -> Self {
        Self::with_standard_mappings()
    }
}

/// 注册表在某一时刻的只读视图，由调用句柄持有。
#[derive(Clone, Debug)]
pub struct TypeMappingSnapshot {
    table: Arc<TypeMappingTable>,
}

impl TypeMappingSnapshot {
    /// 空快照，所有查询均未命中。
    pub fn empty() -> Self {
        Self {
            table: Arc::new(TypeMappingTable::default()),
        }
    }

    /// 查询指定风格的映射表，未注册时回退到默认映射。
    pub fn resolve(&self, style: &EncodingStyle) -> Option<&TypeMapping> {
        self.table
            .mappings
            .get(style)
            .or(self.table.default_mapping.as_ref())
            .map(Arc::as_ref)
    }
}
