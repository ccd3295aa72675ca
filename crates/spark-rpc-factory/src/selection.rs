//! 省略端口时的确定性选择。
//!
//! 候选顺序只取决于元数据仓库的端口序列与 [`PortSelection`]，因此对同一元数据源，
//! 无论调用多少次、在哪个线程调用，选择结果都相同。

use spark_rpc_core::QName;

use crate::config::PortSelection;

/// 按策略排列候选端口。
pub fn ordered(ports: &[QName], policy: PortSelection) -> Vec<&QName> {
    let mut candidates: Vec<&QName> = ports.iter().collect();
    if policy == PortSelection::Lexicographic {
        candidates.sort();
    }
    candidates
}

/// 按策略排列后，返回第一个满足 `accept` 的候选及其结果。
pub fn select<'a, T, F>(ports: &'a [QName], policy: PortSelection, accept: F) -> Option<T>
where
    F: FnMut(&'a QName) -> Option<T>,
{
    ordered(ports, policy).into_iter().find_map(accept)
}
