//! 标识符类型
//!
//! 定义端口和缓冲组的唯一标识符。

use serde::Serialize;

/// 端口标识符（交换机内从 0 开始编号）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PortId(pub usize);

/// 缓冲组标识符：端口 `i` 属于组 `i / ports_per_group`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupId(pub usize);
