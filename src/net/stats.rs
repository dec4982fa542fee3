//! 统计信息
//!
//! 全网汇总计数；端口级计数在 `crate::mmu::PortStats`。

/// 网络统计信息
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct Stats {
    pub arrived_pkts: u64,
    pub admitted_pkts: u64,
    pub dropped_pkts: u64,
    pub dropped_bytes: u64,
    pub ecn_marked: u64,
    pub pushed_out: u64,
    pub head_dropped: u64,
    pub token_evicted: u64,
    pub delivered_pkts: u64,
    pub delivered_bytes: u64,
}
