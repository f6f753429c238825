//! pump.fun 事件核心模块
//!
//! - 事件定义与解码结果
//! - 交易/日志到事件的流水线
//! - 滑动窗口成交量聚合
//! - bonding curve 定价

pub mod aggregator; // 成交量滑动窗口
pub mod cache;      // 签名去重
pub mod events;     // 事件定义
pub mod pipeline;   // 通知 -> 事件
pub mod pricer;     // 价格查询

pub use aggregator::{TradeAggregator, VolumeSnapshot, WindowStats};
pub use cache::SignatureCache;
pub use events::*;
pub use pipeline::{EventPipeline, PipelineStats};
pub use pricer::{price, PriceLookupConfig, PriceService, LAMPORTS_PER_SOL};
