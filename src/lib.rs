// 核心模块 - 扁平化结构
pub mod accounts; // 账户解码 + RPC 拉取
pub mod core;     // 事件、流水线、聚合、定价
pub mod error;
pub mod idl;      // 接口描述 (Anchor IDL)
pub mod instr;    // 指令解码
pub mod logs;     // 日志解码
pub mod tx_parser;

// WebSocket 订阅
pub mod ws;

// 重新导出主要API
pub use core::{
    // 事件类型
    CurveCompleteEvent, EventMetadata, PriceEvent, PriceOutcome, PumpEvent, TokenCreatedEvent,
    TradeDirection, TradeEvent,
    // 处理
    EventPipeline, PriceService, TradeAggregator, VolumeSnapshot,
};

pub use error::{DecodeError, DescriptorError, FetchError, ParseError, PricingError, StreamError};
pub use idl::InterfaceDescriptor;
pub use tx_parser::{ParsedTransaction, RawTransaction, TransactionParser};
pub use ws::{
    ClientConfig, ListenerConfig, PumpStream, StreamHandle, Topic, DEFAULT_RPC_ENDPOINT, DEFAULT_WSS_ENDPOINT,
};
