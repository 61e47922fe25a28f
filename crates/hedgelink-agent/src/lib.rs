pub mod client;
pub mod pool;
pub mod registry;

pub use client::{
    AgentCallError, AgentClient, CloseRequest, CloseResponse, HistoryQuery, ModifyRequest,
    ModifyResponse, OpenRequest, OpenResponse, PositionInfo, PositionsResponse, Quote,
};
pub use pool::HttpPool;
pub use registry::AgentRegistry;
