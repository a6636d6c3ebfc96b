//! Ingestion 错误类型

use bytes::Bytes;
use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 队列已满且等待超时
    #[error("ingestion queue full for pipeline '{pipeline_id}' after {waited_ms}ms")]
    QueueFull {
        /// Pipeline ID
        pipeline_id: String,
        /// 实际等待时长
        waited_ms: u64,
    },

    /// 管道已关闭，不再接受数据点
    #[error("ingestion closed")]
    Closed,

    /// 重试耗尽
    #[error("datapoint for pipeline '{pipeline_id}' failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Pipeline ID
        pipeline_id: String,
        /// 总尝试次数（含首次）
        attempts: u32,
        /// 最后一次失败原因
        #[source]
        source: ContractError,
    },

    /// 处理数据点时 worker panic
    #[error("worker panicked on datapoint for pipeline '{pipeline_id}': {message}")]
    WorkerPanicked {
        /// Pipeline ID
        pipeline_id: String,
        /// panic 信息
        message: String,
    },
}

impl IngestionError {
    /// 是否由存储连接故障导致
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::RetriesExhausted { source, .. } if source.is_store_unavailable())
    }
}

impl From<IngestionError> for ContractError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::QueueFull {
                pipeline_id,
                waited_ms,
            } => ContractError::Busy {
                pipeline_id,
                waited_ms,
            },
            IngestionError::Closed => ContractError::storage("ingestion closed"),
            IngestionError::RetriesExhausted { source, .. } => source,
            err @ IngestionError::WorkerPanicked { .. } => ContractError::storage(err.to_string()),
        }
    }
}

/// 重试耗尽后上报的失败数据点
#[derive(Debug, Clone)]
pub struct IngestionFailure {
    pub pipeline_id: String,
    pub payload: Bytes,
    /// 已分配的 offset（分配前即失败时为 None）
    pub offset: Option<u64>,
    pub attempts: u32,
    /// 数据已写入日志、可被消费；仅当日 intake 计数缺失
    pub written: bool,
    pub error: String,
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
