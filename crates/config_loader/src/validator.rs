//! 配置校验模块
//!
//! 校验规则：
//! - server.bind 为合法 socket 地址
//! - writers / queue_capacity / failure_capacity >= 1
//! - 1 <= batch_limit <= max_batch_limit
//! - 1 <= window_days <= 366
//! - 配置 snapshot_path 时 snapshot_interval_secs >= 1
//! - backend = redis 时 redis_url 使用 redis / rediss / tcp / unix scheme

use std::net::SocketAddr;

use contracts::{ContractError, StoreBackend, TurbineConfig};

const REDIS_SCHEMES: [&str; 4] = ["redis://", "rediss://", "tcp://", "unix://"];

/// 统计窗口上限（天）
pub const MAX_WINDOW_DAYS: u32 = 366;

/// 校验 TurbineConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &TurbineConfig) -> Result<(), ContractError> {
    validate_server(config)?;
    validate_store(config)?;
    validate_ingestion(config)?;
    validate_consumer(config)?;
    validate_statistics(config)?;
    Ok(())
}

/// 校验监听地址
fn validate_server(config: &TurbineConfig) -> Result<(), ContractError> {
    config
        .server
        .bind
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|e| {
            ContractError::config_validation(
                "server.bind",
                format!("'{}' is not a socket address: {e}", config.server.bind),
            )
        })
}

/// 校验存储后端与快照设置
fn validate_store(config: &TurbineConfig) -> Result<(), ContractError> {
    let store = &config.store;
    if store.backend == StoreBackend::Redis
        && !REDIS_SCHEMES.iter().any(|scheme| store.redis_url.starts_with(scheme))
    {
        return Err(ContractError::config_validation(
            "store.redis_url",
            format!("'{}' is not a redis:// or tcp:// URL", store.redis_url),
        ));
    }
    if store.snapshot_path.is_some() && store.snapshot_interval_secs == 0 {
        return Err(ContractError::config_validation(
            "store.snapshot_interval_secs",
            "snapshot_interval_secs must be >= 1 when snapshot_path is set",
        ));
    }
    Ok(())
}

/// 校验摄取参数
fn validate_ingestion(config: &TurbineConfig) -> Result<(), ContractError> {
    let ingestion = &config.ingestion;
    let positive = [
        ("ingestion.writers", ingestion.writers),
        ("ingestion.queue_capacity", ingestion.queue_capacity),
        ("ingestion.failure_capacity", ingestion.failure_capacity),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(ContractError::config_validation(
                field,
                "must be >= 1, got 0",
            ));
        }
    }
    Ok(())
}

/// 校验消费批量
fn validate_consumer(config: &TurbineConfig) -> Result<(), ContractError> {
    let consumer = &config.consumer;
    if consumer.batch_limit == 0 {
        return Err(ContractError::config_validation(
            "consumer.batch_limit",
            "batch_limit must be >= 1",
        ));
    }
    if consumer.batch_limit > consumer.max_batch_limit {
        return Err(ContractError::config_validation(
            "consumer.batch_limit / consumer.max_batch_limit",
            format!(
                "batch_limit ({}) must be <= max_batch_limit ({})",
                consumer.batch_limit, consumer.max_batch_limit
            ),
        ));
    }
    Ok(())
}

/// 校验统计窗口
fn validate_statistics(config: &TurbineConfig) -> Result<(), ContractError> {
    let days = config.statistics.window_days;
    if days == 0 || days > MAX_WINDOW_DAYS {
        return Err(ContractError::config_validation(
            "statistics.window_days",
            format!("window_days must be within 1..={MAX_WINDOW_DAYS}, got {days}"),
        ));
    }
    Ok(())
}
