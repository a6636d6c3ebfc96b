//! Turbine 指标记录模块
//!
//! 摄取管道与消费者读取的 Prometheus 指标，以及写入延迟的在线统计。
//! 未安装 recorder 时所有调用都是空操作。

use metrics::{counter, gauge, histogram};

/// 记录数据点入队
pub fn record_datapoint_enqueued(pipeline_id: &str) {
    counter!(
        "turbine_datapoints_enqueued_total",
        "pipeline" => pipeline_id.to_string()
    )
    .increment(1);
}

/// 记录数据点写入成功及写入耗时 (messageloop 计时)
pub fn record_datapoint_written(pipeline_id: &str, latency_ms: f64) {
    counter!(
        "turbine_datapoints_written_total",
        "pipeline" => pipeline_id.to_string()
    )
    .increment(1);
    histogram!("turbine_ingestion_write_latency_ms").record(latency_ms);
}

/// 记录重试耗尽后的失败数据点
pub fn record_datapoint_failed(pipeline_id: &str) {
    counter!(
        "turbine_datapoints_failed_total",
        "pipeline" => pipeline_id.to_string()
    )
    .increment(1);
}

/// 记录已写入但当日 intake 计数失败的数据点
pub fn record_intake_missed(pipeline_id: &str) {
    counter!(
        "turbine_intake_missed_total",
        "pipeline" => pipeline_id.to_string()
    )
    .increment(1);
}

/// 记录一次写入重试
pub fn record_ingestion_retry() {
    counter!("turbine_ingestion_retries_total").increment(1);
}

/// 记录 worker 重启
pub fn record_worker_restart(worker_id: usize, reason: &'static str) {
    counter!(
        "turbine_worker_restarts_total",
        "worker" => worker_id.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// 记录消费者读取的数据点数量
pub fn record_datapoints_popped(pipeline_id: &str, count: usize) {
    counter!(
        "turbine_datapoints_popped_total",
        "pipeline" => pipeline_id.to_string()
    )
    .increment(count as u64);
}

/// 记录摄取队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("turbine_ingestion_queue_depth").set(depth as f64);
}

/// 统计摘要
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
