//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - Broker + MemoryStore 端到端行为（推送、消费、统计）
//! - 摄取失败隔离与背压
//! - 快照持久化与 HTTP 全链路

use std::sync::Arc;

use broker::Broker;
use chrono::NaiveDate;
use contracts::TurbineConfig;
use kv_store::MemoryStore;
use log_engine::FixedClock;

/// Day the fixed test clock starts on
pub fn test_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default()
}

/// Configuration tuned for fast tests
pub fn test_config(writers: usize) -> TurbineConfig {
    let mut config = TurbineConfig::default();
    config.ingestion.writers = writers;
    config.ingestion.retry_backoff_ms = 1;
    config.ingestion.restart_backoff_ms = 10;
    config
}

/// Broker over a fresh store with a controllable clock
pub fn start_broker(
    store: Arc<MemoryStore>,
    config: &TurbineConfig,
) -> (Arc<FixedClock>, Broker<MemoryStore>) {
    let clock = Arc::new(FixedClock::new(test_day()));
    let broker = Broker::start(store, clock.clone(), config);
    (clock, broker)
}

#[cfg(test)]
mod contract_tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(config_loader::ConfigLoader::validate(&TurbineConfig::default()).is_ok());
    }

    #[test]
    fn test_test_config_is_valid() {
        assert!(config_loader::ConfigLoader::validate(&test_config(4)).is_ok());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use bytes::Bytes;
    use contracts::{ContractError, Pipeline};
    use kv_store::FaultConfig;
    use log_engine::change_rate;

    use super::*;

    /// N 个并发推送 -> 计数器为 N，且 N 条记录各不相同
    #[tokio::test]
    async fn test_concurrent_pushes_get_distinct_offsets() {
        let store = Arc::new(MemoryStore::new());
        let (_, broker) = start_broker(store, &test_config(8));

        let mut handles = Vec::new();
        for i in 0..100 {
            let broker = broker.clone();
            handles.push(tokio::spawn(async move {
                broker
                    .push_datapoint("load", Bytes::from(format!("m{i}")))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        broker.shutdown().await;

        assert_eq!(broker.engine().log().head("load").await.unwrap(), 100);
        let popped = broker.pop_datapoints("load", "c1", Some(1000)).await.unwrap();
        let distinct: HashSet<_> = popped.iter().cloned().collect();
        assert_eq!(popped.len(), 100);
        assert_eq!(distinct.len(), 100);
    }

    #[tokio::test]
    async fn test_pop_in_order_then_empty() {
        let store = Arc::new(MemoryStore::new());
        let (_, broker) = start_broker(store, &test_config(1));

        for v in ["a", "b", "c"] {
            broker.push_datapoint("p1", Bytes::from(v)).await.unwrap();
        }
        broker.shutdown().await;

        let cursors = broker.engine().cursors();
        assert_eq!(cursors.cursor("p1", "c1").await.unwrap(), None);

        let batch = broker.pop_datapoints("p1", "c1", None).await.unwrap();
        assert_eq!(
            batch,
            vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]
        );
        assert_eq!(cursors.cursor("p1", "c1").await.unwrap(), Some(3));
        assert!(broker.pop_datapoints("p1", "c1", None).await.unwrap().is_empty());
        assert_eq!(cursors.cursor("p1", "c1").await.unwrap(), Some(3));

        // provisioned on first push
        let pipeline = broker.get_pipeline("p1").await.unwrap();
        assert_eq!(pipeline.name, "p1");
    }

    #[tokio::test]
    async fn test_batches_follow_cursor_arithmetic() {
        let store = Arc::new(MemoryStore::new());
        let (_, broker) = start_broker(store, &test_config(1));

        for i in 0..15 {
            broker
                .push_datapoint("p2", Bytes::from(format!("{i}")))
                .await
                .unwrap();
        }
        broker.shutdown().await;

        let first = broker.pop_datapoints("p2", "c1", None).await.unwrap();
        let expected: Vec<Bytes> = (0..10).map(|i| Bytes::from(format!("{i}"))).collect();
        assert_eq!(first, expected);

        let pipeline = broker.get_pipeline("p2").await.unwrap();
        assert_eq!(pipeline.consumers.len(), 1);
        assert_eq!(pipeline.consumers[0].unread_elements, 5);

        let second = broker.pop_datapoints("p2", "c1", None).await.unwrap();
        assert_eq!(second.len(), 5);
        assert_eq!(second[0], Bytes::from("10"));

        let cursors = broker.engine().cursors();
        assert_eq!(cursors.cursor("p2", "c1").await.unwrap(), Some(15));
        assert_eq!(cursors.unread_count("p2", "c1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_consumers_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let (_, broker) = start_broker(store, &test_config(2));

        for i in 0..6 {
            broker
                .push_datapoint("shared", Bytes::from(format!("{i}")))
                .await
                .unwrap();
        }
        broker.shutdown().await;

        let cursors = broker.engine().cursors();
        let before = cursors.unread_count("shared", "b").await.unwrap();
        assert_eq!(before, 6);

        broker.pop_datapoints("shared", "a", Some(4)).await.unwrap();
        assert_eq!(cursors.unread_count("shared", "a").await.unwrap(), 2);
        assert_eq!(cursors.unread_count("shared", "b").await.unwrap(), before);

        let consumers = broker.get_pipeline("shared").await.unwrap().consumers;
        let ids: Vec<_> = consumers.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[tokio::test]
    async fn test_unread_count_never_negative_for_unknown_consumer() {
        let store = Arc::new(MemoryStore::new());
        let (_, broker) = start_broker(store, &test_config(1));
        broker.shutdown().await;

        let cursors = broker.engine().cursors();
        assert_eq!(cursors.unread_count("empty", "nobody").await.unwrap(), 0);
        assert!(broker
            .pop_datapoints("empty", "nobody", None)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(cursors.unread_count("empty", "nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_change_rate_across_days() {
        let store = Arc::new(MemoryStore::new());
        let (clock, broker) = start_broker(store, &test_config(2));

        for i in 0..10 {
            broker
                .push_datapoint("daily", Bytes::from(format!("y{i}")))
                .await
                .unwrap();
        }
        // let yesterday's writes land before the clock moves
        wait_for_head(&broker, "daily", 10).await;
        clock.advance(1);
        for i in 0..15 {
            broker
                .push_datapoint("daily", Bytes::from(format!("t{i}")))
                .await
                .unwrap();
        }
        broker.shutdown().await;

        let statistic = broker.get_statistics("daily").await.unwrap();
        assert_eq!(statistic.today, 15);
        assert!((statistic.change_rate - 50.0).abs() < 1e-9);
        assert_eq!(statistic.statistics.len(), 10);
        assert_eq!(statistic.statistics[0].intake, 15);
        assert_eq!(statistic.statistics[1].intake, 10);
        assert_eq!(statistic.statistics[1].date, test_day());

        // stable without pushes
        let again = broker.get_statistics("daily").await.unwrap();
        assert_eq!(statistic, again);
        assert_eq!(change_rate(3, 0), 0.0);
    }

    #[tokio::test]
    async fn test_failing_pipeline_does_not_block_siblings() {
        let store = Arc::new(MemoryStore::with_faults(FaultConfig {
            fail_prefixes: vec!["pipeline:broken:".to_string()],
        }));
        let (_, broker) = start_broker(store, &test_config(2));
        let failures = broker.take_failures().unwrap();

        broker
            .push_datapoint("broken", Bytes::from("lost"))
            .await
            .unwrap();
        for i in 0..5 {
            broker
                .push_datapoint("healthy", Bytes::from(format!("{i}")))
                .await
                .unwrap();
        }
        broker.shutdown().await;

        assert_eq!(broker.engine().log().head("healthy").await.unwrap(), 5);
        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.pipeline_id, "broken");
        assert_eq!(failure.payload, Bytes::from("lost"));
        assert_eq!(broker.ingestion_metrics().written, 5);
        assert_eq!(broker.ingestion_metrics().failed, 1);
    }

    #[tokio::test]
    async fn test_saturated_queue_reports_busy() {
        let mut config = test_config(0);
        config.ingestion.queue_capacity = 1;
        config.ingestion.enqueue_timeout_ms = 20;
        let (_, broker) = start_broker(Arc::new(MemoryStore::new()), &config);

        broker.push_datapoint("p1", Bytes::from("a")).await.unwrap();
        let err = broker
            .push_datapoint("p1", Bytes::from("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::Busy { .. }));
        broker.shutdown().await;
    }

    #[tokio::test]
    async fn test_crud_round() {
        let (_, broker) = start_broker(Arc::new(MemoryStore::new()), &test_config(1));

        let created = broker
            .create_pipeline(Pipeline::new("", "orders").with_description("all orders"))
            .await
            .unwrap();
        assert!(!created.id.is_empty());

        let listed = broker.list_pipelines().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);

        assert!(broker.delete_pipeline(&created.id).await.unwrap());
        assert!(!broker.delete_pipeline(&created.id).await.unwrap());
        assert!(matches!(
            broker.get_pipeline(&created.id).await,
            Err(ContractError::NotFound { .. })
        ));
        broker.shutdown().await;
    }

    #[tokio::test]
    async fn test_snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turbine.json");

        let store = Arc::new(MemoryStore::new());
        let (_, broker) = start_broker(store.clone(), &test_config(1));
        for v in ["a", "b", "c", "d"] {
            broker.push_datapoint("durable", Bytes::from(v)).await.unwrap();
        }
        broker.shutdown().await;
        broker.pop_datapoints("durable", "c1", Some(2)).await.unwrap();
        store.save_snapshot(&path).unwrap();

        let restored = Arc::new(MemoryStore::open(&path).unwrap());
        let (_, broker) = start_broker(restored, &test_config(1));
        let rest = broker.pop_datapoints("durable", "c1", None).await.unwrap();
        assert_eq!(rest, vec![Bytes::from("c"), Bytes::from("d")]);

        broker.push_datapoint("durable", Bytes::from("e")).await.unwrap();
        broker.shutdown().await;
        assert_eq!(broker.engine().log().head("durable").await.unwrap(), 5);
    }

    async fn wait_for_head(broker: &Broker<MemoryStore>, pipeline_id: &str, expected: u64) {
        for _ in 0..200 {
            if broker.engine().log().head(pipeline_id).await.unwrap() >= expected
                && broker.ingestion_metrics().written >= expected
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("pipeline {pipeline_id} never reached head {expected}");
    }
}

#[cfg(test)]
mod http_tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    /// HTTP 全链路：推送 -> 排空 -> 消费
    #[tokio::test]
    async fn test_push_and_pop_over_http() {
        let (_, broker) = start_broker(Arc::new(MemoryStore::new()), &test_config(1));
        let app = api::router(broker.clone());

        for v in ["x", "y"] {
            let response = app
                .clone()
                .oneshot(
                    Request::post("/api/v1/pipelines/web/datapoints")
                        .body(Body::from(v))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
        }
        broker.shutdown().await;

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/v1/pipelines/web/datapoints?consumer=c1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let values: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(values, vec!["x", "y"]);

        let response = app
            .oneshot(
                Request::get("/api/v1/pipelines/web/statistics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["today"], 2);
    }
}
