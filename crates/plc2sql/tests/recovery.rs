//! Supervisor restarts driven by a scripted source.

mod common;

use common::{good, store_with_tags, RecordingAlert, ScriptedSource, Step};
use plc2sql::{RecoverySupervisor, RestartPolicy, SessionSettings, TagRegistry};
use plc2sql_db::{NewTag, PlcDb};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

fn settings() -> SessionSettings {
    SessionSettings {
        endpoint: "sim://line1".to_string(),
        period: Duration::from_millis(1),
        verbose: false,
    }
}

fn policy(max_restarts: u32) -> RestartPolicy {
    RestartPolicy {
        max_restarts,
        window: Duration::from_secs(60),
        delay: Duration::from_millis(1),
        escalated_delay: Duration::from_millis(5),
    }
}

async fn supervise(
    db: &PlcDb,
    steps: Vec<Step>,
    failing_connects: u32,
    policy: RestartPolicy,
) -> (plc2sql::SupervisorReport, common::SourceLog, RecordingAlert) {
    let registry = TagRegistry::load(db, Instant::now()).await.unwrap();
    supervise_from(db, registry, steps, failing_connects, policy).await
}

/// Run with `initial` as the first session's registry; later sessions reload.
async fn supervise_from(
    db: &PlcDb,
    initial: TagRegistry,
    steps: Vec<Step>,
    failing_connects: u32,
    policy: RestartPolicy,
) -> (plc2sql::SupervisorReport, common::SourceLog, RecordingAlert) {
    let (tx, rx) = watch::channel(false);
    let (source, log) = ScriptedSource::new(steps);
    let source = source.with_failing_connects(failing_connects).with_shutdown(tx);
    let alert = RecordingAlert::default();

    let supervisor = RecoverySupervisor::new(
        db.clone(),
        Box::new(source),
        Arc::new(alert.clone()),
        settings(),
        policy,
    );
    let report = tokio::time::timeout(Duration::from_secs(10), supervisor.run(initial, rx))
        .await
        .expect("supervisor did not stop");

    let log = std::mem::take(&mut *log.lock().unwrap());
    (report, log, alert)
}

#[tokio::test]
async fn test_read_failure_restarts_with_forced_resync() {
    let db = store_with_tags(&[(1, "[plc]Count", 1, "")]).await;
    let steps = vec![
        Step::Read(good(&[5.0])),
        Step::Fail("connection reset"),
        Step::Read(good(&[5.0])),
    ];

    let (report, log, alert) = supervise(&db, steps, 0, policy(10)).await;

    assert_eq!(report.sessions, 2);
    assert_eq!(report.restarts, 1);
    assert_eq!(report.alerts, 0);
    assert_eq!(alert.count(), 0);
    assert_eq!(log.connects, 2);
    assert_eq!(log.disconnects, 2);

    // the unchanged 5 is written again by the new session's forced cycle
    let history = db.history_list(1).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|h| h.val == "5"));
}

#[tokio::test]
async fn test_alert_sent_once_threshold_reached() {
    let db = store_with_tags(&[(1, "[plc]Count", 1, "")]).await;
    let steps = vec![
        Step::Fail("timeout"),
        Step::Fail("timeout"),
        Step::Fail("timeout"),
        Step::Read(good(&[1.0])),
    ];

    let (report, _, alert) = supervise(&db, steps, 0, policy(2)).await;

    assert_eq!(report.sessions, 4);
    assert_eq!(report.restarts, 3);
    assert_eq!(report.alerts, 1);

    let sent = alert.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].0.contains("restarted 2 times"));
    assert!(sent[0].1.contains("timeout"));
    assert!(sent[0].1.contains("Retrying every 5 ms"));
}

#[tokio::test]
async fn test_connect_failures_are_retried() {
    let db = store_with_tags(&[(1, "[plc]Count", 1, "")]).await;

    let (report, log, _) = supervise(&db, vec![Step::Read(good(&[7.0]))], 2, policy(10)).await;

    assert_eq!(report.sessions, 3);
    assert_eq!(report.restarts, 2);
    assert_eq!(log.connects, 3);
    assert_eq!(log.reads, 1);
    assert_eq!(db.live_get(1).await.unwrap().unwrap().val, "7");
}

#[tokio::test]
async fn test_shutdown_interrupts_restart_delay() {
    let db = store_with_tags(&[(1, "[plc]Count", 1, "")]).await;
    let slow = RestartPolicy {
        delay: Duration::from_secs(3600),
        escalated_delay: Duration::from_secs(3600),
        ..policy(10)
    };

    // the only step fails and requests shutdown at the same time
    let (report, log, _) = supervise(&db, vec![Step::Fail("gone")], 0, slow).await;

    assert_eq!(report.sessions, 1);
    assert_eq!(report.restarts, 1);
    assert_eq!(log.disconnects, 1);
}

#[tokio::test]
async fn test_restart_reloads_registry() {
    let db = store_with_tags(&[(1, "[plc]Count", 1, "")]).await;
    let initial = TagRegistry::load(&db, Instant::now()).await.unwrap();

    // added after startup validation; only a restarted session sees it
    let mut extra = NewTag::new("[plc]Speed", "speed", 1, "");
    extra.id = Some(2);
    db.tag_insert(&extra).await.unwrap();

    let steps = vec![
        Step::Read(good(&[5.0])),
        Step::Fail("connection reset"),
        Step::Read(good(&[5.0, 12.5])),
    ];
    let (report, log, _) = supervise_from(&db, initial, steps, 0, policy(10)).await;

    assert_eq!(report.sessions, 2);
    assert_eq!(log.batch_sizes, vec![1, 1, 2]);
    assert_eq!(db.live_get(2).await.unwrap().unwrap().val, "12.5");
}
