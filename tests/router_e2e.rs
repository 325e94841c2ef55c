use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use serde_json::{json, Value};

use bucketcast::remote::InMemoryNotificationBackend;
use bucketcast::router::{ChannelPublisher, Delivery, RouterConfig};
use bucketcast::{NotificationService, Router, RouterSystem, Rule};
use bucketcast::config::RouterSettings;

fn setup() -> (NotificationService, Router, Receiver<Delivery>) {
    let backend = Arc::new(InMemoryNotificationBackend::with_buckets(["photos"]));
    let service = NotificationService::in_memory(backend, "arn:minio:sqs::bucketcast:mqtt");
    let (publisher, rx) = ChannelPublisher::bounded(256);
    let router = Router::new(
        RouterConfig {
            base_topic: "minio/events".to_string(),
            publish_timeout: Duration::from_millis(100),
        },
        service.rule_store(),
        Arc::new(publisher),
    );
    (service, router, rx)
}

fn event(action: &str, key: &str) -> Value {
    json!({
        "eventName": action,
        "s3": {"bucket": {"name": "photos"}, "object": {"key": key, "size": 1024}}
    })
}

fn envelope(records: Vec<Value>) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "EventName": "s3:ObjectCreated:Put",
        "Key": "photos/img/cat.jpg",
        "Records": records,
    }))
    .unwrap()
}

#[test]
fn photos_scenario_routes_only_matching_keys() {
    let (service, router, rx) = setup();
    let rule = service
        .add_rule(Rule::new("photos", ["s3:ObjectCreated:Put"], "img/", ".jpg"), None)
        .unwrap();

    router
        .route(&envelope(vec![event("s3:ObjectCreated:Put", "img/cat.jpg")]))
        .unwrap();
    let d = rx.try_recv().unwrap();
    assert_eq!(d.destination, format!("minio/events/{}", rule.topic()));

    let out: Value = serde_json::from_slice(&d.payload).unwrap();
    assert_eq!(out["EventName"], "s3:ObjectCreated:Put");
    assert_eq!(out["Key"], "photos/img/cat.jpg");
    assert_eq!(out["Records"].as_array().unwrap().len(), 1);
    assert_eq!(out["Records"][0], event("s3:ObjectCreated:Put", "img/cat.jpg"));

    let report = router
        .route(&envelope(vec![event("s3:ObjectCreated:Put", "img/cat.png")]))
        .unwrap();
    assert_eq!(report.delivered, 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn wildcard_rule_matches_namespace() {
    let (service, router, rx) = setup();
    service
        .add_rule(Rule::new("photos", ["s3:ObjectCreated:*"], "", ""), None)
        .unwrap();

    let report = router
        .route(&envelope(vec![
            event("s3:ObjectCreated:Put", "a"),
            event("s3:ObjectCreated:CompleteMultipartUpload", "b"),
            event("s3:ObjectRemoved:Delete", "c"),
        ]))
        .unwrap();
    assert_eq!(report.records, 3);
    assert_eq!(report.delivered, 2);
    assert_eq!(rx.try_iter().count(), 2);
}

#[test]
fn duplicate_rules_deliver_once_per_record() {
    let (service, router, rx) = setup();
    let rule = Rule::new("photos", ["s3:ObjectCreated:Put", "s3:ObjectRemoved:Delete"], "", "");
    service.add_rule(rule.clone(), None).unwrap();
    service
        .add_rule(
            Rule::new("photos", ["s3:ObjectRemoved:Delete", "s3:ObjectCreated:Put"], "", ""),
            None,
        )
        .unwrap();

    router
        .route(&envelope(vec![
            event("s3:ObjectCreated:Put", "a"),
            event("s3:ObjectCreated:Put", "b"),
        ]))
        .unwrap();
    let deliveries: Vec<Delivery> = rx.try_iter().collect();
    assert_eq!(deliveries.len(), 2);
    assert!(deliveries
        .iter()
        .all(|d| d.destination == format!("minio/events/{}", rule.topic())));
}

#[test]
fn deleted_rule_stops_routing() {
    let (service, router, rx) = setup();
    let stored = service
        .add_rule(Rule::new("photos", ["s3:ObjectCreated:Put"], "", ""), None)
        .unwrap();
    service.delete_rule("photos", stored.id).unwrap();

    router
        .route(&envelope(vec![event("s3:ObjectCreated:Put", "a")]))
        .unwrap();
    assert!(rx.try_recv().is_err());
}

#[test]
fn router_system_routes_in_background() {
    let (service, router, rx) = setup();
    service
        .add_rule(Rule::new("photos", ["s3:ObjectCreated:*"], "", ""), None)
        .unwrap();

    let system = RouterSystem::start(
        RouterSettings {
            workers: 2,
            queue_capacity: 16,
        },
        Arc::new(router),
    )
    .unwrap();
    for i in 0..5 {
        assert!(system.submit(envelope(vec![event("s3:ObjectCreated:Put", &format!("k{i}"))])));
    }
    system.shutdown();

    assert_eq!(rx.try_iter().count(), 5);
}
