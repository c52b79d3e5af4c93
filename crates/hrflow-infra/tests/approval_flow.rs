//! End-to-end approval flows against a real SQLite database.

use std::sync::Arc;

use hrflow_core::engine::ApprovalEngine;
use hrflow_core::event::bus::EventBus;
use hrflow_core::notify::FanoutNotifier;
use hrflow_core::registry::TemplateRegistry;
use hrflow_core::repository::instance::InstanceRepository;
use hrflow_core::resolver::RoleDirectoryResolver;
use hrflow_infra::notifier::TracingNotifier;
use hrflow_infra::sqlite::instance::SqliteInstanceRepository;
use hrflow_infra::sqlite::outbox::{OutboxFilter, SqliteOutboxNotifier};
use hrflow_infra::sqlite::pool::DatabasePool;
use hrflow_infra::sqlite::template::SqliteTemplateRepository;
use hrflow_types::actor::Actor;
use hrflow_types::approval::{Decision, RecordDecisionRequest, StepStatus, Transition};
use hrflow_types::config::EngineConfig;
use hrflow_types::error::WorkflowError;
use hrflow_types::event::NotificationKind;
use hrflow_types::instance::{CreateInstanceRequest, InstanceId, InstanceStatus};
use hrflow_types::template::{
    AggregationRule, ApproverRef, CreateTemplateRequest, DomainType, StepDefinition,
};
use serde_json::json;
use tempfile::TempDir;

type Engine = ApprovalEngine<
    SqliteInstanceRepository,
    SqliteTemplateRepository,
    RoleDirectoryResolver,
    FanoutNotifier,
>;

struct Fixture {
    engine: Arc<Engine>,
    registry: TemplateRegistry<SqliteTemplateRepository>,
    instances: SqliteInstanceRepository,
    outbox: SqliteOutboxNotifier,
    bus: EventBus,
    _dir: TempDir,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("hrflow.db").display());
    let pool = DatabasePool::new(&url).await.unwrap();

    let templates = SqliteTemplateRepository::new(pool.clone());
    let instances = SqliteInstanceRepository::new(pool.clone());
    let outbox = SqliteOutboxNotifier::new(pool);
    let bus = EventBus::new(64);
    let notifier = FanoutNotifier::new()
        .with(outbox.clone())
        .with(bus.clone())
        .with(TracingNotifier::new());
    let resolver = RoleDirectoryResolver::default()
        .with_role("finance", &["fay", "finn"])
        .with_role("hr", &["hana"]);
    let config = EngineConfig {
        max_commit_attempts: 5,
        retry_backoff_ms: 1,
    };

    Fixture {
        engine: Arc::new(ApprovalEngine::new(
            instances.clone(),
            templates.clone(),
            resolver,
            notifier,
            config,
        )),
        registry: TemplateRegistry::new(templates),
        instances,
        outbox,
        bus,
        _dir: dir,
    }
}

fn step(id: &str, order: u32, rule: AggregationRule, approvers: Vec<ApproverRef>) -> StepDefinition {
    StepDefinition {
        id: id.to_string(),
        name: id.to_string(),
        order,
        approvers,
        rule,
    }
}

fn decide(step_id: &str, decision: Decision, comment: Option<&str>) -> RecordDecisionRequest {
    RecordDecisionRequest {
        step_id: step_id.to_string(),
        approver_id: None,
        decision,
        comment: comment.map(str::to_string),
    }
}

impl Fixture {
    async fn start(&self, steps: Vec<StepDefinition>, allow_drafts: bool) -> InstanceId {
        let template = self
            .registry
            .create_template(
                &Actor::admin("root"),
                CreateTemplateRequest {
                    name: "ExpenseApproval".to_string(),
                    description: Some("two-step expense claim".to_string()),
                    domain: DomainType::Expense,
                    steps,
                    allow_drafts: Some(allow_drafts),
                },
            )
            .await
            .unwrap();
        let alice = Actor::employee("alice");
        let created = self
            .engine
            .create_instance(
                &alice,
                CreateInstanceRequest {
                    template_id: template.id,
                    payload: json!({"amount": 120, "currency": "EUR"}),
                    requester_id: None,
                },
            )
            .await
            .unwrap();
        if allow_drafts {
            self.engine
                .submit_instance(&alice, &created.instance.id)
                .await
                .unwrap();
        }
        created.instance.id
    }

    async fn expense(&self) -> InstanceId {
        self.start(
            vec![
                step("manager", 1, AggregationRule::All, vec![ApproverRef::user("bob")]),
                step("finance", 2, AggregationRule::All, vec![ApproverRef::user("fay")]),
            ],
            true,
        )
        .await
    }
}

#[tokio::test]
async fn expense_is_approved_after_both_steps() {
    let f = fixture().await;
    let mut events = f.bus.subscribe();
    let id = f.expense().await;

    let outcome = f
        .engine
        .record_decision(
            &Actor::employee("bob"),
            &id,
            &decide("manager", Decision::Approved, Some("ok")),
        )
        .await
        .unwrap();
    assert_eq!(outcome.transition, Transition::Advanced { from: 0, to: 1 });

    let outcome = f
        .engine
        .record_decision(
            &Actor::employee("fay"),
            &id,
            &decide("finance", Decision::Approved, None),
        )
        .await
        .unwrap();
    assert_eq!(outcome.transition, Transition::Approved);
    assert!(outcome.warnings.is_empty());

    let stored = f.instances.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, InstanceStatus::Approved);
    assert_eq!(stored.current_step_index, 2);
    assert!(stored.completed_at.is_some());

    let outbox = f.outbox.list(&OutboxFilter::default()).await.unwrap();
    let kinds: Vec<NotificationKind> = outbox.iter().map(|e| e.event.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::ApprovalNeeded,
            NotificationKind::ApprovalNeeded,
            NotificationKind::InstanceApproved,
        ]
    );
    assert_eq!(outbox[2].event.recipient_ids, vec!["alice"]);

    let first = events.recv().await.unwrap();
    assert_eq!(first.kind, NotificationKind::ApprovalNeeded);
    assert_eq!(first.recipient_ids, vec!["bob"]);
}

#[tokio::test]
async fn manager_rejection_is_final() {
    let f = fixture().await;
    let id = f.expense().await;

    let outcome = f
        .engine
        .record_decision(
            &Actor::employee("bob"),
            &id,
            &decide("manager", Decision::Rejected, Some("over budget")),
        )
        .await
        .unwrap();
    assert_eq!(outcome.transition, Transition::Rejected);

    let err = f
        .engine
        .record_decision(
            &Actor::employee("fay"),
            &id,
            &decide("finance", Decision::Approved, None),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { .. }));

    let records = f.instances.list_records(&id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].step_id, "manager");

    let fay = f
        .outbox
        .list(&OutboxFilter {
            recipient_id: Some("fay".to_string()),
            include_delivered: true,
            limit: None,
        })
        .await
        .unwrap();
    assert!(fay.is_empty());
}

#[tokio::test]
async fn partial_all_step_stays_pending() {
    let f = fixture().await;
    let id = f
        .start(
            vec![step(
                "finance",
                1,
                AggregationRule::All,
                vec![ApproverRef::role("finance")],
            )],
            false,
        )
        .await;

    let outcome = f
        .engine
        .record_decision(
            &Actor::employee("fay"),
            &id,
            &decide("finance", Decision::Approved, None),
        )
        .await
        .unwrap();
    assert_eq!(outcome.transition, Transition::None);

    let detail = f
        .engine
        .get_instance_detail(&Actor::employee("alice"), &id)
        .await
        .unwrap();
    assert_eq!(detail.instance.status, InstanceStatus::Pending);
    assert_eq!(detail.steps[0].status, StepStatus::Pending);
    assert_eq!(detail.records.len(), 1);

    let awaiting = f
        .engine
        .list_awaiting_decision(&Actor::employee("finn"), "finn")
        .await
        .unwrap();
    assert_eq!(awaiting.len(), 1);
    let awaiting = f
        .engine
        .list_awaiting_decision(&Actor::employee("fay"), "fay")
        .await
        .unwrap();
    assert!(awaiting.is_empty());
}

#[tokio::test]
async fn future_step_is_out_of_order() {
    let f = fixture().await;
    let id = f.expense().await;

    let err = f
        .engine
        .record_decision(
            &Actor::employee("fay"),
            &id,
            &decide("finance", Decision::Approved, None),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::OutOfOrderStep { .. }));
    assert!(f.instances.list_records(&id).await.unwrap().is_empty());
}

#[tokio::test]
async fn identical_resubmission_writes_nothing() {
    let f = fixture().await;
    let id = f
        .start(
            vec![step(
                "finance",
                1,
                AggregationRule::All,
                vec![ApproverRef::role("finance")],
            )],
            false,
        )
        .await;
    let fay = Actor::employee("fay");
    let request = decide("finance", Decision::Approved, Some("fine"));

    let first = f.engine.record_decision(&fay, &id, &request).await.unwrap();
    let second = f.engine.record_decision(&fay, &id, &request).await.unwrap();
    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(first.record.id, second.record.id);
    assert_eq!(second.instance.version, first.instance.version);
}

#[tokio::test]
async fn concurrent_last_approvals_never_double_advance() {
    let f = fixture().await;
    let id = f
        .start(
            vec![
                step("finance", 1, AggregationRule::Any, vec![ApproverRef::role("finance")]),
                step("hr", 2, AggregationRule::All, vec![ApproverRef::role("hr")]),
            ],
            false,
        )
        .await;

    let mut handles = Vec::new();
    for approver in ["fay", "finn"] {
        let engine = f.engine.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .record_decision(
                    &Actor::employee(approver),
                    &id,
                    &decide("finance", Decision::Approved, None),
                )
                .await
        }));
    }

    let mut advanced = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                if matches!(outcome.transition, Transition::Advanced { .. }) {
                    advanced += 1;
                }
            }
            Err(WorkflowError::OutOfOrderStep { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(advanced, 1);

    let stored = f.instances.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, InstanceStatus::Pending);
    assert_eq!(stored.current_step_index, 1);

    let hr_notices = f
        .outbox
        .list(&OutboxFilter {
            recipient_id: Some("hana".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(hr_notices.len(), 1);
}

#[tokio::test]
async fn cancel_is_persisted_and_blocks_decisions() {
    let f = fixture().await;
    let id = f.expense().await;

    let outcome = f
        .engine
        .cancel_instance(&Actor::employee("alice"), &id, Some("trip called off"))
        .await
        .unwrap();
    assert_eq!(outcome.instance.status, InstanceStatus::Cancelled);

    let stored = f.instances.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, InstanceStatus::Cancelled);
    assert_eq!(stored.cancel_reason.as_deref(), Some("trip called off"));

    let err = f
        .engine
        .record_decision(
            &Actor::employee("bob"),
            &id,
            &decide("manager", Decision::Approved, None),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { .. }));
}
