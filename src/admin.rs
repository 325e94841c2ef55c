//! Administrative command surface.
//!
//! Commands and responses are tagged JSON so any transport can carry them as
//! opaque bytes (the gRPC service does exactly that).

use serde::{Deserialize, Serialize};

use crate::error::NotifyResult;
use crate::reconciler::BucketSyncSummary;
use crate::rule::{Origin, PersistedRule, Rule, RuleId};
use crate::service::NotificationService;

/// An administrative request.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AdminCommand {
    AddRule {
        bucket: String,
        actions: Vec<String>,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        suffix: Option<String>,
        #[serde(default)]
        actor: Option<String>,
    },
    GetRule {
        bucket: String,
        id: RuleId,
    },
    DeleteRule {
        bucket: String,
        id: RuleId,
    },
    ListRules {
        bucket: String,
    },
    CountRules {
        bucket: String,
    },
    ExportBucket {
        bucket: String,
        #[serde(default)]
        clear: bool,
    },
    ImportBucket {
        bucket: String,
        #[serde(default)]
        clear: bool,
    },
    ExportAll {
        #[serde(default)]
        clear: bool,
    },
    ImportAll {
        #[serde(default)]
        clear: bool,
    },
    ListActionTypes,
}

/// A rule as presented to administrators.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleView {
    pub id: RuleId,
    pub bucket: String,
    pub actions: Vec<String>,
    pub prefix: String,
    pub suffix: String,
    /// `<bucket>/ev-<fingerprint>`; subscribers prefix it with the base topic.
    pub topic: String,
    pub origin: Origin,
}

impl From<&PersistedRule> for RuleView {
    fn from(rule: &PersistedRule) -> Self {
        Self {
            id: rule.id,
            bucket: rule.rule.bucket.clone(),
            actions: rule.rule.actions.iter().cloned().collect(),
            prefix: rule.rule.prefix.clone(),
            suffix: rule.rule.suffix.clone(),
            topic: rule.topic(),
            origin: rule.origin,
        }
    }
}

fn views(rules: &[PersistedRule]) -> Vec<RuleView> {
    rules.iter().map(RuleView::from).collect()
}

/// Result of an administrative request.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminResponse {
    Rule { rule: RuleView },
    Deleted { rule: RuleView },
    Rules { rules: Vec<RuleView> },
    Count { count: usize },
    Synced { buckets: Vec<BucketSyncSummary> },
    ActionTypes { actions: Vec<String> },
}

/// Run one command against `service`.
pub fn execute(service: &NotificationService, command: AdminCommand) -> NotifyResult<AdminResponse> {
    let response = match command {
        AdminCommand::AddRule {
            bucket,
            actions,
            prefix,
            suffix,
            actor,
        } => {
            let rule = Rule::new(
                bucket,
                actions,
                prefix.unwrap_or_default(),
                suffix.unwrap_or_default(),
            );
            let stored = service.add_rule(rule, actor.as_deref())?;
            AdminResponse::Rule {
                rule: RuleView::from(&stored),
            }
        }
        AdminCommand::GetRule { bucket, id } => AdminResponse::Rule {
            rule: RuleView::from(&service.get_rule(&bucket, id)?),
        },
        AdminCommand::DeleteRule { bucket, id } => AdminResponse::Deleted {
            rule: RuleView::from(&service.delete_rule(&bucket, id)?),
        },
        AdminCommand::ListRules { bucket } => AdminResponse::Rules {
            rules: views(&service.list_rules(&bucket)?),
        },
        AdminCommand::CountRules { bucket } => AdminResponse::Count {
            count: service.count_rules(&bucket)?,
        },
        AdminCommand::ExportBucket { bucket, clear } => AdminResponse::Rules {
            rules: views(&service.export_bucket(&bucket, clear)?),
        },
        AdminCommand::ImportBucket { bucket, clear } => AdminResponse::Rules {
            rules: views(&service.import_bucket(&bucket, clear)?),
        },
        AdminCommand::ExportAll { clear } => AdminResponse::Synced {
            buckets: service.export_all(clear)?,
        },
        AdminCommand::ImportAll { clear } => AdminResponse::Synced {
            buckets: service.import_all(clear)?,
        },
        AdminCommand::ListActionTypes => AdminResponse::ActionTypes {
            actions: service
                .list_known_action_types()
                .into_iter()
                .map(str::to_string)
                .collect(),
        },
    };
    Ok(response)
}
