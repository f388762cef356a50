//! Label Synchronization Functionality
//!
//! Module implementing the reconciliation of a repository's labels with the
//! desired configuration

use tracing::{debug, error, info, warn};

use crate::config::{FetchFailurePolicy, SyncOptions};
use crate::error::{Error, Result};
use crate::github::LabelService;
use crate::label_set::{Label, LabelSet};

/// Types of label synchronization operations
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOperation {
    /// Create a label
    Create { label: Label },

    /// Update a label whose color drifted
    Update {
        name: String,
        label: Label,
        changes: Vec<String>,
    },

    /// Delete a label absent from the configuration
    Delete { name: String },

    /// No change
    NoChange { name: String },
}

impl SyncOperation {
    /// Name of the label the operation applies to
    pub fn name(&self) -> &str {
        match self {
            SyncOperation::Create { label } => &label.name,
            SyncOperation::Update { name, .. }
            | SyncOperation::Delete { name }
            | SyncOperation::NoChange { name } => name,
        }
    }

    /// Short verb describing the operation
    pub fn verb(&self) -> &'static str {
        match self {
            SyncOperation::Create { .. } => "create",
            SyncOperation::Update { .. } => "update",
            SyncOperation::Delete { .. } => "delete",
            SyncOperation::NoChange { .. } => "keep",
        }
    }

    /// Whether executing the operation calls the API
    pub fn is_mutation(&self) -> bool {
        !matches!(self, SyncOperation::NoChange { .. })
    }
}

/// Synchronization result
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// Repository the result belongs to (owner/repo)
    pub repository: String,

    /// List of executed operations
    pub operations: Vec<SyncOperation>,

    /// Number of labels created
    pub created: u32,

    /// Number of labels updated
    pub updated: u32,

    /// Number of labels deleted
    pub deleted: u32,

    /// Number of labels unchanged
    pub unchanged: u32,

    /// Whether this is a dry run
    pub dry_run: bool,

    /// Operations that encountered errors
    pub errors: Vec<String>,
}

impl SyncResult {
    /// Create a new empty synchronization result
    pub fn new<R: Into<String>>(repository: R, dry_run: bool) -> Self {
        Self {
            repository: repository.into(),
            operations: Vec::new(),
            created: 0,
            updated: 0,
            deleted: 0,
            unchanged: 0,
            dry_run,
            errors: Vec::new(),
        }
    }

    /// Add an operation and update statistics
    pub fn add_operation(&mut self, operation: SyncOperation) {
        match &operation {
            SyncOperation::Create { .. } => self.created += 1,
            SyncOperation::Update { .. } => self.updated += 1,
            SyncOperation::Delete { .. } => self.deleted += 1,
            SyncOperation::NoChange { .. } => self.unchanged += 1,
        }
        self.operations.push(operation);
    }

    /// Add an error
    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    /// Whether changes will occur
    pub fn has_changes(&self) -> bool {
        self.created > 0 || self.updated > 0 || self.deleted > 0
    }

    /// Whether any operation failed
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Get total number of operations
    pub fn total_operations(&self) -> u32 {
        self.created + self.updated + self.deleted + self.unchanged
    }
}

/// Plan the operations that converge `existing` to `desired`
///
/// Operations come out in phase order: every create, then every update (or
/// no-change) for name-matched labels, then, if `remove_absent` is set, every
/// delete. Labels are matched by exact name and only a color difference marks
/// a matched label as changed.
pub fn plan_operations(
    desired: &LabelSet,
    existing: &LabelSet,
    remove_absent: bool,
) -> Vec<SyncOperation> {
    let mut operations = Vec::new();

    // Create-missing
    for label in desired {
        if !existing.contains(&label.name) {
            operations.push(SyncOperation::Create {
                label: label.clone(),
            });
        }
    }

    // Update-existing
    for label in desired {
        if let Some(current) = existing.find(&label.name) {
            operations.push(check_label_changes(current, label));
        }
    }

    // Delete-absent
    if remove_absent {
        for current in existing {
            if !desired.contains(&current.name) {
                operations.push(SyncOperation::Delete {
                    name: current.name.clone(),
                });
            }
        }
    }

    operations
}

/// Compare a remote label with its desired definition
fn check_label_changes(current: &Label, target: &Label) -> SyncOperation {
    if current.color == target.color {
        return SyncOperation::NoChange {
            name: current.name.clone(),
        };
    }

    SyncOperation::Update {
        name: target.name.clone(),
        label: target.clone(),
        changes: vec![format!("color: {} -> {}", current.color, target.color)],
    }
}

/// Label Synchronization Engine
///
/// Converges repositories owned by one account to a desired label set through
/// an injected [`LabelService`]
pub struct LabelSyncer<S> {
    service: S,
    owner: String,
    desired: LabelSet,
    options: SyncOptions,
}

impl<S: LabelService> LabelSyncer<S> {
    /// Create a new label synchronization engine
    ///
    /// # Arguments
    /// - `service`: API client used for every remote call
    /// - `owner`: Account owning the repositories
    /// - `desired`: Desired labels, already validated
    /// - `options`: Synchronization options
    pub fn new<O: Into<String>>(
        service: S,
        owner: O,
        desired: LabelSet,
        options: SyncOptions,
    ) -> Self {
        Self {
            service,
            owner: owner.into(),
            desired,
            options,
        }
    }

    /// The injected API client
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Fetch the repository's labels and reconcile them
    ///
    /// # Errors
    /// Returns [`Error::FetchLabels`] if the existing labels cannot be listed
    /// and the fetch failure policy is [`FetchFailurePolicy::Abort`]
    pub async fn sync_repository(&self, repo: &str) -> Result<SyncResult> {
        let existing = self.fetch_existing(repo).await?;
        Ok(self
            .set_labels(&existing, repo, self.options.remove_absent)
            .await)
    }

    /// Snapshot the labels currently defined on `repo`
    ///
    /// # Errors
    /// Returns [`Error::FetchLabels`] when listing fails under the
    /// [`FetchFailurePolicy::Abort`] policy
    pub async fn fetch_existing(&self, repo: &str) -> Result<LabelSet> {
        let owner = self.owner.as_str();
        match self.service.list_labels(owner, repo).await {
            Ok(labels) => {
                debug!(owner, repo, count = labels.len(), "Fetched existing labels");
                Ok(labels)
            }
            Err(e) => match self.options.on_fetch_error {
                FetchFailurePolicy::Abort => {
                    error!(owner, repo, error = %e, "Unable to access repository");
                    Err(Error::FetchLabels {
                        repository: format!("{owner}/{repo}"),
                        source: Box::new(e),
                    })
                }
                FetchFailurePolicy::ProceedEmpty => {
                    warn!(
                        owner,
                        repo,
                        error = %e,
                        "Unable to access repository, treating existing labels as empty"
                    );
                    Ok(LabelSet::new())
                }
            },
        }
    }

    /// Converge `repo` to the configured labels
    ///
    /// # Arguments
    /// - `existing`: Snapshot of the repository's labels
    /// - `repo`: Repository name
    /// - `remove_absent`: Delete labels missing from the configuration
    pub async fn set_labels(
        &self,
        existing: &LabelSet,
        repo: &str,
        remove_absent: bool,
    ) -> SyncResult {
        self.reconcile(&self.desired, existing, repo, remove_absent)
            .await
    }

    /// Converge `repo` from `existing` to `desired`
    ///
    /// Failed calls are logged and recorded in the result; they never stop the
    /// remaining operations.
    pub async fn reconcile(
        &self,
        desired: &LabelSet,
        existing: &LabelSet,
        repo: &str,
        remove_absent: bool,
    ) -> SyncResult {
        let owner = self.owner.as_str();
        let dry_run = self.options.dry_run;
        let mut result = SyncResult::new(format!("{owner}/{repo}"), dry_run);

        info!(
            owner,
            repo,
            desired = desired.len(),
            existing = existing.len(),
            remove_absent,
            dry_run,
            "Reconciling labels"
        );

        for operation in plan_operations(desired, existing, remove_absent) {
            match self.execute_operation(repo, &operation).await {
                Ok(()) => {
                    if operation.is_mutation() {
                        info!(
                            owner,
                            repo,
                            label = operation.name(),
                            action = operation.verb(),
                            dry_run,
                            "Label synchronized"
                        );
                    }
                    result.add_operation(operation);
                }
                Err(e) => {
                    warn!(
                        owner,
                        repo,
                        label = operation.name(),
                        action = operation.verb(),
                        error = %e,
                        "Label operation failed"
                    );
                    result.add_error(format!(
                        "Unable to {} label '{}' for {}/{}: {}",
                        operation.verb(),
                        operation.name(),
                        owner,
                        repo,
                        e
                    ));
                }
            }
        }

        info!(
            owner,
            repo,
            created = result.created,
            updated = result.updated,
            deleted = result.deleted,
            unchanged = result.unchanged,
            failed = result.errors.len(),
            "Label reconciliation complete"
        );

        result
    }

    /// Execute an operation
    ///
    /// # Errors
    /// Returns an error if the API call fails
    async fn execute_operation(&self, repo: &str, operation: &SyncOperation) -> Result<()> {
        if self.options.dry_run {
            // Don't perform actual operations in dry run mode
            return Ok(());
        }

        let owner = self.owner.as_str();
        match operation {
            SyncOperation::Create { label } => {
                self.service.create_label(owner, repo, label).await?;
            }
            SyncOperation::Update { name, label, .. } => {
                self.service.update_label(owner, repo, name, label).await?;
            }
            SyncOperation::Delete { name } => {
                self.service.delete_label(owner, repo, name).await?;
            }
            SyncOperation::NoChange { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        List,
        Create(Label),
        Update(String, Label),
        Delete(String),
    }

    /// In-memory repository that records every call it receives
    struct MockLabelService {
        remote: Mutex<Vec<Label>>,
        calls: Mutex<Vec<Call>>,
        failing: HashSet<String>,
        list_fails: bool,
    }

    impl MockLabelService {
        fn new(remote: Vec<Label>) -> Self {
            Self {
                remote: Mutex::new(remote),
                calls: Mutex::new(Vec::new()),
                failing: HashSet::new(),
                list_fails: false,
            }
        }

        fn failing_on(mut self, name: &str) -> Self {
            self.failing.insert(name.to_string());
            self
        }

        fn unreachable() -> Self {
            let mut service = Self::new(Vec::new());
            service.list_fails = true;
            service
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn mutating_calls(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|call| *call != Call::List)
                .collect()
        }

        fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn check(&self, name: &str) -> Result<()> {
            if self.failing.contains(name) {
                return Err(Error::generic(format!("injected failure for {name}")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LabelService for MockLabelService {
        async fn list_labels(&self, _owner: &str, _repo: &str) -> Result<LabelSet> {
            self.record(Call::List);
            if self.list_fails {
                return Err(Error::generic("connection refused"));
            }
            Ok(self.remote.lock().unwrap().iter().cloned().collect())
        }

        async fn create_label(&self, _owner: &str, _repo: &str, label: &Label) -> Result<Label> {
            self.record(Call::Create(label.clone()));
            self.check(&label.name)?;
            self.remote.lock().unwrap().push(label.clone());
            Ok(label.clone())
        }

        async fn update_label(
            &self,
            _owner: &str,
            _repo: &str,
            name: &str,
            label: &Label,
        ) -> Result<Label> {
            self.record(Call::Update(name.to_string(), label.clone()));
            self.check(name)?;
            let mut remote = self.remote.lock().unwrap();
            if let Some(current) = remote.iter_mut().find(|l| l.name == name) {
                *current = label.clone();
            }
            Ok(label.clone())
        }

        async fn delete_label(&self, _owner: &str, _repo: &str, name: &str) -> Result<()> {
            self.record(Call::Delete(name.to_string()));
            self.check(name)?;
            self.remote.lock().unwrap().retain(|l| l.name != name);
            Ok(())
        }
    }

    fn desired() -> LabelSet {
        LabelSet::from(vec![
            Label::new("bug", "d73a4a"),
            Label::new("wontfix", "ffffff"),
        ])
    }

    fn existing() -> LabelSet {
        LabelSet::from(vec![
            Label::new("bug", "d73a4a"),
            Label::new("stale", "cccccc"),
        ])
    }

    fn syncer(service: MockLabelService, options: SyncOptions) -> LabelSyncer<MockLabelService> {
        LabelSyncer::new(service, "acme", desired(), options)
    }

    #[test]
    fn test_sync_result_operations() {
        let mut result = SyncResult::new("acme/widgets", false);

        result.add_operation(SyncOperation::Create {
            label: Label::new("test", "ff0000"),
        });
        result.add_operation(SyncOperation::NoChange {
            name: "bug".to_string(),
        });

        assert_eq!(result.created, 1);
        assert_eq!(result.unchanged, 1);
        assert_eq!(result.total_operations(), 2);
        assert!(result.has_changes());
        assert!(!result.has_errors());
    }

    #[test]
    fn test_sync_result_only_unchanged_has_no_changes() {
        let mut result = SyncResult::new("acme/widgets", false);
        result.add_operation(SyncOperation::NoChange {
            name: "bug".to_string(),
        });
        assert!(!result.has_changes());
    }

    #[test]
    fn test_plan_example_scenario() {
        let operations = plan_operations(&desired(), &existing(), true);
        assert_eq!(
            operations,
            vec![
                SyncOperation::Create {
                    label: Label::new("wontfix", "ffffff"),
                },
                SyncOperation::NoChange {
                    name: "bug".to_string(),
                },
                SyncOperation::Delete {
                    name: "stale".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_plan_without_remove_absent_has_no_deletes() {
        let operations = plan_operations(&desired(), &existing(), false);
        assert!(operations
            .iter()
            .all(|op| !matches!(op, SyncOperation::Delete { .. })));
        assert_eq!(operations.len(), 2);
    }

    #[test]
    fn test_plan_phase_order() {
        let desired = LabelSet::from(vec![
            Label::new("changed", "000000"),
            Label::new("new", "111111"),
        ]);
        let existing = LabelSet::from(vec![
            Label::new("gone", "222222"),
            Label::new("changed", "333333"),
        ]);

        let verbs: Vec<&str> = plan_operations(&desired, &existing, true)
            .iter()
            .map(SyncOperation::verb)
            .collect();
        assert_eq!(verbs, vec!["create", "update", "delete"]);
    }

    #[test]
    fn test_plan_matching_is_by_name_only() {
        let desired = LabelSet::from(vec![Label::new("defect", "d73a4a")]);
        let existing = LabelSet::from(vec![Label::new("bug", "d73a4a")]);

        let operations = plan_operations(&desired, &existing, false);
        assert_eq!(
            operations,
            vec![SyncOperation::Create {
                label: Label::new("defect", "d73a4a"),
            }]
        );
    }

    #[test]
    fn test_plan_description_only_change_is_not_an_update() {
        let desired = LabelSet::from(vec![Label::new("bug", "d73a4a").with_description("new")]);
        let existing = LabelSet::from(vec![Label::new("bug", "d73a4a").with_description("old")]);

        let operations = plan_operations(&desired, &existing, true);
        assert_eq!(
            operations,
            vec![SyncOperation::NoChange {
                name: "bug".to_string(),
            }]
        );
    }

    #[test]
    fn test_plan_update_carries_full_definition() {
        let target = Label::new("bug", "ee0701").with_description("Broken");
        let desired = LabelSet::from(vec![target.clone()]);
        let existing = LabelSet::from(vec![Label::new("bug", "d73a4a")]);

        match plan_operations(&desired, &existing, false).as_slice() {
            [SyncOperation::Update {
                name,
                label,
                changes,
            }] => {
                assert_eq!(name, "bug");
                assert_eq!(label, &target);
                assert_eq!(changes, &vec!["color: d73a4a -> ee0701".to_string()]);
            }
            other => panic!("expected a single update, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_duplicate_existing_first_match_wins() {
        let desired = LabelSet::from(vec![Label::new("bug", "d73a4a")]);
        let existing = LabelSet::from(vec![
            Label::new("bug", "d73a4a"),
            Label::new("bug", "000000"),
        ]);

        let operations = plan_operations(&desired, &existing, false);
        assert_eq!(
            operations,
            vec![SyncOperation::NoChange {
                name: "bug".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_set_labels_example_scenario_with_remove_absent() {
        let service = MockLabelService::new(existing().into_iter().collect());
        let syncer = syncer(service, SyncOptions::default());

        let result = syncer.set_labels(&existing(), "widgets", true).await;

        assert_eq!(
            syncer.service().calls(),
            vec![
                Call::Create(Label::new("wontfix", "ffffff")),
                Call::Delete("stale".to_string()),
            ]
        );
        assert_eq!(result.repository, "acme/widgets");
        assert_eq!((result.created, result.updated, result.deleted), (1, 0, 1));
        assert_eq!(result.unchanged, 1);
        assert!(!result.has_errors());
    }

    #[tokio::test]
    async fn test_set_labels_example_scenario_without_remove_absent() {
        let service = MockLabelService::new(existing().into_iter().collect());
        let syncer = syncer(service, SyncOptions::default());

        let result = syncer.set_labels(&existing(), "widgets", false).await;

        assert_eq!(
            syncer.service().calls(),
            vec![Call::Create(Label::new("wontfix", "ffffff"))]
        );
        assert_eq!(result.deleted, 0);
    }

    #[tokio::test]
    async fn test_create_sends_full_definition() {
        let label = Label::new("docs", "0075ca").with_description("Documentation");
        let syncer = LabelSyncer::new(
            MockLabelService::new(Vec::new()),
            "acme",
            LabelSet::from(vec![label.clone()]),
            SyncOptions::default(),
        );

        syncer.set_labels(&LabelSet::new(), "widgets", false).await;

        assert_eq!(syncer.service().calls(), vec![Call::Create(label)]);
    }

    #[tokio::test]
    async fn test_update_issued_only_for_color_drift() {
        let desired = LabelSet::from(vec![
            Label::new("bug", "ee0701"),
            Label::new("docs", "0075ca").with_description("new text"),
        ]);
        let existing = LabelSet::from(vec![
            Label::new("bug", "d73a4a"),
            Label::new("docs", "0075ca").with_description("old text"),
        ]);
        let syncer = LabelSyncer::new(
            MockLabelService::new(Vec::new()),
            "acme",
            desired,
            SyncOptions::default(),
        );

        let result = syncer.set_labels(&existing, "widgets", false).await;

        assert_eq!(
            syncer.service().calls(),
            vec![Call::Update("bug".to_string(), Label::new("bug", "ee0701"))]
        );
        assert_eq!(result.updated, 1);
        assert_eq!(result.unchanged, 1);
    }

    #[tokio::test]
    async fn test_delete_completeness() {
        let existing = LabelSet::from(vec![
            Label::new("stale", "cccccc"),
            Label::new("bug", "d73a4a"),
            Label::new("duplicate", "cfd3d7"),
        ]);
        let syncer = syncer(MockLabelService::new(Vec::new()), SyncOptions::default());

        syncer.set_labels(&existing, "widgets", true).await;

        let deletes: Vec<Call> = syncer
            .service()
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Delete(_)))
            .collect();
        assert_eq!(
            deletes,
            vec![
                Call::Delete("stale".to_string()),
                Call::Delete("duplicate".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_isolation() {
        let desired = LabelSet::from(vec![
            Label::new("alpha", "111111"),
            Label::new("beta", "222222"),
            Label::new("gamma", "333333"),
        ]);
        let existing = LabelSet::from(vec![
            Label::new("gamma", "000000"),
            Label::new("stale", "cccccc"),
        ]);
        let service = MockLabelService::new(Vec::new()).failing_on("alpha");
        let syncer = LabelSyncer::new(service, "acme", desired, SyncOptions::default());

        let result = syncer.set_labels(&existing, "widgets", true).await;

        assert_eq!(
            syncer.service().calls(),
            vec![
                Call::Create(Label::new("alpha", "111111")),
                Call::Create(Label::new("beta", "222222")),
                Call::Update("gamma".to_string(), Label::new("gamma", "333333")),
                Call::Delete("stale".to_string()),
            ]
        );
        assert_eq!(result.created, 1);
        assert_eq!(result.updated, 1);
        assert_eq!(result.deleted, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("alpha"));
        assert!(result.errors[0].contains("acme/widgets"));
    }

    #[tokio::test]
    async fn test_idempotent_second_run() {
        let options = SyncOptions {
            remove_absent: true,
            ..SyncOptions::default()
        };
        let service = MockLabelService::new(vec![
            Label::new("bug", "000000"),
            Label::new("stale", "cccccc"),
        ]);
        let syncer = syncer(service, options);

        let first = syncer.sync_repository("widgets").await.unwrap();
        assert!(first.has_changes());

        syncer.service().clear_calls();
        let second = syncer.sync_repository("widgets").await.unwrap();

        assert!(syncer.service().mutating_calls().is_empty());
        assert!(!second.has_changes());
        assert_eq!(second.unchanged, 2);
    }

    #[tokio::test]
    async fn test_dry_run_issues_no_mutations() {
        let options = SyncOptions {
            dry_run: true,
            remove_absent: true,
            ..SyncOptions::default()
        };
        let service = MockLabelService::new(existing().into_iter().collect());
        let syncer = syncer(service, options);

        let result = syncer.sync_repository("widgets").await.unwrap();

        assert_eq!(syncer.service().calls(), vec![Call::List]);
        assert!(result.dry_run);
        assert_eq!((result.created, result.updated, result.deleted), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_by_default() {
        let syncer = syncer(MockLabelService::unreachable(), SyncOptions::default());

        let err = syncer.sync_repository("widgets").await.unwrap_err();

        match err {
            Error::FetchLabels { repository, .. } => assert_eq!(repository, "acme/widgets"),
            other => panic!("expected fetch error, got {other:?}"),
        }
        assert_eq!(syncer.service().calls(), vec![Call::List]);
    }

    #[tokio::test]
    async fn test_fetch_failure_proceeds_with_empty_set() {
        let options = SyncOptions {
            remove_absent: true,
            on_fetch_error: FetchFailurePolicy::ProceedEmpty,
            ..SyncOptions::default()
        };
        let syncer = syncer(MockLabelService::unreachable(), options);

        let result = syncer.sync_repository("widgets").await.unwrap();

        assert_eq!(
            syncer.service().mutating_calls(),
            vec![
                Call::Create(Label::new("bug", "d73a4a")),
                Call::Create(Label::new("wontfix", "ffffff")),
            ]
        );
        assert_eq!(result.created, 2);
        assert_eq!(result.deleted, 0);
    }

    #[tokio::test]
    async fn test_reconcile_with_explicit_desired_set() {
        let syncer = syncer(MockLabelService::new(Vec::new()), SyncOptions::default());
        let other = LabelSet::from(vec![Label::new("question", "d876e3")]);

        let result = syncer
            .reconcile(&other, &existing(), "widgets", true)
            .await;

        assert_eq!(
            syncer.service().calls(),
            vec![
                Call::Create(Label::new("question", "d876e3")),
                Call::Delete("bug".to_string()),
                Call::Delete("stale".to_string()),
            ]
        );
        assert_eq!(result.total_operations(), 3);
    }
}
