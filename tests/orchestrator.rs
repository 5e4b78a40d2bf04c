use protect::{
    exit_code, load_settings, write_report, BranchProtectionRules, ComplianceSummary,
    Orchestrator, ProtectError, ProtectResult, ProtectionApi, ProtectionPolicy, ReportDocument,
    NO_PROTECTION_ISSUE,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy)]
enum Failure {
    NotFound,
    Auth,
    PermissionOnWrite,
}

#[derive(Default)]
struct FakeApi {
    branches: HashMap<String, String>,
    protection: RefCell<HashMap<String, BranchProtectionRules>>,
    failures: HashMap<String, Failure>,
    ignored_writes: HashSet<String>,
    writes: RefCell<Vec<String>>,
    lookups: RefCell<Vec<String>>,
    cancel_on: Option<(String, Arc<AtomicBool>)>,
}

impl FakeApi {
    fn with_repo(mut self, repo: &str, protection: Option<BranchProtectionRules>) -> Self {
        self.branches.insert(repo.to_string(), "main".to_string());
        if let Some(protection) = protection {
            self.protection
                .borrow_mut()
                .insert(repo.to_string(), protection);
        }
        self
    }

    fn failing(mut self, repo: &str, failure: Failure) -> Self {
        self.failures.insert(repo.to_string(), failure);
        self
    }

    fn ignoring_writes(mut self, repo: &str) -> Self {
        self.ignored_writes.insert(repo.to_string());
        self
    }

    /// Raises `flag` while looking up `repo`, as Ctrl-C would mid-request.
    fn cancelling_on(mut self, repo: &str, flag: Arc<AtomicBool>) -> Self {
        self.cancel_on = Some((repo.to_string(), flag));
        self
    }

    fn writes(&self) -> Vec<String> {
        self.writes.borrow().clone()
    }
}

impl ProtectionApi for FakeApi {
    fn get_default_branch(&self, repo: &str) -> ProtectResult<String> {
        self.lookups.borrow_mut().push(repo.to_string());
        if let Some((target, flag)) = &self.cancel_on {
            if target == repo {
                flag.store(true, Ordering::SeqCst);
            }
        }
        match self.failures.get(repo) {
            Some(Failure::NotFound) => {
                return Err(ProtectError::NotFound(format!("repository acme/{repo}")))
            }
            Some(Failure::Auth) => {
                return Err(ProtectError::Auth("bad credentials (status 401)".to_string()))
            }
            _ => {}
        }
        self.branches
            .get(repo)
            .cloned()
            .ok_or_else(|| ProtectError::NotFound(format!("repository acme/{repo}")))
    }

    fn get_branch_protection(
        &self,
        repo: &str,
        _branch: &str,
    ) -> ProtectResult<Option<BranchProtectionRules>> {
        Ok(self.protection.borrow().get(repo).cloned())
    }

    fn set_branch_protection(
        &self,
        repo: &str,
        _branch: &str,
        policy: &ProtectionPolicy,
    ) -> ProtectResult<()> {
        if let Some(Failure::PermissionOnWrite) = self.failures.get(repo) {
            return Err(ProtectError::Permission(format!(
                "updating branch protection for acme/{repo}@main"
            )));
        }
        self.writes.borrow_mut().push(repo.to_string());
        if !self.ignored_writes.contains(repo) {
            self.protection
                .borrow_mut()
                .insert(repo.to_string(), policy.expected_rules());
        }
        Ok(())
    }
}

fn compliant() -> BranchProtectionRules {
    ProtectionPolicy::default().expected_rules()
}

fn force_push_enabled() -> BranchProtectionRules {
    BranchProtectionRules {
        allow_force_pushes: true,
        ..compliant()
    }
}

fn repos(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn orchestrator(api: &FakeApi) -> Orchestrator<'_, FakeApi> {
    Orchestrator::new(api, ProtectionPolicy::default()).pause(Duration::ZERO)
}

#[test]
fn verify_only_reports_compliant_and_failing_repositories() {
    let api = FakeApi::default()
        .with_repo("a", Some(compliant()))
        .with_repo("b", Some(force_push_enabled()));

    let results = orchestrator(&api)
        .verify_only(true)
        .run(&repos(&["a", "b"]))
        .expect("run");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].repository, "a");
    assert!(results[0].compliant);
    assert!(results[0].issues.is_empty());
    assert_eq!(results[1].repository, "b");
    assert!(!results[1].compliant);
    assert_eq!(results[1].issues[0], "Force pushes are allowed");
    assert_eq!(exit_code(&results), 1);
    assert!(api.writes().is_empty());
}

#[test]
fn compliant_repositories_are_never_written() {
    let api = FakeApi::default()
        .with_repo("a", Some(compliant()))
        .with_repo("b", Some(compliant()));

    let results = orchestrator(&api).run(&repos(&["a", "b"])).expect("run");

    assert!(api.writes().is_empty());
    assert_eq!(exit_code(&results), 0);
}

#[test]
fn enforcement_fixes_and_reverifies_non_compliant_repositories() {
    let api = FakeApi::default()
        .with_repo("a", Some(compliant()))
        .with_repo("b", Some(force_push_enabled()))
        .with_repo("c", None);

    let results = orchestrator(&api)
        .run(&repos(&["a", "b", "c"]))
        .expect("run");

    assert_eq!(api.writes(), vec!["b".to_string(), "c".to_string()]);
    assert!(results.iter().all(|result| result.compliant));
    assert_eq!(results[2].default_branch.as_deref(), Some("main"));
    assert_eq!(exit_code(&results), 0);
}

#[test]
fn write_that_does_not_stick_is_reported_from_reverification() {
    let api = FakeApi::default()
        .with_repo("a", None)
        .ignoring_writes("a");

    let results = orchestrator(&api).run(&repos(&["a"])).expect("run");

    assert_eq!(api.writes(), vec!["a".to_string()]);
    assert!(!results[0].compliant);
    assert_eq!(results[0].issues, vec![NO_PROTECTION_ISSUE.to_string()]);
}

#[test]
fn one_failing_repository_does_not_stop_the_batch() {
    let api = FakeApi::default()
        .failing("missing", Failure::NotFound)
        .with_repo("locked", Some(force_push_enabled()))
        .failing("locked", Failure::PermissionOnWrite)
        .with_repo("ok", Some(compliant()));

    let results = orchestrator(&api)
        .run(&repos(&["missing", "locked", "ok"]))
        .expect("run");

    assert_eq!(results.len(), 3);
    assert!(!results[0].compliant);
    assert_eq!(results[0].default_branch, None);
    assert_eq!(results[0].issues.len(), 1);
    assert!(results[0].issues[0].contains("acme/missing"));
    assert!(!results[1].compliant);
    assert_eq!(results[1].issues.len(), 1);
    assert!(results[1].issues[0].starts_with("Permission denied"));
    assert!(results[2].compliant);
    assert_eq!(exit_code(&results), 1);
}

#[test]
fn authentication_failure_aborts_the_run() {
    let api = FakeApi::default()
        .failing("first", Failure::Auth)
        .with_repo("second", Some(compliant()));

    let error = orchestrator(&api)
        .run(&repos(&["first", "second"]))
        .expect_err("auth failure");

    assert!(matches!(error, ProtectError::Auth(_)));
    assert_eq!(*api.lookups.borrow(), vec!["first".to_string()]);
}

#[test]
fn interrupt_stops_before_the_next_repository() {
    let api = FakeApi::default().with_repo("a", Some(compliant()));
    let flag = Arc::new(AtomicBool::new(true));

    let error = orchestrator(&api)
        .interrupt_flag(flag)
        .run(&repos(&["a"]))
        .expect_err("interrupted");

    assert!(matches!(error, ProtectError::Interrupted));
    assert!(api.lookups.borrow().is_empty());
}

#[test]
fn interrupt_during_the_last_repository_cancels_the_run() {
    let flag = Arc::new(AtomicBool::new(false));
    let api = FakeApi::default()
        .with_repo("only", Some(compliant()))
        .cancelling_on("only", Arc::clone(&flag));

    let error = orchestrator(&api)
        .interrupt_flag(flag)
        .run(&repos(&["only"]))
        .expect_err("interrupted");

    assert!(matches!(error, ProtectError::Interrupted));
    assert_eq!(*api.lookups.borrow(), vec!["only".to_string()]);
}

#[test]
fn interrupt_while_processing_stops_before_the_next_repository() {
    let flag = Arc::new(AtomicBool::new(false));
    let api = FakeApi::default()
        .with_repo("a", Some(force_push_enabled()))
        .with_repo("b", Some(compliant()))
        .cancelling_on("a", Arc::clone(&flag));

    let error = Orchestrator::new(&api, ProtectionPolicy::default())
        .pause(Duration::from_millis(50))
        .interrupt_flag(flag)
        .run(&repos(&["a", "b"]))
        .expect_err("interrupted");

    assert!(matches!(error, ProtectError::Interrupted));
    assert_eq!(*api.lookups.borrow(), vec!["a".to_string()]);
}

#[test]
fn duplicate_repositories_are_processed_in_order() {
    let api = FakeApi::default()
        .with_repo("a", Some(compliant()))
        .with_repo("b", Some(compliant()));

    let results = orchestrator(&api)
        .run(&repos(&["b", "a", "b"]))
        .expect("run");

    let names: Vec<&str> = results
        .iter()
        .map(|result| result.repository.as_str())
        .collect();
    assert_eq!(names, vec!["b", "a", "b"]);
}

#[test]
fn empty_repository_list_fails_before_any_network_call() {
    let vars: HashMap<&str, &str> = [("GITHUB_TOKEN", "token"), ("GITHUB_OWNER", "acme")]
        .into_iter()
        .collect();
    let error = load_settings(|key| vars.get(key).map(|value| value.to_string()), None, None)
        .expect_err("empty list");
    assert!(matches!(error, ProtectError::InvalidConfig(_)));
}

#[test]
fn results_flow_into_a_written_report() {
    let api = FakeApi::default()
        .with_repo("a", Some(compliant()))
        .with_repo("b", Some(force_push_enabled()));
    let results = orchestrator(&api)
        .verify_only(true)
        .run(&repos(&["a", "b"]))
        .expect("run");

    let summary = ComplianceSummary::from_results(&results);
    assert_eq!(summary.compliant + summary.non_compliant, summary.total);
    assert_eq!(summary.rate_label(), "50.0%");

    let temp = tempfile::TempDir::new().expect("tempdir");
    let document = ReportDocument::assemble(&results, chrono::Local::now().naive_local());
    let path = write_report(&document, &temp.path().join("reports")).expect("report");
    assert!(path.starts_with(temp.path().join("reports")));
    assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("pdf"));
}
