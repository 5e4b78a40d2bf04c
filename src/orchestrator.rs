use crate::{verify, ProtectError, ProtectResult, ProtectionApi, ProtectionPolicy, Verification};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};

const PAUSE_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub repository: String,
    #[serde(rename = "status")]
    pub compliant: bool,
    pub default_branch: Option<String>,
    pub issues: Vec<String>,
}

impl VerificationResult {
    fn from_verification(repository: &str, branch: &str, verification: Verification) -> Self {
        Self {
            repository: repository.to_string(),
            compliant: verification.compliant,
            default_branch: Some(branch.to_string()),
            issues: verification.issues,
        }
    }

    fn failed(repository: &str, error: &ProtectError) -> Self {
        Self {
            repository: repository.to_string(),
            compliant: false,
            default_branch: None,
            issues: vec![error.to_string()],
        }
    }
}

/// 0 when every repository ended compliant, 1 otherwise.
pub fn exit_code(results: &[VerificationResult]) -> i32 {
    if results.iter().all(|result| result.compliant) {
        0
    } else {
        1
    }
}

/// Runs verify, enforce and re-verify over a repository list, one
/// repository at a time.
pub struct Orchestrator<'a, A: ProtectionApi> {
    api: &'a A,
    policy: ProtectionPolicy,
    verify_only: bool,
    pause: Duration,
    interrupted: Arc<AtomicBool>,
}

impl<'a, A: ProtectionApi> Orchestrator<'a, A> {
    pub fn new(api: &'a A, policy: ProtectionPolicy) -> Self {
        Self {
            api,
            policy,
            verify_only: false,
            pause: Duration::from_secs(1),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn verify_only(mut self, verify_only: bool) -> Self {
        self.verify_only = verify_only;
        self
    }

    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Flag polled between repositories and once the list is done; set it to
    /// stop the run early.
    pub fn interrupt_flag(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    /// Processes every repository in order. A failure inside one repository
    /// becomes a failing result; only fatal errors end the run.
    pub fn run(&self, repositories: &[String]) -> ProtectResult<Vec<VerificationResult>> {
        info!(
            count = repositories.len(),
            verify_only = self.verify_only,
            "processing repositories"
        );
        let results = repositories
            .iter()
            .enumerate()
            .try_fold(
                Vec::with_capacity(repositories.len()),
                |mut results: Vec<VerificationResult>,
                 (index, repo)|
                 -> ProtectResult<Vec<VerificationResult>> {
                    if index > 0 {
                        self.wait_between_repositories()?;
                    } else {
                        self.check_interrupted()?;
                    }
                    results.push(self.process_or_record(repo)?);
                    Ok(results)
                },
            )?;
        // A cancellation during the last repository has no later poll.
        self.check_interrupted()?;
        Ok(results)
    }

    fn process_or_record(&self, repo: &str) -> ProtectResult<VerificationResult> {
        let _span = info_span!("repository", name = repo).entered();
        match self.process_repository(repo) {
            Ok(result) => {
                if result.compliant {
                    info!("compliant");
                } else {
                    warn!(issues = ?result.issues, "non-compliant");
                }
                Ok(result)
            }
            Err(error) if error.is_fatal() => {
                error!(%error, "aborting run");
                Err(error)
            }
            Err(error) => {
                error!(%error, "failed to process repository");
                Ok(VerificationResult::failed(repo, &error))
            }
        }
    }

    fn process_repository(&self, repo: &str) -> ProtectResult<VerificationResult> {
        let branch = self.api.get_default_branch(repo)?;
        info!(branch = %branch, "resolved default branch");

        let current = self.api.get_branch_protection(repo, &branch)?;
        let verification = verify(current.as_ref(), &self.policy);
        if verification.compliant || self.verify_only {
            return Ok(VerificationResult::from_verification(
                repo,
                &branch,
                verification,
            ));
        }

        info!(issues = ?verification.issues, "applying branch protection");
        self.api
            .set_branch_protection(repo, &branch, &self.policy)?;
        let applied = self.api.get_branch_protection(repo, &branch)?;
        Ok(VerificationResult::from_verification(
            repo,
            &branch,
            verify(applied.as_ref(), &self.policy),
        ))
    }

    fn check_interrupted(&self) -> ProtectResult<()> {
        if self.interrupted.load(Ordering::SeqCst) {
            warn!("operation cancelled by user");
            return Err(ProtectError::Interrupted);
        }
        Ok(())
    }

    fn wait_between_repositories(&self) -> ProtectResult<()> {
        let deadline = Instant::now() + self.pause;
        loop {
            self.check_interrupted()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(PAUSE_SLICE.min(deadline - now));
        }
    }
}
