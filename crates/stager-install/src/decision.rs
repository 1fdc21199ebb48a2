//! Structured decision log.
//!
//! Every choice the installer or rollback executor makes about an artifact
//! is recorded as a [`Decision`]. Expected values always come from the
//! lockfile or a snapshot manifest; observed values come from the local
//! filesystem.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use stager_verify::{Checksum, HashAlgorithm, Verdict};
use tracing::info;

pub const DECISION_TARGET: &str = "stager::decision";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    ResumeFromStaging,
    Redownload,
    QuarantineThenRedownload,
    Promote,
    Skip,
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    AlreadyInstalled,
    StagingVerified,
    StagingChecksumMismatch,
    StagingSizeMismatch,
    NotPresent,
    FinalChecksumMismatch,
    FinalReverified,
    Promoted,
    FetchVerificationFailed,
    SnapshotVerified,
    SnapshotChecksumMismatch,
    LiveVerified,
    LiveMissing,
    LiveChecksumMismatch,
    PromotionFailed,
    ExtractionFailed,
}

/// Which document supplied the expected values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    Lockfile,
    SnapshotManifest,
}

macro_rules! snake_case_display {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match serde_json::to_value(self) {
                    Ok(serde_json::Value::String(name)) => f.write_str(&name),
                    _ => write!(f, "{self:?}"),
                }
            }
        }
    )*};
}

snake_case_display!(DecisionKind, ReasonCode, Authority);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expected {
    pub algorithm:   HashAlgorithm,
    pub hash_prefix: String,
    pub size:        Option<u64>,
}

impl Expected {
    pub fn from_checksum(checksum: &Checksum, size: Option<u64>) -> Self {
        Self {
            algorithm: checksum.algorithm(),
            hash_prefix: checksum.prefix().to_string(),
            size,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observed {
    pub hash_prefix: Option<String>,
    pub size:        Option<u64>,
}

impl From<&Verdict> for Observed {
    fn from(verdict: &Verdict) -> Self {
        Self {
            hash_prefix: verdict.observed_prefix().map(str::to_string),
            size:        verdict.observed_size(),
        }
    }
}

/// One logged decision.
///
/// Fields are read-only; `remote_metadata_used` is fixed to `false` by the
/// constructor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    artifact:             String,
    relative_path:        String,
    decision:             DecisionKind,
    reason:               ReasonCode,
    expected:             Expected,
    observed:             Observed,
    authority:            Authority,
    remote_metadata_used: bool,
}

impl Decision {
    pub fn new(
        authority: Authority,
        artifact: &str,
        relative_path: &str,
        decision: DecisionKind,
        reason: ReasonCode,
        expected: Expected,
    ) -> Self {
        Self {
            artifact: artifact.to_string(),
            relative_path: relative_path.to_string(),
            decision,
            reason,
            expected,
            observed: Observed::default(),
            authority,
            remote_metadata_used: false,
        }
    }

    pub fn observed(mut self, observed: impl Into<Observed>) -> Self {
        self.observed = observed.into();
        self
    }

    pub fn artifact(&self) -> &str { &self.artifact }

    pub fn relative_path(&self) -> &str { &self.relative_path }

    pub fn kind(&self) -> DecisionKind { self.decision }

    pub fn reason(&self) -> ReasonCode { self.reason }

    pub fn expected(&self) -> &Expected { &self.expected }

    pub fn observed_values(&self) -> &Observed { &self.observed }

    pub fn authority(&self) -> Authority { self.authority }

    pub fn remote_metadata_used(&self) -> bool { self.remote_metadata_used }
}

/// Receives every decision as it is made.
pub trait DecisionHook: Send + Sync {
    /// Name of this hook for diagnostics.
    fn name(&self) -> &'static str;

    fn on_decision(&self, decision: &Decision);
}

/// Hook that keeps decisions in memory, in emission order.
#[derive(Debug, Default)]
pub struct DecisionRecorder {
    decisions: Mutex<Vec<Decision>>,
}

impl DecisionRecorder {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn decisions(&self) -> Vec<Decision> {
        self.decisions.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize { self.decisions.lock().unwrap_or_else(PoisonError::into_inner).len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl DecisionHook for DecisionRecorder {
    fn name(&self) -> &'static str { "recorder" }

    fn on_decision(&self, decision: &Decision) {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(decision.clone());
    }
}

/// Fan-out of decisions to the tracing target and registered hooks.
#[derive(Clone, Default)]
pub(crate) struct DecisionLog {
    hooks: Vec<Arc<dyn DecisionHook>>,
}

impl DecisionLog {
    pub(crate) fn push(&mut self, hook: Arc<dyn DecisionHook>) { self.hooks.push(hook); }

    pub(crate) fn emit(&self, decision: Decision) {
        info!(
            target: DECISION_TARGET,
            artifact = %decision.artifact,
            relative_path = %decision.relative_path,
            decision = %decision.decision,
            reason = %decision.reason,
            expected_algorithm = %decision.expected.algorithm,
            expected_hash_prefix = %decision.expected.hash_prefix,
            expected_size = ?decision.expected.size,
            observed_hash_prefix = ?decision.observed.hash_prefix,
            observed_size = ?decision.observed.size,
            authority = %decision.authority,
            remote_metadata_used = decision.remote_metadata_used,
            "decision"
        );
        for hook in &self.hooks {
            hook.on_decision(&decision);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checksum() -> Checksum {
        Checksum::new(HashAlgorithm::Sha1, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed").unwrap()
    }

    #[test]
    fn decision_serializes_with_fixed_provenance() {
        let decision = Decision::new(
            Authority::Lockfile,
            "client.jar",
            "versions/1.20.1/client.jar",
            DecisionKind::ResumeFromStaging,
            ReasonCode::StagingVerified,
            Expected::from_checksum(&checksum(), Some(11)),
        );

        let json = serde_json::to_value(&decision).unwrap();

        assert_eq!(json["decision"], "resume_from_staging");
        assert_eq!(json["reason"], "staging_verified");
        assert_eq!(json["authority"], "lockfile");
        assert_eq!(json["remoteMetadataUsed"], false);
        assert_eq!(json["expected"]["hashPrefix"], "2aae6c35c94f");
        assert_eq!(json["expected"]["algorithm"], "sha1");
    }

    #[test]
    fn observed_from_verdict() {
        let observed = Observed::from(&Verdict::SizeMismatch { observed_size: 3 });
        assert_eq!(observed, Observed { hash_prefix: None, size: Some(3) });
        assert_eq!(Observed::from(&Verdict::Missing), Observed::default());
    }

    #[test]
    fn display_matches_wire_names() {
        assert_eq!(DecisionKind::QuarantineThenRedownload.to_string(), "quarantine_then_redownload");
        assert_eq!(Authority::SnapshotManifest.to_string(), "snapshot_manifest");
        assert_eq!(ReasonCode::LiveMissing.to_string(), "live_missing");
    }

    #[test]
    fn recorder_keeps_order() {
        let recorder = DecisionRecorder::new();
        let mut log = DecisionLog::default();
        log.push(recorder.clone());

        for reason in [ReasonCode::NotPresent, ReasonCode::Promoted] {
            log.emit(Decision::new(
                Authority::Lockfile,
                "a",
                "mods/a.jar",
                DecisionKind::Promote,
                reason,
                Expected::from_checksum(&checksum(), None),
            ));
        }

        let reasons: Vec<_> = recorder.decisions().iter().map(Decision::reason).collect();
        assert_eq!(reasons, vec![ReasonCode::NotPresent, ReasonCode::Promoted]);
    }
}
