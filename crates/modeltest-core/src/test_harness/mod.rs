//! Bundled replay scenarios
//!
//! Each [`Scenario`] runs a set of boot operations through the replay
//! engine for every configured legacy version and collects a
//! [`ScenarioReport`].

pub mod logging;

use modeltest_model::Operation;
use modeltest_policy::CorrectionPolicy;
use serde::Serialize;

use crate::engine::{LegacyCheck, ReplayEngine, ReplaySummary};
use crate::error::FailureCategory;

/// Named set of boot operations with their expected legacy treatment
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub operations: fn() -> Vec<Operation>,
    pub policy: fn() -> CorrectionPolicy,
    /// Compare transformed and legacy models after replay
    pub check_model: bool,
}

/// All bundled scenarios
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "transformers",
            description: "Operations accepted unchanged; models must match after replay",
            operations: logging::accepted_operations,
            policy: logging::policy,
            check_model: true,
        },
        Scenario {
            name: "rejections",
            description: "Operations rejected by the legacy model, corrected and replayed",
            operations: logging::rejected_operations,
            policy: logging::policy,
            check_model: false,
        },
    ]
}

#[must_use]
pub fn find_scenario(name: &str) -> Option<Scenario> {
    scenarios().into_iter().find(|scenario| scenario.name == name)
}

/// Result of one legacy version check
#[derive(Debug, Clone, Serialize)]
pub struct VersionReport {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReplaySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<FailureCategory>,
}

impl VersionReport {
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Scenario results over all legacy versions
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub description: String,
    pub versions: Vec<VersionReport>,
}

impl ScenarioReport {
    /// Check if every legacy version passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.versions.iter().all(VersionReport::passed)
    }

    /// Human readable report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!("=== Scenario: {} ===\n", self.scenario));
        report.push_str(&format!("{}\n\n", self.description));

        for version in &self.versions {
            report.push_str(&format!("--- Legacy version {} ---\n", version.version));
            if let Some(summary) = &version.summary {
                report.push_str(&format!("Accepted: {}\n", summary.accepted));
                report.push_str(&format!(
                    "Corrected: {} ({} rounds)\n",
                    summary.corrected, summary.correction_rounds
                ));
                report.push_str(&format!("Rejected: {}\n", summary.rejected));
                report.push_str(&format!("Discarded: {}\n", summary.discarded));
                report.push_str(&format!(
                    "Write-attribute replays: {} ({} corrected)\n",
                    summary.writes, summary.corrected_writes
                ));
            }
            if let Some(error) = &version.error {
                let category = version
                    .category
                    .map_or("unknown", |category| category.as_str());
                report.push_str(&format!("Failure ({category}): {error}\n"));
            }
        }

        if self.versions.is_empty() {
            report.push_str("No legacy versions configured\n");
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

/// Run `scenario` against every legacy version configured on `engine`
///
/// Versions are checked independently; a failing version does not stop
/// the others.
#[must_use]
pub fn run_scenario(engine: &ReplayEngine, scenario: &Scenario) -> ScenarioReport {
    tracing::info!(scenario = scenario.name, "Running scenario");
    let operations = (scenario.operations)();
    let policy = (scenario.policy)();
    let filter = logging::validation_filter();
    let mut check = LegacyCheck::new(&operations, &policy).with_filter(&filter);
    if scenario.check_model {
        check = check.with_model_check();
    }

    let versions = engine
        .config()
        .legacy_versions
        .iter()
        .map(|(version, entry)| {
            let result = logging::boot(version, entry)
                .and_then(|current| engine.check_legacy_version(current, version, &check));
            match result {
                Ok(summary) => VersionReport {
                    version: version.to_string(),
                    summary: Some(summary),
                    error: None,
                    category: None,
                },
                Err(err) => {
                    tracing::warn!(
                        scenario = scenario.name,
                        version = %version,
                        error = %err,
                        "Scenario failed"
                    );
                    VersionReport {
                        version: version.to_string(),
                        summary: None,
                        error: Some(err.to_string()),
                        category: Some(err.category()),
                    }
                }
            }
        })
        .collect();

    ScenarioReport {
        scenario: scenario.name.to_string(),
        description: scenario.description.to_string(),
        versions,
    }
}
