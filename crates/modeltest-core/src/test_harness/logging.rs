//! Logging subsystem fixture
//!
//! A current logging model (3.0.0) and the legacy model it must stay
//! compatible with (1.2.0). The legacy model has no `filter-spec` on
//! console handlers, no JSON formatters, no expression support for
//! `level` and only writes to `System.out`.

use std::sync::Arc;

use modeltest_kernel::{
    AttributeDefinition, AttributeTransformer, InMemoryKernel, ModelExecutor,
    ResourceDefinition, ResourceRegistry, TransformerRegistry,
};
use modeltest_model::{ModelNode, ModelType, ModelVersion, Operation, PathAddress, PathElement};
use modeltest_policy::{
    AttributesRule, CorrectionPolicy, CustomCheck, FilterAction, NewAttribute,
    OperationValidationFilter, RejectExpressions,
};

use crate::config::{ConfigError, ControllerKind, HarnessConfig, LegacyControllerEntry};
use crate::error::ModelTestError;

pub const CURRENT: ModelVersion = ModelVersion::new(3, 0, 0);
pub const LEGACY: ModelVersion = ModelVersion::new(1, 2, 0);

/// Artifact locator of the bundled legacy controller
pub const LEGACY_ARTIFACT: &str = "in-memory:logging-1.2.0";

fn subsystem() -> PathAddress {
    PathAddress::single("subsystem", "logging")
}

fn console_handlers() -> PathAddress {
    subsystem().append("console-handler", "*")
}

fn json_formatters() -> PathAddress {
    subsystem().append("json-formatter", "*")
}

fn console_handler(name: &str) -> PathAddress {
    subsystem().append("console-handler", name)
}

fn console_handler_definition(current: bool) -> ResourceDefinition {
    let mut handler = ResourceDefinition::new("Console log handler")
        .with_attribute(
            AttributeDefinition::new("level", ModelType::String)
                .with_description("Lowest level logged")
                .allow_expressions()
                .with_default("ALL"),
        )
        .with_attribute(
            AttributeDefinition::new("autoflush", ModelType::Boolean)
                .with_description("Flush after every record")
                .with_default(true),
        )
        .with_attribute(
            AttributeDefinition::new("target", ModelType::String)
                .with_description("Output stream")
                .with_allowed(["System.out", "System.err"])
                .with_default("System.out"),
        );
    if current {
        handler = handler.with_attribute(
            AttributeDefinition::new("filter-spec", ModelType::String)
                .with_description("Filter expression applied before publishing"),
        );
    }
    handler
}

/// Resource registry of the current logging model
#[must_use]
pub fn current_registry() -> ResourceRegistry {
    let logging = ResourceDefinition::new("Logging subsystem")
        .with_attribute(
            AttributeDefinition::new("add-logging-api-dependencies", ModelType::Boolean)
                .with_default(true),
        )
        .with_child(
            PathElement::wildcard("console-handler"),
            console_handler_definition(true),
        )
        .with_child(
            PathElement::wildcard("json-formatter"),
            ResourceDefinition::new("JSON formatter")
                .with_attribute(
                    AttributeDefinition::new("pretty-print", ModelType::Boolean)
                        .with_default(false),
                )
                .with_attribute(AttributeDefinition::new("date-format", ModelType::String)),
        );
    ResourceRegistry::new(
        ResourceDefinition::new("Server root")
            .with_child(PathElement::new("subsystem", "logging"), logging),
    )
}

/// Resource registry of the legacy logging model
#[must_use]
pub fn legacy_registry() -> ResourceRegistry {
    let logging = ResourceDefinition::new("Logging subsystem")
        .with_attribute(
            AttributeDefinition::new("add-logging-api-dependencies", ModelType::Boolean)
                .with_default(true),
        )
        .with_child(
            PathElement::wildcard("console-handler"),
            console_handler_definition(false),
        );
    ResourceRegistry::new(
        ResourceDefinition::new("Server root")
            .with_child(PathElement::new("subsystem", "logging"), logging),
    )
}

/// Transformers from the current model to the legacy one
#[must_use]
pub fn transformers() -> TransformerRegistry {
    TransformerRegistry::new()
        .with_discarded(json_formatters())
        .with_attribute(console_handlers(), "filter-spec", AttributeTransformer::NewAttribute)
        .with_attribute(console_handlers(), "level", AttributeTransformer::RejectExpressions)
        .with_attribute(
            console_handlers(),
            "target",
            AttributeTransformer::allowed_values(&["System.out"]),
        )
}

/// Boot a current kernel bound to the legacy controller `entry`
///
/// # Errors
/// Returns error for versions other than [`LEGACY`], out-of-process
/// controllers and unknown artifacts
pub fn boot(
    version: ModelVersion,
    entry: &LegacyControllerEntry,
) -> Result<Arc<dyn ModelExecutor>, ModelTestError> {
    if version != LEGACY {
        return Err(ModelTestError::UnknownVersion(version));
    }
    if entry.kind != ControllerKind::InProcess {
        return Err(ModelTestError::UnsupportedController {
            version,
            kind: entry.kind,
        });
    }
    if entry.artifact != LEGACY_ARTIFACT {
        return Err(ConfigError::Invalid(format!(
            "unknown legacy controller artifact {}",
            entry.artifact
        ))
        .into());
    }

    tracing::debug!(version = %version, artifact = %entry.artifact, "Booting legacy controller");
    let legacy = Arc::new(InMemoryKernel::new(LEGACY, legacy_registry()));
    let current = InMemoryKernel::builder(CURRENT, current_registry())
        .with_legacy(legacy, transformers())
        .build();
    Ok(Arc::new(current))
}

/// Configuration checking the bundled legacy controller
#[must_use]
pub fn default_config() -> HarnessConfig {
    HarnessConfig::new().with_legacy_version(LEGACY, LegacyControllerEntry::in_process(LEGACY_ARTIFACT))
}

/// Boot operations every legacy version accepts unchanged
#[must_use]
pub fn accepted_operations() -> Vec<Operation> {
    vec![
        Operation::add(subsystem()),
        Operation::add(console_handler("CONSOLE"))
            .with_param("level", "INFO")
            .with_param("target", "System.out"),
        Operation::add(console_handler("AUDIT"))
            .with_param("autoflush", false)
            .with_param("filter-spec", ModelNode::Undefined),
        Operation::add(subsystem().append("json-formatter", "JSON"))
            .with_param("pretty-print", true),
    ]
}

/// Boot operations the legacy version rejects until corrected
#[must_use]
pub fn rejected_operations() -> Vec<Operation> {
    vec![
        Operation::add(subsystem()),
        Operation::add(console_handler("CONSOLE"))
            .with_param("level", ModelNode::expression("${logging.level:DEBUG}")),
        Operation::add(console_handler("ERRORS"))
            .with_param("level", "ERROR")
            .with_param("filter-spec", "not(match(\"health\"))")
            .with_param("target", "System.err"),
        Operation::add(subsystem().append("json-formatter", "JSON")),
    ]
}

/// Expected legacy treatment of logging operations
#[must_use]
pub fn policy() -> CorrectionPolicy {
    CorrectionPolicy::no_failures()
        .with_discarded_resource(json_formatters())
        .with_attributes(
            console_handlers(),
            AttributesRule::new()
                .with_check("level", RejectExpressions::new())
                .with_check("filter-spec", NewAttribute)
                .with_check(
                    "target",
                    CustomCheck::allowed_values("legacy-target", &["System.out"], "System.out"),
                ),
        )
}

/// Resolve console handler expressions before validating them
#[must_use]
pub fn validation_filter() -> OperationValidationFilter {
    OperationValidationFilter::new().with_rule(console_handlers(), "add", FilterAction::Resolve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_binds_the_legacy_kernel() {
        let kernel = boot(LEGACY, &LegacyControllerEntry::in_process(LEGACY_ARTIFACT)).unwrap();
        assert_eq!(kernel.version(), CURRENT);
        assert_eq!(kernel.legacy_services(LEGACY).unwrap().version(), LEGACY);
        kernel.shutdown();
    }

    #[test]
    fn boot_refuses_unknown_controllers() {
        let entry = LegacyControllerEntry::in_process(LEGACY_ARTIFACT);
        assert!(matches!(
            boot(ModelVersion::new(2, 0, 0), &entry),
            Err(ModelTestError::UnknownVersion(_))
        ));
        assert!(matches!(
            boot(LEGACY, &LegacyControllerEntry::new(LEGACY_ARTIFACT, ControllerKind::OutOfProcess)),
            Err(ModelTestError::UnsupportedController { .. })
        ));
        assert!(matches!(
            boot(LEGACY, &LegacyControllerEntry::in_process("in-memory:other")),
            Err(ModelTestError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn policy_matches_operation_sets() {
        let policy = policy();
        assert!(accepted_operations()
            .iter()
            .all(|op| !policy.expect_failed(op)));
        let rejected: Vec<bool> = rejected_operations()
            .iter()
            .map(|op| policy.expect_failed(op))
            .collect();
        assert_eq!(rejected, vec![false, true, true, false]);
        assert!(policy.expect_discarded(&rejected_operations()[3]));
    }
}
