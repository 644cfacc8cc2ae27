//! In-memory management kernel
//!
//! [`InMemoryKernel`] keeps the attribute values of every resource in a map
//! keyed by address and answers the global operations (`add`, `remove`,
//! attribute access, `read-resource`, `read-resource-description` and
//! `composite`). Legacy kernels are bound to it together with the
//! [`TransformerRegistry`] that maps operations and model state onto their
//! version.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use modeltest_model::{
    keys, ModelNode, ModelVersion, Operation, OperationResult, PathAddress, PathElement,
};
use modeltest_policy::{OperationValidator, ValidationFailure};
use parking_lot::RwLock;

use crate::error::KernelError;
use crate::executor::{ModelExecutor, TransformedOperation};
use crate::registry::{ResourceDefinition, ResourceRegistry};
use crate::transformer::TransformerRegistry;

type Attributes = IndexMap<String, ModelNode>;
type Resources = IndexMap<PathAddress, Attributes>;

/// Legacy kernel and the transformers targeting it
struct LegacyBinding {
    kernel: Arc<dyn ModelExecutor>,
    transformers: TransformerRegistry,
}

/// Builder for [`InMemoryKernel`]
pub struct InMemoryKernelBuilder {
    version: ModelVersion,
    registry: ResourceRegistry,
    legacy: IndexMap<ModelVersion, LegacyBinding>,
}

impl InMemoryKernelBuilder {
    /// Bind a legacy kernel; replaces an earlier binding for its version
    #[must_use]
    pub fn with_legacy(
        mut self,
        kernel: Arc<dyn ModelExecutor>,
        transformers: TransformerRegistry,
    ) -> Self {
        self.legacy.insert(
            kernel.version(),
            LegacyBinding {
                kernel,
                transformers,
            },
        );
        self
    }

    #[must_use]
    pub fn build(self) -> InMemoryKernel {
        let mut resources = Resources::new();
        resources.insert(PathAddress::root(), Attributes::new());
        tracing::debug!(
            version = %self.version,
            legacy = self.legacy.len(),
            "Booted in-memory kernel"
        );
        InMemoryKernel {
            version: self.version,
            registry: Arc::new(self.registry),
            resources: RwLock::new(resources),
            legacy: self.legacy,
            shutdown: AtomicBool::new(false),
        }
    }
}

/// Management kernel holding its model in memory
pub struct InMemoryKernel {
    version: ModelVersion,
    registry: Arc<ResourceRegistry>,
    resources: RwLock<Resources>,
    legacy: IndexMap<ModelVersion, LegacyBinding>,
    shutdown: AtomicBool,
}

impl InMemoryKernel {
    /// Kernel without legacy bindings
    #[must_use]
    pub fn new(version: ModelVersion, registry: ResourceRegistry) -> Self {
        Self::builder(version, registry).build()
    }

    #[must_use]
    pub fn builder(version: ModelVersion, registry: ResourceRegistry) -> InMemoryKernelBuilder {
        InMemoryKernelBuilder {
            version,
            registry,
            legacy: IndexMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Versions of the bound legacy kernels
    pub fn legacy_versions(&self) -> impl Iterator<Item = ModelVersion> + '_ {
        self.legacy.keys().copied()
    }

    fn binding(&self, version: ModelVersion) -> Result<&LegacyBinding, KernelError> {
        self.legacy
            .get(&version)
            .ok_or(KernelError::UnknownVersion(version))
    }

    fn ensure_running(&self) -> Result<(), KernelError> {
        if self.is_shutdown() {
            Err(KernelError::Shutdown)
        } else {
            Ok(())
        }
    }

    fn apply(&self, resources: &mut Resources, operation: &Operation) -> OperationResult {
        if let Err(err) = operation.validate_address() {
            return OperationResult::failed(err.to_string());
        }
        match operation.name() {
            keys::COMPOSITE => self.apply_composite(resources, operation),
            keys::ADD => self.apply_add(resources, operation),
            keys::REMOVE => apply_remove(resources, operation),
            keys::WRITE_ATTRIBUTE | keys::UNDEFINE_ATTRIBUTE => {
                self.apply_attribute_write(resources, operation)
            }
            _ => self.read(resources, operation),
        }
    }

    fn apply_composite(&self, resources: &mut Resources, operation: &Operation) -> OperationResult {
        let steps = match operation.steps() {
            Ok(steps) => steps,
            Err(err) => return OperationResult::failed(err.to_string()),
        };

        let snapshot = resources.clone();
        let mut results = ModelNode::object();
        for (index, step) in steps.iter().enumerate() {
            let result = self.apply(resources, step);
            if let Some(description) = result.failure_description() {
                let description = format!("composite step-{} failed: {description}", index + 1);
                *resources = snapshot;
                tracing::debug!(
                    version = %self.version,
                    step = %step,
                    "Rolled back composite"
                );
                return OperationResult::failed(description);
            }
            results = results.with(format!("step-{}", index + 1), result.to_model_node());
        }
        OperationResult::success(results)
    }

    fn apply_add(&self, resources: &mut Resources, operation: &Operation) -> OperationResult {
        let address = operation.address();
        let Some(definition) = self.registry.find(address) else {
            return OperationResult::failed(format!("no resource is registered at {address}"));
        };
        if resources.contains_key(address) {
            return OperationResult::failed(format!("duplicate resource {address}"));
        }
        if let Some(parent) = address.parent() {
            if !resources.contains_key(&parent) {
                return OperationResult::failed(format!("parent of {address} does not exist"));
            }
        }
        if let Err(failures) =
            OperationValidator::new().validate(operation, &definition.describe(true, false))
        {
            return OperationResult::failed(describe_failures(&failures));
        }

        resources.insert(address.clone(), operation.params().clone());
        OperationResult::success(ModelNode::Undefined)
    }

    fn apply_attribute_write(
        &self,
        resources: &mut Resources,
        operation: &Operation,
    ) -> OperationResult {
        let address = operation.address();
        let (Some(definition), Some(attributes)) =
            (self.registry.find(address), resources.get_mut(address))
        else {
            return OperationResult::failed(format!("resource {address} does not exist"));
        };
        if let Err(failures) = OperationValidator::new()
            .validate(operation, &definition.describe(!address.is_empty(), false))
        {
            return OperationResult::failed(describe_failures(&failures));
        }

        // the validator guarantees a name
        let Some(attribute) = operation.attribute_name() else {
            return OperationResult::failed("missing attribute name");
        };
        match operation.param(keys::VALUE) {
            Some(value) if operation.name() == keys::WRITE_ATTRIBUTE => {
                attributes.insert(attribute.to_string(), value.clone());
            }
            _ => {
                attributes.shift_remove(attribute);
            }
        }
        OperationResult::success(ModelNode::Undefined)
    }

    fn read(&self, resources: &Resources, operation: &Operation) -> OperationResult {
        let address = operation.address();
        let recursive = operation
            .param(keys::RECURSIVE)
            .and_then(ModelNode::as_bool)
            .unwrap_or(false);
        // descriptions only need a registration, not a resource
        if operation.name() == keys::READ_RESOURCE_DESCRIPTION {
            return match self.registry.describe(address, recursive) {
                Some(description) => OperationResult::success(description),
                None => OperationResult::failed(format!("no resource is registered at {address}")),
            };
        }
        let (Some(definition), Some(attributes)) =
            (self.registry.find(address), resources.get(address))
        else {
            return OperationResult::failed(format!("resource {address} does not exist"));
        };

        match operation.name() {
            keys::READ_RESOURCE => {
                let view = |address: &PathAddress, attributes: &Attributes| {
                    Some(self.attribute_values(address, attributes))
                };
                OperationResult::success(assemble(resources, address, recursive, &view))
            }
            keys::READ_ATTRIBUTE => {
                let Some(attribute) = operation.attribute_name() else {
                    return OperationResult::failed("missing attribute name");
                };
                match definition.attribute(attribute) {
                    Some(_) => OperationResult::success(
                        self.attribute_values(address, attributes)
                            .swap_remove(attribute)
                            .unwrap_or(ModelNode::Undefined),
                    ),
                    None => OperationResult::failed(format!(
                        "no attribute {attribute} at {address}"
                    )),
                }
            }
            name => OperationResult::failed(format!("unknown operation {name} at {address}")),
        }
    }

    /// Every described attribute of `address`, defaults filled in
    fn attribute_values(&self, address: &PathAddress, stored: &Attributes) -> Attributes {
        self.registry
            .find(address)
            .map(ResourceDefinition::attributes)
            .into_iter()
            .flatten()
            .map(|attribute| {
                let value = stored
                    .get(attribute.name())
                    .filter(|value| value.is_defined())
                    .or(attribute.default_value())
                    .cloned()
                    .unwrap_or(ModelNode::Undefined);
                (attribute.name().to_string(), value)
            })
            .collect()
    }
}

impl ModelExecutor for InMemoryKernel {
    fn version(&self) -> ModelVersion {
        self.version
    }

    fn execute(&self, operation: &Operation) -> Result<OperationResult, KernelError> {
        self.ensure_running()?;
        let result = match operation.name() {
            keys::READ_RESOURCE | keys::READ_RESOURCE_DESCRIPTION | keys::READ_ATTRIBUTE => {
                self.read(&self.resources.read(), operation)
            }
            _ => self.apply(&mut self.resources.write(), operation),
        };
        tracing::debug!(
            version = %self.version,
            operation = %operation,
            outcome = result.outcome().as_str(),
            "Executed operation"
        );
        Ok(result)
    }

    fn transform_operation(
        &self,
        version: ModelVersion,
        operation: &Operation,
    ) -> Result<TransformedOperation, KernelError> {
        self.ensure_running()?;
        self.binding(version)?
            .transformers
            .transform_operation(operation)
    }

    fn legacy_services(&self, version: ModelVersion) -> Result<Arc<dyn ModelExecutor>, KernelError> {
        Ok(Arc::clone(&self.binding(version)?.kernel))
    }

    fn read_transformed_model(&self, version: ModelVersion) -> Result<ModelNode, KernelError> {
        self.ensure_running()?;
        let transformers = &self.binding(version)?.transformers;
        let resources = self.resources.read();
        let view = |address: &PathAddress, attributes: &Attributes| {
            transformers.transform_resource(address, &self.attribute_values(address, attributes))
        };
        Ok(assemble(&resources, &PathAddress::root(), true, &view))
    }

    fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        for (version, binding) in &self.legacy {
            tracing::debug!(version = %version, "Shutting down legacy kernel");
            binding.kernel.shutdown();
        }
        tracing::debug!(version = %self.version, "Shut down in-memory kernel");
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Build the `read-resource` tree below `address`
///
/// `view` maps stored attributes to the attributes to report; `None` hides
/// the resource and its subtree. Child types only appear when populated.
fn assemble<F>(resources: &Resources, address: &PathAddress, recursive: bool, view: &F) -> ModelNode
where
    F: Fn(&PathAddress, &Attributes) -> Option<Attributes>,
{
    let Some(attributes) = resources.get(address).and_then(|stored| view(address, stored)) else {
        return ModelNode::Undefined;
    };
    let mut node = ModelNode::Object(attributes);

    let mut children: IndexMap<&str, Vec<&PathElement>> = IndexMap::new();
    for child in resources.keys().filter(|child| is_child(address, child)) {
        if let Some(element) = child.last() {
            children.entry(element.key()).or_default().push(element);
        }
    }
    for (child_type, elements) in children {
        let mut entries = ModelNode::object();
        for element in elements {
            let child_address = address.child(element.clone());
            let value = if recursive {
                assemble(resources, &child_address, true, view)
            } else if resources
                .get(&child_address)
                .and_then(|stored| view(&child_address, stored))
                .is_some()
            {
                ModelNode::Undefined
            } else {
                continue;
            };
            if recursive && !value.is_defined() {
                continue;
            }
            entries = entries.with(element.value(), value);
        }
        if entries.as_object().is_some_and(|entries| !entries.is_empty()) {
            node = node.with(child_type, entries);
        }
    }
    node
}

fn is_child(parent: &PathAddress, candidate: &PathAddress) -> bool {
    candidate.len() == parent.len() + 1 && parent.is_prefix_of(candidate)
}

fn apply_remove(resources: &mut Resources, operation: &Operation) -> OperationResult {
    let address = operation.address();
    if address.is_empty() || !resources.contains_key(address) {
        return OperationResult::failed(format!("resource {address} cannot be removed"));
    }
    resources.retain(|candidate, _| !address.is_prefix_of(candidate));
    OperationResult::success(ModelNode::Undefined)
}

fn describe_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AttributeDefinition;
    use crate::transformer::AttributeTransformer;
    use modeltest_model::ModelType;
    use pretty_assertions::assert_eq;

    const CURRENT: ModelVersion = ModelVersion::new(3, 0, 0);
    const LEGACY: ModelVersion = ModelVersion::new(1, 2, 0);

    fn handler(with_filter: bool) -> ResourceDefinition {
        let mut handler = ResourceDefinition::new("A console handler")
            .with_attribute(
                AttributeDefinition::new("level", ModelType::String).with_default("ALL"),
            )
            .with_attribute(AttributeDefinition::new("target", ModelType::String));
        if with_filter {
            handler =
                handler.with_attribute(AttributeDefinition::new("filter-spec", ModelType::String));
        }
        handler
    }

    fn registry(with_filter: bool) -> ResourceRegistry {
        ResourceRegistry::new(ResourceDefinition::new("root").with_child(
            PathElement::new("subsystem", "logging"),
            ResourceDefinition::new("logging")
                .with_child(PathElement::wildcard("console-handler"), handler(with_filter)),
        ))
    }

    fn subsystem() -> PathAddress {
        PathAddress::single("subsystem", "logging")
    }

    fn console() -> PathAddress {
        subsystem().append("console-handler", "CONSOLE")
    }

    fn kernel() -> InMemoryKernel {
        let legacy = Arc::new(InMemoryKernel::new(LEGACY, registry(false)));
        InMemoryKernel::builder(CURRENT, registry(true))
            .with_legacy(
                legacy,
                TransformerRegistry::new().with_attribute(
                    "/subsystem=logging/console-handler=*".parse().unwrap(),
                    "filter-spec",
                    AttributeTransformer::NewAttribute,
                ),
            )
            .build()
    }

    fn run(kernel: &InMemoryKernel, op: Operation) -> OperationResult {
        kernel.execute(&op).unwrap()
    }

    #[test]
    fn add_requires_parent_and_definition() {
        let kernel = kernel();
        assert!(!run(&kernel, Operation::add(console())).is_success());
        assert!(run(&kernel, Operation::add(subsystem())).is_success());
        assert!(run(&kernel, Operation::add(console())).is_success());
        assert!(!run(&kernel, Operation::add(console())).is_success());
        assert!(!run(&kernel, Operation::add(PathAddress::single("subsystem", "ee"))).is_success());
    }

    #[test]
    fn add_validates_parameters() {
        let kernel = kernel();
        run(&kernel, Operation::add(subsystem()));
        let result = run(&kernel, Operation::add(console()).with_param("colour", "red"));
        assert!(result.failure_description().unwrap().contains("unknown parameter"));
    }

    #[test]
    fn read_resource_fills_defaults() {
        let kernel = kernel();
        run(&kernel, Operation::add(subsystem()));
        run(&kernel, Operation::add(console()).with_param("target", "System.out"));

        let model = kernel.read_model().unwrap();
        let expected = ModelNode::object().with(
            "subsystem",
            ModelNode::object().with(
                "logging",
                ModelNode::object().with(
                    "console-handler",
                    ModelNode::object().with(
                        "CONSOLE",
                        ModelNode::object()
                            .with("level", "ALL")
                            .with("target", "System.out")
                            .with("filter-spec", ModelNode::Undefined),
                    ),
                ),
            ),
        );
        assert_eq!(model, expected);
    }

    #[test]
    fn non_recursive_read_lists_children_as_undefined() {
        let kernel = kernel();
        run(&kernel, Operation::add(subsystem()));
        run(&kernel, Operation::add(console()));
        let result = run(&kernel, Operation::read_resource(subsystem(), false));
        assert_eq!(
            result.result().get_path(&["console-handler", "CONSOLE"]),
            Some(&ModelNode::Undefined)
        );
    }

    #[test]
    fn attribute_operations() {
        let kernel = kernel();
        run(&kernel, Operation::add(subsystem()));
        run(&kernel, Operation::add(console()));

        assert!(run(&kernel, Operation::write_attribute(console(), "level", "INFO")).is_success());
        let read = Operation::new(keys::READ_ATTRIBUTE, console()).with_param(keys::NAME, "level");
        assert_eq!(run(&kernel, read.clone()).result(), &ModelNode::from("INFO"));

        assert!(run(&kernel, Operation::undefine_attribute(console(), "level")).is_success());
        assert_eq!(run(&kernel, read).result(), &ModelNode::from("ALL"));

        let unknown = Operation::write_attribute(console(), "colour", "red");
        assert!(!run(&kernel, unknown).is_success());
    }

    #[test]
    fn description_needs_no_resource() {
        let kernel = kernel();
        let read = Operation::new(keys::READ_RESOURCE_DESCRIPTION, console());
        let description = run(&kernel, read).into_result();
        assert!(description.get_path(&[keys::ATTRIBUTES, "filter-spec"]).is_some());
        assert!(description.get_path(&[keys::OPERATIONS, keys::ADD]).is_some());
    }

    #[test]
    fn remove_is_recursive() {
        let kernel = kernel();
        run(&kernel, Operation::add(subsystem()));
        run(&kernel, Operation::add(console()));
        assert!(run(&kernel, Operation::remove(subsystem())).is_success());
        assert!(!run(&kernel, Operation::read_resource(console(), false)).is_success());
        assert!(!run(&kernel, Operation::remove(PathAddress::root())).is_success());
    }

    #[test]
    fn failed_composite_rolls_back() {
        let kernel = kernel();
        let composite = Operation::composite([
            Operation::add(subsystem()),
            Operation::add(console()),
            Operation::add(console()),
        ]);
        let result = run(&kernel, composite);
        assert!(result.failure_description().unwrap().contains("step-3"));
        assert_eq!(kernel.read_model().unwrap(), ModelNode::object());
    }

    #[test]
    fn composite_reports_step_results() {
        let kernel = kernel();
        let composite =
            Operation::composite([Operation::add(subsystem()), Operation::add(console())]);
        let result = run(&kernel, composite);
        assert!(result.is_success());
        assert_eq!(result.result().keys().collect::<Vec<_>>(), vec!["step-1", "step-2"]);
    }

    #[test]
    fn transformed_model_drops_undefined_new_attributes() {
        let kernel = kernel();
        run(&kernel, Operation::add(subsystem()));
        run(&kernel, Operation::add(console()));

        let transformed = kernel.read_transformed_model(LEGACY).unwrap();
        let handler = transformed
            .get_path(&["subsystem", "logging", "console-handler", "CONSOLE"])
            .unwrap();
        assert!(!handler.has("filter-spec"));
        assert!(handler.has("level"));

        assert_eq!(
            kernel.read_transformed_model(ModelVersion::new(9, 9, 9)),
            Err(KernelError::UnknownVersion(ModelVersion::new(9, 9, 9)))
        );
    }

    #[test]
    fn execute_transformed_reaches_legacy_kernel() {
        let kernel = kernel();
        let add = Operation::add(subsystem());
        let transformed = kernel.transform_operation(LEGACY, &add).unwrap();
        assert!(kernel.execute_transformed(LEGACY, &transformed).unwrap().is_success());

        let legacy = kernel.legacy_services(LEGACY).unwrap();
        assert!(legacy.read_model().unwrap().has("subsystem"));
        assert!(!kernel.read_model().unwrap().has("subsystem"));
    }

    #[test]
    fn shutdown_is_idempotent_and_cascades() {
        let kernel = kernel();
        let legacy = kernel.legacy_services(LEGACY).unwrap();
        kernel.shutdown();
        kernel.shutdown();
        assert!(kernel.is_shutdown());
        assert!(legacy.is_shutdown());
        assert_eq!(
            kernel.execute(&Operation::read_resource(PathAddress::root(), false)),
            Err(KernelError::Shutdown)
        );
    }
}
