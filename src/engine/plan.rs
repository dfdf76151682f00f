use std::collections::{HashMap, HashSet};

use crate::core::{MigrateError, Result};
use crate::engine::executor::dependency_order;
use crate::engine::step::{StepDescriptor, TableTransform};

/// The ordered collection of step descriptors leading to one target
/// version, and the resolver that walks it.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    target_version: u32,
    oldest_supported: u32,
    steps: Vec<StepDescriptor>,
}

impl MigrationPlan {
    /// Creates a new empty migration plan for a target version.
    pub fn new(target_version: u32) -> Self {
        Self {
            target_version,
            oldest_supported: 1,
            steps: Vec::new(),
        }
    }

    /// Stores older than this are refused outright rather than walked.
    pub fn with_oldest_supported(mut self, version: u32) -> Self {
        self.oldest_supported = version;
        self
    }

    pub fn target_version(&self) -> u32 {
        self.target_version
    }

    pub fn oldest_supported(&self) -> u32 {
        self.oldest_supported
    }

    /// Returns the list of registered step descriptors.
    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    /// Adds a step descriptor to the plan, validating it immediately.
    pub fn add_step(&mut self, step: StepDescriptor) -> Result<()> {
        self.steps.push(step);
        self.validate()
    }

    /// Fluent builder method to add a step.
    pub fn with_step(mut self, step: StepDescriptor) -> Result<Self> {
        self.add_step(step)?;
        Ok(self)
    }

    /// Validates the integrity of the migration plan.
    ///
    /// Checks for:
    /// - version validity (>= 1) and step bounds (below the target),
    /// - duplicate steps,
    /// - transforms and waivers naming tables their step does not have,
    /// - circular references within any step's target snapshots,
    /// - snapshot disagreement between adjacent steps.
    pub fn validate(&self) -> Result<()> {
        if self.target_version == 0 || self.oldest_supported == 0 {
            return Err(MigrateError::InvalidPlan(
                "schema versions start at 1".to_string(),
            ));
        }

        let mut seen = HashSet::<u32>::new();
        for step in &self.steps {
            if step.version() == 0 {
                return Err(MigrateError::InvalidPlan(
                    "step versions start at 1".to_string(),
                ));
            }
            if step.target_version() > self.target_version {
                return Err(MigrateError::InvalidPlan(format!(
                    "step {} -> {} exceeds target version {}",
                    step.version(),
                    step.target_version(),
                    self.target_version
                )));
            }
            if !seen.insert(step.version()) {
                return Err(MigrateError::InvalidPlan(format!(
                    "duplicate step starting at version {}",
                    step.version()
                )));
            }
            self.validate_step(step)?;
        }

        for step in &self.steps {
            if let Some(next) = self.step_for(step.target_version()) {
                self.validate_adjacency(step, next)?;
            }
        }

        Ok(())
    }

    fn validate_step(&self, step: &StepDescriptor) -> Result<()> {
        for (table, transform) in step.transforms() {
            if !step.to_snapshots().contains_key(table) {
                return Err(MigrateError::InvalidPlan(format!(
                    "step {} transforms table '{}' absent from version {}",
                    step.version(),
                    table,
                    step.target_version()
                )));
            }
            let needs_source = matches!(
                transform,
                TableTransform::CopyThrough | TableTransform::Rules(_)
            );
            if needs_source && !step.from_snapshots().contains_key(table) {
                return Err(MigrateError::InvalidPlan(format!(
                    "step {} copies table '{}' that does not exist at version {}",
                    step.version(),
                    table,
                    step.version()
                )));
            }
        }

        for (table, _) in step.waived_tables() {
            let verified = step.from_snapshots().contains_key(table)
                && step.to_snapshots().contains_key(table);
            if !verified {
                return Err(MigrateError::InvalidPlan(format!(
                    "step {} waives counts for '{}', which it does not verify",
                    step.version(),
                    table
                )));
            }
        }

        // catches circular references at assembly time, not mid-run
        dependency_order(step.to_snapshots())?;
        Ok(())
    }

    fn validate_adjacency(&self, step: &StepDescriptor, next: &StepDescriptor) -> Result<()> {
        let out = step.to_snapshots();
        let into = next.from_snapshots();
        let agree = out.len() == into.len()
            && out.iter().all(|(name, snap)| {
                into.get(name).is_some_and(|other| snap.same_shape(other))
            });
        if !agree {
            return Err(MigrateError::InvalidPlan(format!(
                "steps {} and {} disagree about the version {} schema",
                step.version(),
                next.version(),
                step.target_version()
            )));
        }
        Ok(())
    }

    fn step_for(&self, version: u32) -> Option<&StepDescriptor> {
        self.steps.iter().find(|step| step.version() == version)
    }

    /// Resolves the ordered chain of steps carrying `from_version` to the
    /// plan's target. Empty when the store is already there; an error when
    /// the store is newer than the target, older than the oldest supported
    /// version, or the chain has a hole. No side effects.
    pub fn resolve(&self, from_version: u32) -> Result<Vec<&StepDescriptor>> {
        if from_version > self.target_version {
            return Err(MigrateError::UnsupportedVersion(
                from_version,
                format!(
                    "store is newer than this build's version {}",
                    self.target_version
                ),
            ));
        }
        if from_version < self.oldest_supported {
            return Err(MigrateError::UnsupportedVersion(
                from_version,
                format!(
                    "versions before {} are no longer supported",
                    self.oldest_supported
                ),
            ));
        }
        if from_version == self.target_version {
            return Ok(Vec::new());
        }

        let mut by_from = HashMap::<u32, &StepDescriptor>::new();
        for step in &self.steps {
            by_from.insert(step.version(), step);
        }

        let mut cursor = from_version;
        let mut chain = Vec::new();
        while cursor < self.target_version {
            let step = by_from.get(&cursor).copied().ok_or_else(|| {
                MigrateError::UnsupportedVersion(
                    from_version,
                    format!(
                        "no step carries version {} toward {}",
                        cursor, self.target_version
                    ),
                )
            })?;
            chain.push(step);
            cursor = step.target_version();
        }

        Ok(chain)
    }
}
