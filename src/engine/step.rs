use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{Result, SourceRow, Value};
use crate::engine::StepContext;
use crate::schema::TableSnapshot;

/// A function run against the step context, used for prologues, epilogues
/// and whole-table custom transforms.
pub type HookFn = Arc<dyn Fn(&mut StepContext) -> Result<()> + Send + Sync>;

/// Computes one cell of a new row from the old row and whatever else the
/// context exposes. `Ok(None)` keeps the column's declared default.
pub type ComputeFn = fn(&StepContext, &SourceRow) -> Result<Option<Value>>;

/// How one target column is produced when a table migrates under rules.
#[derive(Clone)]
pub enum ColumnRule {
    /// Take the same-named column from the old row.
    Copy,
    /// Take a differently-named column from the old row.
    RenameFrom(&'static str),
    /// Write a fixed value for every row.
    Fill(Value),
    /// Keep the column's declared default.
    Default,
    /// Derive the value, with read access to the whole old store.
    Compute(ComputeFn),
}

impl fmt::Debug for ColumnRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => write!(f, "Copy"),
            Self::RenameFrom(from) => write!(f, "RenameFrom({:?})", from),
            Self::Fill(value) => write!(f, "Fill({})", value),
            Self::Default => write!(f, "Default"),
            Self::Compute(_) => write!(f, "Compute(..)"),
        }
    }
}

/// How one table's rows travel from the old store to the new one.
#[derive(Clone)]
pub enum TableTransform {
    /// Row-for-row copy of the shared columns; new columns get defaults.
    /// Tables present on both sides of a step default to this.
    CopyThrough,
    /// Row-for-row copy with per-column overrides. Columns not listed
    /// behave as under `CopyThrough`. Structurally one old row in, one new
    /// row out, so the row count cannot change.
    Rules(Vec<(String, ColumnRule)>),
    /// Full control: the function writes the table itself. The only
    /// transform kind that can change a row count, which then requires a
    /// declared count waiver.
    Custom(HookFn),
}

impl fmt::Debug for TableTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CopyThrough => write!(f, "CopyThrough"),
            Self::Rules(rules) => f.debug_tuple("Rules").field(rules).finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Whether the integrity verifier treats a count change in one table as
/// fatal or as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountPolicy {
    Enforce,
    /// The step is expected to change this table's row count; the reason is
    /// logged and reported alongside the delta.
    Waive(String),
}

static ENFORCE: CountPolicy = CountPolicy::Enforce;
static COPY_THROUGH: TableTransform = TableTransform::CopyThrough;

/// Everything the engine needs to carry a store across one version
/// boundary, frozen at catalog assembly time.
#[derive(Clone)]
pub struct StepDescriptor {
    version: u32,
    from_snapshots: BTreeMap<String, Arc<TableSnapshot>>,
    to_snapshots: BTreeMap<String, Arc<TableSnapshot>>,
    transforms: BTreeMap<String, TableTransform>,
    prologue: Option<HookFn>,
    epilogue: Option<HookFn>,
    count_policy: BTreeMap<String, CountPolicy>,
}

impl fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("version", &self.version)
            .field("tables_in", &self.from_snapshots.len())
            .field("tables_out", &self.to_snapshots.len())
            .field("transforms", &self.transforms)
            .field("has_prologue", &self.prologue.is_some())
            .field("has_epilogue", &self.epilogue.is_some())
            .field("count_policy", &self.count_policy)
            .finish()
    }
}

impl StepDescriptor {
    /// Creates a descriptor migrating `version` to `version + 1`, between
    /// two frozen snapshot sets.
    pub fn new(
        version: u32,
        from_snapshots: BTreeMap<String, Arc<TableSnapshot>>,
        to_snapshots: BTreeMap<String, Arc<TableSnapshot>>,
    ) -> Self {
        Self {
            version,
            from_snapshots,
            to_snapshots,
            transforms: BTreeMap::new(),
            prologue: None,
            epilogue: None,
            count_policy: BTreeMap::new(),
        }
    }

    /// Registers a transform for one table.
    pub fn with_transform(mut self, table: impl Into<String>, transform: TableTransform) -> Self {
        self.transforms.insert(table.into(), transform);
        self
    }

    /// Registers a rules transform for one table.
    pub fn with_rules(
        mut self,
        table: impl Into<String>,
        rules: Vec<(&'static str, ColumnRule)>,
    ) -> Self {
        let rules = rules
            .into_iter()
            .map(|(col, rule)| (col.to_string(), rule))
            .collect();
        self.transforms
            .insert(table.into(), TableTransform::Rules(rules));
        self
    }

    /// Registers a custom transform that writes the table itself.
    pub fn with_custom<F>(mut self, table: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&mut StepContext) -> Result<()> + Send + Sync + 'static,
    {
        self.transforms
            .insert(table.into(), TableTransform::Custom(Arc::new(transform)));
        self
    }

    /// Runs before any table transform; filesystem preconditions go here.
    pub fn with_prologue<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut StepContext) -> Result<()> + Send + Sync + 'static,
    {
        self.prologue = Some(Arc::new(hook));
        self
    }

    /// Runs after all table transforms; cross-table reshaping goes here.
    pub fn with_epilogue<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut StepContext) -> Result<()> + Send + Sync + 'static,
    {
        self.epilogue = Some(Arc::new(hook));
        self
    }

    /// Declares that this step changes `table`'s row count on purpose.
    pub fn waive_count(mut self, table: impl Into<String>, reason: impl Into<String>) -> Self {
        self.count_policy
            .insert(table.into(), CountPolicy::Waive(reason.into()));
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn target_version(&self) -> u32 {
        self.version + 1
    }

    pub fn from_snapshots(&self) -> &BTreeMap<String, Arc<TableSnapshot>> {
        &self.from_snapshots
    }

    pub fn to_snapshots(&self) -> &BTreeMap<String, Arc<TableSnapshot>> {
        &self.to_snapshots
    }

    /// The transform for a table of the target schema. Tables present on
    /// both sides fall back to `CopyThrough`; tables new in this version
    /// have no implicit transform, they start empty.
    pub fn transform_for(&self, table: &str) -> Option<&TableTransform> {
        if let Some(transform) = self.transforms.get(table) {
            return Some(transform);
        }
        if self.from_snapshots.contains_key(table) {
            return Some(&COPY_THROUGH);
        }
        None
    }

    pub fn transforms(&self) -> &BTreeMap<String, TableTransform> {
        &self.transforms
    }

    pub fn prologue(&self) -> Option<&HookFn> {
        self.prologue.as_ref()
    }

    pub fn epilogue(&self) -> Option<&HookFn> {
        self.epilogue.as_ref()
    }

    pub fn count_policy(&self, table: &str) -> &CountPolicy {
        self.count_policy.get(table).unwrap_or(&ENFORCE)
    }

    /// Declared waivers as (table, reason) pairs.
    pub fn waived_tables(&self) -> impl Iterator<Item = (&str, &str)> {
        self.count_policy.iter().filter_map(|(table, policy)| match policy {
            CountPolicy::Waive(reason) => Some((table.as_str(), reason.as_str())),
            CountPolicy::Enforce => None,
        })
    }

    /// Tables whose counts the verifier reconciles: present in both
    /// snapshot sets. Introduced and retired tables are exempt.
    pub fn verified_tables(&self) -> impl Iterator<Item = &str> {
        self.to_snapshots
            .keys()
            .filter(|name| self.from_snapshots.contains_key(*name))
            .map(|name| name.as_str())
    }
}
