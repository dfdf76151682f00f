pub mod context;
pub mod executor;
pub mod plan;
pub mod run;
pub mod step;
pub mod verify;

pub use context::StepContext;
pub use executor::{StepExecutor, StepReport};
pub use plan::MigrationPlan;
pub use run::{MigrationReport, MigrationRun, MigrationSettings};
pub use step::{ColumnRule, ComputeFn, CountPolicy, HookFn, StepDescriptor, TableTransform};
pub use verify::{TableCount, verify_counts};
