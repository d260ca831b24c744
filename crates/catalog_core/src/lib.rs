//! Catalog core: pure extraction logic with no IO.
mod merge;
mod origin;
mod schema;
mod wizard;

pub use merge::{RawRow, RowKey, WindowMerge};
pub use origin::{normalize_origin, same_origin};
pub use schema::{
    normalize_row, ColumnSchema, ColumnSpec, FieldKind, FieldValue, ProductRecord,
};
pub use wizard::{PlanError, StepInput, StepSpec, WizardCursor, WizardPlan, WizardStateError};
