//! Conversion directive interpreter.
//!
//! - **token**: the expression grammar used inside directive attributes
//! - **directive**: typed directives parsed from a validated document
//! - **registry**: the directive set and nested-directive lookup
//! - **functions**: the closed builtin function table behind `code`/`execute`
//! - **resolve**: token resolution against current and calling records
//! - **evaluator**: per-kind evaluation with selection, sorting and collation

pub mod directive;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod registry;
pub mod resolve;
pub mod token;

pub use directive::{
    Computation, Directive, DirectiveKind, MatrixDirective, RecordMatrix, SectionDirective,
    Selection, SortSpec, StrDirective,
};
pub use error::{DirectiveError, DirectiveKey, ResolveError, Result};
pub use evaluator::{Conversion, DirectiveOutput, Evaluator};
pub use functions::{
    BuiltinFn, CORE_MODULE, Capabilities, FunctionContext, FunctionError, FunctionTable,
    LINEAGE_MODULE, ONTOLOGY_MODULE,
};
pub use registry::{Registry, directive_counts, update_directives};
pub use resolve::{Resolved, Scope, resolve_token, test_matches};
pub use token::{CallExpr, HeaderPair, NestedRef, TestExpr, TestValue, Token, TokenError};
