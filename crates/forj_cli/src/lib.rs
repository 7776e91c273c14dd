//! # forj_cli
//!
//! Declarative object/flag command-line core used by forjj plugins.
//!
//! The schema is made of actions (verbs), objects with typed fields, and
//! object lists packing several object instances in one value. It is
//! turned into commands of a parsing engine:
//!
//! ```text
//! <app> <action> <object> --<field> <value>
//! <app> <action> <object>s "<key1>[:<field>],<key2>"
//! <app> <action> --<object>s "<key1>,<key2>" --<key1>-<field> <value>
//! ```
//!
//! Parsing runs in two phases: a lenient discovery that lets hooks and
//! decoded lists extend the schema, then a strict parse whose result lands
//! in a value store keyed by object and instance.

pub mod action;
pub mod cli;
pub mod context;
pub mod engine;
pub mod error;
pub mod field;
pub mod list;
pub mod object;
pub mod options;
pub mod param;
pub mod records;
pub mod template;
pub mod types;

pub use action::{Action, ContextRefresh, ObjectAction};
pub use cli::{CliHook, DefinitionPolicy, ForjCli, DEFAULT_MAX_CONTEXT_PASSES};
pub use context::ForjCliContext;
pub use engine::{ClapEngine, CommandPath, MockEngine, ParamKind, ParamSpec, ParseContext, ParseEngine};
pub use error::{CliError, CliResult};
pub use field::Field;
pub use list::{ListBuilder, ListFlagsRef, ListItem, ObjectList, ValidateHandler};
pub use object::{Object, ObjectBuilder, ObjectHook, ObjectInstance, NO_FIELDS};
pub use options::{opts, ForjOpts};
pub use param::{Param, ParamBinding, ParamData, ParamHost};
pub use records::{Attr, Fetched, ForjRecord, ForjRecords, ACTION_ATTR, SETUP_ACTION};
pub use types::{ParsedValue, Value, ValueSource, ValueType};
