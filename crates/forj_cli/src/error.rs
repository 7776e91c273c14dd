//! Error types for the CLI core.

use thiserror::Error;

/// Result type alias for CLI core operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur while declaring a schema or parsing a command line.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Missing key in the object '{0}'")]
    MissingKey(String),

    #[error("One key already exist in the object '{object}', called '{field}'")]
    KeyAlreadyExists { object: String, field: String },

    #[error("Unable to find '{field}' field in Object '{object}'.")]
    FieldNotFound { object: String, field: String },

    #[error("Unable to add {level} field. Field {field} already exist in {object} at {existing} level.")]
    FieldConflict {
        object: String,
        field: String,
        level: String,
        existing: String,
    },

    #[error("Unable to add field on the object '{0}' declared with no fields.")]
    NoFieldsObject(String),

    #[error("Object '{0}' cannot be declared without fields: fields already exist.")]
    FieldsAlreadyDefined(String),

    #[error("Object '{object}' cannot be single: {reason}")]
    SingleObject { object: String, reason: String },

    #[error("Unable to find object '{0}'")]
    ObjectNotFound(String),

    #[error("Unable to find action '{0}'")]
    ActionNotFound(String),

    #[error("Unable to find action '{action}' from object '{object}'")]
    ObjectActionNotFound { object: String, action: String },

    #[error("Unable to find object list '{0}'")]
    ListNotFound(String),

    #[error("Instance '{instance}' is not found in object '{object}'.")]
    InstanceNotFound { object: String, instance: String },

    #[error("Object is not selected. Use with_object or with_object_instance.")]
    NoObjectSelected,

    #[error("Unable to add '{0}' flags on itself.")]
    SelfReference(String),

    #[error("Unable to add '{0}' Action flag to itself.")]
    ActionSelfReference(String),

    #[error("Action '{0}' already defined.")]
    DuplicateAction(String),

    #[error("Object '{0}' already defined.")]
    DuplicateObject(String),

    #[error("Key '{0}' already exist.")]
    CaptureExists(String),

    #[error("Invalid syntax. square delimiter error in {0}.")]
    UnbalancedBrackets(String),

    #[error("'{field}' is not a valid object field (list template '{template}').")]
    UnknownListField { template: String, field: String },

    #[error("Invalid list template '{template}': {message}")]
    InvalidTemplate { template: String, message: String },

    #[error("Regexp error found in '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("'{value}' is not a valid element of the list '{list}'.")]
    InvalidListValue { list: String, value: String },

    #[error("Element '{value}' of the list '{list}' has no value for key field '{key}'.")]
    MissingListKey {
        list: String,
        value: String,
        key: String,
    },

    #[error("Value of '{object}/{key}/{field}' is not a {expected}.")]
    TypeMismatch {
        object: String,
        key: String,
        field: String,
        expected: String,
    },

    #[error("Unable to find '{0}' command.")]
    CommandNotFound(String),

    #[error("{0}")]
    Usage(String),

    /// Help or version was requested. Holds the rendered text.
    #[error("{0}")]
    Help(String),

    #[error("Schema did not stabilize after {0} context passes.")]
    SchemaUnstable(usize),

    #[error(transparent)]
    Hook(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    pub(crate) fn field_not_found(object: &str, field: &str) -> Self {
        Self::FieldNotFound {
            object: object.to_string(),
            field: field.to_string(),
        }
    }

    pub(crate) fn object_action_not_found(object: &str, action: &str) -> Self {
        Self::ObjectActionNotFound {
            object: object.to_string(),
            action: action.to_string(),
        }
    }
}
