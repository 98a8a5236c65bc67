use thiserror::Error;

/// Errors raised while loading a parse tree from JSON.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parse tree node is not a JSON object")]
    NotAnObject,

    #[error("parse tree node has no `type` field")]
    MissingType,

    #[error("malformed {type_name} node: {source}")]
    Shape {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a Program at the root, found {0}")]
    NotAProgram(String),
}
