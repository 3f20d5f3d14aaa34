//! # Error Types
//!
//! Contract violations that can be detected before any storage is touched.
//!
//! Stale handles are NOT reported here: using a destroyed entity or
//! component is undefined by contract and at best panics.

use thiserror::Error;

/// Errors reported by schema registration, entity creation, migration and
/// queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A component name or type was registered twice.
    #[error("component `{0}` is already registered")]
    DuplicateComponentName(String),

    /// A schema name was registered twice.
    #[error("schema `{0}` is already registered")]
    DuplicateSchema(String),

    /// A component name was not found in the registry.
    #[error("unknown component `{0}`")]
    UnknownComponent(String),

    /// A schema name or id was not found in the registry.
    #[error("unknown schema `{0}`")]
    UnknownSchema(String),

    /// A Rust type was used as a component without being registered.
    #[error("component type `{0}` is not registered")]
    UnregisteredComponent(&'static str),

    /// The registry ran out of ids.
    #[error("too many {kind}: at most {max} can be registered")]
    CapacityExceeded {
        /// What ran out (`"components"` or `"schemas"`).
        kind: &'static str,
        /// The hard limit.
        max: usize,
    },

    /// A schema declared neither components nor bases.
    #[error("schema `{0}` declares no components and no bases")]
    EmptySchema(String),

    /// The same component was supplied or requested twice.
    #[error("component `{component}` given more than once")]
    DuplicateComponent {
        /// Registered component name.
        component: String,
    },

    /// A component was supplied or requested that the schema does not carry.
    #[error("component `{component}` is not part of schema `{schema}`")]
    ForeignComponent {
        /// Registered component name.
        component: String,
        /// Schema name.
        schema: String,
    },

    /// Migration between schemas that share neither identity nor a base.
    #[error("no declared relationship between schema `{from}` and schema `{to}`")]
    UnrelatedSchemas {
        /// Current root schema of the entity.
        from: String,
        /// Requested schema.
        to: String,
    },

    /// Invalid configuration or layout file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] toml::de::Error),
}

/// Result type for storage-engine operations.
pub type EcsResult<T> = Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EcsError::ForeignComponent {
            component: "Physics".to_string(),
            schema: "Renderable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "component `Physics` is not part of schema `Renderable`"
        );

        let err = EcsError::CapacityExceeded {
            kind: "schemas",
            max: 64,
        };
        assert_eq!(err.to_string(), "too many schemas: at most 64 can be registered");
    }
}
