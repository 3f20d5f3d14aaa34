//! # Configuration
//!
//! Startup data loaded from TOML: table capacities for a world and the
//! declarative schema layout.
//!
//! ```toml
//! entity_capacity = 1024
//! component_capacity = 4096
//! ```
//!
//! ```toml
//! [[schema]]
//! name = "Renderable"
//! components = ["Render", "Position"]
//!
//! [[schema]]
//! name = "BasicCharacter"
//! bases = ["Renderable", "Movable"]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::EcsResult;

/// Default initial capacity of every table.
pub const DEFAULT_CAPACITY: usize = 256;

/// Initial capacities used to pre-reserve every slot map of a world.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Records reserved per schema table.
    pub entity_capacity: usize,
    /// Values reserved per component column.
    pub component_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: DEFAULT_CAPACITY,
            component_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl WorldConfig {
    /// Parses a config; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`](crate::EcsError::InvalidConfig) on malformed TOML or wrong value types.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        Ok(toml::from_str(source)?)
    }
}

/// One `[[schema]]` entry of a layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDecl {
    /// Schema name.
    pub name: String,
    /// Registered names of the components the schema owns directly.
    #[serde(default)]
    pub components: Vec<String>,
    /// Names of base schemas declared earlier in the layout (or registered
    /// before it).
    #[serde(default)]
    pub bases: Vec<String>,
}

/// Declarative list of schemas, registered in file order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaLayout {
    /// Declarations in registration order.
    #[serde(rename = "schema", default)]
    pub schemas: Vec<SchemaDecl>,
}

impl SchemaLayout {
    /// Parses a layout.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`](crate::EcsError::InvalidConfig) on malformed TOML or a schema without a
    /// name.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        Ok(toml::from_str(source)?)
    }
}
