//! Static table of specialized entry points.
//!
//! Every `(key type, value type)` pair the crate specializes gets a
//! `Specialization` naming its operations, so that an external layer can
//! select an entry point per call site without dispatching at run time. The
//! registry is populated once on first use and never changes afterwards.

use crate::error::{Error, Result};
use crate::types::{KeyType, ValueType};
use hashbrown::HashMap;
use once_cell::sync::Lazy;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

/// Operations every specialization provides.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Create,
    Size,
    Set,
    Contains,
    Lookup,
    Clear,
    Pop,
    Update,
    GetIter,
    IterNext,
    /// Bulk construction from key/value arrays; numeric values only.
    CreateFromData,
}

#[derive(Debug)]
pub struct Specialization {
    pub key_type: KeyType,
    pub value_type: ValueType,
    symbols: HashMap<Operation, String>,
}

impl Specialization {
    fn new(key_type: KeyType, value_type: ValueType) -> Self {
        let bulk = key_type != KeyType::Generic && value_type != ValueType::Generic;
        let symbols = Operation::iter()
            .filter(|op| bulk || *op != Operation::CreateFromData)
            .map(|op| {
                let name = format!("hashmap_{}_{}_to_{}", op, key_type, value_type);
                (op, name)
            })
            .collect();
        Self {
            key_type,
            value_type,
            symbols,
        }
    }

    /// Entry point name for `op`, if this specialization provides it.
    pub fn symbol(&self, op: Operation) -> Option<&str> {
        self.symbols.get(&op).map(String::as_str)
    }

    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        self.symbols.keys().copied()
    }
}

pub struct Registry {
    by_types: HashMap<(KeyType, ValueType), Specialization>,
    position_builders: HashMap<KeyType, String>,
}

impl Registry {
    fn populate() -> Self {
        let mut by_types = HashMap::new();
        for k in KeyType::iter() {
            for v in ValueType::iter() {
                by_types.insert((k, v), Specialization::new(k, v));
            }
        }
        let position_builders = KeyType::iter()
            .filter(|k| *k != KeyType::Generic)
            .map(|k| (k, format!("hashmap_build_map_positions_{}", k)))
            .collect();
        Self {
            by_types,
            position_builders,
        }
    }

    pub fn specialization(&self, key: KeyType, value: ValueType) -> Result<&Specialization> {
        self.by_types
            .get(&(key, value))
            .ok_or(Error::UnsupportedKeyType {
                key_type: key.into(),
            })
    }

    pub fn position_builder(&self, key: KeyType) -> Result<&str> {
        self.position_builders
            .get(&key)
            .map(String::as_str)
            .ok_or(Error::UnsupportedKeyType {
                key_type: key.into(),
            })
    }

    pub fn len(&self) -> usize {
        self.by_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_types.is_empty()
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::populate);

pub fn registry() -> &'static Registry {
    &REGISTRY
}

pub fn specialization(key: KeyType, value: ValueType) -> Result<&'static Specialization> {
    registry().specialization(key, value)
}

/// Name of the bulk position builder for `key`.
pub fn position_builder(key: KeyType) -> Result<&'static str> {
    registry().position_builder(key)
}

/// Whether `key` has a bulk position builder.
pub fn is_specialized(key: KeyType) -> bool {
    registry().position_builder(key).is_ok()
}
