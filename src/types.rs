//! Key and value type descriptors and the traits that bind Rust types to them.
//!
//! Specialization is resolved at compile time: a `SharedHashMap<K, V>` is
//! monomorphized per `(K, V)`, and `K::BuildHasher` picks the hashing
//! strategy once per table. The enums below describe those types at run time
//! for the specialization registry and the dynamically-typed facade.

use core::hash::{BuildHasher, Hash};
use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

/// Key types with a table specialization.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display, IntoStaticStr, EnumIter, EnumCount)]
#[strum(serialize_all = "lowercase")]
pub enum KeyType {
    Int32,
    Int64,
    Str,
    /// Any other `Eq + Hash` key, wrapped in [`Generic`]. Slower path: no
    /// bulk position builder.
    Generic,
}

/// Value types a table can be declared with.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display, IntoStaticStr, EnumIter, EnumCount)]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
    Int32,
    Int64,
    Float32,
    Float64,
    Generic,
}

/// Element types of typed arrays and scalars crossing the dynamic boundary.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display, IntoStaticStr, EnumIter, EnumCount)]
#[strum(serialize_all = "lowercase")]
pub enum ElemType {
    Int32,
    Int64,
    Float32,
    Float64,
    Str,
}

impl ElemType {
    /// The key type this element type maps to, if keys of it are supported.
    pub fn key_type(self) -> Option<KeyType> {
        match self {
            ElemType::Int32 => Some(KeyType::Int32),
            ElemType::Int64 => Some(KeyType::Int64),
            ElemType::Str => Some(KeyType::Str),
            ElemType::Float32 | ElemType::Float64 => None,
        }
    }

    /// The value type this element type maps to, if values of it are supported.
    pub fn value_type(self) -> Option<ValueType> {
        match self {
            ElemType::Int32 => Some(ValueType::Int32),
            ElemType::Int64 => Some(ValueType::Int64),
            ElemType::Float32 => Some(ValueType::Float32),
            ElemType::Float64 => Some(ValueType::Float64),
            ElemType::Str => None,
        }
    }
}

/// A type usable as a table key.
///
/// Implemented for `i32`, `i64` and `String` (the specialized set) and for
/// [`Generic<T>`] (the fallback).
pub trait MapKey: Eq + Hash + Clone + Send + Sync + 'static {
    const KEY_TYPE: KeyType;
    type BuildHasher: BuildHasher + Clone + Default + Send + Sync + 'static;
}

/// A type usable as a table value.
pub trait MapValue: Clone + Send + Sync + 'static {
    const VALUE_TYPE: ValueType;
}

impl MapKey for i32 {
    const KEY_TYPE: KeyType = KeyType::Int32;
    type BuildHasher = rustc_hash::FxBuildHasher;
}

impl MapKey for i64 {
    const KEY_TYPE: KeyType = KeyType::Int64;
    type BuildHasher = rustc_hash::FxBuildHasher;
}

impl MapKey for String {
    const KEY_TYPE: KeyType = KeyType::Str;
    type BuildHasher = ahash::RandomState;
}

impl MapValue for i32 {
    const VALUE_TYPE: ValueType = ValueType::Int32;
}

impl MapValue for i64 {
    const VALUE_TYPE: ValueType = ValueType::Int64;
}

impl MapValue for f32 {
    const VALUE_TYPE: ValueType = ValueType::Float32;
}

impl MapValue for f64 {
    const VALUE_TYPE: ValueType = ValueType::Float64;
}

/// Wrapper routing an arbitrary type through the generic fallback.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Generic<T>(pub T);

impl<T> MapKey for Generic<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    const KEY_TYPE: KeyType = KeyType::Generic;
    type BuildHasher = ahash::RandomState;
}

impl<T> MapValue for Generic<T>
where
    T: Clone + Send + Sync + 'static,
{
    const VALUE_TYPE: ValueType = ValueType::Generic;
}
