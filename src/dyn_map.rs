//! Dynamically-typed table facade.
//!
//! Callers that only know element types at run time (scalars and typed
//! arrays) go through `DynHashMap`. The element types are checked once per
//! call against the table's declared types; the work itself then runs on the
//! monomorphized `SharedHashMap<K, V>` underneath.
//!
//! A map created with [`DynHashMap::untyped`] has no types yet. Its first
//! `set` fixes them from the arguments; every other operation on it fails
//! with `InvalidOperationOnUntyped`.

use crate::array::{expect_scalar, expect_slice, take_scalar, Element, Scalar, TypedArray};
use crate::builder::build_position_map;
use crate::error::{Error, Result};
use crate::indexer::get_indexer;
use crate::shared_map::SharedHashMap;
use crate::types::{ElemType, MapKey, MapValue};

pub type ScalarIter = Box<dyn Iterator<Item = Scalar>>;
pub type ScalarPairIter = Box<dyn Iterator<Item = (Scalar, Scalar)>>;

macro_rules! variants {
    ($($variant:ident: $k:ty => $v:ty),* $(,)?) => {
        /// A shared table whose key and value types are known at run time.
        ///
        /// Cloning shares the underlying table, like cloning the typed handle.
        #[derive(Clone, Debug, Default)]
        pub enum DynHashMap {
            #[default]
            Untyped,
            $($variant(SharedHashMap<$k, $v>),)*
        }

        $(
            impl From<SharedHashMap<$k, $v>> for DynHashMap {
                fn from(m: SharedHashMap<$k, $v>) -> Self {
                    DynHashMap::$variant(m)
                }
            }

            impl<'a> TryFrom<&'a DynHashMap> for &'a SharedHashMap<$k, $v> {
                type Error = Error;

                fn try_from(m: &'a DynHashMap) -> Result<Self> {
                    match m {
                        DynHashMap::$variant(t) => Ok(t),
                        other => Err(other.incompatible(
                            <$k as Element>::ELEM_TYPE,
                            <$v as Element>::ELEM_TYPE,
                            "as_typed",
                        )),
                    }
                }
            }
        )*

        impl DynHashMap {
            fn update_same(&self, other: &Self) -> Option<Result<()>> {
                match (self, other) {
                    $((DynHashMap::$variant(a), DynHashMap::$variant(b)) => Some(a.update(b)),)*
                    _ => None,
                }
            }
        }
    };
}

variants! {
    I32ToI32: i32 => i32,
    I32ToI64: i32 => i64,
    I32ToF32: i32 => f32,
    I32ToF64: i32 => f64,
    I64ToI32: i64 => i32,
    I64ToI64: i64 => i64,
    I64ToF32: i64 => f32,
    I64ToF64: i64 => f64,
    StrToI32: String => i32,
    StrToI64: String => i64,
    StrToF32: String => f32,
    StrToF64: String => f64,
}

/// Run `$body` against the typed table inside `$map`, or evaluate
/// `$untyped` when there is none.
macro_rules! dispatch {
    ($map:expr, $untyped:expr, |$m:ident| $body:expr) => {
        match $map {
            DynHashMap::Untyped => $untyped,
            DynHashMap::I32ToI32($m) => $body,
            DynHashMap::I32ToI64($m) => $body,
            DynHashMap::I32ToF32($m) => $body,
            DynHashMap::I32ToF64($m) => $body,
            DynHashMap::I64ToI32($m) => $body,
            DynHashMap::I64ToI64($m) => $body,
            DynHashMap::I64ToF32($m) => $body,
            DynHashMap::I64ToF64($m) => $body,
            DynHashMap::StrToI32($m) => $body,
            DynHashMap::StrToI64($m) => $body,
            DynHashMap::StrToF32($m) => $body,
            DynHashMap::StrToF64($m) => $body,
        }
    };
}

/// Evaluate `$body` with `$k`/`$v` bound to the Rust types for the given
/// element types.
macro_rules! with_types {
    ($key:expr, $value:expr, |$k:ident, $v:ident| $body:expr) => {
        match ($key, $value) {
            (ElemType::Int32, ElemType::Int32) => { type $k = i32; type $v = i32; $body }
            (ElemType::Int32, ElemType::Int64) => { type $k = i32; type $v = i64; $body }
            (ElemType::Int32, ElemType::Float32) => { type $k = i32; type $v = f32; $body }
            (ElemType::Int32, ElemType::Float64) => { type $k = i32; type $v = f64; $body }
            (ElemType::Int64, ElemType::Int32) => { type $k = i64; type $v = i32; $body }
            (ElemType::Int64, ElemType::Int64) => { type $k = i64; type $v = i64; $body }
            (ElemType::Int64, ElemType::Float32) => { type $k = i64; type $v = f32; $body }
            (ElemType::Int64, ElemType::Float64) => { type $k = i64; type $v = f64; $body }
            (ElemType::Str, ElemType::Int32) => { type $k = String; type $v = i32; $body }
            (ElemType::Str, ElemType::Int64) => { type $k = String; type $v = i64; $body }
            (ElemType::Str, ElemType::Float32) => { type $k = String; type $v = f32; $body }
            (ElemType::Str, ElemType::Float64) => { type $k = String; type $v = f64; $body }
            (k, v) => Err(unsupported_pair(k, v)),
        }
    };
}

fn unsupported_pair(key: ElemType, value: ElemType) -> Error {
    if key.key_type().is_none() {
        return Error::UnsupportedKeyType {
            key_type: key.into(),
        };
    }
    Error::TypeMismatch {
        expected: "numeric value",
        found: value.into(),
    }
}

fn untyped(operation: &'static str) -> Error {
    Error::InvalidOperationOnUntyped { operation }
}

impl DynHashMap {
    /// A map whose types are fixed by its first `set`.
    pub fn untyped() -> Self {
        DynHashMap::Untyped
    }

    /// An empty table with the given key and value element types.
    pub fn empty(key: ElemType, value: ElemType) -> Result<Self> {
        with_types!(key, value, |K, V| Ok(SharedHashMap::<K, V>::empty().into()))
    }

    /// Build from aligned key and value arrays; a repeated key keeps its
    /// last value.
    pub fn from_arrays(keys: &TypedArray, values: &TypedArray) -> Result<Self> {
        with_types!(keys.elem_type(), values.elem_type(), |K, V| {
            let (ks, vs) = (expect_slice::<K>(keys)?, expect_slice::<V>(values)?);
            Ok(SharedHashMap::<K, V>::from_arrays(ks, vs)?.into())
        })
    }

    /// Map every key to `value`.
    pub fn from_keys(keys: &TypedArray, value: &Scalar) -> Result<Self> {
        with_types!(keys.elem_type(), value.elem_type(), |K, V| {
            let ks = expect_slice::<K>(keys)?;
            let v = expect_scalar::<V>(value)?;
            Ok(SharedHashMap::<K, V>::from_keys(ks, v.clone())?.into())
        })
    }

    /// Position map of `keys`: each distinct key to its last index.
    pub fn build_position_map(keys: &TypedArray) -> Result<Self> {
        match keys {
            TypedArray::Int32(ks) => Ok(build_position_map(ks)?.into()),
            TypedArray::Int64(ks) => Ok(build_position_map(ks)?.into()),
            TypedArray::Str(ks) => Ok(build_position_map(ks)?.into()),
            other => Err(Error::UnsupportedKeyType {
                key_type: other.elem_type().into(),
            }),
        }
    }

    pub fn is_typed(&self) -> bool {
        !matches!(self, DynHashMap::Untyped)
    }

    /// Declared key element type; `None` while untyped.
    pub fn key_type(&self) -> Option<ElemType> {
        dispatch!(self, None, |m| Some(key_elem(m)))
    }

    /// Declared value element type; `None` while untyped.
    pub fn value_type(&self) -> Option<ElemType> {
        dispatch!(self, None, |m| Some(value_elem(m)))
    }

    pub fn get(&self, key: &Scalar, default: &Scalar) -> Result<Scalar> {
        dispatch!(self, Err(untyped("get")), |m| get_scalar(m, key, default))
    }

    pub fn contains(&self, key: &Scalar) -> Result<bool> {
        dispatch!(self, Err(untyped("contains")), |m| contains_scalar(m, key))
    }

    /// Insert or overwrite, returning the previous value. On an untyped map
    /// this first fixes the key and value types from `key` and `value`.
    pub fn set(&mut self, key: Scalar, value: Scalar) -> Result<Option<Scalar>> {
        if let DynHashMap::Untyped = self {
            *self = Self::empty(key.elem_type(), value.elem_type())?;
        }
        dispatch!(&*self, Err(untyped("set")), |m| set_scalar(m, key, value))
    }

    pub fn len(&self) -> Result<usize> {
        dispatch!(self, Err(untyped("len")), |m| Ok(m.len()))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn pop(&self, key: &Scalar) -> Result<Option<Scalar>> {
        dispatch!(self, Err(untyped("pop")), |m| pop_scalar(m, key))
    }

    pub fn clear(&self) -> Result<()> {
        dispatch!(self, Err(untyped("clear")), |m| m.clear())
    }

    /// Copy every entry of `other` into this table. Both maps must have the
    /// same key and value types.
    pub fn update(&self, other: &DynHashMap) -> Result<()> {
        if let Some(done) = self.update_same(other) {
            return done;
        }
        match (self.key_type(), self.value_type()) {
            (Some(k), Some(v)) => Err(other.incompatible(k, v, "update")),
            _ => Err(untyped("update")),
        }
    }

    pub fn keys(&self) -> Result<ScalarIter> {
        dispatch!(self, Err(untyped("keys")), |m| Ok(Box::new(m.keys().map(Element::into_scalar)) as ScalarIter))
    }

    pub fn values(&self) -> Result<ScalarIter> {
        dispatch!(self, Err(untyped("values")), |m| Ok(Box::new(m.values().map(Element::into_scalar)) as ScalarIter))
    }

    pub fn items(&self) -> Result<ScalarPairIter> {
        dispatch!(self, Err(untyped("items")), |m| Ok(Box::new(
            m.items().map(|(k, v)| (k.into_scalar(), v.into_scalar()))
        ) as ScalarPairIter))
    }

    /// Positions of every `query` element. Only tables with `int64` values
    /// hold positions.
    pub fn get_indexer(&self, query: &TypedArray) -> Result<Vec<i64>> {
        match self {
            DynHashMap::I32ToI64(m) => get_indexer(m, expect_slice(query)?),
            DynHashMap::I64ToI64(m) => get_indexer(m, expect_slice(query)?),
            DynHashMap::StrToI64(m) => get_indexer(m, expect_slice(query)?),
            DynHashMap::Untyped => Err(untyped("get_indexer")),
            other => Err(Error::TypeMismatch {
                expected: ElemType::Int64.into(),
                found: other.value_type().map_or("untyped", Into::into),
            }),
        }
    }

    /// Live holders of the underlying table.
    pub fn ref_count(&self) -> Result<usize> {
        dispatch!(self, Err(untyped("ref_count")), |m| Ok(m.ref_count()))
    }

    /// Error for using this map where a `(key, value)` table is required.
    fn incompatible(&self, key: ElemType, value: ElemType, operation: &'static str) -> Error {
        match (self.key_type(), self.value_type()) {
            (Some(k), _) if k != key => Error::TypeMismatch {
                expected: key.into(),
                found: k.into(),
            },
            (Some(_), Some(v)) => Error::TypeMismatch {
                expected: value.into(),
                found: v.into(),
            },
            _ => untyped(operation),
        }
    }
}

fn key_elem<K: MapKey + Element, V: MapValue>(_: &SharedHashMap<K, V>) -> ElemType {
    K::ELEM_TYPE
}

fn value_elem<K: MapKey, V: MapValue + Element>(_: &SharedHashMap<K, V>) -> ElemType {
    V::ELEM_TYPE
}

fn get_scalar<K, V>(m: &SharedHashMap<K, V>, key: &Scalar, default: &Scalar) -> Result<Scalar>
where
    K: MapKey + Element,
    V: MapValue + Element,
{
    let k = expect_scalar::<K>(key)?;
    let d = expect_scalar::<V>(default)?;
    Ok(m.get(k, d.clone()).into_scalar())
}

fn contains_scalar<K, V>(m: &SharedHashMap<K, V>, key: &Scalar) -> Result<bool>
where
    K: MapKey + Element,
    V: MapValue,
{
    Ok(m.contains(expect_scalar::<K>(key)?))
}

fn set_scalar<K, V>(m: &SharedHashMap<K, V>, key: Scalar, value: Scalar) -> Result<Option<Scalar>>
where
    K: MapKey + Element,
    V: MapValue + Element,
{
    let k = take_scalar::<K>(key)?;
    let v = take_scalar::<V>(value)?;
    Ok(m.set(k, v)?.map(V::into_scalar))
}

fn pop_scalar<K, V>(m: &SharedHashMap<K, V>, key: &Scalar) -> Result<Option<Scalar>>
where
    K: MapKey + Element,
    V: MapValue + Element,
{
    let k = expect_scalar::<K>(key)?;
    Ok(m.pop(k)?.map(V::into_scalar))
}
