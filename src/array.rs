//! Scalars and typed arrays crossing the dynamically-typed boundary.

use crate::error::{Error, Result};
use crate::types::ElemType;

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(String),
}

impl Scalar {
    pub fn elem_type(&self) -> ElemType {
        match self {
            Scalar::Int32(_) => ElemType::Int32,
            Scalar::Int64(_) => ElemType::Int64,
            Scalar::Float32(_) => ElemType::Float32,
            Scalar::Float64(_) => ElemType::Float64,
            Scalar::Str(_) => ElemType::Str,
        }
    }
}

/// Fixed-length, contiguous, element-typed sequence.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedArray {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Str(Vec<String>),
}

impl TypedArray {
    pub fn elem_type(&self) -> ElemType {
        match self {
            TypedArray::Int32(_) => ElemType::Int32,
            TypedArray::Int64(_) => ElemType::Int64,
            TypedArray::Float32(_) => ElemType::Float32,
            TypedArray::Float64(_) => ElemType::Float64,
            TypedArray::Str(_) => ElemType::Str,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedArray::Int32(v) => v.len(),
            TypedArray::Int64(v) => v.len(),
            TypedArray::Float32(v) => v.len(),
            TypedArray::Float64(v) => v.len(),
            TypedArray::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `i` as a scalar.
    pub fn get(&self, i: usize) -> Option<Scalar> {
        match self {
            TypedArray::Int32(v) => v.get(i).map(|x| Scalar::Int32(*x)),
            TypedArray::Int64(v) => v.get(i).map(|x| Scalar::Int64(*x)),
            TypedArray::Float32(v) => v.get(i).map(|x| Scalar::Float32(*x)),
            TypedArray::Float64(v) => v.get(i).map(|x| Scalar::Float64(*x)),
            TypedArray::Str(v) => v.get(i).map(|x| Scalar::Str(x.clone())),
        }
    }
}

/// Rust types that can be read out of scalars and typed arrays.
pub trait Element: Sized + Clone + 'static {
    const ELEM_TYPE: ElemType;

    fn scalar_ref(s: &Scalar) -> Option<&Self>;
    fn from_scalar(s: Scalar) -> Option<Self>;
    fn into_scalar(self) -> Scalar;
    fn slice(a: &TypedArray) -> Option<&[Self]>;
}

macro_rules! element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            const ELEM_TYPE: ElemType = ElemType::$variant;

            #[inline]
            fn scalar_ref(s: &Scalar) -> Option<&Self> {
                match s {
                    Scalar::$variant(x) => Some(x),
                    _ => None,
                }
            }

            #[inline]
            fn from_scalar(s: Scalar) -> Option<Self> {
                match s {
                    Scalar::$variant(x) => Some(x),
                    _ => None,
                }
            }

            #[inline]
            fn into_scalar(self) -> Scalar {
                Scalar::$variant(self)
            }

            #[inline]
            fn slice(a: &TypedArray) -> Option<&[Self]> {
                match a {
                    TypedArray::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl From<$t> for Scalar {
            fn from(x: $t) -> Self {
                Scalar::$variant(x)
            }
        }

        impl From<Vec<$t>> for TypedArray {
            fn from(v: Vec<$t>) -> Self {
                TypedArray::$variant(v)
            }
        }
    };
}

element!(i32, Int32);
element!(i64, Int64);
element!(f32, Float32);
element!(f64, Float64);
element!(String, Str);

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

fn mismatch<T: Element>(found: ElemType) -> Error {
    Error::TypeMismatch {
        expected: T::ELEM_TYPE.into(),
        found: found.into(),
    }
}

/// Borrow `s` as a `T`, or fail with `TypeMismatch`.
pub fn expect_scalar<T: Element>(s: &Scalar) -> Result<&T> {
    T::scalar_ref(s).ok_or_else(|| mismatch::<T>(s.elem_type()))
}

/// Take `s` as a `T`, or fail with `TypeMismatch`.
pub fn take_scalar<T: Element>(s: Scalar) -> Result<T> {
    let found = s.elem_type();
    T::from_scalar(s).ok_or_else(|| mismatch::<T>(found))
}

/// View `a` as a slice of `T`, or fail with `TypeMismatch`. Checked once per
/// array, so loops over the slice run without per-element checks.
pub fn expect_slice<T: Element>(a: &TypedArray) -> Result<&[T]> {
    T::slice(a).ok_or_else(|| mismatch::<T>(a.elem_type()))
}
