//! Typed cell arrays carried as block payloads.
//!
//! Readers hand over one named cell array per block; its element type is one
//! of the fixed-width scalars in [`ScalarType`]. Copy kernels are written once
//! against the [`Scalar`] trait and dispatched per element type with
//! [`dispatch_scalar!`](crate::dispatch_scalar).

use bytemuck::Pod;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Element type of a cell array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    U8,
    I8,
    I16,
    I32,
    F32,
    F64,
}

impl ScalarType {
    /// Width of one element in bytes.
    pub fn size_of(self) -> usize {
        match self {
            ScalarType::U8 | ScalarType::I8 => 1,
            ScalarType::I16 => 2,
            ScalarType::I32 | ScalarType::F32 => 4,
            ScalarType::F64 => 8,
        }
    }

    /// Stable code used on the wire.
    pub fn code(self) -> u64 {
        match self {
            ScalarType::U8 => 1,
            ScalarType::I8 => 2,
            ScalarType::I16 => 3,
            ScalarType::I32 => 4,
            ScalarType::F32 => 5,
            ScalarType::F64 => 6,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(ScalarType::U8),
            2 => Some(ScalarType::I8),
            3 => Some(ScalarType::I16),
            4 => Some(ScalarType::I32),
            5 => Some(ScalarType::F32),
            6 => Some(ScalarType::F64),
            _ => None,
        }
    }
}

/// A fixed-width element that can live in a [`ScalarArray`].
pub trait Scalar: Pod + Zero + PartialEq + Debug + Send + Sync + 'static {
    const TYPE: ScalarType;

    fn slice(array: &ScalarArray) -> Option<&[Self]>;
    fn slice_mut(array: &mut ScalarArray) -> Option<&mut [Self]>;
    fn wrap(values: Vec<Self>) -> ScalarArray;
}

/// Dense cell array of one element type, x fastest.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarArray {
    U8(Vec<u8>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! impl_scalar {
    ($t:ty, $variant:ident) => {
        impl Scalar for $t {
            const TYPE: ScalarType = ScalarType::$variant;

            #[inline]
            fn slice(array: &ScalarArray) -> Option<&[Self]> {
                match array {
                    ScalarArray::$variant(v) => Some(v),
                    _ => None,
                }
            }

            #[inline]
            fn slice_mut(array: &mut ScalarArray) -> Option<&mut [Self]> {
                match array {
                    ScalarArray::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn wrap(values: Vec<Self>) -> ScalarArray {
                ScalarArray::$variant(values)
            }
        }

        impl From<Vec<$t>> for ScalarArray {
            fn from(values: Vec<$t>) -> Self {
                ScalarArray::$variant(values)
            }
        }
    };
}

impl_scalar!(u8, U8);
impl_scalar!(i8, I8);
impl_scalar!(i16, I16);
impl_scalar!(i32, I32);
impl_scalar!(f32, F32);
impl_scalar!(f64, F64);

/// Run `$body` with `$T` bound to the Rust type of a [`ScalarType`].
#[macro_export]
macro_rules! dispatch_scalar {
    ($ty:expr, $T:ident => $body:expr) => {
        match $ty {
            $crate::data::scalar::ScalarType::U8 => {
                type $T = u8;
                $body
            }
            $crate::data::scalar::ScalarType::I8 => {
                type $T = i8;
                $body
            }
            $crate::data::scalar::ScalarType::I16 => {
                type $T = i16;
                $body
            }
            $crate::data::scalar::ScalarType::I32 => {
                type $T = i32;
                $body
            }
            $crate::data::scalar::ScalarType::F32 => {
                type $T = f32;
                $body
            }
            $crate::data::scalar::ScalarType::F64 => {
                type $T = f64;
                $body
            }
        }
    };
}

impl ScalarArray {
    /// A zero-filled array of `len` elements.
    pub fn zeros(ty: ScalarType, len: usize) -> Self {
        dispatch_scalar!(ty, T => T::wrap(vec![T::zero(); len]))
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ScalarArray::U8(_) => ScalarType::U8,
            ScalarArray::I8(_) => ScalarType::I8,
            ScalarArray::I16(_) => ScalarType::I16,
            ScalarArray::I32(_) => ScalarType::I32,
            ScalarArray::F32(_) => ScalarType::F32,
            ScalarArray::F64(_) => ScalarType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ScalarArray::U8(v) => v.len(),
            ScalarArray::I8(v) => v.len(),
            ScalarArray::I16(v) => v.len(),
            ScalarArray::I32(v) => v.len(),
            ScalarArray::F32(v) => v.len(),
            ScalarArray::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the values as `T`, or `None` if the element type differs.
    pub fn as_slice<T: Scalar>(&self) -> Option<&[T]> {
        T::slice(self)
    }

    pub fn as_mut_slice<T: Scalar>(&mut self) -> Option<&mut [T]> {
        T::slice_mut(self)
    }

    /// Raw native-endian bytes of the array.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ScalarArray::U8(v) => bytemuck::cast_slice(v),
            ScalarArray::I8(v) => bytemuck::cast_slice(v),
            ScalarArray::I16(v) => bytemuck::cast_slice(v),
            ScalarArray::I32(v) => bytemuck::cast_slice(v),
            ScalarArray::F32(v) => bytemuck::cast_slice(v),
            ScalarArray::F64(v) => bytemuck::cast_slice(v),
        }
    }
}
