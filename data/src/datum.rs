//! Element types supported by carve tensors.
use crate::internal::*;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum DatumType {
    Bool,
    U8,
    I32,
    I64,
    F16,
    F32,
}

impl DatumType {
    pub fn is_float(&self) -> bool {
        matches!(self, DatumType::F16 | DatumType::F32)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DatumType::U8 | DatumType::I32 | DatumType::I64)
    }

    pub fn is_number(&self) -> bool {
        *self != DatumType::Bool
    }

    pub fn size_of(&self) -> usize {
        dispatch_datum!(std::mem::size_of(self)())
    }

    /// Spelling of the type in IR `element_type` attributes.
    pub fn ir_element_type(&self) -> &'static str {
        match self {
            DatumType::Bool => "boolean",
            DatumType::U8 => "u8",
            DatumType::I32 => "i32",
            DatumType::I64 => "i64",
            DatumType::F16 => "f16",
            DatumType::F32 => "f32",
        }
    }

    /// Spelling of the type in IR port `precision` attributes.
    pub fn ir_precision(&self) -> &'static str {
        match self {
            DatumType::Bool => "BOOL",
            DatumType::U8 => "U8",
            DatumType::I32 => "I32",
            DatumType::I64 => "I64",
            DatumType::F16 => "FP16",
            DatumType::F32 => "FP32",
        }
    }
}

impl fmt::Display for DatumType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.ir_element_type())
    }
}

impl std::str::FromStr for DatumType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.to_ascii_lowercase() {
            "boolean" | "bool" => Ok(DatumType::Bool),
            "u8" => Ok(DatumType::U8),
            "i32" => Ok(DatumType::I32),
            "i64" => Ok(DatumType::I64),
            "f16" | "fp16" => Ok(DatumType::F16),
            "f32" | "fp32" => Ok(DatumType::F32),
            _ => anyhow::bail!("Unknown type {}", s),
        }
    }
}

pub trait Datum:
    Copy + Send + Sync + fmt::Debug + fmt::Display + Default + PartialEq + PartialOrd + 'static
{
    fn name() -> &'static str;
    fn datum_type() -> DatumType;

    /// Lossy conversion used by casts and approximate comparisons.
    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;

    #[doc(hidden)]
    fn into_storage(array: ArrayD<Self>) -> Storage;
    #[doc(hidden)]
    fn storage_view(storage: &Storage) -> Option<ArrayViewD<'_, Self>>;
    #[doc(hidden)]
    fn storage_view_mut(storage: &mut Storage) -> Option<ArrayViewMutD<'_, Self>>;
    #[doc(hidden)]
    fn from_storage(storage: Storage) -> Result<ArrayD<Self>, Storage>;
}

macro_rules! datum {
    ($t:ty, $v:ident, $to:expr, $from:expr) => {
        impl From<$t> for Tensor {
            fn from(it: $t) -> Tensor {
                tensor0(it)
            }
        }

        impl Datum for $t {
            fn name() -> &'static str {
                stringify!($t)
            }

            fn datum_type() -> DatumType {
                DatumType::$v
            }

            fn to_f64(self) -> f64 {
                ($to)(self)
            }

            fn from_f64(v: f64) -> Self {
                ($from)(v)
            }

            fn into_storage(array: ArrayD<Self>) -> Storage {
                Storage::$v(array)
            }

            fn storage_view(storage: &Storage) -> Option<ArrayViewD<'_, Self>> {
                if let Storage::$v(a) = storage { Some(a.view()) } else { None }
            }

            fn storage_view_mut(storage: &mut Storage) -> Option<ArrayViewMutD<'_, Self>> {
                if let Storage::$v(a) = storage { Some(a.view_mut()) } else { None }
            }

            fn from_storage(storage: Storage) -> Result<ArrayD<Self>, Storage> {
                if let Storage::$v(a) = storage { Ok(a) } else { Err(storage) }
            }
        }
    };
}

datum!(bool, Bool, |b: bool| if b { 1.0 } else { 0.0 }, |v: f64| v != 0.0);
datum!(u8, U8, |x: u8| x as f64, |v: f64| v as u8);
datum!(i32, I32, |x: i32| x as f64, |v: f64| v as i32);
datum!(i64, I64, |x: i64| x as f64, |v: f64| v as i64);
datum!(f16, F16, |x: f16| x.to_f64(), f16::from_f64);
datum!(f32, F32, |x: f32| x as f64, |v: f64| v as f32);

#[cfg(test)]
mod tests {
    use crate::internal::*;
    use ndarray::arr1;

    #[test]
    fn test_array_to_tensor_to_array() {
        let array = arr1(&[12i32, 42]);
        let tensor = Tensor::from(array.clone().into_dyn());
        let view = tensor.to_array_view::<i32>().unwrap();
        assert_eq!(array, view.into_dimensionality().unwrap());
    }

    #[test]
    fn test_parse_ir_spellings() {
        assert_eq!("FP32".parse::<DatumType>().unwrap(), DatumType::F32);
        assert_eq!("f16".parse::<DatumType>().unwrap(), DatumType::F16);
        assert_eq!("boolean".parse::<DatumType>().unwrap(), DatumType::Bool);
        assert!("bf16".parse::<DatumType>().is_err());
    }

    #[test]
    fn test_size_of() {
        assert_eq!(DatumType::F16.size_of(), 2);
        assert_eq!(DatumType::I64.size_of(), 8);
        assert_eq!(DatumType::Bool.size_of(), 1);
    }
}
