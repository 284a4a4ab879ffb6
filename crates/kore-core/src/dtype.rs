use std::fmt;

use half::{bf16, f16};

/// Element data types a Kore tensor can hold.
///
/// The discriminants are stable and small (< 2^8) because kernel signatures
/// pack them into a single hash word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DType {
    /// Boolean, stored one byte per element (0 or 1)
    Bool = 0,
    /// 8-bit signed integer
    I8 = 1,
    /// 8-bit unsigned integer
    U8 = 2,
    /// 16-bit signed integer
    I16 = 3,
    /// 32-bit signed integer
    I32 = 4,
    /// 64-bit signed integer
    I64 = 5,
    /// 16-bit IEEE 754 half-precision float
    F16 = 6,
    /// 16-bit Brain Float
    BF16 = 7,
    /// 32-bit IEEE 754 single-precision float
    F32 = 8,
    /// 64-bit IEEE 754 double-precision float
    F64 = 9,
}

impl DType {
    /// Every dtype, in ordinal order.
    pub const ALL: [DType; 10] = [
        DType::Bool,
        DType::I8,
        DType::U8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::F16,
        DType::BF16,
        DType::F32,
        DType::F64,
    ];

    /// Stable ordinal used in serialized descriptors and kernel hashing.
    pub fn proto_id(&self) -> u8 {
        *self as u8
    }

    /// Inverse of [`DType::proto_id`].
    pub fn from_proto_id(id: u8) -> Option<DType> {
        Self::ALL.get(id as usize).copied()
    }

    /// Size in bytes of a single element.
    pub fn element_size(&self) -> usize {
        match self {
            DType::Bool | DType::I8 | DType::U8 => 1,
            DType::I16 | DType::F16 | DType::BF16 => 2,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    /// Number of bytes needed to store `n` elements of this dtype.
    pub fn storage_bytes(&self, n: usize) -> usize {
        self.element_size() * n
    }

    /// Whether this dtype is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
    }

    /// Whether this dtype is an integer type.
    pub fn is_integer(&self) -> bool {
        matches!(self, DType::I8 | DType::U8 | DType::I16 | DType::I32 | DType::I64)
    }

    /// Decode one native-endian element into an `f64`.
    ///
    /// `bytes` must be exactly `element_size()` long.
    pub(crate) fn read_f64(&self, bytes: &[u8]) -> f64 {
        match self {
            DType::Bool => (bytes[0] != 0) as u8 as f64,
            DType::I8 => bytes[0] as i8 as f64,
            DType::U8 => bytes[0] as f64,
            DType::I16 => i16::from_ne_bytes([bytes[0], bytes[1]]) as f64,
            DType::I32 => i32::from_ne_bytes(take(bytes)) as f64,
            DType::I64 => i64::from_ne_bytes(take(bytes)) as f64,
            DType::F16 => f16::from_ne_bytes([bytes[0], bytes[1]]).to_f64(),
            DType::BF16 => bf16::from_ne_bytes([bytes[0], bytes[1]]).to_f64(),
            DType::F32 => f32::from_ne_bytes(take(bytes)) as f64,
            DType::F64 => f64::from_ne_bytes(take(bytes)),
        }
    }

    /// Encode `value` as one native-endian element into `out`.
    ///
    /// Integer targets truncate toward zero and saturate, like `as` casts.
    pub(crate) fn write_f64(&self, value: f64, out: &mut [u8]) {
        match self {
            DType::Bool => out[0] = (value != 0.0) as u8,
            DType::I8 => out[0] = (value as i8) as u8,
            DType::U8 => out[0] = value as u8,
            DType::I16 => out.copy_from_slice(&(value as i16).to_ne_bytes()),
            DType::I32 => out.copy_from_slice(&(value as i32).to_ne_bytes()),
            DType::I64 => out.copy_from_slice(&(value as i64).to_ne_bytes()),
            DType::F16 => out.copy_from_slice(&f16::from_f64(value).to_ne_bytes()),
            DType::BF16 => out.copy_from_slice(&bf16::from_f64(value).to_ne_bytes()),
            DType::F32 => out.copy_from_slice(&(value as f32).to_ne_bytes()),
            DType::F64 => out.copy_from_slice(&value.to_ne_bytes()),
        }
    }
}

fn take<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[..N]);
    buf
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::I8 => "i8",
            DType::U8 => "u8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Rust scalar types that map 1:1 onto a [`DType`].
pub trait Element: bytemuck::Pod + Send + Sync + 'static {
    const DTYPE: DType;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(impl Element for $ty {
            const DTYPE: DType = DType::$dtype;
        })*
    };
}

impl_element! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f16 => F16,
    bf16 => BF16,
    f32 => F32,
    f64 => F64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_sizes() {
        assert_eq!(DType::F32.element_size(), 4);
        assert_eq!(DType::F64.element_size(), 8);
        assert_eq!(DType::F16.element_size(), 2);
        assert_eq!(DType::Bool.element_size(), 1);
        assert_eq!(DType::I64.storage_bytes(3), 24);
    }

    #[test]
    fn test_proto_ids_fit_a_byte_and_round_trip() {
        for dtype in DType::ALL {
            assert_eq!(DType::from_proto_id(dtype.proto_id()), Some(dtype));
        }
        assert_eq!(DType::from_proto_id(200), None);
    }

    #[test]
    fn test_dtype_categories() {
        assert!(DType::F32.is_float());
        assert!(DType::BF16.is_float());
        assert!(!DType::F32.is_integer());
        assert!(DType::I32.is_integer());
        assert!(!DType::Bool.is_integer());
    }

    #[test]
    fn test_scalar_codec() {
        let mut buf = [0u8; 8];
        DType::F64.write_f64(2.5, &mut buf);
        assert_eq!(DType::F64.read_f64(&buf), 2.5);

        let mut buf = [0u8; 4];
        DType::I32.write_f64(-7.9, &mut buf);
        assert_eq!(DType::I32.read_f64(&buf), -7.0);

        let mut buf = [0u8; 2];
        DType::F16.write_f64(0.5, &mut buf);
        assert_eq!(DType::F16.read_f64(&buf), 0.5);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", DType::F32), "f32");
        assert_eq!(format!("{}", DType::BF16), "bf16");
        assert_eq!(format!("{}", DType::Bool), "bool");
    }
}
