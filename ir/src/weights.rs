//! Constant payloads of the `.bin` weights file: raw little-endian values,
//! row-major.
use byteorder::{LE, ReadBytesExt, WriteBytesExt};
use carve_core::internal::*;
use std::io::{Read, Write};

fn read_values<T, R: Read>(
    reader: &mut R,
    len: usize,
    read: impl Fn(&mut R) -> std::io::Result<T>,
) -> CarveResult<Vec<T>> {
    (0..len).map(|_| Ok(read(reader)?)).collect()
}

/// Decode a constant from its byte slice. The slice length must match the
/// shape and type exactly.
pub fn read_tensor(dt: DatumType, shape: &[usize], bytes: &[u8]) -> CarveResult<Tensor> {
    let (len, needed) = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .and_then(|len| Some((len, len.checked_mul(dt.size_of())?)))
        .with_context(|| format!("A {shape:?} {dt} constant is too large"))?;
    ensure!(
        bytes.len() == needed,
        "A {:?} {} constant needs {} bytes, got {}",
        shape,
        dt,
        needed,
        bytes.len()
    );
    let mut r = bytes;
    match dt {
        DatumType::Bool => Tensor::from_shape(shape, &read_values(&mut r, len, |r| Ok(r.read_u8()? != 0))?),
        DatumType::U8 => Tensor::from_shape(shape, &read_values(&mut r, len, |r| r.read_u8())?),
        DatumType::I32 => Tensor::from_shape(shape, &read_values(&mut r, len, |r| r.read_i32::<LE>())?),
        DatumType::I64 => Tensor::from_shape(shape, &read_values(&mut r, len, |r| r.read_i64::<LE>())?),
        DatumType::F16 => Tensor::from_shape(
            shape,
            &read_values(&mut r, len, |r| Ok(f16::from_bits(r.read_u16::<LE>()?)))?,
        ),
        DatumType::F32 => Tensor::from_shape(shape, &read_values(&mut r, len, |r| r.read_f32::<LE>())?),
    }
}

/// Append a constant to a weights stream, returning the number of bytes written.
pub fn write_tensor(w: &mut impl Write, t: &Tensor) -> CarveResult<usize> {
    match t.datum_type() {
        DatumType::Bool => {
            for v in t.to_array_view::<bool>()?.iter() {
                w.write_u8(*v as u8)?;
            }
        }
        DatumType::U8 => w.write_all(&t.to_vec::<u8>()?)?,
        DatumType::I32 => {
            for v in t.to_array_view::<i32>()?.iter() {
                w.write_i32::<LE>(*v)?;
            }
        }
        DatumType::I64 => {
            for v in t.to_array_view::<i64>()?.iter() {
                w.write_i64::<LE>(*v)?;
            }
        }
        DatumType::F16 => {
            for v in t.to_array_view::<f16>()?.iter() {
                w.write_u16::<LE>(v.to_bits())?;
            }
        }
        DatumType::F32 => {
            for v in t.to_array_view::<f32>()?.iter() {
                w.write_f32::<LE>(*v)?;
            }
        }
    }
    Ok(t.len() * t.datum_type().size_of())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn f32_is_little_endian() {
        let mut bytes = vec![];
        let size = write_tensor(&mut bytes, &tensor1(&[1f32, -2.])).unwrap();
        assert_eq!(size, 8);
        assert_eq!(&bytes[0..4], &[0, 0, 0x80, 0x3f]);
        let back = read_tensor(DatumType::F32, &[2], &bytes).unwrap();
        assert_eq!(back, tensor1(&[1f32, -2.]));
    }

    #[test]
    fn f16_and_bool_payloads() {
        let mut bytes = vec![];
        let halves = tensor2(&[[f16::from_f32(0.5)], [f16::from_f32(-3.0)]]);
        write_tensor(&mut bytes, &halves).unwrap();
        write_tensor(&mut bytes, &tensor1(&[true, false, true])).unwrap();
        assert_eq!(bytes.len(), 7);
        assert_eq!(read_tensor(DatumType::F16, &[2, 1], &bytes[0..4]).unwrap(), halves);
        assert_eq!(
            read_tensor(DatumType::Bool, &[3], &bytes[4..]).unwrap(),
            tensor1(&[true, false, true])
        );
    }

    #[test]
    fn oversized_shapes_are_refused() {
        assert!(read_tensor(DatumType::U8, &[usize::MAX, 2], &[]).is_err());
        assert!(read_tensor(DatumType::I64, &[usize::MAX / 4], &[]).is_err());
    }

    #[test]
    fn scalar_i64() {
        let bytes = 7i64.to_le_bytes();
        assert_eq!(read_tensor(DatumType::I64, &[], &bytes).unwrap(), tensor0(7i64));
    }

    #[test]
    fn size_mismatch_is_refused() {
        assert!(read_tensor(DatumType::I32, &[3], &[0u8; 8]).is_err());
    }
}
