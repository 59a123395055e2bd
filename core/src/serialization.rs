//! Byte-stream forms of the core data types.
//!
//! All multi-byte integers and scalars are big-endian, matching the state-file convention;
//! the winter-utils reader/writer traits carry the raw bytes.

use winter_utils::{ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable};

use crate::{
    matrix::{Cell, ComplexMatrix, List, RealMatrix},
    scalar::Scalar,
    value::{CalcString, Ident, Value},
};

// HELPERS
// ================================================================================================

pub fn write_u32_be<W: ByteWriter>(target: &mut W, v: u32) {
    target.write_bytes(&v.to_be_bytes());
}

pub fn write_i32_be<W: ByteWriter>(target: &mut W, v: i32) {
    target.write_bytes(&v.to_be_bytes());
}

pub fn write_i64_be<W: ByteWriter>(target: &mut W, v: i64) {
    target.write_bytes(&v.to_be_bytes());
}

pub fn write_scalar_be<W: ByteWriter>(target: &mut W, v: Scalar) {
    target.write_bytes(&v.to_be_bytes());
}

pub fn read_u32_be<R: ByteReader>(source: &mut R) -> Result<u32, DeserializationError> {
    Ok(u32::from_be_bytes(source.read_array()?))
}

pub fn read_i32_be<R: ByteReader>(source: &mut R) -> Result<i32, DeserializationError> {
    Ok(i32::from_be_bytes(source.read_array()?))
}

pub fn read_i64_be<R: ByteReader>(source: &mut R) -> Result<i64, DeserializationError> {
    Ok(i64::from_be_bytes(source.read_array()?))
}

pub fn read_scalar_be<R: ByteReader>(source: &mut R) -> Result<Scalar, DeserializationError> {
    Ok(Scalar::from_be_bytes(source.read_array()?))
}

// STRINGS AND NAMES
// ================================================================================================

impl Serializable for CalcString {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_u8(self.len() as u8);
        target.write_bytes(self.as_bytes());
    }
}

impl Deserializable for CalcString {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let len = source.read_u8()? as usize;
        let bytes = source.read_vec(len)?;
        Ok(CalcString::from_bytes(&bytes))
    }
}

impl Serializable for Ident {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_u8(self.len() as u8);
        target.write_bytes(self.as_bytes());
    }
}

impl Deserializable for Ident {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let len = source.read_u8()? as usize;
        let bytes = source.read_vec(len)?;
        Ident::new(&bytes)
            .map_err(|_| DeserializationError::InvalidValue("bad identifier length".into()))
    }
}

// VALUES
// ================================================================================================

const TAG_REAL: u8 = 0;
const TAG_COMPLEX: u8 = 1;
const TAG_STRING: u8 = 2;
const TAG_REAL_MATRIX: u8 = 3;
const TAG_COMPLEX_MATRIX: u8 = 4;
const TAG_LIST: u8 = 5;

const CELL_NUM: u8 = 0;
const CELL_STR: u8 = 1;

impl Serializable for Value {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        match self {
            Value::Real(x) => {
                target.write_u8(TAG_REAL);
                write_scalar_be(target, *x);
            },
            Value::Complex { re, im } => {
                target.write_u8(TAG_COMPLEX);
                write_scalar_be(target, *re);
                write_scalar_be(target, *im);
            },
            Value::Str(s) => {
                target.write_u8(TAG_STRING);
                s.write_into(target);
            },
            Value::RealMatrix(m) => {
                target.write_u8(TAG_REAL_MATRIX);
                write_u32_be(target, m.rows());
                write_u32_be(target, m.cols());
                for cell in m.cells() {
                    match cell {
                        Cell::Num(x) => {
                            target.write_u8(CELL_NUM);
                            write_scalar_be(target, *x);
                        },
                        Cell::Str(s) => {
                            target.write_u8(CELL_STR);
                            target.write_u8(s.len() as u8);
                            target.write_bytes(s);
                        },
                    }
                }
            },
            Value::ComplexMatrix(m) => {
                target.write_u8(TAG_COMPLEX_MATRIX);
                write_u32_be(target, m.rows());
                write_u32_be(target, m.cols());
                for part in m.parts() {
                    write_scalar_be(target, *part);
                }
            },
            Value::List(l) => {
                target.write_u8(TAG_LIST);
                write_u32_be(target, l.len() as u32);
                for item in l.items() {
                    item.write_into(target);
                }
            },
        }
    }
}

impl Deserializable for Value {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let bad = |what: &str| DeserializationError::InvalidValue(what.into());
        match source.read_u8()? {
            TAG_REAL => Ok(Value::Real(read_scalar_be(source)?)),
            TAG_COMPLEX => Ok(Value::Complex {
                re: read_scalar_be(source)?,
                im: read_scalar_be(source)?,
            }),
            TAG_STRING => Ok(Value::Str(CalcString::read_from(source)?)),
            TAG_REAL_MATRIX => {
                let rows = read_u32_be(source)?;
                let cols = read_u32_be(source)?;
                let size = (rows as usize)
                    .checked_mul(cols as usize)
                    .ok_or_else(|| bad("matrix dimensions overflow"))?;
                let mut cells = Vec::with_capacity(size);
                for _ in 0..size {
                    cells.push(match source.read_u8()? {
                        CELL_NUM => Cell::Num(read_scalar_be(source)?),
                        CELL_STR => {
                            let len = source.read_u8()? as usize;
                            Cell::string(&source.read_vec(len)?)
                        },
                        _ => return Err(bad("unknown matrix cell tag")),
                    });
                }
                RealMatrix::from_cells(rows, cols, cells)
                    .map(Value::RealMatrix)
                    .map_err(|_| bad("bad matrix dimensions"))
            },
            TAG_COMPLEX_MATRIX => {
                let rows = read_u32_be(source)?;
                let cols = read_u32_be(source)?;
                let size = (rows as usize)
                    .checked_mul(cols as usize)
                    .ok_or_else(|| bad("matrix dimensions overflow"))?;
                let mut parts = Vec::with_capacity(size * 2);
                for _ in 0..size * 2 {
                    parts.push(read_scalar_be(source)?);
                }
                ComplexMatrix::from_parts(rows, cols, parts)
                    .map(Value::ComplexMatrix)
                    .map_err(|_| bad("bad matrix dimensions"))
            },
            TAG_LIST => {
                let count = read_u32_be(source)? as usize;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(Value::read_from(source)?);
                }
                Ok(Value::List(List::from_items(items)))
            },
            _ => Err(bad("unknown value tag")),
        }
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use winter_utils::SliceReader;

    use super::*;

    fn roundtrip(v: &Value) -> Value {
        let mut buf = Vec::new();
        v.write_into(&mut buf);
        let mut reader = SliceReader::new(&buf);
        Value::read_from(&mut reader).unwrap()
    }

    #[test]
    fn scalar_values_roundtrip() {
        for v in [
            Value::Real(-2.5),
            Value::complex(1.0, -1.0),
            Value::string("HELLO"),
        ] {
            assert_eq!(roundtrip(&v), v);
        }
    }

    #[test]
    fn matrix_values_roundtrip() {
        let mut m = RealMatrix::new(2, 3).unwrap();
        m.disentangle().cells[1] = Cell::Num(7.5);
        m.disentangle().cells[4] = Cell::string(b"a longer string cell");
        let v = Value::RealMatrix(m);
        assert_eq!(roundtrip(&v), v);

        let cm = ComplexMatrix::from_parts(1, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let v = Value::ComplexMatrix(cm);
        assert_eq!(roundtrip(&v), v);
    }

    #[test]
    fn nested_lists_roundtrip() {
        let inner = Value::List(List::from_items(vec![Value::Real(1.0)]));
        let v = Value::List(List::from_items(vec![inner, Value::string("x")]));
        assert_eq!(roundtrip(&v), v);
    }

    proptest::proptest! {
        #[test]
        fn any_finite_real_roundtrips(x in -1e300f64..1e300) {
            let v = Value::Real(x);
            proptest::prop_assert_eq!(roundtrip(&v), v);
        }

        #[test]
        fn any_complex_roundtrips(re in -1e12f64..1e12, im in -1e12f64..1e12) {
            let v = Value::complex(re, im);
            proptest::prop_assert_eq!(roundtrip(&v), v);
        }
    }

    #[test]
    fn truncated_stream_fails() {
        let mut buf = Vec::new();
        Value::Real(1.0).write_into(&mut buf);
        buf.truncate(5);
        let mut reader = SliceReader::new(&buf);
        assert!(Value::read_from(&mut reader).is_err());
    }
}
