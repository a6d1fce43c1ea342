//! Logical column types, attributes, and missing-value sentinels.
//!
//! The numeric discriminants are part of the on-disk format; only append new
//! variants, never renumber.

use crate::error::Error;

/// Base type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum ColumnType {
    Character = 2,
    Factor = 3,
    Int32 = 4,
    Double = 5,
    Logical = 6,
    Int64 = 7,
    Byte = 8,
}

impl TryFrom<u16> for ColumnType {
    type Error = Error;

    fn try_from(v: u16) -> Result<Self, Error> {
        Ok(match v {
            2 => ColumnType::Character,
            3 => ColumnType::Factor,
            4 => ColumnType::Int32,
            5 => ColumnType::Double,
            6 => ColumnType::Logical,
            7 => ColumnType::Int64,
            8 => ColumnType::Byte,
            other => return Err(Error::UnknownColumnType(other)),
        })
    }
}

/// Semantic refinement of a column's base type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum ColumnAttribute {
    #[default]
    None = 1,
    CharacterBase = 2,
    FactorBase = 3,
    /// Factor whose levels carry a meaningful order.
    FactorOrdered = 4,
    Int32Base = 5,
    /// Seconds since epoch; the annotation holds the timezone.
    Int32TimestampSeconds = 6,
    Int32TimeIntervalSeconds = 7,
    /// Days since epoch.
    Int32DateDays = 8,
    /// Seconds since start of day; the scale holds a [`TimeScale`].
    Int32TimeOfDaySeconds = 9,
    DoubleBase = 10,
    DoubleDateDays = 11,
    /// Fractional seconds since epoch; the annotation holds the timezone.
    DoubleTimestampSeconds = 12,
    DoubleTimeIntervalSeconds = 13,
    DoubleTimeOfDaySeconds = 14,
    LogicalBase = 15,
    Int64Base = 16,
    Int64TimeSeconds = 17,
    ByteBase = 18,
}

impl TryFrom<u16> for ColumnAttribute {
    type Error = Error;

    fn try_from(v: u16) -> Result<Self, Error> {
        Ok(match v {
            1 => ColumnAttribute::None,
            2 => ColumnAttribute::CharacterBase,
            3 => ColumnAttribute::FactorBase,
            4 => ColumnAttribute::FactorOrdered,
            5 => ColumnAttribute::Int32Base,
            6 => ColumnAttribute::Int32TimestampSeconds,
            7 => ColumnAttribute::Int32TimeIntervalSeconds,
            8 => ColumnAttribute::Int32DateDays,
            9 => ColumnAttribute::Int32TimeOfDaySeconds,
            10 => ColumnAttribute::DoubleBase,
            11 => ColumnAttribute::DoubleDateDays,
            12 => ColumnAttribute::DoubleTimestampSeconds,
            13 => ColumnAttribute::DoubleTimeIntervalSeconds,
            14 => ColumnAttribute::DoubleTimeOfDaySeconds,
            15 => ColumnAttribute::LogicalBase,
            16 => ColumnAttribute::Int64Base,
            17 => ColumnAttribute::Int64TimeSeconds,
            18 => ColumnAttribute::ByteBase,
            other => return Err(Error::UnknownColumnType(other)),
        })
    }
}

/// Time scale tags for time-of-day and interval columns, stored in the
/// column's scale slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i16)]
pub enum TimeScale {
    Nanoseconds = 1,
    Microseconds = 2,
    Milliseconds = 3,
    Seconds = 4,
    Minutes = 5,
    Hours = 6,
    Days = 7,
    Years = 8,
}

// Power-of-ten scales for plain numeric columns.
pub const SCALE_PICO: i16 = -12;
pub const SCALE_NANO: i16 = -9;
pub const SCALE_MICRO: i16 = -6;
pub const SCALE_MILLI: i16 = -3;
pub const SCALE_UNITY: i16 = 0;
pub const SCALE_KILO: i16 = 3;
pub const SCALE_MEGA: i16 = 6;
pub const SCALE_GIGA: i16 = 9;
pub const SCALE_TERA: i16 = 12;

/// Encoding tag carried bit-for-bit with every character column. The core
/// never converts between encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StringEncoding {
    #[default]
    Native = 0,
    Latin1 = 1,
    Utf8 = 2,
}

impl TryFrom<u8> for StringEncoding {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self, Error> {
        Ok(match v {
            0 => StringEncoding::Native,
            1 => StringEncoding::Latin1,
            2 => StringEncoding::Utf8,
            other => {
                return Err(Error::InvalidData(format!(
                    "unknown string encoding tag {other}"
                )))
            }
        })
    }
}

// ── Missing-value sentinels ────────────────────────────────────────────────

pub const MISSING_INT32: i32 = i32::MIN;
pub const MISSING_INT64: i64 = i64::MIN;

/// Canonical quiet-NaN payload marking a missing double. Ordinary NaNs from
/// arithmetic round-trip unchanged; this particular payload is the sentinel.
pub const MISSING_DOUBLE_BITS: u64 = 0x7FF0_0000_0000_07A2;

pub fn missing_double() -> f64 {
    f64::from_bits(MISSING_DOUBLE_BITS)
}

/// Factor level code marking a missing value (codes are 1-based).
pub const MISSING_FACTOR_CODE: i32 = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_codes_round_trip() {
        for ty in [
            ColumnType::Character,
            ColumnType::Factor,
            ColumnType::Int32,
            ColumnType::Double,
            ColumnType::Logical,
            ColumnType::Int64,
            ColumnType::Byte,
        ] {
            assert_eq!(ColumnType::try_from(ty as u16).unwrap(), ty);
        }
        assert!(ColumnType::try_from(0).is_err());
        assert!(ColumnType::try_from(1).is_err()); // reserved
        assert!(ColumnType::try_from(99).is_err());
    }

    #[test]
    fn attribute_codes_round_trip() {
        for code in 1..=18u16 {
            let attr = ColumnAttribute::try_from(code).unwrap();
            assert_eq!(attr as u16, code);
        }
        assert!(ColumnAttribute::try_from(19).is_err());
    }

    #[test]
    fn missing_double_is_nan_with_fixed_payload() {
        let m = missing_double();
        assert!(m.is_nan());
        assert_eq!(m.to_bits(), MISSING_DOUBLE_BITS);
    }
}
