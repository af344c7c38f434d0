// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-schema decoding of positional tuples.
//!
//! `WeatherFlow` packs observations as JSON arrays where meaning is given by
//! position alone. A schema is a static table of [`Slot`]s; [`TupleReader`]
//! checks the array length and every element's kind against the table
//! before any record is built, then hands the values out in order.

use serde_json::Value;

use crate::error::DecodeError;

/// The kind of value a slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotKind {
    /// Any number, truncated to an integer.
    Integer,
    /// Any number.
    Number,
    /// Any number, or `null` when the sensor did not report.
    NullableNumber,
}

impl SlotKind {
    fn describe(self) -> &'static str {
        match self {
            Self::Integer => "a number",
            Self::Number => "a number",
            Self::NullableNumber => "a number or null",
        }
    }
}

/// One position in a tuple schema.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Slot {
    pub name: &'static str,
    pub kind: SlotKind,
}

impl Slot {
    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: SlotKind::Integer,
        }
    }

    pub const fn number(name: &'static str) -> Self {
        Self {
            name,
            kind: SlotKind::Number,
        }
    }

    pub const fn nullable(name: &'static str) -> Self {
        Self {
            name,
            kind: SlotKind::NullableNumber,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SlotValue {
    Integer(i64),
    Number(f64),
    Absent,
}

/// Sequential reader over a validated tuple.
pub(crate) struct TupleReader {
    field: &'static str,
    schema: &'static [Slot],
    values: Vec<SlotValue>,
    cursor: usize,
}

impl TupleReader {
    /// Validates `value` against `schema`.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if `value` is not an array, has a different
    /// length than the schema, or holds an element its slot rejects.
    pub fn new(
        field: &'static str,
        schema: &'static [Slot],
        value: &Value,
    ) -> Result<Self, DecodeError> {
        let elements = value.as_array().ok_or(DecodeError::NotATuple { field })?;

        if elements.len() != schema.len() {
            return Err(DecodeError::TupleLength {
                field,
                expected: schema.len(),
                actual: elements.len(),
            });
        }

        let values = schema
            .iter()
            .zip(elements)
            .enumerate()
            .map(|(index, (slot, element))| {
                convert(slot.kind, element).ok_or(DecodeError::InvalidSlot {
                    field,
                    slot: slot.name,
                    index,
                    expected: slot.kind.describe(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            field,
            schema,
            values,
            cursor: 0,
        })
    }

    /// Reads the next slot as an integer.
    pub fn integer(&mut self) -> Result<i64, DecodeError> {
        match self.advance(SlotKind::Integer)? {
            SlotValue::Integer(v) => Ok(v),
            _ => Err(self.mismatch(SlotKind::Integer)),
        }
    }

    /// Reads the next slot as a number.
    pub fn number(&mut self) -> Result<f64, DecodeError> {
        match self.advance(SlotKind::Number)? {
            SlotValue::Number(v) => Ok(v),
            _ => Err(self.mismatch(SlotKind::Number)),
        }
    }

    /// Reads the next slot as a nullable number.
    pub fn nullable(&mut self) -> Result<Option<f64>, DecodeError> {
        match self.advance(SlotKind::NullableNumber)? {
            SlotValue::Number(v) => Ok(Some(v)),
            SlotValue::Absent => Ok(None),
            SlotValue::Integer(_) => Err(self.mismatch(SlotKind::NullableNumber)),
        }
    }

    fn advance(&mut self, kind: SlotKind) -> Result<SlotValue, DecodeError> {
        let Some(value) = self.values.get(self.cursor).copied() else {
            return Err(DecodeError::TupleLength {
                field: self.field,
                expected: self.cursor + 1,
                actual: self.values.len(),
            });
        };
        if self.schema[self.cursor].kind != kind {
            return Err(self.mismatch(kind));
        }
        self.cursor += 1;
        Ok(value)
    }

    fn mismatch(&self, kind: SlotKind) -> DecodeError {
        let index = self.cursor.min(self.schema.len().saturating_sub(1));
        DecodeError::InvalidSlot {
            field: self.field,
            slot: self.schema.get(index).map_or("?", |s| s.name),
            index,
            expected: kind.describe(),
        }
    }
}

fn convert(kind: SlotKind, value: &Value) -> Option<SlotValue> {
    match kind {
        SlotKind::Integer => as_integer(value).map(SlotValue::Integer),
        SlotKind::Number => value.as_f64().map(SlotValue::Number),
        SlotKind::NullableNumber if value.is_null() => Some(SlotValue::Absent),
        SlotKind::NullableNumber => value.as_f64().map(SlotValue::Number),
    }
}

/// Accepts any finite number; fractional parts are truncated toward zero.
#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(v) = value.as_i64() {
        return Some(v);
    }
    // `as` saturates at the i64 bounds.
    let v = value.as_f64()?;
    v.is_finite().then_some(v as i64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    static SCHEMA: [Slot; 3] = [
        Slot::integer("epoch"),
        Slot::number("speed"),
        Slot::nullable("pressure"),
    ];

    #[test]
    fn reads_slots_in_order() {
        let value = json!([1_681_768_025, 4.27, 722.7]);
        let mut reader = TupleReader::new("t", &SCHEMA, &value).unwrap();

        assert_eq!(reader.integer().unwrap(), 1_681_768_025);
        assert!((reader.number().unwrap() - 4.27).abs() < f64::EPSILON);
        assert_eq!(reader.nullable().unwrap(), Some(722.7));
    }

    #[test]
    fn null_in_nullable_slot_is_absent() {
        let value = json!([1, 2, null]);
        let mut reader = TupleReader::new("t", &SCHEMA, &value).unwrap();
        reader.integer().unwrap();
        reader.number().unwrap();
        assert_eq!(reader.nullable().unwrap(), None);
    }

    #[test]
    fn zero_in_nullable_slot_is_present() {
        let value = json!([1, 2, 0]);
        let mut reader = TupleReader::new("t", &SCHEMA, &value).unwrap();
        reader.integer().unwrap();
        reader.number().unwrap();
        assert_eq!(reader.nullable().unwrap(), Some(0.0));
    }

    #[test]
    fn integer_slot_accepts_whole_float() {
        let value = json!([20.0, 2, 3]);
        let mut reader = TupleReader::new("t", &SCHEMA, &value).unwrap();
        assert_eq!(reader.integer().unwrap(), 20);
    }

    #[test]
    fn integer_slot_truncates_fraction() {
        let value = json!([298.5, 2, 3]);
        let mut reader = TupleReader::new("t", &SCHEMA, &value).unwrap();
        assert_eq!(reader.integer().unwrap(), 298);

        let value = json!([-3.9, 2, 3]);
        let mut reader = TupleReader::new("t", &SCHEMA, &value).unwrap();
        assert_eq!(reader.integer().unwrap(), -3);
    }

    #[test]
    fn null_in_integer_slot_is_rejected() {
        let value = json!([null, 2, 3]);
        let err = TupleReader::new("t", &SCHEMA, &value).err().unwrap();
        assert!(matches!(
            err,
            DecodeError::InvalidSlot {
                slot: "epoch",
                index: 0,
                ..
            }
        ));
    }

    #[test]
    fn null_in_required_slot_is_rejected() {
        let value = json!([1, null, 3]);
        let err = TupleReader::new("t", &SCHEMA, &value).err().unwrap();
        assert!(matches!(
            err,
            DecodeError::InvalidSlot {
                slot: "speed",
                index: 1,
                ..
            }
        ));
    }

    #[test]
    fn string_in_numeric_slot_is_rejected() {
        let value = json!([1, 2, "high"]);
        assert!(TupleReader::new("t", &SCHEMA, &value).is_err());
    }

    #[test]
    fn wrong_length_is_rejected() {
        let short = json!([1, 2]);
        let err = TupleReader::new("t", &SCHEMA, &short).err().unwrap();
        assert!(matches!(
            err,
            DecodeError::TupleLength {
                expected: 3,
                actual: 2,
                ..
            }
        ));

        let long = json!([1, 2, 3, 4]);
        assert!(TupleReader::new("t", &SCHEMA, &long).is_err());
    }

    #[test]
    fn non_array_is_rejected() {
        let value = json!({"epoch": 1});
        let err = TupleReader::new("t", &SCHEMA, &value).err().unwrap();
        assert!(matches!(err, DecodeError::NotATuple { field: "t" }));
    }

    #[test]
    fn reading_against_schema_kind_fails() {
        let value = json!([1, 2, 3]);
        let mut reader = TupleReader::new("t", &SCHEMA, &value).unwrap();
        assert!(reader.number().is_err());
    }
}
