//! Built-in record layouts used by `flat-dump` and the tests.

use std::sync::Arc;

use crate::convert::{BooleanConverter, ParseConverter};
use crate::decorator::{ConstrainedField, ObservableField, PatternConstraint, TypedField};
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::field::{ConstantField, DelimitedField, FixedField, Padding};
use crate::structure::{Composite, DelimiterWrapper, Optional, Sequence};

/// Width of an employee card.
pub const EMPLOYEE_WIDTH: usize = 36;

fn fixed(name: &str, width: usize) -> Result<FixedField> {
    Ok(FixedField::new(name, width)?)
}

fn zero_filled(name: &str, width: usize) -> Result<FixedField> {
    Ok(fixed(name, width)?
        .with_padding(Padding::right('0'))
        .with_default("0")?)
}

/// Employee card: `Last(8) First(10) Dept(10) Salary(8)`.
///
/// ```text
/// SMITH   JOHN      SALES     00050000
/// ```
pub fn employee() -> Result<Descriptor> {
    let dept = ConstrainedField::new(
        fixed("dept", 10)?.into(),
        vec![Arc::new(PatternConstraint::new("uppercase", "[A-Z]*")?)],
    )?;
    let salary = TypedField::new(zero_filled("salary", 8)?.into(), ParseConverter::<u32>::new())?;
    Ok(Composite::new(
        "employee",
        vec![
            fixed("last", 8)?.into(),
            fixed("first", 10)?.into(),
            dept.into(),
            salary.into(),
        ],
    )?
    .into())
}

/// Order record: a header, a counted list of items and a gift note that is
/// present only when the gift flag is `Y`.
///
/// ```text
/// ORD A00042 002 WIDGET  0003 GADGET  0010 Y Happy birthday|
/// ```
/// (spaces added between items for readability)
pub fn order() -> Result<Descriptor> {
    let mut count = ObservableField::new(zero_filled("count", 3)?.into())?;
    let item_count = count.correlate(ParseConverter::<usize>::new());

    let mut gift = ObservableField::new(fixed("gift", 1)?.with_default("N")?.into())?;
    let has_note = gift.correlate(BooleanConverter::yes_no());

    let item = Composite::new(
        "item",
        vec![
            fixed("sku", 8)?.into(),
            TypedField::new(zero_filled("qty", 4)?.into(), ParseConverter::<u32>::new())?.into(),
        ],
    )?;
    let items = Sequence::new("items", item.into())?.counted_by(item_count);
    let text = DelimitedField::new("text", '|')?;
    let note = Optional::new("note", text.into())?.flagged_by(has_note);

    Ok(Composite::new(
        "order",
        vec![
            ConstantField::new("kind", "ORD")?.into(),
            fixed("id", 6)?.into(),
            count.into(),
            items.into(),
            gift.into(),
            note.into(),
        ],
    )?
    .into())
}

/// A file of newline-terminated `record`s.
pub fn lines_of(record: Descriptor) -> Result<Descriptor> {
    Ok(Sequence::new("records", DelimiterWrapper::new(record).into())?.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employee_card() {
        let layout = employee().unwrap();
        assert_eq!(layout.min_length(), EMPLOYEE_WIDTH);
        let card = "SMITH   JOHN      SALES     00050000";
        let entity = layout.read_str(card).unwrap();
        let record = entity.as_composite().unwrap();
        assert_eq!(record.get("last").unwrap().as_field().unwrap().value(), "SMITH");
        let salary = record.get("salary").unwrap().as_field().unwrap();
        assert_eq!(salary.get::<u32>().unwrap(), 50000);
        assert_eq!(entity.to_text().unwrap(), card);
    }

    #[test]
    fn test_employee_dept_must_be_uppercase() {
        let card = "SMITH   JOHN      sales     00050000";
        assert!(employee().unwrap().read_str(card).is_err());
    }

    #[test]
    fn test_order_with_note() {
        let text = "ORDA00042002WIDGET  0003GADGET  0010YHappy birthday|";
        let entity = order().unwrap().read_str(text).unwrap();
        let record = entity.as_composite().unwrap();
        assert_eq!(record.get("items").unwrap().as_sequence().unwrap().len(), 2);
        assert!(record.get("note").unwrap().as_optional().unwrap().is_present());
        assert_eq!(entity.to_text().unwrap(), text);
    }

    #[test]
    fn test_order_without_note() {
        let text = "ORDB00007001BOLT    0100N";
        let entity = order().unwrap().read_str(text).unwrap();
        let note = entity.as_composite().unwrap().get("note").unwrap();
        assert_eq!(note.length(), 0);
        assert_eq!(entity.to_text().unwrap(), text);
    }

    #[test]
    fn test_lines_of_records() {
        let file = lines_of(employee().unwrap()).unwrap();
        let text = "SMITH   JOHN      SALES     00050000\nJONES   MARY      ENGINEER  00075000\n";
        let entity = file.read_str(text).unwrap();
        assert_eq!(entity.as_sequence().unwrap().len(), 2);
        assert_eq!(entity.to_text().unwrap(), text);
    }
}
