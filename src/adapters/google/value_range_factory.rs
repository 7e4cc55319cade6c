use google_sheets4::api::ValueRange;
use serde_json::Value;
use std::borrow::Cow;

pub trait ValueRangeFactory {
    /// One value per row in column A. Rows past `column_values` up to
    /// `row_count` are blanked so a shorter rewrite leaves no stale text.
    fn from_single_column<'a, T: Into<Cow<'a, str>> + Clone>(
        column_values: &[T],
        row_count: u32,
    ) -> Self;
}

fn wrap_value<'a, T: Into<Cow<'a, str>>>(value: T) -> Value {
    Value::String(value.into().into_owned())
}

impl ValueRangeFactory for ValueRange {
    fn from_single_column<'a, T: Into<Cow<'a, str>> + Clone>(
        column_values: &[T],
        row_count: u32,
    ) -> Self {
        let mut values = column_values
            .iter()
            .map(|col_item| vec![wrap_value(col_item.clone())])
            .collect::<Vec<_>>();

        values.extend((column_values.len()..row_count as usize).map(|_| vec![wrap_value("")]));

        Self {
            major_dimension: Some("ROWS".to_string()),
            range: None,
            values: Some(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_single_column_pads_to_row_count() {
        let value_range = ValueRange::from_single_column(&["title", "link"], 4);

        assert_eq!(value_range.major_dimension.as_deref(), Some("ROWS"));
        assert_eq!(
            value_range.values,
            Some(vec![
                vec![Value::String("title".to_string())],
                vec![Value::String("link".to_string())],
                vec![Value::String(String::new())],
                vec![Value::String(String::new())],
            ])
        );
    }

    #[test]
    fn test_from_single_column_never_truncates() {
        let lines = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let value_range = ValueRange::from_single_column(&lines, 1);

        assert_eq!(value_range.values.map(|rows| rows.len()), Some(3));
    }
}
