use serde_json::Value;
use std::fmt;

/// Boolean filter expression over slash-separated record field paths.
///
/// Renders to OData `$filter` text for remote transports and can be evaluated
/// directly against JSON records for in-process directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { field: String, value: String },
    Ne { field: String, value: String },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Self::Eq { field, value } => {
                lookup(record, field).is_some_and(|found| scalar_eq(found, value))
            }
            Self::Ne { field, value } => {
                !lookup(record, field).is_some_and(|found| scalar_eq(found, value))
            }
            Self::And(filters) => filters.iter().all(|filter| filter.matches(record)),
            Self::Or(filters) => filters.iter().any(|filter| filter.matches(record)),
        }
    }

    fn is_compound(&self) -> bool {
        match self {
            Self::And(filters) | Self::Or(filters) => filters.len() > 1,
            _ => false,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq { field, value } => write!(f, "{field} eq '{}'", escape(value)),
            Self::Ne { field, value } => write!(f, "{field} ne '{}'", escape(value)),
            Self::And(filters) => write_joined(f, filters, "and", "true"),
            Self::Or(filters) => write_joined(f, filters, "or", "false"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    filters: &[Filter],
    operator: &str,
    empty: &str,
) -> fmt::Result {
    if filters.is_empty() {
        return f.write_str(empty);
    }

    for (index, filter) in filters.iter().enumerate() {
        if index > 0 {
            write!(f, " {operator} ")?;
        }
        if filter.is_compound() {
            write!(f, "({filter})")?;
        } else {
            write!(f, "{filter}")?;
        }
    }
    Ok(())
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// Resolves `parentPosition/code` style paths inside nested JSON objects.
pub(crate) fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .try_fold(record, |current, segment| current.get(segment))
        .filter(|value| !value.is_null())
}

fn scalar_eq(found: &Value, expected: &str) -> bool {
    match found {
        Value::String(text) => text == expected,
        Value::Number(number) => number.to_string() == expected,
        Value::Bool(flag) => flag.to_string() == expected,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_odata_filter_text() {
        let filter = Filter::and([
            Filter::eq("businessUnit", "VALV"),
            Filter::eq("emplStatus", "6021"),
        ]);
        assert_eq!(
            filter.to_string(),
            "businessUnit eq 'VALV' and emplStatus eq '6021'"
        );
    }

    #[test]
    fn nested_groups_are_parenthesized_and_quotes_escaped() {
        let filter = Filter::and([
            Filter::eq("effectiveStatus", "A"),
            Filter::or([
                Filter::eq("cust_EmployeeGroup", "E"),
                Filter::eq("cust_EmployeeGroup", "O'Neil"),
            ]),
        ]);
        assert_eq!(
            filter.to_string(),
            "effectiveStatus eq 'A' and (cust_EmployeeGroup eq 'E' or cust_EmployeeGroup eq 'O''Neil')"
        );
    }

    #[test]
    fn evaluates_nested_paths() {
        let record = json!({
            "code": "11",
            "effectiveStatus": "A",
            "parentPosition": { "code": "10" }
        });

        assert!(Filter::eq("parentPosition/code", "10").matches(&record));
        assert!(!Filter::eq("parentPosition/code", "99").matches(&record));
        assert!(Filter::ne("parentPosition/code", "99").matches(&record));
    }

    #[test]
    fn missing_fields_never_equal_and_always_differ() {
        let record = json!({ "code": "11", "parentPosition": null });

        assert!(!Filter::eq("parentPosition/code", "10").matches(&record));
        assert!(Filter::ne("parentPosition/code", "10").matches(&record));
        assert!(Filter::and([]).matches(&record));
        assert!(!Filter::or([]).matches(&record));
    }
}
