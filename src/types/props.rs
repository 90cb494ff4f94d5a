use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// One column of a database schema. `property_type` is an open string so
/// client-defined types pass through untouched; the server only gives special
/// treatment to `title`, `number`, `date`, and `checkbox`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub name: String,
    pub property_type: String,
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    pub options: JsonValue,
}

impl Property {
    pub fn new(name: &str, property_type: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            property_type: property_type.to_string(),
            options: JsonValue::Null,
        }
    }
}

/// A saved perspective over a database's rows: filter, sort, and column
/// selection. View ids are unique within their database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub id: String,
    pub name: String,
    pub view_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_columns: Option<Vec<String>>,
}

impl View {
    pub fn new(name: &str, view_type: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            view_type: view_type.to_string(),
            filter: None,
            sort: Vec::new(),
            columns: None,
            hidden_columns: None,
        }
    }
}

/// Filter attached to a view. AND rules are conjoined; OR rules form one
/// disjoined subgroup which is then conjoined with the ANDs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub and: Vec<FilterRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or: Vec<FilterRule>,
}

impl FilterConfig {
    pub fn is_empty(&self) -> bool {
        self.and.is_empty() && self.or.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    pub property: String,
    pub condition: FilterCondition,
    #[serde(default)]
    pub value: JsonValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterCondition {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
}

/// One sort rule. `property` is a property id, or one of the built-in row
/// columns `created_at` / `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortRule {
    pub property: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_condition_wire_names() {
        let c: FilterCondition = serde_json::from_str("\"not_contains\"").unwrap();
        assert_eq!(c, FilterCondition::NotContains);
        assert_eq!(serde_json::to_string(&FilterCondition::Gte).unwrap(), "\"gte\"");
    }

    #[test]
    fn test_filter_rule_defaults_value_to_null() {
        let r: FilterRule =
            serde_json::from_str(r#"{"property":"p1","condition":"is_empty"}"#).unwrap();
        assert!(r.value.is_null());
    }

    #[test]
    fn test_view_round_trip_keeps_filter() {
        let mut view = View::new("Open items", "table");
        view.filter = Some(FilterConfig {
            and: vec![FilterRule {
                property: "status".to_string(),
                condition: FilterCondition::Eq,
                value: serde_json::json!("open"),
            }],
            or: Vec::new(),
        });
        let text = serde_json::to_string(&view).unwrap();
        let back: View = serde_json::from_str(&text).unwrap();
        assert_eq!(back.filter.unwrap().and.len(), 1);
    }
}
