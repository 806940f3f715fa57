//! The closed component registry and per-component prop schemas.
//!
//! Every component has a fixed prop schema. Props arrive from the decision
//! engine as a loose JSON map and are checked against that schema; planners
//! build them through `ComponentProps` so the typed form is the only way in.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

/// Which section list a component belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentFamily {
    Header,
    Main,
}

impl fmt::Display for ComponentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentFamily::Header => write!(f, "header"),
            ComponentFamily::Main => write!(f, "main"),
        }
    }
}

/// A renderable report component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    MainHeader,
    SubHeader,
    DataTable,
    BarChart,
    Card,
    TextField,
    MarkdownField,
}

/// Shape a prop value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropKind {
    /// Any string.
    Text,
    /// A non-empty field name.
    FieldName,
    /// A non-empty list of non-empty field names.
    FieldList,
}

/// One entry of a component's prop schema.
#[derive(Debug, Clone, Copy)]
pub struct PropSpec {
    pub name: &'static str,
    pub kind: PropKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: PropKind) -> PropSpec {
    PropSpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: PropKind) -> PropSpec {
    PropSpec {
        name,
        kind,
        required: false,
    }
}

const BAR_CHART_PROPS: &[PropSpec] = &[
    required("xField", PropKind::FieldName),
    required("yFields", PropKind::FieldList),
];

const CARD_PROPS: &[PropSpec] = &[
    required("title", PropKind::Text),
    optional("description", PropKind::Text),
    optional("content", PropKind::Text),
    optional("footer", PropKind::Text),
];

const DATA_TABLE_PROPS: &[PropSpec] = &[optional("columns", PropKind::FieldList)];

impl Component {
    pub const ALL: [Component; 7] = [
        Component::MainHeader,
        Component::SubHeader,
        Component::DataTable,
        Component::BarChart,
        Component::Card,
        Component::TextField,
        Component::MarkdownField,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Component::MainHeader => "MainHeader",
            Component::SubHeader => "SubHeader",
            Component::DataTable => "DataTable",
            Component::BarChart => "BarChart",
            Component::Card => "Card",
            Component::TextField => "TextField",
            Component::MarkdownField => "MarkdownField",
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn from_name(name: &str) -> Option<Component> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn family(&self) -> ComponentFamily {
        match self {
            Component::MainHeader | Component::SubHeader => ComponentFamily::Header,
            _ => ComponentFamily::Main,
        }
    }

    pub fn prop_schema(&self) -> &'static [PropSpec] {
        match self {
            Component::BarChart => BAR_CHART_PROPS,
            Component::Card => CARD_PROPS,
            Component::DataTable => DATA_TABLE_PROPS,
            _ => &[],
        }
    }

    pub fn required_props(&self) -> Vec<&'static str> {
        self.prop_schema()
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect()
    }

    pub fn in_family(family: ComponentFamily) -> Vec<Component> {
        Self::ALL
            .into_iter()
            .filter(|c| c.family() == family)
            .collect()
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn kind_matches(kind: PropKind, value: &Value) -> bool {
    match kind {
        PropKind::Text => value.is_string(),
        PropKind::FieldName => value.as_str().is_some_and(|s| !s.trim().is_empty()),
        PropKind::FieldList => value.as_array().is_some_and(|items| {
            !items.is_empty()
                && items
                    .iter()
                    .all(|i| i.as_str().is_some_and(|s| !s.trim().is_empty()))
        }),
    }
}

fn kind_description(kind: PropKind) -> &'static str {
    match kind {
        PropKind::Text => "a string",
        PropKind::FieldName => "a non-empty field name",
        PropKind::FieldList => "a non-empty list of field names",
    }
}

/// Check a props map against the component's schema.
///
/// Returns one description per problem. Props outside the schema are allowed.
pub fn check_props(component: Component, props: &Map<String, Value>) -> Vec<String> {
    let mut problems = Vec::new();

    for spec in component.prop_schema() {
        match props.get(spec.name) {
            None | Some(Value::Null) if spec.required => problems.push(format!(
                "{} is missing required prop '{}'",
                component, spec.name
            )),
            None | Some(Value::Null) => {}
            Some(value) if !kind_matches(spec.kind, value) => problems.push(format!(
                "{} prop '{}' must be {}",
                component,
                spec.name,
                kind_description(spec.kind)
            )),
            Some(_) => {}
        }
    }

    problems
}

/// Typed props, one variant per component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentProps {
    MainHeader,
    SubHeader,
    DataTable {
        columns: Option<Vec<String>>,
    },
    BarChart {
        x_field: String,
        y_fields: Vec<String>,
    },
    Card {
        title: String,
        description: Option<String>,
        content: Option<String>,
        footer: Option<String>,
    },
    TextField,
    MarkdownField,
}

fn text(props: &Map<String, Value>, key: &str) -> Option<String> {
    props.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn text_list(props: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    props.get(key).and_then(|v| v.as_array()).map(|items| {
        items
            .iter()
            .filter_map(|i| i.as_str().map(String::from))
            .collect()
    })
}

impl ComponentProps {
    /// Parse a loose props map, failing with the schema problems found.
    pub fn parse(component: Component, props: &Map<String, Value>) -> Result<Self, Vec<String>> {
        let problems = check_props(component, props);
        if !problems.is_empty() {
            return Err(problems);
        }

        // The schema check above guarantees the required keys below.
        let parsed = match component {
            Component::MainHeader => ComponentProps::MainHeader,
            Component::SubHeader => ComponentProps::SubHeader,
            Component::DataTable => ComponentProps::DataTable {
                columns: text_list(props, "columns"),
            },
            Component::BarChart => ComponentProps::BarChart {
                x_field: text(props, "xField").unwrap_or_default(),
                y_fields: text_list(props, "yFields").unwrap_or_default(),
            },
            Component::Card => ComponentProps::Card {
                title: text(props, "title").unwrap_or_default(),
                description: text(props, "description"),
                content: text(props, "content"),
                footer: text(props, "footer"),
            },
            Component::TextField => ComponentProps::TextField,
            Component::MarkdownField => ComponentProps::MarkdownField,
        };
        Ok(parsed)
    }

    pub fn component(&self) -> Component {
        match self {
            ComponentProps::MainHeader => Component::MainHeader,
            ComponentProps::SubHeader => Component::SubHeader,
            ComponentProps::DataTable { .. } => Component::DataTable,
            ComponentProps::BarChart { .. } => Component::BarChart,
            ComponentProps::Card { .. } => Component::Card,
            ComponentProps::TextField => Component::TextField,
            ComponentProps::MarkdownField => Component::MarkdownField,
        }
    }

    /// Wire form of the props.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        match self {
            ComponentProps::DataTable {
                columns: Some(columns),
            } => {
                map.insert("columns".to_string(), json!(columns));
            }
            ComponentProps::BarChart { x_field, y_fields } => {
                map.insert("xField".to_string(), json!(x_field));
                map.insert("yFields".to_string(), json!(y_fields));
            }
            ComponentProps::Card {
                title,
                description,
                content,
                footer,
            } => {
                map.insert("title".to_string(), json!(title));
                for (key, value) in [
                    ("description", description),
                    ("content", content),
                    ("footer", footer),
                ] {
                    if let Some(v) = value {
                        map.insert(key.to_string(), json!(v));
                    }
                }
            }
            _ => {}
        }
        map
    }
}
