use prost_types::value::Kind;
use serde::{Deserialize, Serialize};

use crate::proto;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub default_language: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub user_id: String,
    pub app_id: String,
    pub name: String,
    pub description: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub user_id: String,
    pub app_id: String,
    pub description: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub user_id: String,
    pub app_id: String,
    pub description: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub id: String,
    pub dataset_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: String,
    pub name: String,
    pub value: f32,
    pub app_id: String,
}

impl From<proto::App> for App {
    fn from(a: proto::App) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            name: a.name,
            description: a.description,
            default_language: a.default_language,
            metadata: struct_to_json(a.metadata),
        }
    }
}

impl From<proto::Model> for Model {
    fn from(m: proto::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            app_id: m.app_id,
            name: m.name,
            description: m.description,
            metadata: struct_to_json(m.metadata),
        }
    }
}

impl From<proto::Workflow> for Workflow {
    fn from(w: proto::Workflow) -> Self {
        Self {
            id: w.id,
            user_id: w.user_id,
            app_id: w.app_id,
            description: w.description,
            metadata: struct_to_json(w.metadata),
        }
    }
}

impl From<proto::Dataset> for Dataset {
    fn from(d: proto::Dataset) -> Self {
        Self {
            id: d.id,
            user_id: d.user_id,
            app_id: d.app_id,
            description: d.description,
            metadata: struct_to_json(d.metadata),
        }
    }
}

impl From<proto::Input> for Input {
    fn from(i: proto::Input) -> Self {
        Self {
            id: i.id,
            dataset_ids: i.dataset_ids,
        }
    }
}

impl From<proto::Concept> for Concept {
    fn from(c: proto::Concept) -> Self {
        Self {
            id: c.id,
            name: c.name,
            value: c.value,
            app_id: c.app_id,
        }
    }
}

// Absent metadata maps to an empty object so callers can index into it.
fn struct_to_json(metadata: Option<prost_types::Struct>) -> serde_json::Value {
    let fields = metadata.map(|s| s.fields).unwrap_or_default();
    serde_json::Value::Object(
        fields
            .into_iter()
            .map(|(key, value)| (key, value_to_json(value)))
            .collect(),
    )
}

fn value_to_json(value: prost_types::Value) -> serde_json::Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::NumberValue(n)) => serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::StructValue(s)) => struct_to_json(Some(s)),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
    }
}
