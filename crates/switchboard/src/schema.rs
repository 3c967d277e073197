//! Declarative parameter specs for tools, and the descriptor built from them.

use serde_json::{json, Map, Value};

use crate::models::tool::Tool;

/// The semantic parameter types a tool-calling chat API understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl ParamKind {
    /// Resolve a type name to a kind. Anything unrecognized is treated as
    /// text, not as an error.
    pub fn parse(name: &str) -> ParamKind {
        match name {
            "string" => ParamKind::String,
            "integer" => ParamKind::Integer,
            "number" => ParamKind::Number,
            "boolean" => ParamKind::Boolean,
            "array" => ParamKind::Array,
            "object" => ParamKind::Object,
            "null" => ParamKind::Null,
            _ => ParamKind::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
            ParamKind::Null => "null",
        }
    }
}

/// One declared parameter. Required iff declared without a default.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required<S: Into<String>>(name: S, kind: ParamKind) -> Self {
        ParamSpec {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn optional<S: Into<String>>(name: S, kind: ParamKind, default: Value) -> Self {
        ParamSpec {
            name: name.into(),
            kind,
            default: Some(default),
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// The static declaration a tool is registered with.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    pub fn new<N: Into<String>, D: Into<String>>(name: N, description: D) -> Self {
        ToolSpec {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// The JSON parameter schema for this spec. A spec with no parameters
    /// yields an empty properties map and an empty required list.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut entry = Map::new();
            entry.insert("type".to_string(), json!(param.kind.as_str()));
            if let Some(default) = &param.default {
                entry.insert("default".to_string(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(entry));
        }

        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn descriptor(&self) -> Tool {
        Tool::new(&self.name, &self.description, self.input_schema())
    }
}
