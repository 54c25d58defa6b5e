// src/schema/types.rs

use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::process::convert;

/// Semantic type of a field. Decides both the Arrow type and how raw text is coerced.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    /// Low-cardinality text (states, agencies, violation codes).
    Category,
    /// Non-negative money amount.
    Float,
    /// 0..=23
    Hour,
    /// 0..=59
    Minute,
    /// Calendar date, never before 1970-01-01.
    Date,
    /// Free-form time-of-day text, repaired later by the time normalizer.
    Time,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Category => "category",
            FieldType::Float => "float",
            FieldType::Hour => "hour",
            FieldType::Minute => "minute",
            FieldType::Date => "date",
            FieldType::Time => "time",
        }
    }
}

/// One field of a target schema. `default` is written in the source's raw text
/// form and goes through the same coercion as incoming values.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    #[serde(default)]
    pub default: Option<String>,
}

impl FieldSpec {
    pub fn new(name: &str, ty: FieldType, default: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            ty,
            default: default.map(str::to_string),
        }
    }
}

/// Ordered, immutable field contract. Built once per pipeline version and
/// handed to every stage by reference.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TargetSchema {
    fields: Vec<FieldSpec>,
}

impl TargetSchema {
    /// Rejects duplicate names and defaults that do not coerce to their own type.
    pub fn new(fields: Vec<FieldSpec>) -> PipelineResult<Self> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if field.name.trim().is_empty() {
                return Err(PipelineError::Config("schema field with empty name".into()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "duplicate schema field `{}`",
                    field.name
                )));
            }
            if let Some(default) = &field.default {
                match convert::coerce_scalar(field.ty, default) {
                    Ok(Some(_)) => {}
                    _ => {
                        return Err(PipelineError::Config(format!(
                            "default {:?} for `{}` is not a valid {}",
                            default,
                            field.name,
                            field.ty.as_str()
                        )))
                    }
                }
            }
        }
        Ok(Self { fields })
    }

    pub fn from_yaml_str(text: &str) -> PipelineResult<Self> {
        let parsed: TargetSchema = serde_yaml::from_str(text)
            .map_err(|e| PipelineError::Config(format!("parsing schema yaml: {}", e)))?;
        Self::new(parsed.fields)
    }

    pub fn from_yaml_path<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("reading {:?}: {}", path, e)))?;
        let schema = Self::from_yaml_str(&text)?;
        debug!(path = %path.display(), fields = schema.len(), "loaded schema");
        Ok(schema)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn default_for(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(|f| f.default.as_deref())
    }
}
