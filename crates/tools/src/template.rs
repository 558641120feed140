//! Opaque HTML templates filled by `{{placeholder}}` substitution.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use gw_domain::error::{Error, Result};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.-]+)\s*\}\}").expect("placeholder regex is valid")
});

#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: HashMap<String, String>,
}

impl TemplateStore {
    /// Read every configured template file. A missing file fails startup.
    pub fn load(paths: &HashMap<String, PathBuf>) -> Result<Self> {
        let mut templates = HashMap::with_capacity(paths.len());
        for (name, path) in paths {
            let body = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("template '{name}' ({}): {e}", path.display()))
            })?;
            templates.insert(name.clone(), body);
        }
        Ok(Self { templates })
    }

    pub fn from_map(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Fill `name` with `values`. Placeholders without a value become empty.
    pub fn render(&self, name: &str, values: &Map<String, Value>) -> Result<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("template '{name}'")))?;

        let rendered = PLACEHOLDER_RE.replace_all(template, |caps: &regex::Captures<'_>| {
            match values.get(&caps[1]) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            }
        });
        Ok(rendered.into_owned())
    }
}
