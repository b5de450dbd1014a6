//! Typed accessors over an enhancer's `[enhancers.options]` table.

use classweave_shared::{ClassweaveError, Result};

pub(crate) struct Options<'a> {
    id: &'a str,
    table: &'a toml::Table,
}

impl<'a> Options<'a> {
    pub(crate) fn new(id: &'a str, table: &'a toml::Table) -> Self {
        Self { id, table }
    }

    pub(crate) fn string(&self, key: &str) -> Result<Option<String>> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.invalid(key, "a string", other)),
        }
    }

    pub(crate) fn required_string(&self, key: &str) -> Result<String> {
        self.string(key)?.ok_or_else(|| {
            ClassweaveError::config(format!("enhancer {}: missing option `{key}`", self.id))
        })
    }

    pub(crate) fn bool(&self, key: &str) -> Result<Option<bool>> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::Boolean(b)) => Ok(Some(*b)),
            Some(other) => Err(self.invalid(key, "a boolean", other)),
        }
    }

    pub(crate) fn string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    toml::Value::String(s) => Ok(s.clone()),
                    other => Err(self.invalid(key, "a list of strings", other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(self.invalid(key, "a list of strings", other)),
        }
    }

    pub(crate) fn invalid_value(
        &self,
        key: &str,
        message: impl std::fmt::Display,
    ) -> ClassweaveError {
        ClassweaveError::config(format!("enhancer {}: option `{key}` {message}", self.id))
    }

    fn invalid(&self, key: &str, expected: &str, got: &toml::Value) -> ClassweaveError {
        self.invalid_value(key, format!("must be {expected}, got {}", got.type_str()))
    }
}
