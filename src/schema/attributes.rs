//! Attribute values of a model and their mapping to directory objects.

use super::types::{AttributeDescriptor, is_empty};
use crate::directory::DirectoryObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Ordered mapping of field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// A non-empty string value.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    /// A list of strings; missing or malformed values read as empty.
    pub fn get_list(&self, name: &str) -> Vec<String> {
        match self.0.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A map of key to list of strings, as used for school memberships.
    pub fn get_membership(&self, name: &str) -> BTreeMap<String, Vec<String>> {
        let Some(Value::Object(map)) = self.0.get(name) else {
            return BTreeMap::new();
        };
        map.iter()
            .map(|(key, value)| {
                let items = value
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect::<Vec<String>>()
                    })
                    .unwrap_or_default();
                (key.clone(), items)
            })
            .collect()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn set_str(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), Value::String(value.into()));
    }

    pub fn set_list<I, S>(&mut self, name: impl Into<String>, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = items.into_iter().map(|s| Value::String(s.into())).collect();
        self.0.insert(name.into(), Value::Array(items));
    }

    pub fn set_membership(
        &mut self,
        name: impl Into<String>,
        membership: &BTreeMap<String, Vec<String>>,
    ) {
        let map = membership
            .iter()
            .map(|(key, items)| {
                let items = items.iter().cloned().map(Value::String).collect();
                (key.clone(), Value::Array(items))
            })
            .collect();
        self.0.insert(name.into(), Value::Object(map));
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|v| !is_empty(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl From<BTreeMap<String, Value>> for Attributes {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// Write all mapped attributes onto a directory object.
///
/// Empty values remove the property. Hidden attributes are only written
/// when set.
pub fn write_attributes(
    descriptors: &[AttributeDescriptor],
    attributes: &Attributes,
    object: &mut DirectoryObject,
) {
    for descriptor in descriptors.iter().filter(|d| d.map_to_udm) {
        match attributes.get(descriptor.name) {
            Some(value) if !is_empty(value) => object.set(descriptor.udm_name, value.clone()),
            _ if descriptor.hidden => {}
            _ => {
                object.remove(descriptor.udm_name);
            }
        }
    }
}

/// Read mapped, non-hidden attributes from a directory object.
pub fn read_attributes(
    descriptors: &[AttributeDescriptor],
    object: &DirectoryObject,
) -> Attributes {
    let mut attributes = Attributes::new();
    for descriptor in descriptors.iter().filter(|d| d.map_to_udm && !d.hidden) {
        if let Some(value) = object.get(descriptor.udm_name) {
            if !is_empty(value) {
                attributes.set(descriptor.name, value.clone());
            }
        }
    }
    attributes
}
