//! Declarative stack template
//!
//! A minimal CloudFormation-shaped document: parameters, resources and
//! outputs. Parameters may be wired to a node input so launch can fill them
//! from resolved values.

use crate::error::LaunchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Template format version stamped on every rendered document
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A template parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Parameter {
    /// A `String` parameter
    pub fn string() -> Self {
        Self {
            kind: "String".to_string(),
            default: None,
            description: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// A template output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateOutput {
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Template document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Parameter>,
    resources: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, TemplateOutput>,
    #[serde(skip)]
    input_wiring: BTreeMap<String, String>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: None,
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            input_wiring: BTreeMap::new(),
        }
    }
}

impl Template {
    /// Empty template
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Add a parameter, optionally filled from the named node input.
    ///
    /// A parameter that already exists is left untouched, so several
    /// builders can share one parameter.
    pub fn add_parameter(&mut self, name: impl Into<String>, parameter: Parameter, source: Option<&str>) {
        let name = name.into();
        if self.parameters.contains_key(&name) {
            return;
        }
        if let Some(input) = source {
            self.input_wiring.insert(name.clone(), input.to_string());
        }
        self.parameters.insert(name, parameter);
    }

    /// Add a resource; when `output` is set, also publish a `Ref` to it
    /// under that output name.
    pub fn create_resource(
        &mut self,
        logical_id: impl Into<String>,
        resource: serde_json::Value,
        output: Option<&str>,
    ) -> Result<(), LaunchError> {
        let logical_id = logical_id.into();
        if self.resources.contains_key(&logical_id) {
            return Err(LaunchError::Template(format!(
                "duplicate resource `{logical_id}`"
            )));
        }
        if let Some(output) = output {
            self.add_output(
                output,
                serde_json::json!({ "Ref": logical_id.clone() }),
                None,
            );
        }
        self.resources.insert(logical_id, resource);
        Ok(())
    }

    pub fn add_output(&mut self, name: impl Into<String>, value: serde_json::Value, description: Option<&str>) {
        self.outputs.insert(
            name.into(),
            TemplateOutput {
                value,
                description: description.map(str::to_string),
            },
        );
    }

    /// Parameter name → input name
    #[must_use]
    pub fn input_wiring(&self) -> &BTreeMap<String, String> {
        &self.input_wiring
    }

    #[must_use]
    pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    #[must_use]
    pub fn resources(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.resources
    }

    /// Render the document as JSON
    pub fn to_json(&self) -> Result<String, LaunchError> {
        serde_json::to_string(self).map_err(|e| LaunchError::Template(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_cloudformation_shape() {
        let mut template = Template::new();
        template.set_description("VPC stack");
        template.add_parameter("KeyName", Parameter::string(), Some("KeyName"));
        template
            .create_resource("Vpc", json!({"Type": "AWS::EC2::VPC"}), Some("VpcId"))
            .unwrap();

        let rendered: serde_json::Value = serde_json::from_str(&template.to_json().unwrap()).unwrap();
        assert_eq!(rendered["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(rendered["Description"], "VPC stack");
        assert_eq!(rendered["Parameters"]["KeyName"]["Type"], "String");
        assert_eq!(rendered["Outputs"]["VpcId"]["Value"], json!({"Ref": "Vpc"}));
        assert!(rendered.get("input_wiring").is_none());
        assert_eq!(template.input_wiring()["KeyName"], "KeyName");
    }

    #[test]
    fn shared_parameters_are_not_duplicated() {
        let mut template = Template::new();
        template.add_parameter("Tags", Parameter::string(), Some("Tags"));
        template.add_parameter("Tags", Parameter::string().with_default("x"), Some("Other"));
        assert_eq!(template.parameters()["Tags"].default, None);
        assert_eq!(template.input_wiring()["Tags"], "Tags");
    }

    #[test]
    fn duplicate_resources_are_rejected() {
        let mut template = Template::new();
        template.create_resource("Db", json!({}), None).unwrap();
        assert!(template.create_resource("Db", json!({}), None).is_err());
    }
}
