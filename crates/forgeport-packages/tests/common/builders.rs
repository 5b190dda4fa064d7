//! Builders for `project.yaml` manifests

#![allow(dead_code)]

/// Template declaration inside a manifest
#[derive(Clone, Debug)]
pub struct TemplateDecl {
    pub name: String,
    pub version: String,
    pub plugin_version: String,
    pub source_path: String,
    pub is_main: bool,
    pub variables: Option<String>,
}

impl TemplateDecl {
    pub fn new(name: &str, source_path: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "1".to_string(),
            plugin_version: "*".to_string(),
            source_path: source_path.to_string(),
            is_main: false,
            variables: None,
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn plugin_version(mut self, plugin_version: &str) -> Self {
        self.plugin_version = plugin_version.to_string();
        self
    }

    pub fn main(mut self) -> Self {
        self.is_main = true;
        self
    }

    /// Inline YAML flow mapping for `variables`
    pub fn variables(mut self, yaml_flow: &str) -> Self {
        self.variables = Some(yaml_flow.to_string());
        self
    }
}

/// Fluent builder for a package manifest
#[derive(Clone, Debug)]
pub struct ManifestBuilder {
    name: String,
    version: String,
    category: String,
    description: String,
    port_range: Option<String>,
    control: Vec<(String, String)>,
    templates: Vec<TemplateDecl>,
}

impl ManifestBuilder {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            category: "official".to_string(),
            description: format!("{} test package", name),
            port_range: None,
            control: vec![
                ("start".to_string(), "./start.sh".to_string()),
                ("stop".to_string(), "./stop.sh".to_string()),
            ],
            templates: Vec::new(),
        }
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn port_range(mut self, range: &str) -> Self {
        self.port_range = Some(range.to_string());
        self
    }

    pub fn template(mut self, template: TemplateDecl) -> Self {
        self.templates.push(template);
        self
    }

    pub fn template_sources(&self) -> Vec<String> {
        self.templates.iter().map(|t| t.source_path.clone()).collect()
    }

    pub fn build(&self) -> String {
        let mut yaml = format!(
            "name: {}\nversion: \"{}\"\ncategory: {}\ndescription: {}\n",
            self.name, self.version, self.category, self.description
        );
        if let Some(range) = &self.port_range {
            yaml.push_str(&format!("port_range: \"{}\"\n", range));
        }
        if !self.control.is_empty() {
            yaml.push_str("control:\n");
            for (key, value) in &self.control {
                yaml.push_str(&format!("  {}: \"{}\"\n", key, value));
            }
        }
        if !self.templates.is_empty() {
            yaml.push_str("config_templates:\n");
            for t in &self.templates {
                yaml.push_str(&format!(
                    "  - name: {}\n    version: \"{}\"\n    plugin_version: \"{}\"\n    source_path: {}\n    file_path: etc\n    format: yaml\n    is_main_config: {}\n",
                    t.name, t.version, t.plugin_version, t.source_path, t.is_main
                ));
                if let Some(vars) = &t.variables {
                    yaml.push_str(&format!("    variables: {}\n", vars));
                }
            }
        }
        yaml
    }
}
