//! Template engine implementation using minijinja.

use minijinja::{Environment, Value};

use crate::context::Invocation;
use crate::error::EngineError;

/// Template engine with Jinja2-compatible syntax.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create a new template engine with the artifact filters registered.
    pub fn new() -> Self {
        let mut env = Environment::new();

        env.add_filter("tojson", filter_tojson);
        env.add_filter("quote", filter_quote);
        env.add_filter("uris", filter_uris);
        env.add_filter("for_split", filter_for_split);

        Self { env }
    }

    /// Render a template string with the given JSON context.
    pub fn render(&self, template: &str, context: &serde_json::Value) -> Result<String, EngineError> {
        let tmpl = self.env.template_from_str(template)?;
        tmpl.render(Value::from_serialize(context))
            .map_err(|e| EngineError::Template(e.to_string()))
    }

    /// Render a template against an invocation.
    pub fn render_with_invocation(
        &self,
        template: &str,
        invocation: &Invocation,
    ) -> Result<String, EngineError> {
        self.render(template, &invocation.to_template_context())
    }

    /// Check if a string contains template syntax.
    pub fn is_template(s: &str) -> bool {
        s.contains("{{") || s.contains("{%")
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

// Custom filters

fn filter_tojson(value: Value) -> Result<String, minijinja::Error> {
    Ok(serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string()))
}

/// Single-quote a value for POSIX shells.
fn filter_quote(value: Value) -> String {
    format!("'{}'", value.to_string().replace('\'', r"'\''"))
}

/// URIs of every artifact in a channel.
fn filter_uris(channel: Value) -> Result<Vec<String>, minijinja::Error> {
    let mut uris = Vec::new();
    for artifact in channel.try_iter()? {
        uris.push(artifact.get_attr("uri")?.to_string());
    }
    Ok(uris)
}

/// URI of the artifact carrying `split` in a channel.
fn filter_for_split(channel: Value, split: String) -> Result<Value, minijinja::Error> {
    for artifact in channel.try_iter()? {
        if artifact.get_attr("split")?.as_str() == Some(split.as_str()) {
            return artifact.get_attr("uri");
        }
    }
    Err(minijinja::Error::new(
        minijinja::ErrorKind::InvalidOperation,
        format!("no artifact for split '{}'", split),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> serde_json::Value {
        serde_json::json!({
            "inputs": {
                "examples": [
                    {"type": "Examples", "uri": "/in/ex/eval/", "split": "eval"},
                    {"type": "Examples", "uri": "/in/ex/train/", "split": "train"}
                ]
            },
            "params": {"label": "it's"}
        })
    }

    #[test]
    fn test_simple_template() {
        let engine = TemplateEngine::new();
        let result = engine
            .render("{{ inputs.examples[0].uri }}", &context())
            .unwrap();
        assert_eq!(result, "/in/ex/eval/");
    }

    #[test]
    fn test_filter_uris() {
        let engine = TemplateEngine::new();
        let result = engine
            .render("{{ inputs.examples | uris | join(' ') }}", &context())
            .unwrap();
        assert_eq!(result, "/in/ex/eval/ /in/ex/train/");
    }

    #[test]
    fn test_filter_for_split() {
        let engine = TemplateEngine::new();
        let result = engine
            .render("{{ inputs.examples | for_split('train') }}", &context())
            .unwrap();
        assert_eq!(result, "/in/ex/train/");

        let result = engine.render("{{ inputs.examples | for_split('test') }}", &context());
        assert!(matches!(result, Err(EngineError::Template(_))));
    }

    #[test]
    fn test_filter_quote() {
        let engine = TemplateEngine::new();
        let result = engine.render("{{ params.label | quote }}", &context()).unwrap();
        assert_eq!(result, r"'it'\''s'");
    }

    #[test]
    fn test_filter_tojson() {
        let engine = TemplateEngine::new();
        let result = engine.render("{{ params | tojson }}", &context()).unwrap();
        assert!(result.contains("\"label\""));
    }

    #[test]
    fn test_is_template() {
        assert!(TemplateEngine::is_template("run {{ params.x }}"));
        assert!(TemplateEngine::is_template("{% if x %}y{% endif %}"));
        assert!(!TemplateEngine::is_template("plain text"));
    }
}
