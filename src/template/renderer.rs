//! Rendering of the server → location tree.
//!
//! A server template is rendered with the server as context. Each entry of
//! its `locations` sequence is a location object that can render itself:
//!
//! ```text
//! server {{ id }} {
//! {% for location in locations %}{{ location.render() }}{% endfor %}
//! }
//! ```
//!
//! A location template sees `id`, `server_id`, `location_id`,
//! `match_pattern`, `backend_target` and `service` (`name`, `short_name`,
//! `stack`).

use minijinja::value::{Enumerator, Object, Value};
use minijinja::{context, Environment, Error, ErrorKind, State};
use std::sync::Arc;

use crate::synthesis::tree::{LocationNode, ServerNode};
use crate::template::TemplateError;

/// Renders server nodes and, through them, their locations.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Render one server with its locations in id order.
    pub fn render_server(&self, server: &ServerNode) -> Result<String, TemplateError> {
        let locations: Vec<Value> = server
            .locations
            .values()
            .map(|location| Value::from_object(LocationView(location.clone())))
            .collect();

        self.env
            .render_str(
                &server.template_text,
                context! {
                    id => server.id.as_str(),
                    locations => locations,
                },
            )
            .map_err(|source| TemplateError::Render {
                name: server.id.clone(),
                source,
            })
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct LocationView(LocationNode);

impl Object for LocationView {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let node = &self.0;
        let value = match key.as_str()? {
            "id" => Value::from(node.id.as_str()),
            "server_id" => Value::from(node.definition.server_id.as_str()),
            "location_id" => Value::from(node.definition.location_id.as_str()),
            "match_pattern" => Value::from(node.definition.match_pattern.as_str()),
            "backend_target" => Value::from(node.definition.backend_target.as_str()),
            "service" => context! {
                name => node.service_name.as_str(),
                short_name => node.service.short_name.as_str(),
                stack => node.service.stack_name.as_str(),
            },
            _ => return None,
        };
        Some(value)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(&[
            "id",
            "server_id",
            "location_id",
            "match_pattern",
            "backend_target",
            "service",
        ])
    }

    fn call_method(
        self: &Arc<Self>,
        state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        if method != "render" {
            return Err(Error::new(
                ErrorKind::UnknownMethod,
                format!("location has no method `{method}`"),
            ));
        }
        if !args.is_empty() {
            return Err(Error::new(
                ErrorKind::TooManyArguments,
                "render() takes no arguments",
            ));
        }

        let rendered = state
            .env()
            .render_str(&self.0.template_text, Value::from_object((**self).clone()))
            .map_err(|e| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("location `{}` failed to render", self.0.id),
                )
                .with_source(e)
            })?;

        Ok(Value::from_safe_string(rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::discovery::ServiceRecord;
    use crate::synthesis::definition::ServiceDefinition;

    fn location(raw: &str, template: &str) -> LocationNode {
        let service = Arc::new(ServiceRecord {
            stack_name: "teamA".into(),
            short_name: "web".into(),
            declared_vars: BTreeMap::new(),
        });
        LocationNode {
            id: raw.to_string(),
            definition: ServiceDefinition::parse(raw).unwrap(),
            template_text: template.to_string(),
            service_name: "teamA_web".into(),
            service,
        }
    }

    fn server(template: &str, locations: Vec<LocationNode>) -> ServerNode {
        ServerNode {
            id: "edge".into(),
            template_text: template.to_string(),
            locations: locations.into_iter().map(|l| (l.id.clone(), l)).collect(),
        }
    }

    const SERVER: &str = "server {{ id }}\n{% for location in locations %}{{ location.render() }}{% endfor %}end\n";

    #[test]
    fn test_server_renders_locations_through_their_templates() {
        let renderer = TemplateRenderer::new();
        let node = server(
            SERVER,
            vec![location(
                "edge:root:/:http://web:8080",
                "  location {{ match_pattern }} -> {{ backend_target }} ({{ service.stack }}/{{ service.short_name }})\n",
            )],
        );

        assert_eq!(
            renderer.render_server(&node).unwrap(),
            "server edge\n  location / -> http://web:8080 (teamA/web)\nend\n"
        );
    }

    #[test]
    fn test_locations_render_in_id_order() {
        let renderer = TemplateRenderer::new();
        let tpl = "[{{ location_id }}]";
        let node = server(
            SERVER,
            vec![
                location("edge:zeta:/z:http://z", tpl),
                location("edge:alpha:/a:http://a", tpl),
            ],
        );

        assert_eq!(
            renderer.render_server(&node).unwrap(),
            "server edge\n[alpha][zeta]end\n"
        );
    }

    #[test]
    fn test_broken_location_template_fails_server_render() {
        let renderer = TemplateRenderer::new();
        let node = server(SERVER, vec![location("edge:root:/:http://web", "{% if %}")]);

        let err = renderer.render_server(&node).unwrap_err();
        assert!(matches!(err, TemplateError::Render { ref name, .. } if name == "edge"));
    }

    #[test]
    fn test_unknown_method_is_an_error() {
        let renderer = TemplateRenderer::new();
        let node = server(
            "{% for l in locations %}{{ l.explode() }}{% endfor %}",
            vec![location("edge:root:/:http://web", "x")],
        );

        assert!(renderer.render_server(&node).is_err());
    }
}
