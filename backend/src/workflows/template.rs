// Template Rendering - `{{path}}` substitution against an event payload

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use super::payload::scalar_to_string;
use super::EventPayload;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("template token pattern"));

/// Substitute every `{{path}}` token with the resolved payload value.
///
/// Unresolved paths render as an empty string. Literal text is kept as
/// written. A token that only appears once values are substituted, inside a
/// value or across its edge, loses one opening brace, so the output never
/// holds a token and a second render is a no-op.
pub fn render(template: &str, payload: &EventPayload) -> String {
    if !TOKEN.is_match(template) {
        return template.to_string();
    }

    let rendered = TOKEN.replace_all(template, |caps: &regex::Captures<'_>| {
        payload
            .resolve(&caps[1])
            .map(|value| scalar_to_string(value).unwrap_or_else(|| value.to_string()))
            .unwrap_or_default()
    });

    let mut output = rendered.into_owned();
    while let Some(start) = TOKEN.find(&output).map(|token| token.start()) {
        output.remove(start);
    }
    output
}

/// Render every string nested inside `value`.
pub fn render_value(value: &Value, payload: &EventPayload) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, payload)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, payload)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, payload)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn payload() -> EventPayload {
        EventPayload::new(
            "lead",
            Uuid::nil(),
            json!({
                "lead": {
                    "full_name": "Jane Doe",
                    "budget": 750000,
                    "nickname": "{{lead.full_name}}",
                    "tags": ["vip"]
                }
            }),
        )
    }

    #[test]
    fn test_substitutes_tokens() {
        assert_eq!(
            render("Hello {{lead.full_name}}, budget {{ lead.budget }}", &payload()),
            "Hello Jane Doe, budget 750000"
        );
    }

    #[test]
    fn test_unresolved_paths_render_empty() {
        assert_eq!(render("Hi {{lead.phone}}!", &payload()), "Hi !");
    }

    #[test]
    fn test_text_without_tokens_is_untouched() {
        let text = "Plain {braces} and {{not a token}}";
        assert_eq!(render(text, &payload()), text);
    }

    #[test]
    fn test_render_is_idempotent() {
        let p = payload();
        for template in [
            "Hello {{lead.full_name}}",
            "Alias: {{lead.nickname}}",
            "{{{lead.full_name}}}",
            "{{lead.tags}} {{ missing }} {{",
            "{{ {{lead.budget}} }}",
            r#"{{"raw": "{{not a token}}", "name": "{{lead.full_name}}"}}"#,
            "nothing here",
        ] {
            let once = render(template, &p);
            assert_eq!(render(&once, &p), once, "template: {template}");
        }
    }

    #[test]
    fn test_render_value_walks_nested_maps() {
        let rendered = render_value(
            &json!({ "msg": "Hello {{lead.full_name}}", "meta": { "amount": 5, "list": ["{{lead.budget}}"] } }),
            &payload(),
        );
        assert_eq!(
            rendered,
            json!({ "msg": "Hello Jane Doe", "meta": { "amount": 5, "list": ["750000"] } })
        );
    }

    #[test]
    fn test_literal_braces_survive_substitution() {
        assert_eq!(
            render(r#"{{"name": "{{lead.full_name}}", "raw": "{{not a token}}"}}"#, &payload()),
            r#"{{"name": "Jane Doe", "raw": "{{not a token}}"}}"#
        );
    }

    #[test]
    fn test_tokens_inside_values_are_defused() {
        let p = payload();
        assert_eq!(render("Alias: {{lead.nickname}}", &p), "Alias: {lead.full_name}}");
        assert_eq!(render("{{ {{lead.budget}} }}", &p), "{ 750000 }}");
    }
}
