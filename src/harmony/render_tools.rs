//! Developer message body and the TypeScript-like tools section.
//!
//! Tool namespaces render as a `namespace { ... }` block whose members are
//! function type aliases, with JSON-Schema parameter objects translated to
//! TypeScript-ish object types. Property order follows the order the schema
//! author wrote; properties not covered by that order sort ascending.

use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Write;

use super::types::{DeveloperContent, ToolNamespaceMap};

pub(crate) fn render_developer_content(dev: &DeveloperContent) -> String {
    let mut body = String::new();
    if let Some(instructions) = dev.instructions.as_deref().filter(|s| !s.is_empty()) {
        body.push_str("# Instructions\n\n");
        body.push_str(instructions);
    }
    if !dev.tools.is_empty() {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        write_tools_section(&mut body, &dev.tools);
    }
    body
}

/// Appends the `# Tools` section for the given namespaces, ascending by
/// namespace key.
pub(crate) fn write_tools_section(body: &mut String, tools: &ToolNamespaceMap) {
    if tools.is_empty() {
        return;
    }

    body.push_str("# Tools");
    for ns in tools.values() {
        body.push_str("\n\n");
        let mut buf = String::new();
        buf.push_str("## ");
        buf.push_str(&ns.name);
        buf.push_str("\n\n");

        if let Some(desc) = ns.description.as_deref().filter(|s| !s.is_empty()) {
            if ns.tools.is_empty() {
                buf.push_str(desc);
                buf.push_str("\n\n");
            } else {
                write_comment_lines(&mut buf, desc);
            }
        }

        if !ns.tools.is_empty() {
            buf.push_str("namespace ");
            buf.push_str(&ns.name);
            buf.push_str(" {\n\n");
            for tool in &ns.tools {
                write_comment_lines(&mut buf, &tool.description);
                match tool.parsed_parameters() {
                    None if tool.parameters.is_none() => {
                        let _ = writeln!(buf, "type {} = () => any;\n", tool.name);
                    }
                    Some(parsed) if !parsed.value.is_null() => {
                        let root_desc = parsed
                            .value
                            .get("description")
                            .and_then(Value::as_str)
                            .filter(|s| !s.is_empty());
                        buf.push_str("type ");
                        buf.push_str(&tool.name);
                        buf.push_str(" = (_:");
                        match root_desc {
                            Some(desc) => {
                                let _ = write!(buf, " // {desc}\n{{");
                            }
                            None => buf.push_str(" {"),
                        }
                        render_schema_object(
                            &mut buf,
                            &parsed.value,
                            "\n",
                            Some(&parsed.ordered_keys),
                        );
                        buf.push_str("\n}) => any;\n\n");
                    }
                    _ => {
                        // Unparseable or null parameter blob.
                        let _ = writeln!(buf, "type {} = (_: any) => any;\n", tool.name);
                    }
                }
            }
            buf.push_str("} // namespace ");
            buf.push_str(&ns.name);
        }

        body.push_str(buf.trim_end_matches('\n'));
    }
}

/// Writes `text` as `// ` comment lines, one per `\n`-separated chunk,
/// preserving empty trailing chunks.
fn write_comment_lines(buf: &mut String, text: &str) {
    for line in text.split('\n') {
        buf.push_str("// ");
        buf.push_str(line);
        buf.push('\n');
    }
}

/// Renders the properties of a JSON-Schema object. `ordered_keys`, when
/// non-empty, fixes the property order; remaining properties follow in
/// ascending name order.
fn render_schema_object(
    buf: &mut String,
    schema: &Value,
    indent: &str,
    ordered_keys: Option<&[String]>,
) {
    let props = schema.get("properties").and_then(Value::as_object);
    let required: HashSet<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut keys: Vec<&str> = Vec::new();
    match ordered_keys {
        Some(ordered) if !ordered.is_empty() => {
            keys.extend(ordered.iter().map(String::as_str));
            if let Some(props) = props {
                let seen: HashSet<&str> = keys.iter().copied().collect();
                keys.extend(props.keys().map(String::as_str).filter(|k| !seen.contains(k)));
            }
        }
        _ => {
            if let Some(props) = props {
                // serde_json's map iterates in ascending key order.
                keys.extend(props.keys().map(String::as_str));
            }
        }
    }

    for key in keys {
        let null = Value::Null;
        let val = props.and_then(|p| p.get(key)).unwrap_or(&null);

        if let Some(title) = get_str(val, "title").filter(|s| !s.is_empty()) {
            let _ = write!(buf, "{indent}// {title}{indent}//");
        }
        if let Some(desc) = get_str(val, "description").filter(|s| !s.is_empty()) {
            for line in desc.split('\n') {
                let _ = write!(buf, "{indent}// {line}");
            }
        }
        if let Some(examples) = val.get("examples").and_then(Value::as_array) {
            if !examples.is_empty() {
                let _ = write!(buf, "{indent}// Examples:");
                for example in examples {
                    let _ = write!(buf, "{indent}// - {}", stringify_literal(example));
                }
            }
        }

        if let Some(one_of) = val.get("oneOf").and_then(Value::as_array) {
            if !one_of.is_empty() {
                if let Some(def) = val.get("default") {
                    let _ = write!(buf, "{indent}// default: {}", default_literal(val, def));
                }
                let _ = write!(buf, "{indent}{key}");
                if !required.contains(key) {
                    buf.push('?');
                }
                buf.push(':');

                let prop_desc = get_str(val, "description").unwrap_or("");
                for (i, variant) in one_of.iter().enumerate() {
                    let variant_indent = format!("{indent}   ");
                    let _ = write!(buf, "{indent} | {}", schema_to_ts(variant, &variant_indent));
                    let mut trailing: Vec<String> = Vec::new();
                    if let Some(d) = get_str(variant, "description").filter(|s| !s.is_empty()) {
                        // The first variant often repeats the property-level
                        // description; skip the duplicate.
                        if !(i == 0 && !prop_desc.is_empty() && d == prop_desc) {
                            trailing.push(d.to_string());
                        }
                    }
                    if let Some(def) = variant.get("default") {
                        trailing.push(format!("default: {}", default_literal(variant, def)));
                    }
                    if !trailing.is_empty() {
                        let _ = write!(buf, " // {}", trailing.join(" "));
                    }
                }
                let _ = write!(buf, "{indent},");
                continue;
            }
        }

        let _ = write!(buf, "{indent}{key}");
        if !required.contains(key) {
            buf.push('?');
        }
        buf.push_str(": ");

        let nullable = val
            .get("nullable")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let nested_indent = format!("{indent}    ");
        let mut ts = schema_to_ts(val, &nested_indent);
        if nullable && !ts.contains("null") {
            ts.push_str(" | null");
        }
        buf.push_str(&ts);
        match val.get("default") {
            Some(def) => {
                let _ = write!(buf, ", // default: {}", default_literal(val, def));
            }
            None => buf.push(','),
        }
    }
}

/// Maps a JSON-Schema value to its TypeScript-ish type string.
fn schema_to_ts(schema: &Value, indent: &str) -> String {
    let Some(obj) = schema.as_object() else {
        return "any".to_string();
    };

    if let Some(ty) = obj.get("type").and_then(Value::as_str) {
        return match ty {
            "object" => {
                let mut buf = String::from("{");
                render_schema_object(&mut buf, schema, indent, None);
                buf.push('\n');
                buf.push_str(&indent[..indent.len() - 1]);
                buf.push('}');
                buf
            }
            "string" => match obj.get("enum").and_then(Value::as_array) {
                Some(values) if !values.is_empty() => values
                    .iter()
                    .map(|v| format!("\"{}\"", literal_text(v)))
                    .collect::<Vec<_>>()
                    .join(" | "),
                _ => "string".to_string(),
            },
            "number" | "integer" => "number".to_string(),
            "boolean" => "boolean".to_string(),
            "array" => match obj.get("items") {
                Some(items) => format!("{}[]", schema_to_ts(items, indent)),
                None => "Array<any>".to_string(),
            },
            _ => "any".to_string(),
        };
    }

    if let Some(types) = obj.get("type").and_then(Value::as_array) {
        if !types.is_empty() {
            return types
                .iter()
                .map(|v| {
                    let name = literal_text(v);
                    if name == "integer" {
                        "number".to_string()
                    } else {
                        name
                    }
                })
                .collect::<Vec<_>>()
                .join(" | ");
        }
    }

    if let Some(one_of) = obj.get("oneOf").and_then(Value::as_array) {
        if !one_of.is_empty() {
            return one_of
                .iter()
                .map(|v| schema_to_ts(v, indent))
                .collect::<Vec<_>>()
                .join(" | ");
        }
    }

    "any".to_string()
}

fn get_str<'a>(val: &'a Value, key: &str) -> Option<&'a str> {
    val.get(key).and_then(Value::as_str)
}

/// The bare text of a literal: strings unquoted, everything else in its
/// natural JSON form.
fn literal_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A literal for comments: strings quoted, booleans bare, the rest natural.
fn stringify_literal(v: &Value) -> String {
    match v {
        Value::String(s) => format!("\"{s}\""),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        other => other.to_string(),
    }
}

fn is_enum(schema: &Value) -> bool {
    schema
        .get("enum")
        .and_then(Value::as_array)
        .is_some_and(|arr| !arr.is_empty())
}

/// Defaults render unquoted inside enum contexts and quoted elsewhere.
fn default_literal(schema: &Value, def: &Value) -> String {
    match def {
        Value::String(s) if is_enum(schema) => s.clone(),
        _ => stringify_literal(def),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harmony::types::{ToolDescription, ToolNamespaceConfig};
    use serde_json::value::RawValue;

    fn namespace(tools: Vec<ToolDescription>) -> ToolNamespaceMap {
        let mut map = ToolNamespaceMap::new();
        map.insert(
            "functions".to_string(),
            ToolNamespaceConfig {
                name: "functions".to_string(),
                description: None,
                tools,
            },
        );
        map
    }

    fn raw(s: &str) -> Option<Box<RawValue>> {
        Some(RawValue::from_string(s.to_string()).unwrap())
    }

    #[test]
    fn test_tool_without_parameters() {
        let mut body = String::new();
        write_tools_section(
            &mut body,
            &namespace(vec![ToolDescription::new("noop", "does nothing", None)]),
        );
        assert!(body.contains("# Tools"));
        assert!(body.contains("## functions"));
        assert!(body.contains("// does nothing\ntype noop = () => any;"));
        assert!(body.ends_with("} // namespace functions"));
    }

    #[test]
    fn test_tool_with_unparseable_parameters() {
        let tool = ToolDescription::new("odd", "odd tool", raw("null"));
        let mut body = String::new();
        write_tools_section(&mut body, &namespace(vec![tool]));
        assert!(body.contains("type odd = (_: any) => any;"));
    }

    #[test]
    fn test_object_schema_rendering() {
        let tool = ToolDescription::new(
            "get_weather",
            "Gets the weather",
            raw(r#"{"type":"object","properties":{"location":{"type":"string"}}}"#),
        );
        let mut body = String::new();
        write_tools_section(&mut body, &namespace(vec![tool]));
        assert!(body.contains("namespace functions {"));
        assert!(body.contains("type get_weather = (_: {\nlocation?: string,\n}) => any;"));
    }

    #[test]
    fn test_root_description_and_defaults() {
        let tool = ToolDescription::new(
            "callWeather",
            "Returns weather data for a city.",
            raw(
                r#"{"type":"object","description":"Fetch weather data","properties":{"location":{"type":"string","description":"City name","default":"San Francisco"},"unit":{"type":"string","enum":["celsius","fahrenheit"],"default":"celsius"},"mode":{"description":"Select variant","oneOf":[{"type":"string","enum":["current"],"description":"Current weather"},{"type":"string","enum":["forecast"],"description":"Forecast weather","default":"forecast"}]}},"required":["location"]}"#,
            ),
        );
        let mut body = String::new();
        write_tools_section(&mut body, &namespace(vec![tool]));

        for expected in [
            "// Returns weather data for a city.",
            "type callWeather = (_: // Fetch weather data\n{",
            "location: string, // default: \"San Francisco\"",
            "unit?: \"celsius\" | \"fahrenheit\", // default: celsius",
            "mode?:",
            "| \"current\"",
            "| \"forecast\" // Forecast weather default: forecast",
        ] {
            assert!(body.contains(expected), "missing {expected:?} in:\n{body}");
        }
    }

    #[test]
    fn test_property_order_preserved_from_raw_json() {
        let tool = ToolDescription::new(
            "ordered",
            "ordered props",
            raw(r#"{"type":"object","properties":{"zeta":{"type":"string"},"alpha":{"type":"number"}}}"#),
        );
        let mut body = String::new();
        write_tools_section(&mut body, &namespace(vec![tool]));
        let zeta = body.find("zeta?").unwrap();
        let alpha = body.find("alpha?").unwrap();
        assert!(zeta < alpha, "insertion order not preserved:\n{body}");
    }

    #[test]
    fn test_namespace_description_without_tools() {
        let mut map = ToolNamespaceMap::new();
        map.insert(
            "browser".to_string(),
            ToolNamespaceConfig {
                name: "browser".to_string(),
                description: Some("Browsing disabled.".to_string()),
                tools: vec![],
            },
        );
        let mut body = String::new();
        write_tools_section(&mut body, &map);
        assert_eq!(body, "# Tools\n\n## browser\n\nBrowsing disabled.");
    }

    #[test]
    fn test_namespaces_sorted() {
        let mut map = ToolNamespaceMap::new();
        for name in ["zeta", "alpha"] {
            map.insert(
                name.to_string(),
                ToolNamespaceConfig {
                    name: name.to_string(),
                    description: None,
                    tools: vec![],
                },
            );
        }
        let mut body = String::new();
        write_tools_section(&mut body, &map);
        assert!(body.find("## alpha").unwrap() < body.find("## zeta").unwrap());
    }

    #[test]
    fn test_array_and_union_types() {
        let tool = ToolDescription::new(
            "shapes",
            "type shapes",
            raw(
                r#"{"type":"object","properties":{"tags":{"type":"array","items":{"type":"string"}},"anything":{"type":"array"},"multi":{"type":["string","integer"]},"maybe":{"type":"string","nullable":true}}}"#,
            ),
        );
        let mut body = String::new();
        write_tools_section(&mut body, &namespace(vec![tool]));
        assert!(body.contains("tags?: string[],"));
        assert!(body.contains("anything?: Array<any>,"));
        assert!(body.contains("multi?: string | number,"));
        assert!(body.contains("maybe?: string | null,"));
    }

    #[test]
    fn test_developer_content_layout() {
        let dev = DeveloperContent::new()
            .with_instructions("Use tools when helpful.")
            .with_function_tools(vec![ToolDescription::new("noop", "placeholder", None)]);
        let body = render_developer_content(&dev);
        assert!(body.starts_with("# Instructions\n\nUse tools when helpful.\n\n# Tools"));
        assert!(body.contains("## functions"));
    }

    #[test]
    fn test_developer_content_instructions_only() {
        let dev = DeveloperContent::new().with_instructions("Be terse.");
        assert_eq!(render_developer_content(&dev), "# Instructions\n\nBe terse.");
    }
}
