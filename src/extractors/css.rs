use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use super::generator::{GenerateError, Generator, GeneratorOutput, OutputKey, type_name};

/// Properties whose numeric values are written without a unit.
const UNITLESS: &[&str] = &[
    "animationIterationCount",
    "aspectRatio",
    "columnCount",
    "flex",
    "flexGrow",
    "flexShrink",
    "fontWeight",
    "gridColumn",
    "gridRow",
    "lineHeight",
    "opacity",
    "order",
    "orphans",
    "scale",
    "tabSize",
    "widows",
    "zIndex",
    "zoom",
];

/// Renders each style object as one class rule (plus nested rules), grouped
/// by originating file.
#[derive(Debug)]
pub struct CssGenerator {
    prefix: String,
    next: usize,
    files: BTreeMap<String, Vec<String>>,
}

impl CssGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
            files: BTreeMap::new(),
        }
    }
}

impl Generator for CssGenerator {
    fn ingest(&mut self, file: &str, value: &Value) -> Result<(), GenerateError> {
        let Value::Object(style) = value else {
            return Err(GenerateError::NotAnObject(type_name(value)));
        };

        let selector = format!(".{}{}", self.prefix, self.next);
        let mut rules = Vec::new();
        render_rule(&selector, style, &mut rules)?;

        self.next += 1;
        self.files.entry(file.to_string()).or_default().extend(rules);
        Ok(())
    }

    fn finish(&mut self) -> GeneratorOutput {
        self.files
            .iter()
            .filter(|(_, rules)| !rules.is_empty())
            .map(|(file, rules)| (OutputKey::File(file.clone()), rules.join("\n")))
            .collect()
    }
}

/// Render `style` under `selector`: its own declarations first, then nested
/// selector and at-rule blocks.
fn render_rule(selector: &str, style: &Map<String, Value>, out: &mut Vec<String>) -> Result<(), GenerateError> {
    let mut declarations = Vec::new();
    let mut nested = Vec::new();

    for (key, value) in style {
        if key.starts_with('@') {
            let inner = nested_object(key, value)?;
            let mut inner_rules = Vec::new();
            render_rule(selector, inner, &mut inner_rules)?;
            if !inner_rules.is_empty() {
                let body: Vec<String> = inner_rules.iter().map(|rule| indent(rule)).collect();
                nested.push(format!("{} {{\n{}\n}}", key, body.join("\n")));
            }
        } else if key.contains('&') || key.starts_with(':') {
            let inner = nested_object(key, value)?;
            let child = if key.contains('&') {
                key.replace('&', selector)
            } else {
                format!("{}{}", selector, key)
            };
            render_rule(&child, inner, &mut nested)?;
        } else {
            declarations.push(format!("  {}: {};", kebab_case(key), render_value(key, value)?));
        }
    }

    if !declarations.is_empty() {
        out.push(format!("{} {{\n{}\n}}", selector, declarations.join("\n")));
    }
    out.extend(nested);
    Ok(())
}

fn nested_object<'v>(key: &str, value: &'v Value) -> Result<&'v Map<String, Value>, GenerateError> {
    value.as_object().ok_or_else(|| GenerateError::UnsupportedValue {
        property: key.to_string(),
        found: type_name(value),
    })
}

fn render_value(property: &str, value: &Value) -> Result<String, GenerateError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => {
            let text = format_number(n);
            if UNITLESS.contains(&property) || property.starts_with("--") || text == "0" {
                Ok(text)
            } else {
                Ok(format!("{}px", text))
            }
        }
        other => Err(GenerateError::UnsupportedValue {
            property: property.to_string(),
            found: type_name(other),
        }),
    }
}

fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    n.as_f64().map(|f| f.to_string()).unwrap_or_default()
}

/// `backgroundColor` -> `background-color`, `WebkitBoxShadow` ->
/// `-webkit-box-shadow`. Custom properties pass through.
fn kebab_case(property: &str) -> String {
    if property.starts_with("--") {
        return property.to_string();
    }
    let mut out = String::with_capacity(property.len() + 4);
    for (i, c) in property.chars().enumerate() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            if i == 0 && property.starts_with("ms") && property[2..].starts_with(|c: char| c.is_ascii_uppercase()) {
                out.push('-');
            }
            out.push(c);
        }
    }
    out
}

fn indent(rule: &str) -> String {
    rule.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn render(value: Value) -> Result<String, GenerateError> {
        let mut css = CssGenerator::new("ss-css-");
        css.ingest("/a.ts", &value)?;
        Ok(css
            .finish()
            .remove(&OutputKey::File("/a.ts".to_string()))
            .unwrap_or_default())
    }

    #[test]
    fn test_declarations_and_units() {
        let output = render(json!({ "backgroundColor": "red", "padding": 4, "opacity": 0.5, "margin": 0 })).unwrap();
        assert_eq!(
            output,
            ".ss-css-0 {\n  background-color: red;\n  padding: 4px;\n  opacity: 0.5;\n  margin: 0;\n}"
        );
    }

    #[test]
    fn test_nested_selectors_and_media() {
        let output = render(json!({
            "color": "blue",
            ":hover": { "color": "navy" },
            "& > span": { "fontWeight": 700 },
            "@media (min-width: 600px)": { "color": "green" }
        }))
        .unwrap();
        assert_eq!(
            output,
            [
                ".ss-css-0 {\n  color: blue;\n}",
                ".ss-css-0:hover {\n  color: navy;\n}",
                ".ss-css-0 > span {\n  font-weight: 700;\n}",
                "@media (min-width: 600px) {\n  .ss-css-0 {\n    color: green;\n  }\n}",
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_vendor_and_custom_properties() {
        assert_eq!(kebab_case("WebkitBoxShadow"), "-webkit-box-shadow");
        assert_eq!(kebab_case("msTransform"), "-ms-transform");
        assert_eq!(kebab_case("--brand-color"), "--brand-color");
    }

    #[test]
    fn test_unsupported_value_leaves_session_unchanged() {
        let mut css = CssGenerator::new("p-");
        let err = css.ingest("/a.ts", &json!({ "color": ["red"] })).unwrap_err();
        assert_eq!(
            err,
            GenerateError::UnsupportedValue {
                property: "color".to_string(),
                found: "array"
            }
        );
        css.ingest("/a.ts", &json!({ "color": "red" })).unwrap();
        let output = css.finish();
        assert_eq!(output[&OutputKey::File("/a.ts".to_string())], ".p-0 {\n  color: red;\n}");
    }

    #[test]
    fn test_classes_number_across_files() {
        let mut css = CssGenerator::new("x-");
        css.ingest("/a.ts", &json!({ "color": "red" })).unwrap();
        css.ingest("/b.ts", &json!({ "color": "blue" })).unwrap();
        let output = css.finish();
        assert!(output[&OutputKey::File("/b.ts".to_string())].starts_with(".x-1 "));
    }
}
