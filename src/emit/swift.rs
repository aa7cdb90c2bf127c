use anyhow::{bail, Result};
use minijinja::Environment;
use serde::Serialize;
use serde_json::json;
use serde_yaml::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::{context::ProjectContext, key::ResolvedMap};

const TEMPLATE: &str = include_str!("../../assets/natrium.swift.j2");

const SWIFT_KEYWORDS: [&str; 24] = [
    "associatedtype", "class", "default", "defer", "deinit", "enum", "extension", "func",
    "import", "init", "internal", "let", "operator", "private", "protocol", "public", "repeat",
    "return", "self", "static", "struct", "subscript", "switch", "var",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Constant {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: &'static str,
    pub literal: String,
}

#[derive(Debug, Serialize)]
struct EnvironmentCase {
    case: String,
    name: String,
}

/// Render `Natrium.swift` for the effective entries of `mapping`.
///
/// Fails when two variable names or two environment names map to the same
/// Swift identifier.
pub fn render(ctx: &ProjectContext, environments: &[String], mapping: &ResolvedMap) -> Result<String> {
    let mut constants = Vec::new();
    let mut declared: HashMap<String, &str> = HashMap::new();
    for (name, value) in mapping.effective_entries() {
        let Some(constant) = constant(name, value) else {
            warn!("variables.{name}: only scalar values become Swift constants, skipped");
            continue;
        };
        if let Some(previous) = declared.insert(constant.name.clone(), name) {
            bail!(
                "variables.{name} and variables.{previous} both become the Swift constant `{}`",
                constant.name
            );
        }
        constants.push(constant);
    }

    let mut cases: HashMap<String, &str> = HashMap::new();
    let mut environment_cases = Vec::with_capacity(environments.len());
    for name in environments {
        let case = case_name(name);
        if let Some(previous) = cases.insert(case.clone(), name) {
            bail!("environments '{previous}' and '{name}' both become the Swift case `{case}`");
        }
        environment_cases.push(EnvironmentCase {
            case,
            name: escape_swift(name),
        });
    }

    let ctx_json = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "environments": environment_cases,
        "environment_case": case_name(&ctx.selection.environment),
        "configuration": escape_swift(&ctx.selection.configuration),
        "target": escape_swift(&ctx.selection.target),
        "constants": constants,
    });

    let mut env = Environment::new();
    env.add_template("natrium.swift", TEMPLATE)?;
    let tpl = env.get_template("natrium.swift")?;
    let mut out = tpl.render(minijinja::value::Value::from_serialize(&ctx_json))?;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Swift declaration for a scalar leaf; `None` for collections.
pub fn constant(name: &str, value: &Value) -> Option<Constant> {
    let (ty, literal) = match value {
        Value::String(s) => ("String", format!("\"{}\"", escape_swift(s))),
        Value::Bool(b) => ("Bool", b.to_string()),
        Value::Number(n) if n.is_f64() => ("Double", n.to_string()),
        Value::Number(n) => ("Int", n.to_string()),
        Value::Null => ("String?", "nil".to_string()),
        Value::Tagged(tagged) => return constant(name, &tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => return None,
    };
    Some(Constant {
        name: identifier(name),
        ty,
        literal,
    })
}

/// Make `name` usable as a Swift identifier.
pub fn identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if SWIFT_KEYWORDS.contains(&out.as_str()) {
        return format!("`{out}`");
    }
    out
}

/// lowerCamelCase enum case for an environment name.
pub fn case_name(name: &str) -> String {
    let mut out = String::new();
    let mut upper_next = false;
    for c in name.chars() {
        if !c.is_alphanumeric() {
            upper_next = !out.is_empty();
            continue;
        }
        if out.is_empty() {
            out.extend(c.to_lowercase());
        } else if upper_next {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        upper_next = false;
    }
    identifier(&out)
}

fn escape_swift(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}
