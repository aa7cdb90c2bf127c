use serde_yaml::Value;

use crate::key::{value_to_string, ResolvedMap};

/// Render `Natrium.xcconfig`.
///
/// The section is resolved flat, so a value may still be a mapping of
/// configuration selectors. Those become conditional settings and Xcode picks
/// the right one per build configuration.
pub fn render(mapping: &ResolvedMap) -> String {
    let mut out = String::new();
    out.push_str("// Natrium.xcconfig\n");
    out.push_str("// Autogenerated by natrium, do not edit.\n");
    out.push('\n');

    for (name, value) in mapping.effective_entries() {
        match value {
            Value::Mapping(by_config) => {
                for (selector, v) in by_config {
                    let Some(selector) = selector.as_str() else {
                        continue;
                    };
                    for config in selector.split(',').map(str::trim).filter(|c| !c.is_empty()) {
                        setting(&mut out, &format!("{name}[config={config}]"), v);
                    }
                }
            }
            _ => setting(&mut out, name, value),
        }
    }

    out
}

fn setting(out: &mut String, key: &str, value: &Value) {
    out.push_str(key);
    out.push_str(" = ");
    out.push_str(&setting_value(value));
    out.push('\n');
}

fn setting_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "YES".to_string(),
        Value::Bool(false) => "NO".to_string(),
        Value::Sequence(items) => items.iter().map(value_to_string).collect::<Vec<_>>().join(" "),
        _ => value_to_string(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ResolvedKey;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_plain_and_conditional_settings() {
        let mapping: ResolvedMap = [
            (ResolvedKey::global("PRODUCT_NAME"), Value::from("App")),
            (
                ResolvedKey::environment("dev", "OTHER_SWIFT_FLAGS"),
                serde_yaml::from_str("Debug,Adhoc: -DDEBUG\nRelease: -DRELEASE").unwrap(),
            ),
            (ResolvedKey::global("ENABLE_BITCODE"), Value::from(false)),
            (ResolvedKey::global("ARCHS"), serde_yaml::from_str("[arm64, x86_64]").unwrap()),
        ]
        .into_iter()
        .collect();

        let out = render(&mapping);
        let body: Vec<&str> = out.lines().skip(3).collect();
        assert_eq!(
            body,
            vec![
                "PRODUCT_NAME = App",
                "OTHER_SWIFT_FLAGS[config=Debug] = -DDEBUG",
                "OTHER_SWIFT_FLAGS[config=Adhoc] = -DDEBUG",
                "OTHER_SWIFT_FLAGS[config=Release] = -DRELEASE",
                "ENABLE_BITCODE = NO",
                "ARCHS = arm64 x86_64",
            ]
        );
    }

    #[test]
    fn empty_mapping_renders_header_only() {
        let out = render(&ResolvedMap::new());
        assert_eq!(out.lines().count(), 2);
    }
}
