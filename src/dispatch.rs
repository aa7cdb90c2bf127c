//! Section dispatcher: pre-pass over the reserved keys, per-section
//! resolution and substitution, and the required-section post-pass.

use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, info_span, warn};

use crate::{
    error::{Error, Result, Warning},
    key::{value_to_string, ResolvedMap},
    resolve::Resolver,
    sections::{Deprecation, Files, SectionId, SectionSpec, SectionTable, RESERVED_KEYS},
    substitute::{Substitution, TargetOverlay, Variables},
};

pub const AVAILABLE_SETTINGS: [&str; 1] = ["update_podfile"];

/// The three selector values a run resolves for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub environment: String,
    pub configuration: String,
    pub target: String,
}

impl Selection {
    pub fn new(
        environment: impl Into<String>,
        configuration: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            environment: environment.into(),
            configuration: configuration.into(),
            target: target.into(),
        }
    }
}

/// Receives each resolved section subtree. Emitters implement this.
pub trait Sink {
    fn emit(
        &mut self,
        section: SectionId,
        mapping: &ResolvedMap,
        file: Option<&str>,
    ) -> anyhow::Result<()>;
}

/// Recognized `settings` entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, Value>,
}

impl Settings {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn update_podfile(&self) -> bool {
        self.get("update_podfile").and_then(Value::as_bool) == Some(true)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// State derived by the pre-pass, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Prepared {
    pub environments: Vec<String>,
    pub settings: Settings,
    pub variables: Variables,
    pub overlay: TargetOverlay,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub section: SectionId,
    pub file: Option<String>,
    pub entries: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    pub dispatched: Vec<Dispatched>,
    pub warnings: Vec<Warning>,
}

impl Report {
    /// Put pre-pass warnings ahead of the ones raised while dispatching.
    pub fn prepend_warnings(&mut self, mut earlier: Vec<Warning>) {
        earlier.append(&mut self.warnings);
        self.warnings = earlier;
    }
}

#[derive(Debug, Clone)]
pub struct Engine {
    selection: Selection,
    default_plist_path: String,
    sections: SectionTable,
}

impl Engine {
    pub fn new(selection: Selection, default_plist_path: impl Into<String>) -> Self {
        Self {
            selection,
            default_plist_path: default_plist_path.into(),
            sections: SectionTable::default(),
        }
    }

    pub fn with_sections(mut self, sections: SectionTable) -> Self {
        self.sections = sections;
        self
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.selection.environment, &self.selection.configuration)
    }

    /// Pre-pass followed by dispatch; warnings from both end up in the report.
    pub fn run(&self, document: &Value, sink: &mut impl Sink) -> Result<Report> {
        let prepared = self.prepare(document)?;
        let mut report = self.dispatch(document, &prepared, sink)?;
        report.prepend_warnings(prepared.warnings);
        Ok(report)
    }

    pub fn prepare(&self, document: &Value) -> Result<Prepared> {
        let mut prepared = Prepared {
            environments: self.parse_environments(document)?,
            ..Prepared::default()
        };

        prepared.settings = parse_settings(document, &mut prepared.warnings);

        prepared.variables = {
            let _span = info_span!("natrium_variables").entered();
            let resolved = self
                .resolver()
                .resolve(section_value(document, "natrium_variables"), false);
            let variables = Variables::from_resolved(&resolved);
            for (name, value) in variables.iter() {
                debug!("{name} = {value}");
            }
            variables
        };

        prepared.overlay = self.parse_target_specific(document, &prepared.variables)?;

        Ok(prepared)
    }

    fn parse_environments(&self, document: &Value) -> Result<Vec<String>> {
        let environments: Vec<String> = section_value(document, "environments")
            .as_sequence()
            .map(|seq| {
                seq.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if !environments.contains(&self.selection.environment) {
            return Err(Error::UnknownEnvironment {
                environment: self.selection.environment.clone(),
                available: environments,
            });
        }

        debug!(environments = ?environments, "environments");
        Ok(environments)
    }

    fn parse_target_specific(
        &self,
        document: &Value,
        variables: &Variables,
    ) -> Result<TargetOverlay> {
        let _span = info_span!("target_specific", target = %self.selection.target).entered();
        let mut overlay = TargetOverlay::new();

        let Some(block) = section_value(document, "target_specific")
            .get(self.selection.target.as_str())
            .and_then(Value::as_mapping)
        else {
            debug!("no overrides for target");
            return Ok(overlay);
        };

        for forbidden in ["natrium_variables", "target_specific"] {
            if block.contains_key(forbidden) {
                return Err(Error::ForbiddenNesting {
                    key: forbidden.to_string(),
                });
            }
        }

        let no_overlay = TargetOverlay::new();
        let substitution = Substitution::new(variables, &no_overlay);
        for (key, value) in block {
            let Some(section) = key.as_str() else {
                continue;
            };
            let mut resolved = self.resolver().resolve(value, true);
            substitution.apply(&mut resolved, section, false);
            log_mapping(section, &resolved);
            overlay.insert(section.to_string(), resolved);
        }

        Ok(overlay)
    }

    /// Main pass plus post-pass. `prepared` must come from [`Engine::prepare`]
    /// on the same document.
    pub fn dispatch(
        &self,
        document: &Value,
        prepared: &Prepared,
        sink: &mut impl Sink,
    ) -> Result<Report> {
        let mut report = Report::default();
        let mut seen: BTreeSet<SectionId> = BTreeSet::new();
        let substitution = Substitution::new(&prepared.variables, &prepared.overlay);

        let entries = document.as_mapping().into_iter().flatten();
        for (raw_key, raw_value) in entries {
            let Some(raw_key) = raw_key.as_str() else {
                continue;
            };
            if RESERVED_KEYS.contains(&raw_key) {
                continue;
            }

            let (key, value) = match Deprecation::for_key(raw_key) {
                Some(deprecation) => {
                    let replacement = deprecation.replacement().key();
                    push_warning(
                        &mut report.warnings,
                        Warning::DeprecatedKey {
                            key: raw_key.to_string(),
                            replacement: replacement.to_string(),
                        },
                    );
                    (replacement, self.rewrite_deprecated(deprecation, raw_value))
                }
                None => (raw_key, raw_value.clone()),
            };

            let Some(spec) = self.sections.lookup(key).copied() else {
                push_warning(
                    &mut report.warnings,
                    Warning::UnknownSection {
                        key: key.to_string(),
                    },
                );
                continue;
            };
            seen.insert(spec.id);

            let _span = info_span!("section", key = %key).entered();
            for (subtree, file) in subtrees(&spec, &value) {
                let mut mapping = self.resolver().resolve(subtree, spec.flat);
                substitution.apply(&mut mapping, key, true);
                self.deliver(&spec, mapping, file, sink, &mut report)?;
            }
        }

        for spec in self.sections.required() {
            if seen.contains(&spec.id) {
                continue;
            }
            let _span = info_span!("section", key = %spec.id).entered();
            push_warning(
                &mut report.warnings,
                Warning::MissingSection {
                    key: spec.id.key().to_string(),
                },
            );
            self.deliver(spec, ResolvedMap::new(), None, sink, &mut report)?;
        }

        Ok(report)
    }

    fn rewrite_deprecated(&self, deprecation: Deprecation, value: &Value) -> Value {
        match deprecation {
            Deprecation::Misc => value
                .get("launchScreenStoryboard")
                .cloned()
                .unwrap_or(Value::Null),
            Deprecation::InfoPlist => {
                let mut wrapped = Mapping::new();
                wrapped.insert(
                    Value::String(self.default_plist_path.clone()),
                    value.clone(),
                );
                Value::Mapping(wrapped)
            }
        }
    }

    fn deliver(
        &self,
        spec: &SectionSpec,
        mapping: ResolvedMap,
        file: Option<&str>,
        sink: &mut impl Sink,
        report: &mut Report,
    ) -> Result<()> {
        if let Some(file) = file {
            info!("{file}");
        }
        log_mapping(spec.id.key(), &mapping);

        sink.emit(spec.id, &mapping, file)
            .map_err(|source| Error::Emit {
                section: spec.id,
                source,
            })?;

        report.dispatched.push(Dispatched {
            section: spec.id,
            file: file.map(str::to_string),
            entries: mapping.len(),
        });
        Ok(())
    }
}

/// Top-level value for `key`, or null.
fn section_value<'a>(document: &'a Value, key: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    document.get(key).unwrap_or(&NULL)
}

fn subtrees<'a>(spec: &SectionSpec, value: &'a Value) -> Vec<(&'a Value, Option<&'a str>)> {
    match spec.files {
        Files::Single => vec![(value, None)],
        Files::Multiple => value
            .as_mapping()
            .into_iter()
            .flatten()
            .filter_map(|(path, subtree)| path.as_str().map(|p| (subtree, Some(p))))
            .collect(),
    }
}

fn parse_settings(document: &Value, warnings: &mut Vec<Warning>) -> Settings {
    let _span = info_span!("settings").entered();
    let mut settings = Settings::default();

    let entries = section_value(document, "settings")
        .as_mapping()
        .into_iter()
        .flatten();
    for (key, value) in entries {
        let name = value_to_string(key);
        if !AVAILABLE_SETTINGS.contains(&name.as_str()) {
            push_warning(warnings, Warning::UnknownSetting { key: name });
            continue;
        }
        debug!("{name} = {}", value_to_string(value));
        settings.values.insert(name, value.clone());
    }

    settings
}

fn push_warning(warnings: &mut Vec<Warning>, warning: Warning) {
    warn!("{warning}");
    warnings.push(warning);
}

fn log_mapping(section: &str, mapping: &ResolvedMap) {
    if mapping.is_empty() {
        debug!(section, "-empty-");
    }
    for (key, value) in mapping.iter() {
        debug!(section, "{key} = {}", value_to_string(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ResolvedKey;
    use pretty_assertions::assert_eq;

    /// Records every emit call.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(SectionId, ResolvedMap, Option<String>)>,
    }

    impl Sink for Recorder {
        fn emit(
            &mut self,
            section: SectionId,
            mapping: &ResolvedMap,
            file: Option<&str>,
        ) -> anyhow::Result<()> {
            self.calls
                .push((section, mapping.clone(), file.map(str::to_string)));
            Ok(())
        }
    }

    impl Recorder {
        fn mapping(&self, section: SectionId) -> &ResolvedMap {
            self.calls
                .iter()
                .find(|(s, _, _)| *s == section)
                .map(|(_, m, _)| m)
                .unwrap()
        }
    }

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    fn engine(env: &str, config: &str, target: &str) -> Engine {
        Engine::new(Selection::new(env, config, target), "App/Info.plist")
    }

    const BASE: &str = "environments: [dev, prod]\n";

    #[test]
    fn unknown_environment_is_fatal_before_any_dispatch() {
        let doc = yaml("environments: [dev, prod]\nvariables:\n  a: 1\n");
        let mut sink = Recorder::default();

        let err = engine("staging", "Debug", "App")
            .run(&doc, &mut sink)
            .unwrap_err();

        assert!(matches!(err, Error::UnknownEnvironment { ref environment, .. } if environment == "staging"));
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn missing_environments_list_is_fatal() {
        let doc = yaml("variables:\n  a: 1\n");
        let err = engine("dev", "Debug", "App")
            .prepare(&doc)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEnvironment { ref available, .. } if available.is_empty()));
    }

    #[test]
    fn resolves_per_configuration() {
        let doc = yaml(&format!(
            "{BASE}variables:\n  x:\n    dev:\n      Debug: '1'\n      Release: '0'\n"
        ));

        for (config, expected) in [("Debug", "1"), ("Release", "0")] {
            let mut sink = Recorder::default();
            engine("dev", config, "App").run(&doc, &mut sink).unwrap();
            assert_eq!(
                sink.mapping(SectionId::Variables)
                    .get(&ResolvedKey::configuration(config, "x")),
                Some(&Value::from(expected))
            );
        }
    }

    #[test]
    fn substitutes_global_variables() {
        let doc = yaml(&format!(
            "{BASE}natrium_variables:\n  host: api.example.com\nvariables:\n  url: 'https://#{{host}}/v1'\n"
        ));
        let mut sink = Recorder::default();
        engine("dev", "Debug", "App").run(&doc, &mut sink).unwrap();

        assert_eq!(
            sink.mapping(SectionId::Variables).effective("url"),
            Some(&Value::from("https://api.example.com/v1"))
        );
    }

    #[test]
    fn natrium_variables_follow_selectors() {
        let doc = yaml(&format!(
            "{BASE}natrium_variables:\n  host:\n    dev: dev.example.com\n    prod: example.com\nvariables:\n  url: '#{{host}}'\n"
        ));
        let mut sink = Recorder::default();
        engine("prod", "Release", "App").run(&doc, &mut sink).unwrap();

        assert_eq!(
            sink.mapping(SectionId::Variables).effective("url"),
            Some(&Value::from("example.com"))
        );
    }

    #[test]
    fn target_overlay_replaces_value_for_matching_target() {
        let doc = yaml(&format!(
            "{BASE}natrium_variables:\n  host: api.example.com\ntarget_specific:\n  Pro:\n    variables:\n      url: https://pro.example.com\nvariables:\n  url: 'https://#{{host}}/v1'\n"
        ));

        let mut pro = Recorder::default();
        engine("dev", "Debug", "Pro").run(&doc, &mut pro).unwrap();
        assert_eq!(
            pro.mapping(SectionId::Variables).effective("url"),
            Some(&Value::from("https://pro.example.com"))
        );

        let mut lite = Recorder::default();
        engine("dev", "Debug", "Lite").run(&doc, &mut lite).unwrap();
        assert_eq!(
            lite.mapping(SectionId::Variables).effective("url"),
            Some(&Value::from("https://api.example.com/v1"))
        );
    }

    #[test]
    fn target_overlay_gets_global_variables_and_environment_selection() {
        let doc = yaml(&format!(
            "{BASE}natrium_variables:\n  host: h\ntarget_specific:\n  Pro:\n    variables:\n      url:\n        dev: 'dev.#{{host}}'\n        prod: 'prod.#{{host}}'\n"
        ));
        let prepared = engine("prod", "Debug", "Pro").prepare(&doc).unwrap();
        let overlay = &prepared.overlay["variables"];

        assert_eq!(
            overlay.get(&ResolvedKey::environment("prod", "url")),
            Some(&Value::from("prod.h"))
        );
        assert_eq!(overlay.len(), 1);
    }

    #[rstest::rstest]
    #[case("natrium_variables")]
    #[case("target_specific")]
    fn target_block_cannot_nest_reserved_keys(#[case] nested: &str) {
        let doc = yaml(&format!(
            "{BASE}target_specific:\n  Pro:\n    {nested}:\n      a: b\n"
        ));
        let err = engine("dev", "Debug", "Pro").prepare(&doc).unwrap_err();
        assert!(matches!(err, Error::ForbiddenNesting { ref key } if key == nested));

        // Other targets are not inspected.
        assert!(engine("dev", "Debug", "Lite").prepare(&doc).is_ok());
    }

    #[test]
    fn settings_are_filtered() {
        let doc = yaml(&format!(
            "{BASE}settings:\n  update_podfile: true\n  colour: red\n"
        ));
        let prepared = engine("dev", "Debug", "App").prepare(&doc).unwrap();

        assert!(prepared.settings.update_podfile());
        assert_eq!(prepared.settings.get("colour"), None);
        assert_eq!(
            prepared.warnings,
            vec![Warning::UnknownSetting {
                key: "colour".to_string()
            }]
        );
    }

    #[test]
    fn prepass_warnings_come_first() {
        let mut report = Report {
            warnings: vec![Warning::UnknownSection {
                key: "late".to_string(),
            }],
            ..Report::default()
        };
        report.prepend_warnings(vec![Warning::UnknownSetting {
            key: "early".to_string(),
        }]);

        assert_eq!(
            report.warnings,
            vec![
                Warning::UnknownSetting {
                    key: "early".to_string()
                },
                Warning::UnknownSection {
                    key: "late".to_string()
                },
            ]
        );
    }

    #[test]
    fn unknown_sections_warn_and_continue() {
        let doc = yaml(&format!("{BASE}bogus:\n  a: 1\nvariables:\n  a: 1\n"));
        let mut sink = Recorder::default();
        let report = engine("dev", "Debug", "App").run(&doc, &mut sink).unwrap();

        assert!(report.warnings.contains(&Warning::UnknownSection {
            key: "bogus".to_string()
        }));
        assert_eq!(sink.mapping(SectionId::Variables).len(), 1);
    }

    #[test]
    fn required_sections_get_empty_mapping() {
        let doc = yaml(BASE);
        let mut sink = Recorder::default();
        let report = engine("dev", "Debug", "App").run(&doc, &mut sink).unwrap();

        let sections: Vec<_> = sink.calls.iter().map(|(s, m, f)| (*s, m.len(), f.clone())).collect();
        assert_eq!(
            sections,
            vec![(SectionId::Variables, 0, None), (SectionId::Xcconfig, 0, None)]
        );
        assert_eq!(report.dispatched.len(), 2);
    }

    #[test]
    fn plists_dispatch_once_per_file() {
        let doc = yaml(&format!(
            "{BASE}plists:\n  App/Info.plist:\n    CFBundleDisplayName:\n      dev: App Dev\n      prod: App\n  Ext/Info.plist:\n    Key: v\n"
        ));
        let mut sink = Recorder::default();
        engine("dev", "Debug", "App").run(&doc, &mut sink).unwrap();

        let plists: Vec<_> = sink
            .calls
            .iter()
            .filter(|(s, _, _)| *s == SectionId::Plists)
            .map(|(_, m, f)| (f.clone().unwrap(), m.effective_entries().len()))
            .collect();
        assert_eq!(
            plists,
            vec![
                ("App/Info.plist".to_string(), 1),
                ("Ext/Info.plist".to_string(), 1)
            ]
        );
    }

    #[test]
    fn legacy_infoplist_is_wrapped_under_default_path() {
        let doc = yaml(&format!("{BASE}infoplist:\n  CFBundleDisplayName: App\n"));
        let mut sink = Recorder::default();
        let report = engine("dev", "Debug", "App").run(&doc, &mut sink).unwrap();

        let (_, mapping, file) = sink
            .calls
            .iter()
            .find(|(s, _, _)| *s == SectionId::Plists)
            .unwrap();
        assert_eq!(file.as_deref(), Some("App/Info.plist"));
        assert_eq!(mapping.effective("CFBundleDisplayName"), Some(&Value::from("App")));
        assert!(report.warnings.contains(&Warning::DeprecatedKey {
            key: "infoplist".to_string(),
            replacement: "plists".to_string()
        }));
    }

    #[test]
    fn legacy_misc_matches_launch_screen_versioning() {
        let legacy = yaml(&format!(
            "{BASE}misc:\n  launchScreenStoryboard:\n    path: Base.lproj/LaunchScreen.storyboard\n    labelName: Version\n    enabled: true\n"
        ));
        let current = yaml(&format!(
            "{BASE}launch_screen_versioning:\n  path: Base.lproj/LaunchScreen.storyboard\n  labelName: Version\n  enabled: true\n"
        ));

        let mut legacy_sink = Recorder::default();
        let report = engine("dev", "Debug", "App")
            .run(&legacy, &mut legacy_sink)
            .unwrap();
        let mut current_sink = Recorder::default();
        engine("dev", "Debug", "App")
            .run(&current, &mut current_sink)
            .unwrap();

        assert_eq!(legacy_sink.calls, current_sink.calls);
        assert!(report.warnings.contains(&Warning::DeprecatedKey {
            key: "misc".to_string(),
            replacement: "launch_screen_versioning".to_string()
        }));
    }

    #[test]
    fn xcconfig_is_resolved_flat() {
        let doc = yaml(&format!(
            "{BASE}xcconfig:\n  FLAGS:\n    dev:\n      Debug: -DDEBUG\n      Release: -DREL\n"
        ));
        let mut sink = Recorder::default();
        engine("dev", "Debug", "App").run(&doc, &mut sink).unwrap();

        let mapping = sink.mapping(SectionId::Xcconfig);
        assert_eq!(
            mapping.get(&ResolvedKey::environment("dev", "FLAGS")),
            Some(&yaml("Debug: -DDEBUG\nRelease: -DREL"))
        );
    }

    #[test]
    fn emitter_failure_aborts() {
        struct Failing;
        impl Sink for Failing {
            fn emit(&mut self, _: SectionId, _: &ResolvedMap, _: Option<&str>) -> anyhow::Result<()> {
                anyhow::bail!("disk full")
            }
        }

        let doc = yaml(BASE);
        let err = engine("dev", "Debug", "App").run(&doc, &mut Failing).unwrap_err();
        assert!(matches!(err, Error::Emit { section: SectionId::Variables, .. }));
    }
}
