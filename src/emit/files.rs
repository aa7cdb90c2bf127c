use serde_yaml::Value;
use tracing::warn;

use super::Artifact;
use crate::{context::ProjectContext, key::ResolvedMap};

/// One copy per `destination: source` entry, both relative to the project.
pub fn render(ctx: &ProjectContext, mapping: &ResolvedMap) -> Vec<Artifact> {
    mapping
        .effective_entries()
        .into_iter()
        .filter_map(|(destination, source)| match source.as_str() {
            Some(source) => Some(Artifact::copy(ctx.path(source), ctx.path(destination))),
            None => {
                if !matches!(source, Value::Null) {
                    warn!("files.{destination}: source must be a path, skipped");
                }
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dispatch::Selection, key::ResolvedKey};
    use pretty_assertions::assert_eq;

    #[test]
    fn copies_each_effective_entry() {
        let ctx = ProjectContext::new("/p", Selection::new("prod", "Release", "App"), "Info.plist");
        let mapping: ResolvedMap = [
            (
                ResolvedKey::environment("prod", "App/GoogleService-Info.plist"),
                Value::from("Firebase/prod/GoogleService-Info.plist"),
            ),
            (ResolvedKey::global("bad"), Value::from(1)),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            render(&ctx, &mapping),
            vec![Artifact::copy(
                "/p/Firebase/prod/GoogleService-Info.plist",
                "/p/App/GoogleService-Info.plist"
            )]
        );
    }
}
