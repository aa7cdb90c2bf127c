use anyhow::{bail, Context as _, Result};
use quick_xml::{
    events::{BytesStart, Event},
    Reader, Writer,
};
use serde_yaml::Value;

use crate::key::ResolvedMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub path: String,
    pub label_name: String,
}

impl Settings {
    /// `None` when the section is empty or `enabled` is false.
    pub fn from_mapping(mapping: &ResolvedMap) -> Result<Option<Self>> {
        let enabled = mapping
            .effective("enabled")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !enabled {
            return Ok(None);
        }

        let Some(path) = mapping.effective("path").and_then(Value::as_str) else {
            bail!("launch_screen_versioning.path is required when enabled");
        };
        let Some(label_name) = mapping.effective("labelName").and_then(Value::as_str) else {
            bail!("launch_screen_versioning.labelName is required when enabled");
        };

        Ok(Some(Self {
            path: path.to_string(),
            label_name: label_name.to_string(),
        }))
    }
}

/// Set the `text` of the storyboard label whose `userLabel` is `label_name`.
///
/// Only that start tag is rewritten; the rest of the document is kept byte
/// for byte.
pub fn set_version(storyboard: &str, label_name: &str, version: &str) -> Result<String> {
    let mut reader = Reader::from_str(storyboard);

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .with_context(|| format!("malformed storyboard near byte {start}"))?;
        let (tag, empty) = match event {
            Event::Start(tag) => (tag, false),
            Event::Empty(tag) => (tag, true),
            Event::Eof => bail!("no label with userLabel \"{label_name}\""),
            _ => continue,
        };
        if tag.name().as_ref() != b"label" || !has_user_label(&tag, label_name)? {
            continue;
        }

        let end = reader.buffer_position() as usize;
        let rewritten = with_text(&tag, version, empty)?;

        let mut out = String::with_capacity(storyboard.len() + version.len());
        out.push_str(&storyboard[..start]);
        out.push_str(&rewritten);
        out.push_str(&storyboard[end..]);
        return Ok(out);
    }
}

fn has_user_label(tag: &BytesStart<'_>, label_name: &str) -> Result<bool> {
    for attr in tag.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"userLabel" {
            return Ok(attr.unescape_value()? == label_name);
        }
    }
    Ok(false)
}

fn with_text(tag: &BytesStart<'_>, version: &str, empty: bool) -> Result<String> {
    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
    let mut updated = BytesStart::new(name);
    let mut replaced = false;
    for attr in tag.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"text" {
            updated.push_attribute(("text", version));
            replaced = true;
        } else {
            updated.push_attribute(attr);
        }
    }
    if !replaced {
        updated.push_attribute(("text", version));
    }

    let mut writer = Writer::new(Vec::new());
    let event = if empty {
        Event::Empty(updated)
    } else {
        Event::Start(updated)
    };
    writer.write_event(event)?;
    Ok(String::from_utf8(writer.into_inner())?)
}
