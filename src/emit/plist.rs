use anyhow::{bail, Context as _, Result};
use quick_xml::{
    escape::escape,
    events::{BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};
use serde_yaml::Value;
use std::ops::Range;
use tracing::warn;

use crate::key::ResolvedMap;

/// One `<key>` and its value element, direct children of the root `<dict>`.
#[derive(Debug)]
struct Entry {
    key: String,
    /// Byte span of the value element.
    value: Range<usize>,
    /// Text of a `<string>` value.
    text: Option<String>,
}

#[derive(Debug)]
struct RootDict {
    entries: Vec<Entry>,
    /// Offset of the closing root `</dict>`.
    end: usize,
}

struct OpenValue {
    key: String,
    start: usize,
    is_string: bool,
    text: String,
}

fn scan(xml: &str) -> Result<RootDict> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text_start = false;
    reader.config_mut().trim_text_end = false;

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut root_depth: Option<usize> = None;
    let mut entries = Vec::new();
    let mut key_text: Option<String> = None;
    let mut pending_key: Option<String> = None;
    let mut open_value: Option<OpenValue> = None;

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .with_context(|| format!("malformed plist near byte {start}"))?;
        let child_level = root_depth == Some(stack.len());

        match event {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if child_level {
                    if name == b"key" {
                        key_text = Some(String::new());
                    } else if let Some(key) = pending_key.take() {
                        open_value = Some(OpenValue {
                            key,
                            start,
                            is_string: name == b"string",
                            text: String::new(),
                        });
                    }
                }
                let is_root = root_depth.is_none()
                    && name == b"dict"
                    && stack.iter().all(|n| n == b"plist");
                stack.push(name);
                if is_root {
                    root_depth = Some(stack.len());
                }
            }
            Event::Empty(e) => {
                if child_level {
                    if e.name().as_ref() == b"key" {
                        pending_key = Some(String::new());
                    } else if let Some(key) = pending_key.take() {
                        entries.push(Entry {
                            key,
                            value: start..reader.buffer_position() as usize,
                            text: (e.name().as_ref() == b"string").then(String::new),
                        });
                    }
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                if let Some(buf) = key_text.as_mut() {
                    buf.push_str(&text);
                } else if let Some(open) = open_value.as_mut() {
                    if root_depth.map(|d| d + 1) == Some(stack.len()) {
                        open.text.push_str(&text);
                    }
                }
            }
            Event::End(e) => {
                stack.pop();
                let end = reader.buffer_position() as usize;
                if root_depth == Some(stack.len()) {
                    if e.name().as_ref() == b"key" {
                        pending_key = key_text.take();
                    } else if let Some(open) = open_value.take() {
                        entries.push(Entry {
                            key: open.key,
                            value: open.start..end,
                            text: open.is_string.then_some(open.text),
                        });
                    }
                } else if root_depth == Some(stack.len() + 1) {
                    return Ok(RootDict {
                        entries,
                        end: start,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    bail!("no root <dict> found")
}

/// Set each effective entry of `mapping` in a property-list XML document.
///
/// Only direct children of the root `<dict>` are matched. An existing key
/// keeps its position and has its value element replaced whatever its type;
/// new keys go before the closing root `</dict>`.
pub fn patch(xml: &str, mapping: &ResolvedMap) -> Result<String> {
    let mut out = xml.to_string();

    for (name, value) in mapping.effective_entries() {
        let Some(element) = element(value)? else {
            warn!("{name}: null cannot be written to a plist, skipped");
            continue;
        };

        let root = scan(&out)?;
        out = match root.entries.iter().find(|e| e.key == name) {
            Some(entry) => {
                let mut patched = String::with_capacity(out.len() + element.len());
                patched.push_str(&out[..entry.value.start]);
                patched.push_str(&element);
                patched.push_str(&out[entry.value.end..]);
                patched
            }
            None => {
                let mut patched = String::with_capacity(out.len() + name.len() + element.len() + 16);
                patched.push_str(&out[..root.end]);
                patched.push_str("\t<key>");
                patched.push_str(&escape(name));
                patched.push_str("</key>\n\t");
                patched.push_str(&element);
                patched.push('\n');
                patched.push_str(&out[root.end..]);
                patched
            }
        };
    }

    Ok(out)
}

/// `<string>` value of a top-level key.
pub fn string_value(xml: &str, key: &str) -> Result<Option<String>> {
    let root = scan(xml)?;
    Ok(root
        .entries
        .into_iter()
        .find(|e| e.key == key)
        .and_then(|e| e.text))
}

fn element(value: &Value) -> Result<Option<String>> {
    if value.is_null() {
        return Ok(None);
    }
    let mut writer = Writer::new(Vec::new());
    write_value(&mut writer, value)?;
    Ok(Some(String::from_utf8(writer.into_inner())?))
}

fn write_value(writer: &mut Writer<Vec<u8>>, value: &Value) -> Result<()> {
    match value {
        Value::String(s) => write_text(writer, "string", s)?,
        Value::Bool(b) => {
            let tag = if *b { "true" } else { "false" };
            writer.write_event(Event::Empty(BytesStart::new(tag)))?;
        }
        Value::Number(n) if n.is_f64() => write_text(writer, "real", &n.to_string())?,
        Value::Number(n) => write_text(writer, "integer", &n.to_string())?,
        Value::Null => write_text(writer, "string", "")?,
        Value::Sequence(items) => {
            writer.write_event(Event::Start(BytesStart::new("array")))?;
            for item in items {
                write_value(writer, item)?;
            }
            writer.write_event(Event::End(BytesEnd::new("array")))?;
        }
        Value::Mapping(entries) => {
            writer.write_event(Event::Start(BytesStart::new("dict")))?;
            for (key, item) in entries {
                let Some(key) = key.as_str() else {
                    continue;
                };
                write_text(writer, "key", key)?;
                write_value(writer, item)?;
            }
            writer.write_event(Event::End(BytesEnd::new("dict")))?;
        }
        Value::Tagged(tagged) => write_value(writer, &tagged.value)?,
    }
    Ok(())
}

fn write_text(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
