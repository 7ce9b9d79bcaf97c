//! Stack naming
//!
//! A stack's external name is its base name plus a digest of its tag set,
//! so two nodes with identical attributes map to the same stack. Re-running
//! a graph therefore finds the stacks an earlier run created.

use crate::types::Value;
use serde::Serialize;
use serde_json::ser::Formatter;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io;

/// Maximum length of an external stack name
pub const MAX_STACK_NAME_LEN: usize = 32;

/// Tag carrying the node's base name
pub const STACK_NAME_TAG: &str = "StackName";

/// Tag set of a node, always sorted by key
pub type Tags = BTreeMap<String, Value>;

/// JSON layout with `", "` and `": "` separators and `\uXXXX` escapes for
/// non-ASCII text, matching the names earlier deployments produced
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        let mut utf8 = [0u8; 4];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(ch.encode_utf8(&mut utf8).as_bytes())?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// The tag set as `", "`/`": "` separated JSON, keys in sorted order
#[must_use]
pub fn tag_json(tags: &Tags) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    if let Err(e) = tags.serialize(&mut ser) {
        tracing::warn!("tag set did not serialize: {e}");
        buf.clear();
    }
    buf
}

/// Hex SHA-256 of the tag set's JSON encoding
#[must_use]
pub fn tag_digest(tags: &Tags) -> String {
    hex::encode(Sha256::digest(tag_json(tags)))
}

/// `"{base}-{digest}"`, truncated to [`MAX_STACK_NAME_LEN`]
#[must_use]
pub fn stack_name(base: &str, tags: &Tags) -> String {
    format!("{base}-{}", tag_digest(tags))
        .chars()
        .take(MAX_STACK_NAME_LEN)
        .collect()
}

/// Base tag set: the `StackName` tag plus any extra tags
#[must_use]
pub fn base_tags(base: &str, extra: &Tags) -> Tags {
    let mut tags = Tags::new();
    tags.insert(STACK_NAME_TAG.to_string(), Value::from(base));
    tags.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_truncated_and_prefixed() {
        let tags = base_tags("VPC", &Tags::new());
        let name = stack_name("VPC", &tags);
        assert_eq!(name.len(), MAX_STACK_NAME_LEN);
        assert!(name.starts_with("VPC-"));
    }

    #[test]
    fn identical_tags_collide() {
        let mut a = base_tags("Web", &Tags::new());
        a.insert("StackType".into(), Value::from("Production"));
        let mut b = Tags::new();
        b.insert("StackType".into(), Value::from("Production"));
        b.insert(STACK_NAME_TAG.into(), Value::from("Web"));
        assert_eq!(stack_name("Web", &a), stack_name("Web", &b));
    }

    #[test]
    fn attributes_change_the_name() {
        let mut dev = base_tags("Web", &Tags::new());
        dev.insert("StackType".into(), Value::from("Development"));
        let mut prod = base_tags("Web", &Tags::new());
        prod.insert("StackType".into(), Value::from("Production"));
        assert_ne!(stack_name("Web", &dev), stack_name("Web", &prod));
    }

    #[test]
    fn name_matches_previously_deployed_stack() {
        let mut tags = base_tags("Web", &Tags::new());
        tags.insert("StackType".into(), Value::from("Production"));
        assert_eq!(stack_name("Web", &tags), "Web-330f07ef302938b8a638a8392855");
    }

    #[test]
    fn tag_json_uses_spaced_separators() {
        let mut tags = base_tags("Web", &Tags::new());
        tags.insert("L".into(), Value::from(vec!["a".to_string(), "b".to_string()]));
        let mut nested = crate::types::Outputs::new();
        nested.insert("k".into(), Value::from("v"));
        tags.insert("M".into(), Value::from(nested));
        assert_eq!(
            String::from_utf8(tag_json(&tags)).unwrap(),
            r#"{"L": ["a", "b"], "M": {"k": "v"}, "StackName": "Web"}"#
        );
    }

    #[test]
    fn non_ascii_tags_are_escaped() {
        let tags = base_tags("Caf\u{e9}", &Tags::new());
        assert_eq!(
            String::from_utf8(tag_json(&tags)).unwrap(),
            r#"{"StackName": "Caf\u00e9"}"#
        );
    }

    #[test]
    fn digest_is_sha256_hex() {
        let digest = tag_digest(&Tags::new());
        // sha256 of "{}"
        assert_eq!(
            digest,
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }
}
