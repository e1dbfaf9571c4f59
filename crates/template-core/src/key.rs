//! Content-derived template keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// How a template source is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TemplateMode {
    /// Tag-aware compilation with TAL/METAL directives.
    #[default]
    Markup,
    /// The whole source is emitted as text.
    Text,
}

impl TemplateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateMode::Markup => "markup",
            TemplateMode::Text => "text",
        }
    }
}

/// Everything a compiled program depends on.
#[derive(Debug, Clone, Copy)]
pub struct KeyInputs<'a> {
    pub template: &'a str,
    pub mode: TemplateMode,
    /// Name of the template; it appears in every location of the program.
    pub filename: Option<&'a str>,
    /// Texts of transitively imported templates, in resolution order.
    pub imports: &'a [String],
    /// Global variable names and their declared types.
    pub global_types: &'a BTreeMap<String, String>,
    /// Identities of referenced dependencies.
    pub dependencies: &'a BTreeSet<String>,
}

/// Hex SHA-256 digest over the [`KeyInputs`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateKey(String);

impl TemplateKey {
    pub const LEN: usize = 64;

    pub fn derive(inputs: &KeyInputs<'_>) -> TemplateKey {
        let mut hasher = Sha256::new();
        // Every field is tagged and length-prefixed so that moving bytes
        // between fields always changes the digest.
        let mut field = |tag: u8, bytes: &[u8]| {
            hasher.update([tag]);
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };

        field(b'T', inputs.template.as_bytes());
        field(b'M', inputs.mode.as_str().as_bytes());
        match inputs.filename {
            Some(name) => field(b'F', name.as_bytes()),
            None => field(b'f', &[]),
        }
        field(b'I', &(inputs.imports.len() as u64).to_le_bytes());
        for text in inputs.imports {
            field(b'i', text.as_bytes());
        }
        field(b'G', &(inputs.global_types.len() as u64).to_le_bytes());
        for (name, type_name) in inputs.global_types {
            field(b'n', name.as_bytes());
            field(b't', type_name.as_bytes());
        }
        field(b'D', &(inputs.dependencies.len() as u64).to_le_bytes());
        for dependency in inputs.dependencies {
            field(b'd', dependency.as_bytes());
        }

        TemplateKey(format!("{:x}", hasher.finalize()))
    }

    /// Accepts only well-formed keys (64 lowercase hex digits).
    pub fn parse(text: &str) -> Option<TemplateKey> {
        let valid = text.len() == Self::LEN
            && text
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then(|| TemplateKey(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Owned {
        template: String,
        mode: TemplateMode,
        filename: Option<String>,
        imports: Vec<String>,
        globals: BTreeMap<String, String>,
        dependencies: BTreeSet<String>,
    }

    impl Owned {
        fn new(template: &str) -> Self {
            Owned {
                template: template.to_string(),
                mode: TemplateMode::Markup,
                filename: None,
                imports: Vec::new(),
                globals: BTreeMap::new(),
                dependencies: BTreeSet::new(),
            }
        }

        fn key(&self) -> TemplateKey {
            TemplateKey::derive(&KeyInputs {
                template: &self.template,
                mode: self.mode,
                filename: self.filename.as_deref(),
                imports: &self.imports,
                global_types: &self.globals,
                dependencies: &self.dependencies,
            })
        }
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = Owned::new("<p>x</p>");
        assert_eq!(a.key(), a.key());
        assert_eq!(a.key().as_str().len(), TemplateKey::LEN);
    }

    #[test]
    fn test_key_sensitive_to_each_input() {
        let base = Owned::new("<p>x</p>");
        let base_key = base.key();

        let text = Owned::new("<p>y</p>");
        assert_ne!(text.key(), base_key);

        let mut globals = Owned::new("<p>x</p>");
        globals.globals.insert("name".into(), "str".into());
        assert_ne!(globals.key(), base_key);

        let mut deps = Owned::new("<p>x</p>");
        deps.dependencies.insert("text".into());
        assert_ne!(deps.key(), base_key);

        let mut imports = Owned::new("<p>x</p>");
        imports.imports.push("<div/>".into());
        assert_ne!(imports.key(), base_key);
    }

    #[test]
    fn test_key_sensitive_to_mode_and_filename() {
        let base = Owned::new("<p>x</p>");

        let mut text = Owned::new("<p>x</p>");
        text.mode = TemplateMode::Text;
        assert_ne!(text.key(), base.key());

        let mut named = Owned::new("<p>x</p>");
        named.filename = Some("a.pt".into());
        let mut renamed = Owned::new("<p>x</p>");
        renamed.filename = Some("b.pt".into());
        assert_ne!(named.key(), base.key());
        assert_ne!(named.key(), renamed.key());

        let mut empty_name = Owned::new("<p>x</p>");
        empty_name.filename = Some(String::new());
        assert_ne!(empty_name.key(), base.key());
    }

    #[test]
    fn test_key_fields_do_not_bleed() {
        let mut a = Owned::new("ab");
        a.imports.push("c".into());
        let mut b = Owned::new("a");
        b.imports.push("bc".into());
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_parse_validates_form() {
        let key = Owned::new("x").key();
        assert_eq!(TemplateKey::parse(key.as_str()), Some(key));
        assert!(TemplateKey::parse("xyz").is_none());
        assert!(TemplateKey::parse(&"A".repeat(64)).is_none());
    }
}
