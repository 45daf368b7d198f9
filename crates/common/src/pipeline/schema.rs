//! Extraction schema
//!
//! The JSON contract the extraction call must honor, kept apart from the
//! natural-language instructions in `prompts` so either can change on its own.
//! The parser enforces `required` by kind and fills `default` when a field is
//! absent. Bump `version` whenever a key, kind or default changes.

/// Wire keys of an extracted source
pub mod keys {
    pub const ROOT: &str = "fontes";
    pub const TITLE: &str = "titulo";
    pub const AUTHORS: &str = "autores";
    pub const INSTITUTION: &str = "instituicao";
    pub const YEAR: &str = "ano_publicacao";
    pub const LINK: &str = "link";
    pub const ACCESS_TYPE: &str = "tipo_acesso";
    pub const DESCRIPTION: &str = "descricao";
}

/// Value kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Integer, or null when unknown
    Year,
    /// Absolute http(s) URL
    Url,
}

/// One field of an extracted source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
    /// Items without this field are dropped
    pub required: bool,
    /// Value filled in when the service omits the field
    pub default: Option<&'static str>,
    /// Description shown to the service in the shape example
    pub hint: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionSchema {
    pub version: u32,
    pub root: &'static str,
    pub fields: &'static [FieldSpec],
    /// Items beyond this count are ignored
    pub max_items: usize,
    /// Title prefix for items without a title, numbered from 1
    pub placeholder_title: &'static str,
}

pub const EXTRACTION_SCHEMA: ExtractionSchema = ExtractionSchema {
    version: 2,
    root: keys::ROOT,
    fields: &[
        FieldSpec {
            key: keys::TITLE,
            kind: FieldKind::Text,
            required: false,
            default: None,
            hint: "Título do conteúdo",
        },
        FieldSpec {
            key: keys::AUTHORS,
            kind: FieldKind::Text,
            required: false,
            default: None,
            hint: "Autor ou fonte do conteúdo",
        },
        FieldSpec {
            key: keys::INSTITUTION,
            kind: FieldKind::Text,
            required: false,
            default: None,
            hint: "Site ou plataforma de origem",
        },
        FieldSpec {
            key: keys::YEAR,
            kind: FieldKind::Year,
            required: false,
            default: None,
            hint: "ano (número) ou null",
        },
        FieldSpec {
            key: keys::LINK,
            kind: FieldKind::Url,
            required: true,
            default: None,
            hint: "URL completa e direta para o conteúdo",
        },
        FieldSpec {
            key: keys::ACCESS_TYPE,
            kind: FieldKind::Text,
            required: false,
            default: Some("Informação online"),
            hint: "Artigo, Vídeo, Tutorial, Documentação ou outro tipo apropriado",
        },
        FieldSpec {
            key: keys::DESCRIPTION,
            kind: FieldKind::Text,
            required: false,
            default: None,
            hint: "Breve descrição do conteúdo",
        },
    ],
    max_items: 8,
    placeholder_title: "Fonte",
};

impl ExtractionSchema {
    /// Look up a field by wire key
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Default value for `key`, if any
    pub fn default_for(&self, key: &str) -> Option<&'static str> {
        self.field(key).and_then(|f| f.default)
    }

    /// Placeholder title for the item at 1-based `position`
    pub fn placeholder_title(&self, position: usize) -> String {
        format!("{} {}", self.placeholder_title, position)
    }

    /// Shape example embedded in the extraction prompt, fields in schema order
    pub fn shape_example(&self) -> String {
        let fields = self
            .fields
            .iter()
            .map(|f| match f.kind {
                FieldKind::Year => format!("      \"{}\": {}", f.key, f.hint),
                FieldKind::Text | FieldKind::Url => format!("      \"{}\": \"{}\"", f.key, f.hint),
            })
            .collect::<Vec<_>>()
            .join(",\n");

        format!("{{\"{}\": [\n    {{\n{}\n    }},\n    ...\n]}}", self.root, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_link_is_required() {
        let required: Vec<_> = EXTRACTION_SCHEMA
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.key)
            .collect();
        assert_eq!(required, vec![keys::LINK]);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(
            EXTRACTION_SCHEMA.default_for(keys::ACCESS_TYPE),
            Some("Informação online")
        );
        assert_eq!(EXTRACTION_SCHEMA.default_for(keys::AUTHORS), None);
        assert_eq!(EXTRACTION_SCHEMA.placeholder_title(3), "Fonte 3");
    }

    #[test]
    fn test_shape_example_lists_every_key_in_order() {
        let example = EXTRACTION_SCHEMA.shape_example();
        assert!(example.starts_with("{\"fontes\": ["));

        let positions: Vec<usize> = EXTRACTION_SCHEMA
            .fields
            .iter()
            .map(|f| example.find(&format!("\"{}\"", f.key)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(example.contains("\"ano_publicacao\": ano (número) ou null"));
    }
}
