//! The write-side cell model.
//!
//! The service accepts exactly one content field per cell (`formula`, `value` or `objectValue`)
//! and ignores or rejects hyperlinks, images and cell links on a formula cell. `CellContent` makes
//! those combinations unrepresentable: links only exist on the non-formula variants.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// The content of a cell write, one variant per mutually exclusive content field.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    /// A formula such as `=[Start Date]@row - [End Date]@row`. Carries no links.
    Formula(String),
    /// A literal value. `Value::Null` is written explicitly as `"value": null`.
    Literal { value: Value, links: CellLinks },
    /// A typed object value (contacts, multi-pick lists, dates...). Supersedes a literal value.
    Object { object_value: Value, links: CellLinks },
}

impl CellContent {
    pub fn null() -> Self {
        CellContent::Literal {
            value: Value::Null,
            links: CellLinks::default(),
        }
    }
}

/// Link-like attributes that are only valid on a cell without a formula.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellLinks {
    pub hyperlink: Option<Value>,
    pub image: Option<Value>,
    pub link_in_from_cell: Option<Value>,
    pub links_out_to_cells: Option<Value>,
}

/// Attributes that may accompany any content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellStyle {
    pub format: Option<String>,
    pub conditional_format: Option<String>,
    pub override_validation: Option<bool>,
    pub strict: Option<bool>,
}

/// A write-ready cell payload for the add/update rows endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub column_id: i64,
    pub content: CellContent,
    pub style: CellStyle,
}

impl Serialize for CellWrite {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("columnId", &self.column_id)?;
        let links = match &self.content {
            CellContent::Formula(formula) => {
                map.serialize_entry("formula", formula)?;
                None
            }
            CellContent::Literal { value, links } => {
                map.serialize_entry("value", value)?;
                Some(links)
            }
            CellContent::Object {
                object_value,
                links,
            } => {
                map.serialize_entry("objectValue", object_value)?;
                Some(links)
            }
        };
        if let Some(links) = links {
            if let Some(v) = &links.hyperlink {
                map.serialize_entry("hyperlink", v)?;
            }
            if let Some(v) = &links.image {
                map.serialize_entry("image", v)?;
            }
            if let Some(v) = &links.link_in_from_cell {
                map.serialize_entry("linkInFromCell", v)?;
            }
            if let Some(v) = &links.links_out_to_cells {
                map.serialize_entry("linksOutToCells", v)?;
            }
        }
        let style = &self.style;
        if let Some(v) = &style.format {
            map.serialize_entry("format", v)?;
        }
        if let Some(v) = &style.conditional_format {
            map.serialize_entry("conditionalFormat", v)?;
        }
        if let Some(v) = style.override_validation {
            map.serialize_entry("overrideValidation", &v)?;
        }
        if let Some(v) = style.strict {
            map.serialize_entry("strict", &v)?;
        }
        map.end()
    }
}

/// A row to append with `POST /sheets/{id}/rows`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRow {
    pub to_bottom: bool,
    pub cells: Vec<CellWrite>,
}
