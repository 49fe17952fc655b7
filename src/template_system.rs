// src/template_system.rs
//! Static template table. Records store the integer id; everything else about
//! a template (name, styling) is looked up here.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TemplateId {
    #[default]
    Modern,
    Classic,
    Minimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    pub id: i64,
    pub slug: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub accent_color: &'static str,
    pub font_family: &'static str,
}

/// Styling shared by the HTML and PDF renderers
#[derive(Debug, Clone, Copy)]
pub struct TemplateStyle {
    pub accent: &'static str,
    pub text: &'static str,
    pub muted: &'static str,
    pub font_stack: &'static str,
    /// Font handed to typst; it falls back to its bundled fonts when missing
    pub pdf_font: &'static str,
    pub centered_header: bool,
    pub section_rule: bool,
}

const MODERN: TemplateStyle = TemplateStyle {
    accent: "#2563eb",
    text: "#1f2937",
    muted: "#6b7280",
    font_stack: "'Inter', 'Helvetica Neue', Arial, sans-serif",
    pdf_font: "Inter",
    centered_header: false,
    section_rule: false,
};

const CLASSIC: TemplateStyle = TemplateStyle {
    accent: "#1f2937",
    text: "#111827",
    muted: "#4b5563",
    font_stack: "Georgia, 'Times New Roman', serif",
    pdf_font: "Linux Libertine",
    centered_header: true,
    section_rule: true,
};

const MINIMAL: TemplateStyle = TemplateStyle {
    accent: "#111111",
    text: "#222222",
    muted: "#777777",
    font_stack: "'Helvetica Neue', Helvetica, Arial, sans-serif",
    pdf_font: "Helvetica",
    centered_header: false,
    section_rule: false,
};

impl TemplateId {
    pub const ALL: [TemplateId; 3] = [TemplateId::Modern, TemplateId::Classic, TemplateId::Minimal];

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::Modern),
            2 => Some(Self::Classic),
            3 => Some(Self::Minimal),
            _ => None,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::Modern => 1,
            Self::Classic => 2,
            Self::Minimal => 3,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::Modern => "modern",
            Self::Classic => "classic",
            Self::Minimal => "minimal",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Modern => "Modern",
            Self::Classic => "Classic",
            Self::Minimal => "Minimal",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Modern => "Bold coloured header with an accent bar and a two-tone layout",
            Self::Classic => "Serif typography, centred header and ruled section titles",
            Self::Minimal => "Monochrome, compact layout that fits more on one page",
        }
    }

    pub fn style(self) -> &'static TemplateStyle {
        match self {
            Self::Modern => &MODERN,
            Self::Classic => &CLASSIC,
            Self::Minimal => &MINIMAL,
        }
    }

    pub fn info(self) -> TemplateInfo {
        let style = self.style();
        TemplateInfo {
            id: self.id(),
            slug: self.slug(),
            name: self.name(),
            description: self.description(),
            accent_color: style.accent,
            font_family: style.font_stack,
        }
    }

    /// Accepts either the numeric id or the slug, as query strings carry both
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(id) = value.parse::<i64>() {
            return Self::from_id(id);
        }
        Self::ALL
            .into_iter()
            .find(|t| t.slug().eq_ignore_ascii_case(value))
    }
}

pub fn list_templates() -> Vec<TemplateInfo> {
    TemplateId::ALL.iter().map(|t| t.info()).collect()
}

impl Serialize for TemplateId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.id())
    }
}

impl<'de> Deserialize<'de> for TemplateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = i64::deserialize(deserializer)?;
        Self::from_id(id)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown template id {}", id)))
    }
}
