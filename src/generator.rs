// src/generator.rs
//! Download formats for a stored resume. PDF goes through the `typst` CLI in a
//! throwaway workspace; the other formats are produced in-process.

use chrono::{Datelike, Utc};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::core::FsOps;
use crate::template_processor::{render_html, RenderOptions};
use crate::template_system::TemplateId;
use crate::types::resume_data::{display_range, ResumeData};
use crate::utils::sanitize_filename;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Html,
    Json,
    Toml,
    Pdf,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "html" | "htm" => Some(Self::Html),
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Pdf => "pdf",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::Json => "application/json",
            Self::Toml => "application/toml",
            Self::Pdf => "application/pdf",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("typst is not installed; PDF export is unavailable")]
    PdfUnavailable,

    #[error("PDF compilation failed: {0}")]
    Compile(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization failed: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

#[derive(Debug)]
pub struct ExportedFile {
    pub filename: String,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

/// `<name>_Resume_<year>.<ext>`
pub fn export_filename(data: &ResumeData, format: ExportFormat) -> String {
    let name = sanitize_filename(&data.personal_info.full_name);
    let name = if name.is_empty() { "Untitled".to_string() } else { name };
    format!("{}_Resume_{}.{}", name, Utc::now().year(), format.extension())
}

pub struct ResumeExporter {
    output_dir: PathBuf,
    typst_binary: String,
}

impl ResumeExporter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            typst_binary: "typst".to_string(),
        }
    }

    pub fn with_typst_binary(mut self, binary: impl Into<String>) -> Self {
        self.typst_binary = binary.into();
        self
    }

    pub async fn export(
        &self,
        data: &ResumeData,
        template: TemplateId,
        format: ExportFormat,
    ) -> Result<ExportedFile, ExportError> {
        let bytes = match format {
            ExportFormat::Html => render_html(data, template, RenderOptions::default()).into_bytes(),
            ExportFormat::Json => serde_json::to_vec_pretty(data)?,
            ExportFormat::Toml => toml::to_string_pretty(data)?.into_bytes(),
            ExportFormat::Pdf => self.compile_pdf(data, template).await?,
        };

        Ok(ExportedFile {
            filename: export_filename(data, format),
            format,
            bytes,
        })
    }

    async fn compile_pdf(&self, data: &ResumeData, template: TemplateId) -> Result<Vec<u8>, ExportError> {
        FsOps::ensure_dir_exists(&self.output_dir).await?;
        let workspace = FsOps::create_workspace(&self.output_dir, "pdf").await?;

        let result = self.compile_in(&workspace, data, template).await;

        if let Err(e) = FsOps::remove_dir_all(&workspace).await {
            warn!("Failed to clean up PDF workspace {}: {}", workspace.display(), e);
        }

        result
    }

    async fn compile_in(
        &self,
        workspace: &Path,
        data: &ResumeData,
        template: TemplateId,
    ) -> Result<Vec<u8>, ExportError> {
        let source = typst_source(data, template);
        FsOps::write_file_safe(&workspace.join("main.typ"), &source).await?;

        let output = match Command::new(&self.typst_binary)
            .arg("compile")
            .arg("main.typ")
            .arg("resume.pdf")
            .current_dir(workspace)
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("typst binary '{}' not found", self.typst_binary);
                return Err(ExportError::PdfUnavailable);
            }
            Err(e) => return Err(ExportError::Compile(e.to_string())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!("typst compilation failed: {}", stderr);
            return Err(ExportError::Compile(stderr));
        }

        let pdf = FsOps::read_bytes(&workspace.join("resume.pdf")).await?;
        info!("Compiled resume PDF ({} bytes, {} template)", pdf.len(), template.slug());
        Ok(pdf)
    }
}

// ===== Typst source =====

/// Quote a value as a typst string literal
fn typst_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Free text as typst content: bullet lines become `list` items
fn typst_description(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let bullet = ['-', '*', '\u{2022}']
            .iter()
            .find_map(|m| line.strip_prefix(*m))
            .map(str::trim);
        match bullet {
            Some(item) if !item.is_empty() => {
                out.push_str(&format!("#list(text({}))\n", typst_str(item)))
            }
            Some(_) => {}
            None => out.push_str(&format!("#text({})\n\n", typst_str(line))),
        }
    }
    out
}

pub fn typst_source(data: &ResumeData, template: TemplateId) -> String {
    let style = template.style();
    let info = &data.personal_info;
    let mut src = String::new();

    src.push_str("#set page(paper: \"a4\", margin: (x: 18mm, y: 16mm))\n");
    src.push_str(&format!(
        "#set text(font: {}, size: {}, fill: rgb({}))\n",
        typst_str(style.pdf_font),
        if template == TemplateId::Minimal { "9.5pt" } else { "10.5pt" },
        typst_str(style.text)
    ));
    src.push_str("#set par(justify: false)\n");
    src.push_str(&format!("#let accent = rgb({})\n", typst_str(style.accent)));
    src.push_str(&format!("#let muted = rgb({})\n", typst_str(style.muted)));
    src.push_str(&format!(
        "#let section(title) = {{\n  v(8pt)\n  text(size: 11pt, weight: \"bold\", fill: accent, upper(title))\n  {}\n}}\n\n",
        if style.section_rule {
            "line(length: 100%, stroke: 0.5pt + accent)"
        } else {
            "v(2pt)"
        }
    ));

    let align = if style.centered_header { "center" } else { "left" };
    src.push_str(&format!("#align({})[\n", align));
    src.push_str(&format!(
        "  #text(size: 22pt, weight: \"bold\", fill: accent, {})\n",
        typst_str(info.full_name.trim())
    ));
    if !info.job_title.trim().is_empty() {
        src.push_str(&format!(
            "\n  #text(size: 12pt, fill: muted, {})\n",
            typst_str(info.job_title.trim())
        ));
    }
    let contact: Vec<&str> = [&info.email, &info.phone, &info.location, &info.linkedin, &info.website]
        .into_iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !contact.is_empty() {
        src.push_str(&format!(
            "\n  #text(size: 9pt, fill: muted, {})\n",
            typst_str(&contact.join("  |  "))
        ));
    }
    src.push_str("]\n\n");

    if !info.summary.trim().is_empty() {
        src.push_str("#section(\"Summary\")\n");
        src.push_str(&typst_description(&info.summary));
    }

    if !data.work_experience.is_empty() {
        src.push_str("#section(\"Experience\")\n");
        for job in &data.work_experience {
            let company: Vec<&str> = [job.company.trim(), job.location.trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect();
            src.push_str(&format!(
                "#grid(columns: (1fr, auto), text(weight: \"bold\", {}), text(fill: muted, {}))\n",
                typst_str(job.position.trim()),
                typst_str(&display_range(&job.start_date, &job.end_date, job.current))
            ));
            if !company.is_empty() {
                src.push_str(&format!("#text(fill: muted, {})\n\n", typst_str(&company.join(", "))));
            }
            src.push_str(&typst_description(&job.description));
            src.push_str("#v(4pt)\n");
        }
    }

    if !data.education.is_empty() {
        src.push_str("#section(\"Education\")\n");
        for edu in &data.education {
            let degree: Vec<&str> = [edu.degree.trim(), edu.field_of_study.trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect();
            let title = if degree.is_empty() {
                edu.institution.trim().to_string()
            } else {
                degree.join(" in ")
            };
            src.push_str(&format!(
                "#grid(columns: (1fr, auto), text(weight: \"bold\", {}), text(fill: muted, {}))\n",
                typst_str(&title),
                typst_str(&display_range(&edu.start_date, &edu.end_date, false))
            ));
            let mut sub: Vec<String> = [edu.institution.trim(), edu.location.trim()]
                .into_iter()
                .filter(|s| !s.is_empty() && *s != title)
                .map(str::to_string)
                .collect();
            if !edu.gpa.trim().is_empty() {
                sub.push(format!("GPA {}", edu.gpa.trim()));
            }
            if !sub.is_empty() {
                src.push_str(&format!("#text(fill: muted, {})\n\n", typst_str(&sub.join(", "))));
            }
        }
    }

    if !data.skills.is_empty() {
        src.push_str("#section(\"Skills\")\n");
        src.push_str(&format!("#text({})\n", typst_str(&data.skills.join("  \u{2022}  "))));
    }

    src
}
