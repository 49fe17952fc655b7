// src/template_processor.rs
//! Renders a resume record into a standalone, printable HTML document

use crate::template_system::{TemplateId, TemplateStyle};
use crate::types::resume_data::{display_range, Education, PersonalInfo, ResumeData, WorkExperience};

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Open the browser print dialog once the page has loaded
    pub auto_print: bool,
}

pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn bullet_text(line: &str) -> Option<&str> {
    let line = line.trim_start();
    ['-', '*', '\u{2022}']
        .iter()
        .find_map(|marker| line.strip_prefix(*marker))
        .map(str::trim)
}

/// Free text to HTML: bullet lines become lists, other lines keep their breaks
pub fn format_description(text: &str) -> String {
    let mut html = String::new();
    let mut paragraph: Vec<String> = Vec::new();
    let mut bullets: Vec<String> = Vec::new();

    fn flush_paragraph(html: &mut String, lines: &mut Vec<String>) {
        if !lines.is_empty() {
            html.push_str(&format!("<p>{}</p>", lines.join("<br>")));
            lines.clear();
        }
    }

    fn flush_bullets(html: &mut String, items: &mut Vec<String>) {
        if !items.is_empty() {
            html.push_str("<ul>");
            for item in items.iter() {
                html.push_str(&format!("<li>{}</li>", item));
            }
            html.push_str("</ul>");
            items.clear();
        }
    }

    for line in text.lines() {
        if line.trim().is_empty() {
            flush_paragraph(&mut html, &mut paragraph);
            flush_bullets(&mut html, &mut bullets);
            continue;
        }
        match bullet_text(line) {
            Some(item) => {
                flush_paragraph(&mut html, &mut paragraph);
                if !item.is_empty() {
                    bullets.push(html_escape(item));
                }
            }
            None => {
                flush_bullets(&mut html, &mut bullets);
                paragraph.push(html_escape(line.trim()));
            }
        }
    }
    flush_paragraph(&mut html, &mut paragraph);
    flush_bullets(&mut html, &mut bullets);
    html
}

fn stylesheet(template: TemplateId) -> String {
    let s: &TemplateStyle = template.style();

    let mut css = format!(
        r#"@page {{ size: A4; margin: 16mm 18mm; }}
* {{ box-sizing: border-box; }}
body {{ margin: 0; font-family: {font}; color: {text}; font-size: 10.5pt; line-height: 1.45; background: #f3f4f6; }}
.resume {{ width: 210mm; min-height: 297mm; margin: 0 auto; padding: 16mm 18mm; background: #fff; }}
h1 {{ margin: 0; font-size: 24pt; color: {accent}; }}
.headline {{ margin: 2pt 0 6pt; font-size: 12pt; color: {muted}; }}
.contact {{ margin: 0; padding: 0; list-style: none; color: {muted}; font-size: 9.5pt; }}
.contact li {{ display: inline; }}
.contact li + li::before {{ content: " | "; }}
section {{ margin-top: 14pt; }}
h2 {{ margin: 0 0 6pt; font-size: 11pt; letter-spacing: 0.08em; text-transform: uppercase; color: {accent}; }}
.entry {{ margin-bottom: 9pt; page-break-inside: avoid; break-inside: avoid; }}
.entry-head {{ display: flex; justify-content: space-between; gap: 12pt; }}
.entry-title {{ font-weight: 600; }}
.entry-sub {{ color: {muted}; }}
.dates {{ color: {muted}; white-space: nowrap; font-size: 9.5pt; }}
.entry p, .summary p {{ margin: 3pt 0; }}
.entry ul {{ margin: 3pt 0; padding-left: 14pt; }}
.skills {{ margin: 0; padding: 0; list-style: none; }}
.skills li {{ display: inline-block; margin: 0 4pt 4pt 0; }}
@media print {{ body {{ background: #fff; }} .resume {{ width: auto; min-height: auto; margin: 0; padding: 0; }} }}
"#,
        font = s.font_stack,
        text = s.text,
        accent = s.accent,
        muted = s.muted,
    );

    match template {
        TemplateId::Modern => css.push_str(&format!(
            "header {{ border-left: 6pt solid {accent}; padding-left: 12pt; }}\n\
             .skills li {{ padding: 2pt 8pt; border-radius: 10pt; background: #eff6ff; color: {accent}; }}\n",
            accent = s.accent
        )),
        TemplateId::Classic => css.push_str(
            "h1 { font-size: 22pt; letter-spacing: 0.04em; }\n\
             .skills li + li::before { content: \"\\2022  \"; }\n",
        ),
        TemplateId::Minimal => css.push_str(
            "body { font-size: 10pt; line-height: 1.35; }\n\
             h1 { font-size: 18pt; font-weight: 600; }\n\
             h2 { font-size: 9.5pt; }\n\
             section { margin-top: 10pt; }\n\
             .skills li + li::before { content: \", \"; }\n\
             .skills li { margin: 0; }\n",
        ),
    }

    if s.centered_header {
        css.push_str("header { text-align: center; }\n");
    }
    if s.section_rule {
        css.push_str(&format!(
            "h2 {{ border-bottom: 1px solid {}; padding-bottom: 2pt; }}\n",
            s.accent
        ));
    }

    css
}

fn render_header(info: &PersonalInfo) -> String {
    let mut html = String::from("<header>");
    let name = if info.full_name.trim().is_empty() {
        "Your Name"
    } else {
        info.full_name.trim()
    };
    html.push_str(&format!("<h1>{}</h1>", html_escape(name)));

    if !info.job_title.trim().is_empty() {
        html.push_str(&format!(
            "<p class=\"headline\">{}</p>",
            html_escape(info.job_title.trim())
        ));
    }

    let contact: Vec<&str> = [
        &info.email,
        &info.phone,
        &info.location,
        &info.linkedin,
        &info.website,
    ]
    .into_iter()
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .collect();

    if !contact.is_empty() {
        html.push_str("<ul class=\"contact\">");
        for item in contact {
            html.push_str(&format!("<li>{}</li>", html_escape(item)));
        }
        html.push_str("</ul>");
    }

    html.push_str("</header>");
    html
}

fn render_experience(entries: &[WorkExperience]) -> String {
    let mut html = String::from("<section class=\"experience\"><h2>Experience</h2>");
    for job in entries {
        let subtitle: Vec<&str> = [job.company.trim(), job.location.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();

        html.push_str("<div class=\"entry\"><div class=\"entry-head\"><div>");
        html.push_str(&format!(
            "<div class=\"entry-title\">{}</div>",
            html_escape(job.position.trim())
        ));
        if !subtitle.is_empty() {
            html.push_str(&format!(
                "<div class=\"entry-sub\">{}</div>",
                html_escape(&subtitle.join(", "))
            ));
        }
        html.push_str("</div>");

        let dates = display_range(&job.start_date, &job.end_date, job.current);
        if !dates.is_empty() {
            html.push_str(&format!("<div class=\"dates\">{}</div>", html_escape(&dates)));
        }
        html.push_str("</div>");
        html.push_str(&format_description(&job.description));
        html.push_str("</div>");
    }
    html.push_str("</section>");
    html
}

fn render_education(entries: &[Education]) -> String {
    let mut html = String::from("<section class=\"education\"><h2>Education</h2>");
    for edu in entries {
        let degree = match (edu.degree.trim(), edu.field_of_study.trim()) {
            ("", "") => String::new(),
            (d, "") => d.to_string(),
            ("", f) => f.to_string(),
            (d, f) => format!("{} in {}", d, f),
        };

        let mut sub: Vec<String> = [edu.institution.trim(), edu.location.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !edu.gpa.trim().is_empty() {
            sub.push(format!("GPA {}", edu.gpa.trim()));
        }

        html.push_str("<div class=\"entry\"><div class=\"entry-head\"><div>");
        let title = if degree.is_empty() {
            edu.institution.trim().to_string()
        } else {
            degree
        };
        html.push_str(&format!(
            "<div class=\"entry-title\">{}</div>",
            html_escape(&title)
        ));
        if !sub.is_empty() {
            html.push_str(&format!(
                "<div class=\"entry-sub\">{}</div>",
                html_escape(&sub.join(", "))
            ));
        }
        html.push_str("</div>");

        let dates = display_range(&edu.start_date, &edu.end_date, false);
        if !dates.is_empty() {
            html.push_str(&format!("<div class=\"dates\">{}</div>", html_escape(&dates)));
        }
        html.push_str("</div></div>");
    }
    html.push_str("</section>");
    html
}

fn render_skills(skills: &[String]) -> String {
    let mut html = String::from("<section class=\"skills-section\"><h2>Skills</h2><ul class=\"skills\">");
    for skill in skills {
        html.push_str(&format!("<li>{}</li>", html_escape(skill)));
    }
    html.push_str("</ul></section>");
    html
}

/// Full HTML document for one resume in the given template
pub fn render_html(data: &ResumeData, template: TemplateId, options: RenderOptions) -> String {
    let info = &data.personal_info;
    let title = if info.full_name.trim().is_empty() {
        "Resume".to_string()
    } else {
        format!("{} - Resume", info.full_name.trim())
    };

    let mut body = render_header(info);

    if !info.summary.trim().is_empty() {
        body.push_str("<section class=\"summary\"><h2>Summary</h2>");
        body.push_str(&format_description(&info.summary));
        body.push_str("</section>");
    }
    if !data.work_experience.is_empty() {
        body.push_str(&render_experience(&data.work_experience));
    }
    if !data.education.is_empty() {
        body.push_str(&render_education(&data.education));
    }
    if !data.skills.is_empty() {
        body.push_str(&render_skills(&data.skills));
    }

    let print_script = if options.auto_print {
        "<script>window.addEventListener('load', function () { window.print(); });</script>"
    } else {
        ""
    };

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>\n{css}</style>\n</head>\n\
         <body class=\"template-{slug}\">\n<main class=\"resume\">{body}</main>\n{script}\n</body>\n</html>\n",
        title = html_escape(&title),
        css = stylesheet(template),
        slug = template.slug(),
        body = body,
        script = print_script,
    )
}
