//! Export of a project as a document that word processors open.
//!
//! The output is an HTML page with a `.doc` extension, which Word and
//! LibreOffice both import with its styling intact.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::project::Project;

const BOM: char = '\u{feff}';

const STYLE: &str = "\
body { font-family: 'Times New Roman', serif; font-size: 12pt; line-height: 1.5; color: #000; }
h1 { text-align: center; font-size: 24pt; font-weight: bold; margin-bottom: 24px; text-transform: capitalize; }
.header { text-align: center; border-bottom: 1px solid #000; margin-bottom: 30px; padding-bottom: 20px; }
.department { text-transform: uppercase; font-weight: bold; font-size: 10pt; }
.meta { font-size: 10pt; color: #555; text-align: center; margin-bottom: 10px; }
.content { text-align: justify; white-space: pre-wrap; }
.footer { margin-top: 50px; font-size: 9pt; text-align: center; color: #888; border-top: 1px solid #ddd; padding-top: 10px; }";

/// Renders the project as a Word-compatible HTML document.
///
/// The result starts with a byte order mark.
pub fn render_word_document(project: &Project, date: NaiveDate) -> String {
    let title = escape_html(&project.title);
    let department = escape_html(project.category.department());
    let content = escape_html(&project.content);
    let date = date.format("%A, %B %-d, %Y");
    format!(
        "{BOM}<!DOCTYPE html>
<html>
<head>
<meta charset=\"utf-8\">
<title>{title}</title>
<style>
{STYLE}
</style>
</head>
<body>
<div class=\"header\">
<p class=\"department\">Department of {department}</p>
<h1>{title}</h1>
<div class=\"meta\"><p><strong>Date:</strong> {date}</p></div>
</div>
<div class=\"content\">{content}</div>
<div class=\"footer\">Generated by ProjectBuddy AI</div>
</body>
</html>
"
    )
}

/// Returns the file name for an exported project.
///
/// Every run of whitespace in the title becomes a single underscore.
/// Characters that are not allowed in file names are replaced as well.
pub fn export_filename(title: &str) -> String {
    let mut name = String::with_capacity(title.len() + 16);
    let mut in_whitespace = false;
    for c in title.chars() {
        if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
            name.push('_');
            in_whitespace = false;
        } else if c.is_whitespace() {
            if !in_whitespace {
                name.push('_');
            }
            in_whitespace = true;
        } else {
            name.push(c);
            in_whitespace = false;
        }
    }
    name.push_str("_Assignment.doc");
    name
}

/// Writes the exported project into `dir` and returns the file path.
pub async fn export_to_dir(
    dir: &Path,
    project: &Project,
    date: NaiveDate,
) -> io::Result<PathBuf> {
    let path = dir.join(export_filename(&project.title));
    tokio::fs::write(&path, render_word_document(project, date)).await?;
    debug!("exported {:?} to {}", project.id, path.display());
    Ok(path)
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
