use chrono::Utc;
use uuid::Uuid;

use super::OutputFormat;
use crate::lineage::Stage;

const MAX_NAME_LEN: usize = 80;

/// Lowercase ASCII file name with anything unusual collapsed to '-'
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches(|c| c == '-' || c == '.');
    let trimmed: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed
    }
}

/// File name without folders or extension
pub fn stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

pub fn gallery_path(file_name: &str) -> String {
    format!("{}{}-{}", Stage::Gallery.prefix(), Uuid::new_v4().simple(), sanitize_file_name(file_name))
}

/// Derived names carry the source stage, so copies of one image at different
/// stages never map to the same object
fn derived_stem(source: &str) -> String {
    format!("{}-{}", Stage::of_path(source), stem(source))
}

pub fn optimized_path(source: &str, format: OutputFormat, width: u32) -> String {
    format!("{}{}-{}w.{}", Stage::Optimized.prefix(), derived_stem(source), width, format.extension())
}

pub fn n8n_compatible_path(source: &str) -> String {
    format!("{}{}.png", Stage::N8nCompatible.prefix(), derived_stem(source))
}

/// Generated variants are never overwritten, each run gets its own name
pub fn n8n_generated_path(source: &str, extension: &str) -> String {
    format!(
        "{}{}-{}.{}",
        Stage::N8nGenerated.prefix(),
        stem(source),
        Utc::now().format("%Y%m%d%H%M%S%3f"),
        extension
    )
}

pub fn extension_for_content_type(content_type: &str) -> &'static str {
    match content_type.split(';').next().unwrap_or("").trim() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}
