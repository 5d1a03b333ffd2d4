use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]+"#).expect("valid regex"))
}

/// Extension of an uploaded file, lower-cased; `png` when there is none.
pub fn file_extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "png".to_string())
}

/// Blob name for an upload: creation time in unix millis, a random suffix and
/// the original extension. Uploads within the same millisecond never share a name.
pub fn object_name(millis: i64, original_file_name: &str) -> String {
    format!(
        "{millis}-{}.{}",
        Uuid::new_v4().simple(),
        file_extension(original_file_name)
    )
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Local file name for a saved winner image: title plus fixed suffix.
pub fn download_file_name(title: &str, suffix: &str) -> String {
    let cleaned = unsafe_chars().replace_all(title.trim(), "_");
    let cleaned = cleaned.trim_matches('.');
    let base = if cleaned.is_empty() { "prize" } else { cleaned };
    format!("{base}{suffix}")
}
