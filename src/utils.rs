use indicatif::HumanBytes;
use std::path::{Path, PathBuf};
use url::Url;

/// Formats "written/total" for display next to the progress fraction.
pub fn progress_label(written: u64, total: Option<u64>) -> String {
    match total {
        Some(total) => format!("{}/{}", HumanBytes(written), HumanBytes(total)),
        None => format!("{}/unknown", HumanBytes(written)),
    }
}

/// The user's downloads directory, falling back to `./downloads`.
pub fn downloads_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("downloads"))
}

/// Picks the name the remote end suggests for a resource.
///
/// `Content-Disposition` wins over the last segment of the URL path.
pub fn suggested_filename(content_disposition: Option<&str>, url: &Url) -> Option<String> {
    content_disposition
        .and_then(parse_content_disposition)
        .or_else(|| filename_from_url(url))
        .map(|name| sanitize_filename(&name))
        .filter(|name| !name.is_empty() && name != "." && name != "..")
}

pub fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    if segment.is_empty() {
        return None;
    }
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .ok()
        .or_else(|| Some(segment.to_string()))
}

/// Extracts the filename from a `Content-Disposition` header value.
///
/// Parameter names are matched case-insensitively and the RFC 5987
/// `filename*` form wins over plain `filename`.
pub fn parse_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in value.split(';').skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'language'percent-encoded
                let encoded = raw.splitn(3, '\'').nth(2).unwrap_or(raw);
                if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"')) {
                    extended = Some(decoded.into_owned());
                }
            }
            "filename" => plain = Some(raw.trim_matches('"').to_string()),
            _ => {}
        }
    }

    extended.or(plain).filter(|name| !name.is_empty())
}

/// Keeps only the final path component and replaces characters that are
/// unsafe in filenames.
pub fn sanitize_filename(filename: &str) -> String {
    let last = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    last.trim().replace(
        |c: char| c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|'),
        "_",
    )
}

/// A collision-free name for content the remote end did not name.
pub fn fallback_filename() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn destination_for(dir: &Path, suggested: Option<&str>) -> PathBuf {
    match suggested {
        Some(name) if !name.is_empty() => dir.join(name),
        _ => dir.join(fallback_filename()),
    }
}
