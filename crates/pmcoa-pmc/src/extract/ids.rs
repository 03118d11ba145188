//! Identifier normalization shared by figures and context linking

/// Extensions stripped when deriving an image identifier.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "tif", "tiff", "eps"];

/// Make `fig-1` and `fig.1` compare equal.
pub fn normalize_rid(rid: &str) -> String {
    rid.trim().replace('-', ".")
}

/// Image identifier of a link target or media file name.
///
/// Takes the last path segment and drops a trailing image extension.
/// `pone.0012345.g001` (no extension, as in most `xlink:href`s) and
/// `pone.0012345.g001.jpg` (the media file) both yield `pone.0012345.g001`.
pub fn image_identifier(href: &str) -> String {
    let base = href.rsplit(['/', '\\']).next().unwrap_or(href);
    match base.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && IMAGE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)) =>
        {
            stem.to_string()
        }
        _ => base.to_string(),
    }
}
