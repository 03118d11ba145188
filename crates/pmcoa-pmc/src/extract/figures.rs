//! Figure discovery and caption lookup

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ids::image_identifier;
use super::tree::{Document, collapse_whitespace};

/// Caption given when no `graphic` in the document links to the image.
pub const NO_CAPTION: &str = "No caption found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    pub image_id: String,
    pub image_file_name: String,
    /// `<pmcid>/<file>`, relative to the media root
    pub image_path: String,
    pub caption: Option<String>,
    pub hash: Option<String>,
    pub position: usize,
}

/// Image files in `dir` with one of `extensions`, sorted by file name.
pub fn list_images(dir: &Path, extensions: &[String]) -> io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)));
        if matches {
            images.push(path);
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

/// Caption of the figure whose `graphic` links to `image_id`.
///
/// Linked graphic with no (or an empty) `caption` gives `""`; no linked
/// graphic at all gives [`NO_CAPTION`].
pub fn caption_for(doc: &Document, image_id: &str) -> String {
    let graphic = doc.find_all(doc.root(), "graphic").find(|&g| {
        doc.get(g)
            .href()
            .is_some_and(|href| image_identifier(href) == image_id)
    });
    let Some(graphic) = graphic else {
        return NO_CAPTION.to_string();
    };

    let container = doc
        .nearest_ancestor(graphic, "fig")
        .or(doc.get(graphic).parent)
        .unwrap_or(graphic);

    doc.find_first(container, "caption")
        .map(|c| collapse_whitespace(&doc.text_content(c)))
        .unwrap_or_default()
}

/// Figure set for the images in `article_dir`.
///
/// `doc` is `None` when the article document could not be parsed; captions
/// are then null rather than [`NO_CAPTION`].
pub fn figure_set(
    article_dir: &Path,
    pmcid: &str,
    doc: Option<&Document>,
    extensions: &[String],
) -> io::Result<Vec<Figure>> {
    let images = list_images(article_dir, extensions)?;
    let figures = images
        .iter()
        .enumerate()
        .map(|(position, path)| {
            let file_name = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            let image_id = image_identifier(&file_name);
            let caption = doc.map(|d| caption_for(d, &image_id));
            Figure {
                image_path: format!("{pmcid}/{file_name}"),
                hash: pmcoa_core::hash::file_digest(path),
                image_id,
                image_file_name: file_name,
                caption,
                position,
            }
        })
        .collect();
    Ok(figures)
}
