//! EPUB loading: walk the spine, strip markup, remember where each chapter
//! starts so the table of contents can be mapped onto pages later.

use super::backend::RawOutlineItem;
use super::reflow::{ChapterAnchor, ReflowBackend};
use super::text::clean_text;
use anyhow::{Context, Result};
use epub::doc::{EpubDoc, NavPoint};
use std::io::{Read, Seek};
use tracing::{debug, info, warn};

pub fn load_epub<R: Read + Seek>(reader: R) -> Result<ReflowBackend> {
    let mut doc = EpubDoc::from_reader(reader).context("Failed to open EPUB container")?;

    let mut combined = String::new();
    let mut anchors = Vec::new();
    let mut chapters = 0usize;

    loop {
        let path = doc
            .get_current_path()
            .map(|p| p.to_string_lossy().into_owned());
        if let Some((chapter, _mime)) = doc.get_current_str() {
            chapters += 1;
            // Very large width so no hard line breaks get baked in.
            let plain = match html2text::from_read(chapter.as_bytes(), 10_000) {
                Ok(clean) => clean,
                Err(err) => {
                    warn!(chapter = chapters, "html2text failed: {err}");
                    chapter
                }
            };
            let plain = clean_text(&plain);
            if !plain.is_empty() && !combined.is_empty() {
                combined.push_str("\n\n");
            }
            if let Some(path) = path {
                anchors.push(ChapterAnchor {
                    path,
                    offset: combined.len(),
                });
            }
            debug!(
                chapter = chapters,
                added_chars = plain.len(),
                "Parsed chapter"
            );
            combined.push_str(&plain);
        }

        if !doc.go_next() {
            break;
        }
    }

    let toc = doc.toc.iter().map(outline_item).collect::<Vec<_>>();
    info!(
        chapters,
        toc_entries = toc.len(),
        total_chars = combined.len(),
        "Finished loading EPUB content"
    );
    Ok(ReflowBackend::with_chapters(combined, anchors, toc))
}

fn outline_item(point: &NavPoint) -> RawOutlineItem {
    RawOutlineItem {
        title: point.label.trim().to_string(),
        target: point.content.to_string_lossy().into_owned(),
        children: point.children.iter().map(outline_item).collect(),
    }
}
