use crate::error::SyncError;
use crate::models::{Batch, ExportData, FormattedDocument, NoteEntry, NotePost, PostKind};
use std::collections::HashMap;

/// Render every entry with its joined posts, in entry order.
pub fn format_documents(
    entries: &[NoteEntry],
    posts: &[NotePost],
    entry_link_base: &str,
) -> Vec<FormattedDocument> {
    let mut by_entry: HashMap<&str, Vec<&NotePost>> = HashMap::new();
    for post in posts {
        by_entry.entry(post.entry_id.as_str()).or_default().push(post);
    }

    entries
        .iter()
        .map(|entry| {
            let entry_posts: Vec<NotePost> = by_entry
                .get(entry.id.as_str())
                .map(|matched| matched.iter().map(|post| (*post).clone()).collect())
                .unwrap_or_default();

            let content = render_entry(entry, &entry_posts, entry_link_base);

            FormattedDocument {
                title: entry.title.clone(),
                id: entry.id.clone(),
                last_modified: entry.last_modified,
                posts: entry_posts,
                content,
            }
        })
        .collect()
}

/// Partition the formatted corpus into upload batches. Batch boundaries are
/// positional: concatenating all batches in order reproduces the formatted
/// entry list exactly once.
pub fn format_batches(
    data: &ExportData,
    batch_size: usize,
    entry_link_base: &str,
) -> Result<Vec<Batch>, SyncError> {
    if data.entries.is_empty() {
        return Err(SyncError::EmptyData);
    }

    let documents = format_documents(&data.entries, &data.posts, entry_link_base);
    let batch_size = batch_size.max(1);

    Ok(documents
        .chunks(batch_size)
        .map(|slice| Batch {
            entries: slice.to_vec(),
        })
        .collect())
}

fn render_entry(entry: &NoteEntry, posts: &[NotePost], entry_link_base: &str) -> String {
    let mut content = format!(
        "# {}\nView in Twos: {}/{}\n\n",
        entry.title,
        entry_link_base.trim_end_matches('/'),
        entry.id
    );

    let blocks: Vec<String> = posts.iter().map(render_post).collect();
    content.push_str(&blocks.join("\n"));
    content
}

fn render_post(post: &NotePost) -> String {
    let mut block = match post.kind {
        PostKind::Plain => format!("📝 {}", post.text),
        PostKind::Checkbox => {
            let glyph = if post.completed == Some(true) {
                "✅"
            } else {
                "⬜"
            };
            format!("{glyph} {}", post.text)
        }
        PostKind::Photo => format!("📷 {}", post.text),
        PostKind::Separator => "➖".to_string(),
        PostKind::Unknown => format!("- {}", post.text),
    };

    if post.kind == PostKind::Photo {
        if let Some(photo_url) = post.photo_urls.first() {
            block.push_str("\n  ");
            block.push_str(photo_url);
        }
    }

    if let Some(url) = post.url.as_deref().filter(|url| !url.is_empty()) {
        block.push_str("\n  ");
        block.push_str(url);
    }

    if !post.tags.is_empty() {
        let tags: Vec<String> = post.tags.iter().map(|tag| format!("#{tag}")).collect();
        block.push_str("\n  ");
        block.push_str(&tags.join(" "));
    }

    block
}
