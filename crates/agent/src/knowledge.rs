//! Support knowledge base: markdown documents handed to the support agent.
//!
//! Layout under the configured directory:
//! - `policies.md`
//! - `faq.md`
//! - `destinations/*.md`
//!
//! Missing or unreadable files are skipped with a warning so the service
//! still starts without reference material.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

const TOP_LEVEL_DOCUMENTS: [&str; 2] = ["policies.md", "faq.md"];
const DESTINATIONS_DIR: &str = "destinations";
/// Upper bound on the reference block sent with every support call.
pub const MAX_REFERENCE_BYTES: usize = 32 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnowledgeDocument {
    pub name: String,
    pub content: String,
}

#[derive(Clone, Debug, Default)]
pub struct KnowledgeBase {
    documents: Vec<KnowledgeDocument>,
}

impl KnowledgeBase {
    pub fn from_documents(documents: Vec<KnowledgeDocument>) -> Self {
        Self { documents }
    }

    pub fn load(directory: &Path) -> Self {
        let mut documents = Vec::new();

        for name in TOP_LEVEL_DOCUMENTS {
            if let Some(document) = read_document(&directory.join(name), name.to_owned()) {
                documents.push(document);
            }
        }

        let destinations = directory.join(DESTINATIONS_DIR);
        if destinations.is_dir() {
            for path in markdown_files(&destinations) {
                let name = path
                    .file_name()
                    .map(|file| format!("{DESTINATIONS_DIR}/{}", file.to_string_lossy()))
                    .unwrap_or_default();
                if let Some(document) = read_document(&path, name) {
                    documents.push(document);
                }
            }
        }

        info!(
            event_name = "knowledge.loaded",
            directory = %directory.display(),
            documents = documents.len(),
            bytes = documents.iter().map(|document| document.content.len()).sum::<usize>(),
            "support knowledge base loaded"
        );
        Self { documents }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn documents(&self) -> &[KnowledgeDocument] {
        &self.documents
    }

    /// Documents rendered as one reference block, or `None` when empty.
    ///
    /// Documents are added in load order until `MAX_REFERENCE_BYTES` is
    /// reached; the document that crosses the limit is cut at a char boundary
    /// and the rest are left out.
    pub fn reference_material(&self) -> Option<Arc<str>> {
        if self.documents.is_empty() {
            return None;
        }

        let mut rendered = String::new();
        for (index, document) in self.documents.iter().enumerate() {
            let separator = if rendered.is_empty() { "" } else { "\n\n" };
            let section = format!("{separator}### {}\n{}", document.name, document.content.trim());
            let remaining = MAX_REFERENCE_BYTES - rendered.len();
            if section.len() <= remaining {
                rendered.push_str(&section);
                continue;
            }

            rendered.push_str(truncate_at_char_boundary(&section, remaining));
            warn!(
                event_name = "knowledge.reference_truncated",
                limit_bytes = MAX_REFERENCE_BYTES,
                truncated_document = %document.name,
                omitted_documents = self.documents.len() - index - 1,
                "support reference material exceeds its size limit"
            );
            break;
        }
        Some(Arc::from(rendered))
    }
}

fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> &str {
    let mut end = max_bytes.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn read_document(path: &Path, name: String) -> Option<KnowledgeDocument> {
    if !path.is_file() {
        return None;
    }
    match fs::read_to_string(path) {
        Ok(content) => Some(KnowledgeDocument { name, content }),
        Err(error) => {
            warn!(
                event_name = "knowledge.read_failed",
                path = %path.display(),
                error = %error,
                "skipping unreadable knowledge document"
            );
            None
        }
    }
}

fn markdown_files(directory: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(error) => {
            warn!(
                event_name = "knowledge.read_failed",
                path = %directory.display(),
                error = %error,
                "skipping unreadable destinations directory"
            );
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|extension| extension == "md"))
        .collect();
    paths.sort();
    paths
}
