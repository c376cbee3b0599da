use hh_types::AssetKind;
use serde::{Deserialize, Serialize};

/// Default upload ceiling: 10 MiB.
pub const DEFAULT_MAX_ASSET_BYTES: u64 = 10 * 1024 * 1024;

/// Configuration of the core services.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Upload policy for every asset slot.
    pub assets: AssetPolicy,
    /// Bounds on user-supplied fields.
    pub limits: Limits,
}

/// Which files an asset slot accepts, checked before any upload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPolicy {
    /// Largest accepted payload, in bytes.
    pub max_bytes: u64,
    /// Extensions accepted by image, icon and photo slots.
    pub image_extensions: Vec<String>,
    /// Extensions accepted by the source-code slot.
    pub archive_extensions: Vec<String>,
    /// Extensions accepted by the markdown slot.
    pub markdown_extensions: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for AssetPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_ASSET_BYTES,
            image_extensions: strings(&["png", "jpg", "jpeg", "gif", "webp", "svg"]),
            archive_extensions: strings(&["zip", "tar", "gz", "tgz", "7z", "rar"]),
            markdown_extensions: strings(&["md", "markdown"]),
        }
    }
}

impl AssetPolicy {
    /// Extensions accepted for `kind`, lower-case.
    pub fn extensions(&self, kind: AssetKind) -> &[String] {
        match kind {
            AssetKind::Image => &self.image_extensions,
            AssetKind::Archive => &self.archive_extensions,
            AssetKind::Markdown => &self.markdown_extensions,
        }
    }

    pub fn allows(&self, kind: AssetKind, extension: &str) -> bool {
        self.extensions(kind)
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

/// Bounds on user-supplied fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_description_chars: usize,
    pub max_places: u32,
    pub max_questions: usize,
    pub max_question_chars: usize,
    pub max_tags: usize,
    pub max_tag_chars: usize,
    pub max_links: usize,
    pub max_link_chars: usize,
    pub max_authors: usize,
    pub max_answer_chars: usize,
    pub max_comment_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_description_chars: 2000,
            max_places: 10,
            max_questions: 5,
            max_question_chars: 500,
            max_tags: 10,
            max_tag_chars: 32,
            max_links: 5,
            max_link_chars: 2048,
            max_authors: 4,
            max_answer_chars: 2000,
            max_comment_chars: 1000,
        }
    }
}
