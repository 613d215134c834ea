// Post payload: everything sent to the posts endpoint is derived here from
// one export record and the configured post options.

use crate::config::PostOptions;
use crate::export::MediaRecord;
use serde::Serialize;

const MAP_SEARCH_URL: &str = "https://www.openstreetmap.org/search?query=";
const MOBILEDOC_VERSION: &str = "0.3.1";
const PIN: &str = "\u{1F4CD}";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub id: String,
}

/// Body of one entry of `{ "posts": [...] }`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PostPayload {
    pub feature_image: Option<String>,
    pub custom_template: Option<String>,
    pub page: bool,
    pub slug: String,
    pub status: &'static str,
    pub title: String,
    /// Serialized mobiledoc document, not a nested object.
    pub mobiledoc: Option<String>,
    pub published_at: String,
    pub updated_at: String,
    pub created_at: String,
    pub tags: Option<Vec<TagRef>>,
}

impl PostPayload {
    pub fn build(record: &MediaRecord, feature_image: Option<String>, options: &PostOptions) -> Self {
        PostPayload {
            feature_image,
            custom_template: options.custom_template.clone(),
            page: false,
            slug: slug_from_path(&record.path),
            status: "published",
            title: title_for(record, options),
            mobiledoc: body_for(record, options),
            published_at: record.taken_at.clone(),
            updated_at: record.taken_at.clone(),
            created_at: record.taken_at.clone(),
            tags: options
                .tag_id
                .as_ref()
                .map(|id| vec![TagRef { id: id.clone() }]),
        }
    }
}

/// File name without directories and without a trailing `.jpg`.
///
/// Only the exact lowercase `.jpg` suffix is removed: `photo.png` stays
/// `photo.png`, and so does `photo.JPG`.
pub fn slug_from_path(path: &str) -> String {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.strip_suffix(".jpg").unwrap_or(name).to_string()
}

pub fn title_for(record: &MediaRecord, options: &PostOptions) -> String {
    if !options.set_caption_as_title {
        return String::new();
    }
    record.caption.clone().unwrap_or_default()
}

fn body_for(record: &MediaRecord, options: &PostOptions) -> Option<String> {
    if !options.add_location_to_post {
        return None;
    }
    record.location.as_deref().map(location_mobiledoc)
}

pub fn map_search_url(location: &str) -> String {
    format!("{}{}", MAP_SEARCH_URL, urlencoding::encode(location))
}

/// One paragraph: a pin, then the location linked to a map search.
pub fn location_mobiledoc(location: &str) -> String {
    let doc = serde_json::json!({
        "version": MOBILEDOC_VERSION,
        "atoms": [],
        "cards": [],
        "markups": [["a", ["href", map_search_url(location)]]],
        "sections": [[1, "p", [
            [0, [], 0, PIN],
            [0, [0], 1, location]
        ]]]
    });
    doc.to_string()
}
