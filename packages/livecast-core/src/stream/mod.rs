//! Live streams: the configured priority table and resolved descriptors.

pub mod directory;

pub use directory::{
    DirectoryError, DirectoryResult, IcecastDirectoryResolver, StreamResolver, UrlTemplateResolver,
};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::DEFAULT_STREAM_MIME_TYPE;

/// A configured stream: its name and arbitration priority.
///
/// Higher `priority` wins. Optional fields override what the directory
/// reports when the stream is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    pub name: String,
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

impl StreamSpec {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            mime_type: None,
            title: None,
            subtitle: None,
        }
    }
}

/// A stream ready to be loaded on a device.
#[derive(Debug, Clone, Serialize)]
pub struct StreamDescriptor {
    pub name: String,
    pub priority: i32,
    pub playback_url: String,
    pub mime_type: String,
    pub display_title: String,
    pub display_subtitle: String,
    pub image_url: Option<String>,
}

/// Descriptors are the same stream when their names match.
impl PartialEq for StreamDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for StreamDescriptor {}

impl StreamDescriptor {
    /// Builds a descriptor for `spec`, preferring the spec's own display fields.
    pub(crate) fn from_spec(
        spec: &StreamSpec,
        playback_url: String,
        reported: ReportedFields,
        image_url: Option<String>,
    ) -> Self {
        Self {
            name: spec.name.clone(),
            priority: spec.priority,
            playback_url,
            mime_type: spec
                .mime_type
                .clone()
                .or(reported.mime_type)
                .unwrap_or_else(|| DEFAULT_STREAM_MIME_TYPE.to_string()),
            display_title: spec
                .title
                .clone()
                .or(reported.title)
                .unwrap_or_else(|| spec.name.clone()),
            display_subtitle: spec
                .subtitle
                .clone()
                .or(reported.subtitle)
                .unwrap_or_default(),
            image_url,
        }
    }
}

/// Display fields a directory reported for a stream.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReportedFields {
    pub mime_type: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
}

/// Configured streams keyed by name.
#[derive(Debug, Clone, Default)]
pub struct StreamTable {
    streams: HashMap<String, StreamSpec>,
}

impl StreamTable {
    /// Builds a table; a later spec with the same name replaces an earlier one.
    pub fn new(specs: impl IntoIterator<Item = StreamSpec>) -> Self {
        let streams = specs
            .into_iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect();
        Self { streams }
    }

    pub fn get(&self, name: &str) -> Option<&StreamSpec> {
        self.streams.get(name)
    }

    pub fn priority(&self, name: &str) -> Option<i32> {
        self.get(name).map(|spec| spec.priority)
    }

    /// Stream names, sorted for stable topic subscription order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.streams.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
