use anyhow::Context as _;
use url::Url;

/// CloudFront distribution serving the legacy platform's HD renditions.
const CLOUDFRONT_BASE: &str = "https://d381hmu4snvm3e.cloudfront.net";

/// LTI launch endpoint of the target platform.
const LAUNCH_BASE: &str = "https://marsha.education/lti/videos";

/// Fixed `lti_consumer` configuration shared by every embed-shape node.
const EMBED_CONFIGURATION: [(&str, &str); 4] = [
    ("xblock-family", "xblock.v1"),
    ("inline_height", ""),
    ("lti_id", "marsha_production_video"),
    ("launch_target", "iframe"),
];

/// A course node as stored on disk: a tag plus an ordered attribute bag.
///
/// The course schema has an attribute-only content model; children are
/// either references (a bare `url_name`) or inline leaf nodes. Typed shapes
/// below convert to and from this form, nothing else inspects attributes
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_owned(), value.to_owned()));
        self
    }
}

/// Playable HD URL for a legacy asset id.
pub fn cloudfront_hd_url(video_id: &str) -> anyhow::Result<Url> {
    Url::parse(&format!("{CLOUDFRONT_BASE}/videos/{video_id}/HD.mp4"))
        .with_context(|| format!("build cloudfront url for video id: {video_id}"))
}

/// Short storage key under which the legacy store keeps the HD rendition.
pub fn videofront_key(video_id: &str) -> String {
    format!("videos/{}/HD.mp4", video_id.trim())
}

/// LTI launch URL for a resolved target-platform identifier.
pub fn launch_url(uuid: &str) -> anyhow::Result<Url> {
    Url::parse(&format!("{LAUNCH_BASE}/{uuid}"))
        .with_context(|| format!("build launch url for uuid: {uuid}"))
}

/// A legacy video reference found inside a vertical.
///
/// Two tags denote the same semantic entity in the legacy data:
/// `libcast_xblock` and, inconsistently, plain `video`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyVideoRef {
    /// `url_name` attribute. Absent only in broken exports; required once a
    /// leaf is actually converted.
    pub local_name: Option<String>,
    /// Legacy platform asset id. Absent means conversion is impossible.
    pub video_id: Option<String>,
    pub display_name: Option<String>,
    pub allow_download: Option<String>,
    /// `group_access` marker: the leaf already points at an external player
    /// and must not be migrated.
    pub restricted: bool,
}

impl LegacyVideoRef {
    /// Recognizes a convertible leaf. `None` for any other tag.
    pub fn from_element(element: &Element) -> Option<Self> {
        if element.tag != "libcast_xblock" && element.tag != "video" {
            return None;
        }

        Some(Self {
            local_name: element.attr("url_name").map(str::to_owned),
            video_id: element.attr("video_id").map(str::to_owned),
            display_name: element.attr("display_name").map(str::to_owned),
            allow_download: element.attr("allow_download").map(str::to_owned),
            restricted: element.has_attr("group_access"),
        })
    }
}

/// Direct-link output shape: a standalone `video` node file pointing at the
/// CloudFront HD rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectLinkVideo {
    pub url_name: String,
    pub display_name: String,
    pub download_video: String,
    pub hd_url: Url,
}

impl DirectLinkVideo {
    pub fn to_element(&self) -> anyhow::Result<Element> {
        let sources = serde_json::to_string(&[self.hd_url.as_str()])
            .context("serialize html5_sources list")?;

        let mut element = Element::new("video")
            .with_attr("url_name", &self.url_name)
            .with_attr("display_name", &self.display_name)
            .with_attr("download_video", &self.download_video)
            .with_attr("html5_sources", &sources)
            .with_attr("sub", "")
            .with_attr("youtube_id_1_0", "");
        element
            .children
            .push(Element::new("source").with_attr("src", self.hd_url.as_str()));

        Ok(element)
    }

    /// Reference inserted into the vertical in place of the legacy leaf.
    pub fn reference(&self) -> Element {
        Element::new("video").with_attr("url_name", &self.url_name)
    }
}

/// Embed output shape: an inline `lti_consumer` node delegating playback to
/// the target platform. Keeps the original leaf's local name so downstream
/// systems that key on it keep continuity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedConsumer {
    pub url_name: String,
    pub display_name: String,
    pub launch_url: Url,
}

impl EmbedConsumer {
    pub fn to_element(&self) -> Element {
        let mut element = Element::new("lti_consumer");
        for (key, value) in EMBED_CONFIGURATION {
            element = element.with_attr(key, value);
        }
        element
            .with_attr("launch_url", self.launch_url.as_str())
            .with_attr("display_name", &self.display_name)
            .with_attr("url_name", &self.url_name)
    }
}
