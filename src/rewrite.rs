use anyhow::Context as _;
use clap::ValueEnum;

use crate::node::{
    DirectLinkVideo, Element, EmbedConsumer, LegacyVideoRef, cloudfront_hd_url, launch_url,
    videofront_key,
};
use crate::resolve::{Overrides, fresh_node_name, resolve};

/// Target shape for converted video references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RewriteMode {
    /// Replace the leaf with a `video` node pointing at the CloudFront HD
    /// rendition directly.
    DirectLink,
    /// Replace the leaf with an `lti_consumer` node delegating playback to
    /// the target platform.
    Embed,
}

impl RewriteMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DirectLink => "direct-link",
            Self::Embed => "embed",
        }
    }
}

/// A node file the rewrite produced alongside the mutated vertical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedNode {
    pub node_type: &'static str,
    pub name: String,
    pub element: Element,
}

/// One converted leaf, ready to become a manifest row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedLeaf {
    pub xblock_id: String,
    pub videofront_key: String,
    /// Empty for the direct-link shape, which has no stable cross-reference.
    pub uuid: String,
}

#[derive(Debug)]
pub struct RewriteOutcome {
    pub vertical: Element,
    pub converted: Vec<ConvertedLeaf>,
    pub created: Vec<CreatedNode>,
}

/// Rewrites one vertical, replacing convertible leaves in place.
///
/// Pure: the output child sequence is built by mapping over the input one,
/// so ordering and child count are preserved by construction and all other
/// children pass through untouched. Persistence is the caller's job.
pub fn rewrite_vertical(
    vertical: &Element,
    vertical_name: &str,
    mode: Option<RewriteMode>,
    overrides: &Overrides,
) -> anyhow::Result<RewriteOutcome> {
    let mut converted = Vec::new();
    let mut created = Vec::new();
    let mut children = Vec::with_capacity(vertical.children.len());

    for child in &vertical.children {
        let replacement = rewrite_child(child, vertical_name, mode, overrides, &mut created)?;
        match replacement {
            Some((element, leaf)) => {
                children.push(element);
                converted.push(leaf);
            }
            None => children.push(child.clone()),
        }
    }

    Ok(RewriteOutcome {
        vertical: Element {
            tag: vertical.tag.clone(),
            attrs: vertical.attrs.clone(),
            children,
        },
        converted,
        created,
    })
}

fn rewrite_child(
    child: &Element,
    vertical_name: &str,
    mode: Option<RewriteMode>,
    overrides: &Overrides,
    created: &mut Vec<CreatedNode>,
) -> anyhow::Result<Option<(Element, ConvertedLeaf)>> {
    // Unrecognized tags pass through silently; legacy exports are known to
    // be inconsistent.
    let Some(leaf) = LegacyVideoRef::from_element(child) else {
        return Ok(None);
    };
    let Some(mode) = mode else {
        return Ok(None);
    };

    let Some(video_id) = leaf.video_id.as_deref() else {
        tracing::debug!(vertical = vertical_name, tag = %child.tag, "leaf has no video_id; conversion impossible, skipping");
        return Ok(None);
    };
    if leaf.restricted {
        tracing::debug!(vertical = vertical_name, tag = %child.tag, "leaf has group_access; external player reference, skipping");
        return Ok(None);
    }

    let local_name = leaf.local_name.clone().with_context(|| {
        format!("convertible leaf in vertical {vertical_name} has no url_name")
    })?;
    let videofront_key = videofront_key(video_id);

    match mode {
        RewriteMode::DirectLink => {
            let video = DirectLinkVideo {
                url_name: fresh_node_name(),
                display_name: leaf.display_name.clone().unwrap_or_default(),
                download_video: leaf
                    .allow_download
                    .clone()
                    .unwrap_or_else(|| "true".to_owned()),
                hd_url: cloudfront_hd_url(video_id)?,
            };
            tracing::info!(
                vertical = vertical_name,
                from = local_name,
                to = video.url_name,
                "replaced legacy leaf by direct-link video"
            );

            let reference = video.reference();
            created.push(CreatedNode {
                node_type: "video",
                name: video.url_name.clone(),
                element: video.to_element()?,
            });
            Ok(Some((
                reference,
                ConvertedLeaf {
                    xblock_id: local_name,
                    videofront_key,
                    uuid: String::new(),
                },
            )))
        }
        RewriteMode::Embed => {
            let uuid = resolve(&local_name, video_id, overrides);
            let consumer = EmbedConsumer {
                url_name: local_name.clone(),
                display_name: leaf.display_name.clone().unwrap_or_default(),
                launch_url: launch_url(&uuid)?,
            };
            tracing::info!(
                vertical = vertical_name,
                url_name = local_name,
                uuid,
                "replaced legacy leaf by lti_consumer keeping same id"
            );

            Ok(Some((
                consumer.to_element(),
                ConvertedLeaf {
                    xblock_id: local_name,
                    videofront_key,
                    uuid,
                },
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Overrides;

    fn fixture_vertical() -> Element {
        let mut vertical = Element::new("vertical").with_attr("display_name", "Week 1");
        vertical
            .children
            .push(Element::new("video").with_attr("url_name", "keep-me"));
        vertical
            .children
            .push(Element::new("problem").with_attr("url_name", "p1"));
        vertical.children.push(
            Element::new("libcast_xblock")
                .with_attr("url_name", "x-intro")
                .with_attr("video_id", "V2")
                .with_attr("display_name", "Intro"),
        );
        vertical
    }

    #[test]
    fn embed_replaces_in_place_and_keeps_local_name() -> anyhow::Result<()> {
        let vertical = fixture_vertical();
        let outcome = rewrite_vertical(
            &vertical,
            "vert-1",
            Some(RewriteMode::Embed),
            &Overrides::empty(),
        )?;

        assert_eq!(outcome.vertical.children.len(), 3);
        // The bare `video` leaf has no video_id and passes through unchanged.
        assert_eq!(outcome.vertical.children[0], vertical.children[0]);
        assert_eq!(outcome.vertical.children[1], vertical.children[1]);

        let consumer = &outcome.vertical.children[2];
        assert_eq!(consumer.tag, "lti_consumer");
        assert_eq!(consumer.attr("url_name"), Some("x-intro"));
        assert_eq!(consumer.attr("display_name"), Some("Intro"));

        let uuid = resolve("x-intro", "V2", &Overrides::empty());
        let launch = consumer.attr("launch_url").unwrap();
        assert!(launch.contains(&uuid), "launch url {launch} should contain {uuid}");

        assert!(outcome.created.is_empty());
        assert_eq!(outcome.converted.len(), 1);
        assert_eq!(outcome.converted[0].xblock_id, "x-intro");
        assert_eq!(outcome.converted[0].videofront_key, "videos/V2/HD.mp4");
        assert_eq!(outcome.converted[0].uuid, uuid);
        Ok(())
    }

    #[test]
    fn direct_link_creates_node_file_and_fresh_reference() -> anyhow::Result<()> {
        let vertical = fixture_vertical();
        let outcome = rewrite_vertical(
            &vertical,
            "vert-1",
            Some(RewriteMode::DirectLink),
            &Overrides::empty(),
        )?;

        let reference = &outcome.vertical.children[2];
        assert_eq!(reference.tag, "video");
        let new_name = reference.attr("url_name").unwrap();
        assert_ne!(new_name, "x-intro");

        assert_eq!(outcome.created.len(), 1);
        let node = &outcome.created[0];
        assert_eq!(node.node_type, "video");
        assert_eq!(node.name, new_name);
        assert_eq!(
            node.element.attr("html5_sources"),
            Some(r#"["https://d381hmu4snvm3e.cloudfront.net/videos/V2/HD.mp4"]"#)
        );
        assert_eq!(node.element.attr("download_video"), Some("true"));

        assert_eq!(outcome.converted.len(), 1);
        assert_eq!(outcome.converted[0].xblock_id, "x-intro");
        assert_eq!(outcome.converted[0].uuid, "");
        Ok(())
    }

    #[test]
    fn override_wins_in_embed_launch_url() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let table = dir.path().join("imported.csv");
        std::fs::write(
            &table,
            "xblock_id;uuid\nx-intro;99999999-9999-9999-9999-999999999999\n",
        )?;
        let overrides = Overrides::load(&table)?;

        let outcome = rewrite_vertical(
            &fixture_vertical(),
            "vert-1",
            Some(RewriteMode::Embed),
            &overrides,
        )?;
        assert_eq!(
            outcome.converted[0].uuid,
            "99999999-9999-9999-9999-999999999999"
        );
        assert!(
            outcome.vertical.children[2]
                .attr("launch_url")
                .unwrap()
                .ends_with("99999999-9999-9999-9999-999999999999")
        );
        Ok(())
    }

    #[test]
    fn missing_video_id_passes_through_without_record() -> anyhow::Result<()> {
        let mut vertical = Element::new("vertical");
        vertical
            .children
            .push(Element::new("libcast_xblock").with_attr("url_name", "x1"));

        let outcome = rewrite_vertical(
            &vertical,
            "vert-1",
            Some(RewriteMode::Embed),
            &Overrides::empty(),
        )?;
        assert_eq!(outcome.vertical, vertical);
        assert!(outcome.converted.is_empty());
        assert!(outcome.created.is_empty());
        Ok(())
    }

    #[test]
    fn restricted_leaf_passes_through_without_record() -> anyhow::Result<()> {
        let mut vertical = Element::new("vertical");
        vertical.children.push(
            Element::new("libcast_xblock")
                .with_attr("url_name", "x1")
                .with_attr("video_id", "V1")
                .with_attr("group_access", "{}"),
        );

        let outcome = rewrite_vertical(
            &vertical,
            "vert-1",
            Some(RewriteMode::Embed),
            &Overrides::empty(),
        )?;
        assert_eq!(outcome.vertical, vertical);
        assert!(outcome.converted.is_empty());
        Ok(())
    }

    #[test]
    fn disabled_mode_converts_nothing() -> anyhow::Result<()> {
        let vertical = fixture_vertical();
        let outcome = rewrite_vertical(&vertical, "vert-1", None, &Overrides::empty())?;
        assert_eq!(outcome.vertical, vertical);
        assert!(outcome.converted.is_empty());
        Ok(())
    }

    #[test]
    fn convertible_leaf_without_local_name_is_fatal() {
        let mut vertical = Element::new("vertical");
        vertical
            .children
            .push(Element::new("libcast_xblock").with_attr("video_id", "V1"));

        let err = rewrite_vertical(
            &vertical,
            "vert-1",
            Some(RewriteMode::Embed),
            &Overrides::empty(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no url_name"));
    }
}
