use anyhow::Context as _;

use crate::key::CourseKey;
use crate::tree_store::TreeStore;

/// Worklist produced by walking the course hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoursePlan {
    pub display_name: String,
    /// Verticals containing at least one convertible leaf, in depth-first
    /// hierarchy order.
    pub verticals: Vec<String>,
}

/// Walks the course top-down (course → chapter → sequential → vertical) and
/// collects every vertical that contains at least one convertible leaf.
///
/// Never mutates anything. `only_vertical` bypasses traversal entirely and
/// narrows the worklist to that one name; the course root is still read and
/// checked against the key.
pub fn discover(
    store: &TreeStore,
    course_key: &CourseKey,
    only_vertical: Option<&str>,
) -> anyhow::Result<CoursePlan> {
    let root = store.read("", "course").context("read course root")?;
    let org = root.attr("org").context("course root has no org")?;
    let course = root.attr("course").context("course root has no course")?;
    anyhow::ensure!(
        org == course_key.org() && course == course_key.course(),
        "course key {} does not match course root ({org}/{course})",
        course_key.as_str()
    );

    let root_name = root
        .attr("url_name")
        .context("course root has no url_name")?;
    // This node holds the advanced settings, the chapter slots and the wiki
    // reference.
    let course_node = store
        .read("course", root_name)
        .context("read course chapter list")?;
    let display_name = course_node.attr("display_name").unwrap_or("").to_owned();
    tracing::info!(course = display_name, "walking course");

    if let Some(name) = only_vertical {
        tracing::info!(vertical = name, "vertical requested explicitly; skipping discovery");
        return Ok(CoursePlan {
            display_name,
            verticals: vec![name.to_owned()],
        });
    }

    let mut verticals = Vec::new();
    for slot in &course_node.children {
        // The wiki slot is a chapter-level entry with no node reference.
        let Some(chapter_name) = slot.attr("url_name") else {
            continue;
        };
        let chapter = store
            .read("chapter", chapter_name)
            .with_context(|| format!("read chapter: {chapter_name}"))?;
        tracing::info!(chapter = chapter.attr("display_name").unwrap_or(""), "  chapter");

        for sequential_ref in &chapter.children {
            let sequential_name = sequential_ref.attr("url_name").with_context(|| {
                format!("sequential reference without url_name in chapter {chapter_name}")
            })?;
            let sequential = store
                .read("sequential", sequential_name)
                .with_context(|| format!("read sequential: {sequential_name}"))?;
            tracing::info!(
                sequential = sequential.attr("display_name").unwrap_or(""),
                "    sequential"
            );

            for vertical_ref in &sequential.children {
                let vertical_name = vertical_ref.attr("url_name").with_context(|| {
                    format!("vertical reference without url_name in sequential {sequential_name}")
                })?;
                let vertical = store
                    .read("vertical", vertical_name)
                    .with_context(|| format!("read vertical: {vertical_name}"))?;
                tracing::info!(
                    vertical = vertical.attr("display_name").unwrap_or(""),
                    "      vertical"
                );

                let mut convertible = false;
                for leaf in &vertical.children {
                    if leaf.tag == "libcast_xblock" {
                        convertible = true;
                    }
                    if leaf.tag == "video" {
                        // The legacy data mixes shapes: some libcast leaves
                        // are tagged plain `video`.
                        tracing::warn!(vertical = vertical_name, "suspect video leaf");
                        convertible = true;
                    }
                }
                if convertible && !verticals.contains(&vertical_name.to_owned()) {
                    verticals.push(vertical_name.to_owned());
                }
            }
        }
    }

    Ok(CoursePlan {
        display_name,
        verticals,
    })
}
