use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::archive;
use crate::cli::ConvertArgs;
use crate::discover::discover;
use crate::key::CourseKey;
use crate::manifest::{ManifestWriter, file_stem};
use crate::resolve::Overrides;
use crate::rewrite::rewrite_vertical;
use crate::tree_store::TreeStore;

pub fn run(args: ConvertArgs) -> anyhow::Result<()> {
    let course_key: CourseKey = args.course_key.parse().context("parse course key")?;

    let tree_root = locate_tree(Path::new(&args.path))?;
    let store = TreeStore::new(&tree_root);

    let overrides = match args.already_imported.as_deref() {
        Some(path) => {
            let overrides =
                Overrides::load(Path::new(path)).context("load already-imported table")?;
            tracing::info!(path, count = overrides.len(), "using already-imported table");
            overrides
        }
        None => Overrides::empty(),
    };

    let plan = discover(&store, &course_key, args.vertical.as_deref()).context("discover")?;
    tracing::info!(verticals = plan.verticals.len(), "discovery complete");

    let stem = file_stem(
        &plan.display_name,
        args.mode.label(),
        chrono::Local::now().date_naive(),
    );
    let out_dir = PathBuf::from(&args.out);
    let mut manifest = ManifestWriter::create(
        &out_dir,
        &stem,
        &args.consumer_site,
        course_key.as_str(),
    );

    // Verticals are processed in discovery order; each one is persisted
    // before its manifest rows, so an aborted run leaves a tree where every
    // recorded conversion is already on disk.
    for vertical_name in &plan.verticals {
        tracing::info!(vertical = vertical_name, "processing vertical");
        let vertical = store.read("vertical", vertical_name)?;
        let outcome = rewrite_vertical(&vertical, vertical_name, Some(args.mode), &overrides)?;

        if outcome.converted.is_empty() {
            continue;
        }

        if !outcome.created.is_empty() {
            store.ensure_folder("video")?;
            for node in &outcome.created {
                store.write(&node.element, node.node_type, &node.name)?;
            }
        }
        store.write(&outcome.vertical, "vertical", vertical_name)?;

        for leaf in &outcome.converted {
            manifest.append(&leaf.xblock_id, &leaf.videofront_key, &leaf.uuid)?;
        }
    }

    let manifest_path = manifest.path().to_owned();
    let rows = manifest.rows();
    manifest.finish()?;
    if rows > 0 {
        tracing::info!(rows, path = %manifest_path.display(), "manifest written");
    } else {
        tracing::warn!("no video references converted; no manifest written");
    }

    if args.create_archive {
        let archive_path = out_dir.join(format!("{stem}.tar.gz"));
        archive::pack(&tree_root, &archive_path)?;
    }

    Ok(())
}

/// An extracted tree is used as-is; a `.tar.gz` export is unpacked next to
/// itself first (replacing any leftover `course/` directory from a previous
/// run).
fn locate_tree(path: &Path) -> anyhow::Result<PathBuf> {
    if path.extension().and_then(|e| e.to_str()) != Some("gz") {
        anyhow::ensure!(
            path.is_dir(),
            "course path is neither a directory nor a .tar.gz export: {}",
            path.display()
        );
        return Ok(path.to_path_buf());
    }

    let parent = path
        .parent()
        .with_context(|| format!("archive path has no parent: {}", path.display()))?;
    let tree_root = parent.join("course");
    if tree_root.exists() {
        tracing::info!(path = %tree_root.display(), "removing leftover course directory");
        std::fs::remove_dir_all(&tree_root)
            .with_context(|| format!("remove leftover course dir: {}", tree_root.display()))?;
    }
    archive::extract(path, parent)?;
    anyhow::ensure!(
        tree_root.is_dir(),
        "archive did not contain a top-level course directory: {}",
        path.display()
    );
    Ok(tree_root)
}
