use std::fs::File;
use std::path::Path;

use anyhow::Context as _;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Unpacks a `.tar.gz` course export into `dest`. The archive carries its
/// own top-level `course/` directory.
pub fn extract(archive: &Path, dest: &Path) -> anyhow::Result<()> {
    tracing::info!(archive = %archive.display(), dest = %dest.display(), "extracting course export");

    let file =
        File::open(archive).with_context(|| format!("open archive: {}", archive.display()))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.unpack(dest)
        .with_context(|| format!("unpack archive: {}", archive.display()))?;

    Ok(())
}

/// Packs the rewritten tree into a studio-importable `.tar.gz`, rooted at a
/// top-level `course/` directory as the original export was.
pub fn pack(tree: &Path, archive: &Path) -> anyhow::Result<()> {
    tracing::info!(tree = %tree.display(), archive = %archive.display(), "packing converted course");

    if let Some(dir) = archive.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create archive dir: {}", dir.display()))?;
    }

    let file =
        File::create(archive).with_context(|| format!("create archive: {}", archive.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder
        .append_dir_all("course", tree)
        .with_context(|| format!("append course tree: {}", tree.display()))?;
    let encoder = builder
        .into_inner()
        .with_context(|| format!("finish archive: {}", archive.display()))?;
    encoder
        .finish()
        .with_context(|| format!("finish archive: {}", archive.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_then_extract_roundtrips_the_tree() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let tree = dir.path().join("tree");
        std::fs::create_dir_all(tree.join("vertical"))?;
        std::fs::write(tree.join("course.xml"), "<course org=\"FUN\"/>")?;
        std::fs::write(tree.join("vertical").join("v1.xml"), "<vertical/>")?;

        let archive = dir.path().join("out").join("course.tar.gz");
        pack(&tree, &archive)?;
        assert!(archive.exists());

        let unpacked = dir.path().join("unpacked");
        extract(&archive, &unpacked)?;
        let root = unpacked.join("course");
        assert_eq!(
            std::fs::read_to_string(root.join("course.xml"))?,
            "<course org=\"FUN\"/>"
        );
        assert!(root.join("vertical").join("v1.xml").exists());
        Ok(())
    }
}
