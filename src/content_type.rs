use anyhow::Context as _;
use regex::Regex;

use crate::transfer::BlobStore;

/// Rendition objects the upload pipeline tagged with the wrong content type.
const RENDITION_PATTERN: &str = r"^.*/mp4/.*_(1080|720|480|240|144)\.mp4$";

const TARGET_CONTENT_TYPE: &str = "binary/octet-stream";

/// Batch fix for mp4 renditions in the target store: every matching key is
/// re-copied in place with `binary/octet-stream` so browsers download
/// instead of streaming. Returns the number of objects updated.
pub fn fix(store: &mut dyn BlobStore) -> anyhow::Result<usize> {
    let pattern = Regex::new(RENDITION_PATTERN).context("compile rendition pattern")?;

    let mut updated = 0;
    for key in store.list("")? {
        if !pattern.is_match(&key) {
            continue;
        }
        tracing::info!(key, "updating content type");
        store.set_content_type(&key, TARGET_CONTENT_TYPE)?;
        updated += 1;
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct FakeStore {
        objects: Vec<String>,
        updates: Vec<(String, String)>,
    }

    impl BlobStore for FakeStore {
        fn copy(
            &mut self,
            _source_key: &str,
            _dest_bucket: &str,
            _dest_key: &str,
        ) -> anyhow::Result<()> {
            anyhow::bail!("content-type fix never copies across stores")
        }

        fn list(&mut self, _prefix: &str) -> anyhow::Result<Vec<String>> {
            Ok(self.objects.clone())
        }

        fn set_content_type(&mut self, key: &str, content_type: &str) -> anyhow::Result<()> {
            self.updates
                .push((key.to_owned(), content_type.to_owned()));
            Ok(())
        }
    }

    #[test]
    fn updates_only_rendition_keys() -> anyhow::Result<()> {
        let mut store = FakeStore {
            objects: vec![
                "aws/xyz/mp4/abc_1080.mp4".to_owned(),
                "aws/xyz/mp4/abc_144.mp4".to_owned(),
                "aws/xyz/mp4/abc_999.mp4".to_owned(),
                "aws/xyz/thumbnails/abc_1080.jpg".to_owned(),
                "abc_1080.mp4".to_owned(),
            ],
            ..FakeStore::default()
        };

        let updated = fix(&mut store)?;
        assert_eq!(updated, 2);
        assert_eq!(
            store.updates,
            vec![
                (
                    "aws/xyz/mp4/abc_1080.mp4".to_owned(),
                    "binary/octet-stream".to_owned()
                ),
                (
                    "aws/xyz/mp4/abc_144.mp4".to_owned(),
                    "binary/octet-stream".to_owned()
                ),
            ]
        );
        Ok(())
    }
}
