use std::collections::HashMap;
use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;

use crate::formats::ManifestRecord;
use crate::manifest;

/// Upload state reported by the target platform; only `pending` objects are
/// copied, so reruns of the transfer loop never re-upload.
pub const UPLOAD_PENDING: &str = "pending";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoPayload {
    pub id: String,
    pub upload_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrackPayload {
    pub id: String,
    pub language: String,
    pub upload_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadPolicy {
    pub bucket: String,
    pub key: String,
}

/// Target-platform API as the transfer loop needs it. Implementations own
/// authentication, request signing and transport; every method returns the
/// raw JSON payload of the platform's response.
pub trait VideoBackend {
    /// Get-or-create the playlist-scoped video record for one manifest row.
    fn ensure_video(
        &mut self,
        course_key: &str,
        xblock_id: &str,
        uuid: &str,
    ) -> anyhow::Result<String>;

    /// Upload policy (bucket + key) for the video object.
    fn initiate_video_upload(&mut self, video_id: &str) -> anyhow::Result<String>;

    /// Existing subtitle-track records for a video, as a JSON array.
    fn list_tracks(&mut self, video_id: &str) -> anyhow::Result<String>;

    fn create_track(&mut self, video_id: &str, language: &str) -> anyhow::Result<String>;

    fn initiate_track_upload(&mut self, track_id: &str) -> anyhow::Result<String>;
}

/// Blob-store capabilities the migration needs: copy an object from the
/// legacy store to an upload destination, enumerate a prefix, and rewrite an
/// object's content type in place. Pagination is the implementation's
/// problem; `list` returns every key under the prefix.
pub trait BlobStore {
    fn copy(&mut self, source_key: &str, dest_bucket: &str, dest_key: &str)
    -> anyhow::Result<()>;

    fn list(&mut self, prefix: &str) -> anyhow::Result<Vec<String>>;

    fn set_content_type(&mut self, key: &str, content_type: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub videos: usize,
    pub videos_copied: usize,
    pub tracks_created: usize,
    pub tracks_copied: usize,
}

/// Replays a conversion manifest against the target platform: per row,
/// get-or-create the video, copy the binary object if it has not been
/// uploaded yet, then discover and transfer the subtitle tracks that existed
/// alongside it in the legacy store.
pub fn run(
    manifest_path: &Path,
    backend: &mut dyn VideoBackend,
    store: &mut dyn BlobStore,
) -> anyhow::Result<TransferSummary> {
    let records = manifest::read_records(manifest_path).context("read manifest")?;

    let mut summary = TransferSummary::default();
    for record in records {
        tracing::info!(
            course_key = record.course_key,
            xblock_id = record.xblock_id,
            "transferring video"
        );
        transfer_record(&record, backend, store, &mut summary)
            .with_context(|| format!("transfer video: {}", record.xblock_id))?;
        summary.videos += 1;
    }

    Ok(summary)
}

fn transfer_record(
    record: &ManifestRecord,
    backend: &mut dyn VideoBackend,
    store: &mut dyn BlobStore,
    summary: &mut TransferSummary,
) -> anyhow::Result<()> {
    let video: VideoPayload = serde_json::from_str(
        &backend.ensure_video(&record.course_key, &record.xblock_id, &record.uuid)?,
    )
    .context("parse video payload")?;

    if video.upload_state == UPLOAD_PENDING {
        let policy: UploadPolicy =
            serde_json::from_str(&backend.initiate_video_upload(&video.id)?)
                .context("parse video upload policy")?;
        store.copy(&record.videofront_key, &policy.bucket, &policy.key)?;
        summary.videos_copied += 1;
    }

    let tracks: Vec<TrackPayload> = serde_json::from_str(&backend.list_tracks(&video.id)?)
        .context("parse track list payload")?;
    let mut by_language: HashMap<String, TrackPayload> = tracks
        .into_iter()
        .map(|track| (track.language.clone(), track))
        .collect();

    for subtitle_key in store.list(&subtitle_prefix(&record.videofront_key))? {
        let Some(language) = subtitle_language(&subtitle_key) else {
            tracing::warn!(key = subtitle_key, "subtitle key has no language segment; skipping");
            continue;
        };

        let track = match by_language.get(language) {
            Some(track) => track.clone(),
            None => {
                let track: TrackPayload =
                    serde_json::from_str(&backend.create_track(&video.id, language)?)
                        .context("parse track payload")?;
                summary.tracks_created += 1;
                by_language.insert(language.to_owned(), track.clone());
                track
            }
        };

        if track.upload_state == UPLOAD_PENDING {
            let policy: UploadPolicy =
                serde_json::from_str(&backend.initiate_track_upload(&track.id)?)
                    .context("parse track upload policy")?;
            store.copy(&subtitle_key, &policy.bucket, &policy.key)?;
            summary.tracks_copied += 1;
        }
    }

    Ok(())
}

/// Subtitles live next to the video object: `videos/<id>/subs/`.
fn subtitle_prefix(videofront_key: &str) -> String {
    let base: Vec<&str> = videofront_key.split('/').take(2).collect();
    format!("{}/subs/", base.join("/"))
}

/// Language is the second-from-last dot segment, e.g. `intro.fr.vtt` → `fr`.
fn subtitle_language(key: &str) -> Option<&str> {
    key.rsplit('.').nth(1)
}
