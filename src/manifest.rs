use std::fs::{File, OpenOptions};
use std::io::{BufRead as _, BufReader, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::NaiveDate;

use crate::formats::ManifestRecord;

pub const DELIMITER: char = ';';
pub const HEADER: [&str; 5] = [
    "consumer_site",
    "course_key",
    "xblock_id",
    "videofront_key",
    "uuid",
];

/// Append-only writer for the transfer manifest.
///
/// Created once by the orchestrator and passed down explicitly; the
/// destination file is only created on the first record so a run that
/// converts nothing leaves no file behind. The file is opened `create_new`:
/// a second converting run the same day fails instead of silently appending
/// to or overwriting the earlier worklist.
#[derive(Debug)]
pub struct ManifestWriter {
    path: PathBuf,
    consumer_site: String,
    course_key: String,
    file: Option<File>,
    rows: usize,
}

impl ManifestWriter {
    pub fn create(
        out_dir: &Path,
        file_stem: &str,
        consumer_site: &str,
        course_key: &str,
    ) -> Self {
        Self {
            path: out_dir.join(format!("{file_stem}.csv")),
            consumer_site: consumer_site.to_owned(),
            course_key: course_key.to_owned(),
            file: None,
            rows: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Appends one record and flushes it before returning, so a crash
    /// mid-run preserves every already-converted leaf.
    pub fn append(
        &mut self,
        xblock_id: &str,
        videofront_key: &str,
        uuid: &str,
    ) -> anyhow::Result<()> {
        if self.file.is_none() {
            self.file = Some(self.open()?);
        }
        let file = self.file.as_mut().context("manifest file not open")?;

        let row = encode_row(&[
            &self.consumer_site,
            &self.course_key,
            xblock_id,
            videofront_key,
            uuid,
        ]);
        file.write_all(row.as_bytes())
            .with_context(|| format!("write manifest row: {}", self.path.display()))?;
        file.write_all(b"\n")
            .with_context(|| format!("write manifest newline: {}", self.path.display()))?;
        file.flush()
            .with_context(|| format!("flush manifest: {}", self.path.display()))?;

        self.rows += 1;
        Ok(())
    }

    pub fn finish(mut self) -> anyhow::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()
                .with_context(|| format!("flush manifest: {}", self.path.display()))?;
        }
        Ok(())
    }

    fn open(&self) -> anyhow::Result<File> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create manifest dir: {}", dir.display()))?;
        }

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&self.path)
            .with_context(|| format!("create manifest: {}", self.path.display()))?;
        file.write_all(encode_row(&HEADER).as_bytes())
            .with_context(|| format!("write manifest header: {}", self.path.display()))?;
        file.write_all(b"\n")
            .with_context(|| format!("write manifest header: {}", self.path.display()))?;

        Ok(file)
    }
}

/// Output file stem shared by the manifest and the result archive:
/// `<slug(display_name)>-<mode>-<YYYY-MM-DD>`. The run date qualifies the
/// name so reruns on different days never collide.
pub fn file_stem(display_name: &str, mode_label: &str, date: NaiveDate) -> String {
    format!(
        "{}-{mode_label}-{}",
        slugify(display_name),
        date.format("%Y-%m-%d")
    )
}

/// Lowercase ASCII alphanumeric runs joined by single dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Quote-minimal encoding: a field is quoted only when it contains the
/// delimiter, a quote, or a newline; embedded quotes are doubled.
pub fn encode_row(fields: &[&str]) -> String {
    let mut row = String::new();
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            row.push(DELIMITER);
        }
        if field.contains(DELIMITER) || field.contains('"') || field.contains('\n') {
            row.push('"');
            row.push_str(&field.replace('"', "\"\""));
            row.push('"');
        } else {
            row.push_str(field);
        }
    }
    row
}

/// Splits one row, honoring quoted fields.
pub fn split_row(line: &str) -> anyhow::Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;

    while let Some(ch) = chars.next() {
        if quoted {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            } else {
                field.push(ch);
            }
        } else if ch == '"' && field.is_empty() {
            quoted = true;
        } else if ch == DELIMITER {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(ch);
        }
    }

    anyhow::ensure!(!quoted, "unterminated quoted field: {line}");
    fields.push(field);
    Ok(fields)
}

/// Reads a full manifest back, validating the header.
pub fn read_records(path: &Path) -> anyhow::Result<Vec<ManifestRecord>> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("open manifest: {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    let mut lines = reader.lines();

    let header = lines
        .next()
        .with_context(|| format!("manifest is empty: {}", path.display()))?
        .context("read manifest header")?;
    let header_fields = split_row(&header)?;
    anyhow::ensure!(
        header_fields == HEADER,
        "unexpected manifest header: {header}"
    );

    for line in lines {
        let line = line.context("read manifest line")?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_row(&line)?;
        anyhow::ensure!(
            fields.len() == HEADER.len(),
            "manifest row has {} fields, expected {}: {line}",
            fields.len(),
            HEADER.len()
        );
        let mut fields = fields.into_iter();
        records.push(ManifestRecord {
            consumer_site: fields.next().unwrap_or_default(),
            course_key: fields.next().unwrap_or_default(),
            xblock_id: fields.next().unwrap_or_default(),
            videofront_key: fields.next().unwrap_or_default(),
            uuid: fields.next().unwrap_or_default(),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Mécanique des Fluides !"), "m-canique-des-fluides");
        assert_eq!(slugify("  Intro  101 "), "intro-101");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn file_stem_is_date_qualified() -> anyhow::Result<()> {
        let date = NaiveDate::from_ymd_opt(2026, 8, 23).context("build date")?;
        assert_eq!(
            file_stem("Intro 101", "embed", date),
            "intro-101-embed-2026-08-23"
        );
        Ok(())
    }

    #[test]
    fn encode_quotes_only_when_needed() {
        assert_eq!(encode_row(&["a", "b;c", r#"d"e"#]), r#"a;"b;c";"d""e""#);
        assert_eq!(encode_row(&["plain", ""]), "plain;");
    }

    #[test]
    fn split_row_roundtrips_quoted_fields() -> anyhow::Result<()> {
        let fields = split_row(r#"a;"b;c";"d""e";"#)?;
        assert_eq!(fields, vec!["a", "b;c", "d\"e", ""]);
        Ok(())
    }

    #[test]
    fn writer_is_lazy_and_writes_header_once() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut writer = ManifestWriter::create(dir.path(), "c-embed-2026-08-23", "site", "key");
        assert!(!writer.path().exists());

        writer.append("x1", "videos/V1/HD.mp4", "u1")?;
        writer.append("x2", "videos/V2/HD.mp4", "")?;
        assert_eq!(writer.rows(), 2);

        let path = writer.path().to_owned();
        writer.finish()?;

        let contents = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "consumer_site;course_key;xblock_id;videofront_key;uuid",
                "site;key;x1;videos/V1/HD.mp4;u1",
                "site;key;x2;videos/V2/HD.mp4;",
            ]
        );
        Ok(())
    }

    #[test]
    fn no_records_leaves_no_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let writer = ManifestWriter::create(dir.path(), "stem", "site", "key");
        let path = writer.path().to_owned();
        writer.finish()?;
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn same_day_rerun_fails_fast() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut first = ManifestWriter::create(dir.path(), "stem", "site", "key");
        first.append("x1", "videos/V1/HD.mp4", "u1")?;
        first.finish()?;

        let mut second = ManifestWriter::create(dir.path(), "stem", "site", "key");
        assert!(second.append("x1", "videos/V1/HD.mp4", "u1").is_err());
        Ok(())
    }

    #[test]
    fn read_records_roundtrips_written_manifest() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut writer = ManifestWriter::create(dir.path(), "stem", "site", "course-v1:A+B+C");
        writer.append("x1", "videos/V1/HD.mp4", "u1")?;
        let path = writer.path().to_owned();
        writer.finish()?;

        let records = read_records(&path)?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].xblock_id, "x1");
        assert_eq!(records[0].course_key, "course-v1:A+B+C");
        assert_eq!(records[0].uuid, "u1");
        Ok(())
    }

    #[test]
    fn read_records_rejects_bad_header() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "a;b;c\n")?;
        assert!(read_records(&path).is_err());
        Ok(())
    }
}
