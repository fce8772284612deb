use std::collections::HashMap;
use std::io::{BufRead as _, BufReader};
use std::path::Path;

use anyhow::Context as _;
use uuid::Uuid;

use crate::manifest::split_row;

/// Already-imported lookup table: leaf local name to a previously assigned
/// target-platform identifier. Some early imports used random identifiers
/// which cannot be re-derived, so the table wins over derivation.
#[derive(Debug, Default)]
pub struct Overrides {
    by_local_name: HashMap<String, String>,
}

impl Overrides {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads a semicolon-delimited CSV whose header names at least an
    /// `xblock_id` and a `uuid` column; any other columns are ignored.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("open already-imported table: {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header = lines
            .next()
            .with_context(|| format!("already-imported table is empty: {}", path.display()))?
            .context("read already-imported header")?;
        let columns = split_row(&header)?;
        let id_column = column_index(&columns, "xblock_id", path)?;
        let uuid_column = column_index(&columns, "uuid", path)?;

        let mut by_local_name = HashMap::new();
        for line in lines {
            let line = line.context("read already-imported line")?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_row(&line)?;
            let local_name = fields
                .get(id_column)
                .with_context(|| format!("row is missing the xblock_id column: {line}"))?;
            let uuid = fields
                .get(uuid_column)
                .with_context(|| format!("row is missing the uuid column: {line}"))?;
            by_local_name.insert(local_name.clone(), uuid.clone());
        }

        Ok(Self { by_local_name })
    }

    pub fn len(&self) -> usize {
        self.by_local_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_local_name.is_empty()
    }

    pub fn get(&self, local_name: &str) -> Option<&str> {
        self.by_local_name.get(local_name).map(String::as_str)
    }
}

fn column_index(columns: &[String], name: &str, path: &Path) -> anyhow::Result<usize> {
    columns.iter().position(|c| c == name).with_context(|| {
        format!(
            "already-imported table has no '{name}' column: {}",
            path.display()
        )
    })
}

/// Resolves the target-platform identifier for one leaf.
///
/// The identifier is derived from the legacy asset id with a fixed namespace
/// hash, so the same asset resolves to the same identifier on every run and
/// reruns never trigger duplicate uploads downstream. An override for the
/// leaf's local name always wins.
pub fn resolve(local_name: &str, video_id: &str, overrides: &Overrides) -> String {
    if let Some(uuid) = overrides.get(local_name) {
        tracing::info!(local_name, video_id, uuid, "reusing previously imported identifier");
        return uuid.to_owned();
    }
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, video_id.as_bytes()).to_string()
}

/// Fresh identifier for a synthetic direct-link node file. Nothing downstream
/// keys on it, so it does not need to be stable across runs.
pub fn fresh_node_name() -> String {
    Uuid::new_v4().simple().to_string()
}
