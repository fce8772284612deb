use clap::{Args, Parser, Subcommand};

use crate::rewrite::RewriteMode;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Convert(ConvertArgs),
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Course key, e.g. `course-v1:FUN+00101+session01`.
    pub course_key: String,

    /// Extracted course directory, or a `.tar.gz` course export (unpacked
    /// next to itself).
    #[arg(long, default_value = "course")]
    pub path: String,

    /// Target shape for converted video references.
    #[arg(long, value_enum, default_value = "embed")]
    pub mode: RewriteMode,

    /// Value for the manifest `consumer_site` column.
    #[arg(long, default_value = "fun-mooc.fr")]
    pub consumer_site: String,

    /// Process exactly one vertical instead of walking the whole course.
    #[arg(long)]
    pub vertical: Option<String>,

    /// Semicolon-delimited CSV of already imported videos (for uuids that
    /// were assigned randomly and cannot be re-derived).
    #[arg(long, short = 'i')]
    pub already_imported: Option<String>,

    /// Output directory for the manifest and the result archive.
    #[arg(long, default_value = "files")]
    pub out: String,

    /// Pack the converted tree into a studio-importable tar.gz.
    #[arg(long)]
    pub create_archive: bool,
}
