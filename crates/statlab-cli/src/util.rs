use std::{
    fmt,
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use statlab_stats::regression::Point;

/// Writes `value` as pretty JSON followed by a newline, to the file at
/// `output_path` or to stdout when no path is given.
pub(crate) fn save_json<T>(value: &T, output_path: Option<&Path>) -> anyhow::Result<()>
where
    T: serde::Serialize,
{
    match output_path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            write_json(BufWriter::new(file), value, &path.display())
        }
        None => write_json(io::stdout().lock(), value, &"stdout"),
    }
}

fn write_json<W, T>(mut writer: W, value: &T, target: &dyn fmt::Display) -> anyhow::Result<()>
where
    W: Write,
    T: serde::Serialize,
{
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write JSON to {target}"))?;
    writeln!(writer).with_context(|| format!("Failed to terminate JSON in {target}"))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush output to {target}"))
}

fn read_json_file<T>(file_kind: &str, path: &Path) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let file = File::open(path)
        .with_context(|| format!("Failed to open {file_kind} file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {file_kind} JSON file: {}", path.display()))
}

/// Read a JSON array of `{ "id", "x", "y" }` records.
///
/// # Errors
///
/// Returns error if the file cannot be opened or parsed
pub(crate) fn read_points_file<P>(path: P) -> anyhow::Result<Vec<Point>>
where
    P: AsRef<Path>,
{
    read_json_file("points", path.as_ref())
}
