//! Rendering for `--output`.
//!
//! Lists become `tabled` tables, single records become aligned label
//! lines, and every record also serializes as JSON or YAML.

use std::io::{self, Write};

use bytesize::ByteSize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Renderers ────────────────────────────────────────────────────────

/// Render records as a table (via `to_row`), as serialized data, or as
/// one `id_fn` value per line for `plain`.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            table(&rows)
        }
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render one record. `table` shows `detail_fn`'s label lines.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => id_fn(data),
    })
}

/// Write to stdout unless `--quiet` or there is nothing to show.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    if let Err(e) = write_line(&mut io::stdout().lock(), output) {
        tracing::warn!(error = %e, "failed to write output");
    }
}

/// Write `output` plus a newline; a closed pipe (`| head`) is not an error.
fn write_line(out: &mut impl Write, output: &str) -> io::Result<()> {
    match writeln!(out, "{output}") {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Status line on stderr, suppressed by `--quiet`.
pub fn notice(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

// ── Value helpers ────────────────────────────────────────────────────

pub fn bytes(n: u64) -> String {
    ByteSize::b(n).to_string()
}

pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_owned()
}

/// Aligned `Label: value` lines for detail views.
pub fn detail_lines(pairs: &[(&str, String)]) -> String {
    let width = pairs.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;
    pairs
        .iter()
        .map(|(label, value)| format!("{:<width$} {value}", format!("{label}:")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Item {
        name: &'static str,
    }

    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "Name")]
        name: &'static str,
    }

    #[test]
    fn plain_emits_one_id_per_line() {
        let items = [Item { name: "a" }, Item { name: "b" }];
        let out = render_list(
            &OutputFormat::Plain,
            &items,
            |i| ItemRow { name: i.name },
            |i| i.name.to_owned(),
        )
        .unwrap();
        assert_eq!(out, "a\nb");
    }

    #[test]
    fn compact_json_is_one_line() {
        let items = [Item { name: "a" }];
        let out = render_list(
            &OutputFormat::JsonCompact,
            &items,
            |i| ItemRow { name: i.name },
            |i| i.name.to_owned(),
        )
        .unwrap();
        assert_eq!(out, r#"[{"name":"a"}]"#);
    }

    #[test]
    fn detail_lines_align_values() {
        let out = detail_lines(&[("Name", "V1".into()), ("Profile", "default".into())]);
        assert_eq!(out, "Name:    V1\nProfile: default");
    }

    struct Failing(io::ErrorKind);

    impl Write for Failing {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(self.0.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn closed_pipe_is_silent_but_other_write_errors_surface() {
        assert!(write_line(&mut Failing(io::ErrorKind::BrokenPipe), "x").is_ok());
        let err = write_line(&mut Failing(io::ErrorKind::PermissionDenied), "x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        let mut buf = Vec::new();
        write_line(&mut buf, "hello").unwrap();
        assert_eq!(buf, b"hello\n");
    }
}
