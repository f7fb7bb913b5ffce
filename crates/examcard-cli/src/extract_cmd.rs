use examcard::{Book, OutputPaths, Severity, write_extraction, write_summary};
use tracing::{info, warn};

use crate::cli::Cli;

/// No record survived validation.
pub const EXIT_NO_RECORDS: i32 = 1;
/// The run could not complete.
pub const EXIT_FATAL: i32 = 2;

pub fn run(cli: &Cli) -> Result<(), i32> {
    if !cli.input.exists() {
        eprintln!("Error: file not found: {}", cli.input.display());
        return Err(EXIT_FATAL);
    }

    let book = Book::open_file(&cli.input).map_err(|e| {
        eprintln!("Error: failed to open PDF: {e}");
        EXIT_FATAL
    })?;

    let extraction = book.extract(cli.layout_options()).map_err(|e| {
        eprintln!("Error: {e}");
        EXIT_FATAL
    })?;

    let mut paths = OutputPaths::new(&cli.output);
    if let Some(dir) = &cli.images_dir {
        paths = paths.with_images_dir(dir);
    }
    write_extraction(&extraction, &paths).map_err(|e| {
        eprintln!("Error: {e}");
        EXIT_FATAL
    })?;

    if let Some(path) = &cli.summary {
        write_summary(&extraction.summary, path).map_err(|e| {
            eprintln!("Error: {e}");
            EXIT_FATAL
        })?;
    }

    let summary = &extraction.summary;
    for diagnostic in summary.by_severity(Severity::RecordInvalid) {
        warn!(
            label = diagnostic.label.as_deref().unwrap_or("-"),
            "invalid record: {}", diagnostic.description
        );
    }
    info!(
        pages = summary.pages_processed,
        records = summary.records,
        images = summary.images,
        warnings = summary.warnings,
        page_skips = summary.page_skips,
        invalid = summary.invalid_records,
        "done"
    );

    if extraction.records.is_empty() {
        eprintln!("Error: no question records extracted");
        return Err(EXIT_NO_RECORDS);
    }
    Ok(())
}
