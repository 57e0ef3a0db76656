use anyhow::Context as _;
use anyhow::Result;
use geocluster::ClusterMap;
use geocluster::Table;
use serde_json::Value;
use std::fs;
use std::io;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::Registry;
use tracing_tree::HierarchicalLayer;

/// Sets up debug output on stderr, filtered by the `LOG` environment
/// variable, and optionally a chrome trace in `trace_file`.
///
/// The returned guard must be kept alive until the end of the program for the
/// trace to be complete.
pub fn init_tracing(trace_file: Option<String>) -> Option<tracing_chrome::FlushGuard> {
    let registry = Registry::default().with(EnvFilter::from_env("LOG")).with(
        HierarchicalLayer::new(4)
            .with_thread_ids(true)
            .with_targets(true)
            .with_bracketed_fields(true),
    );
    match trace_file {
        Some(filename) => {
            let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file(filename)
                .build();
            registry.with(chrome_layer).init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

/// Opens the given file, or stdin if there is none or it is `-`.
pub fn reader(filename: Option<&String>) -> Result<Box<dyn io::Read>> {
    Ok(match filename.map(String::as_str) {
        Some("-") | None => Box::new(io::stdin()),
        Some(filename) => {
            let file = fs::File::open(filename)
                .with_context(|| format!("failed to open {filename:?}"))?;
            Box::new(io::BufReader::new(file))
        }
    })
}

/// Creates the given file, or uses stdout if there is none or it is `-`.
pub fn writer(filename: Option<&String>) -> Result<Box<dyn io::Write>> {
    Ok(match filename.map(String::as_str) {
        Some("-") | None => Box::new(io::BufWriter::new(io::stdout())),
        Some(filename) => {
            let file = fs::File::create(filename)
                .with_context(|| format!("failed to create {filename:?}"))?;
            Box::new(io::BufWriter::new(file))
        }
    })
}

/// Reads a CSV table with a header row. Cells are kept as strings.
pub fn read_table(r: impl io::Read) -> Result<Table> {
    let mut csv = csv::ReaderBuilder::new().has_headers(true).from_reader(r);
    let headers = csv.headers().context("failed to read header row")?;
    let mut table = Table::new(headers.iter()).context("invalid header row")?;
    for (i, record) in csv.records().enumerate() {
        let record = record.with_context(|| format!("failed to read row {i}"))?;
        table
            .push_row(record.iter().map(|cell| Value::String(cell.to_owned())))
            .with_context(|| format!("invalid row {i}"))?;
    }
    Ok(table)
}

/// Writes the clusters as a pretty-printed JSON object.
pub fn write_clusters(mut w: impl io::Write, clusters: &ClusterMap) -> Result<()> {
    serde_json::to_writer_pretty(&mut w, clusters)?;
    writeln!(w)?;
    w.flush()?;
    Ok(())
}
