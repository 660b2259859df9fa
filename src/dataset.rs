//! Dataset loading: read the attrition file once into an immutable table.

use polars::prelude::*;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::error::{DashboardError, Result};
use crate::CompressionFormat;

/// Immutable in-memory columnar table. Never mutated after load.
#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
}

impl Table {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    /// Look up a column, failing with `UnknownColumn` when it is absent.
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.frame
            .column(name)
            .map_err(|_| DashboardError::UnknownColumn(name.to_string()))
    }
}

impl From<DataFrame> for Table {
    fn from(frame: DataFrame) -> Self {
        Self::new(frame)
    }
}

/// How the dataset file is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub has_header: bool,
    pub compression: Option<CompressionFormat>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            compression: None,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_compression(mut self, compression: CompressionFormat) -> Self {
        self.compression = Some(compression);
        self
    }
}

/// Loads the dataset on first use and hands out the same table afterwards.
///
/// The mutex is the initialization barrier: concurrent first calls wait for
/// the one that performs the read, so the file is read at most once per
/// successful load.
pub struct DatasetLoader {
    path: PathBuf,
    options: LoadOptions,
    cached: Mutex<Option<Arc<Table>>>,
}

impl DatasetLoader {
    pub fn new(path: impl Into<PathBuf>, options: LoadOptions) -> Self {
        Self {
            path: path.into(),
            options,
            cached: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn is_loaded(&self) -> bool {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn load(&self) -> Result<Arc<Table>> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = cached.as_ref() {
            debug!(path = %self.path.display(), "dataset cache hit");
            return Ok(Arc::clone(table));
        }

        let table = Arc::new(read_table(&self.path, &self.options)?);
        info!(
            path = %self.path.display(),
            rows = table.height(),
            columns = table.frame().width(),
            "dataset loaded"
        );
        *cached = Some(Arc::clone(&table));
        Ok(table)
    }
}

/// Read and parse a dataset file without caching.
pub fn read_table(path: &Path, options: &LoadOptions) -> Result<Table> {
    let raw = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DashboardError::data_load(path, "file not found"),
        _ => DashboardError::data_load(path, e),
    })?;

    let compression = options
        .compression
        .or_else(|| CompressionFormat::from_extension(path));
    let bytes = match compression {
        Some(format) => decompress(raw, format).map_err(|e| {
            let reason = format!("{} decompression failed: {e}", format.extension());
            DashboardError::data_load(path, reason)
        })?,
        None => raw,
    };

    validate_shape(path, &bytes, options)?;
    parse_frame(path, bytes, options).map(Table::new)
}

fn decompress(raw: Vec<u8>, format: CompressionFormat) -> std::io::Result<Vec<u8>> {
    let input = Cursor::new(raw);
    let mut out = Vec::new();
    match format {
        CompressionFormat::Gzip => {
            flate2::read::MultiGzDecoder::new(input).read_to_end(&mut out)?;
        }
        CompressionFormat::Zstd => {
            zstd::stream::read::Decoder::new(input)?.read_to_end(&mut out)?;
        }
        CompressionFormat::Bzip2 => {
            bzip2::read::BzDecoder::new(input).read_to_end(&mut out)?;
        }
        CompressionFormat::Xz => {
            xz2::read::XzDecoder::new(input).read_to_end(&mut out)?;
        }
    }
    Ok(out)
}

/// Reject ragged files before polars sees them: every record must have the
/// same number of fields as the header.
fn validate_shape(path: &Path, bytes: &[u8], options: &LoadOptions) -> Result<()> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(DashboardError::data_load(path, "file is empty"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(options.has_header)
        .flexible(false)
        .from_reader(bytes);

    let mut record = csv::ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                let reason = match e.kind() {
                    csv::ErrorKind::UnequalLengths {
                        pos,
                        expected_len,
                        len,
                    } => format!(
                        "line {}: expected {} fields, found {}",
                        pos.as_ref().map(|p| p.line()).unwrap_or_default(),
                        expected_len,
                        len
                    ),
                    _ => e.to_string(),
                };
                return Err(DashboardError::data_load(path, reason));
            }
        }
    }
    Ok(())
}

fn parse_frame(path: &Path, bytes: Vec<u8>, options: &LoadOptions) -> Result<DataFrame> {
    let mut read_options = CsvReadOptions::default();
    read_options.has_header = options.has_header;
    let delimiter = options.delimiter;
    read_options = read_options.map_parse_options(|opts| opts.with_separator(delimiter));

    let frame = CsvReader::new(Cursor::new(bytes))
        .with_options(read_options)
        .finish()
        .map_err(|e| DashboardError::data_load(path, e))?;
    if frame.height() > 0 {
        return Ok(frame);
    }

    // A header without rows gives no evidence for any column type.
    debug!(path = %path.display(), "dataset has no rows, columns typed as null");
    let columns = frame
        .get_column_names()
        .into_iter()
        .map(|name| Column::full_null(name.clone(), 0, &DataType::Null))
        .collect();
    DataFrame::new(columns).map_err(|e| DashboardError::data_load(path, e))
}
