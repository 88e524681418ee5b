//! Dataset loader: CSV bytes to a typed [`Table`].
//!
//! Encoding and delimiter are auto-detected. Cells that are empty or hold a
//! common NA token become missing; a column whose present values all parse as
//! finite numbers is numeric, otherwise text. Header names are kept as read,
//! trimming is the cleaner's job.
//!
//! Also selects a dataset from a data directory and fingerprints inputs so a
//! caller can cache results per distinct snapshot.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CsvError, CsvResult};
use crate::models::{parse_number, Cell, Column, Table};

/// Tokens read as missing values.
const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Result of loading with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Loaded table, untouched by the cleaner
    pub table: Table,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
    /// Column headers as read
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let (decoded, had_errors) = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            let (text, _, errors) = encoding_rs::WINDOWS_1252.decode(bytes);
            (text.into_owned(), errors)
        }
        "windows-1252" | "cp1252" => {
            let (text, _, errors) = encoding_rs::WINDOWS_1252.decode(bytes);
            (text.into_owned(), errors)
        }
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) if enc != encoding_rs::UTF_8 => {
                let (text, _, errors) = enc.decode(bytes);
                (text.into_owned(), errors)
            }
            _ => (String::from_utf8_lossy(bytes).into_owned(), false),
        },
    };

    if had_errors && decoded.chars().all(|c| c == char::REPLACEMENT_CHARACTER) {
        return Err(CsvError::EncodingError(format!(
            "content is not valid {}",
            encoding
        )));
    }

    // A UTF-8 BOM would otherwise stick to the first header
    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Ties and header lines without any separator resolve to a comma.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

fn is_na(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || NA_TOKENS.contains(&trimmed)
}

/// Make duplicate headers unique: `x`, `x.1`, `x.2`.
fn dedupe_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .map(|name| {
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name.clone()
            } else {
                format!("{}.{}", name, count)
            };
            *count += 1;
            unique
        })
        .collect()
}

/// Build a typed column from raw strings.
fn type_column(name: String, raw: Vec<Option<String>>) -> Column {
    let values: Vec<Option<String>> = raw
        .into_iter()
        .map(|v| v.filter(|s| !is_na(s)))
        .collect();

    let all_numeric = values
        .iter()
        .flatten()
        .all(|s| parse_number(s).is_some());

    if all_numeric {
        Column::numeric(
            name,
            values.iter().map(|v| v.as_deref().and_then(parse_number)).collect(),
        )
    } else {
        Column::text(
            name,
            values
                .into_iter()
                .map(|v| v.map(Cell::Text).unwrap_or(Cell::Missing))
                .collect(),
        )
    }
}

/// Parse CSV text with an explicit delimiter into a typed table.
///
/// # Example
/// ```ignore
/// use housing_mapper::parser::parse_csv_str;
///
/// let table = parse_csv_str("area,rent\nNorth,1200\nSouth,", ',').unwrap();
/// assert_eq!(table.row_count(), 2);
/// ```
pub fn parse_csv_str(content: &str, delimiter: char) -> CsvResult<Table> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(u8::try_from(delimiter).unwrap_or(b','))
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(CsvError::NoHeaders);
    }
    let headers = dedupe_headers(headers);

    let mut raw_columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (i, column) in raw_columns.iter_mut().enumerate() {
            // Short rows are padded with missing values, extra fields ignored
            column.push(record.get(i).map(str::to_string));
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw_columns)
        .map(|(name, raw)| type_column(name, raw))
        .collect();

    Ok(Table::new(columns)?)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let table = parse_csv_str(&content, delimiter)?;
    let headers = table.column_names().map(str::to_string).collect();

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

// =============================================================================
// Data directory
// =============================================================================

/// Provenance of a loaded file: name, modification time and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub path: PathBuf,
    pub name: String,
    /// Modification time, whole seconds since the Unix epoch
    pub modified: i64,
    pub size: u64,
}

impl DataSource {
    pub fn from_path(path: &Path) -> CsvResult<Self> {
        let meta = fs::metadata(path)?;
        let modified = meta
            .modified()
            .map(|t| DateTime::<Utc>::from(t).timestamp())
            .unwrap_or(0);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            name,
            modified,
            size: meta.len(),
        })
    }

    /// `name:mtime:size`, identical for identical snapshots.
    pub fn fingerprint(&self) -> String {
        format!("{}:{}:{}", self.name, self.modified, self.size)
    }
}

fn csv_files(dir: &Path) -> CsvResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Fingerprint of every CSV in a directory, `|`-joined in name order.
///
/// A missing or unreadable directory fingerprints as the empty string.
pub fn fingerprint_dir(dir: &Path) -> String {
    let files = match csv_files(dir) {
        Ok(f) => f,
        Err(_) => return String::new(),
    };

    files
        .iter()
        .map(|p| match DataSource::from_path(p) {
            Ok(source) => source.fingerprint(),
            Err(_) => format!(
                "{}:0:0",
                p.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
            ),
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Pick the dataset to load from a directory.
///
/// Order: exact file name equal to `preference`, then a name containing it
/// (case-insensitive), then the first CSV by name.
pub fn select_csv(dir: &Path, preference: Option<&str>) -> CsvResult<PathBuf> {
    let files = csv_files(dir).map_err(|_| CsvError::NoDataset(dir.display().to_string()))?;

    let name_of = |p: &PathBuf| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    };

    if let Some(pref) = preference.filter(|p| !p.trim().is_empty()) {
        if let Some(exact) = files.iter().find(|p| name_of(p) == pref) {
            return Ok(exact.clone());
        }
        let needle = pref.to_lowercase();
        if let Some(partial) = files
            .iter()
            .find(|p| name_of(p).to_lowercase().contains(&needle))
        {
            return Ok(partial.clone());
        }
    }

    files
        .into_iter()
        .next()
        .ok_or_else(|| CsvError::NoDataset(dir.display().to_string()))
}

/// Select and load the dataset of a data directory.
pub fn load_dataset(dir: &Path, preference: Option<&str>) -> CsvResult<(ParseResult, DataSource)> {
    let path = select_csv(dir, preference)?;
    let source = DataSource::from_path(&path)?;
    let parsed = parse_csv_file_auto(&path)?;
    Ok((parsed, source))
}
