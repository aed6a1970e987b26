// Chunked CSV streaming
// Peak memory is one chunk of raw records, whatever the file size.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use csv::{ByteRecord, Reader, ReaderBuilder};

use crate::constants::{CSV_READ_BUFFER_BYTES, MAX_CHUNK_PREALLOC};
use crate::error::{NormalizeError, Result};

/// One raw CSV record plus its position for error messages.
#[derive(Debug, Clone)]
pub struct SourceRow {
    record: ByteRecord,
    line: u64,
}

impl SourceRow {
    /// Cell text, or None when the cell is absent or blank.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn cell(&self, idx: usize) -> Option<Cow<'_, str>> {
        let bytes = self.record.get(idx)?;
        let text = String::from_utf8_lossy(bytes);
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Same as `cell`, tolerating a column the file does not have.
    pub fn opt_cell(&self, idx: Option<usize>) -> Option<Cow<'_, str>> {
        idx.and_then(|i| self.cell(i))
    }

    pub fn line(&self) -> u64 {
        self.line
    }
}

/// Iterator over fixed-size chunks of a CSV file with a header row.
pub struct CsvChunks {
    reader: Reader<BufReader<File>>,
    headers: HashMap<String, usize>,
    label: String,
    chunk_size: usize,
    rows_read: u64,
}

impl CsvChunks {
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(NormalizeError::Config("chunk size must be at least 1".to_string()));
        }

        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let file = File::open(path).map_err(|e| NormalizeError::SourceUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::with_capacity(CSV_READ_BUFFER_BYTES, file));

        let headers = reader
            .byte_headers()
            .map_err(|e| NormalizeError::SourceUnavailable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
            .iter()
            .enumerate()
            .map(|(idx, name)| (String::from_utf8_lossy(name).trim().to_string(), idx))
            .collect();

        Ok(Self {
            reader,
            headers,
            label,
            chunk_size,
            rows_read: 0,
        })
    }

    /// Position of a column the file must have.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.optional_column(name)
            .ok_or_else(|| NormalizeError::MissingColumn {
                file: self.label.clone(),
                column: name.to_string(),
            })
    }

    pub fn optional_column(&self, name: &str) -> Option<usize> {
        self.headers.get(name).copied()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn read_chunk(&mut self) -> Result<Vec<SourceRow>> {
        let mut rows = Vec::with_capacity(self.chunk_size.min(MAX_CHUNK_PREALLOC));
        while rows.len() < self.chunk_size {
            let mut record = ByteRecord::new();
            if !self.reader.read_byte_record(&mut record)? {
                break;
            }
            self.rows_read += 1;
            // Header is line 1; quoted cells may span lines, so prefer the reader's count
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(self.rows_read + 1);
            rows.push(SourceRow { record, line });
        }
        Ok(rows)
    }
}

impl Iterator for CsvChunks {
    type Item = Result<Vec<SourceRow>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_chunk() {
            Ok(rows) if rows.is_empty() => None,
            Ok(rows) => Some(Ok(rows)),
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_chunks_are_bounded() {
        let tmp = TempDir::new().unwrap();
        let mut body = String::from("movieId,imdbId,tmdbId\n");
        for i in 0..7 {
            body.push_str(&format!("{},{},{}\n", i, i * 10, i * 100));
        }
        let path = write_csv(&tmp, "links.csv", &body);

        let chunks = CsvChunks::open(&path, 3).unwrap();
        let sizes: Vec<usize> = chunks.map(|c| c.unwrap().len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let tmp = TempDir::new().unwrap();
        let err = CsvChunks::open(&tmp.path().join("nope.csv"), 10).err().unwrap();
        assert!(matches!(err, NormalizeError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(&tmp, "keywords.csv", "id,other\n1,x\n");
        let chunks = CsvChunks::open(&path, 10).unwrap();

        assert_eq!(chunks.column("id").unwrap(), 0);
        let err = chunks.column("keywords").unwrap_err();
        assert!(matches!(err, NormalizeError::MissingColumn { ref column, .. } if column == "keywords"));
    }

    #[test]
    fn test_blank_and_short_rows() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(&tmp, "t.csv", "a,b,c\n1,  ,3\n4\n");
        let mut chunks = CsvChunks::open(&path, 10).unwrap();
        let rows = chunks.next().unwrap().unwrap();

        assert_eq!(rows[0].cell(0).as_deref(), Some("1"));
        assert_eq!(rows[0].cell(1), None);
        assert_eq!(rows[1].cell(2), None);
        assert_eq!(rows[1].opt_cell(None), None);
        assert!(chunks.next().is_none());
        assert_eq!(chunks.rows_read(), 2);
    }

    #[test]
    fn test_quoted_multiline_cells() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(&tmp, "t.csv", "id,overview\n1,\"two\nlines\"\n2,plain\n");
        let rows: Vec<SourceRow> = CsvChunks::open(&path, 10).unwrap().next().unwrap().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cell(1).as_deref(), Some("two\nlines"));
        assert_eq!(rows[1].line(), 4);
    }
}
