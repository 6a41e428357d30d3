//! Whitespace-separated metadata files, one record per line.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use prep_common::ImageId;

use crate::error::{DatasetError, Result};

/// One non-blank line split on whitespace
#[derive(Debug, Clone)]
pub(crate) struct Line {
    path: Arc<Path>,
    pub number: usize,
    pub fields: Vec<String>,
}

impl Line {
    pub fn expect_fields(&self, count: usize) -> Result<()> {
        if self.fields.len() != count {
            return Err(self.malformed(format!(
                "expected {count} fields, found {}",
                self.fields.len()
            )));
        }
        Ok(())
    }

    /// First field, the image id in every CUB/VOC index file
    pub fn img_id(&self) -> ImageId {
        ImageId::from(self.fields[0].as_str())
    }

    pub fn field<T: FromStr>(&self, index: usize, expected: &'static str) -> Result<T> {
        let value = self
            .fields
            .get(index)
            .ok_or_else(|| self.malformed(format!("missing field {}", index + 1)))?;
        value.parse().map_err(|_| DatasetError::Parse {
            path: self.path.to_path_buf(),
            line: self.number,
            value: value.clone(),
            expected,
        })
    }

    /// Fields from `index` onward joined by single spaces
    pub fn rest(&self, index: usize) -> String {
        self.fields.get(index..).unwrap_or_default().join(" ")
    }

    pub fn malformed(&self, details: String) -> DatasetError {
        DatasetError::MalformedLine {
            path: self.path.to_path_buf(),
            line: self.number,
            details,
        }
    }
}

/// Lazy reader over the non-blank lines of a file. Stops after an I/O error.
pub(crate) struct LineReader {
    path: Arc<Path>,
    lines: io::Lines<BufReader<File>>,
    number: usize,
    done: bool,
}

impl LineReader {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path: PathBuf = path.into();
        let file = File::open(&path).map_err(|source| DatasetError::io(&path, source))?;
        Ok(Self {
            path: Arc::from(path),
            lines: BufReader::new(file).lines(),
            number: 0,
            done: false,
        })
    }
}

impl Iterator for LineReader {
    type Item = Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.lines.next() {
                None => self.done = true,
                Some(Err(source)) => {
                    self.done = true;
                    return Some(Err(DatasetError::io(&self.path, source)));
                }
                Some(Ok(text)) => {
                    self.number += 1;
                    let fields: Vec<String> = text.split_whitespace().map(str::to_string).collect();
                    if !fields.is_empty() {
                        return Some(Ok(Line {
                            path: Arc::clone(&self.path),
                            number: self.number,
                            fields,
                        }));
                    }
                }
            }
        }
        None
    }
}

/// Parse every line of `path` and index the results by image id.
/// Ids seen twice are rejected.
pub(crate) fn index_by_id<T, F>(path: &Path, mut parse: F) -> Result<HashMap<ImageId, T>>
where
    F: FnMut(&Line) -> Result<(ImageId, T)>,
{
    let mut index = HashMap::new();
    for line in LineReader::open(path)? {
        let (img_id, value) = parse(&line?)?;
        match index.entry(img_id) {
            Entry::Occupied(entry) => {
                return Err(DatasetError::DuplicateEntry {
                    img_id: entry.key().clone(),
                    file: file_label(path),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
        }
    }
    Ok(index)
}

/// File name used in join errors
pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_blank_lines_are_skipped_and_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.txt");
        fs::write(&path, "1 a.jpg\n\n   \n2 b.jpg\n").unwrap();

        let lines: Vec<Line> = LineReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].number, 4);
        assert_eq!(lines[1].fields, vec!["2", "b.jpg"]);
        assert_eq!(lines[1].img_id(), ImageId::from(2u32));
    }

    #[test]
    fn test_field_errors_carry_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        fs::write(&path, "1 x\n").unwrap();

        let line = LineReader::open(&path).unwrap().next().unwrap().unwrap();
        match line.field::<u32>(1, "class label") {
            Err(DatasetError::Parse { line, value, .. }) => {
                assert_eq!(line, 1);
                assert_eq!(value, "x");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            line.expect_fields(3),
            Err(DatasetError::MalformedLine { .. })
        ));
        assert_eq!(line.rest(1), "x");
        assert_eq!(line.rest(5), "");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LineReader::open(dir.path().join("nope.txt")),
            Err(DatasetError::Io { .. })
        ));
    }

    #[test]
    fn test_index_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image_class_labels.txt");
        fs::write(&path, "1 3\n2 4\n1 5\n").unwrap();

        let err = index_by_id(&path, |line| Ok((line.img_id(), line.field::<u32>(1, "label")?)))
            .unwrap_err();
        match err {
            DatasetError::DuplicateEntry { img_id, file } => {
                assert_eq!(img_id, ImageId::from(1u32));
                assert_eq!(file, "image_class_labels.txt");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
