//! Persisted table store.
//!
//! The whole file is rewritten on save. Writes are atomic: the new contents
//! go to `{path}.tmp` and are renamed into place, so a failed run never leaves
//! a half-written table behind.

use super::codec::TableCodec;
use crate::domain::{Bar, RawBar, SortOrder, Table};
use crate::error::DataError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load and save a whole [`Table`].
pub trait TableStore {
    fn load(&self) -> Result<Table, DataError>;

    fn save(&self, table: &Table) -> Result<(), DataError>;
}

/// A table kept in a single delimited file.
pub struct FileTableStore {
    path: PathBuf,
    codec: Box<dyn TableCodec>,
    order: SortOrder,
}

impl FileTableStore {
    pub fn new(path: impl Into<PathBuf>, codec: Box<dyn TableCodec>, order: SortOrder) -> Self {
        Self {
            path: path.into(),
            codec,
            order,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl TableStore for FileTableStore {
    fn load(&self) -> Result<Table, DataError> {
        let text = fs::read_to_string(&self.path)?;
        let bars = self
            .codec
            .parse(&text)?
            .iter()
            .map(RawBar::validate)
            .collect::<Result<Vec<Bar>, _>>()?;
        debug!(path = %self.path.display(), rows = bars.len(), "loaded table");
        Table::new(bars, self.order)
    }

    fn save(&self, table: &Table) -> Result<(), DataError> {
        let contents = self.codec.format(table.bars())?;
        let tmp_path = self.tmp_path();

        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Io(e)
        })?;

        debug!(path = %self.path.display(), rows = table.len(), "saved table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::codec::DelimitedCodec;

    const PIPE: &str = "Month|Day|Year|Open|High|Low|Close|AdjClose|Volume\n\
                        Jan|6|2024|2|3|1|2.5|2.5|20\n\
                        Jan|5|2024|1|2|0.5|1.5|1.5|10\n";

    #[test]
    fn load_validates_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        fs::write(&path, PIPE).unwrap();

        let newest_first =
            FileTableStore::new(&path, Box::new(DelimitedCodec::pipe()), SortOrder::NewestFirst);
        assert_eq!(newest_first.load().unwrap().len(), 2);

        let oldest_first =
            FileTableStore::new(&path, Box::new(DelimitedCodec::pipe()), SortOrder::OldestFirst);
        assert!(matches!(
            oldest_first.load(),
            Err(DataError::UnorderedTable { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTableStore::new(
            dir.path().join("absent.tsv"),
            Box::new(DelimitedCodec::tsv()),
            SortOrder::NewestFirst,
        );
        assert!(matches!(store.load(), Err(DataError::Io(_))));
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        fs::write(&path, PIPE).unwrap();
        let store = FileTableStore::new(&path, Box::new(DelimitedCodec::pipe()), SortOrder::NewestFirst);

        let table = store.load().unwrap();
        store.save(&table).unwrap();

        assert!(!store.tmp_path().exists());
        assert_eq!(store.load().unwrap(), table);
    }
}
