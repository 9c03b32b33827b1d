//! Link source: the persisted `name,link` table.

use indexmap::IndexMap;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::error::{SourceError, WriteError};
use crate::persist::write_csv_atomic;
use crate::types::{LinkRecord, NAME_COLUMN};

/// Candidates in file order. A repeated name keeps its first position and
/// its last link.
pub type LinkTable = IndexMap<String, LinkRecord>;

/// Load a link table. The first row is a header; columns are read by
/// position (name, then link).
pub fn read_links(path: impl AsRef<Path>) -> Result<LinkTable, SourceError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut records = reader.records();
    match records.next() {
        Some(Ok(_header)) => {}
        Some(Err(source)) => {
            return Err(SourceError::Malformed {
                path: path.to_path_buf(),
                source,
            })
        }
        None => {
            return Err(SourceError::MissingHeader {
                path: path.to_path_buf(),
            })
        }
    }

    let mut links = LinkTable::new();
    for record in records {
        let record = record.map_err(|source| SourceError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

        let Some(name) = record.get(0) else {
            continue;
        };
        let link = LinkRecord::new(name, record.get(1));
        links.insert(link.name.clone(), link);
    }

    debug!(path = %path.display(), candidates = links.len(), "Loaded link table");
    Ok(links)
}

/// Persist a link table, writing `None` for missing links.
pub fn write_links(path: impl AsRef<Path>, links: &LinkTable) -> Result<(), WriteError> {
    write_csv_atomic(path.as_ref(), |writer| {
        writer.write_record([NAME_COLUMN, "link"])?;
        for record in links.values() {
            writer.write_record([record.name.as_str(), record.link_cell()])?;
        }
        Ok(())
    })
}
