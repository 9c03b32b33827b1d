//! Row assembly and table output.

use std::path::Path;

use crate::error::WriteError;
use crate::persist::write_csv_atomic;
use crate::schema::FrozenSchema;
use crate::types::{CandidateRecord, OutputRow, Table};

/// Align every record to the frozen schema. Issues a candidate lacks,
/// including ones discovered only after its task finished, get the sentinel.
pub fn assemble(schema: &FrozenSchema, records: Vec<CandidateRecord>) -> Table {
    let rows = records
        .into_iter()
        .map(|record| OutputRow {
            values: schema
                .snapshot()
                .iter()
                .map(|issue| record.response_or_sentinel(issue).to_string())
                .collect(),
            name: record.name,
        })
        .collect();

    Table {
        columns: schema.columns(),
        rows,
    }
}

/// Write the header, then one line per row.
pub fn write_table(path: &Path, table: &Table) -> Result<(), WriteError> {
    write_csv_atomic(path, |writer| {
        writer.write_record(&table.columns)?;
        for row in &table.rows {
            writer.write_record(row.fields())?;
        }
        Ok(())
    })
}
