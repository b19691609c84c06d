use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::common::{HeapDbError, Result, TableId};
use crate::tuple::{Column, DataType, Schema};

use super::Catalog;

/// One parsed line of a schema file.
#[derive(Debug, PartialEq)]
struct TableDef {
    name: String,
    columns: Vec<Column>,
    primary_key: Option<String>,
}

/// Parses `name (field type [pk], field type [pk], ...)`.
fn parse_table_line(line: &str) -> std::result::Result<TableDef, String> {
    let open = line.find('(').ok_or("missing '('")?;
    let close = line.rfind(')').ok_or("missing ')'")?;
    if close < open {
        return Err("')' before '('".to_string());
    }

    let name = line[..open].trim();
    if name.is_empty() {
        return Err("missing table name".to_string());
    }

    let mut columns = Vec::new();
    let mut primary_key = None;
    for field in line[open + 1..close].split(',') {
        let parts: Vec<&str> = field.split_whitespace().collect();
        let (column, type_name, annotation) = match parts.as_slice() {
            [column, type_name] => (*column, *type_name, None),
            [column, type_name, annotation] => (*column, *type_name, Some(*annotation)),
            [] => return Err("empty field".to_string()),
            _ => return Err(format!("malformed field '{}'", field.trim())),
        };

        let data_type = DataType::from_catalog_name(type_name)
            .ok_or_else(|| format!("unknown type '{}'", type_name))?;
        match annotation {
            None => {}
            Some("pk") => primary_key = Some(column.to_string()),
            Some(other) => return Err(format!("unknown annotation '{}'", other)),
        }
        columns.push(Column::new(column, data_type));
    }

    Ok(TableDef {
        name: name.to_string(),
        columns,
        primary_key,
    })
}

impl Catalog {
    /// Registers every table described in the schema file at `path`.
    ///
    /// Each non-blank line reads `name (field type [pk], ...)` where type is
    /// `int` or `string`. The data of table `name` lives in `name.dat` next
    /// to the schema file. Stops at the first malformed line; tables on
    /// earlier lines stay registered.
    pub fn load_schema<P: AsRef<Path>>(&self, path: P) -> Result<Vec<TableId>> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut loaded = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parse_error = |message: String| HeapDbError::CatalogParse {
                line: i + 1,
                message,
            };

            let def = parse_table_line(line).map_err(parse_error)?;
            let schema = Schema::new(def.columns)
                .map_err(|err| parse_error(err.to_string()))?;
            let table_id = self.create_table(
                &def.name,
                Arc::new(schema),
                dir.join(format!("{}.dat", def.name)),
                def.primary_key.as_deref(),
            )?;
            loaded.push(table_id);
        }
        Ok(loaded)
    }
}
