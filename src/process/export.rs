use crate::process::RawTable;

/// Quote a cell only when it contains a comma. Embedded quotes are written as-is.
fn export_cell(value: &str) -> String {
    if value.contains(',') {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

/// Serialize a table back to CSV text, `\n`-terminated lines.
pub fn data_to_csv(table: &RawTable) -> String {
    let mut out = String::new();
    let lines = std::iter::once(&table.headers).chain(table.rows.iter());
    for line in lines {
        let cells: Vec<String> = line.iter().map(|c| export_cell(c)).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}
