use serde_json::Value;

use crate::cli::OutputFormat;
use crate::database::document::{document_id, Document};
use crate::query::QueryOutput;

pub fn output_value(output_format: &OutputFormat, value: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", value),
    }
    Ok(())
}

/// Prints query output: the full JSON, or one summary line per record.
pub fn output_records(output_format: &OutputFormat, output: &QueryOutput) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(output)?);
        }
        OutputFormat::Text => {
            if output.records().is_empty() {
                println!("No records found");
            }
            for record in output.records() {
                println!("{}", summary_line(record));
            }
            if let Some(total) = output.total_items() {
                println!("-- {} shown of {} total", output.records().len(), total);
            }
        }
    }
    Ok(())
}

fn summary_line(record: &Document) -> String {
    let id = document_id(record).unwrap_or_else(|| "-".to_string());
    let label = ["name", "displayName", "code", "comment"]
        .iter()
        .find_map(|field| record.get(*field).and_then(Value::as_str))
        .unwrap_or("");
    format!("{}\t{}", id, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_prefers_name_then_fallbacks() {
        let named = json!({"_id": "p1", "name": "Site C", "code": "site-c"});
        assert_eq!(summary_line(named.as_object().unwrap()), "p1\tSite C");

        let coded = json!({"code": "x"});
        assert_eq!(summary_line(coded.as_object().unwrap()), "-\tx");
    }
}
