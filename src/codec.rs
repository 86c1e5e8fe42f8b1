//! CSV Codec
//!
//! Lossless conversion between an ordered record list and CSV text for a fixed
//! table schema. Comma delimiter, RFC 4180 double-quote escaping, LF line
//! endings, one header row, trailing newline.
//!
//! Decoding is strict about quoting: an unterminated quoted field is reported
//! as [`CodecError::Malformed`] rather than recovered, so a damaged file is
//! never rewritten with shifted columns.

use crate::error::CodecError;
use crate::table::TableSchema;
use crate::types::Record;

const BOM: char = '\u{feff}';

/// Encode `records` as CSV using the schema's column order
pub fn encode(records: &[Record], schema: &TableSchema) -> String {
    let mut out = String::new();
    push_row(&mut out, schema.columns.iter().map(String::as_str));
    for record in records {
        push_row(
            &mut out,
            schema.columns.iter().map(|column| record.value(column)),
        );
    }
    out
}

fn push_row<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let start = out.len();
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    // A lone empty field would read back as a blank line
    if out.len() == start {
        out.push_str("\"\"");
    }
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if needs_quoting(field) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

fn needs_quoting(field: &str) -> bool {
    // Whitespace-only values are quoted so a one-column row is not read back as blank
    field.contains([',', '"', '\n', '\r']) || (!field.is_empty() && field.trim().is_empty())
}

/// Decode CSV text into schema-shaped records
///
/// A first row that names the primary-key column, and whose non-empty fields
/// are mostly schema columns, is treated as a header whether or not it is
/// quoted. Columns are then matched by trimmed name so reordered files still
/// decode into schema order. Without a header, fields are positional.
/// Short rows are padded with empty strings. Empty or whitespace-only input
/// yields no records.
pub fn decode(text: &str, schema: &TableSchema) -> Result<Vec<Record>, CodecError> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rows = parse_rows(text)?;
    let mut rows = rows.into_iter().peekable();

    let layout: Vec<Option<usize>> = match rows.peek() {
        Some(first) if is_header(first, schema) => {
            let header = rows.next().map(|row| row.fields).unwrap_or_default();
            header
                .iter()
                .map(|name| schema.columns.iter().position(|c| c == name.trim()))
                .collect()
        }
        _ => (0..schema.columns.len()).map(Some).collect(),
    };

    let mut records = Vec::new();
    for row in rows {
        records.push(shape_row(row, &layout, schema)?);
    }
    Ok(records)
}

fn is_header(row: &ParsedRow, schema: &TableSchema) -> bool {
    let names: Vec<&str> = row
        .fields
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect();
    if !names.contains(&schema.primary_key()) {
        return false;
    }
    let known = names.iter().filter(|name| schema.has_column(name)).count();
    known * 2 > names.len()
}

fn shape_row(
    row: ParsedRow,
    layout: &[Option<usize>],
    schema: &TableSchema,
) -> Result<Record, CodecError> {
    if row.fields.len() > layout.len() {
        let overflow = &row.fields[layout.len()..];
        if overflow.iter().any(|f| !f.is_empty()) {
            return Err(CodecError::Malformed {
                line: row.line,
                reason: format!(
                    "row has {} fields but only {} columns are declared",
                    row.fields.len(),
                    layout.len()
                ),
            });
        }
    }

    let mut values = vec![String::new(); schema.columns.len()];
    for (field, slot) in row.fields.into_iter().zip(layout.iter()) {
        if let Some(index) = slot {
            values[*index] = field;
        }
    }

    Ok(schema.columns.iter().cloned().zip(values).collect())
}

#[derive(Debug)]
struct ParsedRow {
    /// 1-based line where the row starts
    line: usize,
    fields: Vec<String>,
}

fn parse_rows(text: &str) -> Result<Vec<ParsedRow>, CodecError> {
    let mut rows = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut field_quoted = false;
    let mut row_quoted = false;
    let mut in_quotes = false;
    let mut line = 1;
    let mut row_line = 1;
    let mut quote_line = 1;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !field_quoted => {
                in_quotes = true;
                field_quoted = true;
                row_quoted = true;
                quote_line = line;
            }
            ',' => {
                fields.push(std::mem::take(&mut field));
                field_quoted = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                push_parsed(&mut rows, row_line, &mut fields, row_quoted);
                field_quoted = false;
                row_quoted = false;
                line += 1;
                row_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(CodecError::Malformed {
            line: quote_line,
            reason: "unterminated quoted field".to_string(),
        });
    }

    if !field.is_empty() || !fields.is_empty() || field_quoted {
        fields.push(field);
        push_parsed(&mut rows, row_line, &mut fields, row_quoted);
    }

    Ok(rows)
}

fn push_parsed(
    rows: &mut Vec<ParsedRow>,
    line: usize,
    fields: &mut Vec<String>,
    row_quoted: bool,
) {
    let fields = std::mem::take(fields);
    let blank = !row_quoted && fields.iter().all(|f| f.trim().is_empty()) && fields.len() == 1;
    if !blank {
        rows.push(ParsedRow { line, fields });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn schema() -> TableSchema {
        TableSchema::new("molds.csv", &["MoldID", "MoldCode", "MoldName"], "M").unwrap()
    }

    fn record(id: &str, code: &str, name: &str) -> Record {
        [("MoldID", id), ("MoldCode", code), ("MoldName", name)]
            .into_iter()
            .collect()
    }

    #[test]
    fn encode_writes_header_rows_and_trailing_newline() {
        let text = encode(&[record("M1", "C1", "Foo")], &schema());
        assert_eq!(text, "MoldID,MoldCode,MoldName\nM1,C1,Foo\n");
    }

    #[test]
    fn encode_empty_list_is_header_only() {
        assert_eq!(encode(&[], &schema()), "MoldID,MoldCode,MoldName\n");
    }

    #[test]
    fn encode_quotes_delimiters_and_doubles_quotes() {
        let text = encode(&[record("M1", "a\nb", "A, \"B\"")], &schema());
        assert_eq!(
            text,
            "MoldID,MoldCode,MoldName\nM1,\"a\nb\",\"A, \"\"B\"\"\"\n"
        );
    }

    #[test]
    fn encode_renders_missing_fields_empty() {
        let partial: Record = [("MoldID", "M1")].into_iter().collect();
        let text = encode(&[partial], &schema());
        assert_eq!(text, "MoldID,MoldCode,MoldName\nM1,,\n");
    }

    #[test]
    fn quoting_scenario_round_trips_exactly() {
        let original = record("M1", "C1", "A, \"B\"");
        let decoded = decode(&encode(&[original.clone()], &schema()), &schema()).unwrap();
        assert_eq!(decoded, vec![original]);
        assert_eq!(decoded[0].value("MoldName"), "A, \"B\"");
    }

    #[test]
    fn decode_empty_and_whitespace_input() {
        assert!(decode("", &schema()).unwrap().is_empty());
        assert!(decode("  \n\t\n", &schema()).unwrap().is_empty());
    }

    #[test]
    fn decode_header_only_yields_no_records() {
        assert!(decode("MoldID,MoldCode,MoldName\n", &schema())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn decode_trims_header_names_and_maps_by_name() {
        let text = " MoldName , MoldID,MoldCode\nFoo,M1,C1\n";
        let schema = TableSchema::new("molds.csv", &["MoldName", "MoldID", "MoldCode"], "M")
            .unwrap();
        let records = decode(text, &schema).unwrap();
        assert_eq!(records, vec![record("M1", "C1", "Foo")]);

        // Reordered header against the canonical schema
        let text = "MoldID,MoldName,MoldCode\nM1,Foo,C1\n";
        let records = decode(text, &self::schema()).unwrap();
        assert_eq!(records, vec![record("M1", "C1", "Foo")]);
    }

    #[test]
    fn decode_consumes_fully_quoted_header() {
        let text = "\"MoldID\",\"MoldCode\",\"MoldName\"\n\"M1\",\"C1\",\"Foo\"\n";
        assert_eq!(
            decode(text, &schema()).unwrap(),
            vec![record("M1", "C1", "Foo")]
        );
    }

    #[test]
    fn decode_maps_header_with_key_not_first() {
        let text = "MoldName,MoldID,MoldCode\nFoo,M1,C1\n";
        assert_eq!(
            decode(text, &schema()).unwrap(),
            vec![record("M1", "C1", "Foo")]
        );
    }

    #[test]
    fn data_row_holding_a_column_name_is_not_a_header() {
        let records = decode("M1,MoldID,Foo\n", &schema()).unwrap();
        assert_eq!(records, vec![record("M1", "MoldID", "Foo")]);
    }

    #[test]
    fn decode_headerless_is_positional() {
        let records = decode("M1,C1,Foo\nM2,C2,Bar", &schema()).unwrap();
        assert_eq!(
            records,
            vec![record("M1", "C1", "Foo"), record("M2", "C2", "Bar")]
        );
    }

    #[test]
    fn decode_pads_short_rows() {
        let records = decode("MoldID,MoldCode,MoldName\nM1\n", &schema()).unwrap();
        assert_eq!(records, vec![record("M1", "", "")]);
    }

    #[test]
    fn decode_drops_columns_outside_schema() {
        let text = "MoldID,Legacy,MoldName\nM1,old,Foo\n";
        let records = decode(text, &schema()).unwrap();
        assert_eq!(records, vec![record("M1", "", "Foo")]);
    }

    #[test]
    fn decode_accepts_crlf_and_bom() {
        let text = "\u{feff}MoldID,MoldCode,MoldName\r\nM1,C1,Foo\r\n";
        let records = decode(text, &schema()).unwrap();
        assert_eq!(records, vec![record("M1", "C1", "Foo")]);
    }

    #[test]
    fn decode_skips_blank_lines() {
        let text = "MoldID,MoldCode,MoldName\n\nM1,C1,Foo\n\n";
        assert_eq!(decode(text, &schema()).unwrap().len(), 1);
    }

    #[test]
    fn decode_rejects_unterminated_quote() {
        let text = "MoldID,MoldCode,MoldName\nM1,\"C1,Foo\nM2,C2,Bar\n";
        let err = decode(text, &schema()).unwrap_err();
        assert_eq!(
            err,
            CodecError::Malformed {
                line: 2,
                reason: "unterminated quoted field".to_string()
            }
        );
    }

    #[test]
    fn decode_rejects_overlong_rows() {
        let text = "MoldID,MoldCode,MoldName\nM1,C1,Foo,extra\n";
        let err = decode(text, &schema()).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { line: 2, .. }));
    }

    #[test]
    fn decode_tolerates_trailing_empty_fields() {
        let text = "MoldID,MoldCode,MoldName\nM1,C1,Foo,,\n";
        assert_eq!(
            decode(text, &schema()).unwrap(),
            vec![record("M1", "C1", "Foo")]
        );
    }

    #[test]
    fn single_column_empty_value_survives() {
        let schema = TableSchema::new("ids.csv", &["ID"], "I").unwrap();
        let records = vec![[("ID", "")].into_iter().collect::<Record>()];
        let text = encode(&records, &schema);
        assert_eq!(text, "ID\n\"\"\n");
        assert_eq!(decode(&text, &schema).unwrap(), records);
    }

    proptest! {
        #[test]
        fn round_trip_law(rows in prop::collection::vec(
            (
                "[a-zA-Z0-9 ,\"\n\r;'-]{0,12}",
                "[a-zA-Z0-9 ,\"\n\r;'-]{0,12}",
                "[a-zA-Z0-9 ,\"\n\r;'-]{0,12}",
            ),
            0..8,
        )) {
            let schema = schema();
            let records: Vec<Record> = rows
                .iter()
                .map(|(a, b, c)| record(a, b, c))
                .collect();
            let decoded = decode(&encode(&records, &schema), &schema).unwrap();
            prop_assert_eq!(decoded, records);
        }
    }
}
