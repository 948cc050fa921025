use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::models::{expedition, materiel, ExpeditionStatus};

/// Output format of a shipment manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Csv,
    Tsv,
}

impl Default for ManifestFormat {
    fn default() -> Self {
        ManifestFormat::Json
    }
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestFormat::Json => write!(f, "json"),
            ManifestFormat::Csv => write!(f, "csv"),
            ManifestFormat::Tsv => write!(f, "tsv"),
        }
    }
}

impl FromStr for ManifestFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ManifestFormat::Json),
            "csv" => Ok(ManifestFormat::Csv),
            "tsv" => Ok(ManifestFormat::Tsv),
            other => Err(anyhow!("unsupported manifest format: {}", other)),
        }
    }
}

impl ManifestFormat {
    fn delimiter(self) -> Option<char> {
        match self {
            ManifestFormat::Json => None,
            ManifestFormat::Csv => Some(','),
            ManifestFormat::Tsv => Some('\t'),
        }
    }
}

/// Sender or receiver block of a manifest
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ManifestParty {
    pub place: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ManifestLine {
    /// 1-based line number
    pub line: usize,
    pub designation: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub quantity: i32,
}

/// Printable shipment document. The client turns it into a PDF.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Manifest {
    pub number: String,
    pub designation: String,
    pub status: ExpeditionStatus,
    pub sender: ManifestParty,
    pub receiver: ManifestParty,
    pub notes: Option<String>,
    pub lines: Vec<ManifestLine>,
    pub total_quantity: i64,
    pub generated_at: DateTime<Utc>,
}

impl Manifest {
    pub fn build(
        shipment: &expedition::Model,
        items: &[materiel::Model],
        generated_at: DateTime<Utc>,
    ) -> Self {
        let lines: Vec<ManifestLine> = items
            .iter()
            .enumerate()
            .map(|(index, item)| ManifestLine {
                line: index + 1,
                designation: item.designation.clone(),
                category: item.category.clone(),
                description: item.description.clone(),
                quantity: item.quantity,
            })
            .collect();

        Self {
            number: shipment.number.clone(),
            designation: shipment.designation.clone(),
            status: shipment.status,
            sender: ManifestParty {
                place: shipment.origin.clone(),
                name: shipment.sender_name.clone(),
                address: shipment.sender_address.clone(),
                date: shipment.departure_date,
            },
            receiver: ManifestParty {
                place: shipment.destination.clone(),
                name: shipment.receiver_name.clone(),
                address: shipment.receiver_address.clone(),
                date: shipment.arrival_date,
            },
            notes: shipment.notes.clone(),
            total_quantity: lines.iter().map(|l| i64::from(l.quantity)).sum(),
            lines,
            generated_at,
        }
    }

    pub fn filename(&self, format: ManifestFormat) -> String {
        format!("expedition-{}.{}", self.number, format)
    }

    /// Renders the manifest. Returns the body and its content type.
    pub fn render(&self, format: ManifestFormat) -> Result<(String, &'static str)> {
        match format.delimiter() {
            None => Ok((serde_json::to_string_pretty(self)?, "application/json")),
            Some(delimiter) => Ok(build_delimited_payload(self, delimiter)),
        }
    }
}

const HEADER_FIELDS: [&str; 12] = [
    "number",
    "designation",
    "status",
    "origin",
    "departure_date",
    "destination",
    "arrival_date",
    "line",
    "item",
    "category",
    "description",
    "quantity",
];

/// One row per line; shipment columns are repeated so each row stands alone.
fn build_delimited_payload(manifest: &Manifest, delimiter: char) -> (String, &'static str) {
    let content_type = match delimiter {
        ',' => "text/csv",
        '\t' => "text/tab-separated-values",
        _ => "text/plain",
    };
    let separator = delimiter.to_string();

    let shipment_fields = [
        Value::String(manifest.number.clone()),
        Value::String(manifest.designation.clone()),
        Value::String(manifest.status.to_string()),
        Value::String(manifest.sender.place.clone()),
        date_value(manifest.sender.date),
        Value::String(manifest.receiver.place.clone()),
        date_value(manifest.receiver.date),
    ];

    let mut lines = Vec::with_capacity(manifest.lines.len() + 1);
    lines.push(HEADER_FIELDS.join(&separator));

    for line in &manifest.lines {
        let row: Vec<String> = shipment_fields
            .iter()
            .cloned()
            .chain([
                Value::from(line.line),
                Value::String(line.designation.clone()),
                line.category.clone().map(Value::String).unwrap_or(Value::Null),
                line.description.clone().map(Value::String).unwrap_or(Value::Null),
                Value::from(line.quantity),
            ])
            .map(|field| escape_field(&value_to_string(&field), delimiter))
            .collect();
        lines.push(row.join(&separator));
    }

    (lines.join("\n"), content_type)
}

fn date_value(date: Option<DateTime<Utc>>) -> Value {
    date.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        .unwrap_or(Value::Null)
}

fn escape_field(value: &str, delimiter: char) -> String {
    if value.contains(delimiter) || value.contains('"') || value.contains('\n') {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(arr) => arr
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MaterielStatus;
    use chrono::TimeZone;
    use rstest::rstest;
    use uuid::Uuid;

    fn shipment() -> expedition::Model {
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
        expedition::Model {
            id: Uuid::new_v4(),
            number: "EXP-2024-00A1B2".into(),
            designation: "Kits bureau de vote".into(),
            origin: "Antananarivo".into(),
            departure_date: Some(at),
            sender_name: Some("CENI".into()),
            sender_address: None,
            destination: "Toamasina".into(),
            arrival_date: None,
            receiver_name: None,
            receiver_address: None,
            status: ExpeditionStatus::InTransit,
            notes: None,
            region_id: None,
            district_id: None,
            commune_id: None,
            voting_center_id: None,
            user_id: Uuid::new_v4(),
            created_at: at,
            updated_at: at,
        }
    }

    fn line(designation: &str, description: Option<&str>, quantity: i32) -> materiel::Model {
        let now = Utc::now();
        materiel::Model {
            id: Uuid::new_v4(),
            expedition_id: Uuid::nil(),
            materiel_type_id: None,
            designation: designation.into(),
            category: Some("Matériel".into()),
            description: description.map(Into::into),
            quantity,
            quantity_received: None,
            quantity_used: None,
            status: MaterielStatus::Good,
            user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    #[case("json", ManifestFormat::Json)]
    #[case("CSV", ManifestFormat::Csv)]
    #[case(" tsv ", ManifestFormat::Tsv)]
    fn parses_formats(#[case] raw: &str, #[case] expected: ManifestFormat) {
        assert_eq!(raw.parse::<ManifestFormat>().unwrap(), expected);
    }

    #[test]
    fn rejects_pdf_format() {
        assert!("pdf".parse::<ManifestFormat>().is_err());
    }

    #[test]
    fn build_numbers_lines_and_totals_quantities() {
        let manifest = Manifest::build(
            &shipment(),
            &[line("Urnes", None, 10), line("Isoloirs", None, 4)],
            Utc::now(),
        );
        assert_eq!(manifest.lines[1].line, 2);
        assert_eq!(manifest.total_quantity, 14);
        assert_eq!(
            manifest.filename(ManifestFormat::Csv),
            "expedition-EXP-2024-00A1B2.csv"
        );
    }

    #[test]
    fn csv_escapes_delimiters_and_quotes() {
        let manifest = Manifest::build(
            &shipment(),
            &[line("Bulletins", Some("lot \"A\", scellé"), 500)],
            Utc::now(),
        );
        let (body, content_type) = manifest.render(ManifestFormat::Csv).unwrap();
        assert_eq!(content_type, "text/csv");

        let rows: Vec<&str> = body.lines().collect();
        assert_eq!(rows[0], HEADER_FIELDS.join(","));
        assert_eq!(
            rows[1],
            "EXP-2024-00A1B2,Kits bureau de vote,in_transit,Antananarivo,2024-05-02,Toamasina,,1,Bulletins,Matériel,\"lot \"\"A\"\", scellé\",500"
        );
    }

    #[test]
    fn delimited_rows_carry_every_line_field() {
        let mut bare = line("Urnes", None, 2);
        bare.category = None;
        let manifest = Manifest::build(
            &shipment(),
            &[line("Isoloirs", Some("pliables"), 4), bare],
            Utc::now(),
        );
        let (body, _) = manifest.render(ManifestFormat::Tsv).unwrap();
        let rows: Vec<Vec<&str>> = body.lines().map(|r| r.split('\t').collect()).collect();

        let header = &rows[0];
        let column = |name: &str| header.iter().position(|h| *h == name).unwrap();
        assert_eq!(rows[1][column("item")], "Isoloirs");
        assert_eq!(rows[1][column("category")], "Matériel");
        assert_eq!(rows[1][column("description")], "pliables");
        assert_eq!(rows[1][column("quantity")], "4");
        assert_eq!(rows[2][column("category")], "");
        assert_eq!(rows[2][column("description")], "");
        assert!(rows.iter().all(|r| r.len() == HEADER_FIELDS.len()));
    }

    #[test]
    fn tsv_uses_tabs() {
        let manifest = Manifest::build(&shipment(), &[line("Urnes", None, 1)], Utc::now());
        let (body, content_type) = manifest.render(ManifestFormat::Tsv).unwrap();
        assert_eq!(content_type, "text/tab-separated-values");
        assert!(body.lines().nth(1).unwrap().starts_with("EXP-2024-00A1B2\t"));
    }

    #[test]
    fn json_render_is_the_serialized_manifest() {
        let manifest = Manifest::build(&shipment(), &[line("Urnes", None, 3)], Utc::now());
        let (body, content_type) = manifest.render(ManifestFormat::Json).unwrap();
        assert_eq!(content_type, "application/json");
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["status"], "in_transit");
        assert_eq!(value["lines"][0]["quantity"], 3);
    }
}
