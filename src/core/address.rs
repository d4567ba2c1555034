use crate::domain::model::RawResourceRecord;

pub const DEFAULT_REGION: &str = "NC";

/// 將原始資料列整理成可供地理編碼的單一地址字串
#[derive(Debug, Clone)]
pub struct AddressFormatter {
    region: String,
}

impl Default for AddressFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_REGION)
    }
}

impl AddressFormatter {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Joins street, city, region and zip. Returns an empty string when the
    /// record has none of street, city or zip.
    ///
    /// A street such as `"12 Oak St, Raleigh NC 27601"` is split on commas and
    /// the city/zip are re-derived from the first and last tokens of the second
    /// segment. This is a heuristic and gets multi-word city names wrong.
    pub fn format(&self, record: &RawResourceRecord) -> String {
        let mut street = record.field("Address");
        let mut city = record.field("City");
        let mut zip = record.field("Zip");

        if let Some(raw) = street.clone() {
            let segments: Vec<&str> = raw.split(',').collect();
            if segments.len() > 1 {
                street = non_empty(segments[0]);
                let tokens: Vec<&str> = segments[1].split_whitespace().collect();
                if let (Some(first), Some(last)) = (tokens.first(), tokens.last()) {
                    city = non_empty(first);
                    zip = non_empty(last);
                }
            }
        }

        if street.is_none() && city.is_none() && zip.is_none() {
            return String::new();
        }

        [street, city, non_empty(&self.region), zip]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn format(value: serde_json::Value) -> String {
        AddressFormatter::default().format(&RawResourceRecord::from(value))
    }

    #[test]
    fn test_format_clean_record() {
        let formatted = format(json!({
            "Address": " 100 Main St ",
            "City": "Charlotte",
            "Zip": "28202"
        }));
        assert_eq!(formatted, "100 Main St, Charlotte, NC, 28202");
    }

    #[test]
    fn test_format_numeric_zip() {
        let formatted = format(json!({"Address": "5 Elm Rd", "City": "Durham", "Zip": 27701}));
        assert_eq!(formatted, "5 Elm Rd, Durham, NC, 27701");
    }

    #[test]
    fn test_format_dirty_street_with_embedded_city_and_zip() {
        let formatted = format(json!({
            "Address": "12 Oak St, Raleigh NC 27601",
            "City": "Ignored",
            "Zip": "00000"
        }));
        assert_eq!(formatted, "12 Oak St, Raleigh, NC, 27601");
    }

    #[test]
    fn test_format_missing_fields_are_omitted() {
        assert_eq!(format(json!({"City": "Cary"})), "Cary, NC");
        assert_eq!(format(json!({"Address": "1 Main St"})), "1 Main St, NC");
    }

    #[test]
    fn test_format_empty_record() {
        let formatted = format(json!({
            "Organization": "A Clinic",
            "Address": "",
            "City": "",
            "Zip": ""
        }));
        assert_eq!(formatted, "");
        assert_eq!(format(json!({})), "");
    }

    #[test]
    fn test_custom_region() {
        let formatter = AddressFormatter::new("SC");
        let record = RawResourceRecord::from(json!({"Address": "1 King St", "City": "Charleston"}));
        assert_eq!(formatter.format(&record), "1 King St, Charleston, SC");
    }
}
