//! CSV export for a completed job's results.
//!
//! One row per [`Business`], matching the minimal writer described for the
//! pipeline: no `csv` crate dependency, just an escaped `std::io::Write`
//! writer in the style of the teacher's `content_saver` save functions.
//! `email_verification` is omitted entirely — it is an internal detail of
//! the (out-of-scope) verification step, not a deliverable column.

use std::io::Write;

use crate::model::Business;

const HEADER: &[&str] = &[
    "name",
    "phone",
    "website",
    "address",
    "latitude",
    "longitude",
    "rating",
    "rating_count",
    "category",
    "search_term",
    "search_type",
    "search_location",
    "detail_url",
    "email",
    "reviews_count",
    "review_1_text",
    "review_1_rating",
    "review_1_date",
];

/// Write `records` as CSV to `writer`. Column order is fixed; see [`HEADER`].
pub fn write_csv<W: Write>(writer: &mut W, records: &[Business]) -> std::io::Result<()> {
    write_row(writer, HEADER.iter().copied())?;
    for record in records {
        write_row(writer, row_fields(record).iter().map(String::as_str))?;
    }
    Ok(())
}

/// Render `records` as a CSV string, for callers that want an in-memory
/// result (e.g. an HTTP download response) rather than a `Write` sink.
pub fn to_csv_string(records: &[Business]) -> String {
    let mut buf = Vec::new();
    write_csv(&mut buf, records).expect("writing to a Vec<u8> cannot fail");
    String::from_utf8(buf).expect("CSV fields are escaped ASCII/UTF-8 text")
}

fn row_fields(record: &Business) -> [String; 18] {
    let (review_1_text, review_1_rating, review_1_date) = record
        .filtered_reviews
        .as_ref()
        .and_then(|reviews| reviews.first())
        .map_or((String::new(), String::new(), String::new()), |review| {
            (
                review.text.clone(),
                review.rating.map_or(String::new(), |r| r.to_string()),
                review.date.to_rfc3339(),
            )
        });

    [
        record.name.clone(),
        record.phone.clone().unwrap_or_default(),
        record.website.clone().unwrap_or_default(),
        record.address.clone().unwrap_or_default(),
        record.latitude.map_or(String::new(), |v| v.to_string()),
        record.longitude.map_or(String::new(), |v| v.to_string()),
        record.rating.map_or(String::new(), |v| v.to_string()),
        record.rating_count.clone(),
        record.category.clone().unwrap_or_default(),
        record.search_term.clone(),
        record.search_type.clone(),
        record.search_location.clone(),
        record.detail_url.clone(),
        record.emails.join(","),
        record
            .filtered_review_count
            .map_or(String::new(), |v| v.to_string()),
        review_1_text,
        review_1_rating,
        review_1_date,
    ]
}

fn write_row<'a, W: Write>(writer: &mut W, fields: impl Iterator<Item = &'a str>) -> std::io::Result<()> {
    let mut first = true;
    for field in fields {
        if !first {
            write!(writer, ",")?;
        }
        first = false;
        write!(writer, "{}", escape_field(field))?;
    }
    writeln!(writer)
}

/// Quote a field if it contains a comma, quote, or newline; double any
/// embedded quotes, per RFC 4180.
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EmailStatus, FilteredReview, SEARCH_TYPE};

    fn sample(name: &str) -> Business {
        Business {
            name: name.to_string(),
            phone: Some("555-1234".to_string()),
            website: None,
            address: Some("123 Main St, Springfield".to_string()),
            latitude: Some(39.78),
            longitude: Some(-89.65),
            rating: Some(4.5),
            rating_count: "120".to_string(),
            category: Some("Coffee shop".to_string()),
            search_term: "coffee".to_string(),
            search_type: SEARCH_TYPE.to_string(),
            search_location: "Springfield, IL, US".to_string(),
            detail_url: "https://maps.example/a".to_string(),
            emails: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            email_status: vec![EmailStatus::Deliverable, EmailStatus::Risky],
            email_verification: None,
            filtered_reviews: None,
            filtered_review_count: None,
        }
    }

    #[test]
    fn header_matches_field_count() {
        let csv = to_csv_string(&[]);
        assert_eq!(csv.trim_end(), HEADER.join(","));
    }

    #[test]
    fn comma_in_address_is_quoted() {
        let csv = to_csv_string(&[sample("Acme")]);
        assert!(csv.contains("\"123 Main St, Springfield\""));
    }

    #[test]
    fn emails_are_comma_joined_in_one_quoted_field() {
        let csv = to_csv_string(&[sample("Acme")]);
        assert!(csv.contains("\"a@example.com,b@example.com\""));
    }

    #[test]
    fn review_columns_populate_from_first_filtered_review() {
        let mut record = sample("Acme");
        record.filtered_review_count = Some(2);
        record.filtered_reviews = Some(vec![
            FilteredReview {
                text: "Great coffee".to_string(),
                rating: Some(5.0),
                date: chrono::Utc::now(),
            },
            FilteredReview {
                text: "Also good".to_string(),
                rating: Some(4.0),
                date: chrono::Utc::now(),
            },
        ]);
        let csv = to_csv_string(&[record]);
        let data_row = csv.lines().nth(1).unwrap();
        assert!(data_row.contains("Great coffee"));
        assert!(!data_row.contains("Also good"));
    }

    #[test]
    fn no_reviews_leaves_review_columns_empty() {
        let csv = to_csv_string(&[sample("Acme")]);
        let data_row = csv.lines().nth(1).unwrap();
        assert!(data_row.ends_with(",,,"));
    }
}
