use serde::{Deserialize, Deserializer};

/*  DATA QUIRKS HANDLED
    ===================

    1) Any tracked field can be missing from a product
        => outer Option: None only when the key is absent (record gets skipped)

    2) A key can be present with null or a non-string value (list, number)
        => de_field() gives Some(None); the column is stored as NULL

    3) The response also carries count/page/page_size/skip
        => not modelled; serde ignores unknown fields
*/

// OpenFoodFacts search response
// ============================================

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub products: Vec<RawProduct>,
}

// None = key absent, Some(None) = key present without text
pub type Field = Option<Option<String>>;

#[derive(Debug, Default, Deserialize)]
pub struct RawProduct {
    #[serde(default, deserialize_with = "de_field")]
    pub product_name: Field,
    #[serde(default, deserialize_with = "de_field")]
    pub nutriscore_grade: Field,
    #[serde(default, deserialize_with = "de_field")]
    pub url: Field,
    #[serde(default, deserialize_with = "de_field")]
    pub stores: Field,
    #[serde(default, deserialize_with = "de_field")]
    pub purchase_places: Field,
    #[serde(default, deserialize_with = "de_field")]
    pub pnns_groups_1: Field,
    // category label; resolved to category.id before insertion, null never resolves
    #[serde(default, deserialize_with = "de_field")]
    pub pnns_groups_2: Field,
}

// Rows as stored
// ============================================

/// One `product` row, columns in insertion order. `None` is stored as NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub product_name: Option<String>,
    pub nutriscore_grade: Option<String>,
    pub url: Option<String>,
    pub stores: Option<String>,
    pub purchase_places: Option<String>,
    pub pnns_groups_1: Option<String>,
    pub pnns_groups_2: i32,
}

// Functions for error handling
// ============================

// only called when the key is present; missing keys fall back to `default`
fn de_field<'de, D>(deserializer: D) -> Result<Field, D::Error>
where
    D: Deserializer<'de>,
{
    let value: serde_json::Value = Deserialize::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(Some(Some(s))),
        _ => Ok(Some(None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_and_null_values_are_told_apart() {
        let json = r#"{
            "count": 2,
            "page": 1,
            "products": [
                {"product_name": "Nutella", "nutriscore_grade": "e", "stores": null,
                 "purchase_places": ["France"], "pnns_groups_2": 12},
                {}
            ]
        }"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.products.len(), 2);
        let first = &response.products[0];
        assert_eq!(first.product_name, Some(Some("Nutella".to_string())));
        assert_eq!(first.nutriscore_grade, Some(Some("e".to_string())));
        assert_eq!(first.url, None);
        assert_eq!(first.pnns_groups_1, None);
        assert_eq!(first.stores, Some(None));
        assert_eq!(first.purchase_places, Some(None));
        assert_eq!(first.pnns_groups_2, Some(None));
        assert!(response.products[1].product_name.is_none());
    }

    #[test]
    fn empty_strings_count_as_present() {
        let json = r#"{"products": [{"stores": ""}]}"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.products[0].stores, Some(Some(String::new())));
    }

    #[test]
    fn body_without_products_is_rejected() {
        assert!(serde_json::from_str::<SearchResponse>(r#"{"count": 0}"#).is_err());
    }
}
