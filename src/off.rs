use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

use crate::config::{Api, Config};
use crate::engine;
use crate::error::SetupError;
use crate::schema::{ProductRow, RawProduct, SearchResponse};
use crate::setup::ProductSource;

// fields requested from the search endpoint; everything else is dropped server-side
pub const FIELDS: &str =
    "product_name,nutriscore_grade,url,stores,purchase_places,pnns_groups_1,pnns_groups_2";

// build the search url: one page, most scanned first
pub fn search_url(api: &Api) -> Result<reqwest::Url, SetupError> {
    let page_size = api.page_size.to_string();
    let page = api.page.to_string();
    reqwest::Url::parse_with_params(
        &api.url,
        &[
            ("json", "true"),
            ("action", "process"),
            ("sort_by", "unique_scans_n"),
            ("page_size", page_size.as_str()),
            ("page", page.as_str()),
            ("fields", FIELDS),
            ("countries", api.country.as_str()),
        ],
    )
    .map_err(|e| SetupError::Config(format!("api.url '{}' is not a valid url: {e}", api.url)))
}

/// Product source backed by the OpenFoodFacts search API.
pub struct OpenFoodFacts {
    client: reqwest::Client,
    url: reqwest::Url,
    user_agent: String,
}

impl OpenFoodFacts {
    pub fn new(config: &Config) -> Result<Self, SetupError> {
        Ok(OpenFoodFacts {
            client: reqwest::Client::new(),
            url: search_url(&config.api)?,
            user_agent: config.auth.user_agent.clone(),
        })
    }
}

#[async_trait]
impl ProductSource for OpenFoodFacts {
    async fn fetch(&self) -> Result<SearchResponse, SetupError> {
        info!("Fetching products from OpenFoodFacts ...");
        let response: SearchResponse =
            engine::get_json(&self.client, self.url.clone(), &self.user_agent).await?;
        info!(products = response.products.len(), "Products fetched");
        Ok(response)
    }
}

/// Category name to `category.id`.
///
/// Ids are the 1-based position in the configured list, which is also the
/// order the rows are inserted in, so nothing is read back from the database.
#[derive(Debug, Clone)]
pub struct CategoryIndex {
    ids: HashMap<String, i32>,
}

impl CategoryIndex {
    pub fn new(categories: &[String]) -> Self {
        let ids = categories
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index as i32 + 1))
            .collect();
        CategoryIndex { ids }
    }

    pub fn resolve(&self, name: &str) -> Option<i32> {
        self.ids.get(name).copied()
    }
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub rows: Vec<ProductRow>,
    pub skipped: usize,
}

/// Keep the products that have every tracked field and a known category,
/// in response order.
pub fn extract_rows(response: &SearchResponse, index: &CategoryIndex) -> Extraction {
    let mut extraction = Extraction {
        rows: Vec::with_capacity(response.products.len()),
        skipped: 0,
    };
    for product in &response.products {
        match product_row(product, index) {
            Some(row) => extraction.rows.push(row),
            None => extraction.skipped += 1,
        }
    }
    extraction
}

/// `None` when a tracked key is missing or the category does not resolve.
/// A key present with a null value is kept and stored as NULL, except the
/// category, which has nothing to resolve.
pub fn product_row(product: &RawProduct, index: &CategoryIndex) -> Option<ProductRow> {
    let category = product.pnns_groups_2.as_ref()?.as_deref()?;
    Some(ProductRow {
        product_name: product.product_name.clone()?,
        nutriscore_grade: product.nutriscore_grade.clone()?,
        url: product.url.clone()?,
        stores: product.stores.clone()?,
        purchase_places: product.purchase_places.clone()?,
        pnns_groups_1: product.pnns_groups_1.clone()?,
        pnns_groups_2: index.resolve(category)?,
    })
}
