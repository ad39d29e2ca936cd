//! Recipe wire model.
//!
//! Produced only by deserializing API responses; this crate never constructs
//! or mutates `Recipe` values itself. Every field except `id` is optional on
//! the wire, and absence renders as an explicit placeholder rather than a
//! panic or a silent empty value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FetchError, Result};

/// Image shown when a recipe carries none.
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/150";

const NO_TAGS: &str = "No tags available";
const NO_INSTRUCTIONS: &str = "No instructions available";

/// One recipe as served by the API.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub ingredients: Option<Vec<String>>,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl Recipe {
    /// Image URL, falling back to the shared placeholder.
    pub fn image_url(&self) -> &str {
        match &self.image {
            Some(url) if !url.is_empty() => url,
            _ => PLACEHOLDER_IMAGE,
        }
    }

    /// Comma-joined tag line, or the "not available" placeholder.
    pub fn tags_label(&self) -> String {
        match &self.tags {
            Some(tags) if !tags.is_empty() => tags.join(", "),
            _ => NO_TAGS.to_string(),
        }
    }

    /// Preparation instructions, or the "not available" placeholder.
    pub fn instructions_text(&self) -> &str {
        match &self.instructions {
            Some(text) if !text.is_empty() => text,
            _ => NO_INSTRUCTIONS,
        }
    }

    /// Ingredient list; empty when the API omitted the field.
    pub fn ingredient_list(&self) -> &[String] {
        self.ingredients.as_deref().unwrap_or(&[])
    }
}

/// Decode a cached/fetched body as a recipe list.
///
/// A body that is not a semantically valid recipe array is an irrecoverable
/// `Decode` failure, never coerced to an empty list.
pub fn recipe_list_from_value(value: &Value) -> Result<Vec<Recipe>> {
    serde_json::from_value(value.clone())
        .map_err(|e| FetchError::Decode(format!("not a recipe list: {}", e)))
}

/// Decode a cached/fetched body as a single recipe record.
pub fn recipe_from_value(value: &Value) -> Result<Recipe> {
    serde_json::from_value(value.clone())
        .map_err(|e| FetchError::Decode(format!("not a recipe record: {}", e)))
}
