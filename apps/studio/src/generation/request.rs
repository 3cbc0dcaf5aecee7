use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::content::SourceItem;
use crate::errors::StudioError;
use crate::generation::prompts::build_prompt;
use crate::layout::TargetSize;

// Dataset column names the request builder reads. Everything else passes through untouched.
pub const PRODUCT_IMAGE: &str = "Product Image";
pub const PRODUCT_NAME: &str = "Product Name";
pub const DESCRIPTION: &str = "Description";
pub const PRICE: &str = "Price";
pub const SKU: &str = "SKU";
pub const UNIT: &str = "Unit";

/// Generation pipeline selector understood by the card service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerVersion {
    V1,
    #[default]
    V2,
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerVersion::V1 => f.write_str("v1"),
            ServerVersion::V2 => f.write_str("v2"),
        }
    }
}

impl FromStr for ServerVersion {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" => Ok(ServerVersion::V1),
            "v2" => Ok(ServerVersion::V2),
            other => Err(StudioError::validation(format!(
                "Unknown server version '{other}' (expected v1 or v2)"
            ))),
        }
    }
}

/// A user-defined design model: a name and the prompt that replaces the built-in templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomModel {
    pub name: String,
    pub prompt: String,
}

/// Model parameters shared by every job of one batch.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub model: String,
    pub variations: u32,
    pub server_version: ServerVersion,
    pub custom_models: Vec<CustomModel>,
}

/// JSON body posted to the card generation service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub model: String,
    pub n: u32,
    pub server_version: ServerVersion,
    pub custom_prompt: String,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: String,
}

/// Builds the request for one cell. Pure: no layout or store access.
pub fn build_request(params: &GenerationParams, item: &SourceItem, size: TargetSize) -> GenerationRequest {
    GenerationRequest {
        image_path: item.text(PRODUCT_IMAGE),
        product_name: item.text(PRODUCT_NAME),
        description: item.text(DESCRIPTION),
        price: item.text(PRICE),
        sku: item.text(SKU),
        unit: item.text(UNIT),
        model: params.model.clone(),
        n: params.variations.max(1),
        server_version: params.server_version,
        custom_prompt: build_prompt(
            params.server_version,
            &params.model,
            item,
            &params.custom_models,
        ),
        width: size.width,
        height: size.height,
        aspect_ratio: size.aspect_ratio().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(model: &str, n: u32) -> GenerationParams {
        GenerationParams {
            model: model.to_string(),
            variations: n,
            server_version: ServerVersion::V2,
            custom_models: Vec::new(),
        }
    }

    #[test]
    fn test_request_carries_item_fields_and_geometry() {
        let item: SourceItem = [
            ("Product Image", "img/apple.png"),
            ("Product Name", "Apples"),
            ("Price", "2.99"),
            ("Aisle", "7"),
        ]
        .into_iter()
        .collect();
        let size = TargetSize {
            width: 320,
            height: 180,
        };

        let req = build_request(&params("metro", 1), &item, size);
        assert_eq!(req.image_path.as_deref(), Some("img/apple.png"));
        assert_eq!(req.product_name.as_deref(), Some("Apples"));
        assert_eq!(req.sku, None);
        assert_eq!(req.width, 320);
        assert_eq!(req.aspect_ratio, "16:9");

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["server_version"], "v2");
        assert_eq!(json["n"], 1);
        assert!(json.get("sku").is_none());
        assert!(json.get("Aisle").is_none());
    }

    #[test]
    fn test_variation_count_is_at_least_one() {
        let size = TargetSize {
            width: 100,
            height: 100,
        };
        let req = build_request(&params("walmart", 0), &SourceItem::default(), size);
        assert_eq!(req.n, 1);
    }

    #[test]
    fn test_server_version_parsing() {
        assert_eq!("V1".parse::<ServerVersion>().unwrap(), ServerVersion::V1);
        assert_eq!(" v2 ".parse::<ServerVersion>().unwrap(), ServerVersion::V2);
        assert!("v3".parse::<ServerVersion>().is_err());
        assert_eq!(ServerVersion::default().to_string(), "v2");
    }
}
