//! Card prompt templates, one per house style and server version.
//!
//! Prompt text is a pure function of (server version, model name, item, custom models).
//! Unknown model names fall back to the `walmart` style.

use crate::content::SourceItem;
use crate::generation::request::{
    CustomModel, ServerVersion, DESCRIPTION, PRICE, PRODUCT_NAME, SKU, UNIT,
};

pub const FALLBACK_MODEL: &str = "walmart";
pub const DEFAULT_DESIGN_MODEL: &str = "metro";

const DEFAULT_UNIT: &str = "1 Unit";

/// A built-in house style.
pub struct HouseStyle {
    pub name: &'static str,
    /// Page background applied to the layout when the style is selected.
    pub background: &'static str,
    title: &'static str,
    v1_brief: &'static str,
    v2_brief: &'static str,
}

pub const HOUSE_STYLES: &[HouseStyle] = &[
    HouseStyle {
        name: "walmart",
        background: "#bfdbfe",
        title: "Blue Flyer",
        v1_brief: "\
1. Background: solid light sky blue (#BDE4FA), no gradients, no boxes behind text.
2. Product: use the supplied product image as-is, centered, floating with a soft drop shadow.
3. Badge: dark navy rounded square, top right, showing the pack/unit size in white bold type.
4. Price: dark navy heavy sans-serif, bottom right; dollars dominant, dollar sign and cents superscript, no decimal point.
5. Details: bottom left, dark navy, product name then description.",
        v2_brief: "\
1. Background: solid light sky blue (#BDE4FA) card with soft rounded corners, text directly on the blue.
2. Product: centered and floating, original background removed, natural drop shadow.
3. Badge: dark navy rounded square, top right, pack/unit size in white bold type.
4. Price: dark navy heavy sans-serif, bottom right; dollars dominant, superscript cents, no decimal point.
5. Details: bottom left; name, then description, then SKU in the smallest legible size.",
    },
    HouseStyle {
        name: "metro",
        background: "#fecaca",
        title: "Metro Discount Flyer",
        v1_brief: "\
1. Canvas: solid white, borderless to the edge, high contrast, no textures.
2. Product: cut out, centered in the upper two thirds, minimal soft shadow.
3. Price: solid black extra bold sans-serif anchored bottom right; cents 30% of the dollar size, top aligned, no decimal point; unit label under the cents.
4. Details: flush left at the bottom; name in bold capitals, description smaller below.",
        v2_brief: "\
1. Canvas: pure white, no border or frame of any kind.
2. Product: high resolution cut out in the upper two thirds, naturally grounded.
3. Price: massive black heavy sans-serif block, bottom right; superscript cents, no decimal point; unit label under the cents.
4. Details: bottom left, all caps; bold name line and a lighter description line.",
    },
    HouseStyle {
        name: "staples",
        background: "#ffffff",
        title: "Staples Red Card",
        v1_brief: "\
1. Layout: clean white card with a strong Staples red (#CC0000) header band or price block.
2. Product: supplied image unchanged, left side or top half, subtle realistic shadow.
3. Price: the largest, boldest element; black on white or white on the red block.
4. Type: modern sans-serif; name bold, description and SKU small and regular.
5. No cartoon icons, no busy backgrounds, at most one clean logo.",
        v2_brief: "\
1. Layout: modular white card; one zone each for image, price, and copy, with red (#CC0000) accents.
2. Product: photorealistic and grounded with a subtle shadow.
3. Price: large bold sans-serif, optionally white on a red block, per-unit info small beside it.
4. Type: Helvetica-like hierarchy; SKU in discreet small text.",
    },
    HouseStyle {
        name: "sobeys",
        background: "#dcfce7",
        title: "Sobeys Fresh",
        v1_brief: "\
1. Background: soft fresh green tint with a clean white content panel.
2. Product: supplied image unchanged, centered, gentle shadow.
3. Price: bold dark green figures bottom right, superscript cents, no decimal point.
4. Details: name and description top left in dark green serif-accented type.",
        v2_brief: "\
1. Background: light green gradient-free tint, premium grocery feel.
2. Product: fresh and appetizing, centered, naturally lit.
3. Price: dark green bold block bottom right with superscript cents.
4. Details: elegant name and description, pack size beneath the name.",
    },
    HouseStyle {
        name: "foodbasics",
        background: "#008542",
        title: "Food Basics Value",
        v1_brief: "\
1. Background: solid deep grocery green (#008542).
2. Product: supplied image unchanged, centered or slightly left, floating.
3. Price box: solid bright yellow (#FFEB3B) bottom right with the price in massive bold black type.
4. Details: white condensed bold sans-serif in the open space, clear of the price box.",
        v2_brief: "\
1. Background: solid deep grocery green (#008542).
2. Product: clear, centered or slightly left, floating on the green.
3. Price box: bright yellow (#FFEB3B) bottom right, massive bold black price, small red \"GREAT PRICE\" header.
4. Details: white condensed bold type, avoiding the price box; add the origin line when known.",
    },
];

pub fn house_style(name: &str) -> Option<&'static HouseStyle> {
    HOUSE_STYLES.iter().find(|s| s.name == name)
}

/// Background colour a built-in style applies to the page. Custom models have none.
pub fn background_for(model: &str) -> Option<&'static str> {
    house_style(model).map(|s| s.background)
}

/// Builds the full prompt sent as `custom_prompt`.
pub fn build_prompt(
    version: ServerVersion,
    model: &str,
    item: &SourceItem,
    custom_models: &[CustomModel],
) -> String {
    if let Some(custom) = custom_models.iter().find(|m| m.name == model) {
        return format!(
            "{}\n\n**MANDATORY INPUT DATA:**\n- Product: {}\n- Price: {}\n- Unit: {}\n- SKU: {}\n- Desc: {}",
            custom.prompt,
            field(item, PRODUCT_NAME),
            field(item, PRICE),
            field(item, UNIT),
            field(item, SKU),
            field(item, DESCRIPTION),
        );
    }

    let style = house_style(model)
        .or_else(|| house_style(FALLBACK_MODEL))
        .unwrap_or(&HOUSE_STYLES[0]);
    let brief = match version {
        ServerVersion::V1 => style.v1_brief,
        ServerVersion::V2 => style.v2_brief,
    };
    let unit = item.text(UNIT).unwrap_or_else(|| DEFAULT_UNIT.to_string());

    format!(
        "**Role:** Retail Graphic Design Engine\n\
         **Task:** Generate a promotional product card consistent with the \"{}\" design system.\n\n\
         **Input Data:**\n\
         - Product Name: {}\n\
         - Description: {}\n\
         - Price: {}\n\
         - SKU: {}\n\
         - Pack/Unit Size: {}\n\n\
         **Design Specifications (Strict Adherence Required):**\n{}\n",
        style.title,
        field(item, PRODUCT_NAME),
        field(item, DESCRIPTION),
        field(item, PRICE),
        field(item, SKU),
        unit,
        brief,
    )
}

fn field(item: &SourceItem, key: &str) -> String {
    item.text(key).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apples() -> SourceItem {
        [
            ("Product Name", "Gala Apples"),
            ("Price", "3.47"),
            ("Description", "Crisp and sweet"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_builtin_prompt_renders_item_and_unit_default() {
        let prompt = build_prompt(ServerVersion::V2, "metro", &apples(), &[]);
        assert!(prompt.contains("Metro Discount Flyer"));
        assert!(prompt.contains("- Product Name: Gala Apples"));
        assert!(prompt.contains("- Pack/Unit Size: 1 Unit"));
        assert!(prompt.contains("- SKU: \n"));
    }

    #[test]
    fn test_unknown_model_falls_back_to_walmart() {
        let prompt = build_prompt(ServerVersion::V1, "no-such-style", &apples(), &[]);
        assert!(prompt.contains("Blue Flyer"));
    }

    #[test]
    fn test_versions_use_different_briefs() {
        let v1 = build_prompt(ServerVersion::V1, "walmart", &apples(), &[]);
        let v2 = build_prompt(ServerVersion::V2, "walmart", &apples(), &[]);
        assert_ne!(v1, v2);
    }

    #[test]
    fn test_custom_model_appends_mandatory_block() {
        let custom = vec![CustomModel {
            name: "holiday".to_string(),
            prompt: "Festive red card.".to_string(),
        }];
        let prompt = build_prompt(ServerVersion::V2, "holiday", &apples(), &custom);
        assert!(prompt.starts_with("Festive red card.\n\n**MANDATORY INPUT DATA:**"));
        assert!(prompt.contains("- Price: 3.47"));
        assert!(prompt.contains("- Unit: \n"));
    }

    #[test]
    fn test_backgrounds() {
        assert_eq!(background_for("foodbasics"), Some("#008542"));
        assert_eq!(background_for("metro"), Some("#fecaca"));
        assert_eq!(background_for("holiday"), None);
    }
}
