//! Prompt and response template for routine analysis calls.

use crate::routine::{Product, RoutineSnapshot};

/// JSON template for the analysis response, every field present and empty.
/// Matches the RoutineAnalysis type.
pub fn analysis_response_template() -> serde_json::Value {
    serde_json::json!({
        "summary": "",
        "routineAnalysis": {
            "day_products": {
                "products": [],
                "recommendations": []
            },
            "night_products": {
                "products": [],
                "recommendations": []
            }
        },
        "skinProfile": {
            "skinTypeAnalysis": {},
            "concernsAnalysis": {},
            "climateConsiderations": []
        },
        "recommendations": {
            "general": [],
            "productInteractions": [],
            "missingProducts": [],
            "orderSuggestions": []
        },
        "scientificSources": [
            {
                "citation": "",
                "keyFindings": "",
                "doi": "",
                "link": ""
            }
        ]
    })
}

/// Render one product line for the prompt.
///
/// Format: `<brand> <name> (<type>, ingredients: <a, b> | none listed)`
pub fn format_product(product: &Product) -> String {
    let ingredients = if product.ingredients.is_empty() {
        "none listed".to_string()
    } else {
        product.ingredients.join(", ")
    };
    format!(
        "{} {} ({}, ingredients: {})",
        product.brand, product.name, product.product_type, ingredients
    )
}

fn format_products(products: &[Product], empty_label: &str) -> String {
    if products.is_empty() {
        return empty_label.to_string();
    }
    products
        .iter()
        .map(format_product)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_labels(labels: &[String], empty_label: &str) -> String {
    if labels.is_empty() {
        empty_label.to_string()
    } else {
        labels.join(", ")
    }
}

/// Build the routine analysis prompt.
///
/// Deterministic: no timestamps or randomness, so identical snapshots
/// produce identical prompts.
pub fn build_routine_analysis_prompt(snapshot: &RoutineSnapshot) -> String {
    // to_string_pretty only fails for non-string map keys; the template has none
    let template = serde_json::to_string_pretty(&analysis_response_template()).unwrap_or_default();

    format!(
        r#"You are a skincare expert reviewing a user's skincare routine.

IMPORTANT: Respond with raw JSON only. Do not wrap the response in markdown code fences and do not add any text before or after the JSON. The response must start with {{ and end with }}.

The response must follow exactly this structure (all fields required, scientificSources optional):
{template}

Morning routine (in order):
{day}

Evening routine (in order):
{night}

Skin type: {skin_type}
Skin concerns: {concerns}
Climate: {climate}

Analyze the routine and address each of the following:
1. Ingredient and product combination conflicts (for example retinoids with AHAs/BHAs, vitamin C with niacinamide), listed in recommendations.productInteractions.
2. Product order: check that products are applied from thinnest to thickest and by molecular weight and pH, listed in recommendations.orderSuggestions.
3. Missing products for the stated skin type and concerns, listed in recommendations.missingProducts.
4. Climate-specific tips for the stated climate, listed in skinProfile.climateConsiderations.
5. Cite peer-reviewed sources supporting your recommendations in scientificSources, with DOI or link where available.

Use skinProfile.skinTypeAnalysis and skinProfile.concernsAnalysis as objects keyed by each stated skin type and concern. Use empty arrays or objects where nothing applies."#,
        template = template,
        day = format_products(&snapshot.day_products, "No morning products"),
        night = format_products(&snapshot.night_products, "No evening products"),
        skin_type = format_labels(&snapshot.skin_type, "Not specified"),
        concerns = format_labels(&snapshot.skin_concerns, "None specified"),
        climate = format_labels(&snapshot.climate, "None specified"),
    )
}
