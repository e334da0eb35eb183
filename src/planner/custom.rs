//! Turning pasted recipe text into a stored recipe with the help of the model.

use serde::Deserialize;
use serde_json::Value;

use crate::actions::recipe::RecipeContent;
use crate::constants::CUSTOM_RECIPE_ICON;
use crate::error::ServerError;
use crate::llm::{self, LlmProvider};
use crate::scraping::extract_portion_count;

const DEFAULT_TITLE: &str = "Custom recipe";

/// The body of `POST /api/recipes/custom`.
#[derive(Debug, Deserialize)]
pub(crate) struct CustomRecipeText {
    #[serde(default)]
    pub(crate) content: Option<String>,
}

fn custom_recipe_prompt(content: &str) -> String {
    format!(
        r#"Analyse the recipe text below. Extract its data and return it as JSON.

Rules:
1. If there is no title, make one up, e.g. "Home recipe".
2. Ingredients: return a list of strings. Remove numbering from ingredient lines.
3. Portions: if not given, assume 1.

INPUT TEXT:
{content}

RETURN (JSON only):
{{
  "title": "Title",
  "portions": 1,
  "ingredients": ["Ingredient 1", "Ingredient 2"],
  "instructions": "Step by step instructions..."
}}"#
    )
}

fn text_field(answer: &Value, key: &str) -> Option<String> {
    let text = match answer.get(key)? {
        Value::String(text) => text.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn portions_field(answer: &Value) -> i32 {
    match answer.get("portions") {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|portions| portions.round() as i64))
            .and_then(|portions| i32::try_from(portions).ok())
            .filter(|portions| *portions > 0)
            .unwrap_or(1),
        Some(Value::String(text)) => extract_portion_count(text),
        _ => 1,
    }
}

fn ingredients_field(answer: &Value) -> Vec<String> {
    match answer.get("ingredients") {
        Some(Value::Array(lines)) => lines
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(text)) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Read the model's answer leniently: every field has a fallback.
fn recipe_from_answer(answer: &Value) -> RecipeContent {
    RecipeContent {
        title: text_field(answer, "title").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        ingredients: ingredients_field(answer),
        instructions: text_field(answer, "instructions"),
        image_url: Some(CUSTOM_RECIPE_ICON.to_string()),
        base_portions: portions_field(answer),
    }
}

/// Ask the model to structure pasted recipe text.
pub(crate) async fn parse_recipe_text(
    provider: Option<&dyn LlmProvider>,
    input: &CustomRecipeText,
) -> Result<RecipeContent, ServerError> {
    let content = input.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(ServerError::bad_request("Recipe text cannot be empty"));
    }
    let provider = provider.ok_or_else(ServerError::ai_unavailable)?;

    tracing::info!("Parsing custom recipe from {} characters of text", content.len());
    let answer = llm::complete_to_value(provider, &custom_recipe_prompt(content))
        .await
        .map_err(|e| {
            tracing::error!("Error parsing custom recipe: {}", e);
            ServerError::Internal(
                "The AI could not make sense of the text. Try the format 'Title\\nIngredients...\\nInstructions...'"
                    .to_string(),
            )
        })?;
    Ok(recipe_from_answer(&answer))
}
