use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use super::scale::scale_ingredients;
use crate::actions;
use crate::error::ServerError;
use crate::llm::{self, LlmProvider};

const OTHER_CATEGORY: &str = "Other";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub(crate) struct ShoppingListSelection {
    #[validate(range(min = 1, message = "Must be a positive recipe id"))]
    pub(crate) id: i32,
    #[validate(range(min = 1, max = 100, message = "Must be between 1 and 100"))]
    pub(crate) portions: i32,
}

/// The body of `POST /api/planner/generate`.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct PlannerRequest {
    #[validate(
        length(min = 1, max = 50, message = "Select between 1 and 50 recipes"),
        nested
    )]
    pub(crate) selections: Vec<ShoppingListSelection>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct ShoppingCategory {
    pub(crate) category: String,
    pub(crate) items: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ShoppingListResponse {
    pub(crate) shopping_list: Vec<ShoppingCategory>,
    pub(crate) total_recipes: usize,
    pub(crate) generated_at: DateTime<Utc>,
}

/// One selected recipe as the model sees it.
#[derive(Debug, Serialize)]
struct CompiledRecipe {
    title: String,
    factor: f64,
    base_portions: i32,
    requested_portions: i32,
    ingredients: Vec<String>,
    scaled_ingredients: Vec<String>,
}

async fn compile(
    db: &DatabaseConnection,
    owner_id: i32,
    selections: &[ShoppingListSelection],
) -> Result<Vec<CompiledRecipe>, ServerError> {
    let mut compiled = Vec::with_capacity(selections.len());
    let mut missing = Vec::new();

    for selection in selections {
        let Some(recipe) = actions::recipe::find_owned(db, owner_id, selection.id).await? else {
            missing.push(selection.id);
            continue;
        };
        let base_portions = recipe.base_portions.max(1);
        let ratio = f64::from(selection.portions) / f64::from(base_portions);
        compiled.push(CompiledRecipe {
            title: recipe.title,
            factor: (ratio * 100.0).round() / 100.0,
            base_portions,
            requested_portions: selection.portions,
            scaled_ingredients: scale_ingredients(recipe.ingredients.lines(), ratio),
            ingredients: recipe.ingredients.0,
        });
    }

    if !missing.is_empty() {
        return Err(ServerError::not_found(format!(
            "Recipes not found: {:?}",
            missing
        )));
    }
    Ok(compiled)
}

fn shopping_list_prompt(compiled: &[CompiledRecipe]) -> Result<String, ServerError> {
    let data = serde_json::to_string_pretty(compiled).map_err(anyhow::Error::from)?;
    Ok(format!(
        r#"You are the kitchen logistics expert of KitchenOS. Consolidate the ingredients of several recipes into one clear shopping list.

INPUT:
{data}

Each recipe lists its original ingredients, the factor between the requested and the base portions, and the ingredients already scaled by that factor. Use the scaled quantities.

RULES:
1. Drop any product whose scaled quantity is zero or close to zero, or that is marked optional. Never list a product with quantity "0".
2. Round products counted in pieces (onions, garlic, eggs, whole vegetables) UP to a whole number. Example: 0.2 onion -> 1 onion, 1.1 leeks -> 2 leeks.
3. Sum identical ingredients across recipes. Format each item as "Product name (quantity unit)". Use readable fractions (1/2, 1/4) for cups and spoons, whole numbers for pieces.
4. Assign every product to one of these categories: Fruit and vegetables, Meat and fish, Dairy and eggs, Bread and pasta, Oils and fats, Spices and condiments, Dry goods, Other.

RETURN ONLY PLAIN JSON:
{{
  "shopping_list": [
    {{"category": "Fruit and vegetables", "items": ["Onion (2 pieces)", "Garlic (1 head)"]}}
  ]
}}"#
    ))
}

/// Read the model's categories, skipping malformed entries and empty categories.
fn parse_shopping_list(answer: &Value) -> Vec<ShoppingCategory> {
    let Some(categories) = answer.get("shopping_list").and_then(Value::as_array) else {
        return Vec::new();
    };

    categories
        .iter()
        .filter_map(|entry| {
            let items: Vec<String> = entry
                .get("items")?
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect();
            if items.is_empty() {
                return None;
            }
            let category = entry
                .get("category")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|category| !category.is_empty())
                .unwrap_or(OTHER_CATEGORY)
                .to_string();
            Some(ShoppingCategory { category, items })
        })
        .collect()
}

/// Build a consolidated shopping list for the selected recipes.
///
/// Unknown ids are reported before the AI configuration is checked.
pub(crate) async fn generate(
    db: &DatabaseConnection,
    provider: Option<&dyn LlmProvider>,
    owner_id: i32,
    request: &PlannerRequest,
) -> Result<ShoppingListResponse, ServerError> {
    let compiled = compile(db, owner_id, &request.selections).await?;
    if compiled.is_empty() {
        return Err(ServerError::bad_request("Nothing to build a shopping list from"));
    }
    let provider = provider.ok_or_else(ServerError::ai_unavailable)?;

    tracing::info!(
        "Generating shopping list for {} recipes with {}/{}",
        compiled.len(),
        provider.provider_name(),
        provider.model_name()
    );
    let prompt = shopping_list_prompt(&compiled)?;
    let answer = llm::complete_to_value(provider, &prompt).await?;
    let shopping_list = parse_shopping_list(&answer);
    tracing::info!("Generated shopping list with {} categories", shopping_list.len());

    Ok(ShoppingListResponse {
        shopping_list,
        total_recipes: compiled.len(),
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::recipe::tests::content;
    use crate::actions::user::tests::active_user;
    use crate::db::test_db;
    use crate::llm::FakeProvider;
    use serde_json::json;

    const ANSWER: &str = r#"{"shopping_list": [
        {"category": "Dry goods", "items": ["Pasta (400 g)", " "]},
        {"category": "Dairy and eggs", "items": []},
        {"items": ["Tomatoes (6 pieces)"]}
    ]}"#;

    #[test]
    fn empty_and_malformed_categories_are_dropped() {
        let answer: Value = serde_json::from_str(ANSWER).unwrap();
        assert_eq!(
            parse_shopping_list(&answer),
            vec![
                ShoppingCategory {
                    category: "Dry goods".to_string(),
                    items: vec!["Pasta (400 g)".to_string()]
                },
                ShoppingCategory {
                    category: OTHER_CATEGORY.to_string(),
                    items: vec!["Tomatoes (6 pieces)".to_string()]
                },
            ]
        );
        assert!(parse_shopping_list(&json!({"list": []})).is_empty());
    }

    #[test]
    fn selections_are_validated() {
        let request: PlannerRequest =
            serde_json::from_value(json!({"selections": [{"id": 0, "portions": 101}]})).unwrap();
        assert!(request.validate().is_err());
        let request: PlannerRequest = serde_json::from_value(json!({"selections": []})).unwrap();
        assert!(request.validate().is_err());
    }

    #[tokio::test]
    async fn quantities_scale_with_the_portion_ratio() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let pasta = actions::recipe::create_custom(
            &db,
            user.id,
            content("Pasta", 2, &["200 g pasta", "3 tomatoes", "salt"]),
        )
        .await
        .unwrap();
        let provider = FakeProvider::new().with_default_response(ANSWER);

        let request = PlannerRequest {
            selections: vec![ShoppingListSelection {
                id: pasta.id,
                portions: 4,
            }],
        };
        let response = generate(&db, Some(&provider), user.id, &request)
            .await
            .unwrap();
        assert_eq!(response.total_recipes, 1);
        assert_eq!(response.shopping_list.len(), 2);

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];
        assert!(prompt.contains(r#""factor": 2.0"#));
        assert!(prompt.contains(r#""400 g pasta""#));
        assert!(prompt.contains(r#""6 tomatoes""#));
        assert!(prompt.contains(r#""200 g pasta""#));

        let halved = compile(
            &db,
            user.id,
            &[ShoppingListSelection {
                id: pasta.id,
                portions: 1,
            }],
        )
        .await
        .unwrap();
        assert_eq!(halved[0].factor, 0.5);
        assert_eq!(
            halved[0].scaled_ingredients,
            vec!["100 g pasta", "1.5 tomatoes", "salt"]
        );
    }

    #[tokio::test]
    async fn unknown_recipes_are_listed_before_ai_is_required() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let request = PlannerRequest {
            selections: vec![
                ShoppingListSelection { id: 41, portions: 2 },
                ShoppingListSelection { id: 42, portions: 2 },
            ],
        };

        let err = generate(&db, None, user.id, &request).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Recipes not found: [41, 42]");
    }

    #[tokio::test]
    async fn missing_provider_is_unavailable() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let soup = actions::recipe::create_custom(&db, user.id, content("Soup", 2, &["water"]))
            .await
            .unwrap();
        let request = PlannerRequest {
            selections: vec![ShoppingListSelection {
                id: soup.id,
                portions: 2,
            }],
        };

        let err = generate(&db, None, user.id, &request).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn invalid_ai_json_is_a_server_error() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let soup = actions::recipe::create_custom(&db, user.id, content("Soup", 2, &["water"]))
            .await
            .unwrap();
        let provider = FakeProvider::new().with_default_response("not json");
        let request = PlannerRequest {
            selections: vec![ShoppingListSelection {
                id: soup.id,
                portions: 2,
            }],
        };

        let err = generate(&db, Some(&provider), user.id, &request)
            .await
            .unwrap_err();
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
