use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

/// Whatever could be recovered from a recipe page. Missing pieces stay empty;
/// deciding what is mandatory is up to the caller.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ScrapedRecipe {
    pub(crate) title: Option<String>,
    pub(crate) ingredients: Vec<String>,
    pub(crate) instructions: Option<String>,
    pub(crate) yields: Option<String>,
    pub(crate) image: Option<String>,
}

impl ScrapedRecipe {
    /// Fill anything still missing from a lower-priority source.
    fn fill_from(mut self, fallback: ScrapedRecipe) -> Self {
        if self.title.is_none() {
            self.title = fallback.title;
        }
        if self.ingredients.is_empty() {
            self.ingredients = fallback.ingredients;
        }
        if self.instructions.is_none() {
            self.instructions = fallback.instructions;
        }
        if self.yields.is_none() {
            self.yields = fallback.yields;
        }
        if self.image.is_none() {
            self.image = fallback.image;
        }
        self
    }
}

/// Extract a recipe from a page, preferring schema.org JSON-LD, then microdata,
/// then generic page metadata (`og:` tags, the first heading).
pub(crate) fn extract_recipe(html: &str) -> ScrapedRecipe {
    let document = Html::parse_document(html);

    let from_jsonld = find_jsonld_recipe(&document)
        .map(|recipe| recipe_from_jsonld(&recipe))
        .unwrap_or_default();

    from_jsonld
        .fill_from(recipe_from_microdata(&document))
        .fill_from(recipe_from_meta(&document))
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

fn find_jsonld_recipe(document: &Html) -> Option<Value> {
    let scripts = selector(r#"script[type="application/ld+json"]"#);
    document.select(&scripts).find_map(|script| {
        let raw = script.text().collect::<String>();
        let json: Value = match serde_json::from_str(raw.trim()) {
            Ok(json) => json,
            Err(e) => {
                tracing::debug!("Skipping unparseable JSON-LD block: {}", e);
                return None;
            }
        };
        find_recipe_node(&json).cloned()
    })
}

/// Recursively search for a node typed `Recipe`, through `@graph` and nested arrays.
fn find_recipe_node(json: &Value) -> Option<&Value> {
    match json {
        Value::Object(obj) => {
            let is_recipe = match obj.get("@type") {
                Some(Value::String(kind)) => kind == "Recipe",
                Some(Value::Array(kinds)) => kinds.iter().any(|kind| kind == "Recipe"),
                _ => false,
            };
            if is_recipe {
                return Some(json);
            }
            obj.values().find_map(find_recipe_node)
        }
        Value::Array(items) => items.iter().find_map(find_recipe_node),
        _ => None,
    }
}

fn recipe_from_jsonld(recipe: &Value) -> ScrapedRecipe {
    let ingredients = recipe
        .get("recipeIngredient")
        .or_else(|| recipe.get("ingredients"))
        .map(string_list)
        .unwrap_or_default();

    ScrapedRecipe {
        title: recipe
            .get("name")
            .and_then(Value::as_str)
            .map(clean_text)
            .and_then(non_empty),
        ingredients,
        instructions: recipe.get("recipeInstructions").and_then(instructions_text),
        yields: recipe.get("recipeYield").and_then(yield_text),
        image: recipe.get("image").and_then(image_url),
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(line) => non_empty(clean_text(line)).into_iter().collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(clean_text)
            .filter(|line| !line.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Flatten the many shapes of `recipeInstructions` (plain text, a list of strings,
/// `HowToStep` objects, `HowToSection`s of steps) into one step per line.
fn instructions_text(value: &Value) -> Option<String> {
    fn collect_steps(value: &Value, steps: &mut Vec<String>) {
        match value {
            Value::String(text) => {
                let text = clean_text(text);
                if !text.is_empty() {
                    steps.push(text);
                }
            }
            Value::Array(items) => items.iter().for_each(|item| collect_steps(item, steps)),
            Value::Object(obj) => {
                if let Some(items) = obj.get("itemListElement") {
                    collect_steps(items, steps);
                } else if let Some(text) = obj.get("text").or_else(|| obj.get("name")) {
                    collect_steps(text, steps);
                }
            }
            _ => {}
        }
    }

    let mut steps = Vec::new();
    collect_steps(value, &mut steps);
    non_empty(steps.join("\n"))
}

fn yield_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_empty(clean_text(text)),
        Value::Number(number) => Some(number.to_string()),
        // sites often list `["4", "4 servings"]`; the most descriptive entry parses best
        Value::Array(items) => items
            .iter()
            .filter_map(yield_text)
            .max_by_key(|text| text.len()),
        _ => None,
    }
}

fn image_url(value: &Value) -> Option<String> {
    match value {
        Value::String(url) => non_empty(url.trim().to_string()),
        Value::Array(items) => items.iter().find_map(image_url),
        Value::Object(obj) => obj.get("url").and_then(image_url),
        _ => None,
    }
}

fn recipe_from_microdata(document: &Html) -> ScrapedRecipe {
    let ingredients: Vec<String> = document
        .select(&selector(
            r#"[itemprop="recipeIngredient"], [itemprop="ingredients"]"#,
        ))
        .map(element_text)
        .filter(|line| !line.is_empty())
        .collect();

    let steps: Vec<String> = document
        .select(&selector(r#"[itemprop="recipeInstructions"]"#))
        .map(element_text)
        .filter(|line| !line.is_empty())
        .collect();

    let yields = document
        .select(&selector(r#"[itemprop="recipeYield"]"#))
        .next()
        .and_then(|element| {
            element
                .value()
                .attr("content")
                .map(clean_text)
                .or_else(|| Some(element_text(element)))
        })
        .and_then(non_empty);

    let title = document
        .select(&selector(r#"[itemtype*="schema.org/Recipe"] [itemprop="name"]"#))
        .next()
        .map(element_text)
        .and_then(non_empty);

    ScrapedRecipe {
        title,
        ingredients,
        instructions: non_empty(steps.join("\n")),
        yields,
        image: None,
    }
}

fn recipe_from_meta(document: &Html) -> ScrapedRecipe {
    let meta_content = |property: &str| {
        document
            .select(&selector(&format!(r#"meta[property="{}"]"#, property)))
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .map(clean_text)
            .and_then(non_empty)
    };

    let title = meta_content("og:title").or_else(|| {
        document
            .select(&selector("h1"))
            .next()
            .map(element_text)
            .and_then(non_empty)
    });

    ScrapedRecipe {
        title,
        image: meta_content("og:image"),
        ..ScrapedRecipe::default()
    }
}
