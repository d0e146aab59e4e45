use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_TITLE_LEN: usize = 80;

/// One line of a recipe: how many parts of which ingredient, and the colour
/// it is drawn with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub color: String,
    pub parts: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipe(pub Vec<Ingredient>);

impl Recipe {
    /// JSON text as persisted in the `recipe` column.
    pub fn to_stored(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }

    pub fn from_stored(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw).map(Recipe)
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.0
    }

    pub fn short(&self) -> Vec<ShortIngredient> {
        self.0
            .iter()
            .map(|ingredient| ShortIngredient {
                name: ingredient.name.clone(),
            })
            .collect()
    }
}

/// Clients may send a single ingredient object instead of an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecipeInput {
    Many(Vec<Ingredient>),
    One(Ingredient),
}

impl From<RecipeInput> for Recipe {
    fn from(value: RecipeInput) -> Self {
        match value {
            RecipeInput::Many(items) => Recipe(items),
            RecipeInput::One(item) => Recipe(vec![item]),
        }
    }
}

/// A persisted drink. Serializes as the long form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drink {
    pub id: i64,
    pub title: String,
    pub recipe: Recipe,
}

impl Drink {
    pub fn short(&self) -> ShortDrink {
        ShortDrink {
            id: self.id,
            title: self.title.clone(),
            recipe: self.recipe.short(),
        }
    }
}

/// Public projection: ingredient names only, no colour or parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortDrink {
    pub id: i64,
    pub title: String,
    pub recipe: Vec<ShortIngredient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortIngredient {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDrink {
    pub title: String,
    pub recipe: Recipe,
}

/// The drink seeded into an empty menu on reset.
pub fn default_drink() -> NewDrink {
    NewDrink {
        title: "water".to_string(),
        recipe: Recipe(vec![Ingredient {
            name: "water".to_string(),
            color: "blue".to_string(),
            parts: 1,
        }]),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrinkValidationError {
    #[error("title is required")]
    MissingTitle,
    #[error("recipe is required")]
    MissingRecipe,
    #[error("title must not be blank")]
    BlankTitle,
    #[error("title must be at most 80 characters")]
    TitleTooLong,
}

/// Field changes for an existing drink; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrinkChanges {
    pub title: Option<String>,
    pub recipe: Option<Recipe>,
}

/// Body of POST and PATCH requests. Absent and `null` fields are both `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrinkPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub recipe: Option<RecipeInput>,
}

impl DrinkPayload {
    pub fn into_new_drink(self) -> Result<NewDrink, DrinkValidationError> {
        let title = self.title.ok_or(DrinkValidationError::MissingTitle)?;
        let recipe = self.recipe.ok_or(DrinkValidationError::MissingRecipe)?;
        Ok(NewDrink {
            title: validate_title(title)?,
            recipe: recipe.into(),
        })
    }

    pub fn into_changes(self) -> Result<DrinkChanges, DrinkValidationError> {
        Ok(DrinkChanges {
            title: self.title.map(validate_title).transpose()?,
            recipe: self.recipe.map(Recipe::from),
        })
    }
}

fn validate_title(title: String) -> Result<String, DrinkValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DrinkValidationError::BlankTitle);
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(DrinkValidationError::TitleTooLong);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn espresso() -> Drink {
        Drink {
            id: 7,
            title: "Espresso".to_string(),
            recipe: Recipe(vec![
                Ingredient { name: "coffee".into(), color: "brown".into(), parts: 2 },
                Ingredient { name: "water".into(), color: "blue".into(), parts: 1 },
            ]),
        }
    }

    #[test]
    fn stored_recipe_round_trips() {
        let recipe = espresso().recipe;
        let stored = recipe.to_stored().expect("encode");
        assert_eq!(Recipe::from_stored(&stored).expect("decode"), recipe);
    }

    #[test]
    fn stored_recipe_must_be_an_array_of_ingredients() {
        assert!(Recipe::from_stored("{\"name\":\"water\"}").is_err());
        assert!(Recipe::from_stored("null").is_err());
        assert_eq!(Recipe::from_stored("[]").expect("empty"), Recipe::default());
    }

    #[test]
    fn short_form_hides_color_and_parts() {
        let value = serde_json::to_value(espresso().short()).expect("serialize");
        assert_eq!(
            value,
            json!({
                "id": 7,
                "title": "Espresso",
                "recipe": [{ "name": "coffee" }, { "name": "water" }]
            })
        );
    }

    #[test]
    fn long_form_keeps_full_recipe() {
        let value = serde_json::to_value(espresso()).expect("serialize");
        assert_eq!(value["recipe"][0], json!({ "name": "coffee", "color": "brown", "parts": 2 }));
    }

    #[test]
    fn payload_accepts_single_ingredient_object() {
        let payload: DrinkPayload = serde_json::from_value(json!({
            "title": "Water",
            "recipe": { "name": "water", "color": "blue", "parts": 1 }
        }))
        .expect("payload");
        let drink = payload.into_new_drink().expect("valid");
        assert_eq!(drink.recipe.ingredients().len(), 1);
    }

    #[test]
    fn payload_requires_both_fields_on_create() {
        let title_only = DrinkPayload { title: Some("Tea".into()), recipe: None };
        assert_eq!(title_only.into_new_drink(), Err(DrinkValidationError::MissingRecipe));

        let empty = DrinkPayload::default();
        assert_eq!(empty.into_new_drink(), Err(DrinkValidationError::MissingTitle));
    }

    #[test]
    fn null_fields_count_as_absent() {
        let payload: DrinkPayload =
            serde_json::from_value(json!({ "title": null, "recipe": null })).expect("payload");
        assert_eq!(payload.into_changes(), Ok(DrinkChanges::default()));
    }

    #[test]
    fn changes_carry_only_present_fields() {
        let changes = DrinkPayload { title: Some("  Doppio ".into()), recipe: None }
            .into_changes()
            .expect("valid");
        assert_eq!(changes.title.as_deref(), Some("Doppio"));
        assert_eq!(changes.recipe, None);

        let changes = DrinkPayload {
            title: None,
            recipe: Some(RecipeInput::One(espresso().recipe.0[0].clone())),
        }
        .into_changes()
        .expect("valid");
        assert_eq!(changes.title, None);
        assert_eq!(changes.recipe.map(|r| r.0.len()), Some(1));
    }

    #[test]
    fn titles_are_validated() {
        let blank = DrinkPayload { title: Some("   ".into()), recipe: None };
        assert_eq!(blank.into_changes(), Err(DrinkValidationError::BlankTitle));

        let long = DrinkPayload { title: Some("x".repeat(MAX_TITLE_LEN + 1)), recipe: None };
        assert_eq!(long.into_changes(), Err(DrinkValidationError::TitleTooLong));

        let exact = DrinkPayload { title: Some("x".repeat(MAX_TITLE_LEN)), recipe: None };
        assert!(exact.into_changes().is_ok());
    }
}
