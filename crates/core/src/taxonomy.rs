use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Income")]
    Income,
    #[serde(rename = "Bills")]
    Bills,
    #[serde(rename = "Essentials")]
    Essentials,
    #[serde(rename = "Dining")]
    Dining,
    #[serde(rename = "Shopping")]
    Shopping,
    #[serde(rename = "Household")]
    Household,
    #[serde(rename = "Personal Care & Health")]
    PersonalCare,
    #[serde(rename = "Leisure")]
    Leisure,
    #[serde(rename = "Hobbies")]
    Hobbies,
    #[serde(rename = "Travel")]
    Travel,
    #[serde(rename = "Financial")]
    Financial,
    /// Marker for rows whose raw label had no mapping.
    #[serde(rename = "Uncategorized")]
    Uncategorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Subcategory {
    #[serde(rename = "Salary")]
    Salary,
    #[serde(rename = "Side")]
    Side,
    #[serde(rename = "TWINT")]
    Twint,
    #[serde(rename = "Rent")]
    Rent,
    #[serde(rename = "Utilities")]
    Utilities,
    #[serde(rename = "Insurance")]
    Insurance,
    #[serde(rename = "Telecom")]
    Telecom,
    #[serde(rename = "Taxes")]
    Taxes,
    #[serde(rename = "Fees")]
    Fees,
    #[serde(rename = "Subscriptions")]
    Subscriptions,
    #[serde(rename = "Transit")]
    Transit,
    #[serde(rename = "Groceries")]
    Groceries,
    #[serde(rename = "Work")]
    Work,
    #[serde(rename = "Date")]
    Date,
    #[serde(rename = "Delivery")]
    Delivery,
    #[serde(rename = "Social")]
    Social,
    #[serde(rename = "Clothing")]
    Clothing,
    #[serde(rename = "Electronics")]
    Electronics,
    #[serde(rename = "Media")]
    Media,
    #[serde(rename = "Gifts")]
    Gifts,
    #[serde(rename = "Furniture")]
    Furniture,
    #[serde(rename = "Appliances")]
    Appliances,
    #[serde(rename = "Decor & Furnishings")]
    Decor,
    #[serde(rename = "Cleaning")]
    Cleaning,
    #[serde(rename = "Medical")]
    Medical,
    #[serde(rename = "Personal Care")]
    PersonalCare,
    #[serde(rename = "Events")]
    Events,
    #[serde(rename = "Activities")]
    Activities,
    #[serde(rename = "Bouldern")]
    Bouldern,
    #[serde(rename = "Salsa")]
    Salsa,
    #[serde(rename = "Tech")]
    Tech,
    #[serde(rename = "Transport")]
    Transport,
    #[serde(rename = "Accommodation")]
    Accommodation,
    #[serde(rename = "Food & Activities")]
    FoodActivities,
    #[serde(rename = "Investments")]
    Investments,
    #[serde(rename = "Savings")]
    Savings,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxonomyError {
    #[error("Unknown category: '{0}'")]
    UnknownCategory(String),
    #[error("Unknown subcategory: '{0}'")]
    UnknownSubcategory(String),
    #[error("Subcategory '{subcategory}' is not allowed for category '{category}'")]
    InvalidSubcategoryForCategory {
        category: Category,
        subcategory: Subcategory,
    },
}

/// Category → allowed subcategories. A subcategory may be shared between
/// categories; TWINT transfers show up both as income and as dining splits.
pub const TAXONOMY: &[(Category, &[Subcategory])] = &[
    (
        Category::Income,
        &[Subcategory::Salary, Subcategory::Side, Subcategory::Twint],
    ),
    (
        Category::Bills,
        &[
            Subcategory::Rent,
            Subcategory::Utilities,
            Subcategory::Insurance,
            Subcategory::Telecom,
            Subcategory::Taxes,
            Subcategory::Fees,
            Subcategory::Subscriptions,
        ],
    ),
    (
        Category::Essentials,
        &[Subcategory::Transit, Subcategory::Groceries],
    ),
    (
        Category::Dining,
        &[
            Subcategory::Work,
            Subcategory::Date,
            Subcategory::Delivery,
            Subcategory::Social,
            Subcategory::Twint,
        ],
    ),
    (
        Category::Shopping,
        &[
            Subcategory::Clothing,
            Subcategory::Electronics,
            Subcategory::Media,
            Subcategory::Gifts,
        ],
    ),
    (
        Category::Household,
        &[
            Subcategory::Furniture,
            Subcategory::Appliances,
            Subcategory::Decor,
            Subcategory::Cleaning,
        ],
    ),
    (
        Category::PersonalCare,
        &[Subcategory::Medical, Subcategory::PersonalCare],
    ),
    (
        Category::Leisure,
        &[Subcategory::Events, Subcategory::Activities],
    ),
    (
        Category::Hobbies,
        &[Subcategory::Bouldern, Subcategory::Salsa, Subcategory::Tech],
    ),
    (
        Category::Travel,
        &[
            Subcategory::Transport,
            Subcategory::Accommodation,
            Subcategory::FoodActivities,
        ],
    ),
    (
        Category::Financial,
        &[Subcategory::Investments, Subcategory::Savings],
    ),
    (Category::Uncategorized, &[]),
];

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Income,
        Category::Bills,
        Category::Essentials,
        Category::Dining,
        Category::Shopping,
        Category::Household,
        Category::PersonalCare,
        Category::Leisure,
        Category::Hobbies,
        Category::Travel,
        Category::Financial,
        Category::Uncategorized,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Income => "Income",
            Category::Bills => "Bills",
            Category::Essentials => "Essentials",
            Category::Dining => "Dining",
            Category::Shopping => "Shopping",
            Category::Household => "Household",
            Category::PersonalCare => "Personal Care & Health",
            Category::Leisure => "Leisure",
            Category::Hobbies => "Hobbies",
            Category::Travel => "Travel",
            Category::Financial => "Financial",
            Category::Uncategorized => "Uncategorized",
        }
    }

    pub fn allowed_subcategories(self) -> &'static [Subcategory] {
        TAXONOMY
            .iter()
            .find(|(category, _)| *category == self)
            .map(|(_, subs)| *subs)
            .unwrap_or(&[])
    }

    pub fn is_allowed(self, subcategory: Subcategory) -> bool {
        self.allowed_subcategories().contains(&subcategory)
    }

    /// Resolves a display name. Exact match wins; otherwise ASCII case is ignored.
    pub fn from_name(name: &str) -> Result<Self, TaxonomyError> {
        let name = name.trim();
        Self::ALL
            .iter()
            .find(|c| c.name() == name)
            .or_else(|| Self::ALL.iter().find(|c| c.name().eq_ignore_ascii_case(name)))
            .copied()
            .ok_or_else(|| TaxonomyError::UnknownCategory(name.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Category {
    type Err = TaxonomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_name(s)
    }
}

impl Subcategory {
    pub const ALL: [Subcategory; 36] = [
        Subcategory::Salary,
        Subcategory::Side,
        Subcategory::Twint,
        Subcategory::Rent,
        Subcategory::Utilities,
        Subcategory::Insurance,
        Subcategory::Telecom,
        Subcategory::Taxes,
        Subcategory::Fees,
        Subcategory::Subscriptions,
        Subcategory::Transit,
        Subcategory::Groceries,
        Subcategory::Work,
        Subcategory::Date,
        Subcategory::Delivery,
        Subcategory::Social,
        Subcategory::Clothing,
        Subcategory::Electronics,
        Subcategory::Media,
        Subcategory::Gifts,
        Subcategory::Furniture,
        Subcategory::Appliances,
        Subcategory::Decor,
        Subcategory::Cleaning,
        Subcategory::Medical,
        Subcategory::PersonalCare,
        Subcategory::Events,
        Subcategory::Activities,
        Subcategory::Bouldern,
        Subcategory::Salsa,
        Subcategory::Tech,
        Subcategory::Transport,
        Subcategory::Accommodation,
        Subcategory::FoodActivities,
        Subcategory::Investments,
        Subcategory::Savings,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Subcategory::Salary => "Salary",
            Subcategory::Side => "Side",
            Subcategory::Twint => "TWINT",
            Subcategory::Rent => "Rent",
            Subcategory::Utilities => "Utilities",
            Subcategory::Insurance => "Insurance",
            Subcategory::Telecom => "Telecom",
            Subcategory::Taxes => "Taxes",
            Subcategory::Fees => "Fees",
            Subcategory::Subscriptions => "Subscriptions",
            Subcategory::Transit => "Transit",
            Subcategory::Groceries => "Groceries",
            Subcategory::Work => "Work",
            Subcategory::Date => "Date",
            Subcategory::Delivery => "Delivery",
            Subcategory::Social => "Social",
            Subcategory::Clothing => "Clothing",
            Subcategory::Electronics => "Electronics",
            Subcategory::Media => "Media",
            Subcategory::Gifts => "Gifts",
            Subcategory::Furniture => "Furniture",
            Subcategory::Appliances => "Appliances",
            Subcategory::Decor => "Decor & Furnishings",
            Subcategory::Cleaning => "Cleaning",
            Subcategory::Medical => "Medical",
            Subcategory::PersonalCare => "Personal Care",
            Subcategory::Events => "Events",
            Subcategory::Activities => "Activities",
            Subcategory::Bouldern => "Bouldern",
            Subcategory::Salsa => "Salsa",
            Subcategory::Tech => "Tech",
            Subcategory::Transport => "Transport",
            Subcategory::Accommodation => "Accommodation",
            Subcategory::FoodActivities => "Food & Activities",
            Subcategory::Investments => "Investments",
            Subcategory::Savings => "Savings",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, TaxonomyError> {
        let name = name.trim();
        Self::ALL
            .iter()
            .find(|s| s.name() == name)
            .or_else(|| Self::ALL.iter().find(|s| s.name().eq_ignore_ascii_case(name)))
            .copied()
            .ok_or_else(|| TaxonomyError::UnknownSubcategory(name.to_string()))
    }
}

impl fmt::Display for Subcategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Subcategory {
    type Err = TaxonomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subcategory::from_name(s)
    }
}

/// Untyped entry point for names coming from bulk data (config files, CSV).
pub fn allowed_subcategories_for(category: &str) -> Result<&'static [Subcategory], TaxonomyError> {
    Category::from_name(category).map(Category::allowed_subcategories)
}

/// Checks a (category, subcategory) pair against the taxonomy table.
pub fn validate_pair(
    category: Category,
    subcategory: Option<Subcategory>,
) -> Result<(), TaxonomyError> {
    match subcategory {
        Some(sub) if !category.is_allowed(sub) => Err(TaxonomyError::InvalidSubcategoryForCategory {
            category,
            subcategory: sub,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_a_table_row() {
        for category in Category::ALL {
            assert!(
                TAXONOMY.iter().any(|(c, _)| *c == category),
                "missing row for {category}"
            );
        }
        assert_eq!(TAXONOMY.len(), Category::ALL.len());
    }

    #[test]
    fn every_subcategory_belongs_somewhere() {
        for sub in Subcategory::ALL {
            assert!(
                Category::ALL.iter().any(|c| c.is_allowed(sub)),
                "{sub} is unreachable"
            );
        }
    }

    #[test]
    fn uncategorized_has_no_subcategories() {
        assert!(Category::Uncategorized.allowed_subcategories().is_empty());
    }

    #[test]
    fn twint_is_shared_by_income_and_dining() {
        assert!(Category::Income.is_allowed(Subcategory::Twint));
        assert!(Category::Dining.is_allowed(Subcategory::Twint));
        assert!(!Category::Bills.is_allowed(Subcategory::Twint));
    }

    #[test]
    fn names_roundtrip_through_from_name() {
        for category in Category::ALL {
            assert_eq!(Category::from_name(category.name()).unwrap(), category);
        }
        for sub in Subcategory::ALL {
            assert_eq!(Subcategory::from_name(sub.name()).unwrap(), sub);
        }
    }

    #[test]
    fn from_name_ignores_case_and_padding() {
        assert_eq!(Category::from_name(" dining ").unwrap(), Category::Dining);
        assert_eq!(
            Subcategory::from_name("decor & furnishings").unwrap(),
            Subcategory::Decor
        );
    }

    #[test]
    fn exact_name_preferred_over_case_insensitive() {
        // "Personal Care" is a subcategory; the category is "Personal Care & Health".
        assert_eq!(
            Subcategory::from_name("Personal Care").unwrap(),
            Subcategory::PersonalCare
        );
        assert!(Category::from_name("Personal Care").is_err());
    }

    #[test]
    fn allowed_subcategories_for_unknown_name_fails() {
        assert_eq!(
            allowed_subcategories_for("Groceries"),
            Err(TaxonomyError::UnknownCategory("Groceries".to_string()))
        );
        assert_eq!(
            allowed_subcategories_for("Essentials").unwrap(),
            &[Subcategory::Transit, Subcategory::Groceries]
        );
    }

    #[test]
    fn validate_pair_accepts_every_table_entry() {
        for (category, subs) in TAXONOMY {
            assert!(validate_pair(*category, None).is_ok());
            for sub in *subs {
                assert!(validate_pair(*category, Some(*sub)).is_ok());
            }
        }
    }

    #[test]
    fn validate_pair_rejects_foreign_subcategory() {
        assert_eq!(
            validate_pair(Category::Dining, Some(Subcategory::Rent)),
            Err(TaxonomyError::InvalidSubcategoryForCategory {
                category: Category::Dining,
                subcategory: Subcategory::Rent,
            })
        );
    }

    #[test]
    fn serde_uses_display_names() {
        let json = serde_json::to_string(&Category::PersonalCare).unwrap();
        assert_eq!(json, "\"Personal Care & Health\"");
        let sub: Subcategory = serde_json::from_str("\"Food & Activities\"").unwrap();
        assert_eq!(sub, Subcategory::FoodActivities);
    }
}
