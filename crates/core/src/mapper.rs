use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::taxonomy::{validate_pair, Category, Subcategory, TaxonomyError};

/// A validated (category, subcategory) target for one raw label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<Subcategory>,
}

impl CategoryMapping {
    pub fn new(
        category: Category,
        subcategory: Option<Subcategory>,
    ) -> Result<Self, TaxonomyError> {
        validate_pair(category, subcategory)?;
        Ok(CategoryMapping {
            category,
            subcategory,
        })
    }

    pub fn uncategorized() -> Self {
        CategoryMapping {
            category: Category::Uncategorized,
            subcategory: None,
        }
    }

    pub fn is_uncategorized(&self) -> bool {
        self.category == Category::Uncategorized
    }
}

/// Plain snapshot handed to processors: raw label → mapping.
pub type MappingTable = BTreeMap<String, CategoryMapping>;

#[derive(Debug, Error)]
pub enum MapperError {
    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),
    #[error("Failed to parse mapping TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize mappings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Name-based form used in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MappingEntry {
    category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subcategory: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MappingFile {
    #[serde(default)]
    mappings: BTreeMap<String, MappingEntry>,
}

/// Validated map from institution-specific labels to taxonomy entries.
///
/// Labels are stored exactly as given. Callers that want case-insensitive
/// matching normalise before `lookup`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryMapper {
    mappings: BTreeMap<String, CategoryMapping>,
}

impl CategoryMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the mapping for `raw_label`.
    pub fn add_mapping(
        &mut self,
        raw_label: impl Into<String>,
        category: Category,
        subcategory: Option<Subcategory>,
    ) -> Result<(), TaxonomyError> {
        let mapping = CategoryMapping::new(category, subcategory)?;
        self.mappings.insert(raw_label.into(), mapping);
        Ok(())
    }

    pub fn lookup(&self, raw_label: &str) -> Option<CategoryMapping> {
        self.mappings.get(raw_label).copied()
    }

    pub fn export(&self) -> MappingTable {
        self.mappings.clone()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryMapping)> {
        self.mappings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merges `other` into `self`; entries from `other` win.
    pub fn extend(&mut self, other: CategoryMapper) {
        self.mappings.extend(other.mappings);
    }

    /// Rebuilds a mapper from a snapshot, re-validating every entry.
    pub fn from_table(table: &MappingTable) -> Result<Self, TaxonomyError> {
        let mut mapper = Self::new();
        for (label, mapping) in table {
            mapper.add_mapping(label.clone(), mapping.category, mapping.subcategory)?;
        }
        Ok(mapper)
    }

    /// Parses the `[mappings]` table of a configuration file:
    ///
    /// ```toml
    /// [mappings."coop"]
    /// category = "Essentials"
    /// subcategory = "Groceries"
    /// ```
    pub fn from_toml(toml_content: &str) -> Result<Self, MapperError> {
        let file: MappingFile = toml::from_str(toml_content)?;
        let mut mapper = Self::new();
        for (label, entry) in file.mappings {
            let category = Category::from_name(&entry.category)?;
            let subcategory = entry
                .subcategory
                .as_deref()
                .map(Subcategory::from_name)
                .transpose()?;
            mapper.add_mapping(label, category, subcategory)?;
        }
        Ok(mapper)
    }

    pub fn to_toml(&self) -> Result<String, MapperError> {
        let file = MappingFile {
            mappings: self
                .mappings
                .iter()
                .map(|(label, m)| {
                    (
                        label.clone(),
                        MappingEntry {
                            category: m.category.name().to_string(),
                            subcategory: m.subcategory.map(|s| s.name().to_string()),
                        },
                    )
                })
                .collect(),
        };
        Ok(toml::to_string(&file)?)
    }

    /// Merchant labels common in Swiss card and account statements, plus the
    /// category labels card issuers attach to each purchase.
    pub fn suggested() -> Self {
        let mut mapper = Self::new();
        let entries = SUGGESTED_MAPPINGS.iter().chain(SUGGESTED_CARD_CATEGORIES);
        for (label, category, subcategory) in entries {
            mapper.mappings.insert(
                (*label).to_string(),
                CategoryMapping {
                    category: *category,
                    subcategory: *subcategory,
                },
            );
        }
        mapper
    }
}

pub const SUGGESTED_MAPPINGS: &[(&str, Category, Option<Subcategory>)] = &[
    ("coop", Category::Essentials, Some(Subcategory::Groceries)),
    ("migros", Category::Essentials, Some(Subcategory::Groceries)),
    ("denner", Category::Essentials, Some(Subcategory::Groceries)),
    ("lidl", Category::Essentials, Some(Subcategory::Groceries)),
    ("aldi", Category::Essentials, Some(Subcategory::Groceries)),
    ("volg", Category::Essentials, Some(Subcategory::Groceries)),
    ("sbb", Category::Essentials, Some(Subcategory::Transit)),
    ("zvv", Category::Essentials, Some(Subcategory::Transit)),
    ("publibike", Category::Essentials, Some(Subcategory::Transit)),
    ("mobility", Category::Essentials, Some(Subcategory::Transit)),
    ("uber eats", Category::Dining, Some(Subcategory::Delivery)),
    ("just eat", Category::Dining, Some(Subcategory::Delivery)),
    ("mcdonald's", Category::Dining, Some(Subcategory::Delivery)),
    ("burger king", Category::Dining, Some(Subcategory::Delivery)),
    ("too good to go", Category::Dining, Some(Subcategory::Date)),
    ("pub", Category::Dining, Some(Subcategory::Social)),
    ("gelateria", Category::Dining, None),
    ("netflix", Category::Bills, Some(Subcategory::Subscriptions)),
    ("spotify", Category::Bills, Some(Subcategory::Subscriptions)),
    ("sunrise", Category::Bills, Some(Subcategory::Telecom)),
    ("swisscom", Category::Bills, Some(Subcategory::Telecom)),
    ("helsana", Category::Bills, Some(Subcategory::Insurance)),
    ("helvetia", Category::Bills, Some(Subcategory::Insurance)),
    ("serafe", Category::Bills, Some(Subcategory::Utilities)),
    ("ikea", Category::Household, Some(Subcategory::Decor)),
    ("jysk", Category::Household, Some(Subcategory::Furniture)),
    ("galaxus", Category::Shopping, Some(Subcategory::Electronics)),
    ("digitec", Category::Shopping, Some(Subcategory::Electronics)),
    ("aliexpress", Category::Shopping, Some(Subcategory::Electronics)),
    ("apotheke", Category::PersonalCare, Some(Subcategory::Medical)),
    ("amavita", Category::PersonalCare, Some(Subcategory::Medical)),
    ("coiffeur", Category::PersonalCare, Some(Subcategory::PersonalCare)),
    ("hallenstadion", Category::Leisure, Some(Subcategory::Events)),
    ("ticketcorner", Category::Leisure, Some(Subcategory::Events)),
    ("boulderlounge", Category::Hobbies, Some(Subcategory::Bouldern)),
    ("easyjet", Category::Travel, Some(Subcategory::Transport)),
    ("booking.com", Category::Travel, Some(Subcategory::Accommodation)),
];

/// Merchant and registered categories from Swisscard statements and the PFM
/// categories of the Viseca API. Keys are lower-case like the resolver's.
pub const SUGGESTED_CARD_CATEGORIES: &[(&str, Category, Option<Subcategory>)] = &[
    // Swisscard merchant categories
    ("auto", Category::Essentials, Some(Subcategory::Transit)),
    ("entertainment", Category::Leisure, None),
    ("family and household", Category::Household, None),
    ("food and drink", Category::Dining, None),
    ("groceries", Category::Essentials, Some(Subcategory::Groceries)),
    ("health and beauty", Category::PersonalCare, None),
    ("shopping", Category::Shopping, None),
    ("travel", Category::Travel, None),
    // Swisscard registered categories
    ("men & women's clothing", Category::Shopping, Some(Subcategory::Clothing)),
    ("shoe stores", Category::Shopping, Some(Subcategory::Clothing)),
    ("sporting goods stores", Category::Shopping, Some(Subcategory::Clothing)),
    ("catalog merchants", Category::Shopping, Some(Subcategory::Clothing)),
    ("duty free stores", Category::Shopping, None),
    ("leather goods and luggage stores", Category::Shopping, Some(Subcategory::Clothing)),
    ("eating places, restaurants", Category::Dining, Some(Subcategory::Social)),
    ("fast food restaurants", Category::Dining, Some(Subcategory::Delivery)),
    ("bars, lounges", Category::Dining, Some(Subcategory::Social)),
    ("grocery stores, supermarkets", Category::Essentials, Some(Subcategory::Groceries)),
    ("miscellaneous food stores, markets", Category::Essentials, Some(Subcategory::Groceries)),
    ("lodging not specified", Category::Travel, Some(Subcategory::Accommodation)),
    ("passenger railways", Category::Essentials, Some(Subcategory::Transit)),
    ("automobile rental", Category::Essentials, Some(Subcategory::Transit)),
    ("transportation services, not specified", Category::Essentials, Some(Subcategory::Transit)),
    ("amusement and recreation services", Category::Leisure, Some(Subcategory::Activities)),
    ("digital goods - media, books, movies, music", Category::Shopping, Some(Subcategory::Media)),
    ("game, toy, and hobby stores", Category::Shopping, None),
    ("drug stores and pharmacies", Category::PersonalCare, Some(Subcategory::Medical)),
    ("barber and beauty shops", Category::PersonalCare, Some(Subcategory::PersonalCare)),
    (
        "dental, hospital, lab equipment and supplies",
        Category::PersonalCare,
        Some(Subcategory::Medical),
    ),
    ("telecommunication service", Category::Bills, Some(Subcategory::Telecom)),
    // Viseca PFM categories
    ("bakery", Category::Dining, None),
    ("bar/club", Category::Leisure, None),
    ("canteen", Category::Dining, Some(Subcategory::Work)),
    ("fast food restaurant", Category::Dining, Some(Subcategory::Delivery)),
    ("food", Category::Dining, None),
    ("restaurant", Category::Dining, None),
    ("supermarket", Category::Essentials, Some(Subcategory::Groceries)),
    ("book shop", Category::Shopping, Some(Subcategory::Media)),
    ("office supply", Category::Shopping, None),
    ("sport shop", Category::Shopping, None),
    ("tobacco smoking related store", Category::Shopping, None),
    ("amusement park", Category::Leisure, Some(Subcategory::Activities)),
    ("leisure activities", Category::Leisure, Some(Subcategory::Activities)),
    ("sport", Category::Hobbies, None),
    ("theatre/opera/orchestra/ballet", Category::Leisure, Some(Subcategory::Events)),
    ("hairdresser", Category::PersonalCare, Some(Subcategory::PersonalCare)),
    ("hotel", Category::Travel, Some(Subcategory::Accommodation)),
    ("public transport", Category::Essentials, Some(Subcategory::Transit)),
    ("taxi", Category::Essentials, Some(Subcategory::Transit)),
    ("school", Category::Bills, Some(Subcategory::Fees)),
];
