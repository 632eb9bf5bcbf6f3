//! Static category taxonomy.
//!
//! Declaration order of [`TAXONOMY`] is the fallback-matching order, and the
//! order of each `fallback` list is the per-category pattern order. Both are
//! part of the classifier's observable behaviour.

use super::Category;

/// One category: its subcategories with their raw codes, plus ordered
/// fallback substrings for codes missing from the exact table.
#[derive(Debug)]
pub struct CategoryEntry {
    /// Canonical category.
    pub category: Category,
    /// `(subcategory, raw codes)` pairs.
    pub subcategories: &'static [(&'static str, &'static [&'static str])],
    /// Substrings tried, in order, against unmapped codes.
    pub fallback: &'static [&'static str],
}

/// The taxonomy, in fallback-matching order.
pub static TAXONOMY: &[CategoryEntry] = &[
    CategoryEntry {
        category: Category::Whiskey,
        subcategories: &[
            ("Bourbon", &[
                "STRAIGHT BOURBON WHISKY",
                "BOURBON WHISKY",
                "KENTUCKY STRAIGHT BOURBON WHISKY",
                "BOTTLED IN BOND BOURBON WHISKY",
                "BLENDED BOURBON WHISKY",
                "STRAIGHT BOURBON WHISKY BLENDS",
            ]),
            ("Rye", &[
                "STRAIGHT RYE WHISKY",
                "RYE WHISKY",
                "BOTTLED IN BOND RYE WHISKY",
                "BLENDED RYE WHISKY",
            ]),
            ("Scotch", &[
                "SCOTCH WHISKY",
                "SCOTCH WHISKY FB",
                "SINGLE MALT SCOTCH WHISKY",
                "BLENDED SCOTCH WHISKY",
            ]),
            ("Irish Whiskey", &["IRISH WHISKY", "IRISH WHISKY FB"]),
            ("Canadian Whisky", &["CANADIAN WHISKY", "CANADIAN WHISKY FB"]),
            ("American Whiskey", &[
                "MALT WHISKY",
                "STRAIGHT MALT WHISKY",
                "AMERICAN SINGLE MALT WHISKY",
                "CORN WHISKY",
                "STRAIGHT CORN WHISKY",
                "WHEAT WHISKY",
                "LIGHT WHISKY",
                "BLENDED WHISKY",
                "SPIRIT WHISKY",
            ]),
            ("Flavored Whiskey", &[
                "FLAVORED WHISKY",
                "WHISKY SPECIALTIES",
                "WHISKY PROPRIETARY",
            ]),
        ],
        fallback: &["WHISK", "BOURBON", "SCOTCH", "RYE"],
    },
    CategoryEntry {
        category: Category::Tequila,
        subcategories: &[
            ("Tequila", &["TEQUILA", "TEQUILA FB", "TEQUILA USB"]),
            ("Mezcal", &["MEZCAL", "MEZCAL FB", "MEZCAL US"]),
            ("Agave Spirits", &["AGAVE SPIRITS", "AGAVE SPIRITS FB"]),
            ("Flavored Tequila", &["FLAVORED TEQUILA", "TEQUILA SPECIALTIES"]),
        ],
        fallback: &["TEQUILA", "MEZCAL", "AGAVE"],
    },
    CategoryEntry {
        category: Category::Vodka,
        subcategories: &[
            ("Vodka", &[
                "VODKA",
                "VODKA FB",
                "VODKA 80-90 PROOF",
                "VODKA 100 PROOF AND OVER",
            ]),
            ("Flavored Vodka", &["FLAVORED VODKA", "FLAVORED VODKA FB", "VODKA SPECIALTIES"]),
        ],
        fallback: &["VODKA"],
    },
    CategoryEntry {
        category: Category::Gin,
        subcategories: &[
            ("Gin", &["GIN", "GIN FB", "DISTILLED GIN", "LONDON DRY GIN", "COMPOUNDED GIN"]),
            ("Genever", &["GENEVER", "GENEVER FB"]),
            ("Flavored Gin", &["FLAVORED GIN", "GIN SPECIALTIES", "SLOE GIN"]),
        ],
        fallback: &["GIN", "GENEVER"],
    },
    CategoryEntry {
        category: Category::Rum,
        subcategories: &[
            ("Rum", &[
                "RUM",
                "RUM FB",
                "DOMESTIC RUM",
                "PUERTO RICAN RUM",
                "VIRGIN ISLANDS RUM",
                "JAMAICAN RUM",
            ]),
            ("Flavored Rum", &["FLAVORED RUM", "SPICED RUM", "RUM SPECIALTIES"]),
            ("Cachaca", &["CACHACA", "CACHACA FB"]),
        ],
        fallback: &["RUM", "CACHACA"],
    },
    CategoryEntry {
        category: Category::Brandy,
        subcategories: &[
            ("Cognac", &["COGNAC", "COGNAC (BRANDY) FB"]),
            ("Armagnac", &["ARMAGNAC", "ARMAGNAC (BRANDY) FB"]),
            ("Grape Brandy", &[
                "BRANDY",
                "BRANDY FB",
                "GRAPE BRANDY",
                "CALIFORNIA BRANDY",
                "PISCO",
                "GRAPPA BRANDY",
            ]),
            ("Fruit Brandy", &[
                "APPLE BRANDY",
                "APPLEJACK",
                "CALVADOS",
                "PEAR BRANDY",
                "KIRSCHWASSER",
                "FRUIT BRANDY",
            ]),
            ("Flavored Brandy", &[
                "FLAVORED BRANDY",
                "BLACKBERRY FLAVORED BRANDY",
                "BRANDY SPECIALTIES",
            ]),
        ],
        fallback: &["BRANDY", "COGNAC", "ARMAGNAC", "CALVADOS", "PISCO", "GRAPPA"],
    },
    CategoryEntry {
        category: Category::Liqueur,
        subcategories: &[
            ("Cordials & Liqueurs", &[
                "LIQUEUR",
                "CORDIALS & LIQUEURS",
                "CORDIALS (FRUIT & PEELS)",
                "CORDIALS (HERBS & SEEDS)",
                "CORDIALS (CREAM)",
            ]),
            ("Schnapps", &["SCHNAPPS", "PEPPERMINT SCHNAPPS", "ROCK & RYE"]),
            ("Specialty Liqueurs", &[
                "AMARETTO",
                "TRIPLE SEC",
                "CREME DE MENTHE",
                "CREME DE CACAO",
                "ANISETTE",
                "SAMBUCA",
                "KUMMEL",
            ]),
        ],
        fallback: &["LIQUEUR", "CORDIAL", "SCHNAPPS", "CREME DE", "AMARETTO", "TRIPLE SEC"],
    },
    CategoryEntry {
        category: Category::Cocktails,
        subcategories: &[
            ("Spirit Cocktails", &[
                "COCKTAILS 48 PROOF UP",
                "COCKTAILS UNDER 48 PROOF",
                "MARGARITA",
                "PINA COLADA",
                "MANHATTAN",
                "DAIQUIRI",
            ]),
            ("Premixed Specialties", &["COCKTAIL SPECIALTIES", "SPIRIT SPECIALTIES"]),
        ],
        fallback: &["COCKTAIL", "SELTZER", "MARGARITA"],
    },
    CategoryEntry {
        category: Category::Wine,
        subcategories: &[
            ("Red Wine", &["TABLE RED WINE", "RED WINE"]),
            ("White Wine", &["TABLE WHITE WINE", "WHITE WINE"]),
            ("Rose Wine", &["ROSE WINE", "TABLE ROSE WINE"]),
            ("Sparkling Wine", &[
                "SPARKLING WINE/CHAMPAGNE",
                "SPARKLING WINE",
                "CARBONATED WINE",
                "CHAMPAGNE",
            ]),
            ("Dessert Wine", &[
                "DESSERT /PORT/SHERRY/(COOKING) WINE",
                "DESSERT FLAVORED WINE",
                "PORT",
                "SHERRY",
                "MADEIRA",
            ]),
            ("Fruit Wine", &["TABLE FRUIT WINE", "FRUIT WINE", "CIDER", "MEAD"]),
            ("Aperitif Wine", &["VERMOUTH/MIXED TYPES", "VERMOUTH", "APERITIF WINE"]),
            ("Sake", &["SAKE", "SAKE - IMPORTED"]),
        ],
        fallback: &["WINE", "CHAMPAGNE", "SAKE", "CIDER", "MEAD", "VERMOUTH", "SHERRY"],
    },
    CategoryEntry {
        category: Category::Beer,
        subcategories: &[
            ("Beer", &["BEER", "LIGHT BEER", "WHEAT BEER"]),
            ("Ale", &["ALE", "PALE ALE", "INDIA PALE ALE"]),
            ("Lager", &["LAGER", "PILSNER"]),
            ("Stout & Porter", &["STOUT", "PORTER"]),
            ("Malt Liquor", &["MALT LIQUOR", "MALT BEVERAGES"]),
            ("Flavored Malt Beverage", &[
                "FLAVORED MALT BEVERAGE",
                "MALT BEVERAGES SPECIALITIES - FLAVORED",
                "HARD SELTZER",
            ]),
        ],
        fallback: &["BEER", "ALE", "LAGER", "STOUT", "PORTER", "MALT", "IPA"],
    },
];
