use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategorySpec {
    pub subcategory_id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub category_id: u32,
    pub category_name: String,
    pub subcategories: Vec<SubcategorySpec>,
}

impl CategorySpec {
    pub fn new(category_id: u32, category_name: &str, subcategories: &[(u32, &str)]) -> Self {
        Self {
            category_id,
            category_name: category_name.to_owned(),
            subcategories: subcategories
                .iter()
                .map(|(subcategory_id, name)| SubcategorySpec {
                    subcategory_id: *subcategory_id,
                    name: (*name).to_owned(),
                })
                .collect(),
        }
    }
}

/// Checkpoint key for one subcategory.
#[must_use]
pub fn subcategory_key(category_name: &str, subcategory_name: &str) -> String {
    format!("{category_name}_{subcategory_name}")
}

#[must_use]
pub fn subcategory_count(taxonomy: &[CategorySpec]) -> usize {
    taxonomy.iter().map(|c| c.subcategories.len()).sum()
}

/// Collection table of sastra.org, in the site's listing order.
#[must_use]
pub fn builtin() -> Vec<CategorySpec> {
    vec![
        CategorySpec::new(
            10,
            "Agama dan Kepercayaan",
            &[
                (48, "Kebatinan dan Mistik"),
                (30, "Kitab Suci"),
                (39, "Suluk"),
                (58, "Wulang"),
            ],
        ),
        CategorySpec::new(
            9,
            "Arsip dan Sejarah",
            &[
                (76, "Editorial"),
                (31, "Galeri"),
                (71, "Hukum dan Pemerintahan"),
                (51, "Kasunanan"),
                (49, "Mangkunagaran"),
                (33, "Mayor J F T"),
                (37, "Radya Pustaka"),
                (22, "Radya Pustaka Surat-menyurat"),
                (26, "Ranggawarsita R Ng"),
                (32, "Sasradiningrat II K R A"),
                (44, "Surakarta"),
                (81, "Surat-menyurat"),
                (50, "Umum"),
            ],
        ),
        CategorySpec::new(
            12,
            "Bahasa dan Budaya",
            &[
                (36, "Adat dan Tradisi"),
                (62, "Bacaan Huruf Jawa"),
                (59, "Gending dan Notasi"),
                (67, "Kagunan"),
                (41, "Kamus dan Leksikon"),
                (23, "Karawitan"),
                (68, "Panembrama dan Iber"),
                (52, "Pawukon dan Primbon"),
                (53, "Pengetahuan Bahasa"),
                (63, "Wayang"),
            ],
        ),
        CategorySpec::new(
            11,
            "Kisah Cerita dan Kronikal",
            &[
                (46, "Babad"),
                (43, "Babad Giyanti"),
                (42, "Babad Tanah Jawi"),
                (47, "Cerita"),
                (64, "Dongeng"),
                (72, "Mahabharata"),
                (73, "Menak"),
                (65, "Novel"),
                (25, "Riwayat dan Perjalanan"),
                (34, "Serat Centhini"),
            ],
        ),
        CategorySpec::new(
            13,
            "Koran Majalah dan Jurnal",
            &[
                (45, "Almanak"),
                (54, "Candrakanta"),
                (57, "Kajawen"),
                (28, "Kawi"),
                (75, "Kumandang Teyosupi"),
                (55, "Mardi Siwi"),
                (56, "Narpawandawa"),
                (27, "Pusaka Jawi"),
                (35, "Sasadara"),
                (61, "Umum"),
                (74, "Wara Susila"),
            ],
        ),
    ]
}

/// Reads a replacement table: a JSON array of [`CategorySpec`].
pub fn load_json(path: &Path) -> anyhow::Result<Vec<CategorySpec>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read taxonomy: {}", path.display()))?;
    let taxonomy: Vec<CategorySpec> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse taxonomy json: {}", path.display()))?;
    if taxonomy.is_empty() {
        anyhow::bail!("taxonomy has no categories: {}", path.display());
    }
    Ok(taxonomy)
}

/// Keeps only the listed category ids; an empty filter keeps everything.
pub fn select_categories(
    taxonomy: Vec<CategorySpec>,
    category_ids: &[u32],
) -> anyhow::Result<Vec<CategorySpec>> {
    if category_ids.is_empty() {
        return Ok(taxonomy);
    }

    for id in category_ids {
        if !taxonomy.iter().any(|c| c.category_id == *id) {
            anyhow::bail!("unknown category id: {id}");
        }
    }

    Ok(taxonomy
        .into_iter()
        .filter(|c| category_ids.contains(&c.category_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn builtin_table_has_unique_ids_and_keys() {
        let taxonomy = builtin();
        assert_eq!(taxonomy.len(), 5);
        assert_eq!(subcategory_count(&taxonomy), 48);

        let mut pairs = HashSet::new();
        let mut keys = HashSet::new();
        for category in &taxonomy {
            for sub in &category.subcategories {
                assert!(pairs.insert((category.category_id, sub.subcategory_id)));
                assert!(keys.insert(subcategory_key(&category.category_name, &sub.name)));
            }
        }
    }

    #[test]
    fn select_categories_filters_and_rejects_unknown_ids() -> anyhow::Result<()> {
        let selected = select_categories(builtin(), &[11])?;
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].category_name, "Kisah Cerita dan Kronikal");
        assert_eq!(selected[0].subcategories[0].name, "Babad");

        assert_eq!(select_categories(builtin(), &[])?.len(), 5);
        assert!(select_categories(builtin(), &[99]).is_err());
        Ok(())
    }

    #[test]
    fn load_json_reads_external_table() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("taxonomy.json");
        std::fs::write(
            &path,
            r#"[{"category_id":11,"category_name":"Kisah","subcategories":[{"subcategory_id":46,"name":"Babad"}]}]"#,
        )?;

        let taxonomy = load_json(&path)?;
        assert_eq!(taxonomy, vec![CategorySpec::new(11, "Kisah", &[(46, "Babad")])]);

        std::fs::write(&path, "[]")?;
        assert!(load_json(&path).is_err());
        Ok(())
    }
}
