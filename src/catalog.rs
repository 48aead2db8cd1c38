//! Read-only reference data: countries, species, and per-species media.
//!
//! The catalog is loaded once at startup and shared immutably; question
//! generation only ever reads from it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

pub type SpeciesId = u32;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    pub id: SpeciesId,
    pub name: String,
    pub name_latin: String,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    Images,
    Video,
    Audio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributor: Option<String>,
}

/// On-disk catalog format (`CATALOG_PATH`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    countries: Vec<Country>,
    species: Vec<SpeciesEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeciesEntry {
    #[serde(flatten)]
    species: Species,
    countries: Vec<String>,
    #[serde(default)]
    images: Vec<MediaItem>,
    #[serde(default)]
    video: Vec<MediaItem>,
    #[serde(default)]
    audio: Vec<MediaItem>,
}

pub struct Catalog {
    countries: HashMap<String, Country>,
    // BTreeMap keeps the global id ordering used for neighbor decoys.
    species: BTreeMap<SpeciesId, Species>,
    country_species: HashMap<String, Vec<SpeciesId>>,
    media: HashMap<(SpeciesId, MediaKind), Vec<MediaItem>>,
}

impl Catalog {
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&raw)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: CatalogFile) -> Self {
        let mut catalog = Catalog {
            countries: file
                .countries
                .into_iter()
                .map(|c| (c.code.clone(), c))
                .collect(),
            species: BTreeMap::new(),
            country_species: HashMap::new(),
            media: HashMap::new(),
        };
        for entry in file.species {
            let id = entry.species.id;
            for code in entry.countries {
                catalog.country_species.entry(code).or_default().push(id);
            }
            catalog.media.insert((id, MediaKind::Images), entry.images);
            catalog.media.insert((id, MediaKind::Video), entry.video);
            catalog.media.insert((id, MediaKind::Audio), entry.audio);
            catalog.species.insert(id, entry.species);
        }
        catalog
    }

    pub fn country(&self, code: &str) -> Option<&Country> {
        self.countries.get(code)
    }

    pub fn species(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(&id)
    }

    /// Candidate pool for question generation: all species recorded for the
    /// country, minus the excluded set.
    pub fn species_for_country(&self, code: &str, exclude: &HashSet<SpeciesId>) -> Vec<SpeciesId> {
        self.country_species
            .get(code)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| !exclude.contains(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn media_for(&self, id: SpeciesId, kind: MediaKind) -> &[MediaItem] {
        self.media
            .get(&(id, kind))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Species ids strictly below `id`, nearest first.
    pub fn ids_below(&self, id: SpeciesId) -> impl Iterator<Item = SpeciesId> + '_ {
        self.species.range(..id).rev().map(|(id, _)| *id)
    }

    /// Species ids strictly above `id`, nearest first.
    pub fn ids_above(&self, id: SpeciesId) -> impl Iterator<Item = SpeciesId> + '_ {
        use std::ops::Bound;
        self.species
            .range((Bound::Excluded(id), Bound::Unbounded))
            .map(|(id, _)| *id)
    }

    /// Small built-in data set for local runs and tests: twenty species in
    /// `NL`, and a single-species country `AW` whose questions are therefore
    /// fully predictable.
    pub fn sample() -> Self {
        let mut species = Vec::new();
        for i in 1..=20u32 {
            species.push(SpeciesEntry {
                species: Species {
                    id: i,
                    name: format!("Sample Species {i}"),
                    name_latin: format!("Exemplum avis {i}"),
                    code: format!("SP{i:03}"),
                },
                countries: vec!["NL".to_string()],
                images: (0..3)
                    .map(|n| MediaItem {
                        url: format!("https://example.com/species/{i}/image{n}.jpg"),
                        link: None,
                        contributor: None,
                    })
                    .collect(),
                video: vec![MediaItem {
                    url: format!("https://example.com/species/{i}/video.mp4"),
                    link: None,
                    contributor: None,
                }],
                audio: vec![MediaItem {
                    url: format!("https://example.com/species/{i}/song.mp3"),
                    link: None,
                    contributor: None,
                }],
            });
        }
        species.push(SpeciesEntry {
            species: Species {
                id: 100,
                name: "Lone Island Finch".to_string(),
                name_latin: "Fringilla insularis".to_string(),
                code: "SP100".to_string(),
            },
            countries: vec!["AW".to_string()],
            images: vec![MediaItem {
                url: "https://example.com/species/100/image0.jpg".to_string(),
                link: None,
                contributor: None,
            }],
            video: vec![],
            audio: vec![],
        });
        Self::from_file(CatalogFile {
            countries: vec![
                Country {
                    code: "NL".to_string(),
                    name: "Netherlands".to_string(),
                },
                Country {
                    code: "AW".to_string(),
                    name: "Aruba".to_string(),
                },
            ],
            species,
        })
    }
}
