use std::collections::HashSet;

use crate::table::{CANONICAL_COLUMNS, Cell, LAT, LON, SPECIES, TabularDataset};

pub const TAXON_RANK: &str = "taxonRank";
pub const ACCEPTED_RANKS: [&str; 3] = ["SPECIES", "SUBSPECIES", "VARIETY"];

const SPECIES_SYNONYMS: [&str; 3] = ["taxon", "Taxon", "Species"];
const LAT_SYNONYMS: [&str; 3] = ["decimalLatitude", "Latitude", "latitude"];
const LON_SYNONYMS: [&str; 3] = ["decimalLongitude", "Longitude", "longitude"];

pub fn canonical_name(column: &str) -> Option<&'static str> {
    if SPECIES_SYNONYMS.contains(&column) {
        Some(SPECIES)
    } else if LAT_SYNONYMS.contains(&column) {
        Some(LAT)
    } else if LON_SYNONYMS.contains(&column) {
        Some(LON)
    } else {
        None
    }
}

/// Renames known synonyms to their canonical names.
///
/// A synonym keeps its original name when the canonical name is already
/// taken, so the result never contains duplicates it did not start with.
pub fn normalize_columns(columns: &[String]) -> Vec<String> {
    let mut taken: HashSet<&str> = columns
        .iter()
        .map(String::as_str)
        .filter(|name| CANONICAL_COLUMNS.contains(name))
        .collect();

    columns
        .iter()
        .map(|column| match canonical_name(column) {
            Some(canonical) if taken.insert(canonical) => canonical.to_string(),
            _ => column.clone(),
        })
        .collect()
}

pub fn normalize_schema(dataset: &mut TabularDataset) {
    let renamed = normalize_columns(dataset.columns());
    dataset.set_columns(renamed);
}

/// Drops rows with an unaccepted taxon rank or a missing species/lat/lon.
///
/// lat/lon cells are coerced to numbers; values that do not parse count as
/// missing. A canonical column absent from the table makes every row missing.
pub fn filter_rows(dataset: &mut TabularDataset) {
    if let Some(rank) = dataset.column_index(TAXON_RANK) {
        dataset.retain_rows(|row| {
            row[rank]
                .as_text()
                .is_some_and(|value| ACCEPTED_RANKS.contains(&value.trim()))
        });
    }

    let species = dataset.column_index(SPECIES);
    let lat = dataset.column_index(LAT);
    let lon = dataset.column_index(LON);
    let (Some(species), Some(lat), Some(lon)) = (species, lat, lon) else {
        dataset.retain_rows(|_| false);
        return;
    };

    dataset.retain_rows(|row| {
        !row[species].is_null() && row[lat].as_f64().is_some() && row[lon].as_f64().is_some()
    });
    for row in dataset.rows_mut() {
        for index in [lat, lon] {
            if let Some(value) = row[index].as_f64() {
                row[index] = Cell::Number(value);
            }
        }
    }
}

pub fn project_canonical(dataset: &mut TabularDataset) {
    dataset.project(&CANONICAL_COLUMNS);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn rename_synonyms() {
        let renamed = normalize_columns(&names(&["Taxon", "Latitude", "Longitude", "extra"]));
        assert_eq!(renamed, names(&["species", "lat", "lon", "extra"]));
    }

    #[test]
    fn rename_is_idempotent() {
        let once = normalize_columns(&names(&["taxon", "decimalLatitude", "decimalLongitude", "gbifID"]));
        let twice = normalize_columns(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn rename_keeps_synonym_when_canonical_exists() {
        let renamed = normalize_columns(&names(&["Species", "lat", "Latitude", "taxon"]));
        assert_eq!(renamed, names(&["species", "lat", "Latitude", "taxon"]));
    }

    #[test]
    fn filter_accepted_ranks_and_nulls() {
        let mut dataset = TabularDataset::from_rows(
            &["species", "taxonRank", "lat", "lon", "gbifID"],
            vec![
                vec![Some("Quercus suber"), Some("SPECIES"), Some("38.1"), Some("-8.2"), Some("1")],
                vec![Some("Quercus x"), Some("FORM"), Some("38.2"), Some("-8.3"), Some("2")],
                vec![Some("Quercus faginea"), Some("VARIETY"), Some("39.0"), Some("-7.9"), Some("3")],
                vec![None, Some("SPECIES"), Some("40.0"), Some("-7.0"), Some("4")],
            ],
        );
        filter_rows(&mut dataset);
        project_canonical(&mut dataset);

        assert_eq!(dataset.columns(), ["species", "lat", "lon"]);
        let species: Vec<_> = dataset.records().into_iter().map(|r| r.species).collect();
        assert_eq!(species, ["Quercus suber", "Quercus faginea"]);
        assert_eq!(dataset.rows()[0][1], Cell::Number(38.1));
    }

    #[test]
    fn unparseable_coordinates_are_dropped() {
        let mut dataset = TabularDataset::from_rows(
            &["species", "lat", "lon"],
            vec![
                vec![Some("a"), Some("north"), Some("1.0")],
                vec![Some("b"), Some("2.0"), None],
                vec![Some("c"), Some("2.0"), Some("3.0")],
            ],
        );
        filter_rows(&mut dataset);
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn missing_canonical_column_empties_rows() {
        let mut dataset = TabularDataset::from_rows(
            &["species", "lat", "other"],
            vec![vec![Some("a"), Some("1.0"), Some("x")]],
        );
        filter_rows(&mut dataset);
        project_canonical(&mut dataset);
        assert!(dataset.is_empty());
        assert_eq!(dataset.columns(), ["species", "lat"]);
    }
}
