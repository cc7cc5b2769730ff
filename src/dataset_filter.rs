use crate::domain::{DatasetDescriptor, DatasetKey};

pub fn default_keywords() -> Vec<String> {
    ["seq", "sequence", "gene", "DNA", "barcode"]
        .iter()
        .map(|keyword| keyword.to_string())
        .collect()
}

/// Excludes datasets whose description mentions any of the keywords.
#[derive(Debug, Clone)]
pub struct DatasetFilter {
    keywords: Vec<String>,
}

impl Default for DatasetFilter {
    fn default() -> Self {
        Self::new(&default_keywords())
    }
}

impl DatasetFilter {
    pub fn new(keywords: &[String]) -> Self {
        let keywords = keywords
            .iter()
            .map(|keyword| keyword.trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        Self { keywords }
    }

    /// Case-insensitive substring match; a missing description never matches.
    pub fn is_excluded(&self, descriptor: &DatasetDescriptor) -> bool {
        let Some(description) = descriptor.description.as_deref() else {
            return false;
        };
        let description = description.to_lowercase();
        self.keywords
            .iter()
            .any(|keyword| description.contains(keyword.as_str()))
    }

    pub fn retain<'a>(&self, descriptors: &'a [DatasetDescriptor]) -> Vec<&'a DatasetDescriptor> {
        descriptors
            .iter()
            .filter(|descriptor| !self.is_excluded(descriptor))
            .collect()
    }

    pub fn keys(&self, descriptors: &[DatasetDescriptor]) -> Vec<DatasetKey> {
        self.retain(descriptors)
            .into_iter()
            .map(|descriptor| descriptor.key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<DatasetDescriptor> {
        vec![
            DatasetDescriptor::new("herbarium", Some("Vascular plant herbarium of Lisbon")),
            DatasetDescriptor::new("bold", Some("Public DNA Barcodes from BOLD")),
            DatasetDescriptor::new("untitled", None),
            DatasetDescriptor::new("blank", Some("")),
            DatasetDescriptor::new("genbank", Some("GenBank nucleotide SEQUENCES")),
            DatasetDescriptor::new("survey", Some("Cork oak woodland survey")),
        ]
    }

    #[test]
    fn keys_skip_genetic_datasets() {
        let keys = DatasetFilter::default().keys(&sample());
        let keys: Vec<_> = keys.iter().map(DatasetKey::as_str).collect();
        assert_eq!(keys, ["herbarium", "untitled", "blank", "survey"]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let filter = DatasetFilter::default();
        let descriptors = sample();
        let once: Vec<DatasetDescriptor> = filter.retain(&descriptors).into_iter().cloned().collect();
        let twice: Vec<DatasetDescriptor> = filter.retain(&once).into_iter().cloned().collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn matching_ignores_keyword_case() {
        let filter = DatasetFilter::new(&["dna".to_string()]);
        assert!(filter.is_excluded(&DatasetDescriptor::new("x", Some("eDNA metabarcoding"))));
    }

    #[test]
    fn no_keywords_keeps_everything() {
        let filter = DatasetFilter::new(&[]);
        assert_eq!(filter.keys(&sample()).len(), 6);
    }
}
