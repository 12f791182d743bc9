//! Species Knowledge Base
//!
//! Maps a predicted class label to descriptive metadata. Lookups never
//! fail: unknown labels get a placeholder record.

use crate::models::SpeciesRecord;
use std::collections::HashMap;

/// Habitat reported for labels with no known record
pub const PLACEHOLDER_HABITAT: &str = "Coastal environment";

#[derive(Debug, Clone)]
pub struct SpeciesKnowledgeBase {
    records: HashMap<String, SpeciesRecord>,
}

impl Default for SpeciesKnowledgeBase {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SpeciesKnowledgeBase {
    /// Knowledge Base with no entries; every lookup yields a placeholder
    pub fn empty() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Knowledge Base seeded with the bundled species
    pub fn builtin() -> Self {
        let records = [
            SpeciesRecord {
                scientific_name: "Rhizophora mangle".to_string(),
                common_name: "Red Mangrove".to_string(),
                family: "Rhizophoraceae".to_string(),
                habitat: "Coastal wetlands, tidal zones".to_string(),
                conservation_status: Some("Least Concern".to_string()),
            },
            SpeciesRecord {
                scientific_name: "Avicennia germinans".to_string(),
                common_name: "Black Mangrove".to_string(),
                family: "Acanthaceae".to_string(),
                habitat: "Salt marshes, coastal areas".to_string(),
                conservation_status: Some("Least Concern".to_string()),
            },
        ];

        Self::empty().with_records(
            records
                .into_iter()
                .map(|r| (r.scientific_name.clone(), r)),
        )
    }

    /// Add or replace entries keyed by class label
    pub fn with_records(
        mut self,
        records: impl IntoIterator<Item = (String, SpeciesRecord)>,
    ) -> Self {
        self.records.extend(records);
        self
    }

    pub fn lookup(&self, class_label: &str) -> SpeciesRecord {
        self.records
            .get(class_label)
            .cloned()
            .unwrap_or_else(|| placeholder(class_label))
    }
}

fn placeholder(class_label: &str) -> SpeciesRecord {
    SpeciesRecord {
        scientific_name: class_label.to_string(),
        common_name: "Unknown".to_string(),
        family: "Unknown".to_string(),
        habitat: PLACEHOLDER_HABITAT.to_string(),
        conservation_status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_species() {
        let kb = SpeciesKnowledgeBase::builtin();
        let record = kb.lookup("Rhizophora mangle");
        assert_eq!(record.common_name, "Red Mangrove");
        assert_eq!(record.family, "Rhizophoraceae");
        assert_eq!(record.conservation_status.as_deref(), Some("Least Concern"));
    }

    #[test]
    fn test_unknown_species_placeholder() {
        let kb = SpeciesKnowledgeBase::builtin();
        let record = kb.lookup("Conocarpus erectus");
        assert_eq!(record.scientific_name, "Conocarpus erectus");
        assert_eq!(record.common_name, "Unknown");
        assert_eq!(record.family, "Unknown");
        assert_eq!(record.habitat, PLACEHOLDER_HABITAT);
        assert!(record.conservation_status.is_none());
    }

    #[test]
    fn test_lookup_is_repeatable() {
        let kb = SpeciesKnowledgeBase::builtin();
        assert_eq!(kb.lookup("Avicennia germinans"), kb.lookup("Avicennia germinans"));
        assert_eq!(kb.lookup("nothing"), kb.lookup("nothing"));
    }

    #[test]
    fn test_records_override_builtin() {
        let kb = SpeciesKnowledgeBase::builtin().with_records([(
            "Rhizophora mangle".to_string(),
            SpeciesRecord {
                scientific_name: "Rhizophora mangle".to_string(),
                common_name: "American Mangrove".to_string(),
                family: "Rhizophoraceae".to_string(),
                habitat: "Estuaries".to_string(),
                conservation_status: None,
            },
        )]);

        assert_eq!(kb.lookup("Rhizophora mangle").common_name, "American Mangrove");
        assert_eq!(kb.lookup("Avicennia germinans").common_name, "Black Mangrove");
    }
}
