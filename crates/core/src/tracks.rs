//! Academic tracks and their core subjects.

use std::collections::HashMap;

/// Maps an academic track (e.g. `"Sayısal"`) to the subjects that form its core.
#[derive(Debug, Clone)]
pub struct TrackCatalog {
    tracks: HashMap<String, Vec<String>>,
}

impl TrackCatalog {
    pub fn new(tracks: HashMap<String, Vec<String>>) -> Self {
        Self { tracks }
    }

    /// Core subjects of a track, or `None` for an unknown track.
    pub fn core_subjects(&self, track: &str) -> Option<&[String]> {
        self.tracks.get(track).map(Vec::as_slice)
    }

    pub fn is_core(&self, track: &str, subject: &str) -> bool {
        self.core_subjects(track)
            .is_some_and(|subjects| subjects.iter().any(|s| s == subject))
    }
}

impl Default for TrackCatalog {
    fn default() -> Self {
        let table: [(&str, &[&str]); 4] = [
            (
                "Sayısal",
                &[
                    "Matematik",
                    "Fizik",
                    "Kimya",
                    "Biyoloji",
                    "Türk Dili ve Edebiyatı",
                ],
            ),
            (
                "Eşit Ağırlık",
                &["Matematik", "Türk Dili ve Edebiyatı", "Tarih", "Coğrafya"],
            ),
            (
                "Sözel",
                &[
                    "Türk Dili ve Edebiyatı",
                    "Tarih",
                    "Coğrafya",
                    "Felsefe",
                    "Din Kültürü ve Ahlak Bilgisi",
                ],
            ),
            ("Dil", &["Yabancı Dil", "Türk Dili ve Edebiyatı"]),
        ];

        Self::new(
            table
                .into_iter()
                .map(|(track, subjects)| {
                    (
                        track.to_string(),
                        subjects.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_core_subjects() {
        let catalog = TrackCatalog::default();

        assert!(catalog.is_core("Sayısal", "Fizik"));
        assert!(!catalog.is_core("Sözel", "Fizik"));
        assert!(catalog.is_core("Dil", "Yabancı Dil"));
        assert_eq!(catalog.core_subjects("Eşit Ağırlık").map(<[String]>::len), Some(4));
    }

    #[test]
    fn test_unknown_track_has_no_core() {
        let catalog = TrackCatalog::default();

        assert!(catalog.core_subjects("Sanat").is_none());
        assert!(!catalog.is_core("Sanat", "Matematik"));
    }
}
