//! Search results and selection kept between command invocations.

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::archive::MAX_SELECTED;
use crate::company::{Company, SelectedCompany, Siren};
use crate::geo::Coordinates;
use crate::ranking::NearbyResult;
use crate::runtime::Runtime;

/// Last search and current selection, stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub point: Option<Coordinates>,
    pub postcode: Option<String>,
    pub naf: Option<String>,
    #[serde(default)]
    pub results: Vec<Company>,
    #[serde(default)]
    pub selected: Vec<Siren>,
}

impl Session {
    /// `~/.bilans/session.json`
    pub fn default_path<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
        let home = runtime
            .home_dir()
            .ok_or_else(|| anyhow!("Could not determine home directory"))?;
        Ok(home.join(".bilans").join("session.json"))
    }

    #[tracing::instrument(skip(runtime, path))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        let session: Session = serde_json::from_str(&content)
            .with_context(|| format!("Corrupted session file {}", path.display()))?;
        Ok(session)
    }

    /// Empty session when the file does not exist yet.
    pub fn load_or_default<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            debug!("No session at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        Self::load(runtime, path)
    }

    #[tracing::instrument(skip(self, runtime, path))]
    pub fn save<R: Runtime + ?Sized>(&self, runtime: &R, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !runtime.exists(parent)
        {
            runtime.create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        runtime.write(path, json.as_bytes())?;
        debug!("Session saved to {}", path.display());
        Ok(())
    }

    /// Replaces the ranked set wholesale; the selection keeps only identifiers
    /// that are still present.
    pub fn replace_results(&mut self, point: Coordinates, naf: Option<String>, found: NearbyResult) {
        self.point = Some(point);
        self.naf = naf;
        self.postcode = Some(found.postcode);
        self.results = found.companies;

        let before = self.selected.len();
        let results = &self.results;
        self.selected
            .retain(|siren| results.iter().any(|c| &c.siren == siren));
        if self.selected.len() < before {
            debug!(
                "Dropped {} selected company(ies) absent from the new results",
                before - self.selected.len()
            );
        }
    }

    /// Replaces the selection with the first [`MAX_SELECTED`] distinct identifiers.
    /// Every identifier must belong to the current results.
    pub fn select(&mut self, sirens: &[Siren]) -> Result<&[Siren]> {
        if let Some(unknown) = sirens.iter().find(|siren| self.find(siren).is_none()) {
            bail!(
                "{} is not part of the current results; run `bilans search` first",
                unknown
            );
        }

        let mut selected: Vec<Siren> = Vec::new();
        for siren in sirens {
            if !selected.contains(siren) {
                selected.push(siren.clone());
            }
        }
        if selected.len() > MAX_SELECTED {
            warn!(
                "{} companies given, keeping the first {}",
                selected.len(),
                MAX_SELECTED
            );
            selected.truncate(MAX_SELECTED);
        }

        self.selected = selected;
        Ok(&self.selected)
    }

    pub fn find(&self, siren: &Siren) -> Option<&Company> {
        self.results.iter().find(|c| &c.siren == siren)
    }

    /// Selected companies in selection order.
    pub fn selected_companies(&self) -> Vec<SelectedCompany> {
        self.selected
            .iter()
            .filter_map(|siren| self.find(siren))
            .map(Company::as_selected)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::company::UNRESOLVED_DISTANCE_KM;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn company(siren: &str, name: &str, distance_km: f64) -> Company {
        Company {
            siren: siren.parse().unwrap(),
            name: name.to_string(),
            address: String::new(),
            locality: "RENNES".to_string(),
            query_address: name.to_string(),
            coordinates: None,
            distance_km,
        }
    }

    fn siren(s: &str) -> Siren {
        s.parse().unwrap()
    }

    fn found(companies: Vec<Company>) -> NearbyResult {
        NearbyResult {
            postcode: "35000".to_string(),
            companies,
        }
    }

    fn session_with(count: usize) -> Session {
        let mut session = Session::default();
        let companies = (1..=count)
            .map(|i| company(&format!("{:09}", i), &format!("C{}", i), i as f64))
            .collect();
        session.replace_results(Coordinates { lat: 48.11, lon: -1.68 }, None, found(companies));
        session
    }

    #[test]
    fn test_select_keeps_first_five_distinct() {
        let mut session = session_with(7);
        let wanted: Vec<Siren> = ["000000001", "000000002", "000000001", "000000003", "000000004", "000000005", "000000006"]
            .iter()
            .map(|s| siren(s))
            .collect();

        let selected = session.select(&wanted).unwrap().to_vec();
        assert_eq!(selected.len(), 5);
        assert_eq!(selected[0], siren("000000001"));
        assert_eq!(selected[4], siren("000000005"));
        assert!(!selected.contains(&siren("000000006")));
    }

    #[test]
    fn test_select_rejects_unknown_identifier() {
        let mut session = session_with(2);
        session.select(&[siren("000000001")]).unwrap();

        let err = session
            .select(&[siren("000000002"), siren("999999999")])
            .unwrap_err();
        assert!(err.to_string().contains("999999999"));
        // Previous selection untouched
        assert_eq!(session.selected, vec![siren("000000001")]);
    }

    #[test]
    fn test_new_search_prunes_selection() {
        let mut session = session_with(3);
        session
            .select(&[siren("000000001"), siren("000000003")])
            .unwrap();

        session.replace_results(
            Coordinates { lat: 45.0, lon: 4.0 },
            Some("56.10A".to_string()),
            found(vec![
                company("000000003", "C3", 0.5),
                company("000000009", "C9", UNRESOLVED_DISTANCE_KM),
            ]),
        );

        assert_eq!(session.selected, vec![siren("000000003")]);
        assert_eq!(session.results.len(), 2);
        assert_eq!(session.naf.as_deref(), Some("56.10A"));
        let chosen = session.selected_companies();
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].name, "C3");
    }

    #[test]
    fn test_save_creates_parent_and_writes_json() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/home/user/.bilans/session.json");
        let parent = PathBuf::from("/home/user/.bilans");

        runtime
            .expect_exists()
            .with(eq(parent.clone()))
            .returning(|_| false);
        runtime
            .expect_create_dir_all()
            .with(eq(parent))
            .times(1)
            .returning(|_| Ok(()));
        runtime
            .expect_write()
            .withf(|p, contents| {
                let json = std::str::from_utf8(contents).unwrap();
                p == Path::new("/home/user/.bilans/session.json")
                    && json.contains("\"postcode\": \"35000\"")
                    && json.contains("\"siren\": \"000000001\"")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        session_with(1).save(&runtime, &path).unwrap();
    }

    #[test]
    fn test_load_or_default_without_file() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        runtime.expect_read_to_string().never();

        let session = Session::load_or_default(&runtime, Path::new("/none.json")).unwrap();
        assert_eq!(session, Session::default());
    }

    #[test]
    fn test_load_round_trips_saved_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let runtime = crate::runtime::RealRuntime;

        let mut session = session_with(2);
        session.select(&[siren("000000002")]).unwrap();
        session.save(&runtime, &path).unwrap();

        let loaded = Session::load_or_default(&runtime, &path).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn test_load_reports_corruption() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("not json".to_string()));

        let err = Session::load(&runtime, Path::new("/s.json")).unwrap_err();
        assert!(err.to_string().contains("Corrupted session file"));
    }

    #[test]
    fn test_default_path_under_home() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_home_dir()
            .returning(|| Some(PathBuf::from("/home/user")));
        assert_eq!(
            Session::default_path(&runtime).unwrap(),
            PathBuf::from("/home/user/.bilans/session.json")
        );
    }
}
