//! Per-user profile, medical history and analysis history storage.
//!
//! Each user owns a sharded directory under `<data_dir>/users/`:
//!
//! ```text
//! users/55/0e/550e8400e29b41d4a716446655440000/
//!   profile.yaml
//!   medical_history.yaml
//!   analyses/
//!     20260105T101500.000000Z-<id>.json
//! ```
//!
//! Profile and medical history files are overwritten on update. Analysis records are written
//! once, staged in a temporary file and linked into place without replacing an existing
//! record.

use crate::body_part::BodyPart;
use crate::constants::{
    ANALYSES_DIR_NAME, IMAGE_PREVIEW_CHARS, MEDICAL_HISTORY_FILENAME, PROFILE_FILENAME,
    USERS_DIR_NAME,
};
use crate::finding::AnalysisResult;
use crate::user_id::UserId;
use crate::{StoreError, StoreResult};
use api_shared::wire;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Uuid;
use vdd_types::NonEmptyText;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            full_name: String::new(),
            phone_number: String::new(),
            updated_at: None,
        }
    }
}

/// Free-text medical history fields, all optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalHistoryFields {
    #[serde(default)]
    pub known_conditions: String,
    #[serde(default)]
    pub current_medications: String,
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub family_history: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalHistory {
    pub user_id: UserId,
    #[serde(flatten)]
    pub fields: MedicalHistoryFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One completed analysis, as kept in the user's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisHistoryRecord {
    pub id: String,
    pub user_id: UserId,
    pub body_part: BodyPart,
    /// First [`IMAGE_PREVIEW_CHARS`] characters of the submitted data URI.
    pub image_preview: String,
    pub analysis_result: AnalysisResult,
    pub created_at: DateTime<Utc>,
}

impl AnalysisHistoryRecord {
    pub fn new(
        user_id: UserId,
        body_part: BodyPart,
        image: &NonEmptyText,
        analysis_result: AnalysisResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            user_id,
            body_part,
            image_preview: image.prefix(IMAGE_PREVIEW_CHARS).to_string(),
            analysis_result,
            created_at: Utc::now(),
        }
    }

    fn file_name(&self) -> String {
        format!(
            "{}-{}.json",
            self.created_at.format("%Y%m%dT%H%M%S%.6fZ"),
            self.id
        )
    }
}

/// Storage for user-owned records.
///
/// Methods are blocking; async callers go through `spawn_blocking`.
pub trait ProfileStore: Send + Sync {
    /// Returns the stored profile, or an empty one if none has been saved.
    fn profile(&self, user: &UserId) -> StoreResult<UserProfile>;

    fn update_profile(
        &self,
        user: &UserId,
        full_name: String,
        phone_number: String,
    ) -> StoreResult<UserProfile>;

    /// Returns the stored medical history, or empty fields if none has been saved.
    fn medical_history(&self, user: &UserId) -> StoreResult<MedicalHistory>;

    fn upsert_medical_history(
        &self,
        user: &UserId,
        fields: MedicalHistoryFields,
    ) -> StoreResult<MedicalHistory>;

    fn append_analysis(&self, record: &AnalysisHistoryRecord) -> StoreResult<()>;

    /// Returns the user's analyses, newest first.
    fn list_analyses(&self, user: &UserId) -> StoreResult<Vec<AnalysisHistoryRecord>>;
}

/// [`ProfileStore`] backed by YAML and JSON files on the local filesystem.
#[derive(Clone, Debug)]
pub struct FileProfileStore {
    users_dir: PathBuf,
}

impl FileProfileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            users_dir: data_dir.as_ref().join(USERS_DIR_NAME),
        }
    }

    fn user_dir(&self, user: &UserId) -> PathBuf {
        user.sharded_dir(&self.users_dir)
    }

    fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> StoreResult<Option<T>> {
        match fs::read_to_string(path) {
            Ok(yaml) => serde_yaml::from_str(&yaml)
                .map(Some)
                .map_err(StoreError::YamlDeserialization),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::FileRead(e)),
        }
    }

    fn write_yaml<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::DirCreation)?;
        }
        let yaml = serde_yaml::to_string(value).map_err(StoreError::YamlSerialization)?;
        fs::write(path, yaml).map_err(StoreError::FileWrite)
    }
}

impl ProfileStore for FileProfileStore {
    fn profile(&self, user: &UserId) -> StoreResult<UserProfile> {
        let path = self.user_dir(user).join(PROFILE_FILENAME);
        Ok(Self::read_yaml(&path)?.unwrap_or_else(|| UserProfile::empty(*user)))
    }

    fn update_profile(
        &self,
        user: &UserId,
        full_name: String,
        phone_number: String,
    ) -> StoreResult<UserProfile> {
        let profile = UserProfile {
            user_id: *user,
            full_name: full_name.trim().to_string(),
            phone_number: phone_number.trim().to_string(),
            updated_at: Some(Utc::now()),
        };
        Self::write_yaml(&self.user_dir(user).join(PROFILE_FILENAME), &profile)?;
        debug!(user = %user, "profile updated");
        Ok(profile)
    }

    fn medical_history(&self, user: &UserId) -> StoreResult<MedicalHistory> {
        let path = self.user_dir(user).join(MEDICAL_HISTORY_FILENAME);
        Ok(Self::read_yaml(&path)?.unwrap_or_else(|| MedicalHistory {
            user_id: *user,
            fields: MedicalHistoryFields::default(),
            updated_at: None,
        }))
    }

    fn upsert_medical_history(
        &self,
        user: &UserId,
        fields: MedicalHistoryFields,
    ) -> StoreResult<MedicalHistory> {
        let history = MedicalHistory {
            user_id: *user,
            fields,
            updated_at: Some(Utc::now()),
        };
        Self::write_yaml(&self.user_dir(user).join(MEDICAL_HISTORY_FILENAME), &history)?;
        debug!(user = %user, "medical history saved");
        Ok(history)
    }

    fn append_analysis(&self, record: &AnalysisHistoryRecord) -> StoreResult<()> {
        let dir = self.user_dir(&record.user_id).join(ANALYSES_DIR_NAME);
        fs::create_dir_all(&dir).map_err(StoreError::DirCreation)?;

        let json = serde_json::to_string_pretty(record).map_err(StoreError::Serialization)?;
        let path = dir.join(record.file_name());

        // Stage under a dot-name so a partial write is never listed; dropped on failure.
        let mut staged = NamedTempFile::new_in(&dir).map_err(StoreError::FileWrite)?;
        staged
            .write_all(json.as_bytes())
            .map_err(StoreError::FileWrite)?;
        staged
            .persist_noclobber(&path)
            .map_err(|e| match e.error.kind() {
                ErrorKind::AlreadyExists => StoreError::RecordExists(record.id.clone()),
                _ => StoreError::FileWrite(e.error),
            })?;

        debug!(user = %record.user_id, id = %record.id, "analysis recorded");
        Ok(())
    }

    fn list_analyses(&self, user: &UserId) -> StoreResult<Vec<AnalysisHistoryRecord>> {
        let dir = self.user_dir(user).join(ANALYSES_DIR_NAME);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::FileRead(e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry.map_err(StoreError::FileRead)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let json = fs::read_to_string(&path).map_err(StoreError::FileRead)?;
            match serde_json::from_str::<AnalysisHistoryRecord>(&json) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable analysis record"),
            }
        }

        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }
}

impl From<&UserProfile> for wire::ProfileRes {
    fn from(p: &UserProfile) -> Self {
        wire::ProfileRes {
            user_id: p.user_id.to_string(),
            full_name: p.full_name.clone(),
            phone_number: p.phone_number.clone(),
            updated_at: p.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl From<&MedicalHistory> for wire::MedicalHistoryRes {
    fn from(h: &MedicalHistory) -> Self {
        wire::MedicalHistoryRes {
            user_id: h.user_id.to_string(),
            known_conditions: h.fields.known_conditions.clone(),
            current_medications: h.fields.current_medications.clone(),
            allergies: h.fields.allergies.clone(),
            family_history: h.fields.family_history.clone(),
            notes: h.fields.notes.clone(),
            updated_at: h.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl From<wire::UpsertMedicalHistoryReq> for MedicalHistoryFields {
    fn from(req: wire::UpsertMedicalHistoryReq) -> Self {
        MedicalHistoryFields {
            known_conditions: req.known_conditions,
            current_medications: req.current_medications,
            allergies: req.allergies,
            family_history: req.family_history,
            notes: req.notes,
        }
    }
}

impl From<&AnalysisHistoryRecord> for wire::AnalysisHistoryRes {
    fn from(r: &AnalysisHistoryRecord) -> Self {
        wire::AnalysisHistoryRes {
            id: r.id.clone(),
            user_id: r.user_id.to_string(),
            body_part: r.body_part.as_str().to_string(),
            image_preview: r.image_preview.clone(),
            analysis_result: (&r.analysis_result).into(),
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::DeficiencyFinding;
    use chrono::Duration;
    use tempfile::TempDir;

    fn user() -> UserId {
        UserId::parse("550e8400e29b41d4a716446655440000").unwrap()
    }

    fn result(vitamin: &str) -> AnalysisResult {
        AnalysisResult {
            deficiencies: vec![DeficiencyFinding {
                vitamin: vitamin.into(),
                confidence: 60.0,
                severity: None,
                signs: vec![],
                recommendations: vec![],
                description: None,
            }],
            overall_health: "Some concern".into(),
        }
    }

    fn image() -> NonEmptyText {
        NonEmptyText::new(format!("data:image/jpeg;base64,{}", "A".repeat(500))).unwrap()
    }

    #[test]
    fn missing_profile_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileProfileStore::new(tmp.path());

        let profile = store.profile(&user()).unwrap();
        assert_eq!(profile.user_id, user());
        assert!(profile.full_name.is_empty());
        assert!(profile.updated_at.is_none());
    }

    #[test]
    fn profile_update_is_persisted_in_sharded_dir() {
        let tmp = TempDir::new().unwrap();
        let store = FileProfileStore::new(tmp.path());

        store
            .update_profile(&user(), " Ada Lovelace ".into(), "0123".into())
            .unwrap();

        let expected = tmp
            .path()
            .join("users/55/0e/550e8400e29b41d4a716446655440000/profile.yaml");
        assert!(expected.is_file());

        let profile = store.profile(&user()).unwrap();
        assert_eq!(profile.full_name, "Ada Lovelace");
        assert_eq!(profile.phone_number, "0123");
        assert!(profile.updated_at.is_some());
    }

    #[test]
    fn medical_history_upsert_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = FileProfileStore::new(tmp.path());

        store
            .upsert_medical_history(
                &user(),
                MedicalHistoryFields {
                    allergies: "penicillin".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .upsert_medical_history(
                &user(),
                MedicalHistoryFields {
                    notes: "vegetarian".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        let history = store.medical_history(&user()).unwrap();
        assert_eq!(history.fields.notes, "vegetarian");
        assert!(history.fields.allergies.is_empty());
    }

    #[test]
    fn record_truncates_image_preview() {
        let record = AnalysisHistoryRecord::new(user(), BodyPart::Nails, &image(), result("C"));
        assert_eq!(record.image_preview.chars().count(), IMAGE_PREVIEW_CHARS);
        assert!(record.image_preview.starts_with("data:image/jpeg;base64,"));
        assert_eq!(record.id.len(), 32);
    }

    #[test]
    fn analyses_are_listed_newest_first() {
        let tmp = TempDir::new().unwrap();
        let store = FileProfileStore::new(tmp.path());

        let mut older = AnalysisHistoryRecord::new(user(), BodyPart::Eyes, &image(), result("A"));
        older.created_at = Utc::now() - Duration::minutes(5);
        let newer = AnalysisHistoryRecord::new(user(), BodyPart::Nails, &image(), result("C"));

        store.append_analysis(&older).unwrap();
        store.append_analysis(&newer).unwrap();

        let listed = store.list_analyses(&user()).unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, [newer.id.as_str(), older.id.as_str()]);
        assert_eq!(listed[1].analysis_result, older.analysis_result);
    }

    #[test]
    fn analysis_records_are_never_overwritten() {
        let tmp = TempDir::new().unwrap();
        let store = FileProfileStore::new(tmp.path());
        let record = AnalysisHistoryRecord::new(user(), BodyPart::Skin, &image(), result("E"));

        store.append_analysis(&record).unwrap();
        let err = store.append_analysis(&record).unwrap_err();
        assert!(matches!(err, StoreError::RecordExists(id) if id == record.id));
    }

    #[test]
    fn refused_append_leaves_no_partial_files() {
        let tmp = TempDir::new().unwrap();
        let store = FileProfileStore::new(tmp.path());
        let record = AnalysisHistoryRecord::new(user(), BodyPart::Eyes, &image(), result("A"));

        store.append_analysis(&record).unwrap();
        assert!(store.append_analysis(&record).is_err());

        let dir = user()
            .sharded_dir(&tmp.path().join(USERS_DIR_NAME))
            .join(ANALYSES_DIR_NAME);
        let names: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, [record.file_name()]);

        let stored = fs::read_to_string(dir.join(record.file_name())).unwrap();
        let parsed: AnalysisHistoryRecord = serde_json::from_str(&stored).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn unreadable_records_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = FileProfileStore::new(tmp.path());
        let record = AnalysisHistoryRecord::new(user(), BodyPart::Tongue, &image(), result("B"));
        store.append_analysis(&record).unwrap();

        let dir = user()
            .sharded_dir(&tmp.path().join(USERS_DIR_NAME))
            .join(ANALYSES_DIR_NAME);
        fs::write(dir.join("garbage.json"), "{not json").unwrap();

        let listed = store.list_analyses(&user()).unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn user_without_history_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = FileProfileStore::new(tmp.path());
        assert!(store.list_analyses(&user()).unwrap().is_empty());
    }

    #[test]
    fn history_record_converts_to_wire() {
        let record = AnalysisHistoryRecord::new(user(), BodyPart::Nails, &image(), result("C"));
        let res = wire::AnalysisHistoryRes::from(&record);
        assert_eq!(res.body_part, "nails");
        assert_eq!(res.user_id, "550e8400e29b41d4a716446655440000");
        assert_eq!(res.analysis_result.deficiencies[0].vitamin, "C");
    }
}
