//! Restore point metadata and its persistence codec.
//!
//! Metadata rows are persisted as JSON text. Rows written by older builds, by
//! a process that crashed mid-write, or damaged on disk must never take down
//! listing or retention, so decoding goes through [`Metadata::parse`], which
//! salvages what it can and substitutes defaults for the rest. The worst
//! outcome for a damaged row is being treated as a manual restore point (and
//! therefore kept).

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::asset::AssetId;
use crate::restore_point::RestorePointKind;
use crate::temporal::UnixSeconds;
use crate::thumbnail::{DEFAULT_STAGE_HEIGHT, DEFAULT_STAGE_WIDTH};

/// Title used when a record has none.
pub const UNKNOWN_TITLE: &str = "?";

/// Per-restore-point record stored in the metadata table.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Project title; also the retention group key.
    pub title: String,
    pub created: UnixSeconds,
    #[serde(rename = "type")]
    pub kind: RestorePointKind,
    /// Size of the project JSON in bytes.
    pub project_size: u64,
    pub thumbnail_size: u64,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    /// Every asset this snapshot depends on, with its size in bytes.
    pub assets: BTreeMap<AssetId, u64>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: UNKNOWN_TITLE.to_string(),
            created: UnixSeconds::zero(),
            kind: RestorePointKind::Manual,
            project_size: 0,
            thumbnail_size: 0,
            thumbnail_width: DEFAULT_STAGE_WIDTH,
            thumbnail_height: DEFAULT_STAGE_HEIGHT,
            assets: BTreeMap::new(),
        }
    }
}

impl Metadata {
    /// Decode an untrusted persisted record. Never fails.
    pub fn parse(raw: &Value) -> Self {
        let empty = Map::new();
        let obj = raw.as_object().unwrap_or(&empty);
        let defaults = Self::default();

        let title = match obj.get("title") {
            Some(Value::String(s)) => s.clone(),
            _ => defaults.title,
        };
        let created = obj
            .get("created")
            .and_then(as_seconds)
            .map(UnixSeconds)
            .unwrap_or(defaults.created);
        let kind = obj
            .get("type")
            .and_then(Value::as_i64)
            .and_then(|code| RestorePointKind::from_code(code).ok())
            .unwrap_or(defaults.kind);

        let project_size = obj
            .get("projectSize")
            .and_then(as_byte_count)
            .unwrap_or(defaults.project_size);
        let thumbnail_size = obj
            .get("thumbnailSize")
            .and_then(as_byte_count)
            .unwrap_or(defaults.thumbnail_size);
        let thumbnail_width = obj
            .get("thumbnailWidth")
            .and_then(as_dimension)
            .unwrap_or(defaults.thumbnail_width);
        let thumbnail_height = obj
            .get("thumbnailHeight")
            .and_then(as_dimension)
            .unwrap_or(defaults.thumbnail_height);

        let assets = match obj.get("assets") {
            Some(Value::Object(entries)) => entries
                .iter()
                .filter_map(|(id, size)| {
                    let size = as_byte_count(size)?;
                    let id = AssetId::new(id.as_str()).ok()?;
                    Some((id, size))
                })
                .collect(),
            _ => defaults.assets,
        };

        Self {
            title,
            created,
            kind,
            project_size,
            thumbnail_size,
            thumbnail_width,
            thumbnail_height,
            assets,
        }
    }

    /// Decode persisted JSON text; unparseable text yields the defaults.
    pub fn parse_str(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::parse(&value),
            Err(_) => Self::default(),
        }
    }

    /// Encode into the persisted JSON form.
    pub fn to_json(&self) -> Value {
        // Every field is a plain string, integer or string-keyed map.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    /// Bytes attributed to this restore point alone (project + thumbnail).
    pub fn own_size(&self) -> u64 {
        self.project_size.saturating_add(self.thumbnail_size)
    }
}

fn as_seconds(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f.trunc() as i64)
}

fn as_byte_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && *f >= 0.0)
        .map(|f| f.trunc() as u64)
}

fn as_dimension(value: &Value) -> Option<u32> {
    as_byte_count(value).and_then(|n| u32::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample() -> Metadata {
        let mut assets = BTreeMap::new();
        assets.insert(AssetId::new("a.png").unwrap(), 100);
        assets.insert(AssetId::new("b.wav").unwrap(), 2048);
        Metadata {
            title: "Project".into(),
            created: UnixSeconds(1_700_000_000),
            kind: RestorePointKind::Automatic,
            project_size: 512,
            thumbnail_size: 64,
            thumbnail_width: 640,
            thumbnail_height: 360,
            assets,
        }
    }

    #[test]
    fn persisted_form_uses_camel_case_keys() {
        let json = sample().to_json();
        assert_eq!(json["type"], json!(0));
        assert_eq!(json["projectSize"], json!(512));
        assert_eq!(json["thumbnailWidth"], json!(640));
        assert_eq!(json["assets"]["b.wav"], json!(2048));
    }

    #[test]
    fn parse_reads_back_encoded_record() {
        let original = sample();
        assert_eq!(Metadata::parse_str(&original.to_json_string()), original);
    }

    #[test]
    fn non_object_yields_defaults() {
        for raw in [json!(null), json!(3), json!("text"), json!([1, 2])] {
            assert_eq!(Metadata::parse(&raw), Metadata::default());
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let m = Metadata::default();
        assert_eq!(m.title, "?");
        assert_eq!(m.created, UnixSeconds(0));
        assert_eq!(m.kind, RestorePointKind::Manual);
        assert_eq!(m.project_size, 0);
        assert_eq!(m.thumbnail_size, 0);
        assert_eq!((m.thumbnail_width, m.thumbnail_height), (480, 360));
        assert!(m.assets.is_empty());
    }

    #[test]
    fn wrong_types_fall_back_per_field() {
        let raw = json!({
            "title": 42,
            "created": "yesterday",
            "type": 7,
            "projectSize": -3,
            "thumbnailSize": 10,
            "thumbnailWidth": "wide",
            "thumbnailHeight": 200,
            "assets": "none"
        });
        let m = Metadata::parse(&raw);
        assert_eq!(m.title, "?");
        assert_eq!(m.created, UnixSeconds(0));
        assert_eq!(m.kind, RestorePointKind::Manual);
        assert_eq!(m.project_size, 0);
        assert_eq!(m.thumbnail_size, 10);
        assert_eq!(m.thumbnail_width, 480);
        assert_eq!(m.thumbnail_height, 200);
        assert!(m.assets.is_empty());
    }

    #[test]
    fn asset_entries_without_byte_counts_are_dropped() {
        let raw = json!({
            "assets": {
                "keep.png": 10,
                "float.svg": 12.0,
                "text.png": "10",
                "null.wav": null,
                "neg.png": -1,
                "bad/name.png": 5
            }
        });
        let m = Metadata::parse(&raw);
        let ids: Vec<&str> = m.assets.keys().map(AssetId::as_str).collect();
        assert_eq!(ids, vec!["float.svg", "keep.png"]);
        assert_eq!(m.assets[&AssetId::new("float.svg").unwrap()], 12);
    }

    #[test]
    fn float_created_is_truncated() {
        let m = Metadata::parse(&json!({ "created": 1234.9, "type": 0 }));
        assert_eq!(m.created, UnixSeconds(1234));
        assert_eq!(m.kind, RestorePointKind::Automatic);
    }

    #[test]
    fn garbage_text_yields_defaults() {
        assert_eq!(Metadata::parse_str("{not json"), Metadata::default());
        assert_eq!(Metadata::parse_str(""), Metadata::default());
    }

    #[test]
    fn own_size_saturates() {
        let m = Metadata {
            project_size: u64::MAX,
            thumbnail_size: 1,
            ..Metadata::default()
        };
        assert_eq!(m.own_size(), u64::MAX);
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            any::<f64>().prop_map(|f| json!(f)),
            "[a-z./]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map(
                    prop_oneof![
                        Just("title".to_string()),
                        Just("created".to_string()),
                        Just("type".to_string()),
                        Just("assets".to_string()),
                        Just("projectSize".to_string()),
                        "[a-z.]{1,6}",
                    ],
                    inner,
                    0..6
                )
                .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn parse_never_panics_and_is_stable(raw in arb_json()) {
            let parsed = Metadata::parse(&raw);
            // Re-parsing the encoded form is a fixed point.
            prop_assert_eq!(Metadata::parse(&parsed.to_json()), parsed);
        }
    }
}
