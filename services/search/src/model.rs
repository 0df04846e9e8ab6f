use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Acquisition identifier (one recording session)
pub type AcqId = String;

/// Offset in seconds within an acquisition
pub type Second = i64;

/// A record keyed by (acquisition, second)
pub trait Keyed {
    fn acq_id(&self) -> &str;
    fn sec(&self) -> Second;
}

macro_rules! impl_keyed {
    ($($record:ty),+ $(,)?) => {
        $(
            impl Keyed for $record {
                fn acq_id(&self) -> &str {
                    &self.acq_id
                }

                fn sec(&self) -> Second {
                    self.sec
                }
            }
        )+
    };
}

/// Vehicle telemetry, at most one per (acquisition, second)
///
/// Numeric fields are kept in their stored textual form; matchers parse them
/// and treat unparseable values as non-matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TelemetryRecord {
    pub acq_id: AcqId,
    pub sec: Second,
    /// Vehicle speed (km/h)
    pub speed: Option<String>,
    /// Steering wheel angle (degrees)
    pub steering_angle: Option<String>,
    /// Longitudinal acceleration (m/s²)
    pub accel: Option<String>,
    /// Brake pedal state
    pub brake: Option<String>,
    /// Turn indicator state
    pub turn_signal: Option<String>,
}

/// Lane marking observation, at most one per (acquisition, second)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LaneRecord {
    pub acq_id: AcqId,
    pub sec: Second,
    pub left_marking: Option<String>,
    pub right_marking: Option<String>,
    /// Lane width (m)
    pub width: Option<String>,
    /// Road curvature (1/m)
    pub curvature: Option<String>,
    /// Lateral offset of the vehicle from the lane centre (m)
    pub offset: Option<String>,
}

/// A single object detection; a second may carry any number of them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ObjectDetection {
    pub acq_id: AcqId,
    pub sec: Second,
    pub class: Option<String>,
    pub confidence: Option<String>,
    /// Distance to the ego vehicle (m)
    pub distance: Option<String>,
    /// Position relative to the ego vehicle (left, right, ahead, ...)
    pub position: Option<String>,
}

/// Road and land-use attributes, at most one per (acquisition, second)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RoadRecord {
    pub acq_id: AcqId,
    pub sec: Second,
    pub road_type: Option<String>,
    pub surface: Option<String>,
    pub landuse: Option<String>,
    pub oneway: Option<String>,
    pub maxspeed: Option<String>,
    pub lanes: Option<String>,
}

/// Semantic segmentation coverage ratios, at most one per (acquisition, second)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SegmentationRecord {
    pub acq_id: AcqId,
    pub sec: Second,
    pub road: Option<String>,
    pub sidewalk: Option<String>,
    pub vegetation: Option<String>,
    pub sky: Option<String>,
    pub building: Option<String>,
    pub vehicle: Option<String>,
    pub pedestrian: Option<String>,
}

impl_keyed!(
    TelemetryRecord,
    LaneRecord,
    ObjectDetection,
    RoadRecord,
    SegmentationRecord,
);

/// Media artifact attached to an acquisition
///
/// `sec = None` marks an acquisition-level artifact (video, log bundle, ...).
/// This is also the document shape returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct MediaLink {
    pub acq_id: AcqId,
    pub sec: Option<Second>,
    pub ext: String,
    pub link: String,
}

impl MediaLink {
    pub fn new(acq_id: &str, sec: Option<Second>, ext: &str, link: &str) -> Self {
        Self {
            acq_id: acq_id.to_string(),
            sec,
            ext: ext.to_string(),
            link: link.to_string(),
        }
    }
}

/// Acquisition-level metadata used to resolve the candidate universe
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Acquisition {
    pub acq_id: AcqId,
    pub vehicle: Option<String>,
    pub period: Option<String>,
    pub weather: Option<String>,
    pub country: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_records_expose_key() {
        let detection = ObjectDetection {
            acq_id: "42".to_string(),
            sec: 7,
            class: Some("car".to_string()),
            ..Default::default()
        };

        assert_eq!(detection.acq_id(), "42");
        assert_eq!(detection.sec(), 7);
    }

    #[test]
    fn test_media_link_serializes_null_second() {
        let link = MediaLink::new("7", None, "mp4", "s3://bucket/7/video.mp4");
        let json = serde_json::to_value(&link).unwrap();

        assert_eq!(json["sec"], serde_json::Value::Null);
        assert_eq!(json["acq_id"], "7");
    }
}
