use crate::filters::{
    parse_number, LaneFilter, ObjectFilter, Range, RoadFilter, SegmentationFilter,
    TelemetryFilter,
};
use crate::model::{
    Keyed, LaneRecord, ObjectDetection, RoadRecord, SegmentationRecord, TelemetryRecord,
};
use crate::second_set::SecondSet;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Per-second data modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Telemetry,
    Lane,
    Objects,
    Road,
    Segmentation,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Telemetry => "telemetry",
            Modality::Lane => "lane",
            Modality::Objects => "objects",
            Modality::Road => "road",
            Modality::Segmentation => "segmentation",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical predicate: empty set means unconstrained, missing values never match
pub fn categorical_matches(allowed: &BTreeSet<String>, value: Option<&str>) -> bool {
    if allowed.is_empty() {
        return true;
    }

    value.is_some_and(|v| allowed.contains(&v.trim().to_lowercase()))
}

/// Range OR-list: empty list means unconstrained, unparseable values never match
pub fn ranges_match(ranges: &[Range], value: Option<&str>) -> bool {
    if ranges.is_empty() {
        return true;
    }

    value
        .and_then(parse_number)
        .is_some_and(|v| ranges.iter().any(|range| range.contains(v)))
}

/// Record-level predicate evaluation for one modality
pub trait ModalityFilter {
    type Record: Keyed;

    const MODALITY: Modality;

    fn is_active(&self) -> bool;

    fn matches(&self, record: &Self::Record) -> bool;
}

impl ModalityFilter for TelemetryFilter {
    type Record = TelemetryRecord;

    const MODALITY: Modality = Modality::Telemetry;

    fn is_active(&self) -> bool {
        TelemetryFilter::is_active(self)
    }

    fn matches(&self, record: &TelemetryRecord) -> bool {
        ranges_match(&self.speed, record.speed.as_deref())
            && ranges_match(&self.steering_angle, record.steering_angle.as_deref())
            && ranges_match(&self.accel, record.accel.as_deref())
            && categorical_matches(&self.brake, record.brake.as_deref())
            && categorical_matches(&self.turn_signal, record.turn_signal.as_deref())
    }
}

impl ModalityFilter for LaneFilter {
    type Record = LaneRecord;

    const MODALITY: Modality = Modality::Lane;

    fn is_active(&self) -> bool {
        LaneFilter::is_active(self)
    }

    fn matches(&self, record: &LaneRecord) -> bool {
        categorical_matches(&self.left_marking, record.left_marking.as_deref())
            && categorical_matches(&self.right_marking, record.right_marking.as_deref())
            && ranges_match(&self.width, record.width.as_deref())
            && ranges_match(&self.curvature, record.curvature.as_deref())
            && ranges_match(&self.offset, record.offset.as_deref())
    }
}

impl ModalityFilter for ObjectFilter {
    type Record = ObjectDetection;

    const MODALITY: Modality = Modality::Objects;

    fn is_active(&self) -> bool {
        ObjectFilter::is_active(self)
    }

    /// All predicates hold for this one detection
    fn matches(&self, detection: &ObjectDetection) -> bool {
        categorical_matches(&self.class, detection.class.as_deref())
            && categorical_matches(&self.position, detection.position.as_deref())
            && ranges_match(&self.confidence, detection.confidence.as_deref())
            && ranges_match(&self.distance, detection.distance.as_deref())
    }
}

impl ModalityFilter for RoadFilter {
    type Record = RoadRecord;

    const MODALITY: Modality = Modality::Road;

    fn is_active(&self) -> bool {
        RoadFilter::is_active(self)
    }

    fn matches(&self, record: &RoadRecord) -> bool {
        categorical_matches(&self.road_type, record.road_type.as_deref())
            && categorical_matches(&self.surface, record.surface.as_deref())
            && categorical_matches(&self.landuse, record.landuse.as_deref())
            && categorical_matches(&self.oneway, record.oneway.as_deref())
            && ranges_match(&self.maxspeed, record.maxspeed.as_deref())
            && ranges_match(&self.lanes, record.lanes.as_deref())
    }
}

impl ModalityFilter for SegmentationFilter {
    type Record = SegmentationRecord;

    const MODALITY: Modality = Modality::Segmentation;

    fn is_active(&self) -> bool {
        SegmentationFilter::is_active(self)
    }

    fn matches(&self, record: &SegmentationRecord) -> bool {
        let values = [
            record.road.as_deref(),
            record.sidewalk.as_deref(),
            record.vegetation.as_deref(),
            record.sky.as_deref(),
            record.building.as_deref(),
            record.vehicle.as_deref(),
            record.pedestrian.as_deref(),
        ];

        self.ranges()
            .iter()
            .zip(values)
            .all(|((_, ranges), value)| ranges_match(ranges, value))
    }
}

/// Build the SecondSet of records satisfying `filter`
///
/// Records outside the universe are ignored. Multi-record seconds (object
/// detections) match when any single record matches.
pub fn match_records<F: ModalityFilter>(
    filter: &F,
    records: &[F::Record],
    universe: &HashSet<String>,
) -> SecondSet {
    records
        .iter()
        .filter(|record| universe.contains(record.acq_id()) && filter.matches(record))
        .map(|record| (record.acq_id(), record.sec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::parse_ranges;

    fn universe(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn telemetry(acq: &str, sec: i64, speed: &str) -> TelemetryRecord {
        TelemetryRecord {
            acq_id: acq.to_string(),
            sec,
            speed: Some(speed.to_string()),
            ..Default::default()
        }
    }

    fn detection(acq: &str, sec: i64, class: &str, distance: &str) -> ObjectDetection {
        ObjectDetection {
            acq_id: acq.to_string(),
            sec,
            class: Some(class.to_string()),
            distance: Some(distance.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_speed_range_scenario() {
        let filter = TelemetryFilter {
            speed: parse_ranges(Some("60..80")),
            ..Default::default()
        };
        let records = vec![
            telemetry("A", 10, "55"),
            telemetry("A", 20, "65"),
            telemetry("A", 30, "75"),
        ];

        let set = match_records(&filter, &records, &universe(&["A", "B"]));

        assert_eq!(set.seconds("A"), Some(&BTreeSet::from([20, 30])));
        assert!(set.seconds("B").is_none());
    }

    #[test]
    fn test_unparseable_number_never_matches() {
        let filter = TelemetryFilter {
            speed: parse_ranges(Some("0..")),
            ..Default::default()
        };

        assert!(!filter.matches(&telemetry("A", 1, "n/a")));
        assert!(!filter.matches(&TelemetryRecord::default()));
        assert!(filter.matches(&telemetry("A", 1, " 12.5 ")));
    }

    #[test]
    fn test_or_list_of_ranges() {
        let filter = TelemetryFilter {
            speed: parse_ranges(Some("0..10,100..")),
            ..Default::default()
        };

        assert!(filter.matches(&telemetry("A", 1, "5")));
        assert!(filter.matches(&telemetry("A", 1, "130")));
        assert!(!filter.matches(&telemetry("A", 1, "50")));
    }

    #[test]
    fn test_missing_categorical_never_matches() {
        let filter = RoadFilter {
            surface: BTreeSet::from(["asphalt".to_string()]),
            ..Default::default()
        };

        assert!(!filter.matches(&RoadRecord::default()));
        assert!(filter.matches(&RoadRecord {
            surface: Some("Asphalt".to_string()),
            ..Default::default()
        }));
    }

    #[test]
    fn test_detection_predicates_are_joint() {
        let filter = ObjectFilter {
            class: BTreeSet::from(["pedestrian".to_string()]),
            distance: parse_ranges(Some("..10")),
            ..Default::default()
        };
        // Second 1: a near car and a far pedestrian, no single detection matches
        // Second 2: a near pedestrian
        let records = vec![
            detection("A", 1, "car", "5"),
            detection("A", 1, "pedestrian", "40"),
            detection("A", 2, "car", "50"),
            detection("A", 2, "pedestrian", "8"),
        ];

        let set = match_records(&filter, &records, &universe(&["A"]));
        assert_eq!(set.seconds("A"), Some(&BTreeSet::from([2])));
    }

    #[test]
    fn test_records_outside_universe_ignored() {
        let filter = TelemetryFilter {
            speed: parse_ranges(Some("0..")),
            ..Default::default()
        };
        let records = vec![telemetry("A", 1, "10"), telemetry("Z", 1, "10")];

        let set = match_records(&filter, &records, &universe(&["A"]));
        assert_eq!(set.len(), 1);
        assert!(set.seconds("Z").is_none());
    }

    #[test]
    fn test_segmentation_fields_checked_independently() {
        let filter = SegmentationFilter {
            sky: parse_ranges(Some("0.3..")),
            vegetation: parse_ranges(Some("..0.1")),
            ..Default::default()
        };
        let record = SegmentationRecord {
            sky: Some("0.45".to_string()),
            vegetation: Some("0.05".to_string()),
            ..Default::default()
        };

        assert!(filter.matches(&record));
        assert!(!filter.matches(&SegmentationRecord {
            vegetation: Some("0.2".to_string()),
            ..record
        }));
    }

    #[test]
    fn test_modality_names() {
        assert_eq!(<TelemetryFilter as ModalityFilter>::MODALITY.as_str(), "telemetry");
        assert_eq!(Modality::Segmentation.to_string(), "segmentation");
    }
}
