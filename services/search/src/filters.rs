use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::groups::{GroupTable, LANE_MARKING, OBJECT_CLASS, ROAD_CLASS, SURFACE};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

/// Raw query parameters, one optional field per recognized facet
///
/// Unknown keys are rejected during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSearchParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub ext: Option<String>,

    #[serde(rename = "acq.ids")]
    pub acq_ids: Option<String>,
    #[serde(rename = "acq.vehicle")]
    pub acq_vehicle: Option<String>,
    #[serde(rename = "acq.period")]
    pub acq_period: Option<String>,
    #[serde(rename = "acq.weather")]
    pub acq_weather: Option<String>,
    #[serde(rename = "acq.country")]
    pub acq_country: Option<String>,

    #[serde(rename = "telemetry.speed")]
    pub telemetry_speed: Option<String>,
    #[serde(rename = "telemetry.steering_angle")]
    pub telemetry_steering_angle: Option<String>,
    #[serde(rename = "telemetry.accel")]
    pub telemetry_accel: Option<String>,
    #[serde(rename = "telemetry.brake")]
    pub telemetry_brake: Option<String>,
    #[serde(rename = "telemetry.turn_signal")]
    pub telemetry_turn_signal: Option<String>,

    #[serde(rename = "lane.left_marking")]
    pub lane_left_marking: Option<String>,
    #[serde(rename = "lane.right_marking")]
    pub lane_right_marking: Option<String>,
    #[serde(rename = "lane.width")]
    pub lane_width: Option<String>,
    #[serde(rename = "lane.curvature")]
    pub lane_curvature: Option<String>,
    #[serde(rename = "lane.offset")]
    pub lane_offset: Option<String>,

    #[serde(rename = "objects.class")]
    pub objects_class: Option<String>,
    #[serde(rename = "objects.position")]
    pub objects_position: Option<String>,
    #[serde(rename = "objects.confidence")]
    pub objects_confidence: Option<String>,
    #[serde(rename = "objects.distance")]
    pub objects_distance: Option<String>,

    #[serde(rename = "road.type")]
    pub road_type: Option<String>,
    #[serde(rename = "road.surface")]
    pub road_surface: Option<String>,
    #[serde(rename = "road.landuse")]
    pub road_landuse: Option<String>,
    #[serde(rename = "road.oneway")]
    pub road_oneway: Option<String>,
    #[serde(rename = "road.maxspeed")]
    pub road_maxspeed: Option<String>,
    #[serde(rename = "road.lanes")]
    pub road_lanes: Option<String>,

    #[serde(rename = "seg.road")]
    pub seg_road: Option<String>,
    #[serde(rename = "seg.sidewalk")]
    pub seg_sidewalk: Option<String>,
    #[serde(rename = "seg.vegetation")]
    pub seg_vegetation: Option<String>,
    #[serde(rename = "seg.sky")]
    pub seg_sky: Option<String>,
    #[serde(rename = "seg.building")]
    pub seg_building: Option<String>,
    #[serde(rename = "seg.vehicle")]
    pub seg_vehicle: Option<String>,
    #[serde(rename = "seg.pedestrian")]
    pub seg_pedestrian: Option<String>,
}

/// Inclusive numeric range; a missing bound is unbounded on that side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub lo: Option<f64>,
    pub hi: Option<f64>,
}

impl Range {
    pub fn contains(&self, value: f64) -> bool {
        self.lo.map_or(true, |lo| value >= lo) && self.hi.map_or(true, |hi| value <= hi)
    }

    fn echo(&self) -> Value {
        json!([self.lo, self.hi])
    }
}

/// Parse a stored or requested number; non-finite values never parse
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a `lo..hi` token
///
/// Either side may be empty. A bare number is the single-value range
/// `n..n`. Tokens with no parseable bound yield `None`.
pub fn parse_range(token: &str) -> Option<Range> {
    let token = token.trim();

    let (lo, hi) = match token.split_once("..") {
        Some((lo, hi)) => (parse_number(lo), parse_number(hi)),
        None => {
            let value = parse_number(token);
            (value, value)
        }
    };

    if lo.is_none() && hi.is_none() {
        return None;
    }

    Some(Range { lo, hi })
}

/// Comma-split, trim, drop empty tokens
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// OR-list of ranges; unparseable tokens are dropped
pub fn parse_ranges(raw: Option<&str>) -> Vec<Range> {
    split_list(raw)
        .iter()
        .filter_map(|token| parse_range(token))
        .collect()
}

/// Lower-cased categorical set
pub fn parse_categories(raw: Option<&str>) -> BTreeSet<String> {
    split_list(raw)
        .into_iter()
        .map(|token| token.to_lowercase())
        .collect()
}

/// Lower-cased categorical set with group tokens expanded
pub fn parse_grouped(raw: Option<&str>, table: &GroupTable) -> BTreeSet<String> {
    parse_categories(raw)
        .iter()
        .flat_map(|token| table.expand(token))
        .collect()
}

/// Telemetry predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryFilter {
    pub speed: Vec<Range>,
    pub steering_angle: Vec<Range>,
    pub accel: Vec<Range>,
    pub brake: BTreeSet<String>,
    pub turn_signal: BTreeSet<String>,
}

/// Lane marking predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaneFilter {
    pub left_marking: BTreeSet<String>,
    pub right_marking: BTreeSet<String>,
    pub width: Vec<Range>,
    pub curvature: Vec<Range>,
    pub offset: Vec<Range>,
}

/// Object detection predicates, evaluated jointly per detection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectFilter {
    pub class: BTreeSet<String>,
    pub position: BTreeSet<String>,
    pub confidence: Vec<Range>,
    pub distance: Vec<Range>,
}

/// Road and land-use predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadFilter {
    pub road_type: BTreeSet<String>,
    pub surface: BTreeSet<String>,
    pub landuse: BTreeSet<String>,
    pub oneway: BTreeSet<String>,
    pub maxspeed: Vec<Range>,
    pub lanes: Vec<Range>,
}

/// Segmentation coverage predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentationFilter {
    pub road: Vec<Range>,
    pub sidewalk: Vec<Range>,
    pub vegetation: Vec<Range>,
    pub sky: Vec<Range>,
    pub building: Vec<Range>,
    pub vehicle: Vec<Range>,
    pub pedestrian: Vec<Range>,
}

/// Acquisition-level facets handed to the universe resolver
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquisitionFacets {
    pub ids: BTreeSet<String>,
    pub vehicle: BTreeSet<String>,
    pub period: BTreeSet<String>,
    pub weather: BTreeSet<String>,
    pub country: BTreeSet<String>,
}

/// Per-modality predicates of one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub telemetry: TelemetryFilter,
    pub lane: LaneFilter,
    pub objects: ObjectFilter,
    pub road: RoadFilter,
    pub segmentation: SegmentationFilter,
}

/// A fully normalized search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub page: u32,
    pub per_page: u32,
    /// Allowed media extensions, lower-case without leading dot
    pub extensions: Vec<String>,
    pub facets: AcquisitionFacets,
    pub filters: FilterSpec,
}

impl TelemetryFilter {
    pub fn is_active(&self) -> bool {
        !(self.speed.is_empty()
            && self.steering_angle.is_empty()
            && self.accel.is_empty()
            && self.brake.is_empty()
            && self.turn_signal.is_empty())
    }
}

impl LaneFilter {
    pub fn is_active(&self) -> bool {
        !(self.left_marking.is_empty()
            && self.right_marking.is_empty()
            && self.width.is_empty()
            && self.curvature.is_empty()
            && self.offset.is_empty())
    }
}

impl ObjectFilter {
    pub fn is_active(&self) -> bool {
        !(self.class.is_empty()
            && self.position.is_empty()
            && self.confidence.is_empty()
            && self.distance.is_empty())
    }
}

impl RoadFilter {
    pub fn is_active(&self) -> bool {
        !(self.road_type.is_empty()
            && self.surface.is_empty()
            && self.landuse.is_empty()
            && self.oneway.is_empty()
            && self.maxspeed.is_empty()
            && self.lanes.is_empty())
    }
}

impl SegmentationFilter {
    pub fn is_active(&self) -> bool {
        self.ranges().iter().any(|(_, ranges)| !ranges.is_empty())
    }

    /// Field name and ranges, in a fixed order
    pub fn ranges(&self) -> [(&'static str, &[Range]); 7] {
        [
            ("road", self.road.as_slice()),
            ("sidewalk", self.sidewalk.as_slice()),
            ("vegetation", self.vegetation.as_slice()),
            ("sky", self.sky.as_slice()),
            ("building", self.building.as_slice()),
            ("vehicle", self.vehicle.as_slice()),
            ("pedestrian", self.pedestrian.as_slice()),
        ]
    }
}

impl FilterSpec {
    /// True when at least one modality carries a predicate
    pub fn is_active(&self) -> bool {
        self.telemetry.is_active()
            || self.lane.is_active()
            || self.objects.is_active()
            || self.road.is_active()
            || self.segmentation.is_active()
    }
}

/// Parse an integer parameter, saturating values outside the `i64` range
fn parse_integer(param: &str, raw: Option<&str>) -> Result<Option<i64>, SearchError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };

    let digits = raw.strip_prefix(|c| c == '+' || c == '-').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SearchError::invalid(
            param,
            format!("expected an integer, got '{raw}'"),
        ));
    }

    let saturated = if raw.starts_with('-') { i64::MIN } else { i64::MAX };
    Ok(Some(raw.parse::<i64>().unwrap_or(saturated)))
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

/// Normalize raw parameters into a typed request
pub fn normalize(
    raw: &RawSearchParams,
    settings: &SearchConfig,
) -> Result<SearchRequest, SearchError> {
    let page = parse_integer("page", raw.page.as_deref())?.unwrap_or(1);
    if page < 1 {
        return Err(SearchError::invalid("page", "must be at least 1"));
    }
    // Pages past the last one are empty, never an error
    let page = u32::try_from(page).unwrap_or(u32::MAX);

    let max_per_page = settings.max_per_page.max(1);
    let per_page = parse_integer("per_page", raw.per_page.as_deref())?
        .unwrap_or(i64::from(settings.default_per_page))
        .clamp(1, i64::from(max_per_page)) as u32;

    let mut extensions: Vec<String> = split_list(raw.ext.as_deref())
        .iter()
        .map(|ext| normalize_extension(ext))
        .filter(|ext| !ext.is_empty())
        .collect();
    if extensions.is_empty() {
        extensions = settings
            .default_extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .collect();
    }
    extensions.sort();
    extensions.dedup();

    let facets = AcquisitionFacets {
        ids: split_list(raw.acq_ids.as_deref()).into_iter().collect(),
        vehicle: parse_categories(raw.acq_vehicle.as_deref()),
        period: parse_categories(raw.acq_period.as_deref()),
        weather: parse_categories(raw.acq_weather.as_deref()),
        country: parse_categories(raw.acq_country.as_deref()),
    };

    let filters = FilterSpec {
        telemetry: TelemetryFilter {
            speed: parse_ranges(raw.telemetry_speed.as_deref()),
            steering_angle: parse_ranges(raw.telemetry_steering_angle.as_deref()),
            accel: parse_ranges(raw.telemetry_accel.as_deref()),
            brake: parse_categories(raw.telemetry_brake.as_deref()),
            turn_signal: parse_categories(raw.telemetry_turn_signal.as_deref()),
        },
        lane: LaneFilter {
            left_marking: parse_grouped(raw.lane_left_marking.as_deref(), &LANE_MARKING),
            right_marking: parse_grouped(raw.lane_right_marking.as_deref(), &LANE_MARKING),
            width: parse_ranges(raw.lane_width.as_deref()),
            curvature: parse_ranges(raw.lane_curvature.as_deref()),
            offset: parse_ranges(raw.lane_offset.as_deref()),
        },
        objects: ObjectFilter {
            class: parse_grouped(raw.objects_class.as_deref(), &OBJECT_CLASS),
            position: parse_categories(raw.objects_position.as_deref()),
            confidence: parse_ranges(raw.objects_confidence.as_deref()),
            distance: parse_ranges(raw.objects_distance.as_deref()),
        },
        road: RoadFilter {
            road_type: parse_grouped(raw.road_type.as_deref(), &ROAD_CLASS),
            surface: parse_grouped(raw.road_surface.as_deref(), &SURFACE),
            landuse: parse_categories(raw.road_landuse.as_deref()),
            oneway: parse_categories(raw.road_oneway.as_deref()),
            maxspeed: parse_ranges(raw.road_maxspeed.as_deref()),
            lanes: parse_ranges(raw.road_lanes.as_deref()),
        },
        segmentation: SegmentationFilter {
            road: parse_ranges(raw.seg_road.as_deref()),
            sidewalk: parse_ranges(raw.seg_sidewalk.as_deref()),
            vegetation: parse_ranges(raw.seg_vegetation.as_deref()),
            sky: parse_ranges(raw.seg_sky.as_deref()),
            building: parse_ranges(raw.seg_building.as_deref()),
            vehicle: parse_ranges(raw.seg_vehicle.as_deref()),
            pedestrian: parse_ranges(raw.seg_pedestrian.as_deref()),
        },
    };

    Ok(SearchRequest {
        page,
        per_page,
        extensions,
        facets,
        filters,
    })
}

/// Collects non-empty normalized fields into `{ namespace: { field: value } }`
#[derive(Default)]
struct Echo {
    namespaces: Map<String, Value>,
}

impl Echo {
    fn field(&mut self, namespace: &str, field: &str, value: Value) {
        let entry = self
            .namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(fields) = entry {
            fields.insert(field.to_string(), value);
        }
    }

    fn categories(&mut self, namespace: &str, field: &str, values: &BTreeSet<String>) {
        if !values.is_empty() {
            self.field(namespace, field, json!(values));
        }
    }

    fn ranges(&mut self, namespace: &str, field: &str, ranges: &[Range]) {
        if !ranges.is_empty() {
            let ranges: Vec<Value> = ranges.iter().map(Range::echo).collect();
            self.field(namespace, field, Value::Array(ranges));
        }
    }
}

impl SearchRequest {
    /// Normalized filters as returned in `filters_echo`
    pub fn echo(&self) -> Value {
        let mut echo = Echo::default();

        let facets = &self.facets;
        echo.categories("acq", "ids", &facets.ids);
        echo.categories("acq", "vehicle", &facets.vehicle);
        echo.categories("acq", "period", &facets.period);
        echo.categories("acq", "weather", &facets.weather);
        echo.categories("acq", "country", &facets.country);

        let telemetry = &self.filters.telemetry;
        echo.ranges("telemetry", "speed", &telemetry.speed);
        echo.ranges("telemetry", "steering_angle", &telemetry.steering_angle);
        echo.ranges("telemetry", "accel", &telemetry.accel);
        echo.categories("telemetry", "brake", &telemetry.brake);
        echo.categories("telemetry", "turn_signal", &telemetry.turn_signal);

        let lane = &self.filters.lane;
        echo.categories("lane", "left_marking", &lane.left_marking);
        echo.categories("lane", "right_marking", &lane.right_marking);
        echo.ranges("lane", "width", &lane.width);
        echo.ranges("lane", "curvature", &lane.curvature);
        echo.ranges("lane", "offset", &lane.offset);

        let objects = &self.filters.objects;
        echo.categories("objects", "class", &objects.class);
        echo.categories("objects", "position", &objects.position);
        echo.ranges("objects", "confidence", &objects.confidence);
        echo.ranges("objects", "distance", &objects.distance);

        let road = &self.filters.road;
        echo.categories("road", "type", &road.road_type);
        echo.categories("road", "surface", &road.surface);
        echo.categories("road", "landuse", &road.landuse);
        echo.categories("road", "oneway", &road.oneway);
        echo.ranges("road", "maxspeed", &road.maxspeed);
        echo.ranges("road", "lanes", &road.lanes);

        for (field, ranges) in self.filters.segmentation.ranges() {
            echo.ranges("seg", field, ranges);
        }

        echo.field("media", "ext", json!(self.extensions));

        Value::Object(echo.namespaces)
    }
}
