/// Immutable mapping of group name to concrete values
#[derive(Debug, Clone, Copy)]
pub struct GroupTable {
    groups: &'static [(&'static str, &'static [&'static str])],
}

impl GroupTable {
    pub const fn new(groups: &'static [(&'static str, &'static [&'static str])]) -> Self {
        Self { groups }
    }

    /// Concrete values for a group token, if it names a group
    pub fn members(&self, token: &str) -> Option<&'static [&'static str]> {
        self.groups
            .iter()
            .find(|(group, _)| group.eq_ignore_ascii_case(token))
            .map(|(_, members)| *members)
    }

    /// Expand a token to concrete values, falling back to the literal token
    pub fn expand(&self, token: &str) -> Vec<String> {
        match self.members(token) {
            Some(members) => members.iter().map(|m| m.to_string()).collect(),
            None => vec![token.to_string()],
        }
    }
}

/// OSM-style road classes
pub const ROAD_CLASS: GroupTable = GroupTable::new(&[
    (
        "highway",
        &["motorway", "motorway_link", "trunk", "trunk_link"],
    ),
    (
        "major",
        &[
            "primary",
            "primary_link",
            "secondary",
            "secondary_link",
            "tertiary",
            "tertiary_link",
        ],
    ),
    (
        "urban",
        &["residential", "living_street", "pedestrian", "service"],
    ),
    ("minor", &["unclassified", "track", "road", "service"]),
]);

/// Coarse road surface tokens
pub const SURFACE: GroupTable = GroupTable::new(&[
    (
        "paved",
        &[
            "paved",
            "asphalt",
            "concrete",
            "concrete:plates",
            "concrete:lanes",
            "paving_stones",
            "sett",
            "cobblestone",
            "metal",
            "wood",
            "chipseal",
        ],
    ),
    (
        "unpaved",
        &[
            "unpaved",
            "compacted",
            "fine_gravel",
            "gravel",
            "pebblestone",
            "rock",
            "ground",
            "dirt",
            "earth",
            "grass",
            "mud",
            "sand",
            "woodchips",
        ],
    ),
]);

/// Detector object classes
pub const OBJECT_CLASS: GroupTable = GroupTable::new(&[
    (
        "vehicle",
        &["car", "truck", "bus", "van", "motorcycle", "trailer"],
    ),
    ("vru", &["pedestrian", "bicycle", "cyclist", "motorcyclist", "rider"]),
    (
        "traffic_control",
        &["traffic_light", "traffic_sign", "stop_sign", "traffic_cone"],
    ),
]);

/// Lane marking styles
pub const LANE_MARKING: GroupTable = GroupTable::new(&[
    ("solid", &["solid", "double_solid", "solid_dashed"]),
    ("dashed", &["dashed", "double_dashed", "dashed_solid"]),
    (
        "double",
        &["double_solid", "double_dashed", "solid_dashed", "dashed_solid"],
    ),
]);
