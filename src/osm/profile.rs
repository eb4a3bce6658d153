// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

/// Describes which OSM ways form the drivable road network, and in which directions
/// they can be traversed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profile<'a> {
    /// Values of the [highway](https://wiki.openstreetmap.org/wiki/Key:highway) tag
    /// which can be used for routing. Ways with any other (or no) highway tag are ignored.
    pub highways: &'a [&'a str],

    /// Array of OSM [access tags](https://wiki.openstreetmap.org/wiki/Key:access#Land-based_transportation)
    /// (in order from least to most specific) to consider when checking for road prohibitions
    /// and mode-specific one-way restrictions.
    pub access: &'a [&'a str],

    /// Force no routing over [motorroad=yes](https://wiki.openstreetmap.org/wiki/Key:motorroad) ways.
    pub disallow_motorroad: bool,
}

impl<'a> Profile<'a> {
    /// Checks if a way with the given tags is part of the routable network:
    /// it must have one of [Profile::highways] and must be allowed by [Profile::is_allowed].
    pub fn is_routable(&self, tags: &HashMap<String, String>) -> bool {
        let highway = tags.get("highway").map(|v| v.as_str()).unwrap_or("");
        self.highways.contains(&highway) && self.is_allowed(tags)
    }

    /// Checks if the way is routable, by considering motor roads ([Profile::disallow_motorroad])
    /// and access tags ([Profile::access]).
    pub fn is_allowed(&self, tags: &HashMap<String, String>) -> bool {
        if self.disallow_motorroad && tags.get("motorroad").map(|v| v.as_str()) == Some("yes") {
            return false;
        }

        // The most specific access tag wins
        match self
            .access
            .iter()
            .rev()
            .find_map(|&mode| tags.get(mode).map(|v| v.as_str()))
        {
            Some("no") | Some("private") => false,
            _ => true,
        }
    }

    /// Checks if a way is traversable forward (first return value) and
    /// backwards (second return value) by investigating mode-specific and generic one-way tags.
    ///
    /// Some ways (highway=motorway, highway=motorway_link, junction=roundabout and
    /// junction=circular) default to being one-way, except if overridden by specific tags.
    pub fn way_direction(&self, tags: &HashMap<String, String>) -> (bool, bool) {
        let mut forward = true;
        let mut backward = true;

        match tags.get("highway").map(|s| s.as_str()).unwrap_or("") {
            "motorway" | "motorway_link" => backward = false,
            _ => {}
        }

        match tags.get("junction").map(|s| s.as_str()).unwrap_or("") {
            "roundabout" | "circular" => backward = false,
            _ => {}
        }

        match self.get_active_oneway_value(tags) {
            "yes" | "true" | "1" => {
                forward = true;
                backward = false;
            }

            "-1" | "reverse" => {
                forward = false;
                backward = true;
            }

            "no" => {
                forward = true;
                backward = true;
            }

            _ => {}
        }

        (forward, backward)
    }

    /// Returns the value of the most specific "oneway:MODE" tag (based on [Profile::access]),
    /// falling back to simply "oneway", and returning an empty string if no relevant tag was found.
    fn get_active_oneway_value<'t>(&self, tags: &'t HashMap<String, String>) -> &'t str {
        self.access
            .iter()
            .rev()
            .filter(|&&mode| mode != "access")
            .find_map(|&mode| tags.get(&format!("oneway:{}", mode)))
            .or_else(|| tags.get("oneway"))
            .map(|oneway_tag| oneway_tag.as_str())
            .unwrap_or("")
    }
}

/// Drivable road network for cars, with appropriate
/// [access tags](https://wiki.openstreetmap.org/wiki/Key:access).
pub const CAR_PROFILE: Profile = Profile {
    highways: &[
        "motorway",
        "motorway_link",
        "trunk",
        "trunk_link",
        "primary",
        "primary_link",
        "secondary",
        "secondary_link",
        "tertiary",
        "tertiary_link",
        "unclassified",
        "minor",
        "residential",
        "living_street",
        "road",
        "service",
    ],
    access: &["access", "vehicle", "motor_vehicle", "motorcar"],
    disallow_motorroad: false,
};
