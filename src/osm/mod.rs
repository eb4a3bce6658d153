// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Conversion of [OpenStreetMap](https://www.openstreetmap.org/) data into a drivable road [Graph](crate::Graph).

mod profile;
mod reader;

pub use profile::{Profile, CAR_PROFILE};
pub use reader::{
    add_features_from_buffer, add_features_from_file, add_features_from_io, Error, FileFormat,
    Options,
};

#[cfg(test)]
mod tests {
    use super::super::{earth_distance, Graph};
    use super::*;

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr) => {
            assert!(
                (($a - $b).abs() < 1e-6),
                "assertion failed: {} ≈ {}",
                $a,
                $b
            )
        };
    }

    fn check_simple_graph(g: &Graph) {
        //  8┄┄┄┄┄┄1───Main St───2───Main St───3
        //  (private)            │ ↘ (oneway)   │ Oak Ave
        //                       ┆   6──Church──4
        //            (footway)  7              │ Oak Ave
        //                                      5┄┄?
        //   9 (no ways)

        // Footway, private road and unused nodes are removed
        assert_eq!(g.len(), 6);
        for removed in [7, 8, 9] {
            assert!(g.get_node(removed).is_none());
        }

        // Two-way edges of named roads
        assert_eq!(
            g.get_edge(1, 2).and_then(|e| e.name.as_deref()),
            Some("Main St")
        );
        assert_eq!(
            g.get_edge(2, 1).and_then(|e| e.name.as_deref()),
            Some("Main St")
        );
        assert_eq!(
            g.get_edge(4, 5).and_then(|e| e.name.as_deref()),
            Some("Oak Ave")
        );
        assert_eq!(
            g.get_edge(4, 6).and_then(|e| e.name.as_deref()),
            Some("Church & Mill Lane")
        );

        // Edge lengths
        let n1 = g.get_node(1).unwrap().position();
        let n2 = g.get_node(2).unwrap().position();
        assert_almost_eq!(g.get_edge(1, 2).unwrap().length.unwrap(), earth_distance(n1, n2));

        // One-way, unnamed road
        let oneway = g.get_edge(2, 6).unwrap();
        assert_eq!(oneway.name, None);
        assert!(g.get_edge(6, 2).is_none());

        // No edges to removed nodes
        assert!(g.get_edge(2, 7).is_none());
        assert!(g.get_edge(1, 8).is_none());

        assert_eq!(g.edge_count(), 11);
    }

    fn load(data: &[u8], file_format: FileFormat) -> Graph {
        let mut g = Graph::default();
        let options = Options {
            profile: &CAR_PROFILE,
            file_format,
            bbox: [0.0; 4],
        };
        add_features_from_buffer(&mut g, &options, data).unwrap();
        g
    }

    const XML: &[u8] = include_bytes!("reader/test_fixtures/simple.osm");
    const XML_GZ: &[u8] = include_bytes!("reader/test_fixtures/simple.osm.gz");
    const XML_BZ2: &[u8] = include_bytes!("reader/test_fixtures/simple.osm.bz2");

    #[test]
    fn test_build_graph_xml() {
        check_simple_graph(&load(XML, FileFormat::Xml));
    }

    #[test]
    fn test_build_graph_gz() {
        check_simple_graph(&load(XML_GZ, FileFormat::XmlGz));
    }

    #[test]
    fn test_build_graph_bz2() {
        check_simple_graph(&load(XML_BZ2, FileFormat::XmlBz2));
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(FileFormat::detect(XML), FileFormat::Xml);
        assert_eq!(FileFormat::detect(XML_GZ), FileFormat::XmlGz);
        assert_eq!(FileFormat::detect(XML_BZ2), FileFormat::XmlBz2);

        check_simple_graph(&load(XML_GZ, FileFormat::Unknown));
        check_simple_graph(&load(XML_BZ2, FileFormat::Unknown));
    }

    #[test]
    fn test_build_graph_from_io() {
        let mut g = Graph::default();
        let options = Options {
            profile: &CAR_PROFILE,
            file_format: FileFormat::Unknown,
            bbox: [0.0; 4],
        };
        add_features_from_io(&mut g, &options, std::io::Cursor::new(XML_GZ)).unwrap();
        check_simple_graph(&g);
    }

    #[test]
    fn test_bbox() {
        let mut g = Graph::default();
        let options = Options {
            profile: &CAR_PROFILE,
            file_format: FileFormat::Xml,
            bbox: [4.7740, 51.5875, 4.7775, 51.5885],
        };
        add_features_from_buffer(&mut g, &options, XML).unwrap();

        // Only nodes 1 and 2 are inside the bounding box
        assert_eq!(g.len(), 2);
        assert!(g.get_edge(1, 2).is_some());
        assert!(g.get_edge(2, 3).is_none());
    }

    #[test]
    fn test_malformed_xml() {
        let mut g = Graph::default();
        let options = Options {
            profile: &CAR_PROFILE,
            file_format: FileFormat::Xml,
            bbox: [0.0; 4],
        };
        let data = b"<osm><way id=\"1\"></node></osm>";
        let result = add_features_from_buffer(&mut g, &options, data);
        assert!(matches!(result, Err(Error::Xml(_))));
    }
}
