// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::io;
use std::str::from_utf8;

use quick_xml::events::{BytesStart, Event};

use super::model;
use crate::Node;

/// Parser is a trait for objects which can parse XML.
///
/// This trait only exists to fix the mismatch of
/// [quick_xml::Reader::read_event] when working on buffered data
/// and [quick_xml::Reader::read_event_into] when working on IO.
pub(super) trait Parser {
    fn read_event<'a>(&'a mut self) -> quick_xml::Result<Event<'a>>;
}

/// IoParser implements [Parser] over an [std::io::BufRead].
pub(super) struct IoParser<R: io::BufRead>(quick_xml::Reader<R>, Vec<u8>);

impl<R: io::BufRead> IoParser<R> {
    #[inline]
    fn new(reader: R) -> Self {
        Self(quick_xml::Reader::from_reader(reader), Vec::default())
    }
}

impl<R: io::BufRead> Parser for IoParser<R> {
    #[inline]
    fn read_event<'a>(&'a mut self) -> quick_xml::Result<Event<'a>> {
        self.1.clear();
        self.0.read_event_into(&mut self.1)
    }
}

/// BufParser implements [Parser] over a slice of bytes (`&[u8]`).
pub(super) struct BufParser<'a>(quick_xml::Reader<&'a [u8]>);

impl<'a> BufParser<'a> {
    #[inline]
    fn new(data: &'a [u8]) -> Self {
        Self(quick_xml::Reader::from_reader(data))
    }
}

impl<'a> Parser for BufParser<'a> {
    #[inline]
    fn read_event<'b>(&'b mut self) -> quick_xml::Result<Event<'b>> {
        self.0.read_event()
    }
}

/// Reader streams osm [Features](model::Feature) from an
/// [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML) document.
pub(super) struct Reader<P: Parser> {
    parser: P,
    eof: bool,
}

impl<P: Parser> Reader<P> {
    #[inline]
    fn new(parser: P) -> Self {
        Self { parser, eof: false }
    }
}

impl<P: Parser> Iterator for Reader<P> {
    type Item = Result<model::Feature, quick_xml::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut f: Option<model::Feature> = None;

        while !self.eof {
            let event = match self.parser.read_event() {
                Ok(e) => e,
                Err(e) => return Some(Err(e)),
            };

            match event {
                Event::Empty(start) => match start.local_name().as_ref() {
                    b"node" => {
                        if let Some(n) = parse_node(&start) {
                            return Some(Ok(model::Feature::Node(n)));
                        }
                    }
                    b"tag" => {
                        if let Some(model::Feature::Way(ref mut w)) = f {
                            if let Some((k, v)) = parse_tag(&start) {
                                w.tags.insert(k, v);
                            }
                        }
                    }
                    b"nd" => {
                        if let Some(model::Feature::Way(ref mut w)) = f {
                            if let Some(ref_) = parse_nd(&start) {
                                w.nodes.push(ref_);
                            }
                        }
                    }
                    _ => {}
                },

                Event::Start(start) => match start.local_name().as_ref() {
                    b"node" => f = parse_node(&start).map(model::Feature::Node),
                    b"way" => f = parse_way(&start).map(model::Feature::Way),
                    _ => {}
                },

                Event::End(end) => match end.local_name().as_ref() {
                    b"node" | b"way" => {
                        if let Some(f) = f.take() {
                            return Some(Ok(f));
                        }
                    }
                    _ => {}
                },

                Event::Eof => {
                    self.eof = true;
                }

                _ => {}
            }
        }

        f.map(Ok)
    }
}

impl<'a> Reader<BufParser<'a>> {
    #[inline]
    pub(super) fn from_buffer(data: &'a [u8]) -> Self {
        Self::new(BufParser::new(data))
    }
}

impl<R: io::BufRead> Reader<IoParser<R>> {
    #[inline]
    pub(super) fn from_io(reader: R) -> Self {
        Self::new(IoParser::new(reader))
    }
}

fn parse_id(start: &BytesStart<'_>, key: &[u8]) -> Option<i64> {
    let attr = start.try_get_attribute(key).ok()??;
    from_utf8(&attr.value).ok()?.parse().ok()
}

fn parse_coordinate(start: &BytesStart<'_>, key: &[u8]) -> Option<f64> {
    let attr = start.try_get_attribute(key).ok()??;
    from_utf8(&attr.value)
        .ok()?
        .parse()
        .ok()
        .filter(|x: &f64| x.is_finite())
}

fn parse_node(start: &BytesStart<'_>) -> Option<Node> {
    let id = parse_id(start, b"id").filter(|&id| id != 0);
    let lat = parse_coordinate(start, b"lat");
    let lon = parse_coordinate(start, b"lon");

    match (id, lat, lon) {
        (Some(id), Some(lat), Some(lon)) => Some(Node { id, lat, lon }),
        _ => {
            log::warn!("Skipping malformed OSM node (id={:?})", id);
            None
        }
    }
}

fn parse_way(start: &BytesStart<'_>) -> Option<model::Way> {
    match parse_id(start, b"id") {
        Some(id) if id != 0 => Some(model::Way {
            id,
            nodes: Vec::default(),
            tags: HashMap::default(),
        }),
        _ => {
            log::warn!("Skipping OSM way without a valid id");
            None
        }
    }
}

fn parse_tag(start: &BytesStart<'_>) -> Option<(String, String)> {
    let mut k = None;
    let mut v = None;

    for attr in start.attributes() {
        let attr = attr.ok()?;
        match attr.key.as_ref() {
            b"k" => k = attr.unescape_value().ok().map(|s| s.into_owned()),
            b"v" => v = attr.unescape_value().ok().map(|s| s.into_owned()),
            _ => {}
        }
    }

    k.map(|k| (k, v.unwrap_or_default()))
}

fn parse_nd(start: &BytesStart<'_>) -> Option<i64> {
    parse_id(start, b"ref").filter(|&ref_| ref_ != 0)
}

#[cfg(test)]
mod tests {
    use super::model::{Feature, Way};
    use super::*;

    macro_rules! tags {
        {} => { HashMap::default() };
        {$( $k:literal : $v:literal ),+} => {
            HashMap::from_iter([ $( ($k.to_string(), $v.to_string()) ),+ ])
        };
    }

    const SIMPLE_XML: &[u8] = include_bytes!("test_fixtures/simple.osm");

    fn collect_all<I: Iterator<Item = Result<Feature, quick_xml::Error>>>(
        features: I,
    ) -> Result<(Vec<Node>, Vec<Way>), quick_xml::Error> {
        let mut nodes = Vec::default();
        let mut ways = Vec::default();

        for f in features {
            match f? {
                Feature::Node(n) => nodes.push(n),
                Feature::Way(w) => ways.push(w),
            }
        }

        Ok((nodes, ways))
    }

    fn check_against_expected<I: Iterator<Item = Result<Feature, quick_xml::Error>>>(
        features: I,
    ) -> Result<(), quick_xml::Error> {
        let (nodes, ways) = collect_all(features)?;

        let node_ids: Vec<i64> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(node_ids, [1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(
            nodes[5],
            Node {
                id: 6,
                lat: 51.5890,
                lon: 4.7770
            }
        );

        assert_eq!(ways.len(), 7);
        assert_eq!(
            ways[0],
            Way {
                id: 100,
                nodes: vec![1, 2, 3],
                tags: tags! {"highway": "residential", "name": "Main St"},
            }
        );
        assert_eq!(
            ways[3].tags.get("name").map(|s| s.as_str()),
            Some("Church & Mill Lane")
        );
        Ok(())
    }

    #[test]
    fn parse_from_buf() -> Result<(), quick_xml::Error> {
        check_against_expected(Reader::from_buffer(SIMPLE_XML))
    }

    #[test]
    fn parse_from_io() -> Result<(), quick_xml::Error> {
        check_against_expected(Reader::from_io(io::Cursor::new(SIMPLE_XML)))
    }

    #[test]
    fn skips_malformed_nodes() -> Result<(), quick_xml::Error> {
        const DATA: &[u8] = br#"<osm>
            <node id="1" lat="51.0" lon="4.0"/>
            <node id="2" lat="north" lon="4.0"/>
            <node lat="51.0" lon="4.0"/>
        </osm>"#;
        let (nodes, ways) = collect_all(Reader::from_buffer(DATA))?;
        assert_eq!(nodes.len(), 1);
        assert!(ways.is_empty());
        Ok(())
    }
}
