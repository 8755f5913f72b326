//! Text edge-list ingestion and assignment output.
//!
//! Input lines are `a,b` pairs. Lines with fewer than two fields, or whose first two fields
//! are not integers, are skipped without error. Output lines are `vertex,community`, sorted by
//! vertex id.

use super::{Edge, VertexId};
use crate::dataset::Dataset;
use anyhow::Context;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub fn parse_edge_line(line: &str) -> Option<Edge> {
    let mut fields = line.split(',');
    let a = fields.next()?.trim().parse::<VertexId>().ok()?;
    let b = fields.next()?.trim().parse::<VertexId>().ok()?;
    Some(Edge::new(a, b))
}

/// Reads every line as raw bytes, then parses partition by partition. Lines that are not
/// valid UTF-8 are dropped like any other malformed line.
pub fn load_edges<R: BufRead>(reader: R, partitions: usize) -> anyhow::Result<Dataset<Edge>> {
    let lines = reader
        .split(b'\n')
        .collect::<Result<Vec<Vec<u8>>, _>>()
        .context("Failed to read edge list")?;
    let lines = Dataset::from_vec(lines, partitions);
    let edges = lines.flat_map(|line| {
        std::str::from_utf8(line)
            .ok()
            .and_then(parse_edge_line)
    });

    let skipped = lines.count() - edges.count();
    if skipped > 0 {
        debug!("skipped {} malformed edge lines", skipped);
    }
    lines.unpersist();
    Ok(edges)
}

pub fn read_edge_list<P: AsRef<Path>>(path: P, partitions: usize) -> anyhow::Result<Dataset<Edge>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open edge list {}", path.display()))?;
    load_edges(BufReader::new(file), partitions)
        .with_context(|| format!("Failed to load edge list {}", path.display()))
}

pub fn write_assignment_to<W: Write>(
    writer: W,
    assignment: &Dataset<(VertexId, VertexId)>,
) -> anyhow::Result<()> {
    let mut rows = assignment.collect();
    rows.sort_unstable();

    let mut writer = BufWriter::new(writer);
    for (vertex, community) in rows {
        writeln!(writer, "{},{}", vertex, community)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_assignment<P: AsRef<Path>>(
    path: P,
    assignment: &Dataset<(VertexId, VertexId)>,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    write_assignment_to(file, assignment)
        .with_context(|| format!("Failed to write communities to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_edge_line() {
        assert_eq!(parse_edge_line("1,2"), Some(Edge::new(1, 2)));
        assert_eq!(parse_edge_line(" 7 , 3 "), Some(Edge::new(3, 7)));
        assert_eq!(parse_edge_line("4,5,extra"), Some(Edge::new(4, 5)));
        assert_eq!(parse_edge_line("6,6"), Some(Edge::new(6, 6)));
        assert_eq!(parse_edge_line("12"), None);
        assert_eq!(parse_edge_line(""), None);
        assert_eq!(parse_edge_line("a,b"), None);
    }

    #[test]
    fn test_load_edges_normalizes_and_skips() {
        let input = "2,1\n3\n\n5,4\n# comment\n9,9\n";
        let edges = load_edges(Cursor::new(input), 3).unwrap();
        let mut edges = edges.into_vec();
        edges.sort();
        assert_eq!(edges, vec![Edge::new(1, 2), Edge::new(4, 5), Edge::new(9, 9)]);
        assert!(edges.iter().all(|e| e.lo() <= e.hi()));
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let mut input = b"1,2\r\n".to_vec();
        input.extend_from_slice(&[0xff, 0xfe, b',', b'7', b'\n']);
        input.extend_from_slice(b"3,4");
        let mut edges = load_edges(Cursor::new(input), 2).unwrap().into_vec();
        edges.sort();
        assert_eq!(edges, vec![Edge::new(1, 2), Edge::new(3, 4)]);
    }

    #[test]
    fn test_write_assignment_sorted() {
        let assignment = Dataset::from_vec(vec![(3, 1), (1, 1), (2, 5)], 2);
        let mut out = Vec::new();
        write_assignment_to(&mut out, &assignment).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1,1\n2,5\n3,1\n");
    }

    #[test]
    fn test_read_missing_file_fails() {
        let result = read_edge_list("/definitely/not/here/edges.txt", 2);
        assert!(result.is_err());
    }
}
