//! Terminal stand-in for a map surface.

use saferoute_core::models::DangerSegment;
use saferoute_overlay::MapOverlayRenderer;

/// Keeps the current danger layer and prints it on every draw.
#[derive(Debug, Default)]
pub struct ConsoleRenderer {
    layer: Vec<Vec<[f64; 2]>>,
    quiet: bool,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track the layer without printing.
    pub fn quiet() -> Self {
        Self {
            layer: Vec::new(),
            quiet: true,
        }
    }

    pub fn layer(&self) -> &[Vec<[f64; 2]>] {
        &self.layer
    }
}

impl MapOverlayRenderer for ConsoleRenderer {
    fn draw(&mut self, segments: &[DangerSegment]) {
        for segment in segments {
            if !self.quiet {
                println!("{}", describe_segment(segment));
            }
            self.layer.push(segment.to_lat_lngs());
        }
    }

    fn clear(&mut self) {
        self.layer.clear();
    }
}

/// One line per segment: index range, point count and endpoints.
pub fn describe_segment(segment: &DangerSegment) -> String {
    let mut points = segment.points();
    let first = points.next();
    let last = points.last().or(first);
    match (first, last) {
        (Some(first), Some(last)) => format!(
            "  danger #{}..#{} ({} pts): {} -> {}",
            segment.start_index(),
            segment.end_index(),
            segment.len(),
            first,
            last
        ),
        _ => "  danger (empty)".to_string(),
    }
}
