//! Spatial arrangement of outputs.
//!
//! The layout places outputs in one 2-D coordinate plane and answers the
//! geometric queries cross-output input routing needs. Entries are kept in
//! insertion order; every query and the auto-placement walk scan them in
//! that order, which is what makes tie-breaks deterministic.
//!
//! Auto-placed entries are reconciled on every mutation and on any member
//! output's resolution change: they line up in a horizontal strip starting
//! at the right edge of the rightmost pinned entry, at that entry's y.
//! Vertical extent is deliberately ignored: a tall pinned output followed
//! by a short auto output may overlap its neighbour vertically.

use super::Output;
use crate::server::{DisplayServer, Notification};
use crate::wire::Registry;
use crate::OutputId;
use lumen_core::geometry::PBox;
use std::collections::HashMap;

/// One output's place in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutOutput {
    pub output: OutputId,
    pub x: i32,
    pub y: i32,
    auto: bool,
}

impl LayoutOutput {
    pub fn is_auto(&self) -> bool {
        self.auto
    }
}

/// The output layout. Mutations run through [`DisplayServer`] so the
/// `change` notification fires exactly once per reconfigure.
#[derive(Debug, Default)]
pub struct OutputLayout {
    entries: Vec<LayoutOutput>,
}

impl OutputLayout {
    pub fn new() -> OutputLayout {
        OutputLayout::default()
    }

    pub fn entries(&self) -> &[LayoutOutput] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry for `output`, if it is part of the layout.
    pub fn get(&self, output: OutputId) -> Option<&LayoutOutput> {
        self.entries.iter().find(|e| e.output == output)
    }

    fn entry_box(entry: &LayoutOutput, outputs: &HashMap<OutputId, Output>) -> PBox {
        let (width, height) = outputs
            .get(&entry.output)
            .map(|o| o.effective_resolution())
            .unwrap_or((0, 0));
        PBox::new(entry.x, entry.y, width, height)
    }

    /// The named output's box, or the union extent of the whole layout.
    pub fn get_box(
        &self,
        outputs: &HashMap<OutputId, Output>,
        reference: Option<OutputId>,
    ) -> Option<PBox> {
        match reference {
            Some(output) => self.get(output).map(|e| Self::entry_box(e, outputs)),
            None => {
                if self.entries.is_empty() {
                    return None;
                }
                let mut min_x = i32::MAX;
                let mut min_y = i32::MAX;
                let mut max_x = i32::MIN;
                let mut max_y = i32::MIN;
                for entry in &self.entries {
                    let b = Self::entry_box(entry, outputs);
                    min_x = min_x.min(b.x);
                    min_y = min_y.min(b.y);
                    max_x = max_x.max(b.x + b.width);
                    max_y = max_y.max(b.y + b.height);
                }
                Some(PBox::new(min_x, min_y, max_x - min_x, max_y - min_y))
            }
        }
    }

    /// The output whose box contains the point, scanning in insertion
    /// order.
    pub fn output_at(
        &self,
        outputs: &HashMap<OutputId, Output>,
        x: f64,
        y: f64,
    ) -> Option<OutputId> {
        self.entries
            .iter()
            .find(|e| Self::entry_box(e, outputs).contains_point(x, y))
            .map(|e| e.output)
    }

    /// Whether the point falls on the named output, or on any output when
    /// no reference is given.
    pub fn contains_point(
        &self,
        outputs: &HashMap<OutputId, Output>,
        reference: Option<OutputId>,
        x: i32,
        y: i32,
    ) -> bool {
        match reference {
            Some(output) => self
                .get(output)
                .map(|e| Self::entry_box(e, outputs).contains_point(x as f64, y as f64))
                .unwrap_or(false),
            None => self.output_at(outputs, x as f64, y as f64).is_some(),
        }
    }

    /// Whether the reference output's box meets the given rectangle.
    pub fn intersects(
        &self,
        outputs: &HashMap<OutputId, Output>,
        reference: OutputId,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
    ) -> bool {
        let Some(entry) = self.get(reference) else {
            return false;
        };
        let target = PBox::new(x1, y1, x2 - x1, y2 - y1);
        Self::entry_box(entry, outputs).intersects(&target)
    }

    /// The nearest point on the named output (or any output) under
    /// squared-Euclidean distance. `None` for an empty layout.
    pub fn closest_point(
        &self,
        outputs: &HashMap<OutputId, Output>,
        reference: Option<OutputId>,
        x: f64,
        y: f64,
    ) -> Option<(f64, f64)> {
        let mut best: Option<(f64, f64)> = None;
        let mut best_distance = f64::MAX;
        for entry in &self.entries {
            if let Some(reference) = reference {
                if reference != entry.output {
                    continue;
                }
            }
            let (px, py) = Self::entry_box(entry, outputs).closest_point(x, y);
            let distance = (x - px) * (x - px) + (y - py) * (y - py);
            if distance < best_distance {
                best = Some((px, py));
                best_distance = distance;
            }
        }
        best
    }

    /// Translate layout coordinates into output-local coordinates.
    /// Unchanged when the output is not in the layout.
    pub fn output_coords(&self, reference: OutputId, x: f64, y: f64) -> (f64, f64) {
        match self.get(reference) {
            Some(entry) => (x - entry.x as f64, y - entry.y as f64),
            None => (x, y),
        }
    }

    /// The output containing the point of the layout closest to the union
    /// extent's centre.
    pub fn get_center_output(&self, outputs: &HashMap<OutputId, Output>) -> Option<OutputId> {
        let extents = self.get_box(outputs, None)?;
        let center_x = extents.x as f64 + extents.width as f64 / 2.0;
        let center_y = extents.y as f64 + extents.height as f64 / 2.0;
        let (x, y) = self.closest_point(outputs, None, center_x, center_y)?;
        self.output_at(outputs, x, y)
    }

    fn upsert(&mut self, output: OutputId) -> &mut LayoutOutput {
        if let Some(index) = self.entries.iter().position(|e| e.output == output) {
            return &mut self.entries[index];
        }
        self.entries.push(LayoutOutput {
            output,
            x: 0,
            y: 0,
            auto: false,
        });
        self.entries.last_mut().unwrap()
    }

    pub(crate) fn add(
        &mut self,
        outputs: &mut HashMap<OutputId, Output>,
        registry: &mut Registry,
        output: OutputId,
        x: i32,
        y: i32,
    ) {
        let entry = self.upsert(output);
        entry.x = x;
        entry.y = y;
        entry.auto = false;
        self.reconfigure(outputs, registry);
    }

    pub(crate) fn add_auto(
        &mut self,
        outputs: &mut HashMap<OutputId, Output>,
        registry: &mut Registry,
        output: OutputId,
    ) {
        self.upsert(output).auto = true;
        self.reconfigure(outputs, registry);
    }

    pub(crate) fn move_output(
        &mut self,
        outputs: &mut HashMap<OutputId, Output>,
        registry: &mut Registry,
        output: OutputId,
        x: i32,
        y: i32,
    ) -> bool {
        let Some(index) = self.entries.iter().position(|e| e.output == output) else {
            tracing::error!(?output, "output not found in this layout");
            return false;
        };
        let entry = &mut self.entries[index];
        entry.x = x;
        entry.y = y;
        entry.auto = false;
        self.reconfigure(outputs, registry);
        true
    }

    pub(crate) fn remove(
        &mut self,
        outputs: &mut HashMap<OutputId, Output>,
        registry: &mut Registry,
        output: OutputId,
    ) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.output != output);
        if self.entries.len() == before {
            return false;
        }
        self.reconfigure(outputs, registry);
        true
    }

    /// The placement transaction: resolve every auto entry's position,
    /// then push all positions into the outputs (the wire fan-out), in
    /// that order.
    pub(crate) fn reconfigure(
        &mut self,
        outputs: &mut HashMap<OutputId, Output>,
        registry: &mut Registry,
    ) {
        // rightmost edge over the pinned entries; on a tie the last one
        // encountered wins
        let mut max_x: Option<i32> = None;
        let mut max_x_y = 0;
        for entry in self.entries.iter().filter(|e| !e.auto) {
            let b = Self::entry_box(entry, outputs);
            let right = b.x + b.width;
            if max_x.map_or(true, |mx| right >= mx) {
                max_x = Some(right);
                max_x_y = b.y;
            }
        }
        let mut max_x = max_x.unwrap_or(0);

        for entry in self.entries.iter_mut().filter(|e| e.auto) {
            let (width, _) = outputs
                .get(&entry.output)
                .map(|o| o.effective_resolution())
                .unwrap_or((0, 0));
            entry.x = max_x;
            entry.y = max_x_y;
            max_x += width;
        }

        for entry in &self.entries {
            if let Some(output) = outputs.get_mut(&entry.output) {
                output.set_position(registry, entry.x, entry.y);
            }
        }
    }
}

/// Layout mutations and queries on the server. Each mutation runs the
/// reconfigure transaction and emits one `change` notification.
impl DisplayServer {
    /// Pin an output at a fixed position.
    pub fn layout_add(&mut self, output: OutputId, x: i32, y: i32) {
        self.layout.add(&mut self.outputs, &mut self.registry, output, x, y);
        self.push_notification(Notification::LayoutChanged);
    }

    /// Add an output with automatic placement.
    pub fn layout_add_auto(&mut self, output: OutputId) {
        self.layout.add_auto(&mut self.outputs, &mut self.registry, output);
        self.push_notification(Notification::LayoutChanged);
    }

    /// Move an output to a fixed position (clearing its auto flag).
    pub fn layout_move(&mut self, output: OutputId, x: i32, y: i32) {
        if self
            .layout
            .move_output(&mut self.outputs, &mut self.registry, output, x, y)
        {
            self.push_notification(Notification::LayoutChanged);
        }
    }

    pub fn layout_remove(&mut self, output: OutputId) {
        if self
            .layout
            .remove(&mut self.outputs, &mut self.registry, output)
        {
            self.push_notification(Notification::LayoutChanged);
        }
    }

    pub fn layout_get(&self, output: OutputId) -> Option<LayoutOutput> {
        self.layout.get(output).copied()
    }

    pub fn layout_output_at(&self, x: f64, y: f64) -> Option<OutputId> {
        self.layout.output_at(&self.outputs, x, y)
    }

    pub fn layout_contains_point(&self, reference: Option<OutputId>, x: i32, y: i32) -> bool {
        self.layout.contains_point(&self.outputs, reference, x, y)
    }

    pub fn layout_intersects(
        &self,
        reference: OutputId,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
    ) -> bool {
        self.layout
            .intersects(&self.outputs, reference, x1, y1, x2, y2)
    }

    pub fn layout_closest_point(
        &self,
        reference: Option<OutputId>,
        x: f64,
        y: f64,
    ) -> Option<(f64, f64)> {
        self.layout.closest_point(&self.outputs, reference, x, y)
    }

    pub fn layout_get_box(&self, reference: Option<OutputId>) -> Option<PBox> {
        self.layout.get_box(&self.outputs, reference)
    }

    pub fn layout_output_coords(&self, reference: OutputId, x: f64, y: f64) -> (f64, f64) {
        self.layout.output_coords(reference, x, y)
    }

    pub fn layout_center_output(&self) -> Option<OutputId> {
        self.layout.get_center_output(&self.outputs)
    }
}
