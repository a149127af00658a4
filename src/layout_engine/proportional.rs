//! Turning sibling proportions into extents along one axis.
//!
//! Proportions are kept per sibling in `[0, 1]`, NaN meaning "not assigned yet". Only
//! [`SlotKind::Content`] siblings take part in distribution; collapsed siblings keep their
//! stored value (so it can come back when they expand) but get no space.

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing proportion sums.
pub const EPSILON: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotKind {
    Content,
    Collapsed,
    Splitter,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Slot {
    pub kind: SlotKind,
    pub proportion: f64,
    pub min_size: f64,
}

impl Slot {
    pub fn content(proportion: f64) -> Self {
        Slot { kind: SlotKind::Content, proportion, min_size: 0.0 }
    }

    pub fn collapsed(proportion: f64) -> Self {
        Slot { kind: SlotKind::Collapsed, proportion, min_size: 0.0 }
    }

    pub fn splitter() -> Self { Slot { kind: SlotKind::Splitter, proportion: f64::NAN, min_size: 0.0 } }

    pub fn with_min_size(mut self, min_size: f64) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn is_content(&self) -> bool { self.kind == SlotKind::Content }
}

fn content_indices(slots: &[Slot]) -> Vec<usize> {
    slots.iter().enumerate().filter(|(_, s)| s.is_content()).map(|(i, _)| i).collect()
}

/// Sum of the content proportions; unassigned ones count as zero.
pub fn content_sum(slots: &[Slot]) -> f64 {
    slots
        .iter()
        .filter(|s| s.is_content() && !s.proportion.is_nan())
        .map(|s| s.proportion)
        .sum()
}

/// Assigns every unassigned content slot and makes the content proportions sum to exactly 1.
///
/// Unassigned slots split whatever mass the assigned ones leave over; if nothing is left
/// they get an even share and everything is scaled back down.
pub fn normalize(slots: &mut [Slot]) {
    let content = content_indices(slots);
    if content.is_empty() {
        return;
    }
    let n = content.len() as f64;

    let mut assigned = 0.0;
    let mut unassigned = 0usize;
    for &i in &content {
        let p = &mut slots[i].proportion;
        if p.is_nan() {
            unassigned += 1;
        } else {
            *p = p.clamp(0.0, 1.0);
            assigned += *p;
        }
    }

    if unassigned > 0 {
        let remaining = (1.0 - assigned).max(0.0);
        let share = if remaining > EPSILON { remaining / unassigned as f64 } else { 1.0 / n };
        for &i in &content {
            if slots[i].proportion.is_nan() {
                slots[i].proportion = share;
            }
        }
    }

    let total = content_sum(slots);
    if total <= EPSILON {
        for &i in &content {
            slots[i].proportion = 1.0 / n;
        }
    } else if (total - 1.0).abs() > f64::EPSILON {
        for &i in &content {
            slots[i].proportion /= total;
        }
    }

    // Rounding left by the division goes to the last slot.
    let residual = 1.0 - content_sum(slots);
    if let Some(&last) = content.last() {
        slots[last].proportion = (slots[last].proportion + residual).max(0.0);
    }
}

/// Makes room for the content slot at `index`, which was just added.
///
/// An unassigned newcomer gets an even share; the others are scaled so the total is 1
/// again. When nobody has a proportion yet everyone is split evenly.
pub fn insert_share(slots: &mut [Slot], index: usize) {
    let content = content_indices(slots);
    if !content.contains(&index) {
        normalize(slots);
        return;
    }
    let others: Vec<usize> = content
        .iter()
        .copied()
        .filter(|&i| i != index && !slots[i].proportion.is_nan())
        .collect();
    if others.is_empty() {
        normalize(slots);
        return;
    }
    if slots[index].proportion.is_nan() {
        slots[index].proportion = 1.0 / content.len() as f64;
    }
    let p_new = slots[index].proportion.clamp(0.0, 1.0);
    let others_sum: f64 = others.iter().map(|&i| slots[i].proportion).sum();
    if others_sum > EPSILON {
        let scale = (1.0 - p_new) / others_sum;
        for i in others {
            slots[i].proportion *= scale;
        }
    }
    normalize(slots);
}

/// Which splitters actually separate two content slots.
///
/// A splitter counts only with content on both sides; of several splitters between the
/// same pair, the first one is used.
pub fn active_splitters(slots: &[Slot]) -> Vec<bool> {
    let mut active = vec![false; slots.len()];
    let mut seen_content = false;
    let mut pending = None;
    for (i, slot) in slots.iter().enumerate() {
        match slot.kind {
            SlotKind::Content => {
                if let Some(s) = pending.take() {
                    active[s] = true;
                }
                seen_content = true;
            }
            SlotKind::Splitter if seen_content && pending.is_none() => pending = Some(i),
            _ => {}
        }
    }
    active
}

/// Extent of every slot along an axis of length `extent`.
///
/// Active splitters take `splitter_thickness` each (shrunk if they would not fit), the rest
/// is shared by content slots in whole units. Fractions are carried forward and paid out
/// one unit at a time, and the last content slot takes whatever is left, so the result
/// always adds up to `extent` when there is at least one content slot.
pub fn arrange(slots: &[Slot], extent: f64, splitter_thickness: f64) -> Vec<f64> {
    let extent = extent.max(0.0);
    let mut sizes = vec![0.0; slots.len()];

    let active = active_splitters(slots);
    let splitters = active.iter().filter(|&&a| a).count();
    let thickness = if splitters > 0 {
        splitter_thickness.max(0.0).min(extent / splitters as f64)
    } else {
        0.0
    };
    for (size, _) in sizes.iter_mut().zip(&active).filter(|(_, a)| **a) {
        *size = thickness;
    }

    let available = extent - thickness * splitters as f64;
    let mut props = slots.to_vec();
    normalize(&mut props);
    let content = content_indices(&props);

    let mut used = 0.0;
    let mut carry = 0.0;
    for (k, &i) in content.iter().enumerate() {
        if k + 1 == content.len() {
            sizes[i] = (available - used).max(0.0);
            break;
        }
        let exact = available * props[i].proportion;
        let mut size = exact.floor();
        carry += exact - size;
        if carry >= 1.0 - EPSILON {
            size += 1.0;
            carry -= 1.0;
        }
        let size = size.min(available - used).max(0.0);
        sizes[i] = size;
        used += size;
    }
    sizes
}

/// Moves the splitter at `splitter` by `delta` units of an axis `extent` long.
///
/// The nearest content slot before the splitter grows by `delta / extent` and the one after
/// shrinks by the same amount. Neither may be pushed below its `min_size` share. Returns
/// whether anything changed.
pub fn drag_splitter(slots: &mut [Slot], splitter: usize, delta: f64, extent: f64) -> bool {
    if extent <= 0.0 || slots.get(splitter).map(|s| s.kind) != Some(SlotKind::Splitter) {
        return false;
    }
    let before = (0..splitter).rev().find(|&i| slots[i].is_content());
    let after = (splitter + 1..slots.len()).find(|&i| slots[i].is_content());
    let (Some(before), Some(after)) = (before, after) else {
        return false;
    };
    normalize(slots);

    let p_before = slots[before].proportion;
    let p_after = slots[after].proportion;
    let lo = (slots[before].min_size / extent - p_before).min(0.0);
    let hi = (p_after - slots[after].min_size / extent).max(0.0);
    let dp = (delta / extent).clamp(lo, hi);
    if dp.abs() < EPSILON {
        return false;
    }
    slots[before].proportion = p_before + dp;
    slots[after].proportion = p_after - dp;
    true
}
