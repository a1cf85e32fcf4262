//! Queue sequencing.
//!
//! The queue keeps tracks in catalog order.  Shuffle is a separate
//! traversal order over the same indices, so turning it off returns to the
//! original sequence untouched.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    /// `Some` whenever `tracks` is non-empty.
    cursor: Option<usize>,
    /// Traversal permutation while shuffle is on.
    shuffle_order: Option<Vec<usize>>,
    /// The playing track is not in this queue; the cursor only marks a
    /// resting place and stepping starts before the first entry.
    detached: bool,
}

impl Queue {
    pub fn new(tracks: Vec<Track>) -> Self {
        let cursor = if tracks.is_empty() { None } else { Some(0) };
        Self {
            tracks,
            cursor,
            shuffle_order: None,
            detached: false,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, idx: usize) -> Option<&Track> {
        self.tracks.get(idx)
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Track> {
        self.cursor.and_then(|i| self.tracks.get(i))
    }

    pub fn position_of(&self, track_id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == track_id)
    }

    /// Move the cursor; out-of-range indices are refused.
    pub fn set_cursor(&mut self, idx: usize) -> bool {
        if idx < self.tracks.len() {
            self.cursor = Some(idx);
            self.detached = false;
            true
        } else {
            false
        }
    }

    /// Replace the tracks.  The cursor follows `keep_id` when it is still
    /// present, otherwise it goes back to the first entry.  A `keep_id`
    /// that is missing detaches the cursor, so the next step lands on the
    /// first entry instead of skipping it.
    pub fn set_tracks(&mut self, tracks: Vec<Track>, keep_id: Option<&str>) {
        self.tracks = tracks;
        let kept = keep_id.and_then(|id| self.position_of(id));
        self.detached = keep_id.is_some() && kept.is_none() && !self.tracks.is_empty();
        self.cursor = kept.or(if self.tracks.is_empty() { None } else { Some(0) });
        if self.shuffle_order.is_some() {
            self.reshuffle(&mut rand::thread_rng());
        }
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle_order.is_some()
    }

    pub fn set_shuffle(&mut self, on: bool) {
        self.set_shuffle_with(on, &mut rand::thread_rng());
    }

    pub fn set_shuffle_with<R: Rng + ?Sized>(&mut self, on: bool, rng: &mut R) {
        if on {
            self.reshuffle(rng);
        } else {
            self.shuffle_order = None;
        }
    }

    /// New permutation with the current entry first, so the next step never
    /// replays it.
    fn reshuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.tracks.len()).collect();
        order.shuffle(rng);
        if let Some(cur) = self.cursor {
            if let Some(pos) = order.iter().position(|&i| i == cur) {
                order.swap(0, pos);
            }
        }
        self.shuffle_order = Some(order);
    }

    /// Indices in the order `advance` walks them.
    pub fn traversal_order(&self) -> Vec<usize> {
        match &self.shuffle_order {
            Some(order) => order.clone(),
            None => (0..self.tracks.len()).collect(),
        }
    }

    fn order_position(&self, idx: usize) -> usize {
        match &self.shuffle_order {
            Some(order) => order.iter().position(|&i| i == idx).unwrap_or(0),
            None => idx,
        }
    }

    fn index_at(&self, pos: usize) -> usize {
        match &self.shuffle_order {
            Some(order) => order[pos],
            None => pos,
        }
    }

    /// Neighbour of `from` in traversal order, wrapping at both ends.
    pub fn peek_from(&self, from: usize, direction: Direction) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        let pos = self.order_position(from.min(len - 1));
        let target = match direction {
            Direction::Next => (pos + 1) % len,
            Direction::Previous => (pos + len - 1) % len,
        };
        Some(self.index_at(target))
    }

    pub fn peek(&self, direction: Direction) -> Option<usize> {
        if self.detached {
            let last = self.tracks.len().checked_sub(1)?;
            return Some(match direction {
                Direction::Next => self.index_at(0),
                Direction::Previous => self.index_at(last),
            });
        }
        self.cursor.and_then(|c| self.peek_from(c, direction))
    }

    /// Step the cursor and return the new index.  No-op on an empty queue.
    pub fn advance(&mut self, direction: Direction) -> Option<usize> {
        let next = self.peek(direction)?;
        self.cursor = Some(next);
        self.detached = false;
        Some(next)
    }

    /// True when the cursor sits on the last entry of the traversal order.
    pub fn is_at_end(&self) -> bool {
        if self.detached {
            return false;
        }
        match self.cursor {
            Some(c) => self.order_position(c) + 1 == self.tracks.len(),
            None => true,
        }
    }
}
