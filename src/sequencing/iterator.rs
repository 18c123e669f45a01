use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::dsp::noise::{Dice, Random};

/*
Pattern Iterators
=================

A pattern is a finite or endless stream of numbers pulled one at a time by a
`PatternNode`. `next()` returns `None` once the pattern is exhausted.

  ListSequence   walk a list `length` times starting at `offset`
  ListShuffle    the same walk over a shuffled copy of the list
  ListChoose     `length` random picks from the list
  Arithmetic     start, start+step, start+2*step, ...
  Geometric      start, start*grow, start*grow^2, ...
  Drunk          random walk of at most `step` per value, clamped

Nesting
-------

List entries and the step of `Arithmetic`/`Geometric` can themselves be
patterns. A nested pattern is drained completely before its parent moves on,
then it is reset so the next pass replays it:

    ListSequence([1, Arith(10, 1, len 3), 2], length 3)

      → 1, 10, 11, 12, 2

Seeds
-----

A non-zero seed makes shuffles, picks and walks reproducible. Zero draws from
OS entropy.
*/

pub trait Pattern: Send {
    fn next(&mut self) -> Option<f64>;

    /// Rewind to the first value.
    fn reset(&mut self);
}

/// A list entry or step: a plain number or a nested pattern.
pub enum Item {
    Value(f64),
    Pattern(Box<dyn Pattern>),
}

impl From<f64> for Item {
    fn from(value: f64) -> Self {
        Item::Value(value)
    }
}

impl From<Box<dyn Pattern>> for Item {
    fn from(pattern: Box<dyn Pattern>) -> Self {
        Item::Pattern(pattern)
    }
}

impl std::fmt::Debug for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Item::Value(v) => write!(f, "{v}"),
            Item::Pattern(_) => f.write_str("<pattern>"),
        }
    }
}

impl Item {
    /// Value of a step item. Nested patterns are advanced.
    fn value(&mut self) -> Option<f64> {
        match self {
            Item::Value(v) => Some(*v),
            Item::Pattern(p) => p.next(),
        }
    }
}

/// Pull from `list[index]`. The flag is true when the walk should advance:
/// after a plain value, or after a nested pattern ran dry and was reset.
fn pull(list: &mut [Item], index: usize) -> (Option<f64>, bool) {
    match &mut list[index] {
        Item::Value(v) => (Some(*v), true),
        Item::Pattern(p) => match p.next() {
            Some(v) => (Some(v), false),
            None => {
                p.reset();
                (None, true)
            }
        },
    }
}

#[derive(Debug)]
pub struct ListSequence {
    list: Vec<Item>,
    length: usize,
    offset: usize,
    position: usize,
}

impl ListSequence {
    /// A zero `length` is treated as one pass.
    pub fn new(list: Vec<Item>, length: usize, offset: usize) -> Self {
        Self {
            list,
            length: length.max(1),
            offset,
            position: 0,
        }
    }

    pub fn from_values(values: &[f64], length: usize) -> Self {
        Self::new(values.iter().copied().map(Item::Value).collect(), length, 0)
    }
}

impl Pattern for ListSequence {
    fn next(&mut self) -> Option<f64> {
        while self.position < self.length && !self.list.is_empty() {
            let index = (self.position + self.offset) % self.list.len();
            let (value, advance) = pull(&mut self.list, index);
            if advance {
                self.position += 1;
            }
            if value.is_some() {
                return value;
            }
        }
        None
    }

    fn reset(&mut self) {
        self.position = 0;
    }
}

/// A `ListSequence` over a shuffled list. The order is fixed at construction.
#[derive(Debug)]
pub struct ListShuffle {
    inner: ListSequence,
}

impl ListShuffle {
    pub fn new(mut list: Vec<Item>, length: usize, seed: i32) -> Self {
        if seed != 0 {
            let mut r = Random::new(seed);
            // Fisher-Yates driven by the seeded stream
            for i in (1..list.len()).rev() {
                let j = ((i + 1) as f64 * r.next_unit()) as usize;
                list.swap(i, j.min(i));
            }
        } else {
            list.shuffle(&mut rand::rngs::StdRng::from_entropy());
        }
        Self {
            inner: ListSequence::new(list, length, 0),
        }
    }
}

impl Pattern for ListShuffle {
    fn next(&mut self) -> Option<f64> {
        self.inner.next()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

#[derive(Debug)]
pub struct ListChoose {
    list: Vec<Item>,
    length: usize,
    position: usize,
    dice: Dice,
    /// Nested pattern currently being drained.
    current: Option<usize>,
}

impl ListChoose {
    pub fn new(list: Vec<Item>, length: usize, seed: i32) -> Self {
        Self {
            list,
            length: length.max(1),
            position: 0,
            dice: Dice::new(seed),
            current: None,
        }
    }
}

impl Pattern for ListChoose {
    fn next(&mut self) -> Option<f64> {
        while self.position < self.length && !self.list.is_empty() {
            let index = match self.current {
                Some(i) => i,
                None => {
                    let i = (self.list.len() as f64 * self.dice.unit()) as usize;
                    i.min(self.list.len() - 1)
                }
            };
            let (value, advance) = pull(&mut self.list, index);
            if advance {
                self.position += 1;
                self.current = None;
            } else {
                self.current = Some(index);
            }
            if value.is_some() {
                return value;
            }
        }
        None
    }

    fn reset(&mut self) {
        self.position = 0;
        self.current = None;
    }
}

#[derive(Debug)]
pub struct Arithmetic {
    start: f64,
    value: f64,
    step: Item,
    length: usize,
    position: usize,
}

impl Arithmetic {
    /// `length` of `None` never ends.
    pub fn new(start: f64, step: f64, length: Option<usize>) -> Self {
        Self {
            start,
            value: start,
            step: Item::Value(step),
            length: length.unwrap_or(usize::MAX),
            position: 0,
        }
    }

    /// Take each step from a nested pattern. The walk ends when it runs dry.
    pub fn with_step_pattern(mut self, step: Box<dyn Pattern>) -> Self {
        self.step = Item::Pattern(step);
        self
    }
}

impl Pattern for Arithmetic {
    fn next(&mut self) -> Option<f64> {
        if self.position == 0 {
            self.position = 1;
            return Some(self.value);
        }
        if self.position >= self.length {
            return None;
        }
        let step = self.step.value()?;
        self.value += step;
        self.position += 1;
        Some(self.value)
    }

    fn reset(&mut self) {
        self.value = self.start;
        self.position = 0;
        if let Item::Pattern(p) = &mut self.step {
            p.reset();
        }
    }
}

#[derive(Debug)]
pub struct Geometric {
    start: f64,
    value: f64,
    grow: Item,
    length: usize,
    position: usize,
}

impl Geometric {
    pub fn new(start: f64, grow: f64, length: Option<usize>) -> Self {
        Self {
            start,
            value: start,
            grow: Item::Value(grow),
            length: length.unwrap_or(usize::MAX),
            position: 0,
        }
    }

    /// Take each grow from a nested pattern. The walk ends when it runs dry.
    pub fn with_grow_pattern(mut self, grow: Box<dyn Pattern>) -> Self {
        self.grow = Item::Pattern(grow);
        self
    }
}

impl Pattern for Geometric {
    fn next(&mut self) -> Option<f64> {
        if self.position == 0 {
            self.position = 1;
            return Some(self.value);
        }
        if self.position >= self.length {
            return None;
        }
        let grow = self.grow.value()?;
        self.value *= grow;
        self.position += 1;
        Some(self.value)
    }

    fn reset(&mut self) {
        self.value = self.start;
        self.position = 0;
        if let Item::Pattern(p) = &mut self.grow {
            p.reset();
        }
    }
}

#[derive(Debug)]
pub struct Drunk {
    start: f64,
    value: f64,
    step: f64,
    length: usize,
    position: usize,
    min: f64,
    max: f64,
    dice: Dice,
}

impl Drunk {
    pub fn new(start: f64, step: f64, length: Option<usize>, seed: i32) -> Self {
        Self {
            start,
            value: start,
            step,
            length: length.unwrap_or(usize::MAX),
            position: 0,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            dice: Dice::new(seed),
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

impl Pattern for Drunk {
    fn next(&mut self) -> Option<f64> {
        if self.position == 0 {
            self.position = 1;
            return Some(self.value);
        }
        if self.position >= self.length {
            return None;
        }
        let step = (self.dice.unit() * 2.0 - 1.0) * self.step;
        self.value = (self.value + step).clamp(self.min, self.max);
        self.position += 1;
        Some(self.value)
    }

    fn reset(&mut self) {
        self.value = self.start;
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(p: &mut dyn Pattern) -> Vec<f64> {
        std::iter::from_fn(|| p.next()).take(1000).collect()
    }

    #[test]
    fn sequence_walks_length_times_with_offset() {
        let mut seq = ListSequence::from_values(&[1.0, 2.0, 3.0], 4);
        seq.offset = 1;
        assert_eq!(drain(&mut seq), vec![2.0, 3.0, 1.0, 2.0]);
        assert_eq!(seq.next(), None);
        seq.reset();
        assert_eq!(seq.next(), Some(2.0));
    }

    #[test]
    fn nested_patterns_drain_before_moving_on() {
        let inner: Box<dyn Pattern> = Box::new(Arithmetic::new(10.0, 1.0, Some(3)));
        let list = vec![Item::Value(1.0), Item::Pattern(inner), Item::Value(2.0)];
        let mut seq = ListSequence::new(list, 3, 0);
        assert_eq!(drain(&mut seq), vec![1.0, 10.0, 11.0, 12.0, 2.0]);
    }

    #[test]
    fn shuffle_with_seed_is_a_permutation() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let list = || values.iter().copied().map(Item::Value).collect::<Vec<_>>();
        let mut a = ListShuffle::new(list(), 5, 99);
        let mut b = ListShuffle::new(list(), 5, 99);
        let out_a = drain(&mut a);
        assert_eq!(out_a, drain(&mut b), "same seed, same order");
        let mut sorted = out_a.clone();
        sorted.sort_by(|x, y| x.total_cmp(y));
        assert_eq!(sorted, values);
    }

    #[test]
    fn choose_picks_from_list() {
        let mut choose = ListChoose::new(vec![Item::Value(3.0), Item::Value(7.0)], 50, 5);
        let out = drain(&mut choose);
        assert_eq!(out.len(), 50);
        assert!(out.iter().all(|&v| v == 3.0 || v == 7.0));
    }

    #[test]
    fn arithmetic_and_geometric_start_at_start() {
        let mut arith = Arithmetic::new(0.0, 2.0, Some(4));
        assert_eq!(drain(&mut arith), vec![0.0, 2.0, 4.0, 6.0]);
        let mut geom = Geometric::new(1.0, 3.0, Some(4));
        assert_eq!(drain(&mut geom), vec![1.0, 3.0, 9.0, 27.0]);
    }

    #[test]
    fn arithmetic_step_can_be_a_pattern() {
        let steps = Box::new(ListSequence::from_values(&[1.0, 10.0], 2));
        let mut arith = Arithmetic::new(0.0, 1.0, None).with_step_pattern(steps);
        assert_eq!(drain(&mut arith), vec![0.0, 1.0, 11.0]);
    }

    #[test]
    fn drunk_walk_stays_in_range() {
        let mut walk = Drunk::new(0.5, 0.3, Some(500), 3).with_range(0.0, 1.0);
        let out = drain(&mut walk);
        assert_eq!(out.len(), 500);
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(out.windows(2).all(|w| (w[1] - w[0]).abs() <= 0.3 + 1e-12));
    }
}
