//! Piecewise functions over contiguous intervals of the real line

use crate::error::PiecewiseError;

/// Piecewise-constant weighting function
pub type PwConstant = PwElements<f64>;

/// Sequence of elements attached to contiguous intervals.
///
/// Interval `i` is `[vertices[i], vertices[i + 1]]`. Intervals may have zero
/// extent. `PwElements<()>` describes just the partition.
#[derive(Debug, Clone, PartialEq)]
pub struct PwElements<X> {
    vertices: Vec<f64>,
    elements: Vec<X>,
}

impl<X> Default for PwElements<X> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            elements: Vec::new(),
        }
    }
}

impl<X> PwElements<X> {
    /// Empty function
    pub fn new() -> Self {
        Self::default()
    }

    /// Single element on `[left, right]`
    pub fn single(left: f64, right: f64, element: X) -> Result<Self, PiecewiseError> {
        let mut pw = Self::new();
        pw.push(left, right, element)?;
        Ok(pw)
    }

    /// Append an element on `[left, right]`.
    ///
    /// After the first element, `left` must equal the current upper bound.
    pub fn push(&mut self, left: f64, right: f64, element: X) -> Result<(), PiecewiseError> {
        if !(left <= right) {
            return Err(PiecewiseError::Inverted { left, right });
        }
        match self.vertices.last() {
            None => self.vertices.push(left),
            Some(&upper) if upper != left => {
                return Err(PiecewiseError::NotContiguous { left, right, upper });
            }
            Some(_) => {}
        }
        self.vertices.push(right);
        self.elements.push(element);
        Ok(())
    }

    /// Append an element extending the function from its upper bound to `right`
    pub fn extend_to(&mut self, right: f64, element: X) -> Result<(), PiecewiseError> {
        let left = self.upper().unwrap_or(right);
        self.push(left, right, element)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// No elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Vertices bounding the intervals
    pub fn vertices(&self) -> &[f64] {
        &self.vertices
    }

    /// Elements in interval order
    pub fn elements(&self) -> &[X] {
        &self.elements
    }

    /// Lower end of the support
    pub fn lower(&self) -> Option<f64> {
        self.vertices.first().copied()
    }

    /// Upper end of the support
    pub fn upper(&self) -> Option<f64> {
        self.vertices.last().copied()
    }

    /// Support as `(lower, upper)`
    pub fn bounds(&self) -> Option<(f64, f64)> {
        Some((self.lower()?, self.upper()?))
    }

    /// Interval of element `i`
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    pub fn interval(&self, i: usize) -> (f64, f64) {
        (self.vertices[i], self.vertices[i + 1])
    }

    /// Element `i`
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    pub fn element(&self, i: usize) -> &X {
        &self.elements[i]
    }

    /// Index of the right-most interval containing `x`
    pub fn index_of(&self, x: f64) -> Option<usize> {
        let (lower, upper) = self.bounds()?;
        if !(lower <= x && x <= upper) {
            return None;
        }
        let k = self.vertices.partition_point(|&v| v <= x);
        Some((k - 1).min(self.len() - 1))
    }

    /// Element on the right-most interval containing `x`
    pub fn value_at(&self, x: f64) -> Option<&X> {
        self.index_of(x).map(|i| &self.elements[i])
    }

    /// Iterate over `((left, right), element)` pairs
    pub fn iter(&self) -> impl Iterator<Item = ((f64, f64), &X)> + '_ {
        self.elements
            .iter()
            .enumerate()
            .map(move |(i, e)| (self.interval(i), e))
    }
}

/// Intersection of two piecewise functions.
///
/// The result is supported on the overlap of the two supports, with one
/// interval per non-empty overlap of an interval of `a` with one of `b`.
/// When the overlap is a single point the result holds one zero-extent
/// interval.
pub fn meet<A: Clone, B: Clone>(a: &PwElements<A>, b: &PwElements<B>) -> PwElements<(A, B)> {
    let mut m = PwElements::new();
    let (Some((a_lo, a_hi)), Some((b_lo, b_hi))) = (a.bounds(), b.bounds()) else {
        return m;
    };

    let left_bound = a_lo.max(b_lo);
    let right_bound = a_hi.min(b_hi);
    if right_bound < left_bound {
        return m;
    }

    // First intervals reaching the common lower bound.
    let mut i = a.vertices[1..].partition_point(|&v| v < left_bound);
    let mut j = b.vertices[1..].partition_point(|&v| v < left_bound);

    let mut left = left_bound;
    while i < a.len() && j < b.len() && left < right_bound {
        let right = a.vertices[i + 1].min(b.vertices[j + 1]);
        if right > left {
            if m.vertices.is_empty() {
                m.vertices.push(left);
            }
            m.vertices.push(right);
            m.elements.push((a.elements[i].clone(), b.elements[j].clone()));
            left = right;
        }
        if a.vertices[i + 1] <= right {
            i += 1;
        }
        if b.vertices[j + 1] <= right {
            j += 1;
        }
    }

    if m.is_empty() && i < a.len() && j < b.len() {
        m.vertices.push(left_bound);
        m.vertices.push(left_bound);
        m.elements.push((a.elements[i].clone(), b.elements[j].clone()));
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pw(vertices: &[f64], elements: &[i32]) -> PwElements<i32> {
        let mut f = PwElements::new();
        for (i, e) in elements.iter().enumerate() {
            f.push(vertices[i], vertices[i + 1], *e).unwrap();
        }
        f
    }

    #[test]
    fn test_push_rejects_gaps() {
        let mut f = PwElements::new();
        f.push(0.0, 0.5, 1).unwrap();
        assert_eq!(
            f.push(0.6, 1.0, 2),
            Err(PiecewiseError::NotContiguous {
                left: 0.6,
                right: 1.0,
                upper: 0.5
            })
        );
        assert!(matches!(
            f.push(0.5, 0.4, 2),
            Err(PiecewiseError::Inverted { .. })
        ));
        f.extend_to(1.0, 3).unwrap();
        assert_eq!(f.bounds(), Some((0.0, 1.0)));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_index_of_is_right_most() {
        let f = pw(&[0.0, 0.0, 0.5, 1.0, 1.0], &[10, 11, 12, 13]);

        assert_eq!(f.index_of(0.0), Some(1));
        assert_eq!(f.index_of(0.25), Some(1));
        assert_eq!(f.index_of(0.5), Some(2));
        assert_eq!(f.index_of(1.0), Some(3));
        assert_eq!(f.index_of(1.5), None);
        assert_eq!(f.index_of(-0.1), None);
        assert_eq!(f.value_at(0.75), Some(&12));

        let empty: PwElements<()> = PwElements::new();
        assert_eq!(empty.index_of(0.0), None);
    }

    #[test]
    fn test_meet() {
        let a = pw(&[0.0, 0.5, 1.0], &[1, 2]);
        let b = pw(&[0.25, 0.75, 1.5], &[3, 4]);

        let m = meet(&a, &b);
        assert_eq!(m.vertices(), &[0.25, 0.5, 0.75, 1.0]);
        assert_eq!(m.elements(), &[(1, 3), (2, 3), (2, 4)]);
    }

    #[test]
    fn test_meet_degenerate() {
        let a = pw(&[0.0, 0.5, 1.0], &[1, 2]);

        let point = pw(&[0.5, 0.5], &[7]);
        let m = meet(&a, &point);
        assert_eq!(m.vertices(), &[0.5, 0.5]);
        assert_eq!(m.len(), 1);

        let disjoint = pw(&[2.0, 3.0], &[7]);
        assert!(meet(&a, &disjoint).is_empty());
    }

    #[test]
    fn test_meet_skips_zero_extent_pieces() {
        let a = pw(&[0.0, 0.5, 0.5, 1.0], &[1, 2, 3]);
        let b = pw(&[0.0, 1.0], &[9]);

        let m = meet(&a, &b);
        assert_eq!(m.vertices(), &[0.0, 0.5, 1.0]);
        assert_eq!(m.elements(), &[(1, 9), (3, 9)]);
    }
}
