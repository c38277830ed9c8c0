//! Rational function segments on [0, 1], fixed by their values on equally
//! spaced nodes.
//!
//! An element of order (p, q) is the ratio of a degree-p polynomial to a
//! degree-q polynomial, determined by its values at the `p + q + 1` nodes
//! `0, 1/(p+q), ..., 1`.

/// Rational segment evaluated on the unit interval
pub trait RatElement: Copy {
    /// Number of interpolation nodes
    const NODES: usize;

    /// Build from a function sampled at the nodes
    fn from_fn(f: impl Fn(f64) -> f64) -> Self;

    /// Value at node `i`
    fn node(&self, i: usize) -> f64;

    /// Value at `x` in [0, 1]
    fn eval(&self, x: f64) -> f64;

    /// Value at the left end
    fn first(&self) -> f64 {
        self.node(0)
    }

    /// Value at the right end
    fn last(&self) -> f64 {
        self.node(Self::NODES - 1)
    }
}

fn lerp(a: f64, b: f64, x: f64) -> f64 {
    a + (b - a) * x
}

/// Order (1, 0) segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear(pub [f64; 2]);

impl Linear {
    /// Segment from `y0` to `y1`
    pub const fn new(y0: f64, y1: f64) -> Self {
        Self([y0, y1])
    }
}

impl RatElement for Linear {
    const NODES: usize = 2;

    fn from_fn(f: impl Fn(f64) -> f64) -> Self {
        Self([f(0.0), f(1.0)])
    }

    fn node(&self, i: usize) -> f64 {
        self.0[i]
    }

    fn eval(&self, x: f64) -> f64 {
        lerp(self.0[0], self.0[1], x)
    }
}

/// Order (2, 0) segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadratic(pub [f64; 3]);

impl Quadratic {
    /// Quadratic through values at 0, 1/2 and 1
    pub const fn new(y0: f64, y_half: f64, y1: f64) -> Self {
        Self([y0, y_half, y1])
    }
}

impl RatElement for Quadratic {
    const NODES: usize = 3;

    fn from_fn(f: impl Fn(f64) -> f64) -> Self {
        Self([f(0.0), f(0.5), f(1.0)])
    }

    fn node(&self, i: usize) -> f64 {
        self.0[i]
    }

    fn eval(&self, x: f64) -> f64 {
        let [y0, yh, y1] = self.0;
        // Lagrange basis on {0, 1/2, 1}.
        y0 * (2.0 * x - 1.0) * (x - 1.0) + yh * 4.0 * x * (1.0 - x) + y1 * x * (2.0 * x - 1.0)
    }
}

/// Order (1, 1) segment, `(a + b x) / (1 + c x)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rational11(pub [f64; 3]);

impl Rational11 {
    /// Rational segment through values at 0, 1/2 and 1
    pub const fn new(y0: f64, y_half: f64, y1: f64) -> Self {
        Self([y0, y_half, y1])
    }
}

impl RatElement for Rational11 {
    const NODES: usize = 3;

    fn from_fn(f: impl Fn(f64) -> f64) -> Self {
        Self([f(0.0), f(0.5), f(1.0)])
    }

    fn node(&self, i: usize) -> f64 {
        self.0[i]
    }

    fn eval(&self, x: f64) -> f64 {
        let [y0, yh, y1] = self.0;
        if yh == y1 {
            return lerp(y0, y1, x);
        }
        let c = (2.0 * yh - y0 - y1) / (y1 - yh);
        let b = y1 * (1.0 + c) - y0;
        (y0 + b * x) / (1.0 + c * x)
    }
}
