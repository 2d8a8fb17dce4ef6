//! K-means clustering over 2D points.
//!
//! The algorithm alternates two steps until the centroids stop moving:
//!
//! 1. **Assign** - each point joins its nearest centroid (Euclidean distance,
//!    ties go to the lowest centroid index)
//! 2. **Update** - each centroid moves to the mean of its assigned points; a
//!    centroid that attracted no points is re-randomized inside the data's
//!    bounding box so it cannot stay dead forever
//!
//! The free functions [`assign`], [`update`] and [`inertia`] are the raw steps.
//! [`KMeansSession`] wraps them in the lesson's state machine:
//!
//! ```text
//! Uninitialized → AwaitingCentroids → Assign → Update → (Converged | Assign)
//! ```
//!
//! The session never loops on its own; the caller advances it with
//! [`KMeansSession::step`] once per animation frame and stops whenever it wants.

use rand::Rng;
use serde::{Deserialize, Serialize};
use statlab_stats::regression::Point;

use crate::ModelError;

/// Per-centroid movement below which an update counts as converged.
pub const CONVERGENCE_THRESHOLD: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

impl Centroid {
    fn distance_squared(&self, x: f64, y: f64) -> f64 {
        (self.x - x).powi(2) + (self.y - y).powi(2)
    }
}

/// A point together with the index of the centroid it is assigned to.
///
/// `cluster_id` is `None` until the first assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KMeansPoint {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub cluster_id: Option<usize>,
}

impl From<Point> for KMeansPoint {
    fn from(point: Point) -> Self {
        Self {
            id: point.id,
            x: point.x,
            y: point.y,
            cluster_id: None,
        }
    }
}

/// Assigns every point to its nearest centroid.
///
/// With no centroids every point is left unassigned.
#[must_use]
pub fn assign(points: &[KMeansPoint], centroids: &[Centroid]) -> Vec<KMeansPoint> {
    points
        .iter()
        .map(|p| {
            let mut best: Option<(usize, f64)> = None;
            for (i, c) in centroids.iter().enumerate() {
                let d = c.distance_squared(p.x, p.y);
                if best.is_none_or(|(_, best_d)| d < best_d) {
                    best = Some((i, d));
                }
            }
            KMeansPoint {
                cluster_id: best.map(|(i, _)| i),
                ..*p
            }
        })
        .collect()
}

/// Moves `k` centroids to the mean of their assigned points.
///
/// Centroid `i` collects the points whose `cluster_id` is `Some(i)`. Centroids
/// without points are placed uniformly at random inside the bounding box of
/// `points`. Returned centroids have ids `0..k`.
#[expect(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn update<R>(points: &[KMeansPoint], k: usize, rng: &mut R) -> Vec<Centroid>
where
    R: Rng + ?Sized,
{
    let mut sums = vec![(0.0, 0.0, 0_usize); k];
    for p in points {
        if let Some(sum) = p.cluster_id.and_then(|i| sums.get_mut(i)) {
            sum.0 += p.x;
            sum.1 += p.y;
            sum.2 += 1;
        }
    }

    let bounds = Bounds::of(points);
    sums.into_iter()
        .enumerate()
        .map(|(i, (sx, sy, count))| {
            let id = i as u32;
            if count == 0 {
                let (x, y) = bounds.sample(rng);
                tracing::trace!(centroid = i, x, y, "re-randomizing empty centroid");
                Centroid { id, x, y }
            } else {
                Centroid {
                    id,
                    x: sx / count as f64,
                    y: sy / count as f64,
                }
            }
        })
        .collect()
}

/// Sum of squared distances from each point to its assigned centroid.
///
/// Unassigned points, or points assigned to a missing centroid, contribute zero.
#[must_use]
pub fn inertia(points: &[KMeansPoint], centroids: &[Centroid]) -> f64 {
    points
        .iter()
        .filter_map(|p| {
            let c = centroids.get(p.cluster_id?)?;
            Some(c.distance_squared(p.x, p.y))
        })
        .sum()
}

/// Whether every centroid moved less than [`CONVERGENCE_THRESHOLD`].
///
/// A change in centroid count is never converged.
#[must_use]
pub fn has_converged(previous: &[Centroid], next: &[Centroid]) -> bool {
    previous.len() == next.len()
        && previous
            .iter()
            .zip(next)
            .all(|(a, b)| a.distance_squared(b.x, b.y).sqrt() < CONVERGENCE_THRESHOLD)
}

/// `k` centroids placed uniformly at random inside the bounding box of `points`.
#[expect(clippy::cast_possible_truncation)]
pub fn random_centroids<R>(points: &[KMeansPoint], k: usize, rng: &mut R) -> Vec<Centroid>
where
    R: Rng + ?Sized,
{
    let bounds = Bounds::of(points);
    (0..k)
        .map(|i| {
            let (x, y) = bounds.sample(rng);
            Centroid { id: i as u32, x, y }
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Bounds {
    /// Bounding box of the points, or the unit square when there are none.
    fn of(points: &[KMeansPoint]) -> Self {
        if points.is_empty() {
            return Self {
                min_x: 0.0,
                max_x: 1.0,
                min_y: 0.0,
                max_y: 1.0,
            };
        }
        points.iter().fold(
            Self {
                min_x: f64::INFINITY,
                max_x: f64::NEG_INFINITY,
                min_y: f64::INFINITY,
                max_y: f64::NEG_INFINITY,
            },
            |b, p| Self {
                min_x: b.min_x.min(p.x),
                max_x: b.max_x.max(p.x),
                min_y: b.min_y.min(p.y),
                max_y: b.max_y.max(p.y),
            },
        )
    }

    fn sample<R>(&self, rng: &mut R) -> (f64, f64)
    where
        R: Rng + ?Sized,
    {
        (
            sample_axis(self.min_x, self.max_x, rng),
            sample_axis(self.min_y, self.max_y, rng),
        )
    }
}

/// Uniform draw from `[min, max]`, or from `[0, 1)` when the range is not a
/// finite interval.
fn sample_axis<R>(min: f64, max: f64, rng: &mut R) -> f64
where
    R: Rng + ?Sized,
{
    let t: f64 = rng.random();
    if min.is_finite() && max.is_finite() && min <= max {
        // convex combination; `max - min` may overflow
        min * (1.0 - t) + max * t
    } else {
        t
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant)]
pub enum KMeansPhase {
    /// No data loaded.
    Uninitialized,
    /// Data loaded, fewer than `k` centroids placed.
    AwaitingCentroids,
    /// Next step assigns points to centroids.
    Assign,
    /// Next step moves centroids to cluster means.
    Update,
    /// The last update moved no centroid beyond the threshold.
    Converged,
}

/// K-means lesson state, advanced one step at a time by the caller.
///
/// Every transition consumes the previous state and returns the next one.
///
/// # Example
///
/// ```
/// use rand::SeedableRng as _;
/// use statlab_models::kmeans::{KMeansPoint, KMeansSession};
/// use statlab_stats::regression::Point;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
/// let points = [(1.0, 1.0), (1.5, 2.0), (8.0, 8.0), (9.0, 8.5)]
///     .into_iter()
///     .zip(0..)
///     .map(|((x, y), id)| KMeansPoint::from(Point::new(id, x, y)))
///     .collect();
///
/// let mut session = KMeansSession::new(points, 2)
///     .unwrap()
///     .add_centroid(0.0, 0.0)
///     .add_centroid(10.0, 10.0);
/// while !session.phase.is_converged() {
///     session = session.step(&mut rng);
/// }
/// assert_eq!(session.points[0].cluster_id, Some(0));
/// assert_eq!(session.points[3].cluster_id, Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansSession {
    pub k: usize,
    pub points: Vec<KMeansPoint>,
    pub centroids: Vec<Centroid>,
    pub phase: KMeansPhase,
    /// Number of completed update steps.
    pub iterations: usize,
}

impl KMeansSession {
    pub fn new(points: Vec<KMeansPoint>, k: usize) -> Result<Self, ModelError> {
        if k == 0 {
            return Err(ModelError::InsufficientData {
                what: "clusters",
                required: 1,
                actual: 0,
            });
        }
        let phase = if points.is_empty() {
            KMeansPhase::Uninitialized
        } else {
            KMeansPhase::AwaitingCentroids
        };
        Ok(Self {
            k,
            points,
            centroids: vec![],
            phase,
            iterations: 0,
        })
    }

    /// Replaces the dataset and restarts the session.
    #[must_use]
    pub fn load_points(self, points: Vec<KMeansPoint>) -> Self {
        Self { points, ..self }.reset()
    }

    /// Places a centroid where the user clicked.
    ///
    /// Ignored unless the session is awaiting centroids. Placing the `k`-th
    /// centroid moves the session to [`KMeansPhase::Assign`].
    #[expect(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn add_centroid(mut self, x: f64, y: f64) -> Self {
        if !self.phase.is_awaiting_centroids() {
            return self;
        }
        let id = self.centroids.len() as u32;
        self.centroids.push(Centroid { id, x, y });
        if self.centroids.len() >= self.k {
            self.phase = KMeansPhase::Assign;
        }
        self
    }

    /// Fills the remaining centroid slots with random positions.
    #[expect(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn initialize_random<R>(mut self, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        if !self.phase.is_awaiting_centroids() {
            return self;
        }
        let missing = self.k - self.centroids.len();
        let start = self.centroids.len();
        self.centroids.extend(
            random_centroids(&self.points, missing, rng)
                .into_iter()
                .enumerate()
                .map(|(i, c)| Centroid {
                    id: (start + i) as u32,
                    ..c
                }),
        );
        self.phase = KMeansPhase::Assign;
        self
    }

    /// Advances the state machine by one assign or update step.
    ///
    /// Sessions that are uninitialized, awaiting centroids or converged are
    /// returned unchanged.
    #[must_use]
    pub fn step<R>(mut self, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        match self.phase {
            KMeansPhase::Uninitialized
            | KMeansPhase::AwaitingCentroids
            | KMeansPhase::Converged => {}
            KMeansPhase::Assign => {
                self.points = assign(&self.points, &self.centroids);
                self.phase = KMeansPhase::Update;
            }
            KMeansPhase::Update => {
                let next = update(&self.points, self.centroids.len(), rng)
                    .into_iter()
                    .zip(&self.centroids)
                    .map(|(c, previous)| Centroid {
                        id: previous.id,
                        ..c
                    })
                    .collect::<Vec<_>>();
                let converged = has_converged(&self.centroids, &next);
                self.centroids = next;
                self.iterations += 1;
                self.phase = if converged {
                    tracing::debug!(iterations = self.iterations, "k-means converged");
                    KMeansPhase::Converged
                } else {
                    KMeansPhase::Assign
                };
            }
        }
        self
    }

    /// Sum of squared distances to assigned centroids for the current state.
    #[must_use]
    pub fn inertia(&self) -> f64 {
        inertia(&self.points, &self.centroids)
    }

    /// Discards centroids and assignments, keeping the points.
    #[must_use]
    pub fn reset(self) -> Self {
        let points = self
            .points
            .into_iter()
            .map(|p| KMeansPoint {
                cluster_id: None,
                ..p
            })
            .collect::<Vec<_>>();
        let phase = if points.is_empty() {
            KMeansPhase::Uninitialized
        } else {
            KMeansPhase::AwaitingCentroids
        };
        Self {
            k: self.k,
            points,
            centroids: vec![],
            phase,
            iterations: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng as _, SeedableRng as _};
    use rand_pcg::Pcg32;

    use super::*;

    fn random_points(rng: &mut Pcg32, n: u32) -> Vec<KMeansPoint> {
        (0..n)
            .map(|id| {
                KMeansPoint::from(Point::new(
                    id,
                    rng.random_range(0.0..100.0),
                    rng.random_range(0.0..100.0),
                ))
            })
            .collect()
    }

    #[test]
    fn test_assign_breaks_ties_by_lowest_index() {
        let points = [KMeansPoint::from(Point::new(0, 5.0, 0.0))];
        let centroids = [
            Centroid { id: 7, x: 0.0, y: 0.0 },
            Centroid { id: 3, x: 10.0, y: 0.0 },
        ];
        assert_eq!(assign(&points, &centroids)[0].cluster_id, Some(0));
        assert_eq!(assign(&points, &[])[0].cluster_id, None);
    }

    #[test]
    fn test_update_moves_to_mean_and_rerandomizes_empty() {
        let mut rng = Pcg32::seed_from_u64(1);
        let points = [(0.0, 0.0), (2.0, 2.0), (10.0, 4.0)]
            .into_iter()
            .zip(0..)
            .map(|((x, y), id)| KMeansPoint {
                cluster_id: Some(0),
                ..KMeansPoint::from(Point::new(id, x, y))
            })
            .collect::<Vec<_>>();
        let centroids = update(&points, 2, &mut rng);
        assert_eq!(centroids[0].x, 4.0);
        assert_eq!(centroids[0].y, 2.0);
        assert!((0.0..=10.0).contains(&centroids[1].x));
        assert!((0.0..=4.0).contains(&centroids[1].y));
    }

    #[test]
    fn test_rerandomizing_survives_extreme_bounds() {
        let mut rng = Pcg32::seed_from_u64(3);
        let extreme = [(-1e308, 0.0), (1e308, 0.0)]
            .into_iter()
            .zip(0..)
            .map(|((x, y), id)| KMeansPoint {
                cluster_id: Some(0),
                ..KMeansPoint::from(Point::new(id, x, y))
            })
            .collect::<Vec<_>>();
        let centroids = update(&extreme, 2, &mut rng);
        assert_eq!(centroids[0].x, 0.0);
        assert!(centroids[1].x.is_finite());
        assert!((-1e308..=1e308).contains(&centroids[1].x));

        let undefined = [KMeansPoint::from(Point::new(0, f64::NAN, f64::NAN))];
        let centroids = random_centroids(&undefined, 2, &mut rng);
        assert!(
            centroids
                .iter()
                .all(|c| (0.0..1.0).contains(&c.x) && (0.0..1.0).contains(&c.y))
        );
    }

    #[test]
    fn test_inertia_ignores_unassigned_points() {
        let points = [
            KMeansPoint {
                cluster_id: Some(0),
                ..KMeansPoint::from(Point::new(0, 3.0, 4.0))
            },
            KMeansPoint::from(Point::new(1, 100.0, 100.0)),
        ];
        let centroids = [Centroid { id: 0, x: 0.0, y: 0.0 }];
        assert_eq!(inertia(&points, &centroids), 25.0);
    }

    #[test]
    fn test_centroid_count_change_is_not_converged() {
        let a = [Centroid { id: 0, x: 1.0, y: 1.0 }];
        let b = [a[0], Centroid { id: 1, x: 1.0, y: 1.0 }];
        assert!(!has_converged(&a, &b));
        assert!(has_converged(&a, &a));
    }

    #[test]
    fn test_inertia_never_increases() {
        let mut rng = Pcg32::seed_from_u64(20);
        let mut points = random_points(&mut rng, 20);
        let mut centroids = random_centroids(&points, 3, &mut rng);

        let mut previous = f64::INFINITY;
        for _ in 0..10 {
            points = assign(&points, &centroids);
            let after_assign = inertia(&points, &centroids);
            assert!(after_assign <= previous + 1e-9);

            centroids = update(&points, 3, &mut rng);
            let after_update = inertia(&points, &centroids);
            assert!(
                after_update <= after_assign + 1e-9,
                "update increased inertia: {after_assign} -> {after_update}"
            );
            previous = after_update;
        }
    }

    #[test]
    fn test_single_cluster_reaches_mean_in_one_update() {
        let mut rng = Pcg32::seed_from_u64(3);
        let points = random_points(&mut rng, 15);
        let mean_x = points.iter().map(|p| p.x).sum::<f64>() / 15.0;
        let mean_y = points.iter().map(|p| p.y).sum::<f64>() / 15.0;

        let session = KMeansSession::new(points, 1)
            .unwrap()
            .initialize_random(&mut rng)
            .step(&mut rng)
            .step(&mut rng);
        assert_eq!(session.iterations, 1);
        assert!((session.centroids[0].x - mean_x).abs() < 1e-9);
        assert!((session.centroids[0].y - mean_y).abs() < 1e-9);

        // The next update leaves the centroid in place and reports convergence.
        let session = session.step(&mut rng).step(&mut rng);
        assert!(session.phase.is_converged());
        assert_eq!(session.iterations, 2);
    }

    #[test]
    fn test_session_phases() {
        let mut rng = Pcg32::seed_from_u64(5);
        let empty = KMeansSession::new(vec![], 2).unwrap();
        assert!(empty.phase.is_uninitialized());
        assert!(KMeansSession::new(vec![], 0).is_err());

        let points = random_points(&mut rng, 6);
        let session = KMeansSession::new(points, 2).unwrap();
        assert!(session.phase.is_awaiting_centroids());
        let session = session.add_centroid(10.0, 10.0);
        assert!(session.phase.is_awaiting_centroids());
        let session = session.step(&mut rng);
        assert!(session.phase.is_awaiting_centroids());
        let session = session.add_centroid(90.0, 90.0);
        assert!(session.phase.is_assign());
        let session = session.step(&mut rng);
        assert!(session.phase.is_update());
        assert!(session.points.iter().all(|p| p.cluster_id.is_some()));

        let session = session.reset();
        assert!(session.phase.is_awaiting_centroids());
        assert!(session.centroids.is_empty());
        assert!(session.points.iter().all(|p| p.cluster_id.is_none()));
    }
}
